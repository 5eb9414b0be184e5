//! rdsup - sequential major version upgrades for Amazon RDS instances.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use dialoguer::Confirm;
use std::sync::Arc;
use tracing::{error, info};

use rdsup::config::{Args, Config, OutputFormat};
use rdsup::logging;
use rdsup::output::{print_report, print_upgrade_plan};
use rdsup::rds::{RdsApi, RdsClient, Upgrader};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_format, &args.log_level);

    let config = Config::from_args(args)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rdsup");

    let client = RdsClient::new(
        config.profile.as_deref(),
        config.region.as_deref(),
        config.wait,
    )
    .await;
    config.display(client.region());

    let api: Arc<dyn RdsApi> = Arc::new(client);
    let upgrader = Upgrader::new(api, config.upgrade.clone());
    let target_version = config.target_version.as_deref();

    let plan = upgrader.plan(&config.selection, target_version).await?;

    let report = if config.dry_run {
        if config.output == OutputFormat::Table {
            println!("{}", "[DRY RUN] No DB instance will be modified.".yellow());
            print!("{}", plan.dry_run_summary());
            println!();
        }
        upgrader.dry_run_report(plan)
    } else {
        print_upgrade_plan(&plan, target_version, config.output);

        if plan.eligible.is_empty() {
            info!("No eligible DB instances, nothing to upgrade");
        } else if !config.yes && !confirm_upgrade()? {
            eprintln!("{}", "Upgrade cancelled.".yellow());
            return Ok(());
        }

        upgrader.execute(plan).await
    };

    print_report(&report, config.output)?;

    if report.has_failures() {
        error!(
            failed = report.failed_count(),
            "One or more DB instances were not upgraded"
        );
        return Err(anyhow::anyhow!(
            "{} DB instance(s) failed",
            report.failed_count()
        ));
    }

    Ok(())
}

fn confirm_upgrade() -> Result<bool> {
    eprintln!("{}", "Major version upgrades can not be rolled back.".yellow().bold());

    Ok(Confirm::new()
        .with_prompt("Proceed with the upgrade?")
        .default(false)
        .interact()?)
}
