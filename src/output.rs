//! Console rendering for upgrade plans and reports.

use anyhow::Result;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::OutputFormat;
use crate::rds::upgrade::{OutcomeStatus, UpgradePlan, UpgradeReport, dry_run_line};

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "INSTANCE")]
    instance_id: String,
    #[tabled(rename = "ENGINE")]
    engine: String,
    #[tabled(rename = "FROM")]
    current_version: String,
    #[tabled(rename = "PATH")]
    upgrade_path: String,
    #[tabled(rename = "RESULT")]
    result: String,
}

/// Print the upgrade plan before execution. Nothing is printed for JSON
/// output so stdout carries only the report.
pub fn print_upgrade_plan(
    plan: &UpgradePlan,
    target_version: Option<&str>,
    format: OutputFormat,
) {
    if let Some(text) = upgrade_plan_text(plan, target_version, format) {
        print!("{}", text);
    }
}

fn upgrade_plan_text(
    plan: &UpgradePlan,
    target_version: Option<&str>,
    format: OutputFormat,
) -> Option<String> {
    if format != OutputFormat::Table {
        return None;
    }

    let mut lines = vec![
        String::new(),
        format!(
            "Upgrade Plan ({} eligible, target: {})",
            plan.eligible.len(),
            target_version.unwrap_or("newest")
        )
        .bold()
        .to_string(),
        "=".repeat(60),
    ];

    if plan.eligible.is_empty() {
        lines.push("No eligible DB instances.".yellow().to_string());
    }

    for instance in &plan.eligible {
        lines.push(format!("  {}", dry_run_line(instance)));
    }

    for skipped in &plan.skipped {
        let reason = match &skipped.status {
            OutcomeStatus::Excluded { reason } => reason,
            OutcomeStatus::Failed { error } => error,
            _ => continue,
        };
        lines.push(format!(
            "  {} {} ({})",
            "skip".yellow(),
            skipped.instance_id,
            reason
        ));
    }

    lines.push(String::new());
    Some(lines.join("\n") + "\n")
}

/// Render the report as a table with a one-line summary.
pub fn render_table(report: &UpgradeReport) -> String {
    let rows: Vec<OutcomeRow> = report
        .outcomes
        .iter()
        .map(|o| OutcomeRow {
            instance_id: o.instance_id.clone(),
            engine: o
                .engine
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string()),
            current_version: o.current_version.clone().unwrap_or_else(|| "-".to_string()),
            upgrade_path: if o.upgrade_path.is_empty() {
                "-".to_string()
            } else {
                o.upgrade_path.to_string()
            },
            result: match &o.status {
                OutcomeStatus::Planned => "planned".to_string(),
                OutcomeStatus::Upgraded => "upgraded".to_string(),
                OutcomeStatus::Excluded { reason } => format!("excluded: {}", reason),
                OutcomeStatus::Failed { error } => format!("failed: {}", error),
            },
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::blank());
    table.to_string()
}

/// Print the final report in the requested format.
pub fn print_report(report: &UpgradeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            if report.outcomes.is_empty() {
                println!("{}", "No DB instances selected.".yellow());
                return Ok(());
            }

            println!("{}", render_table(report));
            println!();

            let failed = report.failed_count();
            let summary = if report.dry_run {
                format!(
                    "[DRY RUN] {} instance(s) planned",
                    report.count(|s| *s == OutcomeStatus::Planned)
                )
                .yellow()
            } else if failed > 0 {
                format!("{} instance(s) failed", failed).red().bold()
            } else {
                format!(
                    "{} instance(s) upgraded",
                    report.count(|s| *s == OutcomeStatus::Upgraded)
                )
                .green()
                .bold()
            };
            println!("{}", summary);
        }
    }

    Ok(())
}
