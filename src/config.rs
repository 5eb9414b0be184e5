//! Command line arguments and runtime configuration.

use anyhow::Result;
use clap::{ArgGroup, Parser, ValueEnum};
use std::time::Duration;

use crate::rds::tags::{format_filter, parse_tag_filter};
use crate::rds::{InstanceSelection, UpgradeConfig, WaitSettings};

/// Report format printed once the run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rdsup",
    version,
    about = "Sequential major version upgrades for Amazon RDS instances"
)]
#[command(group(ArgGroup::new("selection").required(true).args(["ids", "tags"])))]
pub struct Args {
    /// RDS DB instance identifier(s) to upgrade
    #[arg(long, env = "RDSUP_IDS", num_args = 1.., value_delimiter = ',')]
    pub ids: Option<Vec<String>>,

    /// JSON object of tags a DB instance must carry to be upgraded, e.g. '{"owner":"dba"}'
    #[arg(long, env = "RDSUP_TAGS")]
    pub tags: Option<String>,

    /// Major engine version to stop at (default: newest reachable)
    #[arg(long, env = "RDSUP_TARGET_VERSION")]
    pub target_version: Option<String>,

    /// Print the upgrade plan without modifying any instance
    #[arg(long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// AWS region
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS profile
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Seconds to pause after each modify request before polling again
    #[arg(long, default_value = "30")]
    pub settle_seconds: u64,

    /// Availability check interval in seconds
    #[arg(long, default_value = "30")]
    pub check_interval_seconds: u64,

    /// Maximum wait for a DB instance to become available, in minutes
    #[arg(long, default_value = "180")]
    pub wait_timeout_minutes: u64,

    /// Maximum DB instances upgraded at once (0 = all selected instances)
    #[arg(long, default_value = "0")]
    pub max_concurrency: usize,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: pretty or json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub selection: InstanceSelection,
    pub target_version: Option<String>,
    pub dry_run: bool,
    pub yes: bool,
    pub region: Option<String>,
    pub profile: Option<String>,
    pub upgrade: UpgradeConfig,
    pub wait: WaitSettings,
    pub output: OutputFormat,
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self> {
        let tags = args.tags.as_deref().map(parse_tag_filter).transpose()?;
        let selection = InstanceSelection::new(args.ids, tags)?;

        Ok(Self {
            selection,
            target_version: args.target_version,
            dry_run: args.dry_run,
            yes: args.yes,
            region: args.region,
            profile: args.profile,
            upgrade: UpgradeConfig {
                dry_run: args.dry_run,
                settle_time: Duration::from_secs(args.settle_seconds),
                max_concurrency: args.max_concurrency,
            },
            wait: WaitSettings {
                check_interval: Duration::from_secs(args.check_interval_seconds),
                timeout: Duration::from_secs(args.wait_timeout_minutes * 60),
            },
            output: args.output,
            log_level: args.log_level,
            log_format: args.log_format,
        })
    }

    pub fn display(&self, actual_region: &str) {
        let selection_info = match &self.selection {
            InstanceSelection::Ids(ids) => format!("ids: {}", ids.join(",")),
            InstanceSelection::Tags(filter) => format!("tags: {}", format_filter(filter)),
        };

        tracing::info!(
            region = %actual_region,
            selection = %selection_info,
            target_version = self.target_version.as_deref().unwrap_or("newest"),
            dry_run = self.dry_run,
            settle_seconds = self.upgrade.settle_time.as_secs(),
            check_interval_seconds = self.wait.check_interval.as_secs(),
            wait_timeout_minutes = self.wait.timeout.as_secs() / 60,
            max_concurrency = self.upgrade.max_concurrency,
            "Configuration initialized"
        );

        if self.dry_run {
            tracing::warn!("DRY RUN MODE ENABLED - No instances will be modified");
        }
    }
}
