//! AWS RDS SDK client wrapper.

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_rds::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::api::RdsApi;
use super::types::{Engine, InstanceRef, InstanceSnapshot, TagFilter, UpgradeTarget};
use crate::error::UpgraderError;

/// Status an instance must report before it accepts another modification.
pub const STATUS_AVAILABLE: &str = "available";

/// Statuses from which an instance will not return to `available` on its own.
const TERMINAL_STATUSES: &[&str] = &[
    "deleted",
    "deleting",
    "failed",
    "incompatible-restore",
    "incompatible-parameters",
    "stopped",
    "stopping",
    "storage-full",
];

/// Polling behaviour of `wait_until_available`.
#[derive(Debug, Clone, Copy)]
pub struct WaitSettings {
    pub check_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(180 * 60),
        }
    }
}

/// RDS client wrapper implementing the provider operations.
#[derive(Clone)]
pub struct RdsClient {
    client: Client,
    region: String,
    wait: WaitSettings,
}

impl RdsClient {
    /// Create a new RDS client with the given AWS configuration.
    pub async fn new(profile: Option<&str>, region: Option<&str>, wait: WaitSettings) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(profile) = profile {
            debug!("Using AWS profile: {}", profile);
            config_loader = config_loader.profile_name(profile);
        }

        if let Some(region) = region {
            debug!("Using AWS region: {}", region);
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = config_loader.load().await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            client: Client::new(&config),
            region,
            wait,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl RdsApi for RdsClient {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceSnapshot> {
        debug!(instance_id = %instance_id, "Describing DB instance");

        let response = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .is_some_and(|se| se.is_db_instance_not_found_fault());
                if not_found {
                    UpgraderError::InstanceNotFound(instance_id.to_string())
                } else {
                    UpgraderError::aws(module_path!(), e)
                }
            })?;

        let instance = response
            .db_instances()
            .first()
            .ok_or_else(|| UpgraderError::InstanceNotFound(instance_id.to_string()))?;

        Ok(InstanceSnapshot {
            instance_id: instance
                .db_instance_identifier()
                .unwrap_or(instance_id)
                .to_string(),
            engine: instance.engine().unwrap_or_default().to_string(),
            engine_version: instance.engine_version().unwrap_or_default().to_string(),
            status: instance.db_instance_status().unwrap_or("unknown").to_string(),
        })
    }

    async fn describe_upgrade_targets(
        &self,
        engine: Engine,
        engine_version: &str,
    ) -> Result<Vec<UpgradeTarget>> {
        debug!(engine = %engine, engine_version = %engine_version, "Describing DB engine version");

        let response = self
            .client
            .describe_db_engine_versions()
            .engine(engine.as_str())
            .engine_version(engine_version)
            .send()
            .await
            .map_err(|e| UpgraderError::aws(module_path!(), e))?;

        // One engine and version yields at most one catalog entry.
        let targets = response
            .db_engine_versions()
            .first()
            .map(|catalog| {
                catalog
                    .valid_upgrade_target()
                    .iter()
                    .filter_map(|target| {
                        target.engine_version().map(|version| UpgradeTarget {
                            engine_version: version.to_string(),
                            is_major_version_upgrade: target
                                .is_major_version_upgrade()
                                .unwrap_or(false),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(targets)
    }

    async fn list_instances(&self) -> Result<Vec<InstanceRef>> {
        info!("Listing DB instances in region: {}", self.region);

        let mut instances = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self.client.describe_db_instances();

            if let Some(m) = marker.take() {
                request = request.marker(m);
            }

            let response = request
                .send()
                .await
                .map_err(|e| UpgraderError::aws(module_path!(), e))?;

            for instance in response.db_instances() {
                if let (Some(id), Some(arn)) =
                    (instance.db_instance_identifier(), instance.db_instance_arn())
                {
                    instances.push(InstanceRef {
                        instance_id: id.to_string(),
                        arn: arn.to_string(),
                    });
                }
            }

            marker = response.marker().map(|s| s.to_string());
            if marker.is_none() {
                break;
            }
        }

        debug!("Found {} DB instances", instances.len());
        Ok(instances)
    }

    async fn list_tags(&self, arn: &str) -> Result<TagFilter> {
        let response = self
            .client
            .list_tags_for_resource()
            .resource_name(arn)
            .send()
            .await
            .map_err(|e| UpgraderError::aws(module_path!(), e))?;

        Ok(response
            .tag_list()
            .iter()
            .filter_map(|tag| match (tag.key(), tag.value()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            })
            .collect())
    }

    async fn modify_engine_version(&self, instance_id: &str, engine_version: &str) -> Result<()> {
        info!(
            instance_id = %instance_id,
            engine_version = %engine_version,
            "Requesting engine version change"
        );

        self.client
            .modify_db_instance()
            .db_instance_identifier(instance_id)
            .engine_version(engine_version)
            .allow_major_version_upgrade(true)
            .apply_immediately(true)
            .send()
            .await
            .map_err(|e| UpgraderError::aws(module_path!(), e))?;

        Ok(())
    }

    async fn wait_until_available(&self, instance_id: &str) -> Result<()> {
        let start = Instant::now();
        let mut checks_performed = 0u32;

        info!(instance_id = %instance_id, "Polling DB instance for availability");

        loop {
            let status = if start.elapsed() > self.wait.timeout {
                None
            } else {
                let snapshot = self.describe_instance(instance_id).await?;
                checks_performed += 1;

                debug!(
                    instance_id = %instance_id,
                    status = %snapshot.status,
                    check_number = checks_performed,
                    elapsed_seconds = start.elapsed().as_secs(),
                    "DB instance status check"
                );
                Some(snapshot.status)
            };

            match poll_outcome(status.as_deref(), start.elapsed(), self.wait.timeout) {
                PollOutcome::Available => {
                    info!(
                        instance_id = %instance_id,
                        checks_performed,
                        "DB instance is available"
                    );
                    return Ok(());
                }
                PollOutcome::Terminal(status) => {
                    warn!(
                        instance_id = %instance_id,
                        status = %status,
                        "DB instance is in a state it will not leave on its own"
                    );
                    return Err(UpgraderError::InstanceUnavailable {
                        instance_id: instance_id.to_string(),
                        status,
                    }
                    .into());
                }
                PollOutcome::TimedOut => {
                    return Err(UpgraderError::Timeout {
                        operation: format!("{} availability", instance_id),
                        details: format!(
                            "instance did not become available within {} minutes",
                            self.wait.timeout.as_secs() / 60
                        ),
                    }
                    .into());
                }
                PollOutcome::Continue => {}
            }

            // Long upgrades get a periodic reminder at info level
            if checks_performed % 10 == 0 {
                info!(
                    instance_id = %instance_id,
                    status = status.as_deref().unwrap_or_default(),
                    elapsed_seconds = start.elapsed().as_secs(),
                    "Still waiting for DB instance to become available"
                );
            }

            tokio::time::sleep(self.wait.check_interval).await;
        }
    }
}

/// What a single availability poll means for the waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollOutcome {
    Available,
    Terminal(String),
    TimedOut,
    Continue,
}

/// Decide the next step of `wait_until_available`. `status` is `None` when
/// the deadline passed before the instance was polled.
fn poll_outcome(status: Option<&str>, elapsed: Duration, timeout: Duration) -> PollOutcome {
    match status {
        Some(STATUS_AVAILABLE) => PollOutcome::Available,
        Some(status) if TERMINAL_STATUSES.contains(&status) => {
            PollOutcome::Terminal(status.to_string())
        }
        _ if elapsed > timeout => PollOutcome::TimedOut,
        None => PollOutcome::TimedOut,
        Some(_) => PollOutcome::Continue,
    }
}
