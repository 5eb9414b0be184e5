//! RDS major version upgrade orchestration.

use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::api::RdsApi;
use super::resolver::Resolver;
use super::tags::{format_filter, matches_filter};
use super::types::{Engine, ManagedInstance, TagFilter, UpgradePath};
use crate::error::UpgraderError;

/// Which DB instances an upgrade run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceSelection {
    Ids(Vec<String>),
    Tags(TagFilter),
}

impl InstanceSelection {
    /// Build a selection from exactly one of `ids` or `tags`.
    pub fn new(ids: Option<Vec<String>>, tags: Option<TagFilter>) -> Result<Self> {
        match (ids, tags) {
            (Some(ids), None) if !ids.is_empty() => Ok(Self::Ids(ids)),
            (None, Some(tags)) if !tags.is_empty() => Ok(Self::Tags(tags)),
            (Some(_), Some(_)) => Err(UpgraderError::InvalidSelection(
                "ids and tags are mutually exclusive".to_string(),
            )
            .into()),
            _ => Err(UpgraderError::InvalidSelection(
                "either ids or tags is required".to_string(),
            )
            .into()),
        }
    }
}

/// Configuration for upgrade execution.
#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    pub dry_run: bool,
    /// Pause after each modify request before waiting for availability again.
    pub settle_time: Duration,
    /// Maximum simultaneous instance workers; 0 means one per instance.
    pub max_concurrency: usize,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            settle_time: Duration::from_secs(30),
            max_concurrency: 0,
        }
    }
}

/// Per-instance result of an upgrade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Planned,
    Upgraded,
    Excluded { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceOutcome {
    pub instance_id: String,
    pub engine: Option<Engine>,
    pub current_version: Option<String>,
    pub upgrade_path: UpgradePath,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl InstanceOutcome {
    fn for_instance(instance: &ManagedInstance, status: OutcomeStatus) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            engine: Some(instance.engine),
            current_version: Some(instance.current_version.clone()),
            upgrade_path: instance.upgrade_path.clone(),
            status,
        }
    }

    fn unresolved(instance_id: &str, status: OutcomeStatus) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            engine: None,
            current_version: None,
            upgrade_path: UpgradePath::new(),
            status,
        }
    }
}

/// Resolved selection: instances to upgrade plus everything already settled.
#[derive(Debug, Clone, Default)]
pub struct UpgradePlan {
    pub eligible: Vec<ManagedInstance>,
    pub skipped: Vec<InstanceOutcome>,
}

impl UpgradePlan {
    /// One human-readable line per eligible instance.
    pub fn dry_run_summary(&self) -> String {
        self.eligible
            .iter()
            .map(|instance| format!("{}\n", dry_run_line(instance)))
            .collect()
    }
}

/// Outcome of `upgrade_all`: eligible instances in selection order, then
/// the skipped ones in selection order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpgradeReport {
    pub dry_run: bool,
    pub outcomes: Vec<InstanceOutcome>,
}

impl UpgradeReport {
    pub fn count(&self, predicate: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }
}

/// Summary line for a planned instance upgrade.
pub fn dry_run_line(instance: &ManagedInstance) -> String {
    if instance.upgrade_path.is_empty() {
        format!(
            "{} is already at the newest major version ({})",
            instance.instance_id, instance.current_version
        )
    } else {
        format!(
            "{} will be upgraded as follows: {}",
            instance.instance_id, instance.upgrade_path
        )
    }
}

/// First occurrence of each id, in the order given.
fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(ids.len());

    for id in ids {
        if seen.insert(id.as_str()) {
            unique.push(id.clone());
        } else {
            warn!(instance_id = %id, "Ignoring duplicate DB instance id");
        }
    }

    unique
}

/// Drives selected DB instances through their upgrade paths.
#[derive(Clone)]
pub struct Upgrader {
    api: Arc<dyn RdsApi>,
    resolver: Resolver,
    config: UpgradeConfig,
    limiter: Option<Arc<Semaphore>>,
}

impl Upgrader {
    pub fn new(api: Arc<dyn RdsApi>, config: UpgradeConfig) -> Self {
        let limiter = (config.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrency)));

        Self {
            resolver: Resolver::new(Arc::clone(&api)),
            api,
            config,
            limiter,
        }
    }

    /// Resolve the selection into instance identifiers.
    ///
    /// Explicit ids keep their order with repeats dropped; existence is
    /// checked during resolution.
    pub async fn select_instances(&self, selection: &InstanceSelection) -> Result<Vec<String>> {
        let filter = match selection {
            InstanceSelection::Ids(ids) => return Ok(dedup_ids(ids)),
            InstanceSelection::Tags(filter) => filter,
        };

        let instances = self.api.list_instances().await?;
        let mut matching = BTreeSet::new();

        for instance in &instances {
            let tags = self.api.list_tags(&instance.arn).await?;
            if matches_filter(filter, &tags) {
                matching.insert(instance.instance_id.clone());
            }
        }

        if matching.is_empty() {
            info!(
                tags = %format_filter(filter),
                instances_scanned = instances.len(),
                "No DB instances found matching tags"
            );
        } else {
            info!(
                tags = %format_filter(filter),
                matched = matching.len(),
                instances_scanned = instances.len(),
                "Selected DB instances by tags"
            );
        }

        Ok(matching.into_iter().collect())
    }

    /// Select and resolve instances, splitting eligible ones from the rest.
    pub async fn plan(
        &self,
        selection: &InstanceSelection,
        target_version: Option<&str>,
    ) -> Result<UpgradePlan> {
        let ids = self.select_instances(selection).await?;

        let resolutions =
            join_all(ids.iter().map(|id| self.resolver.resolve(id, target_version))).await;

        let mut plan = UpgradePlan::default();

        for (id, resolution) in ids.iter().zip(resolutions) {
            match resolution {
                Ok(Some(instance)) if instance.is_upgradable() => plan.eligible.push(instance),
                Ok(Some(instance)) => plan.skipped.push(InstanceOutcome::for_instance(
                    &instance,
                    OutcomeStatus::Excluded {
                        reason: format!(
                            "target version {} not reachable",
                            target_version.unwrap_or_default()
                        ),
                    },
                )),
                Ok(None) => plan.skipped.push(InstanceOutcome::unresolved(
                    id,
                    OutcomeStatus::Excluded {
                        reason: "unsupported engine".to_string(),
                    },
                )),
                Err(e) => {
                    error!(instance_id = %id, error = %e, "Failed to resolve DB instance");
                    plan.skipped.push(InstanceOutcome::unresolved(
                        id,
                        OutcomeStatus::Failed {
                            error: e.to_string(),
                        },
                    ));
                }
            }
        }

        info!(
            selected = ids.len(),
            eligible = plan.eligible.len(),
            skipped = plan.skipped.len(),
            "Upgrade plan resolved"
        );

        Ok(plan)
    }

    /// Upgrade every eligible instance in the selection, or only report
    /// what would happen in dry-run mode.
    pub async fn upgrade_all(
        &self,
        selection: &InstanceSelection,
        target_version: Option<&str>,
    ) -> Result<UpgradeReport> {
        let plan = self.plan(selection, target_version).await?;

        if self.config.dry_run {
            return Ok(self.dry_run_report(plan));
        }

        Ok(self.execute(plan).await)
    }

    /// Report a plan without touching any instance.
    pub fn dry_run_report(&self, plan: UpgradePlan) -> UpgradeReport {
        for instance in &plan.eligible {
            info!(instance_id = %instance.instance_id, "[DRY RUN] {}", dry_run_line(instance));
        }

        let mut outcomes: Vec<InstanceOutcome> = plan
            .eligible
            .iter()
            .map(|i| InstanceOutcome::for_instance(i, OutcomeStatus::Planned))
            .collect();
        outcomes.extend(plan.skipped);

        UpgradeReport {
            dry_run: true,
            outcomes,
        }
    }

    /// Run one worker per eligible instance and wait for all of them.
    /// A failing instance never stops its siblings.
    pub async fn execute(&self, plan: UpgradePlan) -> UpgradeReport {
        let handles: Vec<_> = plan
            .eligible
            .iter()
            .cloned()
            .map(|instance| {
                let upgrader = self.clone();
                tokio::spawn(async move { upgrader.run_worker(instance).await })
            })
            .collect();

        let results = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(plan.eligible.len() + plan.skipped.len());
        for (instance, joined) in plan.eligible.iter().zip(results) {
            let outcome = joined.unwrap_or_else(|e| {
                error!(instance_id = %instance.instance_id, error = %e, "Upgrade worker aborted");
                InstanceOutcome::for_instance(
                    instance,
                    OutcomeStatus::Failed {
                        error: format!("worker aborted: {}", e),
                    },
                )
            });
            outcomes.push(outcome);
        }
        outcomes.extend(plan.skipped);

        let report = UpgradeReport {
            dry_run: false,
            outcomes,
        };

        info!(
            upgraded = report.count(|s| *s == OutcomeStatus::Upgraded),
            failed = report.failed_count(),
            "Upgrade run finished"
        );

        report
    }

    async fn run_worker(&self, instance: ManagedInstance) -> InstanceOutcome {
        let _permit = match &self.limiter {
            Some(limiter) => match Arc::clone(limiter).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    return InstanceOutcome::for_instance(
                        &instance,
                        OutcomeStatus::Failed {
                            error: e.to_string(),
                        },
                    );
                }
            },
            None => None,
        };

        match self.upgrade_instance(&instance).await {
            Ok(()) => InstanceOutcome::for_instance(&instance, OutcomeStatus::Upgraded),
            Err(e) => {
                error!(
                    instance_id = %instance.instance_id,
                    error = %e,
                    "DB instance upgrade failed, remaining steps skipped"
                );
                InstanceOutcome::for_instance(
                    &instance,
                    OutcomeStatus::Failed {
                        error: e.to_string(),
                    },
                )
            }
        }
    }

    /// Walk one instance through its upgrade path: wait for availability,
    /// request the version change, settle, then wait for availability again.
    pub async fn upgrade_instance(&self, instance: &ManagedInstance) -> Result<()> {
        let total = instance.upgrade_path.len();
        if total == 0 {
            info!(
                instance_id = %instance.instance_id,
                engine_version = %instance.current_version,
                "No major version upgrade available, nothing to do"
            );
            return Ok(());
        }

        let mut current_version = instance.current_version.clone();

        for (i, version) in instance.upgrade_path.iter().enumerate() {
            info!(
                instance_id = %instance.instance_id,
                step = i + 1,
                total_steps = total,
                from = %current_version,
                to = %version,
                "Waiting for DB instance to become available before upgrade"
            );
            self.api.wait_until_available(&instance.instance_id).await?;

            self.api
                .modify_engine_version(&instance.instance_id, version)
                .await?;

            info!(
                instance_id = %instance.instance_id,
                engine_version = %version,
                settle_seconds = self.config.settle_time.as_secs(),
                "Upgrade requested, waiting for it to take effect"
            );
            if !self.config.settle_time.is_zero() {
                tokio::time::sleep(self.config.settle_time).await;
            }

            self.api.wait_until_available(&instance.instance_id).await?;

            info!(
                instance_id = %instance.instance_id,
                step = i + 1,
                total_steps = total,
                engine_version = %version,
                "Successfully upgraded DB instance"
            );
            current_version = version.clone();
        }

        info!(
            instance_id = %instance.instance_id,
            from = %instance.current_version,
            to = %current_version,
            "Upgrade path complete"
        );

        Ok(())
    }
}
