//! Instance resolution and upgrade path tracing.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::api::RdsApi;
use super::types::{Engine, ManagedInstance, UpgradePath};
use crate::error::UpgraderError;

/// Upper bound on major version hops in one path.
pub const MAX_UPGRADE_HOPS: usize = 64;

/// Turns instance identifiers into `ManagedInstance`s with their upgrade paths.
#[derive(Clone)]
pub struct Resolver {
    api: Arc<dyn RdsApi>,
}

impl Resolver {
    pub fn new(api: Arc<dyn RdsApi>) -> Self {
        Self { api }
    }

    /// Resolve an instance and its upgrade path.
    ///
    /// Returns `Ok(None)` when the instance runs an engine rdsup does not
    /// upgrade. Eligibility against `target_version` is left to
    /// `ManagedInstance::is_upgradable`.
    pub async fn resolve(
        &self,
        instance_id: &str,
        target_version: Option<&str>,
    ) -> Result<Option<ManagedInstance>> {
        let snapshot = self.api.describe_instance(instance_id).await?;

        let Some(engine) = Engine::from_provider(&snapshot.engine) else {
            info!(
                instance_id = %instance_id,
                engine = %snapshot.engine,
                "Excluding DB instance with unsupported engine"
            );
            return Ok(None);
        };

        let upgrade_path = self
            .trace_upgrade_path(engine, &snapshot.engine_version, target_version)
            .await?;

        let instance = ManagedInstance {
            instance_id: snapshot.instance_id,
            engine,
            current_version: snapshot.engine_version,
            status: snapshot.status,
            target_version: target_version.map(str::to_string),
            upgrade_path,
        };

        debug!(
            instance = %instance,
            upgrade_path = %instance.upgrade_path,
            "Resolved DB instance"
        );

        if !instance.is_upgradable() {
            info!(
                instance_id = %instance.instance_id,
                target_version = target_version.unwrap_or_default(),
                reachable_path = %instance.upgrade_path,
                "Target version is not reachable, excluding DB instance"
            );
        }

        Ok(Some(instance))
    }

    /// Walk the engine version catalog from `current_version`, following the
    /// most recent major version target at each hop, until `target_version`
    /// is offered or no major version target remains.
    pub async fn trace_upgrade_path(
        &self,
        engine: Engine,
        current_version: &str,
        target_version: Option<&str>,
    ) -> Result<UpgradePath> {
        let mut path = UpgradePath::new();
        let mut visited: HashSet<String> = HashSet::from([current_version.to_string()]);
        let mut version = current_version.to_string();

        loop {
            let targets = self.api.describe_upgrade_targets(engine, &version).await?;
            let major_versions: Vec<&str> = targets
                .iter()
                .filter(|t| t.is_major_version_upgrade)
                .map(|t| t.engine_version.as_str())
                .collect();

            debug!(
                engine = %engine,
                engine_version = %version,
                major_versions = ?major_versions,
                "Available major version targets"
            );

            if let Some(target) = target_version
                && major_versions.contains(&target)
            {
                info!(
                    engine = %engine,
                    target_version = %target,
                    available_major_versions = ?major_versions,
                    "Target version found in available major versions"
                );
                path.push(target);
                return Ok(path);
            }

            // Provider order: the last major target is the most recent one
            let Some(&next) = major_versions.last() else {
                return Ok(path);
            };

            if !visited.insert(next.to_string()) || path.len() >= MAX_UPGRADE_HOPS {
                return Err(UpgraderError::UpgradePathLoop {
                    engine: engine.to_string(),
                    version: next.to_string(),
                }
                .into());
            }

            path.push(next);
            version = next.to_string();
        }
    }
}
