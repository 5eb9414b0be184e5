//! Provider operations consumed by the resolver and the upgrade driver.

use anyhow::Result;
use async_trait::async_trait;

use super::types::{Engine, InstanceRef, InstanceSnapshot, TagFilter, UpgradeTarget};

/// The subset of the RDS API rdsup depends on.
///
/// Implementations are shared read-only across instance workers.
#[async_trait]
pub trait RdsApi: Send + Sync {
    /// DescribeDBInstances for a single identifier.
    /// Fails with `UpgraderError::InstanceNotFound` for unknown identifiers.
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceSnapshot>;

    /// Valid upgrade targets from `(engine, version)`, in provider order.
    async fn describe_upgrade_targets(
        &self,
        engine: Engine,
        engine_version: &str,
    ) -> Result<Vec<UpgradeTarget>>;

    /// Every DB instance visible to the caller.
    async fn list_instances(&self) -> Result<Vec<InstanceRef>>;

    /// Tags attached to the resource with the given ARN.
    async fn list_tags(&self, arn: &str) -> Result<TagFilter>;

    /// Request an immediate engine version change with major upgrades allowed.
    async fn modify_engine_version(&self, instance_id: &str, engine_version: &str) -> Result<()>;

    /// Block until the instance reports `available`.
    async fn wait_until_available(&self, instance_id: &str) -> Result<()>;
}
