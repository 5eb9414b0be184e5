//! Amazon RDS major version upgrades.
//!
//! The resolver walks the engine version catalog to build an upgrade path,
//! and the upgrader drives each instance through it.

pub mod api;
pub mod client;
pub mod resolver;
pub mod tags;
pub mod types;
pub mod upgrade;

pub use api::RdsApi;
pub use client::{RdsClient, WaitSettings};
pub use resolver::Resolver;
pub use types::{
    Engine, InstanceRef, InstanceSnapshot, ManagedInstance, TagFilter, UpgradePath, UpgradeTarget,
};
pub use upgrade::{InstanceSelection, UpgradeConfig, UpgradeReport, Upgrader};
