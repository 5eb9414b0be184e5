//! rdsup - sequential major version upgrades for Amazon RDS instances.
//!
//! RDS refuses to skip major versions, so an instance on PostgreSQL 9.3
//! must pass through 9.4, 9.5 and 9.6 before reaching 10. rdsup traces
//! that chain from the engine version catalog and applies it one
//! modification at a time, waiting for the instance to become available
//! between steps.

pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod rds;
