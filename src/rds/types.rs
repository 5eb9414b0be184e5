//! Domain types shared by the resolver and the upgrade driver.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Database engine families rdsup knows how to walk through major versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Postgres,
    Mysql,
}

impl Engine {
    pub const SUPPORTED: &'static [Engine] = &[Engine::Postgres, Engine::Mysql];

    /// Map a provider-reported engine name onto a supported engine.
    pub fn from_provider(name: &str) -> Option<Self> {
        Self::SUPPORTED
            .iter()
            .copied()
            .find(|engine| engine.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Mysql => "mysql",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a DB instance as reported by DescribeDBInstances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSnapshot {
    pub instance_id: String,
    pub engine: String,
    pub engine_version: String,
    pub status: String,
}

/// One valid upgrade target from the engine version catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeTarget {
    pub engine_version: String,
    pub is_major_version_upgrade: bool,
}

impl UpgradeTarget {
    pub fn major(version: &str) -> Self {
        Self {
            engine_version: version.to_string(),
            is_major_version_upgrade: true,
        }
    }

    pub fn minor(version: &str) -> Self {
        Self {
            engine_version: version.to_string(),
            is_major_version_upgrade: false,
        }
    }
}

/// Identifier and ARN pair used for tag lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub instance_id: String,
    pub arn: String,
}

/// Key/value tags required on an instance for it to be selected.
pub type TagFilter = BTreeMap<String, String>;

/// Ordered major versions an instance passes through, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UpgradePath(Vec<String>);

impl UpgradePath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, version: impl Into<String>) {
        self.0.push(version.into());
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for UpgradePath {
    fn from(versions: Vec<String>) -> Self {
        Self(versions)
    }
}

impl fmt::Display for UpgradePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

/// A DB instance with a supported engine and its resolved upgrade path.
#[derive(Debug, Clone)]
pub struct ManagedInstance {
    pub instance_id: String,
    pub engine: Engine,
    pub current_version: String,
    pub status: String,
    pub target_version: Option<String>,
    pub upgrade_path: UpgradePath,
}

impl ManagedInstance {
    /// An instance is upgradable when no target was requested, or the
    /// resolved path ends exactly at the requested target.
    pub fn is_upgradable(&self) -> bool {
        match self.target_version.as_deref() {
            None => true,
            Some(target) => self.upgrade_path.last() == Some(target),
        }
    }
}

impl fmt::Display for ManagedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (engine: {}, version: {}, status: {})",
            self.instance_id, self.engine, self.current_version, self.status
        )
    }
}
