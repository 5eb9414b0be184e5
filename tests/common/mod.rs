//! In-memory RDS double that records every provider call.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use rdsup::error::UpgraderError;
use rdsup::rds::{
    Engine, InstanceRef, InstanceSnapshot, RdsApi, TagFilter, UpgradeTarget,
};

pub const TEST_INSTANCE_ID: &str = "test-rds-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Describe(String),
    Catalog(String),
    ListInstances,
    ListTags(String),
    Modify(String, String),
    Wait(String),
}

#[derive(Debug, Clone)]
struct FakeInstance {
    engine: String,
    version: String,
    status: String,
    tags: TagFilter,
}

#[derive(Default)]
struct State {
    instances: BTreeMap<String, FakeInstance>,
    catalog: HashMap<(Engine, String), Vec<UpgradeTarget>>,
    failing_modify: HashSet<String>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakeRds {
    state: Mutex<State>,
}

impl FakeRds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(self, id: &str, engine: &str, version: &str) -> Self {
        self.state.lock().unwrap().instances.insert(
            id.to_string(),
            FakeInstance {
                engine: engine.to_string(),
                version: version.to_string(),
                status: "available".to_string(),
                tags: TagFilter::new(),
            },
        );
        self
    }

    pub fn with_tags(self, id: &str, tags: &[(&str, &str)]) -> Self {
        if let Some(instance) = self.state.lock().unwrap().instances.get_mut(id) {
            instance.tags = tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
        }
        self
    }

    pub fn with_status(self, id: &str, status: &str) -> Self {
        if let Some(instance) = self.state.lock().unwrap().instances.get_mut(id) {
            instance.status = status.to_string();
        }
        self
    }

    pub fn with_catalog_entry(
        self,
        engine: Engine,
        version: &str,
        targets: Vec<UpgradeTarget>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .catalog
            .insert((engine, version.to_string()), targets);
        self
    }

    /// 9.3.14 -> 9.4.18 -> 9.5.13 -> 9.6.9 -> 10.4
    pub fn with_postgres_catalog(self) -> Self {
        self.with_catalog_entry(
            Engine::Postgres,
            "9.3.14",
            vec![
                UpgradeTarget::minor("9.3.16"),
                UpgradeTarget::minor("9.3.23"),
                UpgradeTarget::major("9.4.9"),
                UpgradeTarget::major("9.4.11"),
                UpgradeTarget::major("9.4.17"),
                UpgradeTarget::major("9.4.18"),
            ],
        )
        .with_catalog_entry(Engine::Postgres, "9.4.18", vec![UpgradeTarget::major("9.5.13")])
        .with_catalog_entry(Engine::Postgres, "9.5.13", vec![UpgradeTarget::major("9.6.9")])
        .with_catalog_entry(Engine::Postgres, "9.6.9", vec![UpgradeTarget::major("10.4")])
        .with_catalog_entry(Engine::Postgres, "10.4", vec![])
    }

    /// 5.5.46 -> 5.6.40 -> 5.7.22
    pub fn with_mysql_catalog(self) -> Self {
        self.with_catalog_entry(
            Engine::Mysql,
            "5.5.46",
            vec![
                UpgradeTarget::minor("5.5.54"),
                UpgradeTarget::major("5.6.34"),
                UpgradeTarget::major("5.6.40"),
            ],
        )
        .with_catalog_entry(
            Engine::Mysql,
            "5.6.40",
            vec![UpgradeTarget::major("5.7.19"), UpgradeTarget::major("5.7.22")],
        )
        .with_catalog_entry(Engine::Mysql, "5.7.22", vec![UpgradeTarget::minor("5.7.23")])
    }

    pub fn failing_modify(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_modify
            .insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Wait and modify calls for one instance, in order.
    pub fn mutation_calls(&self, id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                Call::Wait(i) => i == id,
                Call::Modify(i, _) => i == id,
                _ => false,
            })
            .collect()
    }

    pub fn modified_versions(&self, id: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Modify(i, version) if i == id => Some(version),
                _ => None,
            })
            .collect()
    }

    pub fn modify_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Modify(_, _)))
            .count()
    }

    pub fn catalog_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Catalog(_)))
            .count()
    }

    pub fn version_of(&self, id: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .instances
            .get(id)
            .map(|i| i.version.clone())
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn arn_for(id: &str) -> String {
    format!("arn:aws:rds:us-east-1:123456789012:db:{}", id)
}

#[async_trait]
impl RdsApi for FakeRds {
    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceSnapshot> {
        self.record(Call::Describe(instance_id.to_string()));
        let state = self.state.lock().unwrap();
        let instance = state
            .instances
            .get(instance_id)
            .ok_or_else(|| UpgraderError::InstanceNotFound(instance_id.to_string()))?;

        Ok(InstanceSnapshot {
            instance_id: instance_id.to_string(),
            engine: instance.engine.clone(),
            engine_version: instance.version.clone(),
            status: instance.status.clone(),
        })
    }

    async fn describe_upgrade_targets(
        &self,
        engine: Engine,
        engine_version: &str,
    ) -> Result<Vec<UpgradeTarget>> {
        self.record(Call::Catalog(engine_version.to_string()));
        Ok(self
            .state
            .lock()
            .unwrap()
            .catalog
            .get(&(engine, engine_version.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_instances(&self) -> Result<Vec<InstanceRef>> {
        self.record(Call::ListInstances);
        Ok(self
            .state
            .lock()
            .unwrap()
            .instances
            .keys()
            .map(|id| InstanceRef {
                instance_id: id.clone(),
                arn: arn_for(id),
            })
            .collect())
    }

    async fn list_tags(&self, arn: &str) -> Result<TagFilter> {
        self.record(Call::ListTags(arn.to_string()));
        let state = self.state.lock().unwrap();
        Ok(state
            .instances
            .iter()
            .find(|(id, _)| arn_for(id) == arn)
            .map(|(_, instance)| instance.tags.clone())
            .unwrap_or_default())
    }

    async fn modify_engine_version(&self, instance_id: &str, engine_version: &str) -> Result<()> {
        self.record(Call::Modify(
            instance_id.to_string(),
            engine_version.to_string(),
        ));

        let mut state = self.state.lock().unwrap();
        if state.failing_modify.contains(instance_id) {
            return Err(UpgraderError::AwsSdk(
                "rds::client".to_string(),
                "InvalidDBInstanceState".to_string(),
            )
            .into());
        }

        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| UpgraderError::InstanceNotFound(instance_id.to_string()))?;
        instance.version = engine_version.to_string();
        instance.status = "upgrading".to_string();
        Ok(())
    }

    async fn wait_until_available(&self, instance_id: &str) -> Result<()> {
        self.record(Call::Wait(instance_id.to_string()));

        let mut state = self.state.lock().unwrap();
        let instance = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| UpgraderError::InstanceNotFound(instance_id.to_string()))?;

        if instance.status == "stopped" {
            return Err(UpgraderError::InstanceUnavailable {
                instance_id: instance_id.to_string(),
                status: instance.status.clone(),
            }
            .into());
        }

        instance.status = "available".to_string();
        Ok(())
    }
}
