//! Scenario store contract and its in-memory implementation

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use hub_core::{Scenario, SensorRegistryEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::storage::{Storable, Storage, StorageResult};

/// Storage key for the registry file
pub const STORAGE_KEY: &str = "smarthub.registry";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Load/save contract for scenarios and sensor membership
///
/// Writes to one (hub, name) key must be atomic from a reader's point of
/// view: a concurrent `find_scenarios_by_hub` sees either the old or the new
/// scenario, never neither.
#[async_trait]
pub trait ScenarioStore: Send + Sync {
    /// All scenarios of a hub, ordered by name
    async fn find_scenarios_by_hub(&self, hub_id: &str) -> StoreResult<Vec<Arc<Scenario>>>;

    /// Insert or replace a scenario, returning the replaced one
    async fn upsert_scenario(&self, scenario: Scenario) -> StoreResult<Option<Arc<Scenario>>>;

    /// Remove a scenario, returning it if it existed
    async fn delete_scenario(&self, hub_id: &str, name: &str)
        -> StoreResult<Option<Arc<Scenario>>>;

    /// Insert or replace a sensor entry; `false` when an identical entry exists
    async fn register_sensor(&self, entry: SensorRegistryEntry) -> StoreResult<bool>;

    /// Remove a sensor, returning it if it existed
    async fn deregister_sensor(&self, sensor_id: &str) -> StoreResult<Option<SensorRegistryEntry>>;

    async fn find_sensor(&self, sensor_id: &str) -> StoreResult<Option<SensorRegistryEntry>>;
}

/// Registry contents as written to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryData {
    pub sensors: Vec<SensorRegistryEntry>,
    pub scenarios: Vec<Scenario>,
}

impl Storable for RegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Scenario store backed by concurrent maps
///
/// Scenarios are grouped per hub; replacing one is a single insert under the
/// hub's shard lock.
#[derive(Default)]
pub struct InMemoryScenarioStore {
    /// Optional persistence backend
    storage: Option<Arc<Storage>>,

    /// sensor_id -> entry
    sensors: DashMap<String, SensorRegistryEntry>,

    /// hub_id -> (name -> scenario)
    scenarios: DashMap<String, BTreeMap<String, Arc<Scenario>>>,
}

impl InMemoryScenarioStore {
    /// Create a store without persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that loads from and saves to `storage`
    pub fn with_storage(storage: Arc<Storage>) -> Self {
        Self {
            storage: Some(storage),
            ..Self::default()
        }
    }

    /// Load from storage, if configured
    pub async fn load(&self) -> StorageResult<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        if let Some(data) = storage.load::<RegistryData>().await? {
            info!(
                "Loading {} sensors and {} scenarios from storage",
                data.sensors.len(),
                data.scenarios.len()
            );
            self.restore(data);
        }
        Ok(())
    }

    /// Save to storage, if configured
    pub async fn save(&self) -> StorageResult<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let data = self.export();
        storage.save(&data).await?;
        debug!(
            "Saved {} sensors and {} scenarios to storage",
            data.sensors.len(),
            data.scenarios.len()
        );
        Ok(())
    }

    /// Replace the contents with `data`
    pub fn restore(&self, data: RegistryData) {
        self.sensors.clear();
        self.scenarios.clear();
        for entry in data.sensors {
            self.sensors.insert(entry.id.clone(), entry);
        }
        for scenario in data.scenarios {
            self.scenarios
                .entry(scenario.hub_id.clone())
                .or_default()
                .insert(scenario.name.clone(), Arc::new(scenario));
        }
    }

    /// Copy the contents, sorted for stable output
    pub fn export(&self) -> RegistryData {
        let mut sensors: Vec<_> = self.sensors.iter().map(|r| r.value().clone()).collect();
        sensors.sort_by(|a, b| a.id.cmp(&b.id));

        let mut scenarios: Vec<Scenario> = self
            .scenarios
            .iter()
            .flat_map(|r| {
                r.value()
                    .values()
                    .map(|s| (**s).clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        scenarios.sort_by(|a, b| (&a.hub_id, &a.name).cmp(&(&b.hub_id, &b.name)));

        RegistryData { sensors, scenarios }
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    pub fn scenario_count(&self) -> usize {
        self.scenarios.iter().map(|r| r.value().len()).sum()
    }
}

#[async_trait]
impl ScenarioStore for InMemoryScenarioStore {
    async fn find_scenarios_by_hub(&self, hub_id: &str) -> StoreResult<Vec<Arc<Scenario>>> {
        Ok(self
            .scenarios
            .get(hub_id)
            .map(|hub| hub.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert_scenario(&self, scenario: Scenario) -> StoreResult<Option<Arc<Scenario>>> {
        let mut hub = self.scenarios.entry(scenario.hub_id.clone()).or_default();
        Ok(hub.insert(scenario.name.clone(), Arc::new(scenario)))
    }

    async fn delete_scenario(
        &self,
        hub_id: &str,
        name: &str,
    ) -> StoreResult<Option<Arc<Scenario>>> {
        let removed = self
            .scenarios
            .get_mut(hub_id)
            .and_then(|mut hub| hub.remove(name));
        self.scenarios.remove_if(hub_id, |_, hub| hub.is_empty());
        Ok(removed)
    }

    async fn register_sensor(&self, entry: SensorRegistryEntry) -> StoreResult<bool> {
        if self.sensors.get(&entry.id).is_some_and(|e| *e == entry) {
            return Ok(false);
        }
        self.sensors.insert(entry.id.clone(), entry);
        Ok(true)
    }

    async fn deregister_sensor(&self, sensor_id: &str) -> StoreResult<Option<SensorRegistryEntry>> {
        Ok(self.sensors.remove(sensor_id).map(|(_, entry)| entry))
    }

    async fn find_sensor(&self, sensor_id: &str) -> StoreResult<Option<SensorRegistryEntry>> {
        Ok(self.sensors.get(sensor_id).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{
        ActionType, ConditionOperation, ConditionType, DeviceType, ScenarioAction,
        ScenarioCondition,
    };
    use tempfile::TempDir;

    fn sensor(id: &str, hub_id: &str) -> SensorRegistryEntry {
        SensorRegistryEntry {
            id: id.to_string(),
            hub_id: hub_id.to_string(),
            device_type: DeviceType::SwitchSensor,
        }
    }

    fn scenario(hub_id: &str, name: &str, threshold: i32) -> Scenario {
        Scenario::new(hub_id, name)
            .with_condition(ScenarioCondition::new(
                "s1",
                ConditionType::Switch,
                ConditionOperation::Equals,
                threshold,
            ))
            .with_action(ScenarioAction::new("s2", ActionType::Activate, 0))
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_hub_and_name() {
        let store = InMemoryScenarioStore::new();

        assert!(store
            .upsert_scenario(scenario("h1", "night", 1))
            .await
            .unwrap()
            .is_none());
        let replaced = store
            .upsert_scenario(scenario("h1", "night", 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(replaced.conditions[0].value, 1);

        let found = store.find_scenarios_by_hub("h1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].conditions[0].value, 0);
    }

    #[tokio::test]
    async fn test_scenarios_scoped_by_hub() {
        let store = InMemoryScenarioStore::new();
        store.upsert_scenario(scenario("h1", "b", 1)).await.unwrap();
        store.upsert_scenario(scenario("h1", "a", 1)).await.unwrap();
        store.upsert_scenario(scenario("h2", "a", 1)).await.unwrap();

        let names: Vec<_> = store
            .find_scenarios_by_hub("h1")
            .await
            .unwrap()
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.find_scenarios_by_hub("h3").await.unwrap().is_empty());
        assert_eq!(store.scenario_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_scenario() {
        let store = InMemoryScenarioStore::new();
        store.upsert_scenario(scenario("h1", "a", 1)).await.unwrap();

        assert!(store.delete_scenario("h1", "a").await.unwrap().is_some());
        assert!(store.delete_scenario("h1", "a").await.unwrap().is_none());
        assert!(store.delete_scenario("h9", "a").await.unwrap().is_none());
        assert_eq!(store.scenario_count(), 0);
    }

    #[tokio::test]
    async fn test_register_sensor_idempotent() {
        let store = InMemoryScenarioStore::new();

        assert!(store.register_sensor(sensor("s1", "h1")).await.unwrap());
        assert!(!store.register_sensor(sensor("s1", "h1")).await.unwrap());
        assert!(store.register_sensor(sensor("s1", "h2")).await.unwrap());
        assert_eq!(store.sensor_count(), 1);
        assert_eq!(
            store.find_sensor("s1").await.unwrap().unwrap().hub_id,
            "h2"
        );

        assert!(store.deregister_sensor("s1").await.unwrap().is_some());
        assert!(store.deregister_sensor("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        let store = InMemoryScenarioStore::with_storage(storage.clone());
        store.register_sensor(sensor("s1", "h1")).await.unwrap();
        store.register_sensor(sensor("s2", "h1")).await.unwrap();
        store.upsert_scenario(scenario("h1", "night", 1)).await.unwrap();
        store.save().await.unwrap();

        let reloaded = InMemoryScenarioStore::with_storage(storage);
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.export(), store.export());
        assert_eq!(reloaded.sensor_count(), 2);
        assert_eq!(
            reloaded.find_scenarios_by_hub("h1").await.unwrap()[0].name,
            "night"
        );
    }

    #[tokio::test]
    async fn test_without_storage_is_noop() {
        let store = InMemoryScenarioStore::new();
        store.load().await.unwrap();
        store.save().await.unwrap();
    }

    #[test]
    fn test_concurrent_readers_never_see_gap() {
        let store = Arc::new(InMemoryScenarioStore::new());
        tokio_test::block_on(store.upsert_scenario(scenario("h1", "night", 0))).unwrap();

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    tokio_test::block_on(store.upsert_scenario(scenario("h1", "night", i)))
                        .unwrap();
                }
            })
        };
        for _ in 0..500 {
            let found = tokio_test::block_on(store.find_scenarios_by_hub("h1")).unwrap();
            assert_eq!(found.len(), 1);
        }
        writer.join().unwrap();
    }
}
