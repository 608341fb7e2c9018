//! Hub definition changes: sensor membership and scenario upserts

use std::sync::Arc;

use hub_core::{DeviceType, Scenario, ScenarioAction, ScenarioCondition, SensorRegistryEntry};
use tracing::{debug, info, instrument, warn};

use crate::error::{RegistryResult, ValidationError};
use crate::store::ScenarioStore;

/// Applies hub definition changes to a [`ScenarioStore`]
#[derive(Clone)]
pub struct ScenarioService {
    store: Arc<dyn ScenarioStore>,
}

impl ScenarioService {
    pub fn new(store: Arc<dyn ScenarioStore>) -> Self {
        Self { store }
    }

    /// Register a sensor on a hub
    ///
    /// Re-registering an identical sensor is a no-op.
    #[instrument(skip(self))]
    pub async fn add_sensor(
        &self,
        hub_id: &str,
        sensor_id: &str,
        device_type: DeviceType,
    ) -> RegistryResult<()> {
        let entry = SensorRegistryEntry {
            id: sensor_id.to_string(),
            hub_id: hub_id.to_string(),
            device_type,
        };
        if self.store.register_sensor(entry).await? {
            info!("Registered sensor {} on hub {}", sensor_id, hub_id);
        } else {
            debug!("Sensor {} already registered on hub {}", sensor_id, hub_id);
        }
        Ok(())
    }

    /// Remove a sensor; an absent sensor is logged and ignored
    #[instrument(skip(self))]
    pub async fn remove_sensor(&self, hub_id: &str, sensor_id: &str) -> RegistryResult<()> {
        match self.store.deregister_sensor(sensor_id).await? {
            Some(entry) => {
                if entry.hub_id != hub_id {
                    warn!(
                        "Sensor {} removed by hub {} but was registered on hub {}",
                        sensor_id, hub_id, entry.hub_id
                    );
                }
                info!("Removed sensor {} from hub {}", sensor_id, entry.hub_id);

                let dangling = self
                    .store
                    .find_scenarios_by_hub(&entry.hub_id)
                    .await?
                    .iter()
                    .filter(|s| s.referenced_sensors().any(|id| id == sensor_id))
                    .count();
                if dangling > 0 {
                    warn!(
                        "{} scenario(s) on hub {} still reference removed sensor {}",
                        dangling, entry.hub_id, sensor_id
                    );
                }
            }
            None => warn!("Sensor {} not found for removal", sensor_id),
        }
        Ok(())
    }

    /// Insert or replace the scenario named `name` on `hub_id`
    ///
    /// Every referenced sensor must be registered on the same hub.
    #[instrument(skip(self, conditions, actions))]
    pub async fn add_scenario(
        &self,
        hub_id: &str,
        name: &str,
        conditions: Vec<ScenarioCondition>,
        actions: Vec<ScenarioAction>,
    ) -> RegistryResult<()> {
        let scenario = Scenario {
            hub_id: hub_id.to_string(),
            name: name.to_string(),
            conditions,
            actions,
        };
        self.validate(&scenario).await?;

        let (n_conditions, n_actions) = (scenario.conditions.len(), scenario.actions.len());
        let replaced = self.store.upsert_scenario(scenario).await?;
        info!(
            "{} scenario '{}' on hub {} ({} conditions, {} actions)",
            if replaced.is_some() { "Replaced" } else { "Added" },
            name,
            hub_id,
            n_conditions,
            n_actions
        );
        Ok(())
    }

    /// Remove a scenario; an absent scenario is logged and ignored
    #[instrument(skip(self))]
    pub async fn remove_scenario(&self, hub_id: &str, name: &str) -> RegistryResult<()> {
        if self.store.delete_scenario(hub_id, name).await?.is_some() {
            info!("Removed scenario '{}' from hub {}", name, hub_id);
        } else {
            warn!("Scenario '{}' not found on hub {}", name, hub_id);
        }
        Ok(())
    }

    async fn validate(&self, scenario: &Scenario) -> RegistryResult<()> {
        if scenario.name.trim().is_empty() {
            return Err(ValidationError::EmptyName {
                hub_id: scenario.hub_id.clone(),
            }
            .into());
        }

        for sensor_id in scenario.referenced_sensors() {
            match self.store.find_sensor(sensor_id).await? {
                None => {
                    return Err(ValidationError::UnknownSensor {
                        scenario: scenario.name.clone(),
                        sensor_id: sensor_id.to_string(),
                    }
                    .into())
                }
                Some(entry) if entry.hub_id != scenario.hub_id => {
                    return Err(ValidationError::ForeignSensor {
                        scenario: scenario.name.clone(),
                        hub_id: scenario.hub_id.clone(),
                        sensor_id: sensor_id.to_string(),
                        sensor_hub_id: entry.hub_id,
                    }
                    .into())
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::store::InMemoryScenarioStore;
    use hub_core::{ActionType, ConditionOperation, ConditionType};

    async fn service_with_sensors() -> (ScenarioService, Arc<InMemoryScenarioStore>) {
        let store = Arc::new(InMemoryScenarioStore::new());
        let service = ScenarioService::new(store.clone());
        service
            .add_sensor("h1", "s1", DeviceType::SwitchSensor)
            .await
            .unwrap();
        service
            .add_sensor("h1", "s2", DeviceType::SwitchSensor)
            .await
            .unwrap();
        service
            .add_sensor("h2", "s9", DeviceType::LightSensor)
            .await
            .unwrap();
        (service, store)
    }

    fn switch_on(sensor_id: &str) -> Vec<ScenarioCondition> {
        vec![ScenarioCondition::new(
            sensor_id,
            ConditionType::Switch,
            ConditionOperation::Equals,
            1,
        )]
    }

    fn activate(sensor_id: &str) -> Vec<ScenarioAction> {
        vec![ScenarioAction::new(sensor_id, ActionType::Activate, 0)]
    }

    #[tokio::test]
    async fn test_add_scenario() {
        let (service, store) = service_with_sensors().await;
        service
            .add_scenario("h1", "lights", switch_on("s1"), activate("s2"))
            .await
            .unwrap();

        let scenarios = store.find_scenarios_by_hub("h1").await.unwrap();
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].actions[0].sensor_id, "s2");
    }

    #[tokio::test]
    async fn test_add_scenario_replaces_existing() {
        let (service, store) = service_with_sensors().await;
        service
            .add_scenario("h1", "lights", switch_on("s1"), activate("s2"))
            .await
            .unwrap();
        service
            .add_scenario("h1", "lights", switch_on("s2"), activate("s1"))
            .await
            .unwrap();

        assert_eq!(store.scenario_count(), 1);
        let scenarios = store.find_scenarios_by_hub("h1").await.unwrap();
        assert_eq!(scenarios[0].conditions[0].sensor_id, "s2");
    }

    #[tokio::test]
    async fn test_rejects_unknown_sensor() {
        let (service, store) = service_with_sensors().await;
        let err = service
            .add_scenario("h1", "lights", switch_on("s1"), activate("ghost"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Validation(ValidationError::UnknownSensor { ref sensor_id, .. })
                if sensor_id == "ghost"
        ));
        assert_eq!(store.scenario_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_foreign_sensor() {
        let (service, _) = service_with_sensors().await;
        let err = service
            .add_scenario("h1", "lights", switch_on("s9"), activate("s2"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RegistryError::Validation(ValidationError::ForeignSensor { ref sensor_hub_id, .. })
                if sensor_hub_id == "h2"
        ));
    }

    #[tokio::test]
    async fn test_rejects_empty_name() {
        let (service, _) = service_with_sensors().await;
        let err = service
            .add_scenario("h1", "  ", switch_on("s1"), activate("s2"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Validation(ValidationError::EmptyName { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_absent_is_ok() {
        let (service, store) = service_with_sensors().await;
        service.remove_scenario("h1", "missing").await.unwrap();
        service.remove_sensor("h1", "missing").await.unwrap();

        service.remove_sensor("h1", "s1").await.unwrap();
        assert_eq!(store.sensor_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_scenario() {
        let (service, store) = service_with_sensors().await;
        service
            .add_scenario("h1", "lights", switch_on("s1"), activate("s2"))
            .await
            .unwrap();
        service.remove_scenario("h1", "lights").await.unwrap();
        assert!(store.find_scenarios_by_hub("h1").await.unwrap().is_empty());
    }
}
