//! Hub event consumer: device membership and scenario definitions

use async_trait::async_trait;
use hub_core::{HubEvent, HubEventPayload};
use hub_event_log::{HandlerError, Record, RecordHandler};
use hub_registry::ScenarioService;
use tracing::debug;

/// Applies hub events to the registry
///
/// A rejected scenario definition fails only its own record; already loaded
/// scenarios are untouched.
pub struct HubEventHandler {
    service: ScenarioService,
}

impl HubEventHandler {
    pub fn new(service: ScenarioService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl RecordHandler for HubEventHandler {
    type Event = HubEvent;

    fn name(&self) -> &str {
        "hub-events"
    }

    async fn handle(&self, event: HubEvent, _record: &Record) -> Result<(), HandlerError> {
        debug!(hub_id = %event.hub_id, kind = event.payload.kind(), "Handling hub event");
        let hub_id = event.hub_id.as_str();

        match event.payload {
            HubEventPayload::DeviceAdded { id, device_type } => {
                self.service.add_sensor(hub_id, &id, device_type).await?
            }
            HubEventPayload::DeviceRemoved { id } => self.service.remove_sensor(hub_id, &id).await?,
            HubEventPayload::ScenarioAdded {
                name,
                conditions,
                actions,
            } => {
                self.service
                    .add_scenario(hub_id, &name, conditions, actions)
                    .await?
            }
            HubEventPayload::ScenarioRemoved { name } => {
                self.service.remove_scenario(hub_id, &name).await?
            }
        }
        Ok(())
    }
}
