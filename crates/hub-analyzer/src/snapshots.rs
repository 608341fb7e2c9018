//! Snapshot consumer: evaluate and dispatch

use std::sync::Arc;

use async_trait::async_trait;
use hub_core::HubSnapshot;
use hub_event_log::{HandlerError, Record, RecordHandler};
use hub_registry::ScenarioStore;
use tracing::{debug, info, instrument};

use crate::dispatcher::ActionDispatcher;
use crate::evaluator::scenario_fires;

/// Evaluates every scenario of the snapshot's hub and dispatches those that fire
pub struct SnapshotHandler {
    store: Arc<dyn ScenarioStore>,
    dispatcher: ActionDispatcher,
}

impl SnapshotHandler {
    pub fn new(store: Arc<dyn ScenarioStore>, dispatcher: ActionDispatcher) -> Self {
        Self { store, dispatcher }
    }
}

#[async_trait]
impl RecordHandler for SnapshotHandler {
    type Event = HubSnapshot;

    fn name(&self) -> &str {
        "snapshots"
    }

    #[instrument(skip_all, fields(hub_id = %snapshot.hub_id))]
    async fn handle(&self, snapshot: HubSnapshot, _record: &Record) -> Result<(), HandlerError> {
        let scenarios = self.store.find_scenarios_by_hub(&snapshot.hub_id).await?;
        debug!(
            "Evaluating {} scenarios over {} sensors",
            scenarios.len(),
            snapshot.sensor_count()
        );

        for scenario in scenarios.iter().filter(|s| scenario_fires(s, &snapshot)) {
            let report = self.dispatcher.execute(scenario).await;
            info!(
                scenario = %scenario.name,
                sent = report.sent,
                failed = report.failed,
                "Scenario fired"
            );
        }
        Ok(())
    }
}
