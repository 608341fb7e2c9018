//! Pipeline assembly and lifecycle

use std::sync::Arc;

use anyhow::{Context, Result};
use hub_aggregator::{SensorEventHandler, SnapshotAggregator};
use hub_analyzer::{
    ActionDispatcher, Actuator, HttpActuator, HubEventHandler, LoggingActuator, SnapshotHandler,
};
use hub_config::{ActuatorConfig, AppConfig};
use hub_event_log::{
    ConsumerLoop, EventConsumer, LoopStats, MemoryConsumer, MemoryLog, MemoryProducer,
    RecordHandler, Shutdown,
};
use hub_registry::{InMemoryScenarioStore, ScenarioService, Storage};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Pick the actuator the configuration asks for
pub fn actuator_from_config(config: &ActuatorConfig) -> Result<Arc<dyn Actuator>> {
    match &config.endpoint {
        Some(endpoint) => {
            let actuator = HttpActuator::new(endpoint.clone(), config.request_timeout())
                .context("failed to create HTTP actuator")?;
            info!("Dispatching device actions to {}", actuator.endpoint());
            Ok(Arc::new(actuator))
        }
        None => {
            info!("No actuator endpoint configured, device actions are only logged");
            Ok(Arc::new(LoggingActuator))
        }
    }
}

/// The components shared by the consumer loops
pub struct Pipeline {
    config: AppConfig,
    log: Arc<MemoryLog>,
    store: Arc<InMemoryScenarioStore>,
    aggregator: Arc<SnapshotAggregator>,
    actuator: Arc<dyn Actuator>,
    shutdown: Shutdown,
}

impl Pipeline {
    /// Assemble a pipeline; the registry persists under `config.storage_dir`
    pub fn new(config: AppConfig, actuator: Arc<dyn Actuator>) -> Self {
        let storage = Arc::new(Storage::new(&config.storage_dir));
        Self {
            log: Arc::new(MemoryLog::with_partitions(config.log.partitions)),
            store: Arc::new(InMemoryScenarioStore::with_storage(storage)),
            aggregator: Arc::new(SnapshotAggregator::new()),
            actuator,
            shutdown: Shutdown::new(),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<MemoryLog> {
        &self.log
    }

    pub fn store(&self) -> &Arc<InMemoryScenarioStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &Arc<SnapshotAggregator> {
        &self.aggregator
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Producer for feeding external input into the log
    pub fn producer(&self) -> MemoryProducer {
        self.log.producer()
    }

    /// Load the registry from storage
    pub async fn load_registry(&self) -> Result<()> {
        self.store
            .load()
            .await
            .context("failed to load scenario registry")?;
        info!(
            "Registry holds {} sensors and {} scenarios",
            self.store.sensor_count(),
            self.store.scenario_count()
        );
        Ok(())
    }

    /// Save the registry to storage
    pub async fn save_registry(&self) -> Result<()> {
        self.store
            .save()
            .await
            .context("failed to save scenario registry")
    }

    /// Start the three consumer loops
    pub fn spawn(&self) -> RunningPipeline {
        let topics = &self.config.topics;
        let groups = &self.config.consumer.groups;

        let sensors = SensorEventHandler::new(
            self.aggregator.clone(),
            Arc::new(self.log.producer()),
            topics.snapshots.clone(),
        );
        let hub_events = HubEventHandler::new(ScenarioService::new(self.store.clone()));
        let snapshots = SnapshotHandler::new(
            self.store.clone(),
            ActionDispatcher::new(self.actuator.clone()),
        );

        let loops = vec![
            self.spawn_loop(self.consumer(&groups.aggregator, &topics.sensors), sensors),
            self.spawn_loop(self.consumer(&groups.hub_events, &topics.hubs), hub_events),
            self.spawn_loop(self.consumer(&groups.snapshots, &topics.snapshots), snapshots),
        ];
        info!("Started {} consumer loops", loops.len());

        RunningPipeline {
            loops,
            shutdown: self.shutdown.clone(),
        }
    }

    fn consumer(&self, group: &str, topic: &str) -> MemoryConsumer {
        self.log.consumer(group, topic, self.config.consumer.max_batch)
    }

    fn spawn_loop<C, H>(&self, consumer: C, handler: H) -> (String, LoopHandle)
    where
        C: EventConsumer + 'static,
        H: RecordHandler + 'static,
    {
        let name = handler.name().to_string();
        let worker = ConsumerLoop::new(
            consumer,
            handler,
            self.shutdown.clone(),
            self.config.consumer.poll_timeout(),
        );
        let task = tokio::spawn(worker.run());

        // A fatal failure or panic of one loop stops the others
        let shutdown = self.shutdown.clone();
        let loop_name = name.clone();
        let handle = tokio::spawn(async move {
            let result = match task.await {
                Ok(Ok(stats)) => return Ok(stats),
                Ok(Err(e)) => anyhow::Error::new(e),
                Err(e) => anyhow::anyhow!("{}: task failed: {}", loop_name, e),
            };
            error!("Consumer loop failed: {}", result);
            shutdown.request();
            Err(result)
        });
        (name, handle)
    }
}

type LoopHandle = JoinHandle<Result<LoopStats>>;

/// Handles of the running consumer loops
pub struct RunningPipeline {
    loops: Vec<(String, LoopHandle)>,
    shutdown: Shutdown,
}

impl RunningPipeline {
    /// Request shutdown and wait for every loop
    pub async fn stop(self) -> Result<Vec<(String, LoopStats)>> {
        self.shutdown.request();
        self.join().await
    }

    /// Wait for every loop to stop
    ///
    /// Fails if any loop ended with a fatal error or panicked.
    pub async fn join(self) -> Result<Vec<(String, LoopStats)>> {
        let mut stats = Vec::with_capacity(self.loops.len());
        let mut failures = Vec::new();

        for (name, handle) in self.loops {
            match handle.await {
                Ok(Ok(loop_stats)) => {
                    info!(
                        consumer = %name,
                        batches = loop_stats.batches,
                        processed = loop_stats.processed,
                        failed = loop_stats.failed,
                        "Consumer loop stopped"
                    );
                    stats.push((name, loop_stats));
                }
                Ok(Err(e)) => failures.push(e.to_string()),
                Err(e) => failures.push(format!("{}: task failed: {}", name, e)),
            }
        }

        if failures.is_empty() {
            Ok(stats)
        } else {
            anyhow::bail!("consumer loops failed: {}", failures.join("; "))
        }
    }
}
