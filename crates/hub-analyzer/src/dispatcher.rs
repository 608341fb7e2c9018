//! Device action dispatch
//!
//! Each scenario action becomes one [`DeviceActionRequest`] sent to the
//! actuation endpoint. Actions are attempted independently: a failed send is
//! logged and the remaining actions still go out. There is no retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use hub_core::{DeviceActionRequest, Scenario};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Actuation failures
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} rejected action with status {status}")]
    Rejected { endpoint: String, status: u16 },
}

/// Result type for actuation
pub type DispatchResult<T> = Result<T, DispatchError>;

/// External endpoint that carries out device actions
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn handle_device_action(&self, request: &DeviceActionRequest) -> DispatchResult<()>;
}

/// Actuator posting each request as JSON to an HTTP endpoint
pub struct HttpActuator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpActuator {
    /// Create an actuator with a per-request timeout
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> DispatchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(DispatchError::Client)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Actuator for HttpActuator {
    async fn handle_device_action(&self, request: &DeviceActionRequest) -> DispatchResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    DispatchError::Timeout {
                        endpoint: self.endpoint.clone(),
                    }
                } else {
                    DispatchError::Transport {
                        endpoint: self.endpoint.clone(),
                        source,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Actuator used when no endpoint is configured; only logs requests
#[derive(Debug, Default)]
pub struct LoggingActuator;

#[async_trait]
impl Actuator for LoggingActuator {
    async fn handle_device_action(&self, request: &DeviceActionRequest) -> DispatchResult<()> {
        info!(
            hub_id = %request.hub_id,
            scenario = %request.scenario_name,
            sensor_id = %request.action.sensor_id,
            action = ?request.action.action_type,
            value = request.action.value,
            "Device action (no actuation endpoint configured)"
        );
        Ok(())
    }
}

/// Outcome of dispatching one scenario
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends the actions of fired scenarios
#[derive(Clone)]
pub struct ActionDispatcher {
    actuator: Arc<dyn Actuator>,
}

impl ActionDispatcher {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }

    /// Send every action of `scenario`, in order
    #[instrument(skip_all, fields(hub_id = %scenario.hub_id, scenario = %scenario.name))]
    pub async fn execute(&self, scenario: &Scenario) -> DispatchReport {
        let timestamp = Utc::now();
        let mut report = DispatchReport::default();

        for action in &scenario.actions {
            let request = DeviceActionRequest {
                hub_id: scenario.hub_id.clone(),
                scenario_name: scenario.name.clone(),
                action: action.clone(),
                timestamp,
            };
            match self.actuator.handle_device_action(&request).await {
                Ok(()) => {
                    debug!(
                        sensor_id = %action.sensor_id,
                        action = ?action.action_type,
                        "Device action sent"
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        sensor_id = %action.sensor_id,
                        action = ?action.action_type,
                        "Device action failed: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}
