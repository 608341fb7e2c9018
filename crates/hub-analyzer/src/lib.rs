//! Rule engine for hub snapshots
//!
//! - [`evaluator`]: pure conjunctive evaluation of a scenario over a snapshot
//! - [`dispatcher`]: sends one command per scenario action to an [`Actuator`]
//! - [`hub_events`]: applies hub topology and scenario definitions to the registry
//! - [`snapshots`]: evaluates every scenario of a hub when its snapshot changes

pub mod dispatcher;
pub mod evaluator;
pub mod hub_events;
pub mod snapshots;

pub use dispatcher::{
    ActionDispatcher, Actuator, DispatchError, DispatchReport, DispatchResult, HttpActuator,
    LoggingActuator,
};
pub use evaluator::{evaluate_condition, observe, scenario_fires, ConditionOutcome};
pub use hub_events::HubEventHandler;
pub use snapshots::SnapshotHandler;
