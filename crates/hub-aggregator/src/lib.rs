//! Snapshot aggregation for the hub pipeline
//!
//! This crate provides the [`SnapshotAggregator`], which folds out-of-order,
//! possibly duplicated sensor readings into one snapshot per hub, and the
//! [`SensorEventHandler`] that publishes every changed snapshot downstream.

mod aggregator;
mod handler;

pub use aggregator::{MergeOutcome, SnapshotAggregator};
pub use handler::SensorEventHandler;
