//! Smarthub server wiring
//!
//! Builds the three consumer loops over one in-process event log:
//!
//! ```text
//! stdin ─▶ sensors ─▶ aggregator ─▶ snapshots ─▶ rule engine ─▶ actuator
//! stdin ─▶ hubs ─────▶ registry ◀────────────────┘
//! ```

pub mod ingest;
pub mod pipeline;

pub use ingest::{ingest_line, ingest_stream, IngestError, IngestStats, Ingested};
pub use pipeline::{actuator_from_config, Pipeline, RunningPipeline};
