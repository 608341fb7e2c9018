//! Sensor registry and scenario store
//!
//! This crate is the persistence boundary of the pipeline:
//! - [`ScenarioStore`] is the narrow load/save contract the rule engine and
//!   the hub event consumer depend on
//! - [`InMemoryScenarioStore`] implements it with concurrent maps and
//!   optional JSON persistence in the `.storage/` directory
//! - [`ScenarioService`] validates and applies hub definition changes

pub mod error;
pub mod service;
pub mod storage;
pub mod store;

pub use error::{RegistryError, RegistryResult, StoreError, StoreResult, ValidationError};
pub use service::ScenarioService;
pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
pub use store::{InMemoryScenarioStore, RegistryData, ScenarioStore};
