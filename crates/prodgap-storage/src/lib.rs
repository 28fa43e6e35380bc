//! SQLite persistence for the production monitoring backend.
//!
//! [`ProductionStore`] owns a single connection to `production.db` and
//! exposes CRUD plus filtered, paginated queries over the asset hierarchy,
//! equipment network, performance samples, thresholds, alerts and downtime
//! events. Timestamps are stored as Unix milliseconds.

pub mod error;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::{Result, StorageError};
pub use store::{
    AlertDashboard, AlertFilter, DowntimeFilter, EquipmentAlertCount, EquipmentFilter,
    ProductionImpact, ProductionStore, ThresholdFilter,
};
