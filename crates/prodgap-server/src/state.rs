use crate::config::ServerConfig;
use crate::service::ProductionService;
use chrono::{DateTime, Utc};
use prodgap_adapters::AdapterSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProductionService>,
    pub adapters: AdapterSet,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
