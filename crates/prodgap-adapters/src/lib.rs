//! Capability interfaces for the external systems the backend can read from.
//!
//! Three capabilities are modelled, each as its own trait:
//!
//! - [`ProductionDataSource`]: hierarchy and production KPIs held by the
//!   production accounting system (Energy Components).
//! - [`Historian`]: time-series tags (PI Web API).
//! - [`DocumentStore`]: lists and files (SharePoint via Microsoft Graph).
//!
//! Adapters are built from [`AdaptersConfig`] by [`build_adapters`]. A
//! capability an adapter does not implement returns
//! [`AdapterError::Unsupported`](error::AdapterError::Unsupported).

pub mod ec_rest;
pub mod error;
pub mod pi_web_api;
pub mod sharepoint_graph;

use chrono::{DateTime, Utc};
use prodgap_common::types::{Asset, Facility, Hub, NetworkType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use error::{AdapterError, Result};

// ---- Payloads ----

/// KPI figures for one network of a facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkKpi {
    pub max_capacity: Option<f64>,
    pub business_target: Option<f64>,
    pub current_production: Option<f64>,
    pub deferment: Option<f64>,
}

/// Facility KPIs keyed by network type name.
pub type FacilityKpis = BTreeMap<String, NetworkKpi>;

/// One contributor to production deferment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapDriver {
    pub facility_id: String,
    pub equipment_id: Option<String>,
    pub cause: String,
    pub deferment: f64,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalKpis {
    pub max_capacity: Option<f64>,
    pub gross_stock: Option<f64>,
    pub ready_crude: Option<f64>,
    pub production_rate: Option<f64>,
    /// Days of storage left at the current production rate.
    pub endurance_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubPerformancePoint {
    pub timestamp: DateTime<Utc>,
    pub production: f64,
    pub target: Option<f64>,
}

/// A single historian value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamValue {
    pub timestamp: DateTime<Utc>,
    /// Numbers for analog tags, strings or objects for digital states.
    pub value: serde_json::Value,
    pub units: Option<String>,
    pub good: bool,
}

// ---- Capabilities ----

/// Production accounting data (hierarchy, KPIs, deferment).
#[async_trait::async_trait]
pub trait ProductionDataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn assets(&self) -> Result<Vec<Asset>>;

    async fn hubs(&self, asset_id: &str) -> Result<Vec<Hub>>;

    async fn facilities(&self, hub_id: &str) -> Result<Vec<Facility>>;

    async fn facility_kpis(&self, facility_id: &str, networks: &[NetworkType])
        -> Result<FacilityKpis>;

    /// Top deferment contributors in `window` (e.g. `24h`, `7d`).
    async fn gap_drivers(
        &self,
        asset_id: Option<&str>,
        facility_ids: &[String],
        window: &str,
    ) -> Result<Vec<GapDriver>>;

    async fn terminal_kpis(&self, terminal_id: &str) -> Result<TerminalKpis>;

    async fn hub_performance(&self, hub_id: &str, window: &str) -> Result<Vec<HubPerformancePoint>>;
}

/// Process historian access.
#[async_trait::async_trait]
pub trait Historian: Send + Sync {
    fn name(&self) -> &str;

    /// Latest value of each stream, keyed by stream id.
    async fn current_values(&self, stream_ids: &[String]) -> Result<BTreeMap<String, StreamValue>>;

    /// Archived values in `[start, end]`.
    async fn recorded_values(
        &self,
        stream_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<StreamValue>>;

    async fn stream_summary(
        &self,
        stream_id: &str,
        start: &str,
        end: &str,
        interval: &str,
    ) -> Result<serde_json::Value>;
}

/// Document and list storage.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    async fn list_items(
        &self,
        site_id: &str,
        list_id: &str,
        select: Option<&str>,
        filter: Option<&str>,
    ) -> Result<Vec<serde_json::Value>>;

    async fn download_file(&self, drive_id: &str, item_id: &str) -> Result<Vec<u8>>;

    /// Incremental changes since `delta_link`, or a full initial page.
    async fn delta(
        &self,
        site_id: &str,
        list_id: &str,
        delta_link: Option<&str>,
    ) -> Result<serde_json::Value>;
}

// ---- Configuration ----

fn default_timeout_secs() -> u64 {
    30
}

/// `[adapters.production]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionAdapterConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[adapters.historian]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorianConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[adapters.documents]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// `[adapters]`; every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaptersConfig {
    pub production: Option<ProductionAdapterConfig>,
    pub historian: Option<HistorianConfig>,
    pub documents: Option<DocumentStoreConfig>,
}

/// The configured adapters, one optional slot per capability.
#[derive(Clone, Default)]
pub struct AdapterSet {
    pub production: Option<Arc<dyn ProductionDataSource>>,
    pub historian: Option<Arc<dyn Historian>>,
    pub documents: Option<Arc<dyn DocumentStore>>,
}

impl AdapterSet {
    pub fn production(&self) -> Result<&dyn ProductionDataSource> {
        self.production
            .as_deref()
            .ok_or(AdapterError::NotConfigured("production"))
    }

    pub fn historian(&self) -> Result<&dyn Historian> {
        self.historian
            .as_deref()
            .ok_or(AdapterError::NotConfigured("historian"))
    }

    pub fn documents(&self) -> Result<&dyn DocumentStore> {
        self.documents
            .as_deref()
            .ok_or(AdapterError::NotConfigured("documents"))
    }

    /// Names of the configured adapters, for the health endpoint.
    pub fn configured(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(p) = &self.production {
            names.push(p.name().to_string());
        }
        if let Some(h) = &self.historian {
            names.push(h.name().to_string());
        }
        if let Some(d) = &self.documents {
            names.push(d.name().to_string());
        }
        names
    }
}

/// Build every adapter that has a configuration section.
///
/// # Errors
///
/// Returns [`AdapterError::Config`] if a section is invalid (e.g. an empty
/// base URL) or the HTTP client cannot be built.
pub fn build_adapters(config: &AdaptersConfig) -> Result<AdapterSet> {
    let mut set = AdapterSet::default();
    if let Some(cfg) = &config.production {
        set.production = Some(Arc::new(ec_rest::EcRestAdapter::new(cfg.clone())?));
        tracing::info!(base_url = %cfg.base_url, "Production data adapter configured");
    }
    if let Some(cfg) = &config.historian {
        set.historian = Some(Arc::new(pi_web_api::PiWebApiAdapter::new(cfg.clone())?));
        tracing::info!(base_url = %cfg.base_url, "Historian adapter configured");
    }
    if let Some(cfg) = &config.documents {
        set.documents = Some(Arc::new(sharepoint_graph::SharePointGraphAdapter::new(
            cfg.clone(),
        )?));
        tracing::info!(tenant_id = %cfg.tenant_id, "Document store adapter configured");
    }
    Ok(set)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AdapterError::Config(format!("failed to build HTTP client: {e}")))
}
