use crate::error::{AdapterError, Result};
use crate::{
    FacilityKpis, GapDriver, HubPerformancePoint, ProductionAdapterConfig, ProductionDataSource,
    TerminalKpis,
};
use prodgap_common::types::{Asset, Facility, Hub, NetworkType};
use reqwest::Client;

const ADAPTER_NAME: &str = "ec_rest";

/// Production data over the Energy Components REST API.
///
/// The endpoint contract is not fixed yet, so every capability reports
/// [`AdapterError::Unsupported`] and callers fall back to degraded payloads.
pub struct EcRestAdapter {
    #[allow(dead_code)]
    base_url: String,
    #[allow(dead_code)]
    client: Client,
}

impl EcRestAdapter {
    pub fn new(config: ProductionAdapterConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AdapterError::Config(
                "adapters.production.base_url must not be empty".to_string(),
            ));
        }
        Ok(Self {
            base_url,
            client: crate::http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait::async_trait]
impl ProductionDataSource for EcRestAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn assets(&self) -> Result<Vec<Asset>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "assets"))
    }

    async fn hubs(&self, _asset_id: &str) -> Result<Vec<Hub>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "hubs"))
    }

    async fn facilities(&self, _hub_id: &str) -> Result<Vec<Facility>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "facilities"))
    }

    async fn facility_kpis(
        &self,
        _facility_id: &str,
        _networks: &[NetworkType],
    ) -> Result<FacilityKpis> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "facility_kpis"))
    }

    async fn gap_drivers(
        &self,
        _asset_id: Option<&str>,
        _facility_ids: &[String],
        _window: &str,
    ) -> Result<Vec<GapDriver>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "gap_drivers"))
    }

    async fn terminal_kpis(&self, _terminal_id: &str) -> Result<TerminalKpis> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "terminal_kpis"))
    }

    async fn hub_performance(
        &self,
        _hub_id: &str,
        _window: &str,
    ) -> Result<Vec<HubPerformancePoint>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "hub_performance"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_capability_is_unsupported() {
        let adapter = EcRestAdapter::new(ProductionAdapterConfig {
            base_url: "https://ec.example.com/api".into(),
            client_id: None,
            client_secret: None,
            scope: None,
            timeout_secs: 5,
        })
        .unwrap();

        assert!(matches!(
            adapter.assets().await,
            Err(AdapterError::Unsupported { capability: "assets", .. })
        ));
        assert!(matches!(
            adapter.facility_kpis("FAC-1", &[NetworkType::Oil]).await,
            Err(AdapterError::Unsupported { capability: "facility_kpis", .. })
        ));
        assert!(matches!(
            adapter.gap_drivers(None, &[], "24h").await,
            Err(AdapterError::Unsupported { capability: "gap_drivers", .. })
        ));
    }
}
