use crate::error::{AdapterError, Result};
use crate::{DocumentStore, DocumentStoreConfig};

const ADAPTER_NAME: &str = "sharepoint_graph";

/// SharePoint lists and drives via Microsoft Graph (app-only auth).
///
/// Token acquisition is not wired up; every capability is unsupported.
pub struct SharePointGraphAdapter {
    tenant_id: String,
    #[allow(dead_code)]
    client_id: String,
    #[allow(dead_code)]
    client_secret: String,
}

impl SharePointGraphAdapter {
    pub fn new(config: DocumentStoreConfig) -> Result<Self> {
        if config.tenant_id.is_empty() || config.client_id.is_empty() {
            return Err(AdapterError::Config(
                "adapters.documents requires tenant_id and client_id".to_string(),
            ));
        }
        Ok(Self {
            tenant_id: config.tenant_id,
            client_id: config.client_id,
            client_secret: config.client_secret,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

#[async_trait::async_trait]
impl DocumentStore for SharePointGraphAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn list_items(
        &self,
        _site_id: &str,
        _list_id: &str,
        _select: Option<&str>,
        _filter: Option<&str>,
    ) -> Result<Vec<serde_json::Value>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "list_items"))
    }

    async fn download_file(&self, _drive_id: &str, _item_id: &str) -> Result<Vec<u8>> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "download_file"))
    }

    async fn delta(
        &self,
        _site_id: &str,
        _list_id: &str,
        _delta_link: Option<&str>,
    ) -> Result<serde_json::Value> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "delta"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tenant_is_rejected() {
        let err = SharePointGraphAdapter::new(DocumentStoreConfig {
            tenant_id: String::new(),
            client_id: "app".into(),
            client_secret: "secret".into(),
            timeout_secs: 30,
        })
        .err();
        assert!(matches!(err, Some(AdapterError::Config(_))));
    }

    #[tokio::test]
    async fn delta_is_unsupported() {
        let adapter = SharePointGraphAdapter::new(DocumentStoreConfig {
            tenant_id: "contoso".into(),
            client_id: "app".into(),
            client_secret: "secret".into(),
            timeout_secs: 30,
        })
        .unwrap();
        assert_eq!(adapter.tenant_id(), "contoso");
        assert!(matches!(
            adapter.delta("site", "list", None).await,
            Err(AdapterError::Unsupported { capability: "delta", .. })
        ));
    }
}
