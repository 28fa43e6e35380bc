use crate::error::{AdapterError, Result};
use crate::{HistorianConfig, Historian, StreamValue};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;

const ADAPTER_NAME: &str = "pi_web_api";

/// Historian adapter over PI Web API.
///
/// Streams are addressed by WebId. Basic auth is used when a username is
/// configured; otherwise requests are sent unauthenticated (e.g. behind a
/// gateway that injects credentials).
pub struct PiWebApiAdapter {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PiValue {
    timestamp: DateTime<Utc>,
    value: serde_json::Value,
    #[serde(default)]
    units_abbreviation: Option<String>,
    #[serde(default = "default_good")]
    good: bool,
}

fn default_good() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PiItems {
    #[serde(default)]
    items: Vec<PiValue>,
}

impl From<PiValue> for StreamValue {
    fn from(v: PiValue) -> Self {
        StreamValue {
            timestamp: v.timestamp,
            value: v.value,
            units: v.units_abbreviation.filter(|u| !u.is_empty()),
            good: v.good,
        }
    }
}

impl PiWebApiAdapter {
    pub fn new(config: HistorianConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(AdapterError::Config(
                "adapters.historian.base_url must not be empty".to_string(),
            ));
        }
        Ok(Self {
            base_url,
            username: config.username,
            password: config.password,
            client: crate::http_client(config.timeout_secs)?,
        })
    }

    pub fn stream_url(&self, web_id: &str, resource: &str) -> String {
        format!("{}/streams/{}/{}", self.base_url, web_id, resource)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self.client.get(url).query(query);
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AdapterError::Http {
                adapter: ADAPTER_NAME.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn current_value(&self, web_id: &str) -> Result<StreamValue> {
        let value: PiValue = self.get_json(&self.stream_url(web_id, "value"), &[]).await?;
        Ok(value.into())
    }
}

#[async_trait::async_trait]
impl Historian for PiWebApiAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn current_values(&self, stream_ids: &[String]) -> Result<BTreeMap<String, StreamValue>> {
        let values =
            futures::future::try_join_all(stream_ids.iter().map(|id| self.current_value(id)))
                .await?;
        tracing::debug!(streams = stream_ids.len(), "Fetched current historian values");
        Ok(stream_ids.iter().cloned().zip(values).collect())
    }

    async fn recorded_values(
        &self,
        stream_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<StreamValue>> {
        let items: PiItems = self
            .get_json(
                &self.stream_url(stream_id, "recorded"),
                &[("startTime", start), ("endTime", end)],
            )
            .await?;
        Ok(items.items.into_iter().map(StreamValue::from).collect())
    }

    async fn stream_summary(
        &self,
        _stream_id: &str,
        _start: &str,
        _end: &str,
        _interval: &str,
    ) -> Result<serde_json::Value> {
        Err(AdapterError::unsupported(ADAPTER_NAME, "stream_summary"))
    }
}
