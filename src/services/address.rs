//! Address book API client

use super::{AddressClient, ServiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Address book entry; fields the renderer does not know are kept as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct AddressService {
    client: Client,
    base_url: Option<String>,
}

impl AddressService {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> Result<String, ServiceError> {
        self.base_url
            .as_deref()
            .map(|base| format!("{base}/api/addresses{path}"))
            .ok_or_else(|| ServiceError::not_configured("Address"))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::transport(&e))?;

        if !status.is_success() {
            let err = ServiceError::from_response(status, &body);
            tracing::warn!(url, status = %status, error = %err, "Address API call failed");
            return Err(err);
        }

        serde_json::from_str(&body)
            .map_err(|e| ServiceError::Upstream(format!("Invalid address response: {e}")))
    }
}

#[async_trait]
impl AddressClient for AddressService {
    async fn list_addresses(&self) -> Result<Vec<Address>, ServiceError> {
        let url = self.url("")?;
        self.get_json(&url, &[]).await
    }

    async fn search_addresses(&self, query: &str) -> Result<Vec<Address>, ServiceError> {
        let url = self.url("/search")?;
        self.get_json(&url, &[("q", query)]).await
    }
}
