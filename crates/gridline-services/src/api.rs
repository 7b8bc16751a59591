//! Backend access
//!
//! [`TableApi`] is the seam between the grid state machines and the REST
//! service. [`HttpTableApi`] is the reqwest implementation; tests substitute
//! their own.

use async_trait::async_trait;
use gridline_core::{
    Endpoint, FetchResponse, GridError, QueryParams, Result, RowSnapshot, TableList,
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::endpoints::{with_query, ApiBase};
use crate::models::{DeviceDetails, DeviceUpdate, ErrorBody, SaveRequest, UpdateResponse};

/// Operations the grid needs from the backend
#[async_trait]
pub trait TableApi: Send + Sync {
    /// `GET /api/tables`
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Paginated list read
    async fn fetch_page(&self, endpoint: &Endpoint, params: &QueryParams) -> Result<FetchResponse>;

    /// Partial update of one row; returns the refreshed row when the server sends it
    async fn update_row(
        &self,
        endpoint: &Endpoint,
        request: &SaveRequest,
    ) -> Result<Option<RowSnapshot>>;

    async fn device_details(&self, device_id: &str) -> Result<DeviceDetails>;

    async fn update_device(&self, device_id: &str, payload: &DeviceUpdate)
    -> Result<DeviceDetails>;
}

/// [`TableApi`] over HTTP
pub struct HttpTableApi {
    base: ApiBase,
    client: Client,
}

impl HttpTableApi {
    /// Create a client with the given request timeout
    pub fn new(base: ApiBase, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GridError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(base, client))
    }

    pub fn with_client(base: ApiBase, client: Client) -> Self {
        Self { base, client }
    }

    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| GridError::InvalidResponse(e.to_string()))
    }

    /// Split a failed response into status and server detail
    async fn failure(response: Response) -> (u16, Option<String>) {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && trimmed.len() <= 512).then(|| trimmed.to_string())
            });
        (status, detail)
    }

    async fn read_failure(response: Response) -> GridError {
        let (status, detail) = Self::failure(response).await;
        GridError::Http {
            status,
            detail: detail.unwrap_or_else(|| format!("Request failed with status {}", status)),
        }
    }

    async fn save_failure(response: Response) -> GridError {
        let (status, detail) = Self::failure(response).await;
        GridError::from_save_status(status, detail)
    }
}

fn transport(e: reqwest::Error) -> GridError {
    GridError::Transport(e.to_string())
}

#[async_trait]
impl TableApi for HttpTableApi {
    #[tracing::instrument(skip(self))]
    async fn list_tables(&self) -> Result<Vec<String>> {
        let url = self.base.tables_url()?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }
        let list: TableList = Self::decode(response).await?;
        tracing::debug!(tables = list.tables.len(), "Loaded table list");
        Ok(list.tables)
    }

    #[tracing::instrument(skip(self, params), fields(endpoint = %endpoint.label()))]
    async fn fetch_page(&self, endpoint: &Endpoint, params: &QueryParams) -> Result<FetchResponse> {
        let url = with_query(self.base.endpoint_url(endpoint)?, params);
        tracing::debug!(url = %url, "Fetching page");

        let response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            let err = Self::read_failure(response).await;
            tracing::warn!(error = %err, "Page fetch failed");
            return Err(err);
        }
        Self::decode(response).await
    }

    #[tracing::instrument(skip(self, request), fields(endpoint = %endpoint.label()))]
    async fn update_row(
        &self,
        endpoint: &Endpoint,
        request: &SaveRequest,
    ) -> Result<Option<RowSnapshot>> {
        let url = self.base.endpoint_url(endpoint)?;
        let response = self
            .client
            .patch(url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let err = Self::save_failure(response).await;
            tracing::warn!(error = %err, "Row update rejected");
            return Err(err);
        }

        // The save was accepted; an unreadable body only costs the echoed row.
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<UpdateResponse>(&body) {
            Ok(parsed) => Ok(parsed.data),
            Err(err) => {
                tracing::debug!(error = %err, "Row update body not decoded; row will be refetched");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn device_details(&self, device_id: &str) -> Result<DeviceDetails> {
        let url = self.base.device_details_url(device_id)?;
        let response = self.client.get(url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }
        Self::decode(response).await
    }

    #[tracing::instrument(skip(self, payload))]
    async fn update_device(
        &self,
        device_id: &str,
        payload: &DeviceUpdate,
    ) -> Result<DeviceDetails> {
        let url = self.base.device_url(device_id)?;
        let response = self
            .client
            .patch(url)
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let err = Self::save_failure(response).await;
            tracing::warn!(error = %err, "Device update rejected");
            return Err(err);
        }
        Self::decode(response).await
    }
}
