//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use gridline_core::{
    Endpoint, FetchResponse, GridError, QueryParams, Result, RowSnapshot,
};
use gridline_services::{DeviceDetails, DeviceUpdate, SaveRequest, TableApi};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;

/// Mock backend for driving the grid without a server.
///
/// Fetches return scripted responses in order, then fall back to the default
/// page. Every call is logged for assertions.
pub struct MockTableApi {
    pub tables: Vec<String>,
    pub default_page: FetchResponse,
    pub scripted_pages: Mutex<VecDeque<Result<FetchResponse>>>,
    pub update_results: Mutex<VecDeque<Result<Option<RowSnapshot>>>>,
    pub device: Mutex<Option<DeviceDetails>>,
    pub fetch_log: Arc<Mutex<Vec<(Endpoint, QueryParams)>>>,
    pub update_log: Arc<Mutex<Vec<(Endpoint, SaveRequest)>>>,
    pub device_update_log: Arc<Mutex<Vec<(String, DeviceUpdate)>>>,
}

impl MockTableApi {
    pub fn new() -> Self {
        Self {
            tables: vec![],
            default_page: FetchResponse::default(),
            scripted_pages: Mutex::new(VecDeque::new()),
            update_results: Mutex::new(VecDeque::new()),
            device: Mutex::new(None),
            fetch_log: Arc::new(Mutex::new(Vec::new())),
            update_log: Arc::new(Mutex::new(Vec::new())),
            device_update_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tables(mut self, tables: &[&str]) -> Self {
        self.tables = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_default_page(mut self, page: FetchResponse) -> Self {
        self.default_page = page;
        self
    }

    pub fn with_page(self, page: FetchResponse) -> Self {
        self.scripted_pages.lock().push_back(Ok(page));
        self
    }

    pub fn with_fetch_failure(self, error: GridError) -> Self {
        self.scripted_pages.lock().push_back(Err(error));
        self
    }

    pub fn with_update_result(self, result: Result<Option<RowSnapshot>>) -> Self {
        self.update_results.lock().push_back(result);
        self
    }

    pub fn with_device(self, details: DeviceDetails) -> Self {
        *self.device.lock() = Some(details);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_log.lock().len()
    }

    pub fn fetches(&self) -> Vec<(Endpoint, QueryParams)> {
        self.fetch_log.lock().clone()
    }

    pub fn updates(&self) -> Vec<(Endpoint, SaveRequest)> {
        self.update_log.lock().clone()
    }

    pub fn device_updates(&self) -> Vec<(String, DeviceUpdate)> {
        self.device_update_log.lock().clone()
    }
}

#[async_trait]
impl TableApi for MockTableApi {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }

    async fn fetch_page(&self, endpoint: &Endpoint, params: &QueryParams) -> Result<FetchResponse> {
        self.fetch_log.lock().push((endpoint.clone(), params.clone()));
        match self.scripted_pages.lock().pop_front() {
            Some(result) => result,
            None => Ok(self.default_page.clone()),
        }
    }

    async fn update_row(
        &self,
        endpoint: &Endpoint,
        request: &SaveRequest,
    ) -> Result<Option<RowSnapshot>> {
        self.update_log.lock().push((endpoint.clone(), request.clone()));
        match self.update_results.lock().pop_front() {
            Some(result) => result,
            None => Ok(None),
        }
    }

    async fn device_details(&self, device_id: &str) -> Result<DeviceDetails> {
        self.device.lock().clone().ok_or_else(|| GridError::Http {
            status: 404,
            detail: format!("Device '{}' not found", device_id),
        })
    }

    async fn update_device(&self, device_id: &str, payload: &DeviceUpdate) -> Result<DeviceDetails> {
        self.device_update_log
            .lock()
            .push((device_id.to_string(), payload.clone()));

        let mut stored = self.device.lock();
        let details = stored.get_or_insert_with(DeviceDetails::default);
        for (field, value) in payload.device.iter().chain(payload.spec_sheet.iter()) {
            details.device.insert(field.clone(), value.clone());
        }
        details.characteristics = payload.characteristics.clone();
        Ok(details.clone())
    }
}

pub fn row(value: serde_json::Value) -> RowSnapshot {
    serde_json::from_value(value).expect("row literal must be an object")
}

/// One page of the devices table keyed by `type`
pub fn devices_page(vdss: i64) -> FetchResponse {
    FetchResponse {
        data: Some(vec![
            row(json!({"type": "X1", "vdss_V": vdss, "status": "active"})),
            row(json!({"type": "X2", "vdss_V": 60, "status": "retired"})),
        ]),
        total: Some(2),
        total_pages: Some(1),
        primary_keys: Some(vec!["type".to_string()]),
    }
}

/// A devices page claiming `total_pages` pages of 100 rows
pub fn paged_devices(total_pages: u64) -> FetchResponse {
    FetchResponse {
        total: Some(total_pages * 100),
        total_pages: Some(total_pages),
        ..devices_page(30)
    }
}

pub fn mock_api() -> Arc<MockTableApi> {
    Arc::new(MockTableApi::new().with_default_page(devices_page(30)))
}
