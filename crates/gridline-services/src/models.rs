use gridline_core::{RowSnapshot, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Partial update of a single row: `PATCH /api/tables/{name}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Values taken from the snapshot at edit start, never the working copy
    #[serde(rename = "primary_key")]
    pub primary_key_values: IndexMap<String, Value>,
    /// Dirty columns only
    pub changes: IndexMap<String, Value>,
    /// Revision column value for optimistic concurrency
    #[serde(
        rename = "expected_updated_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub concurrency_token: Option<Value>,
}

/// Body returned by a successful row update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateResponse {
    #[serde(default)]
    pub data: Option<RowSnapshot>,
}

/// Composite device record: `GET /api/devices/{id}/details`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetails {
    #[serde(default)]
    pub device: RowSnapshot,
    #[serde(default)]
    pub characteristics: Vec<RowSnapshot>,
    #[serde(default)]
    pub related_devices: Vec<RowSnapshot>,
}

impl DeviceDetails {
    /// Identifier used in the device URLs (the `type` column)
    pub fn device_id(&self) -> Option<String> {
        match self.device.get("type") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(gridline_core::value::display_string(other)),
        }
    }
}

/// `PATCH /api/devices/{id}` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceUpdate {
    pub device: RowSnapshot,
    pub spec_sheet: RowSnapshot,
    /// Complete replacement list; empty clears all rows
    pub characteristics: Vec<RowSnapshot>,
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Flatten `detail` into display text.
    ///
    /// Validation errors arrive as a list of `{loc, msg, type}` objects; their
    /// messages are joined.
    pub fn into_message(self) -> Option<String> {
        match self.detail? {
            Value::String(s) => Some(s),
            Value::Array(items) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                if messages.is_empty() {
                    Some(Value::Array(items).to_string())
                } else {
                    Some(messages.join("; "))
                }
            }
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_request_wire_shape() {
        let request = SaveRequest {
            primary_key_values: IndexMap::from([("type".to_string(), json!("X1"))]),
            changes: IndexMap::from([("vdss_V".to_string(), json!(45))]),
            concurrency_token: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"primary_key": {"type": "X1"}, "changes": {"vdss_V": 45}})
        );

        let with_token = SaveRequest {
            concurrency_token: Some(json!("2024-05-01")),
            ..request
        };
        assert_eq!(
            serde_json::to_value(&with_token).unwrap()["expected_updated_at"],
            json!("2024-05-01")
        );
    }

    #[test]
    fn error_detail_flattening() {
        let body: ErrorBody = serde_json::from_value(json!({"detail": "No rows were updated."})).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("No rows were updated."));

        let body: ErrorBody = serde_json::from_value(json!({
            "detail": [{"loc": ["body", "changes"], "msg": "field required", "type": "missing"}]
        }))
        .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("field required"));

        let body: ErrorBody = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.into_message(), None);
    }

    #[test]
    fn device_id_comes_from_type_column() {
        let details: DeviceDetails = serde_json::from_value(json!({
            "device": {"type": "X1", "sheet_no": "S-01"},
            "characteristics": []
        }))
        .unwrap();
        assert_eq!(details.device_id().as_deref(), Some("X1"));
        assert!(details.related_devices.is_empty());
    }
}
