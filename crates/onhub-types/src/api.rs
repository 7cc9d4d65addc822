use serde::{Deserialize, Serialize};
use serde_json::Value;

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: String,
    pub token: String,
}

// -- Bulk sync --

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncRequest {
    pub table: String,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub synced: usize,
    pub errors: usize,
    pub total: usize,
}

// -- CORS proxy --

/// Body of `POST /api/wp-proxy`. Field names match the browser client's
/// camelCase payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub wp_url: String,
    pub wp_api_key: String,
    /// Path under `/wp-json/onhub/v1/`, e.g. `folders` or `files/abc123`.
    pub endpoint: String,
    pub method: String,
    pub data: Option<Value>,
}

// -- Errors --

/// Normalized error body returned by the server and the proxy route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        ErrorBody {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}
