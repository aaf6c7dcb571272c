//! JSON-RPC request handlers.

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slugdex_core::{SlugIndex, SlugdexError};
use std::sync::Arc;
use tracing::{debug, error, warn};

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const DEFAULT_LIST_LIMIT: i64 = 100;
const DEFAULT_MIN_SIMILARITY: f64 = 0.6;

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    match dispatch_method(&state.index, method, &params).await {
        Ok(value) => {
            let wrapped = wrap_response(method, value);
            (StatusCode::OK, Json(JsonRpcResponse::success(id, wrapped)))
        }
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}

// ============================================================================
// Helper macros for extracting parameters
// ============================================================================

/// Extract an optional string parameter, supporting both snake_case and camelCase.
macro_rules! get_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_str())
    };
}

/// Extract a required string parameter or return an error.
macro_rules! require_str_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        match get_str_param!($params, $snake, $camel) {
            Some(s) => s.to_string(),
            None => {
                return Err(SlugdexError::InvalidParams {
                    message: format!("Missing required parameter: {}", $snake),
                });
            }
        }
    };
}

/// Extract an optional bool parameter.
macro_rules! get_bool_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_bool())
    };
}

/// Extract an optional i64 parameter.
macro_rules! get_i64_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_i64())
    };
}

/// Extract an optional f64 parameter.
macro_rules! get_f64_param {
    ($params:expr, $snake:literal, $camel:literal) => {
        $params
            .get($snake)
            .or_else(|| $params.get($camel))
            .and_then(|v| v.as_f64())
    };
}

fn to_limit(value: i64) -> slugdex_core::Result<usize> {
    usize::try_from(value).map_err(|_| SlugdexError::InvalidParams {
        message: format!("limit must be non-negative, got {}", value),
    })
}

/// Run a blocking index call on the blocking thread pool.
async fn with_index<T, F>(index: &Arc<SlugIndex>, op: F) -> slugdex_core::Result<T>
where
    F: FnOnce(&SlugIndex) -> T + Send + 'static,
    T: Send + 'static,
{
    let index = Arc::clone(index);
    tokio::task::spawn_blocking(move || op(&index))
        .await
        .map_err(|e| SlugdexError::Other(format!("Index task failed: {}", e)))
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to the slug index.
async fn dispatch_method(
    index: &Arc<SlugIndex>,
    method: &str,
    params: &Value,
) -> slugdex_core::Result<Value> {
    match method {
        "search_slugs" => {
            let query = require_str_param!(params, "query", "query");
            let limit = to_limit(get_i64_param!(params, "limit", "limit").unwrap_or(DEFAULT_SEARCH_LIMIT))?;
            let fuzzy = get_bool_param!(params, "fuzzy", "fuzzy").unwrap_or(true);
            let results = with_index(index, move |index| index.search(&query, limit, fuzzy)).await?;
            Ok(json!(results))
        }

        "slug_exists" => {
            let slug = require_str_param!(params, "slug", "slug");
            let exists = with_index(index, move |index| index.exists(&slug)).await?;
            Ok(json!(exists))
        }

        "find_best_match" => {
            let query = require_str_param!(params, "query", "query");
            let min_similarity = get_f64_param!(params, "min_similarity", "minSimilarity")
                .unwrap_or(DEFAULT_MIN_SIMILARITY);
            let best = with_index(index, move |index| index.best_match(&query, min_similarity)).await?;
            Ok(json!(best))
        }

        "list_articles" => {
            let prefix = get_str_param!(params, "prefix", "prefix")
                .unwrap_or_default()
                .to_string();
            let limit = to_limit(get_i64_param!(params, "limit", "limit").unwrap_or(DEFAULT_LIST_LIMIT))?;
            let articles = with_index(index, move |index| index.list_by_prefix(&prefix, limit)).await?;
            Ok(json!(articles))
        }

        "total_count" => {
            let count = with_index(index, |index| index.total_count()).await?;
            Ok(json!(count))
        }

        "slug_lastmod" => {
            let slug = require_str_param!(params, "slug", "slug");
            let lastmod = with_index(index, move |index| index.lastmod(&slug)).await?;
            Ok(json!(lastmod))
        }

        "index_status" => {
            let status = with_index(index, |index| index.status()).await?;
            Ok(serde_json::to_value(status)?)
        }

        // Unknown method
        _ => {
            warn!("Method not found: {}", method);
            Err(SlugdexError::Other(format!("Method not found: {}", method)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
