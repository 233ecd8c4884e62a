//! HTTP API
//!
//! - POST /rpc - JSON-RPC 2.0, method `swap.AdminCall`
//! - GET /swap/{direction}/{pair_id}/{txid}?bind= - Swap status
//! - GET /health - Health status (JSON)
//! - GET /metrics - Prometheus metrics

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::admin::AdminService;
use crate::metrics;
use crate::store::{StoreError, SwapKey, SwapStore};
use crate::swapapi::{convert_swap, convert_swap_result, SwapInfo};
use crate::tokens::BridgeRegistry;
use crate::types::SwapDirection;

pub const ADMIN_CALL_METHOD: &str = "swap.AdminCall";

const RPC_SERVER_ERROR: i64 = -32000;
const RPC_METHOD_NOT_FOUND: i64 = -32601;
const RPC_INVALID_PARAMS: i64 = -32602;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub admin: Arc<AdminService>,
    pub store: Arc<dyn SwapStore>,
    pub bridges: Arc<BridgeRegistry>,
    pub identifier: String,
}

// ============================================================================
// JSON-RPC
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    fn ok(id: Value, result: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code, message }),
        }
    }
}

async fn rpc_handler(State(state): State<AppState>, Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
    if req.method != ADMIN_CALL_METHOD {
        return Json(RpcResponse::err(
            req.id,
            RPC_METHOD_NOT_FOUND,
            format!("method '{}' not found", req.method),
        ));
    }

    let raw = match req.params.as_slice() {
        [Value::String(raw)] => raw,
        _ => {
            return Json(RpcResponse::err(
                req.id,
                RPC_INVALID_PARAMS,
                "expected a single raw transaction string".to_string(),
            ))
        }
    };

    match state.admin.admin_call(raw).await {
        Ok(result) => Json(RpcResponse::ok(req.id, result)),
        Err(e) => Json(RpcResponse::err(req.id, RPC_SERVER_ERROR, e.to_string())),
    }
}

// ============================================================================
// Swap Status
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SwapQuery {
    #[serde(default)]
    pub bind: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

async fn swap_handler(
    State(state): State<AppState>,
    Path((direction, pair_id, txid)): Path<(String, String, String)>,
    Query(query): Query<SwapQuery>,
) -> Response {
    let Some(direction) = SwapDirection::parse(&direction) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unknown direction '{}'", direction),
        );
    };
    let key = SwapKey::new(&txid, &pair_id, &query.bind);

    match lookup_swap(&state, direction, &key).await {
        Ok(Some(info)) => Json(info).into_response(),
        Ok(None) => {
            metrics::record_swap_query("missing");
            error_response(StatusCode::NOT_FOUND, format!("{} swap {} not found", direction, key))
        }
        Err(e) => {
            error!(key = %key, error = %e, "Swap lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Resulted view when the swap has a result, pending view otherwise
async fn lookup_swap(
    state: &AppState,
    direction: SwapDirection,
    key: &SwapKey,
) -> Result<Option<SwapInfo>, StoreError> {
    match state.store.find_swap_result(direction, key).await {
        Ok(result) => {
            metrics::record_swap_query("result");
            return Ok(Some(
                convert_swap_result(&result, state.bridges.as_ref()).await,
            ));
        }
        Err(StoreError::ResultNotFound { .. }) => {}
        Err(e) => return Err(e),
    }
    match state.store.find_swap(direction, key).await {
        Ok(swap) => {
            metrics::record_swap_query("pending");
            Ok(Some(convert_swap(&swap)))
        }
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Health & Metrics
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub identifier: String,
    pub src_chain: String,
    pub src_height: u64,
    pub dest_chain: String,
    pub dest_height: u64,
    pub pairs: usize,
    pub admin_configured: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let bridges = &state.bridges;
    Json(HealthResponse {
        status: "healthy".to_string(),
        identifier: state.identifier.clone(),
        src_chain: bridges.src.common().chain.block_chain.clone(),
        src_height: bridges.src.latest_block_height(),
        dest_chain: bridges.dst.common().chain.block_chain.clone(),
        dest_height: bridges.dst.latest_block_height(),
        pairs: bridges.pairs().len(),
        admin_configured: state.admin.gate().has_admin(),
    })
}

async fn prometheus_metrics() -> Response {
    let (content_type, buffer) = match metrics::encode_text() {
        Ok(encoded) => encoded,
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    };

    match Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/swap/{direction}/{pair_id}/{txid}", get(swap_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("API server listening on {}", addr);
    info!("  /rpc     - Admin calls (JSON-RPC {})", ADMIN_CALL_METHOD);
    info!("  /swap    - Swap status");
    info!("  /health  - Health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
