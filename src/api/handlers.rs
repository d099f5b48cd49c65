//! HTTP request handlers

use super::gateway::{GatewayError, ProxyRequest, ProxyResponse, Upstream};
use super::types::{ChatMessagesResponse, ErrorResponse, HealthResponse};
use super::ws::ws_handler;
use super::AppState;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(get_version))
        // Chat transport
        .route("/ws", get(ws_handler))
        // Stored transcripts
        .route("/api/chats/:chat_id/messages", get(get_chat_messages))
        // Upstream API proxy
        .route("/gateway/tuition/*path", any(proxy_tuition))
        .route("/gateway/address/*path", any(proxy_address))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn get_version() -> &'static str {
    concat!("tuition-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Transcripts
// ============================================================

async fn get_chat_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatMessagesResponse>, AppError> {
    let messages = state
        .runtime
        .transcript(&chat_id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ChatMessagesResponse { chat_id, messages }))
}

// ============================================================
// Gateway
// ============================================================

async fn proxy_tuition(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = ProxyRequest {
        method,
        path,
        query,
        headers,
        body,
    };
    proxy(&state, Upstream::Tuition, request).await
}

async fn proxy_address(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = ProxyRequest {
        method,
        path,
        query,
        headers,
        body,
    };
    proxy(&state, Upstream::Address, request).await
}

async fn proxy(
    state: &AppState,
    upstream: Upstream,
    request: ProxyRequest,
) -> Result<Response, AppError> {
    let ProxyResponse {
        status,
        content_type,
        body,
    } = state.gateway.forward(upstream, request).await?;

    let mut response = (status, body).into_response();
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    Internal(String),
    BadGateway(String),
    ServiceUnavailable(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured(_) => AppError::ServiceUnavailable(err.to_string()),
            GatewayError::Unreachable { .. } => AppError::BadGateway(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        tracing::warn!(status = %status, error = %message, "Request failed");
        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
