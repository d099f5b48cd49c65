//! Reverse proxy for the upstream APIs
//!
//! `/gateway/tuition/{path}` is forwarded to `{tuition}/api/v1/{path}` and
//! `/gateway/address/{path}` to `{address}/api/{path}`. Method, query string,
//! body and the `content-type` and `authorization` headers pass through;
//! status and body come back unchanged.

use crate::config::UpstreamConfig;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use reqwest::Client;
use thiserror::Error;

const FORWARDED_HEADERS: [header::HeaderName; 2] = [header::CONTENT_TYPE, header::AUTHORIZATION];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Tuition,
    Address,
}

impl Upstream {
    fn name(self) -> &'static str {
        match self {
            Upstream::Tuition => "Tuition",
            Upstream::Address => "Address",
        }
    }

    fn path_prefix(self) -> &'static str {
        match self {
            Upstream::Tuition => "/api/v1",
            Upstream::Address => "/api",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0} API base URL is not configured")]
    NotConfigured(&'static str),
    #[error("{upstream} API unreachable: {message}")]
    Unreachable {
        upstream: &'static str,
        message: String,
    },
}

/// Request as received by the proxy route
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream answer relayed to the client
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

pub struct Gateway {
    client: Client,
    tuition_base_url: Option<String>,
    address_base_url: Option<String>,
}

impl Gateway {
    pub fn new(client: Client, upstream: &UpstreamConfig) -> Self {
        Self {
            client,
            tuition_base_url: upstream.tuition_base_url.clone(),
            address_base_url: upstream.address_base_url.clone(),
        }
    }

    fn target_url(
        &self,
        upstream: Upstream,
        path: &str,
        query: Option<&str>,
    ) -> Result<String, GatewayError> {
        let base = match upstream {
            Upstream::Tuition => self.tuition_base_url.as_deref(),
            Upstream::Address => self.address_base_url.as_deref(),
        }
        .ok_or(GatewayError::NotConfigured(upstream.name()))?;

        let mut url = format!(
            "{base}{}/{}",
            upstream.path_prefix(),
            path.trim_start_matches('/')
        );
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        Ok(url)
    }

    pub async fn forward(
        &self,
        upstream: Upstream,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, GatewayError> {
        let url = self.target_url(upstream, &request.path, request.query.as_deref())?;
        tracing::info!(method = %request.method, upstream = upstream.name(), url = %url, "Gateway forward");

        let mut builder = self.client.request(request.method, &url);
        for name in &FORWARDED_HEADERS {
            if let Some(value) = request.headers.get(name) {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let unreachable = |e: reqwest::Error| GatewayError::Unreachable {
            upstream: upstream.name(),
            message: e.to_string(),
        };

        let response = builder.send().await.map_err(unreachable)?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response.bytes().await.map_err(unreachable)?;

        if !status.is_success() {
            tracing::warn!(upstream = upstream.name(), status = %status, "Gateway upstream error");
        }

        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}
