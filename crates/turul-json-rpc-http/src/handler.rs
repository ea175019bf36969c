//! HTTP request handler for the JSON-RPC endpoint

use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use tracing::{debug, warn};

use turul_json_rpc_dispatch::{RpcServer, TransportMetadata};

use crate::{CorsLayer, ServerConfig};

/// Copy request headers into transport metadata.
///
/// Names are lower-case (as `http` stores them). Repeated headers are joined
/// with `", "`; values that are not visible ASCII are skipped.
pub fn headers_to_metadata(headers: &HeaderMap) -> TransportMetadata {
    let mut metadata = TransportMetadata::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            debug!(header = %name, "Skipping non-ASCII header value");
            continue;
        };
        metadata
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    metadata
}

/// HTTP handler for JSON-RPC requests
#[derive(Debug, Clone)]
pub struct RpcHttpHandler {
    config: Arc<ServerConfig>,
    server: RpcServer,
}

impl RpcHttpHandler {
    pub fn new(config: ServerConfig, server: RpcServer) -> Self {
        Self {
            config: Arc::new(config),
            server,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one HTTP request. Never fails: every outcome is an HTTP response.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        debug!("Handling {} {}", req.method(), req.uri().path());

        let mut response = if req.uri().path() != self.config.rpc_path {
            plain(StatusCode::NOT_FOUND, "Not Found")
        } else {
            match *req.method() {
                Method::POST => self.handle_json_rpc_request(req).await,
                Method::OPTIONS => empty(StatusCode::NO_CONTENT),
                _ => {
                    let mut response = plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
                    response
                        .headers_mut()
                        .insert(ALLOW, HeaderValue::from_static("POST, OPTIONS"));
                    response
                }
            }
        };

        if self.config.enable_cors {
            CorsLayer::apply_cors_headers(response.headers_mut());
        }
        response
    }

    /// Handle JSON-RPC envelopes over HTTP POST
    async fn handle_json_rpc_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let max = self.config.max_body_size;
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if let Some(length) = declared
            && length > max
        {
            warn!("Request body too large: {} bytes", length);
            return plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }

        let (parts, body) = req.into_parts();
        let metadata = headers_to_metadata(&parts.headers);

        let body_bytes = match Limited::new(body, max).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
                warn!("Request body exceeded {} bytes", max);
                return plain(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
            Err(err) => {
                warn!("Failed to read request body: {}", err);
                return plain(StatusCode::BAD_REQUEST, "Failed to read request body");
            }
        };

        let outcome = self.server.handle(&body_bytes, metadata).await;

        let Some(body) = outcome.body else {
            debug!("No JSON-RPC response to send");
            return empty(StatusCode::NO_CONTENT);
        };

        let status = if outcome.is_error {
            self.config.error_status
        } else {
            StatusCode::OK
        };

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        for (name, value) in &outcome.metadata {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn plain(status: StatusCode, message: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(message.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
