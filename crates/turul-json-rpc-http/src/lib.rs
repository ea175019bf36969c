//! # HTTP JSON-RPC Server
//!
//! HTTP/1.1 transport for the turul JSON-RPC 2.0 dispatch pipeline.
//!
//! ## Features
//! - POST-only endpoint at a configurable path
//! - Request headers handed to the pipeline as transport metadata
//! - Configurable HTTP status for responses that carry JSON-RPC errors
//! - `204 No Content` when every request was a successful notification
//! - CORS support for browser-based clients

pub mod cors;
pub mod handler;
pub mod server;

// Re-export main types
pub use cors::CorsLayer;
pub use handler::{RpcHttpHandler, headers_to_metadata};
pub use server::{RpcHttpServer, RpcHttpServerBuilder, ServerConfig};

// Re-export foundational types
pub use turul_json_rpc_dispatch::{HandleOutcome, RpcServer, TransportMetadata};

/// Result type for HTTP JSON-RPC operations
pub type Result<T> = std::result::Result<T, HttpRpcError>;

/// HTTP JSON-RPC specific errors
#[derive(Debug, thiserror::Error)]
pub enum HttpRpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
