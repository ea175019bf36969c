//! HTTP JSON-RPC server
//!
//! Accept loop over a tokio `TcpListener`, one hyper HTTP/1.1 connection task
//! per client, every request routed through [`RpcHttpHandler`].

use std::convert::Infallible;
use std::net::SocketAddr;

use http::StatusCode;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use turul_json_rpc_dispatch::RpcServer;

use crate::{HttpRpcError, Result, RpcHttpHandler};

/// Configuration for the HTTP JSON-RPC server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path for the JSON-RPC endpoint
    pub rpc_path: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Status used when the payload carries at least one JSON-RPC error
    pub error_status: StatusCode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rpc_path: "/rpc".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            error_status: StatusCode::OK,
        }
    }
}

/// Builder for the HTTP JSON-RPC server
pub struct RpcHttpServerBuilder {
    config: ServerConfig,
    server: RpcServer,
}

impl RpcHttpServerBuilder {
    /// Create a new builder serving `server`
    pub fn new(server: RpcServer) -> Self {
        Self {
            config: ServerConfig::default(),
            server,
        }
    }

    /// Set the bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    /// Set the JSON-RPC endpoint path
    pub fn rpc_path(mut self, path: impl Into<String>) -> Self {
        self.config.rpc_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enable: bool) -> Self {
        self.config.enable_cors = enable;
        self
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set the status for responses carrying JSON-RPC errors
    pub fn error_status(mut self, status: StatusCode) -> Self {
        self.config.error_status = status;
        self
    }

    /// Build the HTTP JSON-RPC server
    pub fn build(self) -> Result<RpcHttpServer> {
        if !self.config.rpc_path.starts_with('/') {
            return Err(HttpRpcError::InvalidConfig(format!(
                "rpc_path must start with '/': {}",
                self.config.rpc_path
            )));
        }
        if self.config.max_body_size == 0 {
            return Err(HttpRpcError::InvalidConfig(
                "max_body_size must be greater than zero".to_string(),
            ));
        }

        Ok(RpcHttpServer {
            handler: RpcHttpHandler::new(self.config.clone(), self.server),
            config: self.config,
        })
    }
}

/// HTTP JSON-RPC server
#[derive(Debug, Clone)]
pub struct RpcHttpServer {
    config: ServerConfig,
    handler: RpcHttpHandler,
}

impl RpcHttpServer {
    pub fn builder(server: RpcServer) -> RpcHttpServerBuilder {
        RpcHttpServerBuilder::new(server)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until the listener fails
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("HTTP JSON-RPC server listening on {}", listener.local_addr()?);
        info!("JSON-RPC endpoint available at: {}", self.config.rpc_path);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("New connection from {}", peer_addr);

            let handler = self.handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(handler.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Clients hanging up mid-message is routine
                    if err.is_incomplete_message() {
                        debug!("Client disconnected: {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }
}
