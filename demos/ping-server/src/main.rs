//! Ping Server
//!
//! Minimal JSON-RPC 2.0 server over HTTP showing method registration,
//! declared params, role checks and an execute-event subscriber.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --package ping-server -- --port 8080
//!
//! curl -s localhost:8080/rpc -d '{"jsonrpc":"2.0","method":"ping","id":1}'
//! curl -s localhost:8080/rpc -d '[{"method":"sum","params":[2,3],"id":1},{"method":"echo","params":{"hello":"world"}}]'
//! curl -s localhost:8080/rpc -H 'X-Rpc-Roles: ROLE_ADMIN' -d '{"method":"admin.stats","id":2}'
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use turul_json_rpc_dispatch::prelude::*;
use turul_json_rpc_http::RpcHttpServer;

const ROLES_HEADER: &str = "x-rpc-roles";

/// Command-line arguments for the ping server
#[derive(Parser, Debug)]
#[command(name = "ping-server")]
#[command(about = "Example JSON-RPC 2.0 server")]
struct Args {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path of the JSON-RPC endpoint
    #[arg(long, default_value = "/rpc")]
    path: String,

    /// HTTP status for responses carrying JSON-RPC errors
    #[arg(long, default_value = "200")]
    error_status: u16,

    /// Reject batches longer than this
    #[arg(long)]
    max_batch_size: Option<usize>,

    /// Answer an empty batch with nothing instead of an Invalid Request error
    #[arg(long)]
    empty_batch_no_response: bool,
}

#[derive(Deserialize)]
struct SumParams {
    a: f64,
    b: f64,
}

/// `sum(a, b)`; accepts `[a, b]` or `{"a": .., "b": ..}`
struct SumHandler;

#[async_trait]
impl MethodHandler for SumHandler {
    async fn execute(
        &self,
        params: RequestParams,
        _context: CallContext<'_>,
    ) -> Result<Value, HandlerError> {
        let SumParams { a, b } = params.parse()?;
        Ok(json!(a + b))
    }
}

/// Reports how many calls the audit subscriber has let through
struct StatsHandler {
    executed: Arc<AtomicU64>,
}

#[async_trait]
impl MethodHandler for StatsHandler {
    async fn execute(
        &self,
        _params: RequestParams,
        context: CallContext<'_>,
    ) -> Result<Value, HandlerError> {
        Ok(json!({
            "executed": self.executed.load(Ordering::Relaxed),
            "caller_roles": context.metadata.get(ROLES_HEADER),
        }))
    }
}

/// Logs every call about to execute
struct AuditSubscriber {
    executed: Arc<AtomicU64>,
}

#[async_trait]
impl EventSubscriber for AuditSubscriber {
    async fn on_event(&self, event_name: &str, event: &mut ExecuteEvent) -> Result<(), HandlerError> {
        self.executed.fetch_add(1, Ordering::Relaxed);
        info!(
            event = event_name,
            method = %event.method,
            id = ?event.request.id,
            restricted = event.required_roles.is_some(),
            "Executing JSON-RPC call"
        );
        Ok(())
    }
}

fn handlers(executed: Arc<AtomicU64>) -> Vec<HandlerDefinition> {
    vec![
        HandlerDefinition::new("ping")
            .expose()
            .description("Liveness check")
            .execute_fn(|_params| async { Ok(json!("pong")) }),
        HandlerDefinition::new("echo")
            .expose()
            .description("Returns its params unchanged")
            .execute_fn(|params| async move { Ok(params.to_value()) }),
        HandlerDefinition::new("SumHandler")
            .expose_as("sum")
            .description("Adds two numbers")
            .param("a")
            .param("b")
            .execute(SumHandler),
        HandlerDefinition::new("StatsHandler")
            .expose_as("admin.stats")
            .description("Call statistics")
            .roles(["ROLE_ADMIN"])
            .execute(StatsHandler { executed }),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let executed = Arc::new(AtomicU64::new(0));

    let mut builder = RpcServer::builder()
        .handlers(handlers(Arc::clone(&executed)))
        .authorization(MetadataRoles::new(ROLES_HEADER))
        .subscriber(0, AuditSubscriber { executed });
    if let Some(max) = args.max_batch_size {
        builder = builder.max_batch_size(max);
    }
    if args.empty_batch_no_response {
        builder = builder.empty_batch(EmptyBatchPolicy::NoResponse);
    }
    let rpc = builder.build()?;
    info!("Registered methods: {}", rpc.methods().join(", "));

    let server = RpcHttpServer::builder(rpc)
        .bind_address(SocketAddr::from(([127, 0, 0, 1], args.port)))
        .rpc_path(args.path)
        .error_status(args.error_status.try_into()?)
        .build()?;

    server.run().await?;
    Ok(())
}
