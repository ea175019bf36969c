//! # JSON-RPC 2.0 Dispatch Pipeline
//!
//! A transport-agnostic, server-side JSON-RPC 2.0 pipeline. Raw envelope bytes
//! go in, a serialized response (or nothing) comes out.
//!
//! ## Features
//! - Method registry built from candidate handler units, with hot reload
//! - Single and batch envelopes, with order kept and failures isolated per element
//! - Role-based authorization through a pluggable checker
//! - Priority-ordered execute-event subscribers that can veto or rewrite a call
//! - Notification suppression with errors always reported
//!
//! ```rust
//! use turul_json_rpc_dispatch::prelude::*;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), BuildError> {
//! let server = RpcServer::builder()
//!     .handler(
//!         HandlerDefinition::new("ping")
//!             .expose()
//!             .execute_fn(|_params| async { Ok(json!("pong")) }),
//!     )
//!     .build()?;
//!
//! let outcome = server
//!     .handle(br#"{"method":"ping","id":1}"#, TransportMetadata::new())
//!     .await;
//! assert_eq!(
//!     outcome.body.as_deref(),
//!     Some(&br#"{"jsonrpc":"2.0","result":"pong","id":1}"#[..])
//! );
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod normalize;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod server;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export main types
pub use assemble::{Outbound, Payload, assemble};
pub use auth::{AuthorizationChecker, AuthorizationGate, Grant, MetadataRoles, StaticRoles};
pub use config::{DispatchConfig, EmptyBatchPolicy};
pub use dispatcher::JsonRpcDispatcher;
pub use error::{
    BuildError, HandlerError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, ToJsonRpcError,
};
pub use events::{EXECUTE_EVENT, EventDispatcher, EventSubscriber, ExecuteEvent};
pub use normalize::{Envelope, Incoming, normalize};
pub use registry::{
    CallContext, FunctionHandler, HandlerDefinition, MethodDescriptor, MethodHandler,
    MethodRegistry, ParamSpec, RegistryHandle,
};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use server::{HandleOutcome, JSON_CONTENT_TYPE, RpcServer, RpcServerBuilder};
pub use types::{JsonRpcVersion, RequestId, TransportMetadata};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    /// Caller lacks the roles the method requires
    pub const METHOD_NOT_GRANTED: i64 = -32001;
}
