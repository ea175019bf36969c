//! # JSON-RPC Dispatch Prelude
//!
//! Convenient re-exports of the types needed to register methods and run
//! the pipeline.
//!
//! ```rust
//! use turul_json_rpc_dispatch::prelude::*;
//! ```

// Pipeline entry point
pub use crate::config::{DispatchConfig, EmptyBatchPolicy};
pub use crate::server::{HandleOutcome, RpcServer, RpcServerBuilder};

// Method registration
pub use crate::registry::{CallContext, HandlerDefinition, MethodHandler};

// Authorization and events
pub use crate::auth::{AuthorizationChecker, MetadataRoles, StaticRoles};
pub use crate::events::{EXECUTE_EVENT, EventSubscriber, ExecuteEvent};

// Core JSON-RPC types
pub use crate::error::{BuildError, HandlerError, JsonRpcError, JsonRpcErrorObject};
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::JsonRpcMessage;
pub use crate::types::{RequestId, TransportMetadata};

// Standard error codes
pub use crate::error_codes::*;
