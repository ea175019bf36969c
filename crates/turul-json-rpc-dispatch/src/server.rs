//! Transport-facing entry point
//!
//! [`RpcServer::handle`] is the whole pipeline: normalize → dispatch →
//! assemble → serialize. A transport binding only has to supply the raw
//! bytes plus its metadata and map `is_error` onto its own status signalling.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::assemble::{Outbound, assemble};
use crate::auth::{AuthorizationChecker, AuthorizationGate};
use crate::config::{DispatchConfig, EmptyBatchPolicy};
use crate::dispatcher::JsonRpcDispatcher;
use crate::error::{BuildError, JsonRpcError};
use crate::events::{EXECUTE_EVENT, EventDispatcher, EventSubscriber};
use crate::normalize::normalize;
use crate::registry::{HandlerDefinition, MethodRegistry, RegistryHandle};
use crate::types::TransportMetadata;

/// Content type of every non-empty response body
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Result of handling one envelope
#[derive(Debug, Clone, PartialEq)]
pub struct HandleOutcome {
    /// Serialized payload; `None` means "no body"
    pub body: Option<Vec<u8>>,
    /// Outbound transport metadata
    pub metadata: TransportMetadata,
    /// At least one emitted response is an error
    pub is_error: bool,
}

/// Builder for [`RpcServer`]
#[derive(Default)]
pub struct RpcServerBuilder {
    config: DispatchConfig,
    candidates: Vec<HandlerDefinition>,
    checker: Option<Arc<dyn AuthorizationChecker>>,
    events: EventDispatcher,
}

impl RpcServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate to the registry
    pub fn handler(mut self, definition: HandlerDefinition) -> Self {
        self.candidates.push(definition);
        self
    }

    /// Offer several candidates to the registry
    pub fn handlers<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = HandlerDefinition>,
    {
        self.candidates.extend(definitions);
        self
    }

    /// Configure the authorization capability; without one every call is granted
    pub fn authorization<C>(mut self, checker: C) -> Self
    where
        C: AuthorizationChecker + 'static,
    {
        self.checker = Some(Arc::new(checker));
        self
    }

    /// Subscribe to the execute event
    pub fn subscriber<S>(mut self, priority: i32, subscriber: S) -> Self
    where
        S: EventSubscriber + 'static,
    {
        self.events.subscribe(EXECUTE_EVENT, priority, Arc::new(subscriber));
        self
    }

    /// Use a pre-populated event dispatcher
    pub fn events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn empty_batch(mut self, policy: EmptyBatchPolicy) -> Self {
        self.config.empty_batch = policy;
        self
    }

    pub fn max_batch_size(mut self, max: usize) -> Self {
        self.config.max_batch_size = Some(max);
        self
    }

    /// Build, refusing to start if any RPC unit is invalid
    pub fn build(self) -> Result<RpcServer, BuildError> {
        let (server, errors) = self.build_lenient();
        match errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(server),
        }
    }

    /// Build, dropping invalid RPC units and returning their errors
    pub fn build_lenient(self) -> (RpcServer, Vec<BuildError>) {
        let (registry, errors) = MethodRegistry::build(self.candidates);
        info!(
            methods = registry.len(),
            rejected = errors.len(),
            "JSON-RPC method registry built"
        );

        let dispatcher = JsonRpcDispatcher::new(
            RegistryHandle::new(registry),
            AuthorizationGate::new(self.checker),
            self.events,
        );

        (
            RpcServer {
                config: Arc::new(self.config),
                dispatcher,
            },
            errors,
        )
    }
}

/// The assembled pipeline; cheap to clone and share across connections
#[derive(Debug, Clone)]
pub struct RpcServer {
    config: Arc<DispatchConfig>,
    dispatcher: JsonRpcDispatcher,
}

impl RpcServer {
    pub fn builder() -> RpcServerBuilder {
        RpcServerBuilder::new()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &JsonRpcDispatcher {
        &self.dispatcher
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        self.dispatcher.registry().snapshot().methods()
    }

    /// Replace the registry with one built from `candidates`.
    ///
    /// All or nothing: if any RPC unit is invalid the current registry stays
    /// in place and the errors are returned.
    pub fn reload<I>(&self, candidates: I) -> Result<(), Vec<BuildError>>
    where
        I: IntoIterator<Item = HandlerDefinition>,
    {
        let (registry, errors) = MethodRegistry::build(candidates);
        if !errors.is_empty() {
            error!(rejected = errors.len(), "Registry reload aborted");
            return Err(errors);
        }
        let methods = registry.len();
        self.dispatcher.registry().publish(registry);
        info!(methods, "JSON-RPC method registry reloaded");
        Ok(())
    }

    /// Run the pipeline and return the typed outcome
    pub async fn process(&self, raw: &[u8], metadata: &TransportMetadata) -> Outbound {
        match normalize(raw, metadata, &self.config) {
            Ok(envelope) => {
                debug!(
                    batch = envelope.is_batch(),
                    size = envelope.len(),
                    "Normalized JSON-RPC envelope"
                );
                assemble(self.dispatcher.dispatch(envelope).await)
            }
            Err(err) => Outbound::from_error(err),
        }
    }

    /// Run the pipeline and serialize the outcome
    pub async fn handle(&self, raw: &[u8], metadata: TransportMetadata) -> HandleOutcome {
        let outbound = self.process(raw, &metadata).await;

        let (body, is_error) = match outbound.to_bytes() {
            Ok(body) => (body, outbound.is_error),
            Err(err) => {
                error!("Failed to serialize JSON-RPC response: {}", err);
                let fallback = Outbound::from_error(JsonRpcError::internal_error(None, None));
                (fallback.to_bytes().ok().flatten(), true)
            }
        };

        let mut outbound_metadata = TransportMetadata::new();
        if body.is_some() {
            outbound_metadata.insert("content-type".to_string(), JSON_CONTENT_TYPE.to_string());
        }
        if let Some(request_id) = metadata.get("x-request-id") {
            outbound_metadata.insert("x-request-id".to_string(), request_id.clone());
        }

        HandleOutcome {
            body,
            metadata: outbound_metadata,
            is_error,
        }
    }
}
