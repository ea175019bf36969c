//! Execute-event publication
//!
//! An explicit publish/subscribe handle created at server construction. The
//! dispatcher publishes [`EXECUTE_EVENT`] once per resolved and granted
//! request, before invocation. Subscribers run synchronously in descending
//! priority order; each may rewrite the params or abort the call with a
//! [`HandlerError`] (typically [`HandlerError::NotGranted`]).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::HandlerError;
use crate::request::JsonRpcRequest;

/// Published before a resolved method is invoked
pub const EXECUTE_EVENT: &str = "rpc.server.json.execute";

/// Payload of [`EXECUTE_EVENT`]
#[derive(Debug, Clone)]
pub struct ExecuteEvent {
    /// Resolved method name
    pub method: String,
    /// Roles declared by the resolved method
    pub required_roles: Option<BTreeSet<String>>,
    /// The request about to be executed; subscribers may rewrite its params
    pub request: JsonRpcRequest,
}

#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn on_event(&self, event_name: &str, event: &mut ExecuteEvent) -> Result<(), HandlerError>;
}

#[derive(Clone)]
struct Listener {
    priority: i32,
    subscriber: Arc<dyn EventSubscriber>,
}

/// Registry of subscribers keyed by event name
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: HashMap<String, Vec<Listener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; higher priority runs first, ties keep
    /// registration order
    pub fn subscribe(
        &mut self,
        event_name: impl Into<String>,
        priority: i32,
        subscriber: Arc<dyn EventSubscriber>,
    ) {
        let listeners = self.listeners.entry(event_name.into()).or_default();
        let position = listeners
            .iter()
            .position(|l| l.priority < priority)
            .unwrap_or(listeners.len());
        listeners.insert(
            position,
            Listener {
                priority,
                subscriber,
            },
        );
    }

    pub fn has_listeners(&self, event_name: &str) -> bool {
        self.listeners
            .get(event_name)
            .is_some_and(|listeners| !listeners.is_empty())
    }

    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners.get(event_name).map_or(0, Vec::len)
    }

    /// Run every subscriber of `event_name`, returning the (possibly
    /// rewritten) event. The first error stops the chain.
    pub async fn publish(
        &self,
        event_name: &str,
        mut event: ExecuteEvent,
    ) -> Result<ExecuteEvent, HandlerError> {
        let Some(listeners) = self.listeners.get(event_name) else {
            return Ok(event);
        };

        for listener in listeners {
            if let Err(err) = listener.subscriber.on_event(event_name, &mut event).await {
                debug!(
                    event = event_name,
                    method = %event.method,
                    priority = listener.priority,
                    "Event subscriber aborted the request: {}",
                    err
                );
                return Err(err);
            }
        }

        Ok(event)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(name, listeners)| (name.as_str(), listeners.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}
