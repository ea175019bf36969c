//! Dispatcher/executor
//!
//! Every request ends in exactly one [`JsonRpcMessage`]:
//!
//! 1. no method, or method not registered → `-32601`
//! 2. authorization gate denies, or an execute subscriber vetoes → `-32001`
//! 3. handler fails → its typed error, or `-32603` for internal faults and panics
//!    (a panicking execute subscriber is reported the same way)
//! 4. handler succeeds → result
//!
//! Notifications take the same path; suppressing their output is the
//! assembler's job.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, error, warn};

use crate::auth::AuthorizationGate;
use crate::error::{HandlerError, JsonRpcError, ToJsonRpcError};
use crate::events::{EXECUTE_EVENT, EventDispatcher, ExecuteEvent};
use crate::normalize::{Envelope, Incoming};
use crate::registry::{CallContext, MethodRegistry, RegistryHandle};
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcMessage;

/// Resolves, authorizes and invokes requests against a registry snapshot
#[derive(Debug, Clone)]
pub struct JsonRpcDispatcher {
    registry: RegistryHandle,
    gate: AuthorizationGate,
    events: Arc<EventDispatcher>,
}

impl JsonRpcDispatcher {
    pub fn new(registry: RegistryHandle, gate: AuthorizationGate, events: EventDispatcher) -> Self {
        Self {
            registry,
            gate,
            events: Arc::new(events),
        }
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Execute a single request against the current registry
    pub async fn execute(&self, request: JsonRpcRequest) -> JsonRpcMessage {
        let registry = self.registry.snapshot();
        self.execute_with(&registry, request).await
    }

    /// Dispatch a normalized envelope.
    ///
    /// The whole envelope sees one registry snapshot. Batch elements run
    /// concurrently; results keep the request order.
    pub async fn dispatch(&self, envelope: Envelope<Incoming>) -> Envelope<JsonRpcMessage> {
        let registry = self.registry.snapshot();
        match envelope {
            Envelope::Single(incoming) => {
                Envelope::Single(self.dispatch_incoming(&registry, incoming).await)
            }
            Envelope::Batch(items) => {
                debug!(size = items.len(), "Dispatching batch");
                let results = join_all(
                    items
                        .into_iter()
                        .map(|incoming| self.dispatch_incoming(&registry, incoming)),
                )
                .await;
                Envelope::Batch(results)
            }
        }
    }

    async fn dispatch_incoming(&self, registry: &MethodRegistry, incoming: Incoming) -> JsonRpcMessage {
        match incoming {
            Ok(request) => self.execute_with(registry, request).await,
            Err(invalid) => JsonRpcMessage::Error(invalid),
        }
    }

    async fn execute_with(&self, registry: &MethodRegistry, request: JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id.clone();

        let Some(method) = request.method.clone() else {
            debug!(id = ?id, "Request without method");
            return JsonRpcError::method_not_found(id, None).into();
        };

        let Some(descriptor) = registry.lookup(&method) else {
            debug!(method = %method, id = ?id, "Method not found");
            return JsonRpcError::method_not_found(id, Some(&method)).into();
        };

        debug!(method = %method, id = ?id, "Dispatching JSON-RPC request");

        if !self
            .gate
            .check(&request, descriptor.required_roles.as_ref())
            .await
            .is_granted()
        {
            return JsonRpcError::not_granted(id).into();
        }

        let request = if self.events.has_listeners(EXECUTE_EVENT) {
            let event = ExecuteEvent {
                method: method.clone(),
                required_roles: descriptor.required_roles.clone(),
                request,
            };
            match AssertUnwindSafe(self.events.publish(EXECUTE_EVENT, event))
                .catch_unwind()
                .await
            {
                Ok(Ok(event)) => event.request,
                Ok(Err(err)) => return handler_failure(id, &method, &err),
                Err(_) => {
                    error!(method = %method, id = ?id, "Execute subscriber panicked");
                    return JsonRpcError::internal_error(id, None).into();
                }
            }
        } else {
            request
        };

        let JsonRpcRequest {
            params, metadata, ..
        } = request;

        let params = match descriptor.prepare_params(params) {
            Ok(params) => params,
            Err(err) => return handler_failure(id, &method, &err),
        };

        let context = CallContext {
            method: &method,
            id: id.as_ref(),
            metadata: &metadata,
        };

        match AssertUnwindSafe(descriptor.invoke(params, context))
            .catch_unwind()
            .await
        {
            Ok(Ok(result)) => JsonRpcMessage::success(id, result),
            Ok(Err(err)) => handler_failure(id, &method, &err),
            Err(_) => {
                error!(method = %method, id = ?id, "Handler panicked");
                JsonRpcError::internal_error(id, None).into()
            }
        }
    }
}

fn handler_failure(
    id: Option<crate::types::RequestId>,
    method: &str,
    err: &HandlerError,
) -> JsonRpcMessage {
    if let HandlerError::Internal(detail) = err {
        warn!(method, "Handler failed: {}", detail);
    } else {
        debug!(method, "Handler returned error: {}", err);
    }
    JsonRpcMessage::error(id, err.to_error_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthorizationChecker, StaticRoles};
    use crate::events::EventSubscriber;
    use crate::registry::HandlerDefinition;
    use crate::request::RequestParams;
    use crate::types::RequestId;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> MethodRegistry {
        MethodRegistry::try_build(vec![
            HandlerDefinition::new("ping")
                .expose()
                .execute_fn(|_params| async { Ok(json!("pong")) }),
            HandlerDefinition::new("fail")
                .expose()
                .execute_fn(|_params| async { Err(HandlerError::internal("disk on fire")) }),
            HandlerDefinition::new("quota")
                .expose()
                .execute_fn(|_params| async {
                    Err(HandlerError::application(1001, "Quota exceeded", Some(json!(5))))
                }),
            HandlerDefinition::new("panic")
                .expose()
                .execute_fn(|params: RequestParams| async move {
                    if params.is_empty() {
                        panic!("handler bug");
                    }
                    Ok(Value::Null)
                }),
            HandlerDefinition::new("admin")
                .expose()
                .roles(["ROLE_ADMIN"])
                .execute_fn(|_params| async { Ok(json!("secret")) }),
            HandlerDefinition::new("sum")
                .expose()
                .param("a")
                .param("b")
                .execute_fn(|params| async move {
                    let a = params.get("a").and_then(Value::as_i64).unwrap_or_default();
                    let b = params.get("b").and_then(Value::as_i64).unwrap_or_default();
                    Ok(json!(a + b))
                }),
        ])
        .unwrap()
    }

    fn dispatcher(checker: Option<Arc<dyn AuthorizationChecker>>) -> JsonRpcDispatcher {
        JsonRpcDispatcher::new(
            RegistryHandle::new(registry()),
            AuthorizationGate::new(checker),
            EventDispatcher::new(),
        )
    }

    fn call(method: &str, id: i64) -> JsonRpcRequest {
        JsonRpcRequest::new_no_params(RequestId::from(id), method)
    }

    #[tokio::test]
    async fn test_success() {
        let response = dispatcher(None).execute(call("ping", 1)).await;
        assert_eq!(response, JsonRpcMessage::success(Some(RequestId::from(1)), json!("pong")));
    }

    #[tokio::test]
    async fn test_method_not_found_echoes_id() {
        let response = dispatcher(None).execute(call("unknown", 9)).await;
        assert_eq!(response.error_code(), Some(-32601));
        assert_eq!(response.id(), Some(&RequestId::from(9)));

        let no_method = JsonRpcRequest {
            id: Some(RequestId::from("n")),
            ..Default::default()
        };
        let response = dispatcher(None).execute(no_method).await;
        assert_eq!(response.error_code(), Some(-32601));
        assert_eq!(response.id(), Some(&RequestId::from("n")));
    }

    #[tokio::test]
    async fn test_not_found_takes_precedence_over_not_granted() {
        let d = dispatcher(Some(Arc::new(StaticRoles::default())));
        assert_eq!(d.execute(call("missing", 1)).await.error_code(), Some(-32601));
        assert_eq!(d.execute(call("admin", 2)).await.error_code(), Some(-32001));
        assert_eq!(d.execute(call("ping", 3)).await.error_code(), None);
    }

    #[tokio::test]
    async fn test_granted_roles_invoke_handler() {
        let d = dispatcher(Some(Arc::new(StaticRoles::new(["ROLE_ADMIN"]))));
        let response = d.execute(call("admin", 1)).await;
        assert_eq!(response.result(), Some(&json!("secret")));
    }

    #[tokio::test]
    async fn test_handler_errors() {
        let d = dispatcher(None);

        let internal = d.execute(call("fail", 1)).await;
        assert_eq!(internal.error_code(), Some(-32603));
        let JsonRpcMessage::Error(err) = internal else {
            panic!("expected error");
        };
        assert_eq!(err.error.message, "Internal error");

        let app = d.execute(call("quota", 2)).await;
        let JsonRpcMessage::Error(err) = app else {
            panic!("expected error");
        };
        assert_eq!(err.error.code, 1001);
        assert_eq!(err.error.message, "Quota exceeded");
        assert_eq!(err.error.data, Some(json!(5)));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_internal_error() {
        let response = dispatcher(None).execute(call("panic", 5)).await;
        assert_eq!(response.error_code(), Some(-32603));
        assert_eq!(response.id(), Some(&RequestId::from(5)));
    }

    #[tokio::test]
    async fn test_declared_params_presence() {
        let d = dispatcher(None);
        let ok = d
            .execute(JsonRpcRequest::new(
                "sum",
                RequestParams::from(vec![json!(2), json!(3)]),
                Some(RequestId::from(1)),
            ))
            .await;
        assert_eq!(ok.result(), Some(&json!(5)));

        let missing = d
            .execute(JsonRpcRequest::new(
                "sum",
                RequestParams::from(vec![json!(2)]),
                Some(RequestId::from(2)),
            ))
            .await;
        assert_eq!(missing.error_code(), Some(-32602));
    }

    #[tokio::test]
    async fn test_notification_still_executes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let registry = MethodRegistry::try_build(vec![HandlerDefinition::new("log").expose().execute_fn(
            move |_params| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            },
        )])
        .unwrap();
        let d = JsonRpcDispatcher::new(
            RegistryHandle::new(registry),
            AuthorizationGate::permissive(),
            EventDispatcher::new(),
        );

        let response = d
            .execute(JsonRpcRequest::notification("log", RequestParams::default()))
            .await;
        assert!(!response.is_error());
        assert!(response.id().is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    struct DenyAll;

    #[async_trait]
    impl EventSubscriber for DenyAll {
        async fn on_event(&self, _name: &str, _event: &mut ExecuteEvent) -> Result<(), HandlerError> {
            Err(HandlerError::NotGranted)
        }
    }

    #[tokio::test]
    async fn test_execute_event_veto() {
        let mut events = EventDispatcher::new();
        events.subscribe(EXECUTE_EVENT, 0, Arc::new(DenyAll));
        let d = JsonRpcDispatcher::new(
            RegistryHandle::new(registry()),
            AuthorizationGate::permissive(),
            events,
        );

        let response = d.execute(call("ping", 4)).await;
        assert_eq!(response.error_code(), Some(-32001));
        assert_eq!(response.id(), Some(&RequestId::from(4)));
    }

    #[tokio::test]
    async fn test_batch_isolation_and_order() {
        let d = dispatcher(None);
        let envelope = Envelope::Batch(vec![
            Ok(call("panic", 1)),
            Err(JsonRpcError::invalid_request(None)),
            Ok(call("ping", 3)),
        ]);

        let results = d.dispatch(envelope).await.into_vec();
        assert_eq!(results[0].error_code(), Some(-32603));
        assert_eq!(results[1].error_code(), Some(-32600));
        assert_eq!(results[2].result(), Some(&json!("pong")));
        assert_eq!(results[2].id(), Some(&RequestId::from(3)));
    }
}
