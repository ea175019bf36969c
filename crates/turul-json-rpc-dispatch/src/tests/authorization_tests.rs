//! Authorization and Execute-Event Tests
//!
//! Role checks driven by transport metadata, and subscribers observing or
//! vetoing resolved calls before invocation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::auth::MetadataRoles;
use crate::error::HandlerError;
use crate::events::{EventSubscriber, ExecuteEvent};
use crate::registry::HandlerDefinition;
use crate::request::RequestParams;
use crate::server::RpcServer;
use crate::types::TransportMetadata;

const ROLES_HEADER: &str = "x-rpc-roles";

fn handlers() -> Vec<HandlerDefinition> {
    vec![
        HandlerDefinition::new("ping")
            .expose()
            .execute_fn(|_params| async { Ok(json!("pong")) }),
        HandlerDefinition::new("admin.stats")
            .expose()
            .roles(["ROLE_ADMIN", "ROLE_OPS"])
            .execute_fn(|_params| async { Ok(json!({"calls": 42})) }),
        HandlerDefinition::new("echo")
            .expose()
            .execute_fn(|params| async move { Ok(params.to_value()) }),
    ]
}

fn with_roles(roles: &str) -> TransportMetadata {
    let mut metadata = TransportMetadata::new();
    metadata.insert(ROLES_HEADER.to_string(), roles.to_string());
    metadata
}

async fn call_json(server: &RpcServer, raw: &str, metadata: TransportMetadata) -> Value {
    let body = server.handle(raw.as_bytes(), metadata).await.body.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Records each event it sees, tagged with its own label
struct Recorder {
    label: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventSubscriber for Recorder {
    async fn on_event(&self, event_name: &str, event: &mut ExecuteEvent) -> Result<(), HandlerError> {
        self.seen
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", self.label, event_name, event.method));
        Ok(())
    }
}

/// Denies `echo` unless the caller sent "x-override"
struct Veto;

#[async_trait]
impl EventSubscriber for Veto {
    async fn on_event(&self, _event_name: &str, event: &mut ExecuteEvent) -> Result<(), HandlerError> {
        if event.method == "echo" && !event.request.metadata.contains_key("x-override") {
            return Err(HandlerError::NotGranted);
        }
        Ok(())
    }
}

/// Injects a param before the handler runs
struct Stamp;

#[async_trait]
impl EventSubscriber for Stamp {
    async fn on_event(&self, _event_name: &str, event: &mut ExecuteEvent) -> Result<(), HandlerError> {
        let mut params = match event.request.params.to_value() {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        params.insert("stamped".to_string(), Value::Bool(true));
        event.request.params = RequestParams::Object(params.into_iter().collect());
        Ok(())
    }
}

/// Panics on `echo`, passes everything else through
struct Faulty;

#[async_trait]
impl EventSubscriber for Faulty {
    async fn on_event(&self, _event_name: &str, event: &mut ExecuteEvent) -> Result<(), HandlerError> {
        if event.method == "echo" {
            panic!("subscriber fault");
        }
        Ok(())
    }
}

#[cfg(test)]
mod role_tests {
    use super::*;

    fn server() -> RpcServer {
        RpcServer::builder()
            .handlers(handlers())
            .authorization(MetadataRoles::new(ROLES_HEADER))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_unrestricted_method_needs_no_roles() {
        let response = call_json(&server(), r#"{"method":"ping","id":1}"#, TransportMetadata::new()).await;
        assert_eq!(response["result"], "pong");
    }

    #[tokio::test]
    async fn test_missing_roles_is_not_granted() {
        let response = call_json(
            &server(),
            r#"{"method":"admin.stats","id":7}"#,
            TransportMetadata::new(),
        )
        .await;
        assert_eq!(response["error"]["code"], -32001);
        assert_eq!(response["error"]["message"], "Method not granted");
        assert_eq!(response["id"], 7);

        let response = call_json(
            &server(),
            r#"{"method":"admin.stats","id":8}"#,
            with_roles("ROLE_USER"),
        )
        .await;
        assert_eq!(response["error"]["code"], -32001);
    }

    #[tokio::test]
    async fn test_any_required_role_grants() {
        let response = call_json(
            &server(),
            r#"{"method":"admin.stats","id":1}"#,
            with_roles("ROLE_USER, ROLE_OPS"),
        )
        .await;
        assert_eq!(response["result"], json!({"calls": 42}));
    }

    #[tokio::test]
    async fn test_not_granted_notification_is_reported() {
        let outcome = server()
            .handle(br#"{"method":"admin.stats"}"#, TransportMetadata::new())
            .await;
        assert!(outcome.is_error);
        let response: Value = serde_json::from_slice(&outcome.body.unwrap()).unwrap();
        assert_eq!(response["error"]["code"], -32001);
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_without_checker_roles_are_ignored() {
        let server = RpcServer::builder().handlers(handlers()).build().unwrap();
        let response = call_json(&server, r#"{"method":"admin.stats","id":1}"#, TransportMetadata::new()).await;
        assert_eq!(response["result"], json!({"calls": 42}));
    }

    #[tokio::test]
    async fn test_batch_denial_is_isolated() {
        let response = call_json(
            &server(),
            r#"[{"method":"admin.stats","id":1},{"method":"ping","id":2}]"#,
            TransportMetadata::new(),
        )
        .await;
        let items = response.as_array().unwrap();
        assert_eq!(items[0]["error"]["code"], -32001);
        assert_eq!(items[1]["result"], "pong");
    }
}

#[cfg(test)]
mod execute_event_tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_run_in_priority_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let server = RpcServer::builder()
            .handlers(handlers())
            .subscriber(0, Recorder { label: "low", seen: Arc::clone(&seen) })
            .subscriber(4096, Recorder { label: "high", seen: Arc::clone(&seen) })
            .build()
            .unwrap();

        call_json(&server, r#"{"method":"ping","id":1}"#, TransportMetadata::new()).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "high:rpc.server.json.execute:ping".to_string(),
                "low:rpc.server.json.execute:ping".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unresolved_and_denied_calls_publish_nothing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let server = RpcServer::builder()
            .handlers(handlers())
            .authorization(MetadataRoles::new(ROLES_HEADER))
            .subscriber(0, Recorder { label: "audit", seen: Arc::clone(&seen) })
            .build()
            .unwrap();

        call_json(&server, r#"{"method":"unknown","id":1}"#, TransportMetadata::new()).await;
        call_json(&server, r#"{"method":"admin.stats","id":2}"#, TransportMetadata::new()).await;

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_veto() {
        let server = RpcServer::builder()
            .handlers(handlers())
            .subscriber(10, Veto)
            .build()
            .unwrap();

        let response = call_json(&server, r#"{"method":"echo","id":1}"#, TransportMetadata::new()).await;
        assert_eq!(response["error"]["code"], -32001);

        let mut metadata = TransportMetadata::new();
        metadata.insert("x-override".to_string(), "1".to_string());
        let response = call_json(&server, r#"{"method":"echo","params":[1],"id":2}"#, metadata).await;
        assert_eq!(response["result"], json!([1]));
    }

    #[tokio::test]
    async fn test_subscriber_rewrites_params() {
        let server = RpcServer::builder()
            .handlers(handlers())
            .subscriber(0, Stamp)
            .build()
            .unwrap();

        let response = call_json(
            &server,
            r#"{"method":"echo","params":{"a":1},"id":1}"#,
            TransportMetadata::new(),
        )
        .await;
        assert_eq!(response["result"], json!({"a": 1, "stamped": true}));
        assert_eq!(response["id"], 1);
    }

    #[tokio::test]
    async fn test_subscriber_panic_fails_only_its_call() {
        let server = RpcServer::builder()
            .handlers(handlers())
            .subscriber(0, Faulty)
            .build()
            .unwrap();

        let response = call_json(
            &server,
            r#"[{"method":"ping","id":1},{"method":"echo","params":[1],"id":2}]"#,
            TransportMetadata::new(),
        )
        .await;
        let items = response.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], json!({"jsonrpc": "2.0", "result": "pong", "id": 1}));
        assert_eq!(items[1]["error"]["code"], -32603);
        assert_eq!(items[1]["id"], 2);

        let response = call_json(&server, r#"{"method":"ping","id":3}"#, TransportMetadata::new()).await;
        assert_eq!(response["result"], "pong");
    }
}
