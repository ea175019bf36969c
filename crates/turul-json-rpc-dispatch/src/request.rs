use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::HandlerError;
use crate::types::{RequestId, TransportMetadata};

/// Parameters for a JSON-RPC request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    /// Positional parameters as an array
    Array(Vec<Value>),
    /// Named parameters as an object
    Object(HashMap<String, Value>),
}

impl Default for RequestParams {
    fn default() -> Self {
        RequestParams::Object(HashMap::new())
    }
}

impl RequestParams {
    /// Build params from a decoded `params` member.
    ///
    /// Returns `None` when the value is neither an array nor an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(RequestParams::Array(items)),
            Value::Object(map) => Some(RequestParams::Object(map.into_iter().collect())),
            _ => None,
        }
    }

    /// Get a parameter by name (object params only)
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    /// Get a parameter by index (array params only)
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        match self {
            RequestParams::Array(vec) => vec.get(index),
            RequestParams::Object(_) => None,
        }
    }

    /// Check if parameters are empty
    pub fn is_empty(&self) -> bool {
        match self {
            RequestParams::Object(map) => map.is_empty(),
            RequestParams::Array(vec) => vec.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RequestParams::Object(map) => map.len(),
            RequestParams::Array(vec) => vec.len(),
        }
    }

    /// Convert to a serde_json::Value
    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }

    /// Deserialize the whole parameter set into a typed value.
    ///
    /// A shape mismatch is reported as an invalid-params handler error.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_value(self.to_value())?)
    }

    /// Bind positional params onto declared names, in declaration order.
    ///
    /// Object params are returned unchanged. Surplus positional values are
    /// kept under their index so nothing the caller sent is dropped.
    pub fn into_named(self, names: &[&str]) -> Self {
        match self {
            RequestParams::Object(_) => self,
            RequestParams::Array(values) => {
                let mut map = HashMap::with_capacity(values.len());
                for (index, value) in values.into_iter().enumerate() {
                    let key = names
                        .get(index)
                        .map(|name| name.to_string())
                        .unwrap_or_else(|| index.to_string());
                    map.insert(key, value);
                }
                RequestParams::Object(map)
            }
        }
    }
}

impl From<HashMap<String, Value>> for RequestParams {
    fn from(map: HashMap<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

impl From<Vec<Value>> for RequestParams {
    fn from(vec: Vec<Value>) -> Self {
        RequestParams::Array(vec)
    }
}

/// A normalized JSON-RPC request.
///
/// `method` is `None` when the envelope carried no usable method name; such a
/// request still goes through dispatch and fails there. `id == None` marks a
/// notification.
#[derive(Debug, Clone, Default)]
pub struct JsonRpcRequest {
    pub method: Option<String>,
    pub params: RequestParams,
    pub id: Option<RequestId>,
    /// Transport side-channel (headers etc.), never used by normalization
    pub metadata: TransportMetadata,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: RequestParams, id: Option<RequestId>) -> Self {
        Self {
            method: Some(method.into()),
            params,
            id,
            metadata: TransportMetadata::new(),
        }
    }

    /// Create a request with no parameters
    pub fn new_no_params(id: RequestId, method: impl Into<String>) -> Self {
        Self::new(method, RequestParams::default(), Some(id))
    }

    /// Create a notification (no id) with the given params
    pub fn notification(method: impl Into<String>, params: RequestParams) -> Self {
        Self::new(method, params, None)
    }

    pub fn with_metadata(mut self, metadata: TransportMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    pub fn method_name(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Get a parameter by name (if params are an object)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Get a parameter by index (if params are an array)
    pub fn get_param_index(&self, index: usize) -> Option<&Value> {
        self.params.get_index(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_with_object_params() {
        let params = RequestParams::from_value(json!({"name": "test", "value": 42})).unwrap();
        let request = JsonRpcRequest::new("set_value", params, Some(RequestId::from("req1")));

        assert_eq!(request.get_param("name"), Some(&json!("test")));
        assert_eq!(request.get_param("value"), Some(&json!(42)));
        assert_eq!(request.get_param("missing"), None);
        assert!(!request.is_notification());
    }

    #[test]
    fn test_request_with_array_params() {
        let params = RequestParams::from(vec![json!("test"), json!(42), json!(true)]);
        let request = JsonRpcRequest::notification("process", params);

        assert_eq!(request.get_param_index(0), Some(&json!("test")));
        assert_eq!(request.get_param_index(2), Some(&json!(true)));
        assert_eq!(request.get_param_index(3), None);
        assert!(request.is_notification());
    }

    #[test]
    fn test_params_reject_scalars() {
        assert!(RequestParams::from_value(json!(3)).is_none());
        assert!(RequestParams::from_value(json!("x")).is_none());
        assert!(RequestParams::default().is_empty());
    }

    #[test]
    fn test_into_named_binds_positions() {
        let params = RequestParams::from(vec![json!(1), json!(2), json!(3)]);
        let named = params.into_named(&["a", "b"]);

        assert_eq!(named.get("a"), Some(&json!(1)));
        assert_eq!(named.get("b"), Some(&json!(2)));
        assert_eq!(named.get("2"), Some(&json!(3)));
        assert_eq!(named.len(), 3);
    }

    #[test]
    fn test_parse_typed_params() {
        #[derive(Debug, Deserialize)]
        struct Pair {
            a: i64,
            b: i64,
        }

        let params = RequestParams::from_value(json!({"a": 1, "b": 2})).unwrap();
        let pair: Pair = params.parse().unwrap();
        assert_eq!(pair.a + pair.b, 3);

        let bad = RequestParams::from_value(json!({"a": "one"})).unwrap();
        let err = bad.parse::<Pair>().unwrap_err();
        assert!(matches!(err, HandlerError::InvalidParams { .. }));
    }
}
