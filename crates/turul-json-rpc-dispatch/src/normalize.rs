//! Request normalizer: raw envelope bytes to typed requests

use serde_json::{Value, json};
use tracing::debug;

use crate::config::{DispatchConfig, EmptyBatchPolicy};
use crate::error::JsonRpcError;
use crate::request::{JsonRpcRequest, RequestParams};
use crate::types::{RequestId, TransportMetadata};

/// One request or an ordered batch of them
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Single(T),
    Batch(Vec<T>),
}

impl<T> Envelope<T> {
    pub fn is_batch(&self) -> bool {
        matches!(self, Envelope::Batch(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Envelope::Single(_) => 1,
            Envelope::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Envelope::Single(item) => vec![item],
            Envelope::Batch(items) => items,
        }
    }
}

/// A normalized element: a usable request, or the Invalid Request failure it
/// produced. Failures stay in place so batch order is preserved.
pub type Incoming = Result<JsonRpcRequest, JsonRpcError>;

/// Decode an envelope.
///
/// Only whole-envelope problems are returned as `Err` (undecodable JSON, an
/// empty batch under [`EmptyBatchPolicy::InvalidRequest`], an oversized
/// batch); they carry `id: null`. Problems with individual elements are kept
/// per element.
pub fn normalize(
    raw: &[u8],
    metadata: &TransportMetadata,
    config: &DispatchConfig,
) -> Result<Envelope<Incoming>, JsonRpcError> {
    let value: Value = serde_json::from_slice(raw).map_err(|err| {
        debug!("JSON-RPC parse error: {}", err);
        JsonRpcError::parse_error()
    })?;

    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return match config.empty_batch {
                    EmptyBatchPolicy::InvalidRequest => {
                        debug!("Rejecting empty batch");
                        Err(JsonRpcError::invalid_request(None))
                    }
                    EmptyBatchPolicy::NoResponse => Ok(Envelope::Batch(Vec::new())),
                };
            }

            if let Some(max) = config.max_batch_size
                && items.len() > max
            {
                debug!(size = items.len(), max, "Rejecting oversized batch");
                return Err(JsonRpcError::new(
                    None,
                    crate::error::JsonRpcErrorObject::invalid_request(Some(
                        json!({ "max_batch_size": max }),
                    )),
                ));
            }

            Ok(Envelope::Batch(
                items
                    .into_iter()
                    .map(|item| request_from_value(item, metadata))
                    .collect(),
            ))
        }
        other => Ok(Envelope::Single(request_from_value(other, metadata))),
    }
}

/// Build one request from a decoded element.
///
/// Missing members default to `method: None`, empty object params and
/// `id: None`; explicit `null` is treated the same as missing.
pub fn request_from_value(value: Value, metadata: &TransportMetadata) -> Incoming {
    let Value::Object(mut obj) = value else {
        return Err(JsonRpcError::invalid_request(None));
    };

    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => match RequestId::from_value(&raw) {
            Some(id) => Some(id),
            None => return Err(JsonRpcError::invalid_request(None)),
        },
    };

    let method = match obj.remove("method") {
        None | Some(Value::Null) => None,
        Some(Value::String(method)) => Some(method),
        Some(_) => return Err(JsonRpcError::invalid_request(id)),
    };

    let params = match obj.remove("params") {
        None | Some(Value::Null) => RequestParams::default(),
        Some(raw) => match RequestParams::from_value(raw) {
            Some(params) => params,
            None => return Err(JsonRpcError::invalid_request(id)),
        },
    };

    Ok(JsonRpcRequest {
        method,
        params,
        id,
        metadata: metadata.clone(),
    })
}
