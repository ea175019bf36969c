use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::error_codes;
use crate::types::{JsonRpcVersion, RequestId};

/// JSON-RPC error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    /// Deployment-specific: the caller lacks the roles the method requires
    NotGranted,
    /// Handler-declared code, passed through verbatim
    Application(i64),
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => error_codes::PARSE_ERROR,
            JsonRpcErrorCode::InvalidRequest => error_codes::INVALID_REQUEST,
            JsonRpcErrorCode::MethodNotFound => error_codes::METHOD_NOT_FOUND,
            JsonRpcErrorCode::InvalidParams => error_codes::INVALID_PARAMS,
            JsonRpcErrorCode::InternalError => error_codes::INTERNAL_ERROR,
            JsonRpcErrorCode::NotGranted => error_codes::METHOD_NOT_GRANTED,
            JsonRpcErrorCode::Application(code) => *code,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::NotGranted => "Method not granted",
            JsonRpcErrorCode::Application(_) => "Application error",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// JSON-RPC Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }

    pub fn parse_error(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::ParseError, None, data)
    }

    pub fn invalid_request(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidRequest, None, data)
    }

    /// The method name goes into `data`; the message stays the standard one.
    pub fn method_not_found(method: Option<&str>) -> Self {
        Self::new(
            JsonRpcErrorCode::MethodNotFound,
            None,
            method.map(|m| Value::String(m.to_string())),
        )
    }

    pub fn invalid_params(data: Option<Value>) -> Self {
        Self::new(JsonRpcErrorCode::InvalidParams, None, data)
    }

    pub fn internal_error(message: Option<String>) -> Self {
        Self::new(JsonRpcErrorCode::InternalError, message, None)
    }

    pub fn not_granted() -> Self {
        Self::new(JsonRpcErrorCode::NotGranted, None, None)
    }

    pub fn application(code: i64, message: &str, data: Option<Value>) -> Self {
        Self::new(
            JsonRpcErrorCode::Application(code),
            Some(message.to_string()),
            data,
        )
    }
}

/// JSON-RPC Error response
///
/// Serialized as `{"jsonrpc":"2.0","error":{...},"id":...}`; the id is written
/// as `null` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub error: JsonRpcErrorObject,
    pub id: Option<RequestId>,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorObject) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            error,
            id,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorObject::parse_error(None))
    }

    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorObject::invalid_request(None))
    }

    pub fn method_not_found(id: Option<RequestId>, method: Option<&str>) -> Self {
        Self::new(id, JsonRpcErrorObject::method_not_found(method))
    }

    pub fn not_granted(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorObject::not_granted())
    }

    pub fn internal_error(id: Option<RequestId>, message: Option<String>) -> Self {
        Self::new(id, JsonRpcErrorObject::internal_error(message))
    }

    pub fn code(&self) -> i64 {
        self.error.code
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JSON-RPC Error {}: {}",
            self.error.code, self.error.message
        )
    }
}

impl std::error::Error for JsonRpcError {}

/// Trait for errors that can be converted to JSON-RPC error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    /// Convert this error to a JSON-RPC error object
    fn to_error_object(&self) -> JsonRpcErrorObject;
}

/// Errors a method handler (or an execute-event subscriber) may return.
///
/// Typed protocol errors are propagated verbatim; `Internal` is reported as a
/// bare "Internal error" so handler internals never reach the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    #[error("Invalid params: {message}")]
    InvalidParams {
        message: String,
        data: Option<Value>,
    },

    #[error("Method not granted")]
    NotGranted,

    #[error("Application error {code}: {message}")]
    Application {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    pub fn application(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Application {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ToJsonRpcError for HandlerError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            HandlerError::InvalidParams { message, data } => JsonRpcErrorObject::new(
                JsonRpcErrorCode::InvalidParams,
                Some(message.clone()),
                data.clone(),
            ),
            HandlerError::NotGranted => JsonRpcErrorObject::not_granted(),
            HandlerError::Application {
                code,
                message,
                data,
            } => JsonRpcErrorObject::application(*code, message, data.clone()),
            HandlerError::Internal(_) => JsonRpcErrorObject::internal_error(None),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::invalid_params(err.to_string())
    }
}

/// Registry build failures, reported per candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("RPC unit '{candidate}' does not define an execute entry point")]
    MissingEntryPoint { candidate: String },

    #[error("Method '{method}' is already registered (candidate '{candidate}')")]
    DuplicateMethod { method: String, candidate: String },

    #[error("RPC unit '{candidate}' resolves to an empty method name")]
    EmptyMethodName { candidate: String },
}

impl BuildError {
    /// Identity of the candidate that failed
    pub fn candidate(&self) -> &str {
        match self {
            BuildError::MissingEntryPoint { candidate }
            | BuildError::DuplicateMethod { candidate, .. }
            | BuildError::EmptyMethodName { candidate } => candidate,
        }
    }
}
