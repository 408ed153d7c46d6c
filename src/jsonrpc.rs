// ABOUTME: JSON-RPC 2.0 message types for the worker's stdio protocol
// ABOUTME: Request, response and error structures plus the standard error codes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// Protocol version string carried by every message
pub const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON was received
pub const ERROR_PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid request object
pub const ERROR_INVALID_REQUEST: i32 = -32600;
/// The method does not exist
pub const ERROR_METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters
pub const ERROR_INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error
pub const ERROR_INTERNAL_ERROR: i32 = -32603;
/// Missing, invalid or expired credentials
pub const ERROR_UNAUTHENTICATED: i32 = -32001;
/// Credential valid, access refused
pub const ERROR_FORBIDDEN: i32 = -32003;
/// Nothing visible at that id
pub const ERROR_NOT_FOUND: i32 = -32004;

/// JSON-RPC request or notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0"
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request id; absent for notifications. An explicit `null` is `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
}

fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    /// Build a request
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    /// Notifications carry no id and get no response
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Error with no data
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&AppError> for JsonRpcError {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code.jsonrpc_code(),
            message: error.message.clone(),
            data: Some(serde_json::json!({ "code": error.code })),
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,
    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Id of the request being answered; null when it could not be read
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    /// Successful response
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Error response
    #[must_use]
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Error response derived from an application error
    #[must_use]
    pub fn from_app_error(id: Value, error: &AppError) -> Self {
        Self::error(Some(id), JsonRpcError::from(error))
    }
}
