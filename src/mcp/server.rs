// ABOUTME: Newline-delimited JSON-RPC 2.0 loop serving MCP over the worker's stdio
// ABOUTME: initialize, ping, tools/list and tools/call; notifications get no reply
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::constants::service_names::{ENGIFY_MCP_SERVER, MCP_PROTOCOL_VERSION};
use crate::errors::{AppError, AppResult};
use crate::jsonrpc::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ERROR_INVALID_REQUEST, ERROR_METHOD_NOT_FOUND,
    ERROR_PARSE_ERROR, JSONRPC_VERSION,
};

use super::tools::ToolContext;

/// MCP server bound to one tenant scope
pub struct McpServer {
    tools: ToolContext,
}

impl McpServer {
    /// Server over the given tool context
    #[must_use]
    pub const fn new(tools: ToolContext) -> Self {
        Self { tools }
    }

    /// Serve requests from `reader` until EOF, writing one response line per request
    ///
    /// # Errors
    /// Returns an error only when the transport itself fails
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(user_id = %self.tools.scope().user_id(), "MCP worker ready");
        let mut lines = reader.lines();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AppError::internal(format!("Failed to read request: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut bytes = serde_json::to_vec(&response)
                    .map_err(|e| AppError::internal(format!("Failed to encode response: {e}")))?;
                bytes.push(b'\n');
                writer.write_all(&bytes).await?;
                writer.flush().await?;
            }
        }

        info!("Client closed the connection");
        Ok(())
    }

    /// Handle one raw message line
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparseable JSON-RPC message");
                return Some(JsonRpcResponse::error(
                    None,
                    JsonRpcError::new(ERROR_PARSE_ERROR, "Parse error"),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::new(ERROR_INVALID_REQUEST, format!("Invalid request: {e}")),
                ))
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::new(ERROR_INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        self.handle_request(request).await
    }

    /// Dispatch a parsed request; `None` for notifications
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!(method = %request.method, "Notification received");
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        if id.is_null() {
            return Some(JsonRpcResponse::error(
                Some(id),
                JsonRpcError::new(ERROR_INVALID_REQUEST, "Request id must not be null"),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, Self::initialize_result()),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => {
                let tools: Vec<_> = self
                    .tools
                    .available_tools()
                    .into_iter()
                    .map(|tool| tool.definition())
                    .collect();
                JsonRpcResponse::success(id, json!({ "tools": tools }))
            }
            "tools/call" => self.handle_tool_call(id, request.params).await,
            other => JsonRpcResponse::error(
                Some(id),
                JsonRpcError::new(ERROR_METHOD_NOT_FOUND, format!("Method not found: {other}")),
            ),
        };
        Some(response)
    }

    fn initialize_result() -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": ENGIFY_MCP_SERVER,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn handle_tool_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::from_app_error(
                id,
                &AppError::invalid_input("tools/call requires a tool name"),
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self.tools.call(name, arguments).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                JsonRpcResponse::success(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": text }],
                        "structuredContent": result,
                        "isError": false
                    }),
                )
            }
            Err(e) => {
                debug!(tool = name, error = %e, "Tool call failed");
                JsonRpcResponse::from_app_error(id, &e)
            }
        }
    }
}
