// ABOUTME: MCP worker: stdio JSON-RPC server, tool dispatch and tenant isolation
// ABOUTME: The worker only ever acts for the user of the token it was started with
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

/// Stdio JSON-RPC loop
pub mod server;
/// Tenant boundary enforcement
pub mod tenant_isolation;
/// Tool catalogue and dispatch
pub mod tools;

pub use server::McpServer;
pub use tenant_isolation::TenantIsolation;
pub use tools::{ToolContext, ToolDefinition, ToolId};
