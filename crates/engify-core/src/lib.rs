// ABOUTME: Shared model crate for the Engify MCP relay
// ABOUTME: Holds the DTOs exchanged between the launcher, the worker and the record store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # Engify Core
//!
//! Plain data types with no I/O. The launcher, the worker and the tests all
//! depend on these definitions so that wire shapes stay in one place.

/// Domain models (records, audit events, identifiers)
pub mod models;
