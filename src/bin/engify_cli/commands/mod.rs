// ABOUTME: Subcommand implementations for engify-cli
// ABOUTME: One module per `auth` action
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

pub mod login;
pub mod logout;
pub mod status;
