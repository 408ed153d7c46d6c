// ABOUTME: Tenant-scoped MCP worker started by engify-launcher
// ABOUTME: Validates the handed-over token, opens the record store and serves JSON-RPC on stdio
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

//! # engify-worker
//!
//! Not meant to be run by hand. The launcher starts it and either writes a
//! handoff frame as the first stdin line (default) or passes
//! `<user_id> <access_token>` as arguments (`ENGIFY_HANDOFF=argv`).

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use engify_mcp::config::environment::{LogFormat, ServerConfig};
use engify_mcp::database::Database;
use engify_mcp::errors::{AppError, AppResult, EXIT_FAILURE};
use engify_mcp::jwks::TokenValidator;
use engify_mcp::launcher::HandoffFrame;
use engify_mcp::logging;
use engify_mcp::mcp::{McpServer, TenantIsolation, ToolContext};
use engify_mcp::oauth2_client::OAuth2Client;
use engify_mcp::search::SearchClient;
use engify_mcp::security::SecurityAuditor;
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Handoff {
    /// First stdin line is a JSON frame
    Stdin,
    /// User id and token are positional arguments
    Argv,
}

#[derive(Parser)]
#[command(name = "engify-worker", version, about = "Engify MCP worker (started by engify-launcher)")]
struct Args {
    /// How the identity is handed over; inferred from the arguments when omitted
    #[arg(long, value_enum)]
    handoff: Option<Handoff>,

    /// User id (argv handoff)
    user_id: Option<String>,

    /// Access token (argv handoff)
    access_token: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(LogFormat::Text, "warn");
            return fail(&e);
        }
    };
    if let Err(e) = logging::init(config.log_format, "info") {
        eprintln!("engify-worker: {e}");
    }

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

async fn run(args: Args, config: ServerConfig) -> AppResult<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());

    let handoff = args.handoff.unwrap_or(if args.user_id.is_some() {
        Handoff::Argv
    } else {
        Handoff::Stdin
    });
    let frame = match handoff {
        Handoff::Stdin => HandoffFrame::read_from(&mut stdin).await?,
        Handoff::Argv => HandoffFrame::from_args(args.user_id, args.access_token)?,
    };

    // Identity first: nothing touches the record store until the token checks out
    let oauth = OAuth2Client::new(config.oauth.clone())?;
    let validator = TokenValidator::fetch(&oauth).await?;
    let auditor = SecurityAuditor::new("worker");
    let isolation = TenantIsolation::new(auditor);
    let scope = isolation.establish(&frame, &validator)?;
    drop(frame);

    let database = Database::new(&config.worker.database_url).await?;
    let search = config
        .worker
        .search
        .clone()
        .map(|search| SearchClient::new(oauth.clone(), search, auditor))
        .transpose()?;

    info!(
        user_id = %scope.user_id(),
        search = search.is_some(),
        "Worker authenticated"
    );

    let server = McpServer::new(ToolContext::new(scope, database, search, isolation));
    server.serve(stdin, tokio::io::stdout()).await
}

fn fail(error: &AppError) -> ExitCode {
    error!(code = ?error.code, "Worker stopped: {}", error.message);
    let code = u8::try_from(error.code.exit_code()).unwrap_or(EXIT_FAILURE as u8);
    ExitCode::from(code)
}
