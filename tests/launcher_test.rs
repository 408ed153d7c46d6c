// ABOUTME: Tests for the credential-relay launcher and the launcher-to-worker pipeline
// ABOUTME: Refusal before spawn, refresh token rotation, stdio relay, exit codes and end-to-end tenant isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use engify_mcp::config::environment::{HandoffMode, LauncherConfig};
use engify_mcp::credentials::{CredentialStore, MemoryStore, Secret};
use engify_mcp::errors::{ErrorCode, EXIT_AUTH_FAILURE};
use engify_mcp::launcher::Launcher;
use engify_mcp::oauth2_client::OAuth2Client;
use serde_json::json;

use common::{init_test_logging, MockAuthServer};

fn never_spawned() -> LauncherConfig {
    LauncherConfig {
        worker_program: PathBuf::from("/nonexistent/engify-worker"),
        worker_args: Vec::new(),
        handoff: HandoffMode::Stdin,
    }
}

fn launcher(server: &MockAuthServer, store: &Arc<MemoryStore>, config: LauncherConfig) -> Launcher {
    let oauth = OAuth2Client::new(server.oauth_config()).unwrap();
    Launcher::new(oauth, Arc::clone(store) as Arc<dyn CredentialStore>, config)
}

fn store_with(server: &MockAuthServer, refresh_token: &str) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_secret(
        &server.config().keychain,
        Secret::new(refresh_token),
    ))
}

#[tokio::test]
async fn test_no_stored_login_refuses_to_start() {
    init_test_logging();
    let server = MockAuthServer::start("user-alice").await;
    let store = Arc::new(MemoryStore::new(&server.config().keychain));

    let error = launcher(&server, &store, never_spawned())
        .run(Cursor::new(Vec::new()), tokio::io::sink())
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::AuthRequired);
    assert_eq!(error.code.exit_code(), EXIT_AUTH_FAILURE);
    assert!(error.user_message().contains("engify-cli auth login"));
    assert!(server.state().token_requests.is_empty());
}

#[tokio::test]
async fn test_revoked_refresh_token_refuses_to_start() {
    let server = MockAuthServer::start("user-alice").await;
    let store = store_with(&server, "revoked-token");

    let error = launcher(&server, &store, never_spawned())
        .run(Cursor::new(Vec::new()), tokio::io::sink())
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::AuthExpired);
    assert_eq!(error.code.exit_code(), EXIT_AUTH_FAILURE);
    // The stored token is left for the user to replace
    assert_eq!(store.get().unwrap().unwrap().expose(), "revoked-token");
}

#[tokio::test]
async fn test_token_for_other_audience_refuses_to_start() {
    let server = MockAuthServer::start("user-alice").await;
    server.accept_refresh_token("refresh-seed");
    server.state().audience_override = Some(json!(["https://mcp.engify.test", "https://admin.engify.test"]));
    let store = store_with(&server, "refresh-seed");

    let error = launcher(&server, &store, never_spawned())
        .run(Cursor::new(Vec::new()), tokio::io::sink())
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::AuthInvalid);
    assert_eq!(error.code.exit_code(), EXIT_AUTH_FAILURE);
}

#[tokio::test]
async fn test_unreachable_issuer_refuses_to_start() {
    let values = common::config_values(&format!(
        "http://127.0.0.1:{}",
        common::unused_local_port()
    ));
    let config = common::config_from(&values);
    let store = Arc::new(MemoryStore::with_secret(&config.keychain, Secret::new("refresh-seed")));
    let launcher = Launcher::new(
        OAuth2Client::new(config.oauth).unwrap(),
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        never_spawned(),
    );

    let error = launcher
        .run(Cursor::new(Vec::new()), tokio::io::sink())
        .await
        .unwrap_err();
    assert!(error.is_auth_failure());
    assert_eq!(error.code.exit_code(), EXIT_AUTH_FAILURE);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_stored() {
    let server = MockAuthServer::start("user-alice").await;
    server.accept_refresh_token("refresh-seed");
    server.state().rotate_refresh = true;
    let store = store_with(&server, "refresh-seed");

    let validated = launcher(&server, &store, never_spawned())
        .authenticate()
        .await
        .unwrap();
    assert_eq!(validated.user_id().as_str(), "user-alice");

    let stored = store.get().unwrap().unwrap();
    assert_ne!(stored.expose(), "refresh-seed");
    assert!(server.state().refresh_tokens.contains(stored.expose()));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_spawn_failure_is_not_an_auth_failure() {
    let server = MockAuthServer::start("user-alice").await;
    server.accept_refresh_token("refresh-seed");
    let store = store_with(&server, "refresh-seed");

    let error = launcher(&server, &store, never_spawned())
        .run(Cursor::new(Vec::new()), tokio::io::sink())
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::InternalError);
    assert_eq!(error.code.exit_code(), 1);
}

#[cfg(unix)]
mod process {
    use std::process::Stdio;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::process::Command;

    use super::*;

    async fn run_worker(
        server: &MockAuthServer,
        config: LauncherConfig,
        input: &str,
    ) -> (i32, String) {
        server.accept_refresh_token("refresh-seed");
        let store = store_with(server, "refresh-seed");
        let (host_out, mut reader) = tokio::io::duplex(1024 * 1024);

        let code = launcher(server, &store, config)
            .run(Cursor::new(input.as_bytes().to_vec()), host_out)
            .await
            .unwrap();

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        (code, output)
    }

    fn shell(script: &str, handoff: HandoffMode) -> LauncherConfig {
        LauncherConfig {
            worker_program: PathBuf::from("sh"),
            worker_args: vec!["-c".to_owned(), script.to_owned()],
            handoff,
        }
    }

    #[tokio::test]
    async fn test_handoff_frame_precedes_host_input() {
        let server = MockAuthServer::start("user-alice").await;
        let (code, output) = run_worker(&server, shell("cat", HandoffMode::Stdin), "hello\n").await;

        assert_eq!(code, 0);
        let mut lines = output.lines();
        let frame: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(frame["user_id"], "user-alice");
        let token = Secret::new(frame["access_token"].as_str().unwrap());
        assert!(server.validator().validate(&token).is_ok());
        assert_eq!(lines.next(), Some("hello"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_argv_handoff_appends_identity() {
        let server = MockAuthServer::start("user-alice").await;
        let config = shell("printf '%s\\n' \"$0\"; cat", HandoffMode::Argv);
        let (code, output) = run_worker(&server, config, "hello\n").await;

        assert_eq!(code, 0);
        // No frame on stdin in argv mode
        assert_eq!(output, "user-alice\nhello\n");
    }

    #[tokio::test]
    async fn test_worker_exit_code_is_propagated() {
        let server = MockAuthServer::start("user-alice").await;
        let config = shell("cat >/dev/null; exit 3", HandoffMode::Stdin);
        let (code, output) = run_worker(&server, config, "ignored\n").await;

        assert_eq!(code, 3);
        assert!(output.is_empty());
    }

    fn worker_env(server: &MockAuthServer, database_url: &str) -> Vec<(String, String)> {
        let mut values = server.config_values();
        values.remove(engify_mcp::constants::env_config::SEARCH_URL);
        values.remove(engify_mcp::constants::env_config::SEARCH_AUDIENCE);
        values.insert(
            engify_mcp::constants::env_config::DATABASE_URL.to_owned(),
            database_url.to_owned(),
        );
        values.into_iter().collect()
    }

    /// `env VAR=value ... engify-worker [args]`
    fn real_worker(server: &MockAuthServer, database_url: &str, handoff: HandoffMode) -> LauncherConfig {
        let mut worker_args: Vec<String> = worker_env(server, database_url)
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        worker_args.push(env!("CARGO_BIN_EXE_engify-worker").to_owned());
        LauncherConfig {
            worker_program: PathBuf::from("env"),
            worker_args,
            handoff,
        }
    }

    async fn seeded_database(dir: &tempfile::TempDir, server: &MockAuthServer) -> (String, String) {
        use engify_mcp::database::Database;
        use engify_mcp::models::{Collection, NewRecord, RecordStatus};

        let url = format!("sqlite://{}?mode=rwc", dir.path().join("records.db").display());
        let db = Database::new(&url).await.unwrap();
        let record = |title: &str| NewRecord {
            collection: Collection::Notes,
            title: title.to_owned(),
            body: json!(null),
            status: RecordStatus::Active,
        };
        db.create_record(&server.scope(), &record("alice's note"))
            .await
            .unwrap();
        let bob_record = db
            .create_record(&common::scope_for("user-bob"), &record("bob's note"))
            .await
            .unwrap();
        db.pool().close().await;
        (url, bob_record.id.to_string())
    }

    fn requests(bob_record: &str) -> String {
        [
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
            json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                    "params": { "name": "list_records", "arguments": {} } }),
            json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": { "name": "get_record", "arguments": { "id": bob_record } } }),
            json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                    "params": { "name": "list_records", "arguments": { "owner_id": "user-bob" } } }),
        ]
        .iter()
        .map(|request| format!("{request}\n"))
        .collect()
    }

    fn assert_alice_only(output: &str) {
        let responses: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(responses.len(), 4, "{output}");

        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "engify-mcp");

        let listed = &responses[1]["result"]["structuredContent"];
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["records"][0]["title"], "alice's note");
        assert_eq!(listed["records"][0]["owner_id"], "user-alice");

        assert_eq!(responses[2]["error"]["code"], -32004);
        assert_eq!(responses[3]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_end_to_end_stdin_handoff() {
        init_test_logging();
        let server = MockAuthServer::start("user-alice").await;
        let dir = tempfile::tempdir().unwrap();
        let (url, bob_record) = seeded_database(&dir, &server).await;

        let config = real_worker(&server, &url, HandoffMode::Stdin);
        let (code, output) = run_worker(&server, config, &requests(&bob_record)).await;

        assert_eq!(code, 0);
        assert_alice_only(&output);
    }

    #[tokio::test]
    async fn test_end_to_end_argv_handoff() {
        let server = MockAuthServer::start("user-alice").await;
        let dir = tempfile::tempdir().unwrap();
        let (url, bob_record) = seeded_database(&dir, &server).await;

        let config = real_worker(&server, &url, HandoffMode::Argv);
        let (code, output) = run_worker(&server, config, &requests(&bob_record)).await;

        assert_eq!(code, 0);
        assert_alice_only(&output);
    }

    #[tokio::test]
    async fn test_worker_refuses_handoff_for_another_user() {
        let server = MockAuthServer::start("user-alice").await;
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("records.db").display());

        let mut child = Command::new(env!("CARGO_BIN_EXE_engify-worker"))
            .envs(worker_env(&server, &url))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let frame = json!({ "user_id": "user-bob", "access_token": server.issue_access_token() });
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(format!("{frame}\n").as_bytes()).await.unwrap();
        drop(stdin);

        let output = child.wait_with_output().await.unwrap();
        assert_eq!(output.status.code(), Some(EXIT_AUTH_FAILURE));
        assert!(output.stdout.is_empty());
        // Refused before the record store was opened
        assert!(!dir.path().join("records.db").exists());
    }

    #[tokio::test]
    async fn test_worker_without_handoff_exits_with_auth_failure() {
        let server = MockAuthServer::start("user-alice").await;
        let output = Command::new(env!("CARGO_BIN_EXE_engify-worker"))
            .envs(worker_env(&server, "sqlite::memory:"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .unwrap();

        assert_eq!(output.status.code(), Some(EXIT_AUTH_FAILURE));
        assert!(output.stdout.is_empty());
    }
}
