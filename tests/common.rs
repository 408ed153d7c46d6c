// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Test RSA key and JWKS, JWT minting, tenant scopes and a mock authorization server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::uninlined_format_args,
    clippy::redundant_closure_for_method_calls
)]
//! Shared test utilities for `engify_mcp`
//!
//! The mock authorization server implements just enough of the Engify issuer
//! for the login, launcher, worker and search paths: authorize redirect, the
//! three token grants, JWKS, revocation and a search backend.

use std::collections::{HashMap, HashSet};
use std::env;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, Once};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use engify_mcp::config::environment::{OAuthClientConfig, ServerConfig};
use engify_mcp::constants::{env_config, oauth};
use engify_mcp::credentials::Secret;
use engify_mcp::jwks::TokenValidator;
use engify_mcp::oauth2_client::PkceParams;
use engify_mcp::tenant::TenantScope;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Issuer used by tests that never talk to a server
pub const TEST_ISSUER: &str = "https://auth.engify.test";
/// Resource indicator of the tool server
pub const TEST_RESOURCE: &str = "https://mcp.engify.test";
/// Key id of the shared signing key
pub const TEST_KID: &str = "engify-test-key";
/// Public client id
pub const TEST_CLIENT_ID: &str = "engify-cli-test";
/// Audience of the search backend
pub const SEARCH_AUDIENCE: &str = "https://search.engify.test";

static INIT_LOGGER: Once = Once::new();

/// Shared RSA key for all tests (2048-bit generation is expensive, do it once)
static SHARED_TEST_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate shared test key")
});

/// A second key the issuer never published
static ATTACKER_KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("Failed to generate attacker key")
});

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            Ok("WARN" | "ERROR") | _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// JWKS publishing the shared key
pub fn test_jwks() -> JwkSet {
    serde_json::from_value(jwks_json()).expect("valid JWKS")
}

fn jwks_json() -> Value {
    let public = SHARED_TEST_KEY.to_public_key();
    json!({
        "keys": [{
            "kty": "RSA",
            "kid": TEST_KID,
            "use": "sig",
            "alg": "RS256",
            "n": URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            "e": URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }]
    })
}

fn sign_with(key: &RsaPrivateKey, kid: Option<&str>, claims: &Value) -> String {
    let pem = key.to_pkcs1_pem(LineEnding::LF).expect("PEM encoding");
    let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("RSA encoding key");
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_owned);
    encode(&header, claims, &encoding_key).expect("JWT encoding")
}

/// Sign claims with the published key
pub fn mint_token(claims: &Value) -> String {
    sign_with(&SHARED_TEST_KEY, Some(TEST_KID), claims)
}

/// Sign claims with a key the issuer does not publish, under the published kid
pub fn mint_forged_token(claims: &Value) -> String {
    sign_with(&ATTACKER_KEY, Some(TEST_KID), claims)
}

/// Sign claims with HS256 and a shared secret
pub fn mint_hs256_token(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(TEST_KID.to_owned());
    encode(&header, claims, &EncodingKey::from_secret(b"not-the-issuer-key")).expect("JWT encoding")
}

/// Access token claims valid for one hour
pub fn claims_for(sub: &str, aud: &str, iss: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": sub,
        "aud": aud,
        "iss": iss,
        "iat": now,
        "exp": now + 3600,
        "scope": "records:read records:write",
        "jti": uuid::Uuid::new_v4().to_string(),
    })
}

/// Validator for the offline test issuer and resource
pub fn test_validator() -> TokenValidator {
    TokenValidator::new(test_jwks(), TEST_ISSUER, TEST_RESOURCE)
}

/// Tenant scope for `user`, derived through real validation
pub fn scope_for(user: &str) -> TenantScope {
    let token = mint_token(&claims_for(user, TEST_RESOURCE, TEST_ISSUER));
    let validated = test_validator()
        .validate(&Secret::new(token))
        .expect("test token validates");
    TenantScope::from_token(&validated)
}

/// A local port nothing listens on
pub fn unused_local_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Environment-shaped configuration values for a given issuer
pub fn config_values(issuer: &str) -> HashMap<String, String> {
    HashMap::from([
        (env_config::ISSUER_URL.to_owned(), issuer.to_owned()),
        (env_config::CLIENT_ID.to_owned(), TEST_CLIENT_ID.to_owned()),
        (env_config::RESOURCE.to_owned(), TEST_RESOURCE.to_owned()),
        (env_config::HTTP_TIMEOUT_SECS.to_owned(), "5".to_owned()),
        (env_config::DATABASE_URL.to_owned(), "sqlite::memory:".to_owned()),
        (env_config::KEYCHAIN_SERVICE.to_owned(), "ai.engify.mcp.test".to_owned()),
    ])
}

/// Build a configuration from a value map
pub fn config_from(values: &HashMap<String, String>) -> ServerConfig {
    ServerConfig::from_lookup(|key| values.get(key).cloned()).expect("valid test configuration")
}

// ============================================================================
// Mock authorization server
// ============================================================================

struct PendingCode {
    challenge: String,
    redirect_uri: String,
    resource: String,
}

/// Mutable behaviour and recorded traffic of the mock issuer
#[derive(Default)]
pub struct MockState {
    pub issuer: String,
    pub resource: String,
    pub user_id: String,
    /// Refresh tokens the server accepts
    pub refresh_tokens: HashSet<String>,
    /// Issue a new refresh token on every refresh
    pub rotate_refresh: bool,
    /// Replace the `aud` of issued access tokens
    pub audience_override: Option<Value>,
    /// Omit the refresh token from the code grant response
    pub withhold_refresh_token: bool,
    /// Answer authorize with `error=access_denied`
    pub deny_authorization: bool,
    /// Reject every authorization code
    pub reject_codes: bool,
    /// Refuse on-behalf-of exchanges
    pub deny_obo: bool,
    /// Status the search backend answers with instead of 200
    pub search_status: Option<u16>,
    /// `expires_in` of refresh grant responses (default 3600, `Null` omits it)
    pub refresh_expires_in: Option<Value>,
    /// `expires_in` of on-behalf-of responses (default 300, `Null` omits it)
    pub obo_expires_in: Option<Value>,
    /// Lifetime in seconds of minted access tokens (default 3600)
    pub access_token_lifetime: Option<i64>,
    pub issued_access_tokens: HashSet<String>,
    pub obo_tokens: HashSet<String>,
    pub obo_exchanges: usize,
    pub obo_requests: Vec<HashMap<String, String>>,
    pub search_queries: Vec<String>,
    pub revoked: Vec<String>,
    pub token_requests: Vec<HashMap<String, String>>,
    pending: HashMap<String, PendingCode>,
    counter: u64,
}

impl MockState {
    fn next(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    fn issue_access_token(&mut self, resource: &str) -> String {
        let mut claims = claims_for(&self.user_id, resource, &self.issuer);
        if let Some(aud) = &self.audience_override {
            claims["aud"] = aud.clone();
        }
        if let Some(lifetime) = self.access_token_lifetime {
            claims["exp"] = json!(Utc::now().timestamp() + lifetime);
        }
        let token = mint_token(&claims);
        self.issued_access_tokens.insert(token.clone());
        token
    }

    fn code_grant(&mut self, form: &HashMap<String, String>) -> Response {
        let code = form.get("code").cloned().unwrap_or_default();
        let Some(pending) = self.pending.remove(&code) else {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "unknown code");
        };
        if self.reject_codes {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "code rejected");
        }
        let verifier = form.get("code_verifier").map_or("", String::as_str);
        if !PkceParams::verify(verifier, &pending.challenge) {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "PKCE verification failed");
        }
        if form.get("redirect_uri") != Some(&pending.redirect_uri)
            || form.get("resource") != Some(&pending.resource)
        {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "parameter mismatch");
        }

        let access_token = self.issue_access_token(&pending.resource);
        let mut body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "records:read records:write offline_access",
        });
        if !self.withhold_refresh_token {
            let refresh = format!("refresh-{}", self.next());
            self.refresh_tokens.insert(refresh.clone());
            body["refresh_token"] = json!(refresh);
        }
        (StatusCode::OK, Json(body)).into_response()
    }

    fn refresh_grant(&mut self, form: &HashMap<String, String>) -> Response {
        let presented = form.get("refresh_token").cloned().unwrap_or_default();
        if !self.refresh_tokens.contains(&presented) {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "refresh token revoked");
        }
        let resource = form.get("resource").cloned().unwrap_or_default();
        let access_token = self.issue_access_token(&resource);
        let mut body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
        });
        set_expires_in(&mut body, self.refresh_expires_in.as_ref(), 3600);
        if self.rotate_refresh {
            self.refresh_tokens.remove(&presented);
            let rotated = format!("refresh-{}", self.next());
            self.refresh_tokens.insert(rotated.clone());
            body["refresh_token"] = json!(rotated);
        }
        (StatusCode::OK, Json(body)).into_response()
    }

    fn exchange_grant(&mut self, form: &HashMap<String, String>) -> Response {
        self.obo_requests.push(form.clone());
        let subject = form.get("subject_token").cloned().unwrap_or_default();
        if self.deny_obo {
            return oauth_error(StatusCode::BAD_REQUEST, "access_denied", "delegation refused");
        }
        if !self.issued_access_tokens.contains(&subject) {
            return oauth_error(StatusCode::BAD_REQUEST, "invalid_grant", "unknown subject token");
        }
        self.obo_exchanges += 1;
        let token = format!("obo-{}", self.next());
        self.obo_tokens.insert(token.clone());
        let mut body = json!({
            "access_token": token,
            "issued_token_type": oauth::TOKEN_TYPE_ACCESS_TOKEN,
            "token_type": "Bearer",
        });
        set_expires_in(&mut body, self.obo_expires_in.as_ref(), 300);
        (StatusCode::OK, Json(body)).into_response()
    }
}

fn set_expires_in(body: &mut Value, lifetime: Option<&Value>, default: i64) {
    match lifetime {
        None => body["expires_in"] = json!(default),
        Some(Value::Null) => {}
        Some(value) => body["expires_in"] = value.clone(),
    }
}

type Shared = Arc<Mutex<MockState>>;

fn oauth_error(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(json!({ "error": error, "error_description": description })),
    )
        .into_response()
}

async fn authorize(State(state): State<Shared>, Query(params): Query<HashMap<String, String>>) -> Response {
    let mut s = state.lock().unwrap();
    let redirect_uri = params.get("redirect_uri").cloned().unwrap_or_default();
    let mut target = Url::parse(&redirect_uri).unwrap();
    {
        let mut query = target.query_pairs_mut();
        if s.deny_authorization {
            query.append_pair("error", "access_denied");
            query.append_pair("error_description", "user declined");
        } else {
            let code = format!("code-{}", s.next());
            s.pending.insert(
                code.clone(),
                PendingCode {
                    challenge: params.get("code_challenge").cloned().unwrap_or_default(),
                    redirect_uri: redirect_uri.clone(),
                    resource: params.get("resource").cloned().unwrap_or_default(),
                },
            );
            query.append_pair("code", &code);
        }
        if let Some(state_param) = params.get("state") {
            query.append_pair("state", state_param);
        }
    }
    Redirect::to(target.as_str()).into_response()
}

async fn token(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response {
    let mut s = state.lock().unwrap();
    s.token_requests.push(form.clone());
    match form.get("grant_type").map(String::as_str) {
        Some(oauth::GRANT_AUTHORIZATION_CODE) => s.code_grant(&form),
        Some(oauth::GRANT_REFRESH_TOKEN) => s.refresh_grant(&form),
        Some(oauth::GRANT_TOKEN_EXCHANGE) => s.exchange_grant(&form),
        _ => oauth_error(StatusCode::BAD_REQUEST, "unsupported_grant_type", "unknown grant"),
    }
}

async fn jwks() -> Json<Value> {
    Json(jwks_json())
}

async fn revoke(State(state): State<Shared>, Form(form): Form<HashMap<String, String>>) -> StatusCode {
    let mut s = state.lock().unwrap();
    if let Some(token) = form.get("token") {
        s.refresh_tokens.remove(token);
        s.revoked.push(token.clone());
    }
    StatusCode::OK
}

async fn search(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_owned();
    if !s.obo_tokens.contains(&bearer) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(status) = s.search_status {
        return StatusCode::from_u16(status).unwrap().into_response();
    }
    let query = body["query"].as_str().unwrap_or_default().to_owned();
    s.search_queries.push(query.clone());
    Json(json!({
        "results": [
            { "id": "hit-1", "title": format!("About {query}"), "score": 0.92, "snippet": "..." }
        ]
    }))
    .into_response()
}

/// Mock Engify issuer bound to an ephemeral loopback port
pub struct MockAuthServer {
    base_url: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl MockAuthServer {
    /// Start the server; `user_id` is the subject of every issued token
    pub async fn start(user_id: &str) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state: Shared = Arc::new(Mutex::new(MockState {
            issuer: base_url.clone(),
            resource: TEST_RESOURCE.to_owned(),
            user_id: user_id.to_owned(),
            ..MockState::default()
        }));

        let app = Router::new()
            .route(oauth::AUTHORIZE_PATH, get(authorize))
            .route(oauth::TOKEN_PATH, post(token))
            .route(oauth::REVOKE_PATH, post(revoke))
            .route(oauth::JWKS_PATH, get(jwks))
            .route("/v1/search", post(search))
            .with_state(Arc::clone(&state));

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            task,
        }
    }

    /// Issuer URL (also the base of every endpoint)
    pub fn issuer(&self) -> &str {
        &self.base_url
    }

    /// Lock the mock state to configure it or inspect traffic
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Register a refresh token the server will accept
    pub fn accept_refresh_token(&self, token: &str) {
        self.state().refresh_tokens.insert(token.to_owned());
    }

    /// Mint an access token the server considers issued (usable as an OBO subject)
    pub fn issue_access_token(&self) -> String {
        self.state().issue_access_token(TEST_RESOURCE)
    }

    /// Configuration values pointing at this server
    pub fn config_values(&self) -> HashMap<String, String> {
        let mut values = config_values(&self.base_url);
        values.insert(env_config::SEARCH_URL.to_owned(), self.base_url.clone());
        values.insert(env_config::SEARCH_AUDIENCE.to_owned(), SEARCH_AUDIENCE.to_owned());
        values
    }

    /// Full configuration pointing at this server
    pub fn config(&self) -> ServerConfig {
        config_from(&self.config_values())
    }

    /// OAuth client configuration pointing at this server
    pub fn oauth_config(&self) -> OAuthClientConfig {
        self.config().oauth
    }

    /// Validator for tokens issued by this server
    pub fn validator(&self) -> TokenValidator {
        TokenValidator::new(test_jwks(), self.base_url.clone(), TEST_RESOURCE)
    }

    /// Scope for the server's user, from a token the server issued
    pub fn scope(&self) -> TenantScope {
        let token = self.issue_access_token();
        let validated = self.validator().validate(&Secret::new(token)).unwrap();
        TenantScope::from_token(&validated)
    }
}

impl Drop for MockAuthServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Short login timeout for tests that expect to wait
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(300);
