// ABOUTME: Application constants shared by the CLI, the launcher and the worker
// ABOUTME: Environment variable names, OAuth grant URNs, defaults and service identity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

/// Service identity
pub mod service_names {
    /// Name reported in the MCP `initialize` response
    pub const ENGIFY_MCP_SERVER: &str = "engify-mcp";
    /// MCP protocol revision implemented by the worker
    pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
}

/// Environment variable names
pub mod env_config {
    /// Authorization server issuer URL
    pub const ISSUER_URL: &str = "ENGIFY_ISSUER_URL";
    /// Public OAuth client id of the CLI
    pub const CLIENT_ID: &str = "ENGIFY_CLIENT_ID";
    /// RFC 8707 resource indicator of the tool server
    pub const RESOURCE: &str = "ENGIFY_RESOURCE";
    /// Space-separated scopes requested at login
    pub const SCOPES: &str = "ENGIFY_SCOPES";
    /// Authorization endpoint override
    pub const AUTHORIZE_URL: &str = "ENGIFY_AUTHORIZE_URL";
    /// Token endpoint override
    pub const TOKEN_URL: &str = "ENGIFY_TOKEN_URL";
    /// JWKS endpoint override
    pub const JWKS_URL: &str = "ENGIFY_JWKS_URL";
    /// Revocation endpoint override
    pub const REVOCATION_URL: &str = "ENGIFY_REVOCATION_URL";
    /// Keychain service name
    pub const KEYCHAIN_SERVICE: &str = "ENGIFY_KEYCHAIN_SERVICE";
    /// Keychain account name
    pub const KEYCHAIN_ACCOUNT: &str = "ENGIFY_KEYCHAIN_ACCOUNT";
    /// Timeout for every OAuth round trip, seconds
    pub const HTTP_TIMEOUT_SECS: &str = "ENGIFY_HTTP_TIMEOUT_SECS";
    /// Loopback port for the login redirect (0 = ephemeral)
    pub const CALLBACK_PORT: &str = "ENGIFY_CALLBACK_PORT";
    /// How long login waits for the browser, seconds
    pub const LOGIN_TIMEOUT_SECS: &str = "ENGIFY_LOGIN_TIMEOUT_SECS";
    /// Worker executable path, taken verbatim (may contain spaces)
    pub const WORKER_COMMAND: &str = "ENGIFY_WORKER_COMMAND";
    /// Fixed worker arguments, whitespace separated
    pub const WORKER_ARGS: &str = "ENGIFY_WORKER_ARGS";
    /// Credential handoff mode (`stdin` or `argv`)
    pub const HANDOFF: &str = "ENGIFY_HANDOFF";
    /// Record store URL
    pub const DATABASE_URL: &str = "ENGIFY_DATABASE_URL";
    /// Semantic search backend base URL
    pub const SEARCH_URL: &str = "ENGIFY_SEARCH_URL";
    /// Audience requested in the on-behalf-of exchange
    pub const SEARCH_AUDIENCE: &str = "ENGIFY_SEARCH_AUDIENCE";
    /// Scope requested in the on-behalf-of exchange
    pub const SEARCH_SCOPE: &str = "ENGIFY_SEARCH_SCOPE";
    /// Log output format (`text` or `json`)
    pub const LOG_FORMAT: &str = "ENGIFY_LOG_FORMAT";
}

/// Default values
pub mod defaults {
    /// Keychain service name
    pub const KEYCHAIN_SERVICE: &str = "ai.engify.mcp";
    /// Keychain account name
    pub const KEYCHAIN_ACCOUNT: &str = "refresh_token";
    /// Scopes requested at login
    pub const SCOPES: &str = "records:read records:write offline_access";
    /// OAuth round-trip timeout
    pub const HTTP_TIMEOUT_SECS: u64 = 10;
    /// Login wait
    pub const LOGIN_TIMEOUT_SECS: u64 = 300;
    /// Scope requested from the search backend
    pub const SEARCH_SCOPE: &str = "search:query";
    /// Worker binary name
    pub const WORKER_BINARY: &str = "engify-worker";
    /// Clock skew tolerated when checking `exp`, seconds
    pub const TOKEN_LEEWAY_SECS: u64 = 30;
    /// Cached on-behalf-of tokens are dropped this long before expiry, seconds
    pub const OBO_REFRESH_MARGIN_SECS: i64 = 30;
}

/// OAuth 2.x protocol literals
pub mod oauth {
    /// Authorization code grant
    pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
    /// Refresh token grant
    pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
    /// RFC 8693 token exchange grant
    pub const GRANT_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
    /// RFC 8693 access token type
    pub const TOKEN_TYPE_ACCESS_TOKEN: &str = "urn:ietf:params:oauth:token-type:access_token";
    /// PKCE challenge method
    pub const PKCE_METHOD_S256: &str = "S256";
    /// Path of the loopback redirect
    pub const CALLBACK_PATH: &str = "/callback";
    /// Authorization endpoint path relative to the issuer
    pub const AUTHORIZE_PATH: &str = "/oauth2/authorize";
    /// Token endpoint path relative to the issuer
    pub const TOKEN_PATH: &str = "/oauth2/token";
    /// Revocation endpoint path relative to the issuer
    pub const REVOKE_PATH: &str = "/oauth2/revoke";
    /// JWKS path relative to the issuer
    pub const JWKS_PATH: &str = "/.well-known/jwks.json";
}

/// Argument names the worker refuses: the owner always comes from the token
pub const FORBIDDEN_OWNER_ARGUMENTS: &[&str] = &["user_id", "owner_id", "userId", "ownerId"];
