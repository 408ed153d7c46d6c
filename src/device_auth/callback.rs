// ABOUTME: Loopback HTTP listener that receives the OAuth authorization redirect
// ABOUTME: Binds 127.0.0.1, serves /callback once and hands the query parameters to the login flow
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::net::{Ipv4Addr, SocketAddr};

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::oauth::CALLBACK_PATH;
use crate::errors::{AppError, AppResult};

const SUCCESS_PAGE: &str = "<!doctype html><html><head><title>Engify</title></head>\
<body><h1>Login received</h1><p>You can close this tab and return to your terminal.</p></body></html>";

/// Query parameters of the authorization redirect (RFC 6749 section 4.1.2)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// CSRF state echoed by the server
    pub state: Option<String>,
    /// Error code when the user or server refused
    pub error: Option<String>,
    /// Error detail
    pub error_description: Option<String>,
}

/// Running loopback listener
pub struct CallbackServer {
    redirect_uri: String,
    receiver: mpsc::Receiver<CallbackParams>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl CallbackServer {
    /// Bind `127.0.0.1:<port>` (0 picks an ephemeral port) and start serving
    ///
    /// # Errors
    /// Returns an error if the port cannot be bound
    pub async fn bind(port: u16) -> AppResult<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
            .await
            .map_err(|e| AppError::config(format!("Cannot listen on 127.0.0.1:{port}: {e}")))?;
        let local = listener.local_addr()?;
        let redirect_uri = format!("http://127.0.0.1:{}{CALLBACK_PATH}", local.port());

        let (sender, receiver) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(sender);

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    // A dropped sender also ends the server
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "Login callback listener stopped");
            }
        });

        debug!(%redirect_uri, "Login callback listening");
        Ok(Self {
            redirect_uri,
            receiver,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    /// The exact redirect URI registered for this login
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the first redirect
    pub async fn next(&mut self) -> Option<CallbackParams> {
        self.receiver.recv().await
    }

    /// Stop listening
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            debug!(error = %e, "Callback listener task ended abnormally");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_callback(
    State(sender): State<mpsc::Sender<CallbackParams>>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    // Only the first redirect counts; later ones are dropped
    if sender.try_send(params).is_err() {
        debug!("Ignoring repeated login callback");
    }
    Html(SUCCESS_PAGE)
}
