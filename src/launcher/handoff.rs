// ABOUTME: Credential handoff frame passed from the launcher to the worker
// ABOUTME: One JSON line on the worker's stdin pipe, or two positional arguments in argv mode
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use engify_core::models::UserId;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::credentials::Secret;
use crate::errors::{AppError, AppResult};

/// Longest handoff line accepted from the pipe
const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct FrameOut<'a> {
    user_id: &'a str,
    access_token: &'a str,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FrameIn {
    user_id: String,
    access_token: String,
}

/// The identity a worker is started under
#[derive(Debug, Clone)]
pub struct HandoffFrame {
    /// `sub` of the validated token, as seen by the launcher
    pub user_id: UserId,
    /// The access token itself; the worker validates it again
    pub access_token: Secret,
}

impl HandoffFrame {
    /// Build a frame
    #[must_use]
    pub const fn new(user_id: UserId, access_token: Secret) -> Self {
        Self {
            user_id,
            access_token,
        }
    }

    /// Frame from argv-mode positional arguments
    ///
    /// # Errors
    /// Returns `AuthRequired` when either argument is missing or empty
    pub fn from_args(user_id: Option<String>, access_token: Option<String>) -> AppResult<Self> {
        match (user_id, access_token) {
            (Some(user_id), Some(token)) if !user_id.is_empty() && !token.is_empty() => {
                Ok(Self::new(UserId::new(user_id), Secret::new(token)))
            }
            _ => Err(AppError::auth_required(
                "Worker started without a user id and access token",
            )),
        }
    }

    /// Parse one JSON handoff line
    ///
    /// # Errors
    /// Returns `AuthRequired` for an empty line, `AuthInvalid` for a malformed frame
    pub fn parse(line: &str) -> AppResult<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(AppError::auth_required("No credential handoff received"));
        }
        let frame: FrameIn = serde_json::from_str(line)
            .map_err(|_| AppError::auth_invalid("Credential handoff frame is malformed"))?;
        Self::from_args(Some(frame.user_id), Some(frame.access_token))
            .map_err(|_| AppError::auth_invalid("Credential handoff frame is incomplete"))
    }

    /// Read the first line of `reader` as the handoff frame. The reader is left
    /// positioned at the first byte after the frame.
    ///
    /// # Errors
    /// Returns an authentication error when no usable frame arrives
    pub async fn read_from<R>(reader: &mut R) -> AppResult<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Zeroizing::new(Vec::new());
        let read = reader
            .take(MAX_FRAME_BYTES as u64)
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| AppError::auth_required(format!("Failed to read credential handoff: {e}")))?;

        if read == 0 {
            return Err(AppError::auth_required("No credential handoff received"));
        }
        if !line.ends_with(b"\n") && read >= MAX_FRAME_BYTES {
            return Err(AppError::auth_invalid("Credential handoff frame is too long"));
        }

        let text = std::str::from_utf8(&line)
            .map_err(|_| AppError::auth_invalid("Credential handoff frame is not UTF-8"))?;
        Self::parse(text)
    }

    /// Write the frame as one line
    ///
    /// # Errors
    /// Returns an error if the pipe is closed
    pub async fn write_to<W>(&self, writer: &mut W) -> AppResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line = Zeroizing::new(serde_json::to_vec(&FrameOut {
            user_id: self.user_id.as_str(),
            access_token: self.access_token.expose(),
        })?);
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
