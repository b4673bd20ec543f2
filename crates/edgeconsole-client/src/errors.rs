// Copyright (c) 2025 The EdgeConsole Authors
//
// This file is part of EdgeConsole.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact the EdgeConsole maintainers.

use edgeconsole_types::{JsonRpcError, TierViolation, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Console returned error status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("RPC Error: {message}")]
    Rpc { code: i64, message: String },

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Not connected to the edge")]
    NotConnected,

    #[error("Connection closed before a response arrived")]
    ConnectionClosed,

    #[error("Request '{method}' timed out")]
    Timeout { method: String },

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration value: {0}")]
    Validation(#[from] ValidationError),

    #[error("Tier limit: {0}")]
    Tier(#[from] TierViolation),

    #[error("No configuration PID found for '{0}'")]
    PidNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JsonRpcError> for EdgeError {
    fn from(error: JsonRpcError) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EdgeError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(error.to_string())
    }
}

pub type EdgeResult<T> = Result<T, EdgeError>;
