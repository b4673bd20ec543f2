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

//! Plumbing shared by the HTTP clients

use crate::errors::{EdgeError, EdgeResult};
use reqwest::{Client, Response, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client() -> EdgeResult<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| EdgeError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Exponential backoff for requests that are safe to repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub(crate) async fn run<F, Fut>(&self, mut request_fn: F) -> EdgeResult<Response>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries.max(1) => {
                    error!("Request failed after {} attempts: {}", attempts, e);
                    return Err(EdgeError::Http(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

/// Map a non-2xx status onto the error taxonomy
pub(crate) async fn ensure_success(response: Response, context: &str) -> EdgeResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("❌ [{}] Authentication failed", context);
            Err(EdgeError::AuthenticationFailed)
        }
        status => {
            let message = response.text().await.unwrap_or_default();
            error!("❌ [{}] Status {}: {}", context, status, message);
            Err(EdgeError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}
