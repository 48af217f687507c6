//! Shared HTTP plumbing for backend clients

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde_json::Value;

use crate::error::CallError;

/// Fallback delay when a 429 carries no usable retry-after header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, CallError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(CallError::Network)
}

/// Send a prepared request and decode a JSON body, mapping failures to `CallError`
pub(crate) async fn send_json(request: RequestBuilder, timeout: Duration) -> Result<Value, CallError> {
    let response = request.send().await.map_err(|e| map_reqwest(e, timeout))?;
    let response = check_status(response).await?;
    response.json().await.map_err(|e| map_reqwest(e, timeout))
}

async fn check_status(response: Response) -> Result<Response, CallError> {
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return Err(CallError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(CallError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

fn map_reqwest(e: reqwest::Error, timeout: Duration) -> CallError {
    if e.is_timeout() {
        CallError::Timeout(timeout)
    } else if e.is_decode() {
        CallError::InvalidResponse(e.to_string())
    } else {
        CallError::Network(e)
    }
}
