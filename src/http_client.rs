use crate::bridge::ErrorDescriptor;
use anyhow::{Context, Result, ensure};
use log::warn;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

/// Create an HTTP client for talking to a bridge
///
/// # Arguments
/// * `timeout` - Per-request timeout
/// * `accept_invalid_certs` - Accept self-signed bridge certificates
pub fn bridge_http_client(timeout: Duration, accept_invalid_certs: bool) -> Result<Client> {
    if accept_invalid_certs {
        warn!("TLS certificate verification of the bridge is disabled");
    }

    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .context("failed to create bridge HTTP client")
}

/// Handle HTTP response by checking status and extracting body
///
/// # Arguments
/// * `res` - The HTTP response to handle
/// * `context_msg` - Context message describing the request (e.g., "GET /config")
///
/// # Returns
/// * `Ok(String)` - The response body if the status is successful
/// * `Err` - If the status is not successful or reading the body fails
pub async fn handle_http_response(res: Response, context_msg: &str) -> Result<String> {
    let status = res.status();
    let body = res.text().await.context("failed to read response body")?;

    ensure!(
        status.is_success(),
        "{context_msg} failed with status {status} and body: {body}"
    );

    Ok(body)
}

/// Collect the `{"error": {...}}` entries of a bridge response
///
/// The bridge answers with HTTP 200 even when a request failed; failures come
/// as an array of error objects instead.
pub fn bridge_errors(body: &Value) -> Vec<ErrorDescriptor> {
    let Value::Array(entries) = body else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| entry.get("error"))
        .filter_map(|error| serde_json::from_value(error.clone()).ok())
        .collect()
}
