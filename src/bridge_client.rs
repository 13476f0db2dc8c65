use crate::{
    bridge::{BridgeSettings, Capabilities, ErrorDescriptor, PartialSettings},
    config::BridgeConfig,
    http_client::{bridge_errors, bridge_http_client, handle_http_response},
    panes::format_update_time,
};
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveTime;
use log::{info, warn};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::{sync::Mutex, time::Duration};
use trait_variant::make;

/// Operations the settings session needs from a bridge
///
/// Every failing call leaves the bridge's own error descriptors in
/// [`DeviceClient::last_errors`] until the next call.
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait DeviceClient {
    async fn read_settings(&self) -> Result<BridgeSettings>;
    async fn read_capabilities(&self) -> Result<Capabilities>;
    async fn read_time_zones(&self) -> Result<Vec<String>>;
    async fn write_settings(&self, settings: PartialSettings) -> Result<()>;
    async fn rename_device(&self, name: String) -> Result<()>;
    async fn check_for_update(&self) -> Result<()>;
    async fn request_firmware_install(&self) -> Result<()>;
    async fn set_auto_install(&self, on: bool, update_time: NaiveTime) -> Result<()>;
    fn last_errors(&self) -> Vec<ErrorDescriptor>;
}

/// [`DeviceClient`] for the bridge's v1 REST API
#[derive(Debug)]
pub struct HueBridgeClient {
    client: Client,
    api_url: String,
    last_errors: Mutex<Vec<ErrorDescriptor>>,
}

impl HueBridgeClient {
    // API endpoint constants
    const CONFIG_ENDPOINT: &str = "/config";
    const CAPABILITIES_ENDPOINT: &str = "/capabilities";
    const TIMEZONES_ENDPOINT: &str = "/info/timezones";

    pub fn new(config: &BridgeConfig) -> Result<Self> {
        ensure!(
            !config.username.is_empty(),
            "failed since no bridge username is configured"
        );

        let client =
            bridge_http_client(config.request_timeout, config.relaxed_certificate_checks())?;

        Ok(Self::with_client(client, config.api_url()))
    }

    /// Client for an explicit API base URL such as `http://host/api/<user>`,
    /// verifying certificates
    pub fn with_api_url(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(
            bridge_http_client(timeout, false)?,
            api_url,
        ))
    }

    fn with_client(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            last_errors: Mutex::new(Vec::new()),
        }
    }

    fn build_url(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn store_errors(&self, errors: Vec<ErrorDescriptor>) {
        if let Ok(mut last_errors) = self.last_errors.lock() {
            *last_errors = errors;
        }
    }

    /// Fail with the bridge's error entries if the body carries any
    fn check_errors(&self, body: &Value, context_msg: &str) -> Result<()> {
        let errors = bridge_errors(body);
        if errors.is_empty() {
            return Ok(());
        }

        let summary = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        self.store_errors(errors);
        bail!("{context_msg} rejected by bridge: {summary}")
    }

    /// GET request to the bridge API
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.store_errors(Vec::new());
        let url = self.build_url(path);
        info!("GET {path}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .context(format!("failed to send GET request to {path}"))?;

        let body = handle_http_response(res, &format!("GET {path}")).await?;
        let value: Value =
            serde_json::from_str(&body).context(format!("failed to parse response of {path}"))?;
        self.check_errors(&value, &format!("GET {path}"))?;

        serde_json::from_value(value).context(format!("failed to decode response of {path}"))
    }

    /// PUT request with JSON body to the bridge's config resource
    async fn put_config(&self, body: Value) -> Result<()> {
        self.store_errors(Vec::new());
        let url = self.build_url(Self::CONFIG_ENDPOINT);
        info!("PUT {} with body: {body}", Self::CONFIG_ENDPOINT);

        let res = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .context(format!(
                "failed to send PUT request to {}",
                Self::CONFIG_ENDPOINT
            ))?;

        let context_msg = format!("PUT {}", Self::CONFIG_ENDPOINT);
        let body = handle_http_response(res, &context_msg).await?;
        let value: Value = serde_json::from_str(&body)
            .context(format!("failed to parse response of {context_msg}"))?;

        self.check_errors(&value, &context_msg)
    }
}

impl DeviceClient for HueBridgeClient {
    async fn read_settings(&self) -> Result<BridgeSettings> {
        self.get(Self::CONFIG_ENDPOINT).await
    }

    async fn read_capabilities(&self) -> Result<Capabilities> {
        self.get(Self::CAPABILITIES_ENDPOINT).await
    }

    async fn read_time_zones(&self) -> Result<Vec<String>> {
        self.get(Self::TIMEZONES_ENDPOINT).await
    }

    async fn write_settings(&self, settings: PartialSettings) -> Result<()> {
        if settings.is_empty() {
            warn!("skipping empty settings write");
            return Ok(());
        }

        let body = serde_json::to_value(&settings).context("failed to serialize settings")?;
        self.put_config(body).await
    }

    async fn rename_device(&self, name: String) -> Result<()> {
        self.put_config(json!({ "name": name })).await
    }

    async fn check_for_update(&self) -> Result<()> {
        self.put_config(json!({ "swupdate2": { "checkforupdate": true } }))
            .await
    }

    async fn request_firmware_install(&self) -> Result<()> {
        self.put_config(json!({ "swupdate2": { "install": true } }))
            .await
    }

    async fn set_auto_install(&self, on: bool, update_time: NaiveTime) -> Result<()> {
        self.put_config(json!({
            "swupdate2": {
                "autoinstall": {
                    "on": on,
                    "updatetime": format_update_time(update_time),
                }
            }
        }))
        .await
    }

    fn last_errors(&self) -> Vec<ErrorDescriptor> {
        self.last_errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_client() -> HueBridgeClient {
        HueBridgeClient::with_api_url("http://localhost/api/user", Duration::from_secs(1))
            .expect("should create client")
    }

    mod build_url {
        use super::*;

        #[test]
        fn normalizes_path_with_leading_slash() {
            let client = create_test_client();
            assert_eq!(
                client.build_url("/config"),
                "http://localhost/api/user/config"
            );
        }

        #[test]
        fn normalizes_path_without_leading_slash() {
            let client = create_test_client();
            assert_eq!(
                client.build_url("info/timezones"),
                "http://localhost/api/user/info/timezones"
            );
        }

        #[test]
        fn handles_trailing_slash_in_base() {
            let client =
                HueBridgeClient::with_api_url("http://localhost/api/user/", Duration::from_secs(1))
                    .unwrap();
            assert_eq!(
                client.build_url("/capabilities"),
                "http://localhost/api/user/capabilities"
            );
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn stores_bridge_errors() {
            let client = create_test_client();
            let body = json!([
                {"error": {"type": 1, "address": "/config", "description": "unauthorized user"}}
            ]);

            let err = client.check_errors(&body, "GET /config").unwrap_err();

            assert!(err.to_string().contains("unauthorized user"));
            assert_eq!(client.last_errors().len(), 1);
            assert_eq!(client.last_errors()[0].kind, 1);
        }

        #[test]
        fn success_keeps_errors_empty() {
            let client = create_test_client();
            let body = json!([{"success": {"/config/name": "Office"}}]);

            assert!(client.check_errors(&body, "PUT /config").is_ok());
            assert!(client.last_errors().is_empty());
        }
    }

    #[test]
    fn new_requires_username() {
        let config = BridgeConfig {
            address: "127.0.0.1".to_string(),
            username: String::new(),
            request_timeout: Duration::from_secs(1),
            use_tls: false,
            accept_invalid_certs: true,
        };

        let err = HueBridgeClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn api_endpoints_are_correctly_defined() {
        assert_eq!(HueBridgeClient::CONFIG_ENDPOINT, "/config");
        assert_eq!(HueBridgeClient::CAPABILITIES_ENDPOINT, "/capabilities");
        assert_eq!(HueBridgeClient::TIMEZONES_ENDPOINT, "/info/timezones");
    }
}
