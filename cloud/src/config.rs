use serde::{Deserialize, Serialize};
use std::fmt;

pub const HTTPS_PROXY_VARS: [&str; 2] = ["HTTPS_PROXY", "https_proxy"];

/// Connection settings shared by the storage and environment clients.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    #[serde(alias = "accessKeyId")]
    pub access_key_id: Option<String>,
    #[serde(alias = "secretAccessKey")]
    pub secret_access_key: Option<String>,
    /// Alternative endpoint such as a LocalStack instance.
    #[serde(alias = "endpointUrl")]
    pub endpoint_url: Option<String>,
    /// Proxy for outbound API traffic; takes precedence over `HTTPS_PROXY`.
    #[serde(alias = "httpsProxy")]
    pub https_proxy: Option<String>,
}

// Keeps the secret key out of logs.
impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .field("https_proxy", &self.https_proxy)
            .finish()
    }
}

impl AwsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_https_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(proxy.into());
        self
    }

    /// Overlays every field that is set in `other`.
    pub fn merge(mut self, other: AwsConfig) -> Self {
        self.region = other.region.or(self.region);
        self.profile = other.profile.or(self.profile);
        self.access_key_id = other.access_key_id.or(self.access_key_id);
        self.secret_access_key = other.secret_access_key.or(self.secret_access_key);
        self.endpoint_url = other.endpoint_url.or(self.endpoint_url);
        self.https_proxy = other.https_proxy.or(self.https_proxy);
        self
    }

    pub fn has_static_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(
                "access_key_id and secret_access_key must be provided together".to_string(),
            );
        }

        if let Some(region) = &self.region {
            if region.trim().is_empty() {
                return Err("Region cannot be empty".to_string());
            }
        }

        if let Some(profile) = &self.profile {
            if profile.trim().is_empty() {
                return Err("Profile name cannot be empty".to_string());
            }
        }

        if let Some(url) = &self.endpoint_url {
            check_url("Endpoint URL", url)?;
        }

        if let Some(url) = &self.https_proxy {
            check_url("HTTPS proxy", url)?;
        }

        Ok(())
    }
}

/// `HTTPS_PROXY` (or `https_proxy`) when set to something non-blank.
pub fn https_proxy_from_env() -> Result<Option<String>, String> {
    let value = HTTPS_PROXY_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty());

    match value {
        Some(url) => {
            check_url("HTTPS_PROXY", &url)?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

fn check_url(name: &str, url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("{} must start with http:// or https://", name))
    }
}
