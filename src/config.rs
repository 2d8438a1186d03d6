//! Configuration management

use std::{net::IpAddr, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default Red Hat SSO issuer
pub const DEFAULT_SSO_ISSUER: &str = "https://sso.redhat.com/auth/realms/redhat-external";

/// Default telemetry backend (Observatorium staging)
pub const DEFAULT_TELEMETRY_URL: &str = "https://observatorium.api.stage.openshift.com";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Server configuration
    pub server: ServerConfig,
    /// SSO / OAuth2 configuration
    pub sso: SsoConfig,
    /// Telemetry backend configuration
    pub telemetry: TelemetryConfig,
    /// Inference service configuration
    pub inference: InferenceConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Retry configuration for the token refresh path
    pub retry: RetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: [0, 0, 0, 0].into(),
            port: 8080,
        }
    }
}

/// SSO / OAuth2 client-credentials configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoConfig {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Issuer base URL; the OpenID discovery document lives under
    /// `{issuer}/.well-known/openid-configuration`
    pub issuer: String,
    /// Disable TLS certificate verification (staging environments only)
    pub allow_insecure: bool,
}

impl Default for SsoConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            issuer: DEFAULT_SSO_ISSUER.to_string(),
            allow_insecure: false,
        }
    }
}

/// Telemetry backend (Observatorium) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Base URL of the telemetry backend
    pub base_url: String,
    /// Tenant under `/api/metrics/v1/{tenant}`
    pub tenant: String,
    /// Per-request timeout for telemetry queries
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// How far back the query `time` parameter points, bounding data staleness
    #[serde(with = "humantime_serde")]
    pub max_data_age: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_TELEMETRY_URL.to_string(),
            tenant: "telemeter".to_string(),
            request_timeout: Duration::from_secs(10),
            max_data_age: Duration::from_secs(6 * 60),
        }
    }
}

/// Inference (scoring) service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Per-request timeout for inference calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Cache configuration for telemetry lookup results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable result caching; `false` degrades every lookup to pass-through
    pub enabled: bool,
    /// Time-to-live for cached entries
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Maximum number of entries before eviction
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(120),
            max_entries: 1_000,
        }
    }
}

/// Retry configuration for the token refresh path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts before the last error is surfaced
    pub max_attempts: u32,
    /// Base backoff delay, doubled per attempt
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Backoff ceiling
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Settings {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or required SSO credentials are missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (UPGRADE_RISK_ prefix)
        figment = figment.merge(Env::prefixed("UPGRADE_RISK_").split("__"));

        let settings: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations that cannot authenticate or reach collaborators
    fn validate(&self) -> Result<()> {
        if self.sso.client_id.is_empty() {
            return Err(Error::Config("sso.client_id is required".to_string()));
        }
        if self.sso.client_secret.is_empty() {
            return Err(Error::Config("sso.client_secret is required".to_string()));
        }
        if self.inference.base_url.is_empty() {
            return Err(Error::Config("inference.base_url is required".to_string()));
        }
        Ok(())
    }
}
