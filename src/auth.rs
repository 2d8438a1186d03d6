//! OAuth2 client-credentials token lifecycle
//!
//! [`TokenManager`] owns the access token used for telemetry queries. It
//! discovers the token endpoint from the issuer's OpenID configuration at
//! construction time, then keeps the token usable via [`TokenManager::ensure_fresh`]:
//! a no-op while the token still has a safety margin before expiry, a
//! client-credentials exchange otherwise. The credential is replaced
//! atomically and concurrent refreshes collapse into one handshake.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SsoConfig;
use crate::{Error, Result};

/// Refresh the token this long before it actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// An access token with its expiry, replaced wholesale on refresh
#[derive(Debug, Clone)]
pub struct Credential {
    /// Bearer access token
    pub access_token: String,
    /// Expiry as a Unix timestamp (seconds)
    pub expires_at: u64,
}

impl Credential {
    /// Whether the credential is still usable with the safety margin applied
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.expires_at > now + EXPIRY_MARGIN.as_secs()
    }
}

/// OpenID discovery document; only the token endpoint matters here
#[derive(Debug, Deserialize)]
struct OidcConfiguration {
    token_endpoint: String,
}

/// Token endpoint response for the client-credentials grant
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<u64>,
}

impl TokenResponse {
    fn into_credential(self) -> Credential {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let expires_at = self
            .expires_at
            .or(self.expires_in.map(|secs| now + secs))
            .unwrap_or(now);
        Credential {
            access_token: self.access_token,
            expires_at,
        }
    }
}

/// Manages the OAuth2 client-credentials handshake and the current token
pub struct TokenManager {
    http: Client,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    credential: RwLock<Option<Credential>>,
    /// Serializes the slow refresh path so concurrent callers collapse
    /// into a single in-flight handshake
    refresh_lock: tokio::sync::Mutex<()>,
}

impl TokenManager {
    /// Discover the token endpoint and build the manager.
    ///
    /// One per process; construct once at startup and share via `Arc`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the discovery document is unreachable
    /// or malformed. This is an irrecoverable configuration error and is
    /// never retried.
    pub async fn connect(http: Client, sso: &SsoConfig) -> Result<Self> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            sso.issuer.trim_end_matches('/')
        );
        debug!(url = %discovery_url, "Fetching SSO configuration");

        let response = http
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| Error::Config(format!("Failed to fetch OpenID configuration: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Config(format!(
                "OpenID configuration discovery failed: HTTP {}",
                response.status()
            )));
        }

        let oidc: OidcConfiguration = response
            .json()
            .await
            .map_err(|e| Error::Config(format!("Malformed OpenID configuration: {e}")))?;

        debug!(token_endpoint = %oidc.token_endpoint, "Configured token endpoint");

        Ok(Self {
            http,
            client_id: sso.client_id.clone(),
            client_secret: sso.client_secret.clone(),
            token_endpoint: oidc.token_endpoint,
            credential: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Refresh the token if it is missing, expired, or about to expire.
    ///
    /// Callers should invoke this immediately before using the token; the
    /// manager does not refresh in the background. Wrap with a
    /// [`crate::retry::RetryPolicy`] to absorb transient SSO outages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenRefresh`] when the exchange fails.
    pub async fn ensure_fresh(&self) -> Result<()> {
        if self.has_fresh_credential() {
            debug!("Token still valid, not refreshing");
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited for the lock
        if self.has_fresh_credential() {
            return Ok(());
        }

        debug!("Token is expired or about to expire, refreshing");
        let credential = self.exchange().await?;
        *self.credential.write() = Some(credential);
        info!("SSO token refreshed");
        Ok(())
    }

    /// Build a GET request with the current bearer token attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenRefresh`] if no credential is held yet;
    /// call [`TokenManager::ensure_fresh`] first.
    pub fn authorized_get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        let token = self
            .credential
            .read()
            .as_ref()
            .map(|c| c.access_token.clone())
            .ok_or_else(|| Error::TokenRefresh("No access token held".to_string()))?;
        Ok(self.http.get(url).bearer_auth(token))
    }

    /// Expiry of the currently held credential, if any
    pub fn current_expiry(&self) -> Option<u64> {
        self.credential.read().as_ref().map(|c| c.expires_at)
    }

    fn has_fresh_credential(&self) -> bool {
        self.credential.read().as_ref().is_some_and(Credential::is_fresh)
    }

    /// Perform the client-credentials exchange against the token endpoint
    async fn exchange(&self) -> Result<Credential> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::TokenRefresh(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh(format!(
                "Token exchange rejected: HTTP {status} - {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::TokenRefresh(format!("Malformed token response: {e}")))?;

        Ok(token.into_credential())
    }
}

/// Build the HTTP client shared by the SSO and telemetry paths.
///
/// # Errors
///
/// Returns [`Error::Config`] if the client cannot be constructed.
pub fn build_http_client(allow_insecure: bool, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(allow_insecure)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))
}
