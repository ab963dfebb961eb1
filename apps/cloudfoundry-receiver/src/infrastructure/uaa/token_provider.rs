//! UAA Token Provider
//!
//! Fetches bearer tokens with the `client_credentials` grant:
//!
//! ```text
//! POST {uaa}/oauth/token
//! Authorization: Basic base64(username:password)
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=client_credentials
//! ```
//!
//! Tokens are cached and reused until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use crate::application::ports::{TokenError, TokenProvider};
use crate::infrastructure::config::UaaSettings;

/// Cached tokens are refreshed this long before their reported expiry.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.refresh_at.is_none_or(|at| Instant::now() < at)
    }
}

/// Token provider for the Cloud Foundry UAA.
pub struct UaaTokenProvider {
    client: Client,
    token_url: String,
    username: String,
    password: String,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for UaaTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UaaTokenProvider")
            .field("token_url", &self.token_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl UaaTokenProvider {
    /// Create a token provider from UAA settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a URL or the HTTP client
    /// cannot be built.
    pub fn new(settings: &UaaSettings) -> Result<Self, TokenError> {
        let endpoint = &settings.http.endpoint;
        Url::parse(endpoint).map_err(|e| TokenError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(settings.http.timeout)
            .danger_accept_invalid_certs(settings.http.insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            token_url: format!("{}/oauth/token", endpoint.trim_end_matches('/')),
            username: settings.username.clone(),
            password: settings.password().to_string(),
            cached: Mutex::new(None),
        })
    }

    /// Token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn fetch(&self) -> Result<CachedToken, TokenError> {
        tracing::debug!(url = %self.token_url, "Requesting UAA token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| TokenError::InvalidResponse(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(TokenError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }

        let refresh_at = token.expires_in.map(|secs| {
            Instant::now() + Duration::from_secs(secs).saturating_sub(TOKEN_REFRESH_MARGIN)
        });

        tracing::info!(
            expires_in_secs = token.expires_in,
            "Obtained UAA token"
        );

        Ok(CachedToken {
            value: format!("{} {}", token.token_type, token.access_token),
            refresh_at,
        })
    }
}

#[async_trait]
impl TokenProvider for UaaTokenProvider {
    async fn provide_token(&self) -> Result<String, TokenError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_url_strips_trailing_slash() {
        let provider =
            UaaTokenProvider::new(&UaaSettings::new("http://uaa.example/", "svc", "pw")).unwrap();
        assert_eq!(provider.token_url(), "http://uaa.example/oauth/token");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let result = UaaTokenProvider::new(&UaaSettings::new("uaa.example", "svc", "pw"));
        assert!(matches!(result, Err(TokenError::InvalidEndpoint { .. })));
    }

    #[test]
    fn debug_omits_password() {
        let provider =
            UaaTokenProvider::new(&UaaSettings::new("http://uaa.example", "svc", "hunter2"))
                .unwrap();
        assert!(!format!("{provider:?}").contains("hunter2"));
    }

    #[test]
    fn cached_token_freshness() {
        let fresh = CachedToken {
            value: "bearer a".to_string(),
            refresh_at: Some(Instant::now() + Duration::from_secs(60)),
        };
        let stale = CachedToken {
            value: "bearer b".to_string(),
            refresh_at: Some(Instant::now().checked_sub(Duration::from_secs(1)).unwrap()),
        };
        let forever = CachedToken {
            value: "bearer c".to_string(),
            refresh_at: None,
        };

        assert!(fresh.is_fresh());
        assert!(!stale.is_fresh());
        assert!(forever.is_fresh());
    }
}
