//! Receiver Configuration Settings
//!
//! Configuration types for the Cloud Foundry receiver, loaded from
//! environment variables.

use std::time::Duration;

use url::Url;

/// Default RLP gateway shard identifier.
pub const DEFAULT_SHARD_ID: &str = "opentelemetry";

/// HTTP client settings shared by the gateway and UAA endpoints.
#[derive(Debug, Clone)]
pub struct HttpClientSettings {
    /// Base URL of the remote endpoint.
    pub endpoint: String,
    /// Connect/request timeout.
    pub timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure_skip_verify: bool,
}

impl HttpClientSettings {
    /// Create settings for an endpoint with default timeout and TLS verification.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: Duration::from_secs(10),
            insecure_skip_verify: false,
        }
    }
}

/// Gateway reconnection backoff settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_secs(1),
            delay_max: Duration::from_secs(30),
            delay_multiplier: 2.0,
            max_attempts: 0, // Unlimited
        }
    }
}

/// RLP gateway settings.
#[derive(Debug, Clone)]
pub struct RlpGatewaySettings {
    /// HTTP client settings.
    pub http: HttpClientSettings,
    /// Shard identifier; receivers sharing a shard split the envelope stream.
    pub shard_id: String,
    /// Reconnection backoff.
    pub reconnect: ReconnectSettings,
}

impl RlpGatewaySettings {
    /// Create gateway settings for an endpoint with the default shard.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: HttpClientSettings::new(endpoint),
            shard_id: DEFAULT_SHARD_ID.to_string(),
            reconnect: ReconnectSettings::default(),
        }
    }

    /// Set the shard identifier.
    #[must_use]
    pub fn with_shard_id(mut self, shard_id: impl Into<String>) -> Self {
        self.shard_id = shard_id.into();
        self
    }
}

/// UAA (identity provider) settings.
#[derive(Clone)]
pub struct UaaSettings {
    /// HTTP client settings.
    pub http: HttpClientSettings,
    /// OAuth client username.
    pub username: String,
    password: String,
}

impl UaaSettings {
    /// Create UAA settings.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: HttpClientSettings::new(endpoint),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Get the OAuth client password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for UaaSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UaaSettings")
            .field("http", &self.http)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Receiver configuration: the two upstream endpoints.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// RLP gateway settings.
    pub rlp_gateway: RlpGatewaySettings,
    /// UAA settings.
    pub uaa: UaaSettings,
}

impl ReceiverConfig {
    /// Create a receiver configuration.
    #[must_use]
    pub const fn new(rlp_gateway: RlpGatewaySettings, uaa: UaaSettings) -> Self {
        Self { rlp_gateway, uaa }
    }

    /// Validate the configuration, returning the first failing check.
    ///
    /// Checks run in order: gateway endpoint, UAA endpoint, UAA username.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url_option("rlp_gateway.endpoint", &self.rlp_gateway.http.endpoint)?;
        validate_url_option("uaa.endpoint", &self.uaa.http.endpoint)?;

        if self.uaa.username.is_empty() {
            return Err(ConfigError::MissingUsername);
        }

        Ok(())
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Downstream exporter settings.
#[derive(Debug, Clone)]
pub struct ExporterSettings {
    /// OTLP gRPC endpoint; `None` logs batches instead of exporting them.
    pub endpoint: Option<String>,
    /// Connect and per-request timeout.
    pub timeout: Duration,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Receiver configuration.
    pub receiver: ReceiverConfig,
    /// Server port settings.
    pub server: ServerSettings,
    /// Downstream exporter settings.
    pub exporter: ExporterSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or the
    /// resulting receiver configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway_endpoint = required_env("CF_RLP_GATEWAY_ENDPOINT")?;
        let uaa_endpoint = required_env("CF_UAA_ENDPOINT")?;
        let username = required_env("CF_UAA_USERNAME")?;
        let password = std::env::var("CF_UAA_PASSWORD").unwrap_or_default();

        let defaults = HttpClientSettings::default();
        let reconnect_defaults = ReconnectSettings::default();

        let rlp_gateway = RlpGatewaySettings {
            http: HttpClientSettings {
                endpoint: gateway_endpoint,
                timeout: parse_env_duration_secs("CF_RLP_GATEWAY_TIMEOUT_SECS", defaults.timeout),
                insecure_skip_verify: parse_env_bool("CF_RLP_GATEWAY_INSECURE_SKIP_VERIFY", false),
            },
            shard_id: std::env::var("CF_RLP_GATEWAY_SHARD_ID")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SHARD_ID.to_string()),
            reconnect: ReconnectSettings {
                delay_initial: parse_env_duration_millis(
                    "CF_RECEIVER_RECONNECT_DELAY_INITIAL_MS",
                    reconnect_defaults.delay_initial,
                ),
                delay_max: parse_env_duration_secs(
                    "CF_RECEIVER_RECONNECT_DELAY_MAX_SECS",
                    reconnect_defaults.delay_max,
                ),
                delay_multiplier: parse_env_f64(
                    "CF_RECEIVER_RECONNECT_DELAY_MULTIPLIER",
                    reconnect_defaults.delay_multiplier,
                ),
                max_attempts: parse_env_u32(
                    "CF_RECEIVER_MAX_RECONNECT_ATTEMPTS",
                    reconnect_defaults.max_attempts,
                ),
            },
        };

        let uaa = UaaSettings {
            http: HttpClientSettings {
                endpoint: uaa_endpoint,
                timeout: parse_env_duration_secs("CF_UAA_TIMEOUT_SECS", defaults.timeout),
                insecure_skip_verify: parse_env_bool("CF_UAA_INSECURE_SKIP_VERIFY", false),
            },
            username,
            password,
        };

        let receiver = ReceiverConfig::new(rlp_gateway, uaa);
        receiver.validate()?;

        let server = ServerSettings {
            health_port: parse_env_u16(
                "CF_RECEIVER_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        let exporter = ExporterSettings {
            endpoint: std::env::var("CF_RECEIVER_EXPORTER_ENDPOINT")
                .ok()
                .filter(|s| !s.is_empty()),
            timeout: parse_env_duration_secs(
                "CF_RECEIVER_EXPORTER_TIMEOUT_SECS",
                ExporterSettings::default().timeout,
            ),
        };

        Ok(Self {
            receiver,
            server,
            exporter,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Required URL option is empty.
    #[error("{0} not specified")]
    MissingField(String),
    /// URL option does not parse.
    #[error("failed to parse {field} as url: {reason}")]
    InvalidUrl {
        /// Dotted option name.
        field: String,
        /// Parser error.
        reason: String,
    },
    /// UAA username is empty.
    #[error("UAA username not specified")]
    MissingUsername,
}

fn validate_url_option(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingField(name.to_string()));
    }

    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })?;

    Ok(())
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn config(gateway: &str, uaa: &str, username: &str) -> ReceiverConfig {
        ReceiverConfig::new(
            RlpGatewaySettings::new(gateway),
            UaaSettings::new(uaa, username, "secret"),
        )
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(
            config("http://gw.example", "http://uaa.example", "svc").validate(),
            Ok(())
        );
    }

    #[test_case("", "http://uaa.example", "svc", "rlp_gateway.endpoint not specified" ; "missing gateway")]
    #[test_case("http://gw.example", "", "svc", "uaa.endpoint not specified" ; "missing uaa")]
    #[test_case("http://gw.example", "http://uaa.example", "", "UAA username not specified" ; "missing username")]
    #[test_case("", "", "", "rlp_gateway.endpoint not specified" ; "first failure wins")]
    fn validation_errors(gateway: &str, uaa: &str, username: &str, expected: &str) {
        let err = config(gateway, uaa, username).validate().unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn unparseable_gateway_url_names_field() {
        let err = config("not a url", "http://uaa.example", "svc")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl { ref field, .. } if field == "rlp_gateway.endpoint"
        ));
    }

    #[test]
    fn uaa_endpoint_validated_on_its_own_value() {
        let err = config("http://gw.example", "::bad::", "svc")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl { ref field, .. } if field == "uaa.endpoint"
        ));
    }

    #[test]
    fn uaa_settings_redacted_debug() {
        let settings = UaaSettings::new("http://uaa.example", "svc", "hunter2");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(settings.password(), "hunter2");
    }

    #[test]
    fn gateway_defaults() {
        let settings = RlpGatewaySettings::new("http://gw.example");
        assert_eq!(settings.shard_id, DEFAULT_SHARD_ID);
        assert_eq!(settings.http.timeout, Duration::from_secs(10));
        assert!(!settings.http.insecure_skip_verify);
        assert_eq!(settings.reconnect.delay_initial, Duration::from_secs(1));
        assert_eq!(settings.reconnect.delay_max, Duration::from_secs(30));
        assert_eq!(settings.reconnect.max_attempts, 0);

        let sharded = settings.with_shard_id("shard-1");
        assert_eq!(sharded.shard_id, "shard-1");
    }

    #[test]
    fn server_and_exporter_defaults() {
        assert_eq!(ServerSettings::default().health_port, 8083);

        let exporter = ExporterSettings::default();
        assert!(exporter.endpoint.is_none());
        assert_eq!(exporter.timeout, Duration::from_secs(10));
    }
}
