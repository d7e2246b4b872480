//! Configuration for the scrape gateway
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the scrape gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Outbound proxy routing
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Header carrying the client IP when running behind a trusted edge
    /// (e.g. `cf-connecting-ip`). When unset the socket peer address is used.
    #[serde(default)]
    pub client_ip_header: Option<String>,

    /// Timeout for outbound scraper requests in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
}

fn default_http_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_fetch_timeout() -> u64 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            host: default_host(),
            client_ip_header: None,
            fetch_timeout_seconds: default_fetch_timeout(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Gate scrape endpoints behind Turnstile/JWT credentials
    #[serde(default)]
    pub enabled: bool,

    /// Turnstile shared secret
    #[serde(default)]
    pub turnstile_secret: String,

    /// Turnstile siteverify endpoint
    #[serde(default = "default_verify_url")]
    pub turnstile_verify_url: String,

    /// Secret key for signing session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Session token time-to-live in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,

    /// Request header carrying the credential
    #[serde(default = "default_token_header")]
    pub token_header: String,

    /// Query parameter carrying the credential when the header is absent
    #[serde(default = "default_token_query_param")]
    pub token_query_param: String,
}

fn default_verify_url() -> String {
    "https://challenges.cloudflare.com/turnstile/v0/siteverify".to_string()
}

/// Placeholder signing secret; refused when authentication is enabled
const PLACEHOLDER_JWT_SECRET: &str = "your-secret-key-change-in-production";

fn default_jwt_secret() -> String {
    // In production, this should be set via environment variable
    PLACEHOLDER_JWT_SECRET.to_string()
}

fn default_token_ttl() -> u64 {
    600 // 10 minutes
}

fn default_token_header() -> String {
    "x-token".to_string()
}

fn default_token_query_param() -> String {
    "token".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            turnstile_secret: String::new(),
            turnstile_verify_url: default_verify_url(),
            jwt_secret: default_jwt_secret(),
            token_ttl_seconds: default_token_ttl(),
            token_header: default_token_header(),
            token_query_param: default_token_query_param(),
        }
    }
}

/// Outbound proxy routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Simple-proxy endpoint. Without it every request goes direct.
    #[serde(default)]
    pub url: Option<String>,

    /// Hostnames whose requests are relayed through the proxy
    #[serde(default = "default_proxied_hosts")]
    pub hosts: Vec<String>,
}

fn default_proxied_hosts() -> Vec<String> {
    vec![
        "showbox.shegu.net".to_string(),
        "mbpapi.shegu.net".to_string(),
    ]
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: None,
            hosts: default_proxied_hosts(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Split a comma separated env value, dropping empty entries
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(port) = var("GATEWAY_HTTP_PORT") {
            if let Ok(p) = port.parse() {
                self.server.http_port = p;
            }
        }
        if let Some(host) = var("GATEWAY_HOST") {
            self.server.host = host;
        }
        if let Some(header) = var("GATEWAY_CLIENT_IP_HEADER") {
            self.server.client_ip_header = Some(header).filter(|h| !h.is_empty());
        }
        if let Some(timeout) = var("GATEWAY_FETCH_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.server.fetch_timeout_seconds = t;
            }
        }

        // Auth
        if let Some(enabled) = var("GATEWAY_TURNSTILE_ENABLED") {
            self.auth.enabled = parse_flag(&enabled);
        }
        if let Some(secret) = var("GATEWAY_TURNSTILE_SECRET") {
            self.auth.turnstile_secret = secret;
        }
        if let Some(url) = var("GATEWAY_TURNSTILE_VERIFY_URL") {
            self.auth.turnstile_verify_url = url;
        }
        if let Some(secret) = var("GATEWAY_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = var("GATEWAY_JWT_TTL") {
            if let Ok(t) = ttl.parse() {
                self.auth.token_ttl_seconds = t;
            }
        }
        if let Some(header) = var("GATEWAY_TOKEN_HEADER") {
            self.auth.token_header = header.to_ascii_lowercase();
        }

        // Proxy
        if let Some(url) = var("GATEWAY_PROXY_URL") {
            self.proxy.url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(hosts) = var("GATEWAY_PROXIED_HOSTS") {
            self.proxy.hosts = split_list(&hosts);
        }

        // CORS
        if let Some(origins) = var("GATEWAY_CORS_ORIGINS") {
            self.cors.allowed_origins = split_list(&origins);
        }
    }

    /// Load configuration from file if it exists, then overlay the environment
    ///
    /// The result is validated before it is returned.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) if p.as_ref().exists() => {
                let mut config = Self::from_file(p)?;
                config.apply_env(|key| std::env::var(key).ok());
                config
            }
            _ => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gateway cannot run safely with
    ///
    /// With authentication enabled, a missing or placeholder signing secret
    /// would let anyone mint session tokens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.auth.enabled {
            return Ok(());
        }

        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() || secret == PLACEHOLDER_JWT_SECRET {
            return Err(ConfigError::Invalid(
                "GATEWAY_JWT_SECRET must be set when authentication is enabled".to_string(),
            ));
        }

        let ttl_in_range = i64::try_from(self.auth.token_ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
            .is_some();
        if self.auth.token_ttl_seconds == 0 || !ttl_in_range {
            return Err(ConfigError::Invalid(format!(
                "token_ttl_seconds out of range: {}",
                self.auth.token_ttl_seconds
            )));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.http_port, 8080);
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.token_ttl_seconds, 600);
        assert_eq!(config.auth.token_header, "x-token");
        assert!(config.proxy.url.is_none());
        assert_eq!(config.proxy.hosts.len(), 2);
        assert!(config.cors.allowed_origins.is_empty());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[server]
http_port = 9090
client_ip_header = "cf-connecting-ip"

[auth]
enabled = true
turnstile_secret = "ts-secret"
jwt_secret = "test-secret"

[proxy]
url = "https://proxy.example.com"
hosts = ["a.example.com"]
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.http_port, 9090);
        assert_eq!(
            config.server.client_ip_header.as_deref(),
            Some("cf-connecting-ip")
        );
        assert!(config.auth.enabled);
        assert_eq!(config.auth.jwt_secret, "test-secret");
        assert_eq!(config.auth.token_ttl_seconds, 600);
        assert_eq!(config.proxy.url.as_deref(), Some("https://proxy.example.com"));
        assert_eq!(config.proxy.hosts, vec!["a.example.com"]);
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = [
            ("GATEWAY_HTTP_PORT", "3000"),
            ("GATEWAY_TURNSTILE_ENABLED", "true"),
            ("GATEWAY_JWT_TTL", "120"),
            ("GATEWAY_PROXY_URL", "https://proxy.example.com"),
            ("GATEWAY_PROXIED_HOSTS", "one.example, two.example,,"),
            ("GATEWAY_CORS_ORIGINS", "https://app.example"),
            ("GATEWAY_TOKEN_HEADER", "X-Auth"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.http_port, 3000);
        assert!(config.auth.enabled);
        assert_eq!(config.auth.token_ttl_seconds, 120);
        assert_eq!(config.auth.token_header, "x-auth");
        assert_eq!(config.proxy.hosts, vec!["one.example", "two.example"]);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example"]);
    }

    #[test]
    fn test_empty_proxy_url_disables_proxy() {
        let mut config = Config::default();
        config.apply_env(|key| (key == "GATEWAY_PROXY_URL").then(String::new));
        assert!(config.proxy.url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhttp_port = 7070").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.http_port, 7070);

        let missing = Config::from_file("/nonexistent/gateway.toml");
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_auth_requires_real_jwt_secret() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        // Enabling auth without a signing secret keeps the placeholder
        config.apply_env(|key| (key == "GATEWAY_TURNSTILE_ENABLED").then(|| "true".to_string()));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.auth.jwt_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.auth.jwt_secret = "a-long-random-deployment-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_rejects_unrepresentable_ttl() {
        let mut config = Config::default();
        config.auth.enabled = true;
        config.auth.jwt_secret = "a-long-random-deployment-secret".to_string();

        config.apply_env(|key| (key == "GATEWAY_JWT_TTL").then(|| "10000000000000000".to_string()));
        assert_eq!(config.auth.token_ttl_seconds, 10_000_000_000_000_000);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.auth.token_ttl_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.auth.token_ttl_seconds = 600;
        assert!(config.validate().is_ok());
    }
}
