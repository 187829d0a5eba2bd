//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The client secret is
//! loaded from DIGILOCKER_CLIENT_SECRET or `client_secret_file`, never from
//! the TOML itself, so the file can be committed without leaking it.

use common::Secret;
use digilocker_auth::{
    ClientConfig, DEFAULT_ACCOUNT_BASE_URL, DEFAULT_API_BASE_URL, DEFAULT_REDIRECT_URI,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub digilocker: DigilockerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

/// HTTP listener and outbound client settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Where downloaded PDFs and profile images are written
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
}

/// Registered DigiLocker client
#[derive(Debug, Deserialize)]
pub struct DigilockerConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// File containing the client secret (alternative to DIGILOCKER_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_account_base_url")]
    pub account_base_url: String,
}

/// Per-client-IP request budget
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Allowed browser origins; empty means any origin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_account_base_url() -> String {
    DEFAULT_ACCOUNT_BASE_URL.to_string()
}

fn default_max_requests() -> usize {
    500
}

fn default_window_secs() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            timeout_secs: default_timeout(),
            max_connections: default_max_connections(),
            storage_dir: default_storage_dir(),
        }
    }
}

impl Default for DigilockerConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            client_secret_file: None,
            redirect_uri: default_redirect_uri(),
            api_base_url: default_api_base_url(),
            account_base_url: default_account_base_url(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup.
    ///
    /// Recognised variables:
    /// - DIGILOCKER_CLIENT_ID replaces `digilocker.client_id`
    /// - DIGILOCKER_CLIENT_SECRET takes precedence over `client_secret_file`
    /// - PORT replaces the port of `server.listen_addr`
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Some(id) = env("DIGILOCKER_CLIENT_ID") {
            config.digilocker.client_id = id;
        }

        if let Some(port) = env("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| common::Error::Config(format!("PORT must be a port number: {e}")))?;
            config.server.listen_addr.set_port(port);
        }

        if let Some(secret) = env("DIGILOCKER_CLIENT_SECRET") {
            config.digilocker.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.digilocker.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.digilocker.client_secret = Some(Secret::new(secret));
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let dl = &self.digilocker;
        for (name, url) in [
            ("redirect_uri", &dl.redirect_uri),
            ("api_base_url", &dl.api_base_url),
            ("account_base_url", &dl.account_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if dl.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "client_id is required (digilocker.client_id or DIGILOCKER_CLIENT_ID)".into(),
            ));
        }

        if dl.client_secret.as_ref().is_none_or(|s| s.is_blank()) {
            return Err(common::Error::Config(
                "client secret is required (DIGILOCKER_CLIENT_SECRET or client_secret_file)"
                    .into(),
            ));
        }

        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            return Err(common::Error::Config(
                "rate_limit.max_requests and rate_limit.window_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Provider client built from the `[digilocker]` section.
    pub fn client(&self) -> ClientConfig {
        let dl = &self.digilocker;
        ClientConfig {
            client_id: dl.client_id.clone(),
            client_secret: dl
                .client_secret
                .clone()
                .unwrap_or_else(|| Secret::new(String::new())),
            redirect_uri: dl.redirect_uri.clone(),
            api_base_url: dl.api_base_url.clone(),
            account_base_url: dl.account_base_url.clone(),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("digilocker-relay.toml")
    }
}
