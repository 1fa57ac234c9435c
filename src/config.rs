//! Configuration management for the facefolio CLI and SDK

use config::{Config as ConfigSource, Environment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::cli::ConfigCommand;
use crate::error::{FolioError, Result};
use crate::ui::UI;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT: u64 = 30;
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const DEFAULT_CACHE_TTL: u64 = 60;

/// Settings persisted by the CLI between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub endpoint: String,
    pub timeout: u64,
    pub per_page: u32,
    /// Seconds a cached page stays valid
    pub cache_ttl: u64,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            per_page: DEFAULT_PER_PAGE,
            cache_ttl: DEFAULT_CACHE_TTL,
            verbose: false,
        }
    }
}

impl Config {
    pub async fn load() -> Result<Self> {
        Self::load_from(&default_config_path()).await
    }

    /// Load settings from `config_path`, writing defaults when the file is
    /// missing or cannot be parsed
    pub async fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path).await?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    tracing::warn!(
                        "Config file {} is invalid ({}), resetting to defaults",
                        config_path.display(),
                        e
                    );
                    let config = Self::default();
                    config.save(config_path).await?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save(config_path).await?;
            Ok(config)
        }
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    /// Client settings with these values as the base layer, so `FACEFOLIO_*`
    /// variables still override them
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        ClientConfig::builder()
            .defaults(self.client_defaults())
            .build()
    }

    fn client_defaults(&self) -> ClientConfig {
        let base_url = normalize_endpoint(&self.endpoint);
        let use_proxy = !base_url.contains("localhost") && !base_url.contains("127.0.0.1");

        ClientConfig {
            base_url,
            timeout: self.timeout,
            per_page: self.per_page,
            cache_ttl: self.cache_ttl,
            use_proxy,
        }
    }
}

/// Append the `/api` prefix the backend mounts its blueprints under
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/api") {
        trimmed.to_string()
    } else {
        format!("{}/api", trimmed)
    }
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facefolio")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

fn env_overrides() -> Environment {
    Environment::with_prefix("FACEFOLIO").try_parsing(true)
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL
}

fn default_use_proxy() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENDPOINT.to_string(),
            timeout: default_timeout(),
            per_page: default_per_page(),
            cache_ttl: default_cache_ttl(),
            use_proxy: default_use_proxy(),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Option<u64>,
    per_page: Option<u32>,
    cache_ttl: Option<u64>,
    use_proxy: Option<bool>,
    defaults: Option<ClientConfig>,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn cache_ttl(mut self, cache_ttl: u64) -> Self {
        self.cache_ttl = Some(cache_ttl);
        self
    }

    pub fn use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = Some(use_proxy);
        self
    }

    /// Base layer underneath the environment; built-in defaults when unset
    pub fn defaults(mut self, defaults: ClientConfig) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        self.build_with(env_overrides())
    }

    fn build_with(self, env: Environment) -> Result<ClientConfig> {
        let base = self.defaults.unwrap_or_default();
        let mut config = ClientConfig::layered(&base, env)?;

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(per_page) = self.per_page {
            config.per_page = per_page;
        }
        if let Some(cache_ttl) = self.cache_ttl {
            config.cache_ttl = cache_ttl;
        }
        if let Some(use_proxy) = self.use_proxy {
            config.use_proxy = use_proxy;
        }

        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// `base`, then `FACEFOLIO_*` variables from `env`
    fn layered(base: &ClientConfig, env: Environment) -> Result<Self> {
        let config = ConfigSource::builder()
            .set_default("base_url", base.base_url.clone())?
            .set_default("timeout", base.timeout as i64)?
            .set_default("per_page", base.per_page as i64)?
            .set_default("cache_ttl", base.cache_ttl as i64)?
            .set_default("use_proxy", base.use_proxy)?
            .add_source(env)
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(FolioError::invalid_endpoint("Base URL cannot be empty"));
        }
        if self.timeout == 0 {
            return Err(FolioError::validation_field(
                "Timeout must be at least one second",
                "timeout",
            ));
        }
        if self.per_page == 0 {
            return Err(FolioError::validation_field(
                "Page size must be at least 1",
                "per_page",
            ));
        }
        Ok(())
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.strip_prefix('/').unwrap_or(endpoint);
        let base_url = if self.base_url.starts_with("http://") || self.base_url.starts_with("https://")
        {
            self.base_url.clone()
        } else {
            format!("http://{}", self.base_url)
        };

        format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
    }
}

/// Handles `facefolio config ...`
pub struct ConfigService {
    config: Config,
    config_path: PathBuf,
    ui: UI,
}

impl ConfigService {
    pub fn new(config: Config) -> Self {
        Self::with_config_path(config, default_config_path())
    }

    pub fn with_config_path(config: Config, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            ui: UI::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn handle_config(&mut self, command: ConfigCommand) -> Result<()> {
        match command {
            ConfigCommand::Show => {
                self.show();
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => self.set_endpoint(&url)?,
            ConfigCommand::SetTimeout { seconds } => self.set_timeout(seconds)?,
            ConfigCommand::SetPageSize { size } => self.set_page_size(size)?,
            ConfigCommand::SetVerbose { enabled } => self.set_verbose(&enabled)?,
            ConfigCommand::Reset => self.config = Config::default(),
        }

        self.config.save(&self.config_path).await?;
        self.ui.success("Configuration saved");
        self.show();
        Ok(())
    }

    fn show(&self) {
        self.ui.card(
            "Configuration",
            vec![
                ("Endpoint", self.config.endpoint.clone()),
                ("Timeout", format!("{}s", self.config.timeout)),
                ("Page size", self.config.per_page.to_string()),
                ("Cache TTL", format!("{}s", self.config.cache_ttl)),
                ("Verbose", self.config.verbose.to_string()),
                ("File", self.config_path.display().to_string()),
            ],
        );
    }

    fn set_endpoint(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FolioError::invalid_endpoint(format!(
                "Endpoint must start with http:// or https://, got '{}'",
                url
            )));
        }
        self.config.endpoint = url.to_string();
        Ok(())
    }

    fn set_timeout(&mut self, seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Err(FolioError::validation_field(
                "Timeout must be at least one second",
                "timeout",
            ));
        }
        self.config.timeout = seconds;
        Ok(())
    }

    fn set_page_size(&mut self, size: u32) -> Result<()> {
        if size == 0 || size > 100 {
            return Err(FolioError::validation_field(
                "Page size must be between 1 and 100",
                "per_page",
            ));
        }
        self.config.per_page = size;
        Ok(())
    }

    fn set_verbose(&mut self, enabled: &str) -> Result<()> {
        self.config.verbose = match enabled.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => true,
            "false" | "off" | "no" | "0" => false,
            other => {
                return Err(FolioError::invalid_input(format!(
                    "Expected true or false, got '{}'",
                    other
                )))
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::*;

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let dir = create_temp_dir();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_resets_invalid_file() {
        let dir = create_temp_dir();
        let path = create_temp_file_with_content(&dir, "config.json", b"{not json");

        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(config, Config::default());

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("\"per_page\": 20"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = create_temp_dir();
        let path = dir.path().join("config.json");

        let config = Config {
            endpoint: "https://photos.example.com".to_string(),
            per_page: 12,
            ..Config::default()
        };
        config.save(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("http://localhost:5000"),
            "http://localhost:5000/api"
        );
        assert_eq!(
            normalize_endpoint("http://localhost:5000/api/"),
            "http://localhost:5000/api"
        );
    }

    #[test]
    fn test_to_client_config_disables_proxy_for_localhost() {
        let config = Config::default().to_client_config().unwrap();
        assert!(!config.use_proxy);
        assert_eq!(config.per_page, DEFAULT_PER_PAGE);

        let remote = Config {
            endpoint: "https://photos.example.com".to_string(),
            ..Config::default()
        }
        .to_client_config()
        .unwrap();
        assert!(remote.use_proxy);
        assert_eq!(remote.base_url, "https://photos.example.com/api");
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_overrides().source(Some(source))
    }

    #[test]
    fn test_environment_overrides_persisted_settings() {
        let persisted = Config {
            timeout: 45,
            per_page: 12,
            ..Config::default()
        };

        let config = ClientConfig::builder()
            .defaults(persisted.client_defaults())
            .build_with(env(&[
                ("FACEFOLIO_TIMEOUT", "7"),
                ("FACEFOLIO_BASE_URL", "http://other:9000/api"),
            ]))
            .unwrap();
        assert_eq!(config.timeout, 7);
        assert_eq!(config.base_url, "http://other:9000/api");
        assert_eq!(config.per_page, 12);

        let untouched = ClientConfig::builder()
            .defaults(persisted.client_defaults())
            .build_with(env(&[]))
            .unwrap();
        assert_eq!(untouched.timeout, 45);
        assert_eq!(untouched.base_url, "http://localhost:5000/api");
    }

    #[test]
    fn test_builder_overrides_win_over_environment() {
        let config = ClientConfig::builder()
            .per_page(5)
            .build_with(env(&[("FACEFOLIO_PER_PAGE", "40")]))
            .unwrap();
        assert_eq!(config.per_page, 5);
    }

    #[test]
    fn test_endpoint_url() {
        let config = ClientConfig::default();
        assert_eq!(
            config.endpoint_url("/images"),
            "http://localhost:5000/api/images"
        );
        assert_eq!(
            config.endpoint_url("people/abc/images"),
            "http://localhost:5000/api/people/abc/images"
        );
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = ClientConfig {
            per_page: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_service_setters() {
        let mut service = ConfigService::new(Config::default());
        assert!(service.set_endpoint("ftp://nope").is_err());
        assert!(service.set_page_size(0).is_err());
        service.set_page_size(50).unwrap();
        service.set_verbose("on").unwrap();
        assert_eq!(service.config().per_page, 50);
        assert!(service.config().verbose);
    }
}
