use serde::Deserialize;
use std::{env, fs};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Object store settings. File values can be overridden by the deployment
/// environment (`S3_ENDPOINT`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`,
/// `S3_BUCKET_NAME`, `S3_USE_SSL`).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_access_key")]
    pub access_key: String,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_bucket_name")]
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub use_tls: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_key: default_access_key(),
            secret_key: default_secret_key(),
            bucket_name: default_bucket_name(),
            region: default_region(),
            use_tls: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub query: QueryConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Loads configuration from the TOML file named by `POWERVIZ_CONFIG`
    /// (default `powerviz-config.toml`), falling back to built-in defaults
    /// when the file is absent, then applies store overrides from the
    /// environment.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("POWERVIZ_CONFIG").unwrap_or_else(|_| "powerviz-config.toml".to_string());
        let mut cfg: AppConfig = match fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(_) => {
                tracing::info!(path = %path, "no config file found, using defaults");
                AppConfig::default()
            }
        };
        cfg.store.apply_env_overrides();
        Ok(cfg)
    }
}

impl StoreSettings {
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("S3_ENDPOINT") {
            self.endpoint = v;
        }
        if let Ok(v) = env::var("S3_ACCESS_KEY") {
            self.access_key = v;
        }
        if let Ok(v) = env::var("S3_SECRET_KEY") {
            self.secret_key = v;
        }
        if let Ok(v) = env::var("S3_BUCKET_NAME") {
            self.bucket_name = v;
        }
        if let Ok(v) = env::var("S3_USE_SSL") {
            self.use_tls = v.eq_ignore_ascii_case("true");
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_endpoint() -> String {
    "localhost:9000".to_string()
}

fn default_access_key() -> String {
    "minioadmin".to_string()
}

fn default_secret_key() -> String {
    "minioadmin".to_string()
}

fn default_bucket_name() -> String {
    "power-viz".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}
