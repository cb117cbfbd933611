use crate::error::{AppError, AppResult};
use chrono::FixedOffset;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "config/gatepass.toml";
const ENV_PREFIX: &str = "GATEPASS";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Fixed credential accepted while no sheet endpoint is configured
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bootstrap_email")]
    pub email: String,
    #[serde(default = "default_bootstrap_password")]
    pub password: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            enabled: true,
            email: default_bootstrap_email(),
            password: default_bootstrap_password(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: default_model(),
            base_url: default_gemini_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Holds `settings.json` and the store snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Offset of the site's wall clock from UTC; form dates and times are read in it
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_true")]
    pub seed_demo_data: bool,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            data_dir: default_data_dir(),
            utc_offset_minutes: 0,
            seed_demo_data: true,
            bootstrap: BootstrapConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_bootstrap_email() -> String {
    "admin@jabedagro.com".to_string()
}

fn default_bootstrap_password() -> String {
    "admin123".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Load `config/gatepass.toml` (optional) overlaid by `GATEPASS__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env_source());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if std::path::Path::new(path).exists() {
                    log::warn!(
                        "Failed to load config file {}, falling back to env: {}",
                        path,
                        err
                    );
                }
                Config::builder().add_source(env_source()).build().map_err(|env_err| {
                    ConfigError::Message(format!(
                        "Failed to load configuration from file and env: {}, then env-only error: {}",
                        err, env_err
                    ))
                })?
            }
        };

        let mut config: AppConfig = settings.try_deserialize()?;
        if config.gemini.api_key.is_none() {
            config.gemini.api_key = std::env::var("GEMINI_API_KEY").ok();
        }
        Ok(config)
    }

    pub fn utc_offset(&self) -> AppResult<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
