//! Configuration for the imitator bot and CLI
//!
//! Loads configuration from config.yml file; `${VAR}` placeholders and
//! well-known environment variables take precedence over file values.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::imitator::ImitationSettings;
use crate::integrations::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::style::NoiseSettings;

/// Default constants (fallback if config.yml not found)
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_SAMPLES_FOR_ANALYSIS: usize = 3;
pub const MIN_SAMPLES_FOR_IMITATION: usize = 5;
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<TelegramYaml>,
    llm: Option<LlmYaml>,
    imitation: Option<ImitationYaml>,
    storage: Option<StorageYaml>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramYaml {
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmYaml {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ImitationYaml {
    min_analysis_samples: Option<usize>,
    min_imitation_samples: Option<usize>,
    message_limit: Option<usize>,
    max_session_samples: Option<usize>,
    max_upload_bytes: Option<u64>,
    noise: Option<NoiseSettings>,
    seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageYaml {
    backend: Option<StorageBackend>,
    mysql: Option<MySqlYaml>,
}

#[derive(Debug, Default, Deserialize)]
struct MySqlYaml {
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

/// Where profiles are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mysql,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MYSQL_PORT,
            database: "style_imitator".to_string(),
            user: "root".to_string(),
            password: String::new(),
        }
    }
}

/// Chat-completions endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub llm: LlmSettings,
    pub min_analysis_samples: usize,
    pub min_imitation_samples: usize,
    pub message_limit: usize,
    pub max_session_samples: usize,
    pub max_upload_bytes: u64,
    pub noise: NoiseSettings,
    pub seed: Option<u64>,
    pub storage_backend: StorageBackend,
    pub mysql: MySqlSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| {
                // No file: defaults plus whatever the environment provides
                Self::load_dotenv();
                Self::from_yaml(YamlConfig::default())
            })
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                if let Ok(env_val) = std::env::var(var_name) {
                    return env_val;
                }
                // Unresolved placeholder: fall through to the explicit key
                return std::env::var(env_key).unwrap_or_default();
            }
        }
        // Also check explicit env_key as fallback
        if let Ok(env_val) = std::env::var(env_key) {
            return env_val;
        }
        value.unwrap_or_default()
    }

    /// First non-empty value among several env keys.
    fn first_env(keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| std::env::var(k).ok())
            .find(|v| !v.trim().is_empty())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        // Try to load from current directory first, then parent
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        // Load .env file first
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let yaml: YamlConfig = if content.trim().is_empty() {
            YamlConfig::default()
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| format!("Failed to parse config file: {}", e))?
        };

        Self::from_yaml(yaml).validated()
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let defaults = Self::defaults();
        let telegram = yaml.telegram.unwrap_or_default();
        let llm = yaml.llm.unwrap_or_default();
        let imitation = yaml.imitation.unwrap_or_default();
        let storage = yaml.storage.unwrap_or_default();
        let mysql = storage.mysql.unwrap_or_default();
        let mysql_defaults = MySqlSettings::default();

        let mut api_key = Self::resolve_env_string(llm.api_key, "OPENROUTER_API_KEY");
        if api_key.is_empty() {
            api_key = Self::first_env(&["OPENAI_API_KEY"]).unwrap_or_default();
        }

        let base_url = Self::resolve_env_string(llm.base_url, "LLM_BASE_URL");
        let model = Self::resolve_env_string(llm.model, "LLM_MODEL");

        let mysql_host = Self::resolve_env_string(mysql.host, "MYSQL_HOST");
        let mysql_database = Self::resolve_env_string(mysql.database, "MYSQL_DATABASE");
        let mysql_user = Self::resolve_env_string(mysql.user, "MYSQL_USER");
        let mysql_port = mysql.port.or_else(|| {
            std::env::var("MYSQL_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
        });

        Self {
            bot_token: Self::resolve_env_string(telegram.bot_token, "TELEGRAM_BOT_TOKEN"),
            llm: LlmSettings {
                api_key,
                base_url: non_empty_or(base_url, defaults.llm.base_url),
                model: non_empty_or(model, defaults.llm.model),
                max_tokens: llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                temperature: llm.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                timeout_secs: llm.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            },
            min_analysis_samples: imitation
                .min_analysis_samples
                .unwrap_or(MIN_SAMPLES_FOR_ANALYSIS),
            min_imitation_samples: imitation
                .min_imitation_samples
                .unwrap_or(MIN_SAMPLES_FOR_IMITATION),
            message_limit: imitation.message_limit.unwrap_or(defaults.message_limit),
            max_session_samples: imitation
                .max_session_samples
                .unwrap_or(defaults.max_session_samples),
            max_upload_bytes: imitation.max_upload_bytes.unwrap_or(MAX_UPLOAD_BYTES),
            noise: imitation.noise.unwrap_or_default(),
            seed: imitation.seed,
            storage_backend: storage.backend.unwrap_or_default(),
            mysql: MySqlSettings {
                host: non_empty_or(mysql_host, mysql_defaults.host),
                port: mysql_port.unwrap_or(DEFAULT_MYSQL_PORT),
                database: non_empty_or(mysql_database, mysql_defaults.database),
                user: non_empty_or(mysql_user, mysql_defaults.user),
                password: Self::resolve_env_string(mysql.password, "MYSQL_PASSWORD"),
            },
        }
    }

    /// Create config with empty credentials (fallback)
    fn defaults() -> Self {
        Self {
            bot_token: String::new(),
            llm: LlmSettings::default(),
            min_analysis_samples: MIN_SAMPLES_FOR_ANALYSIS,
            min_imitation_samples: MIN_SAMPLES_FOR_IMITATION,
            message_limit: crate::storage::DEFAULT_MESSAGE_LIMIT,
            max_session_samples: crate::session::DEFAULT_MAX_SAMPLES,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            noise: NoiseSettings::default(),
            seed: None,
            storage_backend: StorageBackend::Memory,
            mysql: MySqlSettings::default(),
        }
    }

    fn validated(self) -> Result<Self, String> {
        if self.min_imitation_samples == 0 || self.min_analysis_samples == 0 {
            return Err("sample thresholds must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.noise.removal_prob)
            || !(0.0..=1.0).contains(&self.noise.replace_prob)
            || !(0.0..=1.0).contains(&self.noise.typo_rate)
        {
            return Err("noise probabilities must be within [0, 1]".to_string());
        }
        if self.llm.timeout_secs == 0 {
            return Err("llm.timeout_secs must be positive".to_string());
        }
        Ok(self)
    }

    /// Runtime knobs for the imitator service.
    pub fn imitation_settings(&self) -> ImitationSettings {
        ImitationSettings {
            min_analysis_samples: self.min_analysis_samples,
            min_imitation_samples: self.min_imitation_samples,
            message_limit: self.message_limit,
            max_session_samples: self.max_session_samples,
            max_upload_bytes: self.max_upload_bytes,
            generation_timeout: Duration::from_secs(self.llm.timeout_secs),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            noise: self.noise,
            seed: self.seed,
        }
    }
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
