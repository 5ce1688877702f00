use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Main configuration for bloomgen
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BloomgenConfig {
    /// Neo4j connection used by the schema fetcher
    #[serde(default)]
    pub neo4j: Neo4jConfig,

    /// Language model endpoint for the prompted generator
    #[serde(default)]
    pub llm: LLMConfig,

    /// Generation policy and file locations
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Schema cache locations
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Neo4j connection parameters
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Neo4jConfig {
    /// Bolt URI, e.g. "neo4j+s://xxxx.databases.neo4j.io" or "bolt://localhost:7687"
    #[serde(default)]
    pub uri: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    /// Never written back to disk
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Database name (server default when unset)
    #[serde(default)]
    pub database: Option<String>,
}

/// Resolved Neo4j credentials, password kept behind `SecretString`
#[derive(Debug)]
pub struct Neo4jCredentials {
    pub uri: String,
    pub username: String,
    pub password: SecretString,
    pub database: Option<String>,
}

impl Neo4jConfig {
    /// Resolve credentials, failing when any of uri/username/password is missing
    pub fn credentials(&self) -> Result<Neo4jCredentials, ConfigError> {
        let uri = non_empty(&self.uri).ok_or_else(|| {
            ConfigError::MissingCredential("NEO4J_URI (neo4j.uri) is not set".to_string())
        })?;
        let username = non_empty(&self.username).ok_or_else(|| {
            ConfigError::MissingCredential(
                "NEO4J_USERNAME (neo4j.username) is not set".to_string(),
            )
        })?;
        let password = non_empty(&self.password).ok_or_else(|| {
            ConfigError::MissingCredential(
                "NEO4J_PASSWORD (neo4j.password) is not set".to_string(),
            )
        })?;

        Ok(Neo4jCredentials {
            uri,
            username,
            password: SecretString::from(password),
            database: non_empty(&self.database),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// LLM endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider: "gemini", "openai", "ollama", "lmstudio", "openai-compatible"
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Model identifier (provider default when unset)
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible API (provider default when unset)
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key, never written back to disk
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// How perspectives are requested from the language model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStrategy {
    /// One request, the model answers with a JSON array of perspectives
    #[default]
    Batch,
    /// One request per perspective, each answered with a single JSON object
    PerPerspective,
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStrategy::Batch => write!(f, "batch"),
            GenerationStrategy::PerPerspective => write!(f, "per-perspective"),
        }
    }
}

impl FromStr for GenerationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "batch" => Ok(GenerationStrategy::Batch),
            "per-perspective" | "per_perspective" | "single" => {
                Ok(GenerationStrategy::PerPerspective)
            }
            other => Err(ConfigError::ValidationError(format!(
                "Invalid generation strategy: {}. Must be one of: batch, per-perspective",
                other
            ))),
        }
    }
}

/// Generation policy and file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Directory holding few-shot example perspectives
    #[serde(default = "default_examples_dir")]
    pub examples_dir: PathBuf,

    /// Directory receiving generated perspectives
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Lower bound of perspectives requested from the model
    #[serde(default = "default_min_perspectives")]
    pub min_perspectives: usize,

    /// Upper bound of perspectives requested from the model
    #[serde(default = "default_max_perspectives")]
    pub max_perspectives: usize,

    #[serde(default)]
    pub strategy: GenerationStrategy,

    /// Indent output files instead of writing minified JSON
    #[serde(default)]
    pub pretty_output: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            examples_dir: default_examples_dir(),
            output_dir: default_output_dir(),
            min_perspectives: default_min_perspectives(),
            max_perspectives: default_max_perspectives(),
            strategy: GenerationStrategy::default(),
            pretty_output: false,
        }
    }
}

/// Schema cache file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,

    #[serde(default = "default_full_schema_path")]
    pub full_schema_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema_path: default_schema_path(),
            full_schema_path: default_full_schema_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_llm_provider() -> String {
    "gemini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_examples_dir() -> PathBuf {
    PathBuf::from("example")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_min_perspectives() -> usize {
    4
}
fn default_max_perspectives() -> usize {
    5
}
fn default_schema_path() -> PathBuf {
    PathBuf::from("schema.json")
}
fn default_full_schema_path() -> PathBuf {
    PathBuf::from("schema_full.json")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager: environment, then config file, then defaults
pub struct ConfigManager {
    config: BloomgenConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (explicit path, ./.bloomgen.toml, ~/.bloomgen/config.toml)
    /// 3. Sensible defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config)?;
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!("Config file: {}", path.display()),
            None => info!("Config file: NONE (using defaults)"),
        }
        info!(
            "LLM provider: {} ({} strategy)",
            config.llm.provider, config.generation.strategy
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".bloomgen.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .bloomgen.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.bloomgen.toml (current directory)
    /// 2. ~/.bloomgen/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(BloomgenConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".bloomgen.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".bloomgen").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((BloomgenConfig::default(), None))
    }

    /// Read TOML config file
    pub fn read_toml_file(path: &Path) -> Result<BloomgenConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(mut config: BloomgenConfig) -> Result<BloomgenConfig, ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        // Neo4j
        if let Some(uri) = var("NEO4J_URI") {
            config.neo4j.uri = Some(uri);
        }
        if let Some(user) = var("NEO4J_USERNAME").or_else(|| var("NEO4J_USER")) {
            config.neo4j.username = Some(user);
        }
        if let Some(password) = var("NEO4J_PASSWORD") {
            config.neo4j.password = Some(password);
        }
        if let Some(database) = var("NEO4J_DATABASE") {
            config.neo4j.database = Some(database);
        }

        // LLM: the Gemini variables apply to the default provider
        if let Some(provider) = var("BLOOMGEN_LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if config.llm.provider.eq_ignore_ascii_case("gemini") {
            if let Some(key) = var("GEMINI_API_KEY") {
                config.llm.api_key = Some(key);
            }
            if let Some(url) = var("GEMINI_BASE_URL") {
                config.llm.base_url = Some(url);
            }
            if let Some(model) = var("GEMINI_MODEL") {
                config.llm.model = Some(model);
            }
        }
        if let Some(key) = var("BLOOMGEN_LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(url) = var("BLOOMGEN_LLM_BASE_URL") {
            config.llm.base_url = Some(url);
        }
        if let Some(model) = var("BLOOMGEN_MODEL") {
            config.llm.model = Some(model);
        }
        if let Some(temp) = var("BLOOMGEN_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = t;
            }
        }

        // Generation
        if let Some(dir) = var("BLOOMGEN_OUTPUT_DIR") {
            config.generation.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("BLOOMGEN_EXAMPLES_DIR") {
            config.generation.examples_dir = PathBuf::from(dir);
        }
        if let Some(strategy) = var("BLOOMGEN_STRATEGY") {
            config.generation.strategy = strategy.parse()?;
        }

        // Logging
        if let Some(level) = var("RUST_LOG") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate_config(config: &BloomgenConfig) -> Result<(), ConfigError> {
        match config.llm.provider.to_lowercase().as_str() {
            "gemini" | "openai" | "ollama" | "lmstudio" | "openai-compatible" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid LLM provider: {}. Must be one of: gemini, openai, ollama, lmstudio, openai-compatible",
                    other
                )))
            }
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid temperature: {}. Must be between 0.0 and 2.0",
                config.llm.temperature
            )));
        }

        let generation = &config.generation;
        if generation.min_perspectives == 0 || generation.min_perspectives > generation.max_perspectives
        {
            return Err(ConfigError::ValidationError(format!(
                "Invalid perspective range: {}-{}. Need 1 <= min <= max",
                generation.min_perspectives, generation.max_perspectives
            )));
        }

        // RUST_LOG may carry a full filter directive; only bare levels are checked
        let level = config.logging.level.as_str();
        if !level.contains('=') && !level.contains(',') {
            match level {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        other
                    )))
                }
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BloomgenConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = BloomgenConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
