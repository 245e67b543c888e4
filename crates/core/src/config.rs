use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub nlu: NluConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NluConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub confidence_threshold: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub base_url: Option<String>,
    pub top_k: u32,
    pub score_threshold: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub max_prompt_tokens: u32,
    pub max_response_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub verify_url: Option<String>,
    pub trusted_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Verify bearer tokens against an external identity service.
    Http,
    /// Single shared token plus caller headers. Development and tests only.
    Trusted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub nlu_base_url: Option<String>,
    pub retrieval_base_url: Option<String>,
    pub auth_mode: Option<AuthMode>,
    pub auth_trusted_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://helply.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            nlu: NluConfig {
                base_url: None,
                api_key: None,
                model: "valhalla/distilbart-mnli-12-1".to_string(),
                confidence_threshold: 0.40,
                timeout_secs: 30,
            },
            retrieval: RetrievalConfig {
                base_url: None,
                top_k: 3,
                score_threshold: 0.25,
                timeout_secs: 15,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: None,
                model: "gemini-2.0-flash".to_string(),
                timeout_secs: 30,
                max_retries: 3,
                max_prompt_tokens: 8000,
                max_response_tokens: 500,
                temperature: 0.3,
            },
            auth: AuthConfig {
                mode: AuthMode::Trusted,
                verify_url: None,
                trusted_token: None,
                timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "trusted" => Ok(Self::Trusted),
            other => Err(ConfigError::Validation(format!(
                "unsupported auth mode `{other}` (expected http|trusted)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("helply.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(nlu) = patch.nlu {
            if let Some(base_url) = nlu.base_url {
                self.nlu.base_url = Some(base_url);
            }
            if let Some(nlu_api_key_value) = nlu.api_key {
                self.nlu.api_key = Some(secret_value(nlu_api_key_value));
            }
            if let Some(model) = nlu.model {
                self.nlu.model = model;
            }
            if let Some(confidence_threshold) = nlu.confidence_threshold {
                self.nlu.confidence_threshold = confidence_threshold;
            }
            if let Some(timeout_secs) = nlu.timeout_secs {
                self.nlu.timeout_secs = timeout_secs;
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(base_url) = retrieval.base_url {
                self.retrieval.base_url = Some(base_url);
            }
            if let Some(top_k) = retrieval.top_k {
                self.retrieval.top_k = top_k;
            }
            if let Some(score_threshold) = retrieval.score_threshold {
                self.retrieval.score_threshold = score_threshold;
            }
            if let Some(timeout_secs) = retrieval.timeout_secs {
                self.retrieval.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(max_prompt_tokens) = llm.max_prompt_tokens {
                self.llm.max_prompt_tokens = max_prompt_tokens;
            }
            if let Some(max_response_tokens) = llm.max_response_tokens {
                self.llm.max_response_tokens = max_response_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(mode) = auth.mode {
                self.auth.mode = mode;
            }
            if let Some(verify_url) = auth.verify_url {
                self.auth.verify_url = Some(verify_url);
            }
            if let Some(trusted_token_value) = auth.trusted_token {
                self.auth.trusted_token = Some(secret_value(trusted_token_value));
            }
            if let Some(timeout_secs) = auth.timeout_secs {
                self.auth.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("HELPLY_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("HELPLY_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("HELPLY_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HELPLY_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HELPLY_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HELPLY_NLU_BASE_URL") {
            self.nlu.base_url = Some(value);
        }
        if let Some(value) = read_env("HELPLY_NLU_API_KEY") {
            self.nlu.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HELPLY_NLU_MODEL") {
            self.nlu.model = value;
        }
        if let Some(value) = read_env("HELPLY_NLU_CONFIDENCE_THRESHOLD") {
            self.nlu.confidence_threshold = parse_f32("HELPLY_NLU_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("HELPLY_RETRIEVAL_BASE_URL") {
            self.retrieval.base_url = Some(value);
        }
        if let Some(value) = read_env("HELPLY_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = parse_u32("HELPLY_RETRIEVAL_TOP_K", &value)?;
        }
        if let Some(value) = read_env("HELPLY_RETRIEVAL_SCORE_THRESHOLD") {
            self.retrieval.score_threshold =
                parse_f32("HELPLY_RETRIEVAL_SCORE_THRESHOLD", &value)?;
        }

        if let Some(value) = read_env("HELPLY_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("HELPLY_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("HELPLY_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("HELPLY_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("HELPLY_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("HELPLY_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("HELPLY_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("HELPLY_LLM_MAX_PROMPT_TOKENS") {
            self.llm.max_prompt_tokens = parse_u32("HELPLY_LLM_MAX_PROMPT_TOKENS", &value)?;
        }
        if let Some(value) = read_env("HELPLY_LLM_MAX_RESPONSE_TOKENS") {
            self.llm.max_response_tokens = parse_u32("HELPLY_LLM_MAX_RESPONSE_TOKENS", &value)?;
        }
        if let Some(value) = read_env("HELPLY_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("HELPLY_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("HELPLY_AUTH_MODE") {
            self.auth.mode = value.parse()?;
        }
        if let Some(value) = read_env("HELPLY_AUTH_VERIFY_URL") {
            self.auth.verify_url = Some(value);
        }
        if let Some(value) = read_env("HELPLY_AUTH_TRUSTED_TOKEN") {
            self.auth.trusted_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("HELPLY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("HELPLY_SERVER_PORT") {
            self.server.port = parse_u16("HELPLY_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("HELPLY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("HELPLY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("HELPLY_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("HELPLY_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("HELPLY_LOGGING_LEVEL").or_else(|| read_env("HELPLY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HELPLY_LOGGING_FORMAT").or_else(|| read_env("HELPLY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
        if let Some(nlu_base_url) = overrides.nlu_base_url {
            self.nlu.base_url = Some(nlu_base_url);
        }
        if let Some(retrieval_base_url) = overrides.retrieval_base_url {
            self.retrieval.base_url = Some(retrieval_base_url);
        }
        if let Some(auth_mode) = overrides.auth_mode {
            self.auth.mode = auth_mode;
        }
        if let Some(auth_trusted_token) = overrides.auth_trusted_token {
            self.auth.trusted_token = Some(secret_value(auth_trusted_token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_nlu(&self.nlu)?;
        validate_retrieval(&self.retrieval)?;
        validate_llm(&self.llm)?;
        validate_auth(&self.auth)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("helply.toml"), PathBuf::from("config/helply.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_nlu(nlu: &NluConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&nlu.confidence_threshold) {
        return Err(ConfigError::Validation(
            "nlu.confidence_threshold must be in range 0.0..=1.0".to_string(),
        ));
    }
    if nlu.timeout_secs == 0 || nlu.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "nlu.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if let Some(base_url) = &nlu.base_url {
        validate_http_url("nlu.base_url", base_url)?;
    }
    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    if retrieval.top_k == 0 {
        return Err(ConfigError::Validation(
            "retrieval.top_k must be greater than zero".to_string(),
        ));
    }
    if let Some(base_url) = &retrieval.base_url {
        validate_http_url("retrieval.base_url", base_url)?;
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }
    if llm.max_prompt_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_prompt_tokens must be greater than zero".to_string(),
        ));
    }
    if llm.max_response_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_response_tokens must be greater than zero".to_string(),
        ));
    }
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }
    if let Some(base_url) = &llm.base_url {
        validate_http_url("llm.base_url", base_url)?;
    }
    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    match auth.mode {
        AuthMode::Http => {
            let missing =
                auth.verify_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "auth.verify_url is required for auth.mode = \"http\"".to_string(),
                ));
            }
            if let Some(verify_url) = &auth.verify_url {
                validate_http_url("auth.verify_url", verify_url)?;
            }
        }
        AuthMode::Trusted => {
            let missing = auth
                .trusted_token
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "auth.trusted_token is required for auth.mode = \"trusted\"".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    nlu: Option<NluPatch>,
    retrieval: Option<RetrievalPatch>,
    llm: Option<LlmPatch>,
    auth: Option<AuthPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NluPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    confidence_threshold: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalPatch {
    base_url: Option<String>,
    top_k: Option<u32>,
    score_threshold: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    max_prompt_tokens: Option<u32>,
    max_response_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    mode: Option<AuthMode>,
    verify_url: Option<String>,
    trusted_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
