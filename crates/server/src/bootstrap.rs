use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use helply_agent::{
    EngineDeps, EngineSettings, Generator, IntentClassifier, NoopClassifier, NoopGenerator,
    NoopRetriever, Retriever, TurnEngine,
};
use helply_core::config::{AppConfig, AuthMode, ConfigError, LoadOptions};
use helply_db::repositories::{
    SqlDialogueRepository, SqlOrderRepository, SqlTurnLogRepository, SqlUserRepository,
};
use helply_db::{connect, migrations, DbPool};

use crate::auth::{HttpIdentityProvider, IdentityProvider, TrustedTokenProvider};
use crate::providers::{
    http_client, GeminiGenerator, HfZeroShotClassifier, HttpRetriever, DEFAULT_GEMINI_BASE_URL,
};
use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let classifier: Arc<dyn IntentClassifier> = match &config.nlu.base_url {
        Some(base_url) => Arc::new(HfZeroShotClassifier::new(
            http_client(config.nlu.timeout_secs).map_err(BootstrapError::HttpClient)?,
            base_url.clone(),
            config.nlu.model.clone(),
            config.nlu.api_key.clone(),
        )),
        None => Arc::new(NoopClassifier),
    };

    let retriever: Arc<dyn Retriever> = match &config.retrieval.base_url {
        Some(base_url) => Arc::new(HttpRetriever::new(
            http_client(config.retrieval.timeout_secs).map_err(BootstrapError::HttpClient)?,
            base_url.clone(),
        )),
        None => Arc::new(NoopRetriever),
    };

    let generator: Arc<dyn Generator> = match &config.llm.api_key {
        Some(api_key) => Arc::new(GeminiGenerator::new(
            http_client(config.llm.timeout_secs).map_err(BootstrapError::HttpClient)?,
            config.llm.base_url.clone().unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            config.llm.model.clone(),
            api_key.clone(),
        )),
        None => Arc::new(NoopGenerator),
    };

    let identity: Arc<dyn IdentityProvider> = match config.auth.mode {
        AuthMode::Http => Arc::new(HttpIdentityProvider::new(
            http_client(config.auth.timeout_secs).map_err(BootstrapError::HttpClient)?,
            config.auth.verify_url.clone().unwrap_or_default(),
        )),
        AuthMode::Trusted => Arc::new(TrustedTokenProvider::new(
            config.auth.trusted_token.clone().unwrap_or_else(|| String::new().into()),
        )),
    };

    info!(
        event_name = "system.bootstrap.collaborators_wired",
        correlation_id = "bootstrap",
        classifier = if config.nlu.base_url.is_some() { "http" } else { "noop" },
        retriever = if config.retrieval.base_url.is_some() { "http" } else { "noop" },
        generator = if config.llm.api_key.is_some() { "gemini" } else { "noop" },
        "collaborator capabilities initialized"
    );

    let engine = TurnEngine::new(
        EngineDeps {
            classifier,
            retriever: retriever.clone(),
            generator,
            orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
            dialogue: Arc::new(SqlDialogueRepository::new(db_pool.clone())),
            sink: Arc::new(SqlTurnLogRepository::new(db_pool.clone())),
        },
        EngineSettings::from_config(&config),
    );

    let state = AppState {
        engine: Arc::new(engine),
        identity,
        users: Arc::new(SqlUserRepository::new(db_pool.clone())),
        turn_log: Arc::new(SqlTurnLogRepository::new(db_pool.clone())),
        retriever,
    };

    Ok(Application { config, db_pool, state })
}
