//! Wires configuration into a running [`ConversationService`].

use std::sync::Arc;

use anyhow::Context as _;
use statline_core::catalog::SchemaCatalog;
use statline_core::config::{AppConfig, CatalogConfig};
use statline_core::conversation::ConversationRepository;
use statline_core::executor::{QueryExecutor, RetryingExecutor};
use statline_core::narrative::{Narrator, TemplateNarrator};
use statline_core::query::QueryValidator;
use statline_core::visualization::DefaultChartBuilder;
use statline_infrastructure::config_service::database_path;
use statline_infrastructure::storage::SecretStorage;
use statline_infrastructure::{ReadOnlyPool, SqliteQueryExecutor, TomlConversationRepository};
use statline_interaction::{
    LlmIntentParser, LlmNarrator, LlmQueryGenerator, PromptLibrary, build_language_model,
};

use crate::orchestrator::{Components, Orchestrator, WorkflowSettings};
use crate::service::ConversationService;

/// Everything a front end needs after startup.
pub struct App {
    pub config: AppConfig,
    pub catalog: Arc<SchemaCatalog>,
    pub validator: QueryValidator,
    pub service: Arc<ConversationService>,
}

/// The configured catalog, or the built-in AFL catalog.
pub fn load_catalog(config: &CatalogConfig) -> anyhow::Result<SchemaCatalog> {
    match &config.path {
        Some(path) => SchemaCatalog::load(path)
            .with_context(|| format!("failed to load catalog from {}", path.display())),
        None => SchemaCatalog::builtin().context("built-in catalog is invalid"),
    }
}

/// A validator over the configured catalog, for offline checks.
pub fn build_validator(config: &AppConfig) -> anyhow::Result<QueryValidator> {
    let catalog = Arc::new(load_catalog(&config.catalog)?);
    Ok(QueryValidator::new(catalog, config.validator_limits()))
}

/// Opens the database, the model client and conversation storage.
///
/// Fails when the catalog, the database or model credentials are missing.
pub fn bootstrap(config: AppConfig) -> anyhow::Result<App> {
    let catalog = Arc::new(load_catalog(&config.catalog)?);
    let validator = QueryValidator::new(Arc::clone(&catalog), config.validator_limits());

    let db_path = database_path(&config)?;
    let pool = ReadOnlyPool::open(
        &db_path,
        config.database.pool_size,
        config.database.statement_timeout(),
    )
    .with_context(|| format!("failed to open statistics database {}", db_path.display()))?;
    let executor: Arc<dyn QueryExecutor> = Arc::new(RetryingExecutor::new(
        Arc::new(SqliteQueryExecutor::new(pool)),
        config.database.retry_backoff(),
    ));

    let secrets = SecretStorage::new()
        .context("failed to locate secret.json")?
        .load_or_default()
        .context("failed to read secret.json")?;
    let model = build_language_model(&config.llm, &secrets)
        .context("language model is not configured")?;
    let prompts = Arc::new(PromptLibrary::new().context("prompt templates are invalid")?);

    let narrator: Arc<dyn Narrator> = if config.llm.narrate_with_llm {
        Arc::new(LlmNarrator::new(Arc::clone(&model), Arc::clone(&prompts)))
    } else {
        Arc::new(TemplateNarrator::new())
    };

    let components = Components {
        catalog: Arc::clone(&catalog),
        parser: Arc::new(LlmIntentParser::new(Arc::clone(&model), Arc::clone(&prompts))),
        generator: Arc::new(LlmQueryGenerator::new(model, prompts)),
        validator: validator.clone(),
        executor,
        charts: Arc::new(DefaultChartBuilder::new(Arc::clone(&catalog))),
        narrator,
    };
    let orchestrator = Arc::new(Orchestrator::new(
        components,
        WorkflowSettings::from_config(&config),
    ));

    let repository: Arc<dyn ConversationRepository> = Arc::new(
        TomlConversationRepository::default_location()
            .context("failed to open conversation storage")?,
    );
    let service = Arc::new(ConversationService::new(
        orchestrator,
        repository,
        config.workflow.history_window,
    ));

    tracing::info!(
        target: "statline::orchestrator",
        database = %db_path.display(),
        catalog = %catalog.name,
        "[Bootstrap] statline ready"
    );
    Ok(App {
        config,
        catalog,
        validator,
        service,
    })
}
