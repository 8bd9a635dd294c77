//! Shared fixtures: a small SQLite database and scripted collaborators.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;
use statline_application::{
    AskHandle, Components, ConversationService, Orchestrator, WorkflowSettings,
};
use statline_core::catalog::SchemaCatalog;
use statline_core::conversation::ConversationContext;
use statline_core::event::AskEvent;
use statline_core::executor::{ExecutionError, QueryExecutor};
use statline_core::intent::{Intent, IntentKind, IntentParser, RawIntent, UnderstandError};
use statline_core::llm::{CompletionRequest, LanguageModel, LlmError};
use statline_core::narrative::TemplateNarrator;
use statline_core::query::{
    GeneratedQuery, GenerationError, GenerationRequest, QueryGenerator, QueryValidator,
    ValidatedQuery,
};
use statline_core::result::ResultSet;
use statline_core::stats::DerivedMetrics;
use statline_core::visualization::{
    ChartBuilder, DefaultChartBuilder, VisualizationError, VisualizationSpec,
};
use statline_infrastructure::{MemoryConversationRepository, ReadOnlyPool, SqliteQueryExecutor};
use tempfile::TempDir;

pub const MOST_WINS: &str = "Which team won the most matches in 2023?";

/// Wins per team in 2023, most first. Collingwood leads with 3.
pub const WINS_2023_SQL: &str = "SELECT t.name AS team, COUNT(*) AS wins \
    FROM matches m JOIN teams t ON t.id = CASE WHEN m.home_score > m.away_score \
    THEN m.home_team_id ELSE m.away_team_id END \
    WHERE m.season = 2023 AND m.home_score <> m.away_score \
    GROUP BY t.name ORDER BY wins DESC, team";

pub const MATCH_COUNT_SQL: &str = "SELECT COUNT(*) AS matches FROM matches";

pub fn build_database(dir: &Path) -> PathBuf {
    let path = dir.join("afl.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE teams (id INTEGER PRIMARY KEY, name TEXT NOT NULL, abbreviation TEXT);
         CREATE TABLE matches (id INTEGER PRIMARY KEY, season INTEGER, round TEXT,
             home_team_id INTEGER, away_team_id INTEGER, home_score INTEGER, away_score INTEGER);
         INSERT INTO teams (id, name, abbreviation) VALUES
             (1, 'Collingwood', 'COLL'), (2, 'Geelong', 'GEEL'),
             (3, 'Richmond', 'RICH'), (4, 'Carlton', 'CARL');
         INSERT INTO matches VALUES
             (1, 2023, '1', 1, 2, 95, 70),
             (2, 2023, '2', 3, 1, 60, 101),
             (3, 2023, '3', 1, 4, 88, 80),
             (4, 2023, '4', 2, 3, 77, 64),
             (5, 2023, '5', 4, 3, 90, 91),
             (6, 2022, '1', 2, 1, 99, 60);",
    )
    .unwrap();
    path
}

pub fn count_matches(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM matches", [], |row| row.get(0))
        .unwrap()
}

pub fn raw(kind: IntentKind, teams: &[&str], seasons: &[i32], metrics: &[&str]) -> RawIntent {
    RawIntent {
        kind,
        teams: teams.iter().map(|s| s.to_string()).collect(),
        seasons: seasons.to_vec(),
        metrics: metrics.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Returns a fixed reading per question, optionally after a delay.
#[derive(Default)]
pub struct ScriptedParser {
    intents: HashMap<String, RawIntent>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl ScriptedParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, question: &str, intent: RawIntent) -> Self {
        self.intents.insert(question.to_string(), intent);
        self
    }

    pub fn delayed(mut self, question: &str, delay: Duration) -> Self {
        self.delays.insert(question.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentParser for ScriptedParser {
    async fn parse(
        &self,
        question: &str,
        _context: &ConversationContext,
        _catalog: &SchemaCatalog,
    ) -> Result<RawIntent, UnderstandError> {
        if let Some(delay) = self.delays.get(question) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.intents.get(question).cloned().unwrap_or_default())
    }
}

/// Replays SQL by attempt (the last entry repeats) and records every request.
pub struct ScriptedGenerator {
    replies: Vec<String>,
    seen: Mutex<Vec<(Intent, Vec<String>, u32)>>,
}

impl ScriptedGenerator {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// (intent, feedback, attempt) per call.
    pub fn seen(&self) -> Vec<(Intent, Vec<String>, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedQuery, GenerationError> {
        self.seen.lock().unwrap().push((
            request.intent.clone(),
            request.feedback.to_vec(),
            request.attempt,
        ));
        let index = (request.attempt as usize - 1).min(self.replies.len() - 1);
        Ok(GeneratedQuery::new(self.replies[index].clone(), request.attempt))
    }
}

/// Counts calls before delegating.
pub struct CountingExecutor {
    inner: Arc<dyn QueryExecutor>,
    calls: AtomicUsize,
}

impl CountingExecutor {
    pub fn new(inner: Arc<dyn QueryExecutor>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for CountingExecutor {
    async fn execute(
        &self,
        query: &ValidatedQuery,
        timeout: Duration,
        row_cap: usize,
    ) -> Result<ResultSet, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(query, timeout, row_cap).await
    }
}

/// Never answers in time.
pub struct HangingExecutor;

#[async_trait]
impl QueryExecutor for HangingExecutor {
    async fn execute(
        &self,
        _query: &ValidatedQuery,
        _timeout: Duration,
        _row_cap: usize,
    ) -> Result<ResultSet, ExecutionError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(ExecutionError::Permanent("unreachable in tests".into()))
    }
}

/// Reports a statement timeout straight away.
pub struct TimingOutExecutor;

#[async_trait]
impl QueryExecutor for TimingOutExecutor {
    async fn execute(
        &self,
        _query: &ValidatedQuery,
        timeout: Duration,
        _row_cap: usize,
    ) -> Result<ResultSet, ExecutionError> {
        Err(ExecutionError::Timeout(timeout))
    }
}

pub struct FailingChartBuilder;

impl ChartBuilder for FailingChartBuilder {
    fn build(
        &self,
        _results: &ResultSet,
        _metrics: &DerivedMetrics,
        _intent: &Intent,
    ) -> Result<Option<VisualizationSpec>, VisualizationError> {
        Err(VisualizationError::Inconsistent("chart exploded".into()))
    }
}

/// Answers every completion with the same text.
pub struct FixedReplyModel(pub String);

#[async_trait]
impl LanguageModel for FixedReplyModel {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        Ok(self.0.clone())
    }
}

pub struct Harness {
    pub service: ConversationService,
    pub repository: Arc<MemoryConversationRepository>,
    pub executor: Arc<CountingExecutor>,
    pub parser: Arc<ScriptedParser>,
    pub generator: Arc<ScriptedGenerator>,
    pub db_path: PathBuf,
    _dir: TempDir,
}

pub struct HarnessBuilder {
    parser: ScriptedParser,
    generator: ScriptedGenerator,
    executor: Option<Arc<dyn QueryExecutor>>,
    charts: Option<Arc<dyn ChartBuilder>>,
    query_generator: Option<Arc<dyn QueryGenerator>>,
    settings: WorkflowSettings,
}

impl HarnessBuilder {
    pub fn new(parser: ScriptedParser, generator: ScriptedGenerator) -> Self {
        Self {
            parser,
            generator,
            executor: None,
            charts: None,
            query_generator: None,
            settings: WorkflowSettings {
                max_regenerations: 2,
                wall_clock_budget: Duration::from_secs(10),
                statement_timeout: Duration::from_secs(2),
                row_cap: 100,
            },
        }
    }

    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn charts(mut self, charts: Arc<dyn ChartBuilder>) -> Self {
        self.charts = Some(charts);
        self
    }

    /// Plans with `generator` instead of the scripted one, which then sees no calls.
    pub fn query_generator(mut self, generator: Arc<dyn QueryGenerator>) -> Self {
        self.query_generator = Some(generator);
        self
    }

    pub fn budget(mut self, budget: Duration) -> Self {
        self.settings.wall_clock_budget = budget;
        self
    }

    pub fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let db_path = build_database(dir.path());
        let catalog = Arc::new(SchemaCatalog::builtin().unwrap());

        let inner = match self.executor {
            Some(executor) => executor,
            None => {
                let pool = ReadOnlyPool::open(&db_path, 2, Duration::from_millis(100)).unwrap();
                Arc::new(SqliteQueryExecutor::new(pool))
            }
        };
        let executor = Arc::new(CountingExecutor::new(inner));
        let parser = Arc::new(self.parser);
        let generator = Arc::new(self.generator);
        let charts = self
            .charts
            .unwrap_or_else(|| Arc::new(DefaultChartBuilder::new(Arc::clone(&catalog))));

        let validator = QueryValidator::new(
            Arc::clone(&catalog),
            statline_core::query::ValidatorLimits {
                max_rows: self.settings.row_cap as u64,
                ..Default::default()
            },
        );
        let orchestrator = Orchestrator::new(
            Components {
                catalog,
                parser: parser.clone(),
                generator: self
                    .query_generator
                    .unwrap_or_else(|| generator.clone() as Arc<dyn QueryGenerator>),
                validator,
                executor: executor.clone(),
                charts,
                narrator: Arc::new(TemplateNarrator::new()),
            },
            self.settings,
        );
        let repository = Arc::new(MemoryConversationRepository::new());
        let service = ConversationService::new(Arc::new(orchestrator), repository.clone(), 6);

        Harness {
            service,
            repository,
            executor,
            parser,
            generator,
            db_path,
            _dir: dir,
        }
    }
}

pub async fn ask(harness: &Harness, question: &str, conversation_id: Option<&str>) -> (String, Vec<AskEvent>) {
    let handle: AskHandle = harness.service.ask(question, conversation_id);
    let id = handle.conversation_id().to_string();
    (id, handle.collect().await)
}

pub fn response_text(events: &[AskEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        AskEvent::Response { text, .. } => Some(text.as_str()),
        _ => None,
    })
}

pub fn error_message(events: &[AskEvent]) -> Option<&str> {
    events.iter().find_map(|e| match e {
        AskEvent::Error { message } => Some(message.as_str()),
        _ => None,
    })
}
