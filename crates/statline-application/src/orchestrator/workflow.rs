use std::sync::Arc;
use std::time::{Duration, Instant};

use statline_core::catalog::SchemaCatalog;
use statline_core::config::AppConfig;
use statline_core::conversation::{ConversationContext, QueryAudit, TurnMetadata};
use statline_core::event::AskEvent;
use statline_core::executor::{ExecutionError, QueryExecutor};
use statline_core::intent::{EntityResolver, Intent, IntentParser, Resolution};
use statline_core::narrative::{NarrativeRequest, Narrator};
use statline_core::query::{
    GenerationError, GenerationRequest, QueryGenerator, QueryStrategy, QueryValidator,
    ValidatedQuery,
};
use statline_core::result::ResultSet;
use statline_core::stats::summarize;
use statline_core::visualization::ChartBuilder;
use tokio::sync::mpsc;

use super::state::{FailureKind, NO_QUERY, OUT_OF_DOMAIN, Reply, State, Transition};

/// Knobs the workflow reads on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Regenerations allowed after the first rejected query.
    pub max_regenerations: u32,
    pub wall_clock_budget: Duration,
    pub statement_timeout: Duration,
    pub row_cap: usize,
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_regenerations: config.workflow.max_regenerations,
            wall_clock_budget: config.workflow.wall_clock_budget(),
            statement_timeout: config.database.statement_timeout(),
            row_cap: config.database.row_cap,
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// The agent turn a successful run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub metadata: TurnMetadata,
}

impl AgentReply {
    /// The `response` event for this reply. Audit data stays behind.
    pub fn to_event(&self) -> AskEvent {
        AskEvent::Response {
            text: self.text.clone(),
            visualization: self.metadata.visualization.clone(),
            confidence: self.metadata.confidence,
            sources: self.metadata.sources.clone(),
            truncated: self.metadata.truncated,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// Reached DONE: an answer, a clarification or a decline.
    Answered(AgentReply),
    Failed(FailureKind),
}

/// The collaborators the workflow drives.
pub struct Components {
    pub catalog: Arc<SchemaCatalog>,
    pub parser: Arc<dyn IntentParser>,
    pub generator: Arc<dyn QueryGenerator>,
    pub validator: QueryValidator,
    pub executor: Arc<dyn QueryExecutor>,
    pub charts: Arc<dyn ChartBuilder>,
    pub narrator: Arc<dyn Narrator>,
}

/// Runs one question through UNDERSTAND, PLAN, EXECUTE, VISUALIZE and
/// RESPOND.
///
/// Stateless between requests: everything a run knows about earlier turns
/// arrives in the [`ConversationContext`]. Persisting the outcome is the
/// caller's job.
pub struct Orchestrator {
    components: Components,
    settings: WorkflowSettings,
}

impl Orchestrator {
    pub fn new(components: Components, settings: WorkflowSettings) -> Self {
        Self {
            components,
            settings,
        }
    }

    pub fn settings(&self) -> WorkflowSettings {
        self.settings
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.components.catalog
    }

    /// Answers `question` within the wall-clock budget.
    ///
    /// A `progress` event is sent on `events` before each state starts work.
    /// A closed channel is not an error; the run continues to the end.
    pub async fn run(
        &self,
        question: &str,
        context: &ConversationContext,
        events: &mpsc::UnboundedSender<AskEvent>,
    ) -> WorkflowOutcome {
        let started = Instant::now();
        let budget = self.settings.wall_clock_budget;
        match tokio::time::timeout(budget, self.drive(question, context, events)).await {
            Ok(outcome) => {
                tracing::info!(
                    target: "statline::orchestrator",
                    conversation_id = %context.conversation_id,
                    outcome = outcome_label(&outcome),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "[Done] workflow finished"
                );
                outcome
            }
            Err(_) => {
                tracing::warn!(
                    target: "statline::orchestrator",
                    conversation_id = %context.conversation_id,
                    failure = "timeout",
                    budget_ms = budget.as_millis() as u64,
                    "[Failed] workflow exceeded its wall-clock budget"
                );
                WorkflowOutcome::Failed(FailureKind::Timeout)
            }
        }
    }

    async fn drive(
        &self,
        question: &str,
        context: &ConversationContext,
        events: &mpsc::UnboundedSender<AskEvent>,
    ) -> WorkflowOutcome {
        let mut state = State::Understand;
        loop {
            let _ = events.send(AskEvent::progress(state.step()));
            let transition = match state {
                State::Understand => self.understand(question, context).await,
                State::Plan { intent } => self.plan(intent, context).await,
                State::Execute { intent, query } => self.execute(intent, query).await,
                State::Visualize {
                    intent,
                    results,
                    audit,
                } => self.visualize(intent, results, audit),
                State::Respond(reply) => {
                    return WorkflowOutcome::Answered(self.respond(question, reply).await);
                }
            };
            state = match transition {
                Transition::Continue(next) => next,
                Transition::Decline(message) => State::Respond(Reply::Decline(message)),
                Transition::Fail(kind) => {
                    tracing::warn!(
                        target: "statline::orchestrator",
                        conversation_id = %context.conversation_id,
                        failure = %kind,
                        "[Failed] workflow stopped"
                    );
                    return WorkflowOutcome::Failed(kind);
                }
            };
        }
    }

    async fn understand(&self, question: &str, context: &ConversationContext) -> Transition {
        let resolver = EntityResolver::new(&self.components.catalog);

        let resumed = context
            .pending_clarification()
            .and_then(|pending| resolver.resume_clarification(question, pending, context));
        let resolution = match resumed {
            Some(resolution) => {
                tracing::debug!(target: "statline::orchestrator", "[Understand] clarification reply matched a candidate");
                resolution
            }
            None => {
                let raw = match self
                    .components
                    .parser
                    .parse(question, context, &self.components.catalog)
                    .await
                {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::error!(target: "statline::orchestrator", error = %e, "[Understand] intent extraction failed");
                        return Transition::Fail(FailureKind::Understanding);
                    }
                };
                resolver.resolve(question, raw, context)
            }
        };

        match resolution {
            Resolution::Resolved(intent) => {
                tracing::info!(
                    target: "statline::orchestrator",
                    kind = %intent.kind,
                    teams = ?intent.teams,
                    seasons = ?intent.seasons,
                    depth = %intent.depth,
                    "[Understand] intent resolved"
                );
                Transition::Continue(State::Plan { intent })
            }
            Resolution::Clarify(clarification) => {
                tracing::info!(
                    target: "statline::orchestrator",
                    candidates = clarification.candidates.len(),
                    "[Understand] clarification needed"
                );
                Transition::Continue(State::Respond(Reply::Clarify(clarification)))
            }
            Resolution::OutOfDomain => {
                tracing::info!(target: "statline::orchestrator", "[Understand] question is outside the dataset");
                Transition::Decline(OUT_OF_DOMAIN)
            }
        }
    }

    /// Generate-validate loop, bounded by `max_regenerations`.
    async fn plan(&self, intent: Intent, context: &ConversationContext) -> Transition {
        let strategy = QueryStrategy::for_intent(&intent);
        let max_attempts = self.settings.max_regenerations.saturating_add(1);
        let mut feedback: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            let generated = match self
                .components
                .generator
                .generate(GenerationRequest {
                    intent: &intent,
                    catalog: &self.components.catalog,
                    context,
                    strategy,
                    feedback: &feedback,
                    attempt,
                })
                .await
            {
                Ok(query) => query,
                Err(GenerationError::ClarificationNeeded(clarification)) => {
                    return Transition::Continue(State::Respond(Reply::Clarify(clarification)));
                }
                Err(GenerationError::GenerationFailed(reason)) => {
                    tracing::info!(target: "statline::orchestrator", %reason, attempt, "[Plan] no query for this question");
                    return Transition::Decline(NO_QUERY);
                }
            };

            match self.components.validator.validate(&generated) {
                Ok(query) => {
                    tracing::debug!(
                        target: "statline::orchestrator",
                        attempt,
                        strategy = %strategy,
                        row_limit = query.row_limit(),
                        "[Plan] query accepted"
                    );
                    return Transition::Continue(State::Execute { intent, query });
                }
                Err(rejection) => {
                    tracing::warn!(
                        target: "statline::validator",
                        code = rejection.code(),
                        reason = %rejection,
                        sql = %generated.sql,
                        attempt,
                        max_attempts,
                        "[Plan] query rejected"
                    );
                    feedback.push(rejection.feedback());
                }
            }
        }
        Transition::Fail(FailureKind::RegenerationExhausted)
    }

    async fn execute(&self, intent: Intent, query: ValidatedQuery) -> Transition {
        let result = self
            .components
            .executor
            .execute(&query, self.settings.statement_timeout, self.settings.row_cap)
            .await;
        match result {
            Ok(results) => {
                tracing::info!(
                    target: "statline::orchestrator",
                    rows = results.len(),
                    truncated = results.truncated,
                    "[Execute] query returned"
                );
                let audit = QueryAudit {
                    sql: query.sql().to_string(),
                    attempts: query.attempt(),
                };
                Transition::Continue(State::Visualize {
                    intent,
                    results,
                    audit,
                })
            }
            Err(ExecutionError::Timeout(limit)) => {
                tracing::warn!(
                    target: "statline::orchestrator",
                    failure = "timeout",
                    limit_ms = limit.as_millis() as u64,
                    "[Execute] statement timed out"
                );
                Transition::Fail(FailureKind::Timeout)
            }
            Err(e) => {
                tracing::error!(target: "statline::orchestrator", error = %e, "[Execute] query failed");
                Transition::Fail(FailureKind::ExecutionFailed)
            }
        }
    }

    /// Never fails: a chart error only drops the chart.
    fn visualize(&self, intent: Intent, results: ResultSet, audit: QueryAudit) -> Transition {
        let metrics = summarize(&results, &intent);
        let visualization = match self.components.charts.build(&results, &metrics, &intent) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(target: "statline::orchestrator", error = %e, "[Visualize] chart skipped");
                None
            }
        };
        Transition::Continue(State::Respond(Reply::Answer {
            intent,
            results,
            metrics,
            visualization,
            audit,
        }))
    }

    async fn respond(&self, question: &str, reply: Reply) -> AgentReply {
        match reply {
            Reply::Clarify(clarification) => AgentReply {
                text: clarification.question.clone(),
                metadata: TurnMetadata {
                    clarification: Some(clarification),
                    ..Default::default()
                },
            },
            Reply::Decline(message) => AgentReply {
                text: message.to_string(),
                metadata: TurnMetadata::default(),
            },
            Reply::Answer {
                intent,
                results,
                metrics,
                visualization,
                audit,
            } => {
                let narrative = self
                    .components
                    .narrator
                    .narrate(&NarrativeRequest {
                        question,
                        intent: &intent,
                        results: &results,
                        metrics: &metrics,
                        catalog: &self.components.catalog,
                    })
                    .await;
                AgentReply {
                    text: narrative.text,
                    metadata: TurnMetadata {
                        confidence: narrative.confidence,
                        sources: narrative.sources,
                        truncated: results.truncated,
                        entities: Some(intent.entities()),
                        clarification: None,
                        audit: Some(audit),
                        visualization,
                    },
                }
            }
        }
    }
}

fn outcome_label(outcome: &WorkflowOutcome) -> &'static str {
    match outcome {
        WorkflowOutcome::Answered(reply) if reply.metadata.clarification.is_some() => "clarify",
        WorkflowOutcome::Answered(reply) if reply.metadata.audit.is_some() => "answer",
        WorkflowOutcome::Answered(_) => "decline",
        WorkflowOutcome::Failed(_) => "failed",
    }
}
