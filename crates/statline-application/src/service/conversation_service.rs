//! The `ask` entry point and conversation reads.

use std::sync::Arc;
use std::time::Duration;

use statline_core::conversation::{Conversation, ConversationContext, ConversationRepository, Turn};
use statline_core::error::{Result, StatlineError};
use statline_core::event::AskEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::handle::AskHandle;
use super::lanes::Lanes;
use crate::orchestrator::{FailureKind, Orchestrator, WorkflowOutcome};

/// How long a conversation worker waits for another question before exiting.
const LANE_IDLE: Duration = Duration::from_secs(30);

const EMPTY_QUESTION: &str = "Please type a question about AFL statistics.";

struct Job {
    question: String,
    events: mpsc::UnboundedSender<AskEvent>,
    cancel: CancellationToken,
}

impl Job {
    fn abandoned(&self) -> bool {
        self.cancel.is_cancelled() || self.events.is_closed()
    }
}

/// Accepts questions and keeps each conversation's turns in order.
///
/// Questions for one conversation id run one at a time, in the order `ask`
/// was called. Different conversations run in parallel.
pub struct ConversationService {
    inner: Arc<Inner>,
}

struct Inner {
    orchestrator: Arc<Orchestrator>,
    repository: Arc<dyn ConversationRepository>,
    history_window: usize,
    lanes: Lanes<Job>,
}

impl ConversationService {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        repository: Arc<dyn ConversationRepository>,
        history_window: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                repository,
                history_window,
                lanes: Lanes::new(),
            }),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.inner.orchestrator
    }

    /// Queues a question. `None` starts a new conversation.
    ///
    /// Must be called within a Tokio runtime.
    pub fn ask(&self, question: &str, conversation_id: Option<&str>) -> AskHandle {
        let conversation_id = conversation_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .unwrap_or_else(Conversation::generate_id);
        let (events, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = AskHandle::new(conversation_id.clone(), receiver, cancel.clone());

        let question = question.trim();
        if question.is_empty() {
            let _ = events.send(AskEvent::error(EMPTY_QUESTION));
            return handle;
        }

        tracing::info!(
            target: "statline::orchestrator",
            conversation_id = %conversation_id,
            "[Ask] question accepted"
        );
        let job = Job {
            question: question.to_string(),
            events,
            cancel,
        };
        let inner = Arc::clone(&self.inner);
        let lane_id = conversation_id.clone();
        self.inner.lanes.submit(&conversation_id, job, move |receiver| {
            tokio::spawn(run_lane(inner, lane_id, receiver));
        });
        handle
    }

    /// Turns of a stored conversation, oldest first, without audit data.
    pub async fn get_conversation(&self, id: &str) -> Result<Vec<Turn>> {
        self.inner
            .repository
            .find_by_id(id)
            .await?
            .map(|conversation| conversation.redacted_turns())
            .ok_or_else(|| StatlineError::not_found("conversation", id))
    }

    /// Stored conversations, most recently updated first, without audit data.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut conversations = self.inner.repository.list_all().await?;
        for conversation in &mut conversations {
            conversation.turns = conversation.redacted_turns();
        }
        Ok(conversations)
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.inner.repository.delete(id).await
    }
}

async fn run_lane(inner: Arc<Inner>, id: String, mut receiver: mpsc::UnboundedReceiver<Job>) {
    loop {
        match tokio::time::timeout(LANE_IDLE, receiver.recv()).await {
            Ok(Some(job)) => inner.process(&id, job).await,
            Ok(None) => return,
            Err(_) => {
                if inner.lanes.retire(&id, &receiver) {
                    tracing::debug!(target: "statline::orchestrator", conversation_id = %id, "[Ask] idle conversation worker exited");
                    return;
                }
            }
        }
    }
}

impl Inner {
    async fn process(&self, id: &str, job: Job) {
        if job.abandoned() {
            tracing::info!(target: "statline::orchestrator", conversation_id = %id, "[Cancelled] caller left before the question started");
            return;
        }

        let mut conversation = match self.repository.find_by_id(id).await {
            Ok(found) => found.unwrap_or_else(|| Conversation::new(id)),
            Err(e) => {
                tracing::error!(target: "statline::storage", conversation_id = %id, error = %e, "[Ask] could not load conversation");
                let _ = job.events.send(AskEvent::error(FailureKind::Internal.user_message()));
                return;
            }
        };
        let context = ConversationContext::from_conversation(&conversation, self.history_window);

        let outcome = self
            .orchestrator
            .run(&job.question, &context, &job.events)
            .await;

        if job.abandoned() {
            tracing::info!(target: "statline::orchestrator", conversation_id = %id, "[Cancelled] result discarded");
            return;
        }

        match outcome {
            WorkflowOutcome::Answered(reply) => {
                let user = Turn::user(job.question.as_str()).at(conversation.next_timestamp());
                let appended = conversation.append(user).and_then(|_| {
                    let agent = Turn::agent(reply.text.as_str(), reply.metadata.clone())
                        .at(conversation.next_timestamp());
                    conversation.append(agent)
                });
                let saved = match appended {
                    Ok(()) => self.repository.save(&conversation).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = saved {
                    tracing::error!(target: "statline::storage", conversation_id = %id, error = %e, "[Respond] could not persist conversation");
                    let _ = job.events.send(AskEvent::error(FailureKind::Internal.user_message()));
                    return;
                }
                let _ = job.events.send(reply.to_event());
                let _ = job.events.send(AskEvent::Complete {
                    conversation_id: id.to_string(),
                });
            }
            WorkflowOutcome::Failed(kind) => {
                let _ = job.events.send(AskEvent::error(kind.user_message()));
            }
        }
    }
}
