use statline_core::event::AskEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The caller's end of one `ask`.
///
/// Yields progress events, then either `response` + `complete` or a single
/// `error`. Dropping the handle counts as a disconnect: the workflow still
/// runs to the end, but its result is never appended to the conversation.
#[derive(Debug)]
pub struct AskHandle {
    conversation_id: String,
    events: mpsc::UnboundedReceiver<AskEvent>,
    cancel: CancellationToken,
}

impl AskHandle {
    pub(crate) fn new(
        conversation_id: String,
        events: mpsc::UnboundedReceiver<AskEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            conversation_id,
            events,
            cancel,
        }
    }

    /// The conversation this question belongs to, generated when none was given.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<AskEvent> {
        self.events.recv().await
    }

    /// Drains the stream up to and including its terminal event.
    pub async fn collect(mut self) -> Vec<AskEvent> {
        let mut out = Vec::new();
        while let Some(event) = self.events.recv().await {
            let terminal = event.is_terminal();
            out.push(event);
            if terminal {
                break;
            }
        }
        out
    }

    /// Stops listening. The result of the in-flight run is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for AskHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
