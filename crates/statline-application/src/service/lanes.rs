use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// One sender per conversation id with a live worker behind it.
///
/// Senders are only used while the map lock is held, so a worker that
/// checks its queue under the same lock can retire without losing a job.
pub(crate) struct Lanes<J> {
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<J>>>,
}

impl<J> Lanes<J> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Queues `job` on the lane for `id`, calling `spawn` with a fresh
    /// receiver when the lane has no worker.
    pub(crate) fn submit(
        &self,
        id: &str,
        job: J,
        spawn: impl FnOnce(mpsc::UnboundedReceiver<J>),
    ) {
        let mut senders = self.lock();
        let job = match senders.get(id) {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                // Worker is gone without retiring; replace it.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        // A receiver that was just created cannot be closed.
        let _ = sender.send(job);
        senders.insert(id.to_string(), sender);
        spawn(receiver);
    }

    /// Removes the lane if `receiver` has nothing queued. Returns whether the
    /// worker may exit.
    pub(crate) fn retire(&self, id: &str, receiver: &mpsc::UnboundedReceiver<J>) -> bool {
        let mut senders = self.lock();
        if !receiver.is_empty() {
            return false;
        }
        senders.remove(id);
        true
    }

    pub(crate) fn active(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<J>>> {
        // The map stays consistent even if a holder panicked mid-insert.
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
