use crate::aggregate::CiphertextHandle;
use crate::batch::BatchId;
use crate::identity::Identity;
use crate::oracle::RequestId;

use super::reconcile::Fingerprint;

/// Notifications emitted by successful state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    OwnershipTransferred {
        previous: Identity,
        new: Identity,
    },
    ProviderAdded {
        provider: Identity,
    },
    ProviderRemoved {
        provider: Identity,
    },
    Paused {
        by: Identity,
    },
    Unpaused {
        by: Identity,
    },
    CooldownUpdated {
        cooldown_secs: u64,
    },
    BatchOpened {
        batch_id: BatchId,
    },
    BatchClosed {
        batch_id: BatchId,
    },
    ContributionSubmitted {
        batch_id: BatchId,
        provider: Identity,
        handle: CiphertextHandle,
    },
    DecryptionRequested {
        request_id: RequestId,
        batch_id: BatchId,
        fingerprint: Fingerprint,
    },
    DecryptionCompleted {
        request_id: RequestId,
        batch_id: BatchId,
        value: u64,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::OwnershipTransferred { previous, new } => {
                write!(f, "OwnershipTransferred({} -> {})", previous, new)
            }
            Event::ProviderAdded { provider } => write!(f, "ProviderAdded({})", provider),
            Event::ProviderRemoved { provider } => write!(f, "ProviderRemoved({})", provider),
            Event::Paused { by } => write!(f, "Paused(by {})", by),
            Event::Unpaused { by } => write!(f, "Unpaused(by {})", by),
            Event::CooldownUpdated { cooldown_secs } => {
                write!(f, "CooldownUpdated({}s)", cooldown_secs)
            }
            Event::BatchOpened { batch_id } => write!(f, "BatchOpened({})", batch_id),
            Event::BatchClosed { batch_id } => write!(f, "BatchClosed({})", batch_id),
            Event::ContributionSubmitted {
                batch_id,
                provider,
                handle,
            } => write!(
                f,
                "ContributionSubmitted(batch {}, {} from {})",
                batch_id, handle, provider
            ),
            Event::DecryptionRequested {
                request_id,
                batch_id,
                fingerprint,
            } => write!(
                f,
                "DecryptionRequested({}, batch {}, fingerprint {})",
                request_id, batch_id, fingerprint
            ),
            Event::DecryptionCompleted {
                request_id,
                batch_id,
                value,
            } => write!(
                f,
                "DecryptionCompleted({}, batch {}, value {})",
                request_id, batch_id, value
            ),
        }
    }
}

/// Append-only event history with flume fan-out
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    history: Vec<Event>,
    subscribers: Vec<flume::Sender<Event>>,
}

impl EventLog {
    pub(crate) fn emit(&mut self, event: Event) {
        tracing::info!("EVENT: {}", event);
        // drop subscribers whose receiver is gone
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        self.history.push(event);
    }

    pub(crate) fn subscribe(&mut self) -> flume::Receiver<Event> {
        let (tx, rx) = flume::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn history(&self) -> &[Event] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_and_dropped_ones_are_pruned() {
        let mut log = EventLog::default();
        let kept = log.subscribe();
        let dropped = log.subscribe();
        drop(dropped);

        log.emit(Event::BatchOpened { batch_id: 0 });
        log.emit(Event::BatchClosed { batch_id: 0 });

        assert_eq!(log.subscribers.len(), 1);
        assert_eq!(kept.try_recv().unwrap(), Event::BatchOpened { batch_id: 0 });
        assert_eq!(kept.try_recv().unwrap(), Event::BatchClosed { batch_id: 0 });
        assert_eq!(log.history().len(), 2);
    }
}
