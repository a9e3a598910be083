use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::{HistoryStore, Sample, TailError, TailReader};

/// Messages pushed to clients, serialized as `{"event": "...", "data": [...]}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Whole history, sent once to a client that just connected.
    InitialData { data: Vec<Sample> },
    /// Samples produced by one read, sent to every connected client.
    NewData { data: Vec<Sample> },
}

/// Shared owner of the sample history and the broadcast channel feeding clients.
///
/// There is a single writer, the tail loop calling `ingest`. Any number of clients may `subscribe` concurrently.
/// Both operations run under the same lock, so a subscriber's snapshot and its channel registration happen
/// between two batches: every sample reaches it exactly once, either in the snapshot or in a later batch.
#[derive(Clone)]
pub struct SampleFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    history: Mutex<HistoryStore>,
    tx: broadcast::Sender<FeedMessage>,
}

impl SampleFeed {
    /// Create a feed over an already loaded history.
    ///
    /// `client_queue` is the number of batches a slow client may fall behind before it starts losing the oldest.
    pub fn new(history: HistoryStore, client_queue: usize) -> Self {
        let (tx, _) = broadcast::channel(client_queue.max(1));
        Self {
            inner: Arc::new(FeedInner {
                history: Mutex::new(history),
                tx,
            }),
        }
    }

    /// Let `reader` consume new data into the history and broadcast what it produced.
    ///
    /// Returns the number of new samples. The file is read before the lock is taken; only updating history and broadcasting exclude subscribers.
    /// Blocks on file I/O, so async callers run it on a blocking thread.
    pub fn ingest(&self, reader: &mut TailReader) -> Result<usize, TailError> {
        let batch = reader.read_batch()?;
        let count = batch.samples.len();

        let mut history = self.history();
        batch.apply_to(&mut history);
        if count > 0 {
            // an error only means nobody is listening right now
            let _ = self.inner.tx.send(FeedMessage::NewData {
                data: batch.samples,
            });
        }
        Ok(count)
    }

    /// Register a new client: it first gets the current history, then every later batch.
    pub fn subscribe(&self) -> Subscription {
        let history = self.history();
        let receiver = self.inner.tx.subscribe();
        Subscription {
            initial: Some(FeedMessage::InitialData {
                data: history.snapshot(),
            }),
            receiver,
        }
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.history().snapshot()
    }

    /// Number of currently subscribed clients.
    pub fn client_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    pub(crate) fn history(&self) -> MutexGuard<'_, HistoryStore> {
        // history holds plain values, a panic while it was locked cannot leave it torn
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stream of messages for one client.
pub struct Subscription {
    initial: Option<FeedMessage>,
    receiver: broadcast::Receiver<FeedMessage>,
}

impl Subscription {
    /// Next message for this client, `None` once the feed is gone.
    ///
    /// A client that falls more than the queue length behind skips the batches it missed.
    pub async fn recv(&mut self) -> Option<FeedMessage> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "client fell behind, dropping missed batches")
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
