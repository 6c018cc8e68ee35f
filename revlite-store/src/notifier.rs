use revlite_core::RevId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// A committed change to a document's current revision set.
///
/// `external` is true only for revisions that arrived through
/// [`ingest_revision`](crate::DocumentStore::ingest_revision), i.e. writes
/// the local caller did not originate. Delivery is at-least-once; subscribers
/// should re-fetch the document rather than assume delta content.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub document_id: Uuid,
    pub rev_id: RevId,
    pub deleted: bool,
    pub external: bool,
}

type Callback = Box<dyn Fn(&DocumentChange) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: Callback,
}

/// Handle returned by [`ChangeNotifier::subscribe`]; consumed on unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
}

/// Callback registry for document change events.
///
/// Dispatch happens on the committing task while the subscriber table lock
/// is held. That is what makes `unsubscribe` synchronous: once it returns,
/// no callback for that handle can still be running or get scheduled.
/// Callbacks must not call back into the notifier.
pub struct ChangeNotifier {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DocumentChange) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(Subscriber {
                id,
                callback: Box::new(callback),
            }),
            Err(_) => tracing::error!("Failed to acquire subscriber lock for subscribe"),
        }
        Subscription { id }
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.retain(|s| s.id != subscription.id),
            Err(_) => tracing::error!("Failed to acquire subscriber lock for unsubscribe"),
        }
    }

    pub fn publish(&self, change: DocumentChange) {
        let subscribers = match self.subscribers.lock() {
            Ok(subscribers) => subscribers,
            Err(_) => {
                tracing::error!("Failed to acquire subscriber lock for publish");
                return;
            }
        };

        if subscribers.is_empty() {
            return;
        }

        tracing::debug!(
            "Notifying {} subscriber(s): document {} at {} (external: {})",
            subscribers.len(),
            change.document_id,
            change.rev_id,
            change.external
        );

        for subscriber in subscribers.iter() {
            (subscriber.callback)(&change);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
