//! In-process topic bus
//!
//! Topics are plain strings mapped to an ordered list of asynchronous
//! handlers. Publishing never blocks the caller on handler completion.
//!
//! # Guarantees
//!
//! - Handlers of one topic start in registration order, one after the other
//! - A panicking handler is logged; the publisher and the remaining handlers
//!   are unaffected
//! - `subscribe_if_absent` is a single atomic operation on the registry

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Type-erased asynchronous topic handler
pub type Handler<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

fn boxed<A, F, Fut>(handler: F) -> Handler<A>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |args| Box::pin(handler(args)))
}

/// Topic-keyed publish/subscribe registry
///
/// Every handler of a topic receives a clone of the published arguments.
pub struct TopicBus<A> {
    topics: DashMap<String, Vec<Handler<A>>>,
}

impl<A> TopicBus<A>
where
    A: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Appends a handler to `topic`
    pub fn subscribe<F, Fut>(&self, topic: impl Into<String>, handler: F)
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.topics
            .entry(topic.into())
            .or_default()
            .push(boxed(handler));
    }

    /// Registers `handler` only if `topic` has no handler yet
    ///
    /// Returns `true` if the handler was registered. Concurrent callers racing
    /// on a fresh topic register exactly one handler between them.
    pub fn subscribe_if_absent<F, Fut>(&self, topic: impl Into<String>, handler: F) -> bool
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.topics.entry(topic.into()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_empty() {
                    entry.get_mut().push(boxed(handler));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![boxed(handler)]);
                true
            }
        }
    }

    pub fn has_subscriber(&self, topic: &str) -> bool {
        self.subscriber_count(topic) > 0
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|h| h.len()).unwrap_or(0)
    }

    /// Number of topics with at least one handler
    pub fn topic_count(&self) -> usize {
        self.topics.iter().filter(|e| !e.value().is_empty()).count()
    }

    /// Schedules every handler of `topic` with `args` (fire-and-forget)
    ///
    /// Returns the number of handlers scheduled. Nothing is scheduled when the
    /// topic has no handler or when called outside a tokio runtime.
    pub fn publish(&self, topic: &str, args: A) -> usize {
        // Clone out of the shard so no lock is held while handlers run
        let handlers: Vec<Handler<A>> = match self.topics.get(topic) {
            Some(handlers) => handlers.clone(),
            None => Vec::new(),
        };

        if handlers.is_empty() {
            tracing::debug!(topic, "No subscriber for topic");
            return 0;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(topic, "Publish outside a tokio runtime; dropping");
                return 0;
            }
        };

        let count = handlers.len();
        let topic = topic.to_string();
        let inner = runtime.clone();
        runtime.spawn(async move {
            for handler in handlers {
                let args = args.clone();
                if let Err(e) = inner.spawn(async move { handler(args).await }).await {
                    if e.is_panic() {
                        tracing::error!(topic = %topic, "Topic handler panicked");
                    } else {
                        tracing::warn!(topic = %topic, "Topic handler cancelled: {}", e);
                    }
                }
            }
        });

        count
    }
}

impl<A> Default for TopicBus<A>
where
    A: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A> std::fmt::Debug for TopicBus<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicBus")
            .field("topics", &self.topics.len())
            .finish()
    }
}
