//! Regeneration trigger
//!
//! Every path is a topic on the trigger's bus. The first trigger of a path
//! subscribes a revalidation handler for it; every trigger then publishes the
//! path so the handler issues one request in the background.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::content::ContentSource;
use super::revalidate::Revalidator;
use crate::bus::TopicBus;
use crate::config::Config;

/// Payload published for one regeneration
#[derive(Debug, Clone)]
pub struct Regeneration {
    pub path: String,
    /// Why the regeneration was requested; only logged
    pub reason: String,
}

/// Number of triggers issued per group by [`RegenerationTrigger::trigger_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    pub categories: usize,
    pub posts: usize,
    pub pages: usize,
    pub tags: usize,
}

impl TriggerReport {
    pub fn total(&self) -> usize {
        self.categories + self.posts + self.pages + self.tags
    }
}

/// Escapes `#` and `/` in a user-provided path segment
pub fn encode_path(segment: &str) -> String {
    segment.replace('#', "%23").replace('/', "%2F")
}

pub struct RegenerationTrigger {
    bus: TopicBus<Regeneration>,
    revalidator: Arc<dyn Revalidator>,
    content: Arc<dyn ContentSource>,
    retry_count: u32,
    retry_delay: Duration,
    page_size: u64,
}

impl RegenerationTrigger {
    pub fn new(
        config: &Config,
        revalidator: Arc<dyn Revalidator>,
        content: Arc<dyn ContentSource>,
    ) -> Self {
        Self {
            bus: TopicBus::new(),
            revalidator,
            content,
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            page_size: config.page_size,
        }
    }

    /// Handlers currently registered for `path`
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.bus.subscriber_count(path)
    }

    /// Requests regeneration of `path` once; a failed request is only logged
    pub fn trigger(&self, path: &str, reason: &str) {
        tracing::info!(path, reason, "Trigger regeneration");

        let revalidator = self.revalidator.clone();
        self.bus.subscribe_if_absent(path, move |req: Regeneration| {
            let revalidator = revalidator.clone();
            async move {
                if let Err(e) = revalidator.revalidate(&req.path).await {
                    tracing::error!(path = %req.path, reason = %req.reason, "Regeneration failed: {}", e);
                }
            }
        });

        self.publish(path, reason);
    }

    /// Requests regeneration of `path`, retrying failed requests
    ///
    /// At most `retry_count` attempts are made, `retry_delay` apart; the first
    /// success ends the sequence.
    pub fn trigger_with_retry(&self, path: &str, reason: &str) {
        tracing::info!(path, reason, attempts = self.retry_count, "Trigger regeneration with retry");

        let revalidator = self.revalidator.clone();
        let attempts = self.retry_count;
        let delay = self.retry_delay;
        self.bus.subscribe_if_absent(path, move |req: Regeneration| {
            let revalidator = revalidator.clone();
            async move {
                revalidate_with_retry(revalidator.as_ref(), &req, attempts, delay).await;
            }
        });

        self.publish(path, reason);
    }

    fn publish(&self, path: &str, reason: &str) {
        self.bus.publish(
            path,
            Regeneration {
                path: path.to_string(),
                reason: reason.to_string(),
            },
        );
    }

    /// Regenerates every category, post, listing page and tag, in that order
    ///
    /// A failed content query is logged and its group is skipped.
    pub async fn trigger_all(&self, reason: &str) -> TriggerReport {
        let report = TriggerReport {
            categories: self.trigger_categories(reason).await,
            posts: self.trigger_posts(reason).await,
            pages: self.trigger_pages(reason).await,
            tags: self.trigger_tags(reason).await,
        };

        tracing::info!(
            reason,
            categories = report.categories,
            posts = report.posts,
            pages = report.pages,
            tags = report.tags,
            "Regeneration fan-out issued"
        );
        report
    }

    /// Runs [`RegenerationTrigger::trigger_all`] in the background
    pub fn spawn_trigger_all(
        self: &Arc<Self>,
        reason: impl Into<String>,
    ) -> Option<JoinHandle<TriggerReport>> {
        let reason = reason.into();
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(reason = %reason, "No tokio runtime; skipping regeneration");
                return None;
            }
        };

        let this = self.clone();
        Some(runtime.spawn(async move { this.trigger_all(&reason).await }))
    }

    pub async fn trigger_categories(&self, reason: &str) -> usize {
        let keys = match self.content.category_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(reason, "Failed to list categories: {}", e);
                return 0;
            }
        };

        for key in &keys {
            self.trigger(&format!("/category/{}", encode_path(key)), reason);
        }
        keys.len()
    }

    pub async fn trigger_posts(&self, reason: &str) -> usize {
        let articles = match self.content.articles(false, false).await {
            Ok(articles) => articles,
            Err(e) => {
                tracing::error!(reason, "Failed to list articles: {}", e);
                return 0;
            }
        };

        let mut count = 0;
        for article in articles.iter().filter(|a| a.is_public()) {
            self.trigger(&format!("/post/{}", article.slug()), reason);
            count += 1;
        }
        count
    }

    /// Regenerates listing pages `1..=total / page_size`
    pub async fn trigger_pages(&self, reason: &str) -> usize {
        let total = match self.content.total_articles(false).await {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(reason, "Failed to count articles: {}", e);
                return 0;
            }
        };

        let pages = total.checked_div(self.page_size).unwrap_or(0);
        for page in 1..=pages {
            self.trigger(&format!("/page/{}", page), reason);
        }
        pages as usize
    }

    /// Regenerates each distinct tag once
    pub async fn trigger_tags(&self, reason: &str) -> usize {
        let tags = match self.content.tags(false).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::error!(reason, "Failed to list tags: {}", e);
                return 0;
            }
        };

        let mut seen = HashSet::new();
        for tag in tags.iter().filter(|t| seen.insert(t.as_str())) {
            self.trigger(&format!("/tag/{}", encode_path(tag)), reason);
        }
        seen.len()
    }

    pub fn trigger_about(&self, reason: &str) {
        self.trigger_with_retry("/about", reason);
    }

    pub fn trigger_link(&self, reason: &str) {
        self.trigger_with_retry("/link", reason);
    }
}

async fn revalidate_with_retry(
    revalidator: &dyn Revalidator,
    req: &Regeneration,
    attempts: u32,
    delay: Duration,
) -> bool {
    for attempt in 1..=attempts {
        match revalidator.revalidate(&req.path).await {
            Ok(()) => {
                tracing::debug!(path = %req.path, attempt, "Regeneration succeeded");
                return true;
            }
            Err(e) => {
                tracing::warn!(path = %req.path, attempt, attempts, "Regeneration attempt failed: {}", e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    tracing::error!(path = %req.path, reason = %req.reason, attempts, "Regeneration gave up");
    false
}
