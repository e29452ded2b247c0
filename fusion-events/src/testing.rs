//! Test doubles for the content store and the revalidation endpoint

use async_trait::async_trait;
use fusion_core::domain::content::ArticleSummary;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::isr::{ContentError, ContentSource, RevalidateError, Revalidator};

/// Reports every requested path on a channel; the first `failures` calls fail
pub struct RecordingRevalidator {
    calls: mpsc::UnboundedSender<String>,
    failures_left: AtomicU32,
}

impl RecordingRevalidator {
    pub fn new(failures: u32) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let revalidator = Arc::new(Self {
            calls: tx,
            failures_left: AtomicU32::new(failures),
        });
        (revalidator, rx)
    }
}

#[async_trait]
impl Revalidator for RecordingRevalidator {
    async fn revalidate(&self, path: &str) -> Result<(), RevalidateError> {
        let _ = self.calls.send(path.to_string());
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(RevalidateError::Other("unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct FakeContent {
    pub articles: Vec<ArticleSummary>,
    pub total: u64,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub broken: bool,
    /// `(include_hidden, include_deleted)` of every article query
    pub queries: Mutex<Vec<(bool, bool)>>,
}

impl FakeContent {
    fn check(&self) -> Result<(), ContentError> {
        if self.broken {
            Err(ContentError("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn articles(
        &self,
        include_hidden: bool,
        include_deleted: bool,
    ) -> Result<Vec<ArticleSummary>, ContentError> {
        self.check()?;
        self.queries
            .lock()
            .unwrap()
            .push((include_hidden, include_deleted));
        Ok(self.articles.clone())
    }

    async fn total_articles(&self, _include_hidden: bool) -> Result<u64, ContentError> {
        self.check()?;
        Ok(self.total)
    }

    async fn category_keys(&self) -> Result<Vec<String>, ContentError> {
        self.check()?;
        Ok(self.categories.clone())
    }

    async fn tags(&self, _include_hidden: bool) -> Result<Vec<String>, ContentError> {
        self.check()?;
        Ok(self.tags.clone())
    }
}

pub fn article(id: i64, pathname: Option<&str>, hidden: bool, deleted: bool) -> ArticleSummary {
    ArticleSummary {
        id,
        pathname: pathname.map(str::to_string),
        hidden,
        deleted,
    }
}
