//! Side effects of content mutations
//!
//! Content services call one method per mutation. Regeneration runs in the
//! background and pipelines are dispatched without waiting for their results,
//! so none of these calls can fail or hold up the mutation.

use fusion_core::domain::event::EventKey;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::dispatcher::{DispatchBatch, ScriptDispatcher};
use crate::isr::{RegenerationTrigger, TriggerReport};

/// What a content mutation set in motion
#[derive(Debug, Default)]
pub struct Effects {
    pub batches: Vec<DispatchBatch>,
    /// Background regeneration fan-out, if one was started
    pub regeneration: Option<JoinHandle<TriggerReport>>,
}

impl Effects {
    fn regenerate(regeneration: Option<JoinHandle<TriggerReport>>) -> Self {
        Self {
            batches: Vec::new(),
            regeneration,
        }
    }

    fn with_batch(mut self, batch: DispatchBatch) -> Self {
        self.batches.push(batch);
        self
    }

    /// Batch dispatched for `key`, if any
    pub fn batch(&self, key: EventKey) -> Option<&DispatchBatch> {
        self.batches.iter().find(|b| b.key() == key)
    }

    /// Total pipelines dispatched
    pub fn dispatched(&self) -> usize {
        self.batches.iter().map(DispatchBatch::len).sum()
    }
}

pub struct ContentEffects {
    trigger: Arc<RegenerationTrigger>,
    dispatcher: Arc<ScriptDispatcher>,
}

impl ContentEffects {
    pub fn new(trigger: Arc<RegenerationTrigger>, dispatcher: Arc<ScriptDispatcher>) -> Self {
        Self {
            trigger,
            dispatcher,
        }
    }

    pub fn trigger(&self) -> &Arc<RegenerationTrigger> {
        &self.trigger
    }

    pub fn dispatcher(&self) -> &Arc<ScriptDispatcher> {
        &self.dispatcher
    }

    /// Before an article is written. Callers that want the hooks' output can
    /// wait on the returned batch.
    pub async fn article_saving(&self, article: &JsonValue) -> DispatchBatch {
        self.dispatcher
            .dispatch_before_update_article(vec![article.clone()])
            .await
    }

    /// After an article was created or updated
    pub async fn article_saved(&self, article: &JsonValue, stored: bool) -> Effects {
        let regeneration = self
            .trigger
            .spawn_trigger_all("trigger incremental rendering by update article");
        let batch = self
            .dispatcher
            .dispatch_after_update_article(vec![article.clone(), json!(stored)])
            .await;
        Effects::regenerate(regeneration).with_batch(batch)
    }

    pub async fn article_deleted(&self, id: i64, deleted: bool) -> Effects {
        let regeneration = self
            .trigger
            .spawn_trigger_all("trigger incremental rendering by delete article");
        let batch = self
            .dispatcher
            .dispatch_delete_article(vec![json!(id), json!(deleted)])
            .await;
        Effects::regenerate(regeneration).with_batch(batch)
    }

    pub async fn draft_saving(&self, draft: &JsonValue) -> DispatchBatch {
        self.dispatcher
            .dispatch_before_update_draft(vec![draft.clone()])
            .await
    }

    pub async fn draft_saved(&self, draft: &JsonValue, stored: bool) -> Effects {
        let batch = self
            .dispatcher
            .dispatch_after_update_draft(vec![draft.clone(), json!(stored)])
            .await;
        Effects::default().with_batch(batch)
    }

    pub async fn draft_deleted(&self, id: i64) -> Effects {
        let batch = self.dispatcher.dispatch_delete_draft(vec![json!(id)]).await;
        Effects::default().with_batch(batch)
    }

    /// A draft became a public article
    pub async fn draft_published(&self, article: &JsonValue) -> Effects {
        let regeneration = self
            .trigger
            .spawn_trigger_all("trigger incremental rendering by public draft");
        let batch = self
            .dispatcher
            .dispatch_after_update_draft(vec![article.clone()])
            .await;
        Effects::regenerate(regeneration).with_batch(batch)
    }

    pub async fn site_info_updated(&self, site_info: &JsonValue) -> Effects {
        let regeneration = self
            .trigger
            .spawn_trigger_all("trigger incremental rendering by update site info");
        let batch = self
            .dispatcher
            .dispatch_update_site_info(vec![site_info.clone()])
            .await;
        Effects::regenerate(regeneration).with_batch(batch)
    }

    /// Categories, tags, menus or social links changed
    pub fn taxonomy_changed(&self, reason: &str) -> Effects {
        Effects::regenerate(self.trigger.spawn_trigger_all(reason))
    }

    pub fn about_updated(&self) -> Effects {
        self.trigger
            .trigger_about("trigger incremental rendering by update about");
        Effects::default()
    }

    pub fn link_updated(&self) -> Effects {
        self.trigger
            .trigger_link("trigger incremental rendering by update link");
        Effects::default()
    }

    pub async fn user_logged_in(&self, user: &JsonValue) -> Effects {
        let batch = self.dispatcher.dispatch_login(vec![user.clone()]).await;
        Effects::default().with_batch(batch)
    }

    pub async fn user_logged_out(&self, user: &JsonValue) -> Effects {
        let batch = self.dispatcher.dispatch_logout(vec![user.clone()]).await;
        Effects::default().with_batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryPipelineRepository, PipelineCatalog};
    use crate::config::Config;
    use crate::testing::{FakeContent, RecordingRevalidator, article};
    use fusion_core::domain::pipeline::EventType;
    use fusion_core::domain::result::CodeStatus;
    use fusion_core::dto::pipeline::CreatePipeline;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct Fixture {
        effects: ContentEffects,
        catalog: Arc<PipelineCatalog>,
        calls: mpsc::UnboundedReceiver<String>,
    }

    fn fixture() -> Fixture {
        let mut config = Config::default();
        config.retry_delay = Duration::from_millis(10);

        let (revalidator, calls) = RecordingRevalidator::new(0);
        let content = FakeContent {
            articles: vec![article(1, Some("hello"), false, false)],
            total: 5,
            categories: vec!["news".to_string()],
            tags: vec!["rust".to_string()],
            ..Default::default()
        };
        let trigger = Arc::new(RegenerationTrigger::new(
            &config,
            revalidator,
            Arc::new(content),
        ));
        let catalog = Arc::new(PipelineCatalog::new(Arc::new(
            InMemoryPipelineRepository::new(),
        )));
        let dispatcher = Arc::new(ScriptDispatcher::new(catalog.clone(), &config));

        Fixture {
            effects: ContentEffects::new(trigger, dispatcher),
            catalog,
            calls,
        }
    }

    async fn bind(catalog: &PipelineCatalog, event: EventKey, script: &str) {
        catalog
            .create(CreatePipeline {
                name: event.label().to_string(),
                script: script.to_string(),
                event_type: EventType::System,
                event_name: event.to_string(),
                enabled: true,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_article_saved_regenerates_and_dispatches() {
        let mut fx = fixture();
        bind(
            &fx.catalog,
            EventKey::AfterUpdateArticle,
            r#"complete({ title = args[1].title, stored = args[2] })"#,
        )
        .await;

        let effects = fx
            .effects
            .article_saved(&json!({ "title": "Hello" }), true)
            .await;

        assert_eq!(effects.dispatched(), 1);
        let report = effects.regeneration.unwrap().await.unwrap();
        assert_eq!(report.total(), 4);

        let batch = effects
            .batches
            .into_iter()
            .find(|b| b.key() == EventKey::AfterUpdateArticle)
            .unwrap();
        let results = batch.join_all().await;
        assert_eq!(results[0].status, CodeStatus::Success);
        assert_eq!(results[0].output, json!({ "title": "Hello", "stored": true }));

        let mut paths = Vec::new();
        for _ in 0..4 {
            paths.push(
                timeout(Duration::from_secs(2), fx.calls.recv())
                    .await
                    .unwrap()
                    .unwrap(),
            );
        }
        paths.sort();
        assert_eq!(paths, vec!["/category/news", "/page/1", "/post/hello", "/tag/rust"]);
    }

    #[tokio::test]
    async fn test_article_saving_exposes_hook_output() {
        let fx = fixture();
        bind(
            &fx.catalog,
            EventKey::BeforeUpdateArticle,
            r#"args[1].title = string.upper(args[1].title) complete(args[1])"#,
        )
        .await;

        let results = fx
            .effects
            .article_saving(&json!({ "title": "draft" }))
            .await
            .join_all()
            .await;

        assert_eq!(results[0].output, json!({ "title": "DRAFT" }));
    }

    #[tokio::test]
    async fn test_about_updated_uses_retrying_trigger() {
        let mut fx = fixture();

        let effects = fx.effects.about_updated();

        assert!(effects.regeneration.is_none());
        assert_eq!(effects.dispatched(), 0);
        let path = timeout(Duration::from_secs(2), fx.calls.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path, "/about");
        assert_eq!(fx.effects.trigger().subscriber_count("/about"), 1);
    }

    #[tokio::test]
    async fn test_login_dispatches_login_pipelines_only() {
        let fx = fixture();
        bind(&fx.catalog, EventKey::Login, r#"complete(args[1].name)"#).await;
        bind(&fx.catalog, EventKey::Logout, r#"complete("bye")"#).await;

        let effects = fx.effects.user_logged_in(&json!({ "name": "ada" })).await;

        assert!(effects.batch(EventKey::Logout).is_none());
        let batch = effects.batches.into_iter().next().unwrap();
        assert_eq!(batch.key(), EventKey::Login);
        assert_eq!(batch.join_all().await[0].output, json!("ada"));
    }

    #[tokio::test]
    async fn test_taxonomy_changed_only_regenerates() {
        let fx = fixture();
        bind(&fx.catalog, EventKey::UpdateSiteInfo, r#"complete(input)"#).await;

        let effects = fx.effects.taxonomy_changed("category renamed");

        assert_eq!(effects.dispatched(), 0);
        let report = effects.regeneration.unwrap().await.unwrap();
        assert_eq!(report.categories, 1);
    }
}
