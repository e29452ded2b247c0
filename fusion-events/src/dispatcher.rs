//! Script dispatcher
//!
//! Runs pipelines in response to lifecycle events. Each dispatch moves
//! through `Pending -> Running -> Completed | TimedOut`:
//!
//! - the script runs on a blocking worker inside a fresh sandbox
//! - a supervisor task races the script's completion against the time budget
//! - whichever happens first produces the dispatch's single [`CodeResult`]
//!
//! When the budget expires the worker's cancellation token fires, so a
//! runaway script unwinds instead of running unobserved.

use fusion_core::domain::event::EventKey;
use fusion_core::domain::pipeline::Pipeline;
use fusion_core::domain::result::CodeResult;
use fusion_lua::{Completion, ScriptBindings, ScriptLogs, run_script};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::catalog::PipelineCatalog;
use crate::config::Config;

/// Receiving end of one dispatch
#[derive(Debug)]
pub struct DispatchHandle {
    dispatch_id: Uuid,
    pipeline_id: i64,
    receiver: oneshot::Receiver<CodeResult>,
}

impl DispatchHandle {
    pub fn dispatch_id(&self) -> Uuid {
        self.dispatch_id
    }

    pub fn pipeline_id(&self) -> i64 {
        self.pipeline_id
    }

    /// Waits for the dispatch's result
    pub async fn result(self) -> CodeResult {
        self.receiver.await.unwrap_or_else(|_| {
            CodeResult::error(JsonValue::String(
                "dispatch ended without a result".to_string(),
            ))
        })
    }
}

/// Handles of every pipeline dispatched for one event
#[derive(Debug)]
pub struct DispatchBatch {
    key: EventKey,
    handles: Vec<DispatchHandle>,
}

impl DispatchBatch {
    fn empty(key: EventKey) -> Self {
        Self {
            key,
            handles: Vec::new(),
        }
    }

    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn pipeline_ids(&self) -> Vec<i64> {
        self.handles.iter().map(DispatchHandle::pipeline_id).collect()
    }

    pub fn into_handles(self) -> Vec<DispatchHandle> {
        self.handles
    }

    /// Waits for every dispatch; results keep the batch order
    pub async fn join_all(self) -> Vec<CodeResult> {
        futures::future::join_all(self.handles.into_iter().map(DispatchHandle::result)).await
    }
}

pub struct ScriptDispatcher {
    catalog: Arc<PipelineCatalog>,
    timeout: Duration,
}

impl ScriptDispatcher {
    pub fn new(catalog: Arc<PipelineCatalog>, config: &Config) -> Self {
        Self::with_timeout(catalog, config.script_timeout)
    }

    pub fn with_timeout(catalog: Arc<PipelineCatalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `pipeline` with `args` in the background
    ///
    /// Returns immediately; the handle yields exactly one result, from the
    /// script or from the timeout.
    pub fn dispatch(&self, pipeline: &Pipeline, args: Vec<JsonValue>) -> DispatchHandle {
        let dispatch_id = Uuid::new_v4();
        let (tx, receiver) = oneshot::channel();
        let handle = DispatchHandle {
            dispatch_id,
            pipeline_id: pipeline.id,
            receiver,
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::error!(%dispatch_id, pipeline_id = pipeline.id, "No tokio runtime; pipeline not run");
                let _ = tx.send(CodeResult::error(JsonValue::String(
                    "no async runtime available".to_string(),
                )));
                return handle;
            }
        };

        let label = format!("pipeline:{}", pipeline.id);
        let (completion, completed) = Completion::new(ScriptLogs::new(label.clone()));
        let bindings = ScriptBindings::new(label, args);
        let source = pipeline.script.clone();
        let cancel = CancellationToken::new();

        let span = tracing::info_span!("dispatch", %dispatch_id, pipeline_id = pipeline.id);
        tracing::info!(parent: &span, "Dispatching pipeline: {}", pipeline.name);

        let worker_cancel = cancel.clone();
        let worker_span = span.clone();
        let worker = runtime.spawn_blocking(move || {
            let _entered = worker_span.enter();
            run_script(&source, &bindings, completion, &worker_cancel);
        });

        runtime.spawn(
            supervise(completed, worker, cancel, self.timeout, tx).instrument(span),
        );

        handle
    }

    /// Looks up one pipeline and dispatches it, enabled or not
    ///
    /// Returns `None` (and logs) when the lookup fails.
    pub async fn dispatch_by_id(&self, id: i64, args: Vec<JsonValue>) -> Option<DispatchHandle> {
        match self.catalog.get_by_id(id).await {
            Ok(pipeline) => Some(self.dispatch(&pipeline, args)),
            Err(e) => {
                tracing::error!(pipeline_id = id, "Pipeline lookup failed: {}", e);
                None
            }
        }
    }

    /// Dispatches every enabled pipeline bound to `key`, concurrently
    pub async fn dispatch_by_event_key(&self, key: EventKey, args: Vec<JsonValue>) -> DispatchBatch {
        let pipelines = match self.catalog.get_by_event_key(key).await {
            Ok(pipelines) => pipelines,
            Err(e) => {
                tracing::error!(event = %key, "Pipeline lookup failed: {}", e);
                return DispatchBatch::empty(key);
            }
        };

        let mut batch = DispatchBatch::empty(key);
        for pipeline in &pipelines {
            if !pipeline.is_dispatchable_for(key) {
                tracing::debug!(event = %key, pipeline_id = pipeline.id, "Skipping pipeline");
                continue;
            }
            batch.handles.push(self.dispatch(pipeline, args.clone()));
        }

        tracing::debug!(event = %key, dispatched = batch.len(), "Event dispatched");
        batch
    }

    pub async fn dispatch_login(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::Login, args).await
    }

    pub async fn dispatch_logout(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::Logout, args).await
    }

    pub async fn dispatch_before_update_article(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::BeforeUpdateArticle, args)
            .await
    }

    pub async fn dispatch_after_update_article(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::AfterUpdateArticle, args)
            .await
    }

    pub async fn dispatch_delete_article(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::DeleteArticle, args).await
    }

    pub async fn dispatch_before_update_draft(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::BeforeUpdateDraft, args)
            .await
    }

    pub async fn dispatch_after_update_draft(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::AfterUpdateDraft, args)
            .await
    }

    pub async fn dispatch_delete_draft(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::DeleteDraft, args).await
    }

    pub async fn dispatch_update_site_info(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::UpdateSiteInfo, args).await
    }

    pub async fn dispatch_manual_trigger(&self, args: Vec<JsonValue>) -> DispatchBatch {
        self.dispatch_by_event_key(EventKey::ManualTrigger, args).await
    }
}

/// Delivers the first of {script completion, timeout} and keeps the budget
/// enforced on the worker until it exits
async fn supervise(
    completed: oneshot::Receiver<CodeResult>,
    mut worker: JoinHandle<()>,
    cancel: CancellationToken,
    budget: Duration,
    tx: oneshot::Sender<CodeResult>,
) {
    let deadline = tokio::time::sleep(budget);
    tokio::pin!(deadline);

    let result = tokio::select! {
        res = completed => res.unwrap_or_else(|_| {
            CodeResult::error(JsonValue::String("script worker exited without a result".to_string()))
        }),
        _ = &mut deadline => {
            tracing::warn!(budget_ms = budget.as_millis() as u64, "Pipeline timed out");
            cancel.cancel();
            CodeResult::timeout()
        }
    };

    tracing::info!(status = ?result.status, "Pipeline completed");
    if tx.send(result).is_err() {
        tracing::debug!("Dispatch result dropped by caller");
    }

    // A script may call complete() and keep running
    let joined = if cancel.is_cancelled() {
        None
    } else {
        tokio::select! {
            joined = &mut worker => Some(joined),
            _ = &mut deadline => {
                tracing::warn!("Pipeline still running after completion; cancelling");
                cancel.cancel();
                None
            }
        }
    };

    let joined = match joined {
        Some(joined) => joined,
        None => worker.await,
    };
    if let Err(e) = joined {
        tracing::error!("Script worker failed: {}", e);
    }
}
