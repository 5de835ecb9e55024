// Page Task Coordinator: one independent pipeline per page

use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, Instrument};

use super::page_store::{PageHandle, PageStore};
use crate::core::errors::{CoordinatorError, StageContext};
use crate::core::types::{
    Chapter, ChapterSummary, LanguageProfile, PageFailure, PageSnapshot, PageState, PipelineStage,
};
use crate::services::images::ImageSource;
use crate::services::normalizer::normalize;
use crate::services::ocr::RecognitionAdapter;
use crate::services::preprocessing::preprocess_async;
use crate::services::translation::TranslationChain;
use crate::utils::{load_image_from_memory_async, Metrics};

/// Pipelines spawned for one chapter load
pub struct ChapterRun {
    handles: Vec<JoinHandle<()>>,
}

impl ChapterRun {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every page pipeline to reach a terminal state
    pub async fn join(self) {
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!("Page pipeline task panicked: {}", e);
            }
        }
    }
}

/// Everything a pipeline needs, cheap to clone into a spawned task
#[derive(Clone)]
struct PipelineContext {
    store: PageStore,
    images: Arc<dyn ImageSource>,
    adapter: RecognitionAdapter,
    chain: Arc<TranslationChain>,
    target_language: String,
    metrics: Option<Metrics>,
}

/// Owns the page store and launches page pipelines.
///
/// Pages never wait on each other: one page failing at any stage leaves its
/// siblings running. Retries are only ever started explicitly.
pub struct PageCoordinator {
    ctx: PipelineContext,
    profile: parking_lot::RwLock<LanguageProfile>,
}

impl PageCoordinator {
    pub fn new(
        images: Arc<dyn ImageSource>,
        adapter: RecognitionAdapter,
        chain: Arc<TranslationChain>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            ctx: PipelineContext {
                store: PageStore::new(),
                images,
                adapter,
                chain,
                target_language: target_language.into(),
                metrics: None,
            },
            profile: parking_lot::RwLock::new(LanguageProfile::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.ctx.metrics = Some(metrics);
        self
    }

    /// Replace the current chapter and start one pipeline per page
    #[instrument(skip(self, chapter), fields(chapter_id = %chapter.chapter_id, pages = chapter.images.len()))]
    pub fn start_chapter(&self, chapter: &Chapter, profile: LanguageProfile) -> ChapterRun {
        *self.profile.write() = profile;
        let handles = self.ctx.store.reset(&chapter.images);

        if let Some(ref m) = self.ctx.metrics {
            m.record_chapter_loaded(handles.len());
        }
        info!("Starting {} page pipelines ({:?} profile)", handles.len(), profile);

        let handles = handles
            .into_iter()
            .zip(chapter.images.iter().cloned())
            .map(|(handle, url)| self.spawn_pipeline(handle, url, profile))
            .collect();

        ChapterRun { handles }
    }

    /// Re-run a page that is Failed or Done
    #[instrument(skip(self))]
    pub fn retry(&self, index: usize) -> Result<JoinHandle<()>, CoordinatorError> {
        let (handle, url) = self.ctx.store.begin_retry(index)?;
        if let Some(ref m) = self.ctx.metrics {
            m.record_page_retry();
        }
        info!("Retrying page {} (attempt {})", index, handle.attempt);

        let profile = *self.profile.read();
        Ok(self.spawn_pipeline(handle, url, profile))
    }

    pub fn snapshot(&self) -> Vec<PageSnapshot> {
        self.ctx.store.snapshot()
    }

    pub fn page(&self, index: usize) -> Option<PageSnapshot> {
        self.ctx.store.page(index)
    }

    pub fn summary(&self) -> ChapterSummary {
        self.ctx.store.summary()
    }

    pub fn target_language(&self) -> &str {
        &self.ctx.target_language
    }

    /// Spawn one pipeline run. A panic inside any stage fails the page at
    /// the stage it had reached, so it stays retryable.
    fn spawn_pipeline(&self, handle: PageHandle, url: String, profile: LanguageProfile) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        let span = tracing::info_span!("page", index = handle.index, attempt = handle.attempt);

        tokio::spawn(
            async move {
                let store = ctx.store.clone();
                let metrics = ctx.metrics.clone();

                let Err(panic) = AssertUnwindSafe(ctx.run(handle, url, profile))
                    .catch_unwind()
                    .await
                else {
                    return;
                };

                let cause = panic_message(panic.as_ref());
                error!("Page {} pipeline panicked: {}", handle.index, cause);
                let failed_at =
                    store.fail_at_current_stage(handle, format!("pipeline panicked: {}", cause));
                if let (Some(stage), Some(m)) = (failed_at, metrics) {
                    m.record_page_failed(stage);
                }
            }
            .instrument(span),
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl PipelineContext {
    async fn run(self, handle: PageHandle, url: String, profile: LanguageProfile) {
        match self.run_stages(handle, &url, profile).await {
            Ok(Some(provider)) => {
                debug!("Page {} done via {}", handle.index, provider);
            }
            Ok(None) => {
                debug!("Page {} ended without a result (superseded)", handle.index);
            }
            Err(failure) => {
                error!("Page {} failed: {}", handle.index, failure.message);
                if let Some(ref m) = self.metrics {
                    m.record_page_failed(failure.stage);
                }
                self.store.fail(handle, failure);
            }
        }
    }

    /// Run all stages in order.
    ///
    /// Returns Ok(None) when the store refused a write because this run was
    /// superseded by a retry or a new chapter.
    async fn run_stages(
        &self,
        handle: PageHandle,
        url: &str,
        profile: LanguageProfile,
    ) -> Result<Option<&'static str>, PageFailure> {
        // Preprocessing: fetch, decode, binarize
        if !self.store.transition(handle, PageState::Preprocessing) {
            return Ok(None);
        }
        let started = Instant::now();
        let fetched = self
            .images
            .fetch(url)
            .await
            .at_stage(PipelineStage::Preprocessing)?;
        let decoded = load_image_from_memory_async(fetched.bytes)
            .await
            .at_stage(PipelineStage::Preprocessing)?;
        let bitmap = preprocess_async(decoded)
            .await
            .at_stage(PipelineStage::Preprocessing)?;
        self.record_duration(PipelineStage::Preprocessing, started);

        // Recognizing
        if !self.store.transition(handle, PageState::Recognizing) {
            return Ok(None);
        }
        let started = Instant::now();
        let store = self.store.clone();
        let recognized = self
            .adapter
            .recognize(&bitmap, profile, move |percent| {
                store.set_progress(handle, percent);
            })
            .await
            .at_stage(PipelineStage::Recognizing)?;
        self.record_duration(PipelineStage::Recognizing, started);

        // Normalizing
        if !self.store.transition(handle, PageState::Normalizing) {
            return Ok(None);
        }
        let text = normalize(&recognized.text);

        if text.is_empty() {
            if !self.store.complete_without_text(handle) {
                return Ok(None);
            }
            if let Some(ref m) = self.metrics {
                m.record_page_completed(false);
            }
            return Ok(Some("no text detected"));
        }

        if !self.store.set_recognized(handle, text.clone()) {
            return Ok(None);
        }

        // Translating
        if !self.store.transition(handle, PageState::Translating) {
            return Ok(None);
        }
        let started = Instant::now();
        let outcome = self.chain.translate(&text, &self.target_language).await;
        self.record_duration(PipelineStage::Translating, started);

        let provider = outcome.provider.label();
        if !self.store.complete(handle, outcome) {
            return Ok(None);
        }
        if let Some(ref m) = self.metrics {
            m.record_page_completed(true);
        }

        Ok(Some(provider))
    }

    fn record_duration(&self, stage: PipelineStage, started: Instant) {
        if let Some(ref m) = self.metrics {
            m.record_stage_duration(stage, started.elapsed());
        }
    }
}
