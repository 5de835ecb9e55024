// Page store: single owner of all PageTask state for the current chapter

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::errors::CoordinatorError;
use crate::core::types::{
    ChapterSummary, PageFailure, PageSnapshot, PageState, PageTask, PipelineStage, TranslationOutcome,
    NO_TEXT_PLACEHOLDER,
};

/// Identifies one pipeline run of one page.
///
/// Writes carrying a handle from an older chapter or an older attempt are
/// dropped, so a straggling pipeline can never overwrite newer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    pub index: usize,
    pub attempt: u32,
    generation: u64,
}

#[derive(Default)]
struct StoreInner {
    generation: u64,
    pages: BTreeMap<usize, PageTask>,
}

/// Page-indexed task store shared by all pipelines.
///
/// Every mutation takes the write lock for the duration of a single update
/// and never across an await point.
#[derive(Clone, Default)]
pub struct PageStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all tasks and create one Pending task per image URL
    pub fn reset(&self, image_urls: &[String]) -> Vec<PageHandle> {
        let mut inner = self.inner.write();
        inner.generation += 1;
        let generation = inner.generation;

        inner.pages = image_urls
            .iter()
            .enumerate()
            .map(|(index, url)| (index, PageTask::new(index, url.clone())))
            .collect();

        inner
            .pages
            .values()
            .map(|task| PageHandle {
                index: task.index,
                attempt: task.attempt,
                generation,
            })
            .collect()
    }

    /// Move a terminal page back to Pending for a fresh attempt
    pub fn begin_retry(&self, index: usize) -> Result<(PageHandle, String), CoordinatorError> {
        let mut inner = self.inner.write();
        let generation = inner.generation;
        let task = inner
            .pages
            .get_mut(&index)
            .ok_or(CoordinatorError::UnknownPage(index))?;

        if !task.state.is_terminal() {
            return Err(CoordinatorError::NotTerminal {
                index,
                state: task.state.as_str(),
            });
        }

        task.attempt += 1;
        task.state = PageState::Pending;
        task.recognized_text = None;
        task.translation = None;
        task.progress = None;

        Ok((
            PageHandle {
                index,
                attempt: task.attempt,
                generation,
            },
            task.image_url.clone(),
        ))
    }

    /// Apply `f` to the task only if the handle is still current
    fn update<F>(&self, handle: PageHandle, f: F) -> bool
    where
        F: FnOnce(&mut PageTask) -> bool,
    {
        let mut inner = self.inner.write();
        if inner.generation != handle.generation {
            debug!("Dropping write for page {} from a previous chapter", handle.index);
            return false;
        }

        match inner.pages.get_mut(&handle.index) {
            Some(task) if task.attempt == handle.attempt => f(task),
            Some(_) => {
                debug!("Dropping write for page {} from a superseded attempt", handle.index);
                false
            }
            None => false,
        }
    }

    /// Advance a page to its next state; illegal transitions are refused
    pub fn transition(&self, handle: PageHandle, next: PageState) -> bool {
        self.update(handle, |task| {
            if !task.state.can_advance_to(&next) {
                warn!(
                    "Refusing transition {} -> {} for page {}",
                    task.state, next, task.index
                );
                return false;
            }
            if task.state == PageState::Recognizing {
                task.progress = None;
            }
            task.state = next;
            true
        })
    }

    /// Record recognition progress; ignored outside the Recognizing state
    pub fn set_progress(&self, handle: PageHandle, percent: u8) -> bool {
        self.update(handle, |task| {
            if task.state != PageState::Recognizing {
                return false;
            }
            task.progress = Some(percent.min(100));
            true
        })
    }

    pub fn set_recognized(&self, handle: PageHandle, text: String) -> bool {
        self.update(handle, |task| {
            task.recognized_text = Some(text);
            true
        })
    }

    /// Translating -> Done with the chain's outcome
    pub fn complete(&self, handle: PageHandle, outcome: TranslationOutcome) -> bool {
        self.update(handle, |task| {
            if task.state != PageState::Translating {
                return false;
            }
            task.translation = Some(outcome);
            task.progress = None;
            task.state = PageState::Done;
            true
        })
    }

    /// Normalizing -> Done when no text was detected
    pub fn complete_without_text(&self, handle: PageHandle) -> bool {
        self.update(handle, |task| {
            if task.state != PageState::Normalizing {
                return false;
            }
            task.recognized_text = Some(NO_TEXT_PLACEHOLDER.to_string());
            task.translation = None;
            task.progress = None;
            task.state = PageState::Done;
            true
        })
    }

    pub fn fail(&self, handle: PageHandle, failure: PageFailure) -> bool {
        self.update(handle, |task| {
            if task.state.is_terminal() {
                return false;
            }
            task.progress = None;
            task.state = PageState::Failed(failure);
            true
        })
    }

    /// Fail a page at whichever stage it has reached.
    ///
    /// Returns the stage recorded, or None when the handle is stale or the
    /// page already finished.
    pub fn fail_at_current_stage(
        &self,
        handle: PageHandle,
        cause: impl std::fmt::Display,
    ) -> Option<PipelineStage> {
        let mut failed_at = None;
        self.update(handle, |task| {
            let Some(stage) = task.state.stage() else {
                return false;
            };
            task.progress = None;
            task.state = PageState::Failed(PageFailure::new(stage, &cause));
            failed_at = Some(stage);
            true
        });
        failed_at
    }

    /// Immutable snapshots of every page, ordered by index
    pub fn snapshot(&self) -> Vec<PageSnapshot> {
        self.inner
            .read()
            .pages
            .values()
            .map(PageTask::snapshot)
            .collect()
    }

    pub fn page(&self, index: usize) -> Option<PageSnapshot> {
        self.inner.read().pages.get(&index).map(PageTask::snapshot)
    }

    pub fn summary(&self) -> ChapterSummary {
        let inner = self.inner.read();
        let mut summary = ChapterSummary {
            total: inner.pages.len(),
            ..Default::default()
        };

        for task in inner.pages.values() {
            match task.state {
                PageState::Pending => summary.pending += 1,
                PageState::Done => summary.done += 1,
                PageState::Failed(_) => summary.failed += 1,
                _ => summary.running += 1,
            }
        }

        summary
    }

    pub fn len(&self) -> usize {
        self.inner.read().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
