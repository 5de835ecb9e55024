// Recognition Engine Adapter - drives an OCR engine over a binarized page

pub mod tesseract;

use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::core::errors::RecognitionError;
use crate::core::types::{LanguageProfile, RecognitionResult};

pub use tesseract::TesseractCliEngine;

/// Characters the engine may emit for Latin-based profiles
pub const LATIN_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789.,!?'\"-:;() ";

/// The only engine phase whose progress is surfaced to callers
pub const RECOGNIZING_STATUS: &str = "recognizing text";

/// Page segmentation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegMode {
    /// Fully automatic page segmentation, no orientation detection
    Auto,
}

impl PageSegMode {
    /// Value for tesseract's `--psm` flag
    pub fn as_arg(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
        }
    }
}

/// Parameters handed to the engine for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineParameters {
    pub language: &'static str,
    pub page_seg_mode: PageSegMode,
    pub char_whitelist: Option<String>,
    pub preserve_interword_spaces: bool,
}

impl EngineParameters {
    pub fn for_profile(profile: LanguageProfile) -> Self {
        Self {
            language: profile.engine_code(),
            page_seg_mode: PageSegMode::Auto,
            char_whitelist: profile
                .is_latin_based()
                .then(|| LATIN_WHITELIST.to_string()),
            preserve_interword_spaces: true,
        }
    }
}

/// Status report from a running engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub status: String,
    /// Fraction of the current phase completed, 0.0 to 1.0
    pub progress: f32,
}

impl EngineEvent {
    pub fn new(status: impl Into<String>, progress: f32) -> Self {
        Self {
            status: status.into(),
            progress,
        }
    }
}

/// An OCR engine able to recognize text in a bitmap
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    async fn recognize(
        &self,
        image: &RgbaImage,
        params: &EngineParameters,
        on_event: &(dyn Fn(EngineEvent) + Send + Sync),
    ) -> Result<RecognitionResult, RecognitionError>;
}

/// Convert a fractional progress into a whole percentage
pub fn progress_percent(fraction: f32) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Runs one engine invocation per page and surfaces recognition progress.
///
/// Engine failures are returned as-is; the adapter never retries.
#[derive(Clone)]
pub struct RecognitionAdapter {
    engine: Arc<dyn RecognitionEngine>,
}

impl RecognitionAdapter {
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    #[instrument(skip(self, image, on_progress), fields(engine = self.engine.name(), width = image.width(), height = image.height()))]
    pub async fn recognize<F>(
        &self,
        image: &RgbaImage,
        profile: LanguageProfile,
        on_progress: F,
    ) -> Result<RecognitionResult, RecognitionError>
    where
        F: Fn(u8) + Send + Sync,
    {
        let params = EngineParameters::for_profile(profile);

        let forward = |event: EngineEvent| {
            if event.status == RECOGNIZING_STATUS {
                on_progress(progress_percent(event.progress));
            } else {
                trace!("engine status: {} ({:.2})", event.status, event.progress);
            }
        };

        let result = self.engine.recognize(image, &params, &forward).await?;
        debug!("recognized {} characters", result.text.chars().count());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedEngine;
    use parking_lot::Mutex;

    #[test]
    fn test_parameters_follow_profile() {
        let latin = EngineParameters::for_profile(LanguageProfile::Latin);
        assert_eq!(latin.language, "eng");
        assert_eq!(latin.page_seg_mode, PageSegMode::Auto);
        assert_eq!(latin.char_whitelist.as_deref(), Some(LATIN_WHITELIST));
        assert!(latin.preserve_interword_spaces);

        let japanese = EngineParameters::for_profile(LanguageProfile::Japanese);
        assert_eq!(japanese.language, "jpn");
        assert!(japanese.char_whitelist.is_none());
    }

    #[test]
    fn test_progress_percent_rounds_and_clamps() {
        assert_eq!(progress_percent(0.0), 0);
        assert_eq!(progress_percent(0.424), 42);
        assert_eq!(progress_percent(0.425), 43);
        assert_eq!(progress_percent(1.7), 100);
        assert_eq!(progress_percent(-0.3), 0);
        assert_eq!(progress_percent(f32::NAN), 0);
    }

    #[tokio::test]
    async fn test_only_recognizing_events_are_forwarded() {
        let engine = ScriptedEngine::text("HELLO")
            .with_events(vec![
                EngineEvent::new("loading language traineddata", 0.5),
                EngineEvent::new("initializing api", 1.0),
                EngineEvent::new(RECOGNIZING_STATUS, 0.25),
                EngineEvent::new(RECOGNIZING_STATUS, 1.0),
            ]);
        let adapter = RecognitionAdapter::new(Arc::new(engine));

        let seen = Mutex::new(Vec::new());
        let image = RgbaImage::new(2, 2);
        let result = adapter
            .recognize(&image, LanguageProfile::Latin, |p| seen.lock().push(p))
            .await
            .unwrap();

        assert_eq!(result.text, "HELLO");
        assert_eq!(*seen.lock(), vec![25, 100]);
    }

    #[tokio::test]
    async fn test_engine_failure_is_not_retried() {
        let engine = Arc::new(ScriptedEngine::failing("engine exploded"));
        let adapter = RecognitionAdapter::new(engine.clone());

        let image = RgbaImage::new(1, 1);
        let err = adapter
            .recognize(&image, LanguageProfile::Latin, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, RecognitionError::EngineFailed(_)));
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_engine_receives_profile_parameters() {
        let engine = Arc::new(ScriptedEngine::text("テキスト"));
        let adapter = RecognitionAdapter::new(engine.clone());

        adapter
            .recognize(&RgbaImage::new(1, 1), LanguageProfile::Japanese, |_| {})
            .await
            .unwrap();

        let params = engine.last_params().unwrap();
        assert_eq!(params.language, "jpn");
        assert!(params.char_whitelist.is_none());
    }
}
