// Shared types for the page pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::ConfigError;

/// Shown instead of recognized text when the normalizer leaves nothing
pub const NO_TEXT_PLACEHOLDER: &str = "ไม่พบข้อความในภาพนี้";

/// OCR language profile (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageProfile {
    #[default]
    Latin,
    Japanese,
}

impl LanguageProfile {
    /// Language code understood by the OCR engine
    pub fn engine_code(&self) -> &'static str {
        match self {
            LanguageProfile::Latin => "eng",
            LanguageProfile::Japanese => "jpn",
        }
    }

    pub fn is_latin_based(&self) -> bool {
        matches!(self, LanguageProfile::Latin)
    }
}

impl FromStr for LanguageProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latin" | "eng" | "english" => Ok(LanguageProfile::Latin),
            "japanese" | "jpn" | "ja" => Ok(LanguageProfile::Japanese),
            other => Err(ConfigError::UnknownLanguageProfile(other.to_string())),
        }
    }
}

/// Pipeline stage a page failure originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Preprocessing,
    Recognizing,
    Normalizing,
    Translating,
}

impl PipelineStage {
    /// Short user-facing summary prefixed to the underlying cause
    pub fn summary(&self) -> &'static str {
        match self {
            PipelineStage::Preprocessing => "Failed to load image",
            PipelineStage::Recognizing => "Failed to read text from image",
            PipelineStage::Normalizing => "Failed to clean recognized text",
            PipelineStage::Translating => "Failed to translate text",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Preprocessing => "preprocessing",
            PipelineStage::Recognizing => "recognizing",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::Translating => "translating",
        };
        f.write_str(name)
    }
}

/// Terminal failure of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub stage: PipelineStage,
    pub message: String,
}

impl PageFailure {
    pub fn new(stage: PipelineStage, cause: impl fmt::Display) -> Self {
        Self {
            stage,
            message: format!("{}: {}", stage.summary(), cause),
        }
    }
}

/// Lifecycle of a page task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    Pending,
    Preprocessing,
    Recognizing,
    Normalizing,
    Translating,
    Done,
    Failed(PageFailure),
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageState::Pending => "pending",
            PageState::Preprocessing => "preprocessing",
            PageState::Recognizing => "recognizing",
            PageState::Normalizing => "normalizing",
            PageState::Translating => "translating",
            PageState::Done => "done",
            PageState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PageState::Done | PageState::Failed(_))
    }

    /// Stage a non-terminal page is in (or about to enter, when Pending)
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PageState::Pending | PageState::Preprocessing => Some(PipelineStage::Preprocessing),
            PageState::Recognizing => Some(PipelineStage::Recognizing),
            PageState::Normalizing => Some(PipelineStage::Normalizing),
            PageState::Translating => Some(PipelineStage::Translating),
            PageState::Done | PageState::Failed(_) => None,
        }
    }

    /// Position in the forward pipeline order (terminal states excluded)
    fn order(&self) -> Option<u8> {
        match self {
            PageState::Pending => Some(0),
            PageState::Preprocessing => Some(1),
            PageState::Recognizing => Some(2),
            PageState::Normalizing => Some(3),
            PageState::Translating => Some(4),
            PageState::Done | PageState::Failed(_) => None,
        }
    }

    /// Whether `next` is a legal successor of this state.
    ///
    /// Stages advance one at a time. Normalizing may jump to Done when no
    /// text was detected, Translating ends in Done, and any non-terminal
    /// state may fail.
    pub fn can_advance_to(&self, next: &PageState) -> bool {
        match (self.order(), next) {
            (None, _) => false,
            (Some(_), PageState::Failed(_)) => true,
            (Some(3), PageState::Done) | (Some(4), PageState::Done) => true,
            (Some(current), next) => next.order() == Some(current + 1),
        }
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-word recognition data, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,
    pub confidence: f32,
    pub bbox: [u32; 4],
}

/// Output of one successful engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordBox>>,
}

/// Translation tier that produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    MyMemory,
    Dictionary,
}

impl ProviderKind {
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::MyMemory => "mymemory",
            ProviderKind::Dictionary => "dictionary",
        }
    }

    /// Label appended to translated text for provenance
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Google => "Google Translate",
            ProviderKind::MyMemory => "MyMemory (Free)",
            ProviderKind::Dictionary => "Basic Dictionary",
        }
    }
}

/// Result of the translation fallback chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOutcome {
    pub original_text: String,
    pub translated_text: String,
    pub target_language: String,
    pub provider: ProviderKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TranslationOutcome {
    /// Translated text followed by provenance and advisory lines
    pub fn display_text(&self) -> String {
        let mut text = format!("{}\n\n[{}]", self.translated_text, self.provider.label());
        if let Some(note) = &self.note {
            text.push_str("\n💡 ");
            text.push_str(note);
        }
        text
    }
}

/// Chapter returned by the chapter source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub chapter_id: String,
    pub title: Option<String>,
    pub pages: usize,
    pub images: Vec<String>,
}

/// One page of the current chapter
#[derive(Debug, Clone)]
pub struct PageTask {
    pub index: usize,
    pub image_url: String,
    pub state: PageState,
    pub recognized_text: Option<String>,
    pub translation: Option<TranslationOutcome>,
    pub progress: Option<u8>,
    pub attempt: u32,
}

impl PageTask {
    pub fn new(index: usize, image_url: String) -> Self {
        Self {
            index,
            image_url,
            state: PageState::Pending,
            recognized_text: None,
            translation: None,
            progress: None,
            attempt: 0,
        }
    }

    pub fn failure(&self) -> Option<&PageFailure> {
        match &self.state {
            PageState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let failure = self.failure();
        PageSnapshot {
            index: self.index,
            image_url: self.image_url.clone(),
            state: self.state.as_str(),
            attempt: self.attempt,
            progress: self.progress,
            recognized_text: self.recognized_text.clone(),
            translation: self.translation.as_ref().map(TranslationOutcome::display_text),
            provider: self.translation.as_ref().map(|t| t.provider),
            failed_stage: failure.map(|f| f.stage),
            error: failure.map(|f| f.message.clone()),
        }
    }
}

/// Immutable, serializable view of a page task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub index: usize,
    pub image_url: String,
    pub state: &'static str,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognized_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-state page counts for the current chapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChapterSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
}
