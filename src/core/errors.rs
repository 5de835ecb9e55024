// Error types for the page pipeline and its collaborators
//
// One thiserror enum per concern. Stage-local errors are converted into a
// PageFailure (stage + message) by the coordinator; translation errors never
// leave the fallback chain.

use thiserror::Error;

use crate::core::types::{PageFailure, PipelineStage};

/// Image fetch/decode errors (Preprocessing stage)
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("request for {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("no image registered for {0}")]
    NotFound(String),

    #[error("image decoding failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image task failed: {0}")]
    TaskFailed(String),
}

/// Recognition engine errors (Recognizing stage)
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("OCR engine failed: {0}")]
    EngineFailed(String),

    #[error("OCR engine timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("OCR engine produced unreadable output: {0}")]
    InvalidOutput(String),
}

/// Remote translation tier errors
///
/// These are only ever logged: the fallback chain swallows them and moves
/// on to the next tier.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("API request failed: {0}")]
    ApiRequestFailed(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    ServiceStatus { status: u16, body: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Response is missing field `{0}`")]
    MissingField(&'static str),

    #[error("Provider returned an empty translation")]
    EmptyTranslation,

    #[error("Circuit breaker open for {provider}")]
    CircuitOpen { provider: &'static str },
}

/// Chapter lookup errors
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("Chapter URL is required")]
    MissingUrl,

    #[error("Invalid MangaDex chapter URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to fetch chapter data: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Chapter API returned {status} for {endpoint}")]
    UpstreamStatus { endpoint: String, status: u16 },

    #[error("Malformed chapter response: missing {0}")]
    MalformedResponse(&'static str),
}

impl ChapterError {
    /// Input errors are reported to the caller before any work starts
    pub fn is_input_error(&self) -> bool {
        matches!(self, ChapterError::MissingUrl | ChapterError::InvalidUrl(_))
    }
}

/// Coordinator command errors
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("No page with index {0}")]
    UnknownPage(usize),

    #[error("Page {index} is still {state}; only failed or finished pages can be retried")]
    NotTerminal { index: usize, state: &'static str },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown OCR language profile: {0}")]
    UnknownLanguageProfile(String),

    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("Invalid OCR config: {0}")]
    InvalidOcrConfig(String),

    #[error("Invalid translation config: {0}")]
    InvalidTranslationConfig(String),

    #[error("Invalid source config: {0}")]
    InvalidSourceConfig(String),
}

pub type TranslationResult<T> = Result<T, TranslationError>;
pub type ChapterResult<T> = Result<T, ChapterError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Attach the originating pipeline stage to a stage-local error
pub trait StageContext<T> {
    fn at_stage(self, stage: PipelineStage) -> Result<T, PageFailure>;
}

impl<T, E: std::fmt::Display> StageContext<T> for Result<T, E> {
    fn at_stage(self, stage: PipelineStage) -> Result<T, PageFailure> {
        self.map_err(|e| PageFailure::new(stage, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_context_builds_user_message() {
        let result: Result<(), ImageLoadError> = Err(ImageLoadError::Status {
            url: "https://cdn.example/1.png".to_string(),
            status: 404,
        });

        let failure = result.at_stage(PipelineStage::Preprocessing).unwrap_err();
        assert_eq!(failure.stage, PipelineStage::Preprocessing);
        assert_eq!(
            failure.message,
            "Failed to load image: upstream returned 404 for https://cdn.example/1.png"
        );
    }

    #[test]
    fn test_chapter_input_errors() {
        assert!(ChapterError::MissingUrl.is_input_error());
        assert!(ChapterError::InvalidUrl("x".to_string()).is_input_error());
        assert!(!ChapterError::MalformedResponse("baseUrl").is_input_error());
    }
}
