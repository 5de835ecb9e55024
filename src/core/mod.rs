pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ChapterError, ConfigError, CoordinatorError, ImageLoadError, RecognitionError,
    StageContext, TranslationError,
};
pub use types::{
    Chapter, LanguageProfile, PageFailure, PageSnapshot, PageState, PageTask, PipelineStage,
    ProviderKind, RecognitionResult, TranslationOutcome, NO_TEXT_PLACEHOLDER,
};
