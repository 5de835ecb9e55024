// Library exports for the manga page OCR + translation pipeline

// Core modules
pub mod core;
pub mod middleware;
pub mod orchestration;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        ChapterError, ConfigError, CoordinatorError, ImageLoadError, RecognitionError,
        TranslationError,
    },
    types::{
        Chapter, ChapterSummary, LanguageProfile, PageFailure, PageSnapshot, PageState,
        PipelineStage, ProviderKind, RecognitionResult, TranslationOutcome, NO_TEXT_PLACEHOLDER,
    },
};

pub use middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use orchestration::{ChapterRun, PageCoordinator, PageStore};

pub use services::{
    normalize, ChapterSource, HttpImageSource, ImageSource, MangaDexClient, RecognitionAdapter,
    RecognitionEngine, TesseractCliEngine, TranslationCache, TranslationChain, TranslationProvider,
};

pub use utils::{load_image_from_memory_async, Metrics};
