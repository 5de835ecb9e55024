pub mod chapter;
pub mod images;
pub mod normalizer;
pub mod ocr;
pub mod preprocessing;
pub mod translation;

// Re-export commonly used services
pub use chapter::{ChapterSource, MangaDexClient};
pub use images::{FetchedImage, HttpImageSource, ImageSource};
pub use normalizer::normalize;
pub use ocr::{RecognitionAdapter, RecognitionEngine, TesseractCliEngine};
pub use translation::{TranslationCache, TranslationChain, TranslationProvider};
