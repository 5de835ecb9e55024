pub mod cache;
pub mod chain;
pub mod dictionary;
pub mod google;
pub mod mymemory;
pub mod provider;

pub use cache::TranslationCache;
pub use chain::{note_for, TranslationChain, DICTIONARY_NOTE, MYMEMORY_NOTE};
pub use dictionary::DictionaryTranslator;
pub use google::GoogleTranslator;
pub use mymemory::MyMemoryTranslator;
pub use provider::TranslationProvider;
