pub mod page_coordinator;
pub mod page_store;

pub use page_coordinator::{ChapterRun, PageCoordinator};
pub use page_store::{PageHandle, PageStore};
