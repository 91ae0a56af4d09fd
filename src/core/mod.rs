pub mod cache;
pub mod source;

pub use cache::{CachedPhotoSlot, PhotoCache, SlotHandle};
pub use source::{PhotoSource, SelectionError, SourceError, SourceSelection};
