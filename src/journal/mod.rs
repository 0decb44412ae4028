//! Journal entries and the adapter that stores them in the external data service.

mod entry;
mod store;

pub use entry::{EntryId, EntryPatch, JournalEntry, Mood, NewEntry};
pub use store::EntryStore;
