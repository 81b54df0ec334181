//! Static knowledge table: trigger phrases mapped to canned answers.
//!
//! Loaded once at startup from a JSON object file and never mutated afterwards,
//! so it is shared across message tasks behind an `Arc` without locking.

mod store;

pub use store::{KnowledgeEntry, KnowledgeStore, KnowledgeTable};

/// Common trait for anything that can answer a message without the remote generator.
pub trait KnowledgeSource: Send + Sync {
    /// Human-readable name for this knowledge source.
    fn name(&self) -> &str;

    /// Number of entries available for matching.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the canned answer for the first trigger contained in `text`, if any.
    fn query(&self, text: &str) -> Option<String>;
}
