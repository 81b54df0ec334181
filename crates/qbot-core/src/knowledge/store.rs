//! JSON-backed knowledge table loader.
//!
//! The source file is a single JSON object, `{"trigger": "answer", ...}`. Triggers are
//! compared case-insensitively, so two keys that only differ in case collapse into one
//! entry (the first in sorted key order wins).
//!
//! ## Match order
//!
//! Several triggers can be substrings of the same message. Matching scans triggers
//! longest first (by character count), ties broken by the lowercased trigger in
//! lexicographic order. The first hit wins.

use super::KnowledgeSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;

/// A single trigger phrase and its canned answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Trigger as written in the source file.
    pub trigger: String,
    pub answer: String,
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    needle: String,
    entry: KnowledgeEntry,
}

/// Immutable trigger -> answer table, kept in match order.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeTable {
    name: String,
    entries: Vec<IndexedEntry>,
}

impl KnowledgeTable {
    /// An empty table. Every message falls through to the generator.
    pub fn empty() -> Self {
        Self {
            name: "empty".to_string(),
            entries: Vec::new(),
        }
    }

    /// Builds a table from in-memory `(trigger, answer)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(sorted.len());
        for (trigger, answer) in sorted {
            let needle = trigger.to_lowercase();
            if !seen.insert(needle.clone()) {
                tracing::warn!(trigger = %trigger, "duplicate trigger (case-insensitive), keeping the first one");
                continue;
            }
            entries.push(IndexedEntry {
                needle,
                entry: KnowledgeEntry { trigger, answer },
            });
        }

        entries.sort_by(|a, b| {
            b.needle
                .chars()
                .count()
                .cmp(&a.needle.chars().count())
                .then_with(|| a.needle.cmp(&b.needle))
        });

        Self {
            name: "inline".to_string(),
            entries,
        }
    }

    fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in match order.
    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.iter().map(|e| &e.entry)
    }

    /// First entry whose trigger is a case-insensitive substring of `text`.
    pub fn find(&self, text: &str) -> Option<&KnowledgeEntry> {
        let haystack = text.to_lowercase();
        self.entries
            .iter()
            .find(|e| haystack.contains(e.needle.as_str()))
            .map(|e| &e.entry)
    }
}

impl KnowledgeSource for KnowledgeTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn query(&self, text: &str) -> Option<String> {
        self.find(text).map(|e| e.answer.clone())
    }
}

/// Loads the knowledge table from disk.
pub struct KnowledgeStore;

impl KnowledgeStore {
    /// Reads the JSON object at `path`. Never fails: a missing, unreadable, or malformed
    /// source logs a warning and yields an empty table.
    pub fn load<P: AsRef<Path>>(path: P) -> KnowledgeTable {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "knowledge source not found, continuing with an empty table"
                );
                return KnowledgeTable::empty();
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "knowledge source unreadable, continuing with an empty table"
                );
                return KnowledgeTable::empty();
            }
        };

        match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
            Ok(map) => {
                let table = KnowledgeTable::from_pairs(map).named(path.display().to_string());
                tracing::info!(path = %path.display(), entries = table.len(), "knowledge table loaded");
                table
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "knowledge source is not a JSON object of strings, continuing with an empty table"
                );
                KnowledgeTable::empty()
            }
        }
    }
}
