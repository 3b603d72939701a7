//! Calculation history: newest first, with pinning, naming and search.
//!
//! The store itself is purely in memory. Persisting it is the caller's
//! job; [`HistoryStore::revision`] changes after every mutation so a caller
//! knows when a save is due, and [`HistoryStore::entries`] is the flat,
//! serializable collection to save.

use std::collections::HashSet;

use chrono::{Local, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Result text older saved histories carry for a failed evaluation.
const FAILURE_MARKER: &str = "Error";

const ID_SUFFIX_LEN: usize = 8;

/// One recorded calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(alias = "input")]
    pub expression: String,
    pub result: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pinned: bool,
    /// User-assigned label; empty means "show the expression".
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

// Saved records may carry an explicit `null` where a value was never set.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl HistoryEntry {
    /// The text shown as the entry's title and matched by [`HistoryStore::query`].
    pub fn title(&self) -> &str {
        if self.name.is_empty() {
            &self.expression
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("entry {0} is pinned; unpin it before deleting")]
    EntryPinned(String),
    #[error("no history entry with id {0}")]
    UnknownEntry(String),
}

/// Single-owner, ordered collection of [`HistoryEntry`], newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    revision: u64,
}

fn is_failure(result: &str) -> bool {
    result == FAILURE_MARKER || result.starts_with("Error:")
}

fn new_id(taken: &HashSet<&str>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let suffix: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(ID_SUFFIX_LEN)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let id = format!("{}{}", Utc::now().timestamp_millis(), suffix);
        if !taken.contains(id.as_str()) {
            return id;
        }
    }
}

fn display_timestamp() -> String {
    Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

impl HistoryStore {
    pub fn new() -> Self {
        HistoryStore::default()
    }

    /// Rebuilds a store from previously saved entries, newest first.
    /// Entries saved without an id, or sharing one, get a fresh id.
    pub fn from_entries(mut entries: Vec<HistoryEntry>) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());
        let mut repaired = 0;
        for i in 0..entries.len() {
            if entries[i].id.is_empty() || seen.contains(&entries[i].id) {
                let id = {
                    let taken = entries.iter().map(|e| e.id.as_str()).collect();
                    new_id(&taken)
                };
                entries[i].id = id;
                repaired += 1;
            }
            seen.insert(entries[i].id.clone());
        }
        if repaired > 0 {
            warn!(repaired, "assigned fresh ids to saved history entries");
        }
        HistoryStore { entries, revision: 0 }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Incremented by every call that changed the collection.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn position(&self, id: &str) -> Result<usize, HistoryError> {
        self.entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| HistoryError::UnknownEntry(id.to_owned()))
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    /// Puts a calculation at the head of the history and returns it.
    ///
    /// Nothing is recorded (and `None` returned) when either part is empty,
    /// when `result` is a failure, or when the head already holds the same
    /// expression and result.
    pub fn record(&mut self, expression: &str, result: &str) -> Option<&HistoryEntry> {
        if expression.is_empty() || result.is_empty() || is_failure(result) {
            return None;
        }
        if let Some(head) = self.entries.first() {
            if head.expression == expression && head.result == result {
                debug!(expression, result, "skipped repeated calculation");
                return None;
            }
        }
        let id = {
            let taken = self.entries.iter().map(|e| e.id.as_str()).collect();
            new_id(&taken)
        };
        self.entries.insert(
            0,
            HistoryEntry {
                id,
                expression: expression.to_owned(),
                result: result.to_owned(),
                timestamp: display_timestamp(),
                pinned: false,
                name: String::new(),
            },
        );
        self.touch();
        debug!(expression, result, len = self.entries.len(), "recorded calculation");
        self.entries.first()
    }

    /// Removes an unpinned entry. Pinned entries are left untouched.
    pub fn delete(&mut self, id: &str) -> Result<HistoryEntry, HistoryError> {
        let index = self.position(id)?;
        if self.entries[index].pinned {
            debug!(id, "refused to delete pinned entry");
            return Err(HistoryError::EntryPinned(id.to_owned()));
        }
        let removed = self.entries.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Flips the pin and returns the new state.
    pub fn toggle_pin(&mut self, id: &str) -> Result<bool, HistoryError> {
        let index = self.position(id)?;
        let entry = &mut self.entries[index];
        entry.pinned = !entry.pinned;
        let pinned = entry.pinned;
        self.touch();
        Ok(pinned)
    }

    /// Sets the entry's label. An empty name falls back to the expression.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), HistoryError> {
        let index = self.position(id)?;
        self.entries[index].name = name.to_owned();
        self.touch();
        Ok(())
    }

    /// Entries whose title contains `filter` (ignoring case), pinned ones
    /// first, otherwise in history order.
    pub fn query(&self, filter: &str) -> Vec<&HistoryEntry> {
        let needle = filter.to_lowercase();
        let mut matches: Vec<&HistoryEntry> = self
            .entries
            .iter()
            .filter(|e| e.title().to_lowercase().contains(&needle))
            .collect();
        matches.sort_by_key(|e| !e.pinned);
        matches
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.touch();
    }

    /// Plain-text rendering for sharing, one calculation per paragraph.
    pub fn export_text(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} = {} ({})", e.title(), e.result, e.timestamp))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json).map(HistoryStore::from_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expressions(entries: &[&HistoryEntry]) -> Vec<String> {
        entries.iter().map(|e| e.expression.clone()).collect()
    }

    fn id_of(store: &HistoryStore, expression: &str) -> String {
        store
            .entries()
            .iter()
            .find(|e| e.expression == expression)
            .map(|e| e.id.clone())
            .unwrap()
    }

    #[test]
    fn newest_first() {
        let mut store = HistoryStore::new();
        store.record("1+1", "2");
        store.record("2+2", "4");
        let order: Vec<&str> = store.entries().iter().map(|e| e.expression.as_str()).collect();
        assert_eq!(order, vec!["2+2", "1+1"]);
        assert!(!store.entries()[0].timestamp.is_empty());
        assert_ne!(store.entries()[0].id, store.entries()[1].id);
    }

    #[test]
    fn skipped_records() {
        let mut store = HistoryStore::new();
        assert!(store.record("2+2", "4").is_some());
        assert!(store.record("2+2", "4").is_none());
        assert!(store.record("", "4").is_none());
        assert!(store.record("2+", "").is_none());
        assert!(store.record("1/0", "Error").is_none());
        assert!(store.record("1/0", "Error: Math Error").is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), 1);

        // Only the head is compared.
        store.record("3+3", "6");
        assert!(store.record("2+2", "4").is_some());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn pinned_entries_resist_deletion() {
        let mut store = HistoryStore::new();
        store.record("2+2", "4");
        let id = id_of(&store, "2+2");

        assert_eq!(store.toggle_pin(&id), Ok(true));
        assert_eq!(store.delete(&id), Err(HistoryError::EntryPinned(id.clone())));
        assert!(store.get(&id).is_some());

        assert_eq!(store.toggle_pin(&id), Ok(false));
        assert_eq!(store.delete(&id).map(|e| e.expression), Ok("2+2".to_owned()));
        assert!(store.get(&id).is_none());
        assert_eq!(store.delete(&id), Err(HistoryError::UnknownEntry(id)));
    }

    #[test]
    fn rename_and_search() {
        let mut store = HistoryStore::new();
        store.record("12×3", "36");
        store.record("sin(30)", "0.5");
        let id = id_of(&store, "12×3");

        store.rename(&id, "Egg Boxes").unwrap();
        assert_eq!(store.get(&id).map(HistoryEntry::title), Some("Egg Boxes"));
        assert_eq!(expressions(&store.query("egg")), vec!["12×3"]);
        // A named entry is matched by its name, not its expression.
        assert!(store.query("12").is_empty());
        assert_eq!(expressions(&store.query("SIN")), vec!["sin(30)"]);

        store.rename(&id, "").unwrap();
        assert_eq!(expressions(&store.query("12")), vec!["12×3"]);
    }

    #[test]
    fn pinned_first_query() {
        let mut store = HistoryStore::new();
        store.record("A", "1");
        store.record("B", "2");
        let b = id_of(&store, "B");
        store.toggle_pin(&b).unwrap();
        store.record("C", "3");

        assert_eq!(expressions(&store.query("")), vec!["B", "C", "A"]);
    }

    #[test]
    fn clear_and_export() {
        let mut store = HistoryStore::new();
        store.record("1+1", "2");
        store.record("2×2", "4");
        let id = id_of(&store, "2×2");
        store.rename(&id, "square").unwrap();

        let text = store.export_text();
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[0].starts_with("square = 4 ("));
        assert!(paragraphs[1].starts_with("1+1 = 2 ("));

        store.toggle_pin(&id).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.export_text(), "");
    }

    #[test]
    fn legacy_records_load() {
        let json = r#"[
            {"input": "2+2", "result": "4", "timestamp": "1/2/2025, 3:04:05 PM"},
            {"id": "", "expression": "3+3", "result": "6", "timestamp": "t",
             "pinned": true, "name": "six"},
            {"id": "dup", "expression": "4+4", "result": "8", "timestamp": "t"},
            {"id": "dup", "expression": "5+5", "result": "10", "timestamp": "t"}
        ]"#;
        let store = HistoryStore::from_json(json).unwrap();
        let entries = store.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].expression, "2+2");
        assert!(!entries[0].pinned);
        assert_eq!(entries[0].name, "");
        assert!(entries.iter().all(|e| !e.id.is_empty()));
        assert_eq!(entries[2].id, "dup");
        assert_ne!(entries[3].id, "dup");
        assert!(entries[1].pinned);
        assert_eq!(entries[1].title(), "six");
    }

    #[test]
    fn null_fields_load_as_defaults() {
        let json = r#"[
            {"input": "2+2", "result": "4", "timestamp": null,
             "pinned": null, "name": null, "id": null}
        ]"#;
        let store = HistoryStore::from_json(json).unwrap();
        let entry = &store.entries()[0];
        assert_eq!(entry.expression, "2+2");
        assert!(!entry.pinned);
        assert_eq!(entry.name, "");
        assert_eq!(entry.timestamp, "");
        assert!(!entry.id.is_empty());
        assert_eq!(entry.title(), "2+2");
    }

    #[test]
    fn json_shape() {
        let mut store = HistoryStore::new();
        store.record("2+2", "4");
        let value: serde_json::Value = serde_json::from_str(&store.to_json().unwrap()).unwrap();
        let record = &value[0];
        for field in &["id", "expression", "result", "timestamp", "name"] {
            assert!(record[*field].is_string(), "{}", field);
        }
        assert!(record["pinned"].is_boolean());
    }
}
