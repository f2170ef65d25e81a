use tracing::{info, warn};

use crate::error::StoreError;
use crate::state::HistoryItem;
use crate::store::BlobStore;

/// Blob key holding the serialized history
pub const HISTORY_KEY: &str = "tipster_history";

/// Saved analyses, most recent first. Every mutation rewrites the whole
/// blob.
pub struct HistoryStore {
    store: Box<dyn BlobStore + Send>,
    items: Vec<HistoryItem>,
}

impl HistoryStore {
    /// Read the history from `store`. A missing blob gives an empty
    /// history; so does a malformed one, which is logged and otherwise
    /// ignored.
    pub fn load(store: Box<dyn BlobStore + Send>) -> Self {
        let items = match store.get(HISTORY_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<HistoryItem>>(&blob) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Failed to parse history, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read history, starting empty");
                Vec::new()
            }
        };
        info!(count = items.len(), "history loaded");

        Self { store, items }
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Prepend `item` and persist. The in-memory list keeps the item even
    /// if the write fails.
    pub fn append(&mut self, item: HistoryItem) -> Result<(), StoreError> {
        self.items.insert(0, item);
        self.persist()
    }

    /// Drop every saved analysis. Callers confirm with the user first.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.items.clear();
        self.persist()
    }

    /// Items whose title contains `term` (case-insensitive) or whose date
    /// (`d/m/yyyy`) contains it, newest first
    pub fn search(&self, term: &str) -> Vec<&HistoryItem> {
        let term_lower = term.trim().to_lowercase();

        let mut results: Vec<&HistoryItem> = self
            .items
            .iter()
            .filter(|item| {
                item.match_title.to_lowercase().contains(&term_lower)
                    || item.display_date().contains(&term_lower)
            })
            .collect();
        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results
    }

    fn persist(&self) -> Result<(), StoreError> {
        let blob = serde_json::to_string(&self.items)?;
        self.store.set(HISTORY_KEY, &blob).inspect_err(|e| {
            warn!(error = %e, "Failed to persist history");
        })
    }
}
