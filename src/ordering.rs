//! Per-user merge order.
//!
//! Every signed-in user owns one ordered list of staged filenames. Uploads
//! append to it, the drag-and-drop widget replaces it wholesale, and the merge
//! triggers read it back. Lists are keyed by user id so concurrent users never
//! see each other's order.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct OrderBook {
    inner: Arc<RwLock<HashMap<Uuid, Vec<String>>>>,
}

/// Returned when a new order names files that are not staged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("files are not staged: {}", .0.join(", "))]
pub struct UnknownFiles(pub Vec<String>);

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the user's order. Every name must be in `staged`; otherwise
    /// the stored order is left untouched. Duplicates keep their first slot.
    pub async fn replace(
        &self,
        user_id: Uuid,
        order: Vec<String>,
        staged: &HashSet<String>,
    ) -> Result<Vec<String>, UnknownFiles> {
        let unknown: Vec<String> = order
            .iter()
            .filter(|name| !staged.contains(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(UnknownFiles(unknown));
        }

        let order = dedup(order);
        let mut guard = self.inner.write().await;
        guard.insert(user_id, order.clone());
        Ok(order)
    }

    /// Adds a freshly uploaded file at the end of the user's order.
    pub async fn append(&self, user_id: Uuid, filename: &str) {
        let mut guard = self.inner.write().await;
        let entry = guard.entry(user_id).or_default();
        if !entry.iter().any(|existing| existing == filename) {
            entry.push(filename.to_string());
        }
    }

    pub async fn clear(&self, user_id: Uuid) {
        let mut guard = self.inner.write().await;
        guard.remove(&user_id);
    }

    pub async fn snapshot(&self, user_id: Uuid) -> Vec<String> {
        let guard = self.inner.read().await;
        guard.get(&user_id).cloned().unwrap_or_default()
    }
}

/// Outcome of lining the stored order up against the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOrder {
    pub files: Vec<String>,
    pub missing: Vec<String>,
}

/// Puts ordered entries first, then staged files the order does not mention
/// (sorted by name). Ordered entries that are no longer staged are reported
/// in `missing`.
pub fn resolve(order: &[String], staged: &BTreeSet<String>) -> ResolvedOrder {
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(staged.len());
    let mut missing = Vec::new();

    for name in order {
        if !seen.insert(name.as_str()) {
            continue;
        }
        if staged.contains(name) {
            files.push(name.clone());
        } else {
            missing.push(name.clone());
        }
    }

    for name in staged {
        if !seen.contains(name.as_str()) {
            files.push(name.clone());
        }
    }

    ResolvedOrder { files, missing }
}

fn dedup(order: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    order
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
