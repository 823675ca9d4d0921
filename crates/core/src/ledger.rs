//! Shared per-handler collection and remap state.
//!
//! Every concrete handler owns the same bookkeeping: which distinct raw IDs
//! were seen for which associated object, whether the handler is locked or
//! processed, and the original → final ID mapping populated during the
//! processing phase. [`IdLedger`] provides that bookkeeping by composition;
//! concrete handlers embed one and layer their type-specific validation and
//! external-service work on top.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{IdReferenceError, Result};
use crate::handler::AssociatedKey;
use crate::remap::RemappedId;

/// Collection and remap state owned exclusively by one handler instance,
/// created fresh per call and discarded at call end.
#[derive(Debug)]
pub struct IdLedger<T: AssociatedKey> {
    ids: HashMap<T, HashSet<String>>,
    remapped: HashMap<String, String>,
    locked: bool,
    processed: bool,
}

impl<T: AssociatedKey> Default for IdLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: AssociatedKey> IdLedger<T> {
    /// Create an empty, unlocked ledger.
    pub fn new() -> Self {
        IdLedger {
            ids: HashMap::new(),
            remapped: HashMap::new(),
            locked: false,
            processed: false,
        }
    }

    /// Record an ID for an associated object.
    ///
    /// Returns `true` if the ID had not been seen for that object before.
    /// Duplicates are not an error; they simply do not count again.
    ///
    /// # Errors
    ///
    /// Fails with [`IdReferenceError::HandlerLocked`] once the ledger is
    /// locked.
    pub fn insert(&mut self, associated: &T, id: &str) -> Result<bool> {
        if self.locked {
            return Err(IdReferenceError::HandlerLocked);
        }
        Ok(self
            .ids
            .entry(associated.clone())
            .or_default()
            .insert(id.to_string()))
    }

    /// Prevent further additions.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Mark the processing phase as run. Implies locking.
    pub fn mark_processed(&mut self) {
        self.locked = true;
        self.processed = true;
    }

    /// Whether the processing phase has run.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Whether no IDs have been collected.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Every distinct raw ID collected, across all associated objects, in
    /// deterministic order.
    pub fn distinct_ids(&self) -> BTreeSet<&str> {
        self.ids
            .values()
            .flat_map(|ids| ids.iter().map(String::as_str))
            .collect()
    }

    /// Iterate the (associated object, distinct IDs) entries.
    pub fn entries(&self) -> impl Iterator<Item = (&T, &HashSet<String>)> {
        self.ids.iter()
    }

    /// Record the final ID for an original ID.
    pub fn record_remap(&mut self, original: &str, final_id: impl Into<String>) {
        self.remapped.insert(original.to_string(), final_id.into());
    }

    /// Whether a final ID has been recorded for the original ID.
    pub fn has_remap(&self, original: &str) -> bool {
        self.remapped.contains_key(original)
    }

    /// Translate an original ID to its remapped value.
    pub fn remapped_id(&self, original: &str) -> Result<RemappedId> {
        if !self.processed {
            return Err(IdReferenceError::NotFound(
                "IDs have not been processed yet".to_string(),
            ));
        }
        self.remapped
            .get(original)
            .map(RemappedId::new)
            .ok_or_else(|| {
                IdReferenceError::NotFound(format!(
                    "no such ID contained in this handler: {original}"
                ))
            })
    }

    /// The remapped values for every ID associated with the given object;
    /// empty if the object had no occurrences.
    pub fn remapped_ids(&self, associated: &T) -> Result<HashSet<RemappedId>> {
        if !self.processed {
            return Err(IdReferenceError::NotFound(
                "IDs have not been processed yet".to_string(),
            ));
        }
        Ok(self
            .ids
            .get(associated)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.remapped.get(id))
                    .map(RemappedId::new)
                    .collect()
            })
            .unwrap_or_default())
    }
}
