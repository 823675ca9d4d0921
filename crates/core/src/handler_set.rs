//! The per-call handler set: dispatch, cap accounting and lifecycle.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::error::{IdReferenceError, Result};
use crate::handler::{AssociatedKey, IdReferenceHandler};
use crate::idtype::IdReferenceType;
use crate::occurrence::IdOccurrence;
use crate::remap::RemappedId;

/// The set of ID handlers for one inbound call.
///
/// Owns the global cap on distinct identifiers across all types, the current
/// associated-object cursor used during collection, and the type → handler
/// map built at creation. Driven strictly sequentially within a call:
/// collection via [`associate_object`](Self::associate_object) and
/// [`add_id`](Self::add_id), then [`process_ids`](Self::process_ids), then
/// remap queries.
pub struct IdReferenceHandlerSet<T: AssociatedKey> {
    max_unique_id_count: usize,
    current_unique_id_count: usize,
    locked: bool,
    processed: bool,
    associated: Option<T>,
    handlers: BTreeMap<IdReferenceType, Box<dyn IdReferenceHandler<T>>>,
}

impl<T: AssociatedKey> fmt::Debug for IdReferenceHandlerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdReferenceHandlerSet")
            .field("max_unique_id_count", &self.max_unique_id_count)
            .field("current_unique_id_count", &self.current_unique_id_count)
            .field("locked", &self.locked)
            .field("processed", &self.processed)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<T: AssociatedKey> IdReferenceHandlerSet<T> {
    pub(crate) fn new(
        max_unique_id_count: usize,
        handlers: BTreeMap<IdReferenceType, Box<dyn IdReferenceHandler<T>>>,
    ) -> Self {
        IdReferenceHandlerSet {
            max_unique_id_count,
            current_unique_id_count: 0,
            locked: false,
            processed: false,
            associated: None,
            handlers,
        }
    }

    /// The statically configured ID types, independent of whether IDs of a
    /// type were actually seen this call.
    pub fn id_types(&self) -> Vec<IdReferenceType> {
        self.handlers.keys().cloned().collect()
    }

    /// Whether a handler is registered for the given ID type.
    pub fn has_handler(&self, id_type: &IdReferenceType) -> bool {
        self.handlers.contains_key(id_type)
    }

    /// The running count of distinct IDs accepted across all types.
    pub fn size(&self) -> usize {
        self.current_unique_id_count
    }

    /// Whether no IDs have been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.current_unique_id_count == 0
    }

    /// The fixed cap on distinct IDs for this call.
    pub fn maximum_id_count(&self) -> usize {
        self.max_unique_id_count
    }

    /// Associate an object with any further IDs added. Subsequent
    /// [`add_id`](Self::add_id) calls attach their occurrences to this key
    /// until it is changed.
    pub fn associate_object(&mut self, object: T) -> &mut Self {
        self.associated = Some(object);
        self
    }

    /// Route an ID occurrence to the handler registered for its type.
    ///
    /// An occurrence of an unregistered type is dropped with a debug log
    /// rather than an error; the type catalog is expected to grow
    /// independently of any one deployment. The running count increments
    /// exactly when the target handler reports the ID as newly seen for the
    /// current object; exceeding the cap fails with
    /// [`IdReferenceError::TooManyIds`] before any external call is made.
    pub fn add_id(&mut self, occurrence: &IdOccurrence) -> Result<()> {
        if self.locked {
            return Err(IdReferenceError::HandlerLocked);
        }
        let associated = self
            .associated
            .as_ref()
            .ok_or(IdReferenceError::NoAssociatedObject)?
            .clone();
        let Some(handler) = self.handlers.get_mut(occurrence.id_type()) else {
            debug!(
                id_type = %occurrence.id_type(),
                id = %occurrence.id(),
                "dropping ID occurrence with no registered handler"
            );
            return Ok(());
        };
        let new = handler.add_id(&associated, occurrence.id(), occurrence.attributes())?;
        if new {
            self.current_unique_id_count += 1;
            if self.current_unique_id_count > self.max_unique_id_count {
                return Err(IdReferenceError::TooManyIds {
                    maximum: self.max_unique_id_count,
                });
            }
        }
        Ok(())
    }

    /// Process the IDs collected by every handler and lock the set.
    ///
    /// Handlers run in deterministic type-key order; the first failure aborts
    /// the call. External mutations already performed by an earlier handler
    /// are not undone on a later handler's failure. Calling this twice has no
    /// effect.
    pub fn process_ids(&mut self) -> Result<()> {
        if self.processed {
            return Ok(());
        }
        self.locked = true;
        self.processed = true;
        for handler in self.handlers.values_mut() {
            handler.process_ids()?;
            handler.lock();
        }
        Ok(())
    }

    /// Whether [`process_ids`](Self::process_ids) has been called. Implies
    /// the set is locked.
    pub fn were_ids_processed(&self) -> bool {
        self.processed
    }

    /// Translate an original ID to its remapped value.
    pub fn remapped_id(&self, id_type: &IdReferenceType, original_id: &str) -> Result<RemappedId> {
        self.handlers
            .get(id_type)
            .ok_or_else(|| IdReferenceError::NoSuchHandler(id_type.clone()))?
            .remapped_id(original_id)
    }

    /// Get the remapped values for every ID of the given type associated with
    /// the given object.
    pub fn remapped_ids(
        &self,
        id_type: &IdReferenceType,
        associated: &T,
    ) -> Result<HashSet<RemappedId>> {
        self.handlers
            .get(id_type)
            .ok_or_else(|| IdReferenceError::NoSuchHandler(id_type.clone()))?
            .remapped_ids(associated)
    }

    /// Prevent addition of any more IDs to this set and all its handlers.
    pub fn lock(&mut self) -> &mut Self {
        self.locked = true;
        for handler in self.handlers.values_mut() {
            handler.lock();
        }
        self
    }
}
