//! The process-wide factory registry and its per-call products.
//!
//! The indirection here allows the set of handler factories to be configured
//! once, early in service startup, while caller credentials only become
//! available per call: the [`HandlerRegistryBuilder`] accumulates factories
//! and freezes them into a [`HandlerRegistry`]; binding the frozen registry
//! to one caller's token yields an [`IdReferenceHandlerSetFactory`]; and that
//! factory builds the actual [`IdReferenceHandlerSet`] for the call. The
//! frozen registry is shared read-only across all in-flight calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{IdReferenceError, Result};
use crate::handler::{
    AssociatedKey, IdReferenceHandlerFactory, IdReferencePermissionHandler,
};
use crate::handler_set::IdReferenceHandlerSet;
use crate::idtype::IdReferenceType;
use crate::status::DependencyStatus;
use crate::token::AuthToken;

struct RegistryInner<T: AssociatedKey> {
    max_unique_id_count: usize,
    factories: BTreeMap<IdReferenceType, Arc<dyn IdReferenceHandlerFactory<T>>>,
}

/// Startup-time accumulator of (ID type → handler factory) registrations.
pub struct HandlerRegistryBuilder<T: AssociatedKey> {
    inner: RegistryInner<T>,
}

impl<T: AssociatedKey> HandlerRegistryBuilder<T> {
    /// Create a builder with the given cap on distinct IDs per call.
    ///
    /// The handler implementations define what non-unique means, but
    /// generally an ID counts once per (associated object, ID) pair.
    pub fn new(max_unique_id_count: usize) -> Self {
        HandlerRegistryBuilder {
            inner: RegistryInner {
                max_unique_id_count,
                factories: BTreeMap::new(),
            },
        }
    }

    /// Register a factory under its declared ID type.
    ///
    /// Re-registering a type replaces the previous factory; last write wins.
    pub fn with_factory(mut self, factory: Arc<dyn IdReferenceHandlerFactory<T>>) -> Self {
        let id_type = factory.id_type();
        if self.inner.factories.insert(id_type.clone(), factory).is_some() {
            debug!(%id_type, "replacing previously registered handler factory");
        }
        self
    }

    /// Freeze the registrations into an immutable registry.
    pub fn build(self) -> HandlerRegistry<T> {
        HandlerRegistry {
            inner: Arc::new(self.inner),
        }
    }
}

/// The frozen, process-wide registry of handler factories plus the per-call
/// ID cap. Cheaply cloneable; read-only after
/// [`HandlerRegistryBuilder::build`], so it may be read concurrently by many
/// in-flight calls.
pub struct HandlerRegistry<T: AssociatedKey> {
    inner: Arc<RegistryInner<T>>,
}

impl<T: AssociatedKey> Clone for HandlerRegistry<T> {
    fn clone(&self) -> Self {
        HandlerRegistry {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: AssociatedKey> HandlerRegistry<T> {
    /// Bind the registry to one caller's token, producing the factory that
    /// builds a handler set per call.
    ///
    /// The token may be absent for anonymous/system calls; factories whose
    /// service requires caller credentials will fail handler creation.
    pub fn handler_set_factory(&self, token: Option<AuthToken>) -> IdReferenceHandlerSetFactory<T> {
        IdReferenceHandlerSetFactory {
            registry: Arc::clone(&self.inner),
            token,
        }
    }

    /// Create a permission handler set for post-save read-permission
    /// propagation. `None` makes records publicly readable; `Some(user)`
    /// grants read to that user.
    pub fn permission_handler_set(&self, user: Option<&str>) -> IdReferencePermissionHandlerSet {
        let handlers = self
            .inner
            .factories
            .iter()
            .map(|(t, f)| (t.clone(), f.create_permission_handler(user)))
            .collect();
        IdReferencePermissionHandlerSet { handlers }
    }

    /// The health of every registered factory's external dependencies.
    pub fn dependency_status(&self) -> Vec<DependencyStatus> {
        self.inner
            .factories
            .values()
            .flat_map(|f| f.dependency_status())
            .collect()
    }

    /// The registered ID types.
    pub fn id_types(&self) -> Vec<IdReferenceType> {
        self.inner.factories.keys().cloned().collect()
    }
}

/// The frozen registry bound to one caller token; builds one
/// [`IdReferenceHandlerSet`] per call.
pub struct IdReferenceHandlerSetFactory<T: AssociatedKey> {
    registry: Arc<RegistryInner<T>>,
    token: Option<AuthToken>,
}

impl<T: AssociatedKey> IdReferenceHandlerSetFactory<T> {
    /// Create a fresh set of empty, unlocked handlers, one per registered
    /// factory.
    pub fn create_handlers(&self) -> Result<IdReferenceHandlerSet<T>> {
        let mut handlers = BTreeMap::new();
        for (id_type, factory) in &self.registry.factories {
            handlers.insert(id_type.clone(), factory.create_handler(self.token.as_ref())?);
        }
        Ok(IdReferenceHandlerSet::new(
            self.registry.max_unique_id_count,
            handlers,
        ))
    }
}

/// A set of permission handlers, one per registered ID type, for propagating
/// read access after a successful save.
pub struct IdReferencePermissionHandlerSet {
    handlers: BTreeMap<IdReferenceType, Box<dyn IdReferencePermissionHandler>>,
}

impl IdReferencePermissionHandlerSet {
    /// Whether a permission handler exists for the given ID type.
    pub fn has_handler(&self, id_type: &IdReferenceType) -> bool {
        self.handlers.contains_key(id_type)
    }

    /// The ID types with permission handlers.
    pub fn id_types(&self) -> Vec<IdReferenceType> {
        self.handlers.keys().cloned().collect()
    }

    /// Add read permission to the records behind the given IDs of the given
    /// type.
    pub fn add_read_permission(&self, id_type: &IdReferenceType, ids: &[String]) -> Result<()> {
        let handler = self
            .handlers
            .get(id_type)
            .ok_or_else(|| IdReferenceError::NoSuchHandler(id_type.clone()))?;
        if ids.iter().any(|id| id.trim().is_empty()) {
            return Err(IdReferenceError::InvalidArgument(
                "null or whitespace-only string in ids".to_string(),
            ));
        }
        handler.add_read_permission(ids)
    }
}
