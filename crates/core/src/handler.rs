//! The plugin seam: handler, factory and permission-handler traits.
//!
//! One [`IdReferenceHandler`] instance exists per ID type per call. It
//! collects the occurrences routed to it during payload walking, performs its
//! type-specific validation/resolution against the external service when
//! [`IdReferenceHandler::process_ids`] is invoked, and answers remap queries
//! afterward. New identifier types plug in by implementing
//! [`IdReferenceHandlerFactory`] and registering it with the
//! [builder](crate::registry::HandlerRegistryBuilder); nothing in this crate
//! needs to change.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

use crate::error::Result;
use crate::idtype::IdReferenceType;
use crate::remap::RemappedId;
use crate::status::DependencyStatus;
use crate::token::AuthToken;

/// The caller-supplied key identifying which payload object an ID occurrence
/// belongs to.
///
/// The framework only uses the key for equality/hashing and for rendering
/// error attribution; in production it is a provisional numeric object ID
/// within a save batch.
pub trait AssociatedKey: Clone + Eq + Hash + fmt::Display + Send {}

impl<T: Clone + Eq + Hash + fmt::Display + Send> AssociatedKey for T {}

/// A per-type, per-call stateful collector and resolver for one identifier
/// namespace.
///
/// Handlers are driven through a two-phase lifecycle: collection
/// ([`add_id`](IdReferenceHandler::add_id), repeatedly) and then processing
/// ([`process_ids`](IdReferenceHandler::process_ids), once). After processing
/// the handler is locked and answers remap queries only.
pub trait IdReferenceHandler<T: AssociatedKey>: Send {
    /// The ID type this handler processes.
    fn id_type(&self) -> IdReferenceType;

    /// Add an ID occurrence for the given associated object.
    ///
    /// Returns `true` if the ID is new for that object and should count
    /// toward the per-call unique-ID cap. Malformed IDs fail immediately with
    /// a parse error; IDs of a type whose backing service is unconfigured
    /// fail with a validation error.
    fn add_id(&mut self, associated: &T, id: &str, attributes: &[String]) -> Result<bool>;

    /// Validate and resolve all collected IDs against the external service.
    ///
    /// A no-op if zero occurrences were collected. Implementations must be
    /// idempotent with respect to external work: an ID referenced from many
    /// objects is checked and transferred at most once per call.
    fn process_ids(&mut self) -> Result<()>;

    /// Translate an original ID to its remapped value.
    ///
    /// Fails with a not-found error if processing has not run or the ID was
    /// never added.
    fn remapped_id(&self, original_id: &str) -> Result<RemappedId>;

    /// Get the remapped values for every ID associated with the given object.
    ///
    /// Empty (never an error) for an object with no occurrences; fails with a
    /// not-found error if processing has not run.
    fn remapped_ids(&self, associated: &T) -> Result<HashSet<RemappedId>>;

    /// Prevent addition of any more IDs.
    fn lock(&mut self);
}

impl<T: AssociatedKey> fmt::Debug for dyn IdReferenceHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdReferenceHandler")
            .field("id_type", &self.id_type())
            .finish_non_exhaustive()
    }
}

/// A handler that propagates read permission on the external records behind a
/// set of IDs, invoked after a successful save.
pub trait IdReferencePermissionHandler: Send {
    /// Add read permission to the records behind the given IDs.
    ///
    /// A no-op on an empty collection. No bulk/atomic primitive is assumed of
    /// the external service; a failure partway through is not rolled back.
    fn add_read_permission(&self, ids: &[String]) -> Result<()>;
}

/// A factory producing the per-call handlers for one ID type.
///
/// A factory constructed without a backing-service client must still
/// construct handlers; those handlers fail each collected ID with a
/// descriptive "service not configured" validation error so the call can
/// report exactly which identifiers are the problem.
pub trait IdReferenceHandlerFactory<T: AssociatedKey>: Send + Sync {
    /// The ID type this factory's handlers process.
    fn id_type(&self) -> IdReferenceType;

    /// Create an empty, unlocked handler bound to the caller's token.
    ///
    /// The token may be absent for anonymous/system calls; factories whose
    /// service requires caller credentials fail with a missing-argument
    /// error.
    fn create_handler(&self, token: Option<&AuthToken>) -> Result<Box<dyn IdReferenceHandler<T>>>;

    /// Create a permission handler. `None` makes records publicly readable;
    /// `Some(user)` grants read to that user.
    fn create_permission_handler(&self, user: Option<&str>)
        -> Box<dyn IdReferencePermissionHandler>;

    /// The health of this factory's external dependencies; empty if the
    /// factory is unconfigured or has none.
    fn dependency_status(&self) -> Vec<DependencyStatus>;
}
