//! Dependency health reporting.

/// The status of one external dependency of a handler factory, consumed by
/// the host's operational status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStatus {
    /// Whether the dependency is healthy.
    pub ok: bool,
    /// A human-readable status detail; "OK" when healthy, otherwise the
    /// failure cause.
    pub status: String,
    /// The dependency's name.
    pub name: String,
    /// The dependency's reported version, or "Unknown" if unreachable.
    pub version: String,
}

impl DependencyStatus {
    /// Create a dependency status report.
    pub fn new(
        ok: bool,
        status: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        DependencyStatus {
            ok,
            status: status.into(),
            name: name.into(),
            version: version.into(),
        }
    }
}
