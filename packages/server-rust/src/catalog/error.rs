//! Catalog error taxonomy.

/// Errors returned by catalog operations.
///
/// These are returned to command handlers and flattened into error
/// responses; nothing here crosses a session as a panic. The variants
/// mirror the three recoverable response families: bad input, missing
/// entity, and state conflict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Input failed validation before any state was touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A named entity does not exist.
    #[error("{what} {name:?} is not registered")]
    NotFound { what: &'static str, name: String },

    /// The operation contradicts existing catalog state.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl CatalogError {
    pub(crate) fn machine_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: "machine",
            name: name.into(),
        }
    }

    pub(crate) fn node_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: "node",
            name: name.into(),
        }
    }

    pub(crate) fn channel_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: "channel",
            name: name.into(),
        }
    }

    pub(crate) fn connection_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: "connection",
            name: name.into(),
        }
    }
}
