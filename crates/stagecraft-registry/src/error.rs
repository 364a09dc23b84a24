//! Registry error types

use crate::prototype::PrototypeKind;

/// Result alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Identifier registered twice
    #[error("'{0}' is already registered")]
    Duplicate(String),

    /// Identifier has no entry and does not resolve by convention
    #[error("'{0}' is not registered")]
    Unregistered(String),

    /// Named module was never added to the registry
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    /// Module lacks the requested class
    #[error("class '{class}' cannot be found within the '{module}' module")]
    ClassNotFound {
        /// Module searched
        module: String,
        /// Class looked up
        class: String,
    },

    /// Malformed stage locator
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator {
        /// Locator as written in settings
        locator: String,
        /// What is wrong with it
        reason: String,
    },

    /// Prototype constructs a different kind of item
    #[error("'{id}' constructs a {found}, expected a {expected}")]
    KindMismatch {
        /// Resolved identifier
        id: String,
        /// Kind the caller needs
        expected: PrototypeKind,
        /// Kind the prototype builds
        found: PrototypeKind,
    },

    /// Item settings lack a required field
    #[error("item {item} is incomplete: '{missing}' field must be defined")]
    IncompleteItem {
        /// Offending item settings
        item: String,
        /// Missing field
        missing: &'static str,
    },

    /// Constructor of a resolved prototype failed
    #[error("constructing '{id}' failed: {source}")]
    Construction {
        /// Resolved identifier
        id: String,
        /// Failure reported by the constructor
        #[source]
        source: anyhow::Error,
    },
}

impl RegistryError {
    /// True when the identifier could not be resolved to a prototype
    #[inline]
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::Unregistered(_)
                | Self::ModuleNotFound(_)
                | Self::ClassNotFound { .. }
                | Self::InvalidLocator { .. }
                | Self::KindMismatch { .. }
        )
    }
}
