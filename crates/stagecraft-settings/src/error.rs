//! Error types for the settings store

use crate::validation::ValueKind;

/// Result alias for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Settings error types
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Document is not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Document is not valid YAML
    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Same key declared twice in one object
    #[error("duplicate key '{path}'")]
    DuplicateKey {
        /// Dotted path of the repeated key
        path: String,
    },

    /// Value kind incompatible with the default for the same key
    #[error("schema error at '{path}': expected {expected}, found {found}")]
    Schema {
        /// Dotted path of the offending key
        path: String,
        /// Kind required by the defaults
        expected: ValueKind,
        /// Kind actually present
        found: ValueKind,
    },

    /// Key not allowed by strict validation
    #[error("unexpected key '{path}' not present in defaults")]
    UnexpectedKey {
        /// Dotted path of the offending key
        path: String,
    },

    /// Required key absent
    #[error("missing key '{0}'")]
    MissingKey(String),

    /// Accessor used on a value of the wrong kind
    #[error("key '{key}' holds {found}, not {expected}")]
    TypeMismatch {
        /// Accessed key
        key: String,
        /// Kind requested by the accessor
        expected: ValueKind,
        /// Kind actually stored
        found: ValueKind,
    },

    /// Settings file could not be read
    #[error("failed to read '{path}': {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File extension does not map to a known format
    #[error("unsupported settings format '{0}' (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),
}

impl SettingsError {
    /// True for errors raised by validation against a defaults tree
    #[inline]
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::UnexpectedKey { .. } | Self::DuplicateKey { .. }
        )
    }
}
