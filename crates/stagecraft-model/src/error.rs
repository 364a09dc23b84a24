//! Model error types

/// Result alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Model error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// No model part with this name
    #[error("model part '{0}' not found")]
    MissingModelPart(String),

    /// A model part with this name already exists
    #[error("model part '{0}' already exists")]
    DuplicateModelPart(String),

    /// Empty name or empty path segment
    #[error("invalid model part name '{0}'")]
    InvalidName(String),

    /// Data entry is not an array and cannot be appended to
    #[error("data '{key}' of model part '{model_part}' is not an array")]
    NotAnArray {
        /// Model part holding the entry
        model_part: String,
        /// Data key
        key: String,
    },
}
