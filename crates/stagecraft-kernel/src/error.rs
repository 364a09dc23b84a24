//! Orchestrator error taxonomy
//!
//! No layer recovers locally: every error reaches [`crate::Orchestrator::run`]
//! and aborts the run.

use std::fmt;

use stagecraft_registry::RegistryError;
use stagecraft_settings::SettingsError;

use crate::state_machine::StageStateError;

/// Result alias for orchestration
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Point of the stage lifecycle where a collaborator failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Modelers and preprocess operations
    Preprocess,
    /// Stage construction through the registry
    Construct,
    /// Stage run contract
    Run,
    /// Postprocess operations
    Postprocess,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preprocess => "preprocess",
            Self::Construct => "construction",
            Self::Run => "run",
            Self::Postprocess => "postprocess",
        })
    }
}

/// Error category, for matching without destructuring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Settings fail validation or cannot be read
    Schema,
    /// Required key absent
    MissingKey,
    /// Registry resolution failure
    UnregisteredId,
    /// Misplaced or malformed section
    StructuralConfig,
    /// External stage, operation or modeler failed
    DelegateFailure,
    /// Lifecycle violation
    IllegalTransition,
    /// Repetition bound exceeded
    RepetitionLimit,
}

/// Orchestrator error types
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Settings fail validation against defaults
    #[error("settings error: {0}")]
    Schema(#[source] SettingsError),

    /// Required key absent
    #[error("missing key '{0}'")]
    MissingKey(String),

    /// Identifier could not be resolved
    #[error("stage '{stage}': {source}")]
    UnregisteredId {
        /// Stage being processed
        stage: String,
        /// Registry failure
        #[source]
        source: RegistryError,
    },

    /// Structural misconfiguration found before any stage runs
    #[error("stage '{stage}': {message}")]
    StructuralConfig {
        /// Offending stage
        stage: String,
        /// Description
        message: String,
    },

    /// Collaborator failure
    #[error("stage '{stage}' failed during {phase}: {source}")]
    DelegateFailure {
        /// Failing stage
        stage: String,
        /// Lifecycle phase
        phase: Phase,
        /// Reported failure
        #[source]
        source: anyhow::Error,
    },

    /// Lifecycle violation
    #[error("stage '{stage}': {source}")]
    IllegalTransition {
        /// Stage being driven
        stage: String,
        /// Rejected transition
        #[source]
        source: StageStateError,
    },

    /// Stage did not converge within its repetition bound
    #[error("stage '{stage}' not converged after {limit} repetitions")]
    RepetitionLimit {
        /// Repeated stage
        stage: String,
        /// Configured bound
        limit: usize,
    },
}

impl OrchestratorError {
    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) => ErrorKind::Schema,
            Self::MissingKey(_) => ErrorKind::MissingKey,
            Self::UnregisteredId { .. } => ErrorKind::UnregisteredId,
            Self::StructuralConfig { .. } => ErrorKind::StructuralConfig,
            Self::DelegateFailure { .. } => ErrorKind::DelegateFailure,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::RepetitionLimit { .. } => ErrorKind::RepetitionLimit,
        }
    }

    /// Structural error for `stage`
    pub(crate) fn structural(stage: &str, message: impl Into<String>) -> Self {
        Self::StructuralConfig {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Classify a registry failure raised while processing `stage`
    pub(crate) fn from_registry(stage: &str, phase: Phase, err: RegistryError) -> Self {
        match err {
            RegistryError::Construction { id, source } => Self::DelegateFailure {
                stage: stage.to_string(),
                phase,
                source: source.context(format!("constructing '{id}'")),
            },
            RegistryError::IncompleteItem { .. } | RegistryError::InvalidLocator { .. } => {
                Self::structural(stage, err.to_string())
            }
            other => Self::UnregisteredId {
                stage: stage.to_string(),
                source: other,
            },
        }
    }
}

impl From<SettingsError> for OrchestratorError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::MissingKey(key) => Self::MissingKey(key),
            other => Self::Schema(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_keeps_its_category() {
        let err = OrchestratorError::from(SettingsError::MissingKey("stages".into()));
        assert_eq!(err.kind(), ErrorKind::MissingKey);
    }

    #[test]
    fn constructor_failure_is_a_delegate_failure() {
        let err = OrchestratorError::from_registry(
            "fluid",
            Phase::Preprocess,
            RegistryError::Construction {
                id: "Operations.app.Op".into(),
                source: anyhow::anyhow!("boom"),
            },
        );
        assert_eq!(err.kind(), ErrorKind::DelegateFailure);
        let text = format!("{:#}", anyhow::Error::from(err));
        assert!(text.contains("constructing 'Operations.app.Op'"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn resolution_failure_is_unregistered() {
        let err = OrchestratorError::from_registry(
            "fluid",
            Phase::Construct,
            RegistryError::Unregistered("Stages.app.X".into()),
        );
        assert_eq!(err.kind(), ErrorKind::UnregisteredId);
    }

    #[test]
    fn malformed_locator_is_structural() {
        let err = OrchestratorError::from_registry(
            "fluid",
            Phase::Construct,
            RegistryError::InvalidLocator {
                locator: "Stages.All.X".into(),
                reason: "reserved".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::StructuralConfig);
    }
}
