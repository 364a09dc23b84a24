//! Project context

use std::fmt;

use uuid::Uuid;

use crate::model::SharedModel;

/// Identifier of one orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a fresh run id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run-scoped state shared by all stages
///
/// Exactly one exists per orchestrator run; every stage sees the same model,
/// so stage N+1 observes what stage N did to it.
#[derive(Debug, Default)]
pub struct ProjectContext {
    run_id: RunId,
    model: SharedModel,
}

impl ProjectContext {
    /// Create a context with an empty model
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context around an existing model
    #[must_use]
    pub fn with_model(model: SharedModel) -> Self {
        Self {
            run_id: RunId::new(),
            model,
        }
    }

    /// Handle to the shared model (always the same instance)
    #[inline]
    #[must_use]
    pub fn model(&self) -> SharedModel {
        self.model.clone()
    }

    /// Identifier of this run
    #[inline]
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}
