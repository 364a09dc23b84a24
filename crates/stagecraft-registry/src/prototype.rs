//! Typed prototypes
//!
//! A prototype is a constructor closure. Cloning shares the closure, so a
//! prototype stored in the registry resolves to the same allocation every
//! time.

use std::fmt;
use std::rc::Rc;

use stagecraft_model::{AnalysisStage, Modeler, Operation, SharedModel};
use stagecraft_settings::Settings;

use crate::error::{RegistryError, RegistryResult};

/// Constructor of analysis stages
pub type StageConstructor =
    Rc<dyn Fn(&SharedModel, Settings) -> anyhow::Result<Box<dyn AnalysisStage>>>;

/// Constructor of modelers
pub type ModelerConstructor = Rc<dyn Fn(&SharedModel, Settings) -> anyhow::Result<Box<dyn Modeler>>>;

/// Constructor of operations
pub type OperationConstructor =
    Rc<dyn Fn(&SharedModel, Settings) -> anyhow::Result<Box<dyn Operation>>>;

/// Function producing a prototype on demand
pub type FactoryFn = Rc<dyn Fn() -> Prototype>;

/// Kind of item a prototype constructs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrototypeKind {
    /// Analysis stage
    Stage,
    /// Modeler
    Modeler,
    /// Operation
    Operation,
}

impl fmt::Display for PrototypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stage => "stage",
            Self::Modeler => "modeler",
            Self::Operation => "operation",
        })
    }
}

/// Constructible item prototype
#[derive(Clone)]
pub enum Prototype {
    /// Builds analysis stages
    Stage(StageConstructor),
    /// Builds modelers
    Modeler(ModelerConstructor),
    /// Builds operations
    Operation(OperationConstructor),
}

impl Prototype {
    /// Stage prototype from a closure
    pub fn stage<F>(constructor: F) -> Self
    where
        F: Fn(&SharedModel, Settings) -> anyhow::Result<Box<dyn AnalysisStage>> + 'static,
    {
        Self::Stage(Rc::new(constructor))
    }

    /// Modeler prototype from a closure
    pub fn modeler<F>(constructor: F) -> Self
    where
        F: Fn(&SharedModel, Settings) -> anyhow::Result<Box<dyn Modeler>> + 'static,
    {
        Self::Modeler(Rc::new(constructor))
    }

    /// Operation prototype from a closure
    pub fn operation<F>(constructor: F) -> Self
    where
        F: Fn(&SharedModel, Settings) -> anyhow::Result<Box<dyn Operation>> + 'static,
    {
        Self::Operation(Rc::new(constructor))
    }

    /// Kind of item constructed
    #[must_use]
    pub fn kind(&self) -> PrototypeKind {
        match self {
            Self::Stage(_) => PrototypeKind::Stage,
            Self::Modeler(_) => PrototypeKind::Modeler,
            Self::Operation(_) => PrototypeKind::Operation,
        }
    }

    /// True when both prototypes share the same constructor allocation
    #[must_use]
    pub fn ptr_eq(&self, other: &Prototype) -> bool {
        match (self, other) {
            (Self::Stage(a), Self::Stage(b)) => Rc::ptr_eq(a, b),
            (Self::Modeler(a), Self::Modeler(b)) => Rc::ptr_eq(a, b),
            (Self::Operation(a), Self::Operation(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Unwrap a stage constructor
    ///
    /// # Errors
    /// Returns [`RegistryError::KindMismatch`] for other kinds
    pub fn into_stage(self, id: &str) -> RegistryResult<StageConstructor> {
        match self {
            Self::Stage(constructor) => Ok(constructor),
            other => Err(other.mismatch(id, PrototypeKind::Stage)),
        }
    }

    /// Unwrap a modeler constructor
    ///
    /// # Errors
    /// Returns [`RegistryError::KindMismatch`] for other kinds
    pub fn into_modeler(self, id: &str) -> RegistryResult<ModelerConstructor> {
        match self {
            Self::Modeler(constructor) => Ok(constructor),
            other => Err(other.mismatch(id, PrototypeKind::Modeler)),
        }
    }

    /// Unwrap an operation constructor
    ///
    /// # Errors
    /// Returns [`RegistryError::KindMismatch`] for other kinds
    pub fn into_operation(self, id: &str) -> RegistryResult<OperationConstructor> {
        match self {
            Self::Operation(constructor) => Ok(constructor),
            other => Err(other.mismatch(id, PrototypeKind::Operation)),
        }
    }

    fn mismatch(&self, id: &str, expected: PrototypeKind) -> RegistryError {
        RegistryError::KindMismatch {
            id: id.to_string(),
            expected,
            found: self.kind(),
        }
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prototype::{:?}", self.kind())
    }
}
