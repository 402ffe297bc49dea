use crate::bean::{BeanId, ObserverId};
use crate::instance_provider::ErrorPtr;
use crate::qualifier::QualifierSet;
use crate::types::Type;
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

/// Errors related to typesafe and name-based resolution.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum ResolutionError {
    #[error("Unsatisfied dependency: no bean matches type {required_type} with qualifiers {qualifiers}")]
    UnsatisfiedDependency {
        required_type: Type,
        qualifiers: QualifierSet,
    },
    #[error("Ambiguous dependency: type {required_type} with qualifiers {qualifiers} is satisfied by beans: {}", .candidates.iter().join(", "))]
    AmbiguousDependency {
        required_type: Type,
        qualifiers: QualifierSet,
        candidates: Vec<BeanId>,
    },
    #[error("Cannot resolve a type variable or wildcard: {0}")]
    IllegalRequiredType(Type),
    #[error("Event type cannot contain type variables: {0}")]
    IllegalEventType(Type),
    #[error("Duplicate qualifier of a non-repeatable type: {0}")]
    DuplicateQualifier(String),
    #[error("Cannot find bean named: {0}")]
    UnsatisfiedName(String),
    #[error("Ambiguous bean name '{name}' is used by beans: {}", .candidates.iter().join(", "))]
    AmbiguousName {
        name: String,
        candidates: Vec<BeanId>,
    },
}

/// Errors related to [contexts](crate::context).
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ContextError {
    #[error("Context for scope {0} is not active")]
    ContextNotActive(String),
    #[error("Context for scope {0} is already active")]
    ContextAlreadyActive(String),
    #[error("Context for scope {0} has been destroyed")]
    ContextDestroyed(String),
    #[error("No context registered for scope: {0}")]
    NoContext(String),
    #[error("Context for scope {0} does not support destroying instances")]
    DestroyUnsupported(String),
}

/// Errors related to creating and obtaining bean instances.
#[derive(Error, Clone, Debug)]
pub enum InstanceProviderError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("Detected unbreakable dependency cycle while creating bean: {0}")]
    DependencyCycle(BeanId),
    #[error("Cannot find bean: {0}")]
    UnknownBean(BeanId),
    #[error("Tried to downcast an instance to incompatible type: {0}")]
    IncompatibleInstance(&'static str),
    #[error("Error creating an instance of bean {bean}: {error}")]
    CreationFailed { bean: BeanId, error: ErrorPtr },
    #[error("{0}")]
    Custom(ErrorPtr),
}

impl InstanceProviderError {
    /// Wraps any user error, so it can be returned from bean constructors.
    pub fn custom<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Custom(Arc::new(error))
    }
}

/// Error related to building bean registries.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum RegistryError {
    #[error("Attempted to register a duplicated bean: {0}")]
    DuplicateBean(BeanId),
    #[error("Attempted to register a duplicated observer method: {0}")]
    DuplicateObserver(ObserverId),
    #[error("Missing declaring bean {declaring_bean} for: {declared}")]
    MissingDeclaringBean {
        declared: String,
        declaring_bean: BeanId,
    },
    #[error("Bean {bean} specializes missing bean: {specialized}")]
    MissingSpecializedBean { bean: BeanId, specialized: BeanId },
    #[error("Bean {bean} cannot specialize {specialized}: {reason}")]
    InvalidSpecialization {
        bean: BeanId,
        specialized: BeanId,
        reason: String,
    },
    #[error("Conditional observer {0} cannot be declared by a dependent bean")]
    ConditionalObserverOnDependentBean(ObserverId),
}

/// Errors related to event notification.
#[derive(Error, Clone, Debug)]
pub enum NotificationError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Cannot obtain receiver instance for observer {observer}: {error} (earlier failures: {})", .suppressed.len())]
    Receiver {
        observer: ObserverId,
        error: InstanceProviderError,
        suppressed: Vec<ErrorPtr>,
    },
    #[error("Observer {observer} failed: {error} (further failures: {})", .suppressed.len())]
    ObserverFailed {
        observer: ObserverId,
        error: ErrorPtr,
        suppressed: Vec<ErrorPtr>,
    },
}

/// A single injection point which failed validation.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct DeploymentProblem {
    pub bean: BeanId,
    pub member: String,
    pub error: ResolutionError,
}

impl Display for DeploymentProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}: {}", self.bean, self.member, self.error)
    }
}

/// Aggregate of all problems found while validating a deployment.
#[derive(Error, Clone, Eq, PartialEq, Debug)]
#[error("Deployment validation failed: {}", .problems.iter().join("; "))]
pub struct DeploymentError {
    pub problems: Vec<DeploymentProblem>,
}

/// Errors reported by [TransactionServices](crate::event::TransactionServices) when registering
/// synchronizations.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum SynchronizationError {
    #[error("No transaction is active")]
    NoTransaction,
    #[error("Transaction is marked for rollback")]
    RollbackOnly,
    #[error("Cannot register synchronization: {0}")]
    Other(String),
}
