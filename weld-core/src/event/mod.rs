//! Events are arbitrary objects delivered to matching [ObserverMethod]s. Observers are resolved
//! by event type and qualifiers, ordered by priority, and notified either immediately or, when
//! declaring a [TransactionPhase] other than [InProgress](TransactionPhase::InProgress), at the
//! matching phase of the current transaction.

mod notifier;
mod transaction;

pub use notifier::{NotificationOptions, ObserverNotifier};
pub use transaction::{Synchronization, TransactionServices, TransactionStatus};
#[cfg(test)]
pub use transaction::MockTransactionServices;

use crate::bean::{BeanId, InjectionPoint, ObserverId};
use crate::instance_provider::{ErrorPtr, InstanceAnyPtr};
use crate::qualifier::{Qualifier, QualifierSet};
use crate::types::Type;
use derivative::Derivative;
use std::any::Any;
use std::sync::Arc;

/// Default priority of observers without an explicit one.
pub const DEFAULT_OBSERVER_PRIORITY: i32 = 2500;

pub type EventPtr = Arc<dyn Any + Send + Sync>;

/// Decides whether an observer is notified when its declaring bean has no instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Reception {
    /// The declaring bean is instantiated if needed.
    #[default]
    Always,
    /// The observer is skipped when no instance of the declaring bean exists.
    IfExists,
}

/// Moment of observer notification relative to the current transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransactionPhase {
    #[default]
    InProgress,
    BeforeCompletion,
    AfterCompletion,
    AfterFailure,
    AfterSuccess,
}

impl TransactionPhase {
    #[inline]
    pub fn is_transactional(self) -> bool {
        self != TransactionPhase::InProgress
    }

    /// Order used when transactional observers need to be notified immediately.
    pub(crate) fn fallback_rank(self) -> u8 {
        match self {
            TransactionPhase::InProgress => 0,
            TransactionPhase::BeforeCompletion => 1,
            TransactionPhase::AfterCompletion => 2,
            TransactionPhase::AfterFailure => 3,
            TransactionPhase::AfterSuccess => 4,
        }
    }
}

/// Information about a fired event, available to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventMetadata {
    event_type: Type,
    qualifiers: QualifierSet,
    injection_point: Option<InjectionPoint>,
}

impl EventMetadata {
    pub fn new(
        event_type: Type,
        qualifiers: QualifierSet,
        injection_point: Option<InjectionPoint>,
    ) -> Self {
        Self {
            event_type,
            qualifiers,
            injection_point,
        }
    }

    #[inline]
    pub fn event_type(&self) -> &Type {
        &self.event_type
    }

    /// All qualifiers of the event, including the built-in ones.
    #[inline]
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    /// The injection point of the event handle used to fire the event, if any.
    #[inline]
    pub fn injection_point(&self) -> Option<&InjectionPoint> {
        self.injection_point.as_ref()
    }
}

/// A fired event with its metadata.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct EventContext {
    #[derivative(Debug = "ignore")]
    event: EventPtr,
    metadata: EventMetadata,
}

impl EventContext {
    pub fn new(event: EventPtr, metadata: EventMetadata) -> Self {
        Self { event, metadata }
    }

    #[inline]
    pub fn event(&self) -> &EventPtr {
        &self.event
    }

    /// Returns the event payload, if it is of given type.
    pub fn event_typed<T: Any>(&self) -> Option<&T> {
        self.event.downcast_ref()
    }

    #[inline]
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

pub type NotifyFn =
    dyn Fn(&EventContext, Option<&InstanceAnyPtr>) -> Result<(), ErrorPtr> + Send + Sync;

/// A method observing events of a given type and qualifiers.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ObserverMethod {
    id: ObserverId,
    observed_type: Type,
    qualifiers: QualifierSet,
    reception: Reception,
    transaction_phase: TransactionPhase,
    priority: Option<i32>,
    asynchronous: bool,
    declaring_bean: Option<BeanId>,
    #[derivative(Debug = "ignore")]
    notify: Arc<NotifyFn>,
}

pub type ObserverPtr = Arc<ObserverMethod>;

impl ObserverMethod {
    /// Creates a builder for an observer. The notify function receives the event and, for
    /// observers with a declaring bean, an instance of that bean.
    pub fn builder<I, F>(id: I, observed_type: Type, notify: F) -> ObserverMethodBuilder
    where
        I: Into<ObserverId>,
        F: Fn(&EventContext, Option<&InstanceAnyPtr>) -> Result<(), ErrorPtr>
            + Send
            + Sync
            + 'static,
    {
        ObserverMethodBuilder {
            observer: ObserverMethod {
                id: id.into(),
                observed_type,
                qualifiers: Default::default(),
                reception: Default::default(),
                transaction_phase: Default::default(),
                priority: None,
                asynchronous: false,
                declaring_bean: None,
                notify: Arc::new(notify),
            },
        }
    }

    #[inline]
    pub fn id(&self) -> &ObserverId {
        &self.id
    }

    #[inline]
    pub fn observed_type(&self) -> &Type {
        &self.observed_type
    }

    /// Qualifiers an event needs to have for this observer to be notified.
    #[inline]
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    #[inline]
    pub fn reception(&self) -> Reception {
        self.reception
    }

    #[inline]
    pub fn transaction_phase(&self) -> TransactionPhase {
        self.transaction_phase
    }

    #[inline]
    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    #[inline]
    pub fn is_async(&self) -> bool {
        self.asynchronous
    }

    #[inline]
    pub fn declaring_bean(&self) -> Option<&BeanId> {
        self.declaring_bean.as_ref()
    }

    pub fn notify(
        &self,
        context: &EventContext,
        receiver: Option<&InstanceAnyPtr>,
    ) -> Result<(), ErrorPtr> {
        (self.notify)(context, receiver)
    }
}

pub struct ObserverMethodBuilder {
    observer: ObserverMethod,
}

impl ObserverMethodBuilder {
    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.observer.qualifiers.insert(qualifier);
        self
    }

    pub fn reception(mut self, reception: Reception) -> Self {
        self.observer.reception = reception;
        self
    }

    pub fn transaction_phase(mut self, phase: TransactionPhase) -> Self {
        self.observer.transaction_phase = phase;
        self
    }

    /// Lower priorities are notified first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.observer.priority = Some(priority);
        self
    }

    /// Marks the observer as only receiving asynchronously fired events.
    pub fn asynchronous(mut self) -> Self {
        self.observer.asynchronous = true;
        self
    }

    /// Sets the bean whose instance receives notifications.
    pub fn declaring_bean<I: Into<BeanId>>(mut self, bean: I) -> Self {
        self.observer.declaring_bean = Some(bean.into());
        self
    }

    pub fn build(self) -> ObserverMethod {
        self.observer
    }
}
