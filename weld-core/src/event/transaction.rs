use crate::creational::CreationalContext;
use crate::error::SynchronizationError;
use crate::event::{EventContext, ObserverPtr, TransactionPhase};
use crate::instance_provider::{ErrorPtr, InstanceAnyPtr};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::error;

/// Final outcome of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Committed,
    RolledBack,
}

/// Callback invoked around transaction completion.
pub trait Synchronization: Send + Sync {
    fn before_completion(&self);

    fn after_completion(&self, status: TransactionStatus);
}

/// Integration point with an external transaction manager.
#[cfg_attr(test, automock)]
pub trait TransactionServices: Send + Sync {
    fn is_transaction_active(&self) -> bool;

    fn register_synchronization(
        &self,
        synchronization: Box<dyn Synchronization>,
    ) -> Result<(), SynchronizationError>;
}

/// A single observer notification postponed until a transaction phase.
pub(crate) struct DeferredNotification {
    observer: ObserverPtr,
    context: EventContext,
    receiver: Option<InstanceAnyPtr>,
    creational_context: CreationalContext,
}

impl DeferredNotification {
    pub(crate) fn new(
        observer: ObserverPtr,
        context: EventContext,
        receiver: Option<InstanceAnyPtr>,
        creational_context: CreationalContext,
    ) -> Self {
        Self {
            observer,
            context,
            receiver,
            creational_context,
        }
    }

    #[inline]
    pub(crate) fn observer(&self) -> &ObserverPtr {
        &self.observer
    }

    pub(crate) fn run(&self) -> Result<(), ErrorPtr> {
        let result = self
            .observer
            .notify(&self.context, self.receiver.as_ref());
        self.creational_context.release();
        result
    }
}

/// Synchronization notifying deferred observers at their phases.
pub(crate) struct TransactionalNotifications {
    notifications: Arc<[DeferredNotification]>,
}

impl TransactionalNotifications {
    pub(crate) fn new(notifications: Arc<[DeferredNotification]>) -> Self {
        Self { notifications }
    }

    fn run_matching<F: Fn(TransactionPhase) -> bool>(&self, filter: F) {
        for notification in self
            .notifications
            .iter()
            .filter(|notification| filter(notification.observer.transaction_phase()))
        {
            if let Err(error) = notification.run() {
                error!(
                    observer = %notification.observer.id(),
                    %error,
                    "Transactional observer failed."
                );
            }
        }
    }
}

impl Synchronization for TransactionalNotifications {
    fn before_completion(&self) {
        self.run_matching(|phase| phase == TransactionPhase::BeforeCompletion);
    }

    fn after_completion(&self, status: TransactionStatus) {
        self.run_matching(|phase| match phase {
            TransactionPhase::AfterCompletion => true,
            TransactionPhase::AfterSuccess => status == TransactionStatus::Committed,
            TransactionPhase::AfterFailure => status != TransactionStatus::Committed,
            _ => false,
        });

        for notification in self.notifications.iter() {
            notification.creational_context.release();
        }
    }
}
