use crate::bean::ObserverId;
use crate::creational::CreationalContext;
use crate::error::{InstanceProviderError, NotificationError};
use crate::event::transaction::{DeferredNotification, TransactionalNotifications};
use crate::event::{EventContext, ObserverPtr, Reception, TransactionPhase, TransactionServices};
use crate::instance_provider::{ErrorPtr, InstanceAnyPtr, InstanceProvider};
#[cfg(feature = "async")]
use crate::event::EventPtr;
#[cfg(feature = "async")]
use crate::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Controls how observer failures are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotificationOptions {
    fail_fast: bool,
}

impl NotificationOptions {
    /// Stops notification on the first observer failure instead of collecting all failures.
    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    #[inline]
    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }
}

#[derive(Default)]
struct FailureCollector {
    first: Option<(ObserverId, ErrorPtr)>,
    suppressed: Vec<ErrorPtr>,
}

impl FailureCollector {
    fn add(&mut self, observer: &ObserverId, error: ErrorPtr) {
        match self.first {
            None => self.first = Some((observer.clone(), error)),
            Some(_) => self.suppressed.push(error),
        }
    }

    fn into_errors(self) -> Vec<ErrorPtr> {
        self.first
            .map(|(_, error)| error)
            .into_iter()
            .chain(self.suppressed)
            .collect()
    }

    fn into_result(self) -> Result<(), NotificationError> {
        match self.first {
            Some((observer, error)) => Err(NotificationError::ObserverFailed {
                observer,
                error,
                suppressed: self.suppressed,
            }),
            None => Ok(()),
        }
    }
}

enum Abort {
    Receiver(ObserverId, InstanceProviderError),
    Observer(ObserverId, ErrorPtr),
}

struct Receiver {
    instance: Option<InstanceAnyPtr>,
    creational_context: CreationalContext,
}

/// Delivers events to resolved observers.
#[derive(Default, Clone)]
pub struct ObserverNotifier {
    transaction_services: Option<Arc<dyn TransactionServices>>,
}

impl ObserverNotifier {
    pub fn new(transaction_services: Option<Arc<dyn TransactionServices>>) -> Self {
        Self {
            transaction_services,
        }
    }

    /// Notifies synchronous observers, in the given order. Transactional observers are deferred
    /// to their phase when a transaction is active.
    pub fn notify(
        &self,
        observers: &[ObserverPtr],
        context: &EventContext,
        provider: &dyn InstanceProvider,
        options: NotificationOptions,
    ) -> Result<(), NotificationError> {
        let transaction_active = self
            .transaction_services
            .as_ref()
            .map(|services| services.is_transaction_active())
            .unwrap_or(false);

        let mut failures = FailureCollector::default();
        let mut deferred = vec![];
        let mut aborted = None;

        for observer in observers.iter().filter(|observer| !observer.is_async()) {
            let receiver = match acquire_receiver(observer, provider) {
                Ok(Some(receiver)) => receiver,
                Ok(None) => continue,
                Err(error) => {
                    aborted = Some(Abort::Receiver(observer.id().clone(), error));
                    break;
                }
            };

            if transaction_active && observer.transaction_phase().is_transactional() {
                deferred.push(DeferredNotification::new(
                    observer.clone(),
                    context.clone(),
                    receiver.instance,
                    receiver.creational_context,
                ));
                continue;
            }

            let result = observer.notify(context, receiver.instance.as_ref());
            receiver.creational_context.release();

            if let Err(error) = result {
                if options.is_fail_fast() {
                    aborted = Some(Abort::Observer(observer.id().clone(), error));
                    break;
                }

                failures.add(observer.id(), error);
            }
        }

        // observers queued before an abort still belong to the transaction
        let deferral = if deferred.is_empty() {
            Ok(())
        } else {
            self.defer(deferred.into(), &mut failures, options)
        };

        match aborted {
            Some(Abort::Receiver(observer, error)) => Err(NotificationError::Receiver {
                observer,
                error,
                suppressed: failures.into_errors(),
            }),
            Some(Abort::Observer(observer, error)) => Err(NotificationError::ObserverFailed {
                observer,
                error,
                suppressed: vec![],
            }),
            None => {
                deferral?;
                failures.into_result()
            }
        }
    }

    fn defer(
        &self,
        deferred: Arc<[DeferredNotification]>,
        failures: &mut FailureCollector,
        options: NotificationOptions,
    ) -> Result<(), NotificationError> {
        let Some(services) = &self.transaction_services else {
            return Ok(());
        };

        debug!(count = deferred.len(), "Deferring transactional observers.");

        let registration = services.register_synchronization(Box::new(
            TransactionalNotifications::new(deferred.clone()),
        ));

        let Err(error) = registration else {
            return Ok(());
        };

        warn!(%error, "Cannot register transaction synchronization - notifying transactional observers immediately.");

        let mut fallback: Vec<&DeferredNotification> = deferred
            .iter()
            .filter(|notification| {
                notification.observer().transaction_phase() != TransactionPhase::AfterSuccess
            })
            .collect();
        fallback.sort_by_key(|notification| {
            notification.observer().transaction_phase().fallback_rank()
        });

        for notification in fallback {
            if let Err(error) = notification.run() {
                if options.is_fail_fast() {
                    return Err(NotificationError::ObserverFailed {
                        observer: notification.observer().id().clone(),
                        error,
                        suppressed: vec![],
                    });
                }

                failures.add(notification.observer().id(), error);
            }
        }

        Ok(())
    }
}

#[cfg(feature = "async")]
impl ObserverNotifier {
    /// Notifies asynchronous observers, in the given order. Receivers are obtained immediately,
    /// while observers are notified when the returned future is polled. The future completes
    /// with the event, or with the first failure and all further ones suppressed.
    pub fn notify_async(
        &self,
        observers: &[ObserverPtr],
        context: EventContext,
        provider: &dyn InstanceProvider,
    ) -> BoxFuture<'static, Result<EventPtr, NotificationError>> {
        let receivers: Result<Vec<_>, NotificationError> = observers
            .iter()
            .filter(|observer| observer.is_async())
            .filter_map(|observer| {
                acquire_receiver(observer, provider)
                    .map_err(|error| NotificationError::Receiver {
                        observer: observer.id().clone(),
                        error,
                        suppressed: vec![],
                    })
                    .transpose()
                    .map(|receiver| receiver.map(|receiver| (observer.clone(), receiver)))
            })
            .collect();

        async move {
            let mut failures = FailureCollector::default();
            for (observer, receiver) in receivers? {
                let result = observer.notify(&context, receiver.instance.as_ref());
                receiver.creational_context.release();

                if let Err(error) = result {
                    failures.add(observer.id(), error);
                }
            }

            failures
                .into_result()
                .map(|_| context.event().clone())
        }
        .boxed()
    }
}

/// Obtains the instance receiving the notification. Returns `None` if a conditional observer
/// should be skipped.
fn acquire_receiver(
    observer: &ObserverPtr,
    provider: &dyn InstanceProvider,
) -> Result<Option<Receiver>, InstanceProviderError> {
    let creational_context = CreationalContext::new(None);
    let Some(bean) = observer.declaring_bean() else {
        return Ok(Some(Receiver {
            instance: None,
            creational_context,
        }));
    };

    let instance = match observer.reception() {
        Reception::IfExists => provider.existing_reference(bean),
        Reception::Always => provider
            .reference(bean, &creational_context)
            .map(Some),
    }?;

    Ok(instance.map(|instance| Receiver {
        instance: Some(instance),
        creational_context,
    }))
}
