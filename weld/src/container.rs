//! Container bootstrap and lifecycle.

use crate::config::{EnvironmentConfigProvider, WeldConfig, WeldConfigProvider};
use derive_more::Constructor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use weld_core::bean::{Bean, BeanId};
use weld_core::context::{ContextPtr, Scope, APPLICATION_SCOPED};
use weld_core::error::{
    DeploymentError, InstanceProviderError, NotificationError, RegistryError, ResolutionError,
};
use weld_core::event::{ObserverMethod, TransactionServices};
use weld_core::instance::{Event, Instance};
use weld_core::instance_provider::{ErrorPtr, InstancePtr};
use weld_core::manager::{BeanManager, BeanManagerBuilder, UnitOfWork};
use weld_core::qualifier::Qualifier;
use weld_core::registry::{BeanDiscovery, BeanRegistryBuilder, StaticDiscovery};
use weld_core::types::{Class, ClassPtr, Type};

#[derive(Clone, Error, Debug)]
pub enum BootstrapError {
    #[error("Error loading configuration: {0}")]
    Config(ErrorPtr),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error("Error notifying about container initialization: {0}")]
    Initialization(#[from] NotificationError),
}

/// Payload of events fired when a context is initialized or destroyed. Such events carry one of
/// the [initialized], [before_destroyed] or [destroyed] qualifiers.
#[derive(Clone, Debug, Constructor)]
pub struct ContextLifecycleEvent {
    pub scope: Scope,
}

impl ContextLifecycleEvent {
    pub fn event_class() -> ClassPtr {
        Class::new("ContextLifecycleEvent")
    }
}

fn lifecycle_qualifier(kind: &'static str, scope: &Scope) -> Qualifier {
    Qualifier::builder(kind)
        .value("value", scope.name().to_string())
        .build()
}

/// Qualifier of events fired after a context has been initialized.
pub fn initialized(scope: &Scope) -> Qualifier {
    lifecycle_qualifier("Initialized", scope)
}

/// Qualifier of events fired right before a context is destroyed.
pub fn before_destroyed(scope: &Scope) -> Qualifier {
    lifecycle_qualifier("BeforeDestroyed", scope)
}

/// Qualifier of events fired after a context has been destroyed.
pub fn destroyed(scope: &Scope) -> Qualifier {
    lifecycle_qualifier("Destroyed", scope)
}

/// Builder for [WeldContainer]. By default, beans are discovered with [StaticDiscovery] and the
/// config is read from the environment.
pub struct Weld {
    discoveries: Vec<Box<dyn BeanDiscovery>>,
    beans: Vec<Bean>,
    observers: Vec<ObserverMethod>,
    alternatives: Vec<BeanId>,
    config_provider: Box<dyn WeldConfigProvider>,
    contexts: Vec<ContextPtr>,
    transaction_services: Option<Arc<dyn TransactionServices>>,
}

impl Default for Weld {
    fn default() -> Self {
        Self {
            discoveries: vec![Box::new(StaticDiscovery)],
            beans: vec![],
            observers: vec![],
            alternatives: vec![],
            config_provider: Box::new(EnvironmentConfigProvider),
            contexts: vec![],
            transaction_services: None,
        }
    }
}

impl Weld {
    pub fn new() -> Self {
        Default::default()
    }

    /// Removes all discoveries, including the default one.
    pub fn without_discovery(mut self) -> Self {
        self.discoveries.clear();
        self
    }

    pub fn with_discovery(mut self, discovery: Box<dyn BeanDiscovery>) -> Self {
        self.discoveries.push(discovery);
        self
    }

    /// Adds a synthetic bean, next to discovered ones.
    pub fn with_bean(mut self, bean: Bean) -> Self {
        self.beans.push(bean);
        self
    }

    pub fn with_observer(mut self, observer: ObserverMethod) -> Self {
        self.observers.push(observer);
        self
    }

    /// Enables an alternative for this container.
    pub fn enable_alternative<I: Into<BeanId>>(mut self, bean: I) -> Self {
        self.alternatives.push(bean.into());
        self
    }

    pub fn with_config_provider(mut self, config_provider: Box<dyn WeldConfigProvider>) -> Self {
        self.config_provider = config_provider;
        self
    }

    /// Adds a context for a custom scope.
    pub fn with_context(mut self, context: ContextPtr) -> Self {
        self.contexts.push(context);
        self
    }

    pub fn with_transaction_services(
        mut self,
        transaction_services: Arc<dyn TransactionServices>,
    ) -> Self {
        self.transaction_services = Some(transaction_services);
        self
    }

    /// Builds the bean registry, validates the deployment and notifies observers about the
    /// application context being initialized.
    pub fn initialize(self) -> Result<WeldContainer, BootstrapError> {
        let config = self
            .config_provider
            .config()
            .map_err(BootstrapError::Config)?;

        if config.install_tracing_logger {
            install_tracing_logger();
        }

        info!("Discovering beans...");

        let mut registry = BeanRegistryBuilder::new();
        for discovery in &self.discoveries {
            registry = registry.discover(discovery.as_ref())?;
        }

        for bean in self.beans {
            registry.register_bean(bean)?;
        }

        for observer in self.observers {
            registry.register_observer(observer)?;
        }

        for alternative in self.alternatives {
            registry.enable_alternative(alternative);
        }

        registry.register_bean(config.clone().into_bean())?;

        let mut manager = BeanManagerBuilder::new(registry.build()?)
            .with_resolution_cache_size(config.resolution_cache_size)
            .with_default_observer_priority(config.default_observer_priority);

        for context in self.contexts {
            manager = manager.with_context(context);
        }

        if let Some(transaction_services) = self.transaction_services {
            manager = manager.with_transaction_services(transaction_services);
        }

        let manager = manager.build();

        if config.validate_injection_points {
            info!("Validating injection points...");
            manager.validate()?;
        }

        if let Err(error) = fire_lifecycle_event(&manager, initialized(&APPLICATION_SCOPED)) {
            manager.shutdown();
            return Err(error.into());
        }

        info!(
            beans = manager.registry().enabled_beans().count(),
            "Container initialized."
        );

        Ok(WeldContainer {
            manager,
            running: AtomicBool::new(true),
        })
    }
}

/// A running container. Shuts down when dropped.
pub struct WeldContainer {
    manager: BeanManager,
    running: AtomicBool,
}

impl WeldContainer {
    #[inline]
    pub fn manager(&self) -> &BeanManager {
        &self.manager
    }

    /// Returns the config the container has been initialized with.
    pub fn config(&self) -> Result<InstancePtr<WeldConfig>, InstanceProviderError> {
        self.select(Type::class(&WeldConfig::bean_class()), [])?
            .get_typed()
    }

    /// Dynamic lookup of beans of given type and qualifiers.
    pub fn select<Q: IntoIterator<Item = Qualifier>>(
        &self,
        required_type: Type,
        qualifiers: Q,
    ) -> Result<Instance<'_>, ResolutionError> {
        self.manager.select(required_type, qualifiers)
    }

    pub fn event(&self, event_type: Type) -> Event<'_> {
        self.manager.event(event_type)
    }

    pub fn unit_of_work(&self) -> UnitOfWork<'_> {
        self.manager.unit_of_work()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Destroys application and singleton instances, notifying observers before and after.
    /// Subsequent calls do nothing.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down container...");

        if let Err(error) =
            fire_lifecycle_event(&self.manager, before_destroyed(&APPLICATION_SCOPED))
        {
            warn!(%error, "Observer failed before destroying application context.");
        }

        self.manager.shutdown();

        if let Err(error) = fire_lifecycle_event(&self.manager, destroyed(&APPLICATION_SCOPED)) {
            warn!(%error, "Observer failed after destroying application context.");
        }
    }
}

impl Drop for WeldContainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn fire_lifecycle_event(
    manager: &BeanManager,
    qualifier: Qualifier,
) -> Result<(), NotificationError> {
    manager
        .event(Type::class(&ContextLifecycleEvent::event_class()))
        .select([qualifier])
        .fire_typed(ContextLifecycleEvent::new(APPLICATION_SCOPED))
}

fn install_tracing_logger() {
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
    {
        debug!(%error, "Tracing logger already installed.");
    }
}
