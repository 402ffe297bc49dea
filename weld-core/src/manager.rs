//! The [BeanManager] ties the registry, resolvers, contexts and the observer notifier together
//! and provides contextual references to beans.
//!
//! Request, session and conversation contexts are not global. They belong to a [UnitOfWork],
//! which layers them over the manager's application, singleton and dependent contexts:
//!
//! ```
//! use weld_core::bean::Bean;
//! use weld_core::context::{BeanStore, REQUEST_SCOPED};
//! use weld_core::creational::CreationalContext;
//! use weld_core::instance_provider::TypedInstanceProvider;
//! use weld_core::manager::BeanManagerBuilder;
//! use weld_core::registry::BeanRegistryBuilder;
//! use weld_core::types::{Class, Type};
//! use std::sync::Arc;
//!
//! struct Request(u32);
//!
//! let class = Class::new("Request");
//! let registry = BeanRegistryBuilder::new()
//!     .with_bean(
//!         Bean::builder(Type::class(&class), |_, _| Ok(Request(7)))
//!             .scope(REQUEST_SCOPED)
//!             .build(),
//!     )
//!     .and_then(|builder| builder.build())
//!     .unwrap();
//! let manager = BeanManagerBuilder::new(registry).build();
//!
//! let unit = manager
//!     .unit_of_work()
//!     .with_session(Arc::new(BeanStore::new()))
//!     .unwrap();
//! let request = unit
//!     .reference_typed::<Request>(&"Request".into(), &CreationalContext::new(None))
//!     .unwrap();
//! assert_eq!(request.0, 7);
//! ```

use crate::bean::{BeanId, BeanPtr, ContextualPtr, InjectionPoint};
use crate::context::{
    BeanStorePtr, Context, ContextPtr, Creation, DependentContext, ManagedContext, Scope,
    APPLICATION_SCOPED, CONVERSATION_SCOPED, DEPENDENT, REQUEST_SCOPED, SESSION_SCOPED, SINGLETON,
};
use crate::creational::CreationalContext;
use crate::error::{
    ContextError, DeploymentError, DeploymentProblem, InstanceProviderError, NotificationError,
    ResolutionError,
};
use crate::event::{
    EventContext, EventMetadata, EventPtr, NotificationOptions, ObserverNotifier,
    TransactionServices, DEFAULT_OBSERVER_PRIORITY,
};
use crate::instance::{Event, Instance};
use crate::instance_provider::{InstanceAnyPtr, InstanceProvider};
use crate::qualifier::Qualifier;
use crate::registry::BeanRegistry;
use crate::resolution::{
    BeanSetPtr, ObserverSetPtr, Resolvable, ResolvableBuilder, TypeSafeBeanResolver,
    TypeSafeObserverResolver, DEFAULT_RESOLUTION_CACHE_SIZE,
};
use crate::types::Type;
use fxhash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[cfg(feature = "async")]
use crate::future::BoxFuture;

/// Finds the context responsible for a scope.
pub trait ContextResolver {
    /// Returns the context for given scope. Inactive contexts are returned as well.
    fn context(&self, scope: &Scope) -> Result<ContextPtr, ContextError>;
}

/// Builder for [BeanManager] with sensible defaults.
pub struct BeanManagerBuilder {
    registry: BeanRegistry,
    contexts: Vec<ContextPtr>,
    transaction_services: Option<Arc<dyn TransactionServices>>,
    resolution_cache_size: usize,
    default_observer_priority: i32,
}

impl BeanManagerBuilder {
    pub fn new(registry: BeanRegistry) -> Self {
        Self {
            registry,
            contexts: vec![],
            transaction_services: None,
            resolution_cache_size: DEFAULT_RESOLUTION_CACHE_SIZE,
            default_observer_priority: DEFAULT_OBSERVER_PRIORITY,
        }
    }

    /// Adds a context for a custom scope. Built-in scopes cannot be overridden.
    pub fn with_context(mut self, context: ContextPtr) -> Self {
        self.contexts.push(context);
        self
    }

    /// Sets the transaction integration used for transactional observers.
    pub fn with_transaction_services(
        mut self,
        transaction_services: Arc<dyn TransactionServices>,
    ) -> Self {
        self.transaction_services = Some(transaction_services);
        self
    }

    /// Sets the maximum number of cached results of each resolver.
    pub fn with_resolution_cache_size(mut self, resolution_cache_size: usize) -> Self {
        self.resolution_cache_size = resolution_cache_size;
        self
    }

    /// Sets the priority of observers without an explicit one.
    pub fn with_default_observer_priority(mut self, default_observer_priority: i32) -> Self {
        self.default_observer_priority = default_observer_priority;
        self
    }

    pub fn build(self) -> BeanManager {
        let registry = Arc::new(self.registry);
        let contexts = self
            .contexts
            .into_iter()
            .map(|context| (context.scope().clone(), context))
            .collect();

        BeanManager {
            bean_resolver: TypeSafeBeanResolver::new(registry.clone(), self.resolution_cache_size),
            observer_resolver: TypeSafeObserverResolver::new(
                registry.clone(),
                self.resolution_cache_size,
                self.default_observer_priority,
            ),
            notifier: ObserverNotifier::new(self.transaction_services),
            application_context: Arc::new(ManagedContext::active(APPLICATION_SCOPED)),
            singleton_context: Arc::new(ManagedContext::active(SINGLETON)),
            dependent_context: Arc::new(DependentContext),
            contexts,
            registry,
        }
    }
}

/// Entry point to beans, contexts and events of a deployment.
pub struct BeanManager {
    registry: Arc<BeanRegistry>,
    bean_resolver: TypeSafeBeanResolver,
    observer_resolver: TypeSafeObserverResolver,
    notifier: ObserverNotifier,
    application_context: Arc<ManagedContext>,
    singleton_context: Arc<ManagedContext>,
    dependent_context: ContextPtr,
    contexts: FxHashMap<Scope, ContextPtr>,
}

impl BeanManager {
    #[inline]
    pub fn registry(&self) -> &Arc<BeanRegistry> {
        &self.registry
    }

    #[inline]
    pub fn application_context(&self) -> &Arc<ManagedContext> {
        &self.application_context
    }

    #[inline]
    pub fn singleton_context(&self) -> &Arc<ManagedContext> {
        &self.singleton_context
    }

    /// Returns all enabled beans matching given type and qualifiers, after alternative
    /// selection.
    pub fn beans<Q: IntoIterator<Item = Qualifier>>(
        &self,
        required_type: Type,
        qualifiers: Q,
    ) -> Result<BeanSetPtr, ResolutionError> {
        let resolvable = ResolvableBuilder::new(required_type)
            .qualifiers(qualifiers)
            .build()?;
        Ok(self.bean_resolver.resolve(&resolvable))
    }

    /// Resolves a single bean, failing if the resolvable is unsatisfied or ambiguous.
    pub fn resolve(&self, resolvable: &Resolvable) -> Result<BeanPtr, ResolutionError> {
        self.bean_resolver.resolve_unique(resolvable)
    }

    /// Resolves all beans for given resolvable, without failing on ambiguity.
    pub fn resolve_all(&self, resolvable: &Resolvable) -> BeanSetPtr {
        self.bean_resolver.resolve(resolvable)
    }

    pub fn resolve_by_name(&self, name: &str) -> Result<BeanPtr, ResolutionError> {
        self.bean_resolver.resolve_by_name(name)
    }

    /// Returns observers which would be notified about given event, in notification order.
    pub fn resolve_observer_methods<Q: IntoIterator<Item = Qualifier>>(
        &self,
        event_type: &Type,
        qualifiers: Q,
    ) -> Result<ObserverSetPtr, ResolutionError> {
        let resolvable = Resolvable::for_event(event_type, qualifiers)?;
        Ok(self.observer_resolver.resolve(&resolvable))
    }

    /// Creates a new root creational context.
    pub fn create_creational_context(&self, contextual: Option<BeanId>) -> CreationalContext {
        CreationalContext::new(contextual)
    }

    /// Fires an event synchronously, collecting observer failures.
    pub fn fire_event<Q: IntoIterator<Item = Qualifier>>(
        &self,
        event: EventPtr,
        event_type: &Type,
        qualifiers: Q,
    ) -> Result<(), NotificationError> {
        self.notify(
            self,
            event,
            event_type,
            qualifiers,
            None,
            NotificationOptions::default(),
        )
    }

    /// Creates a dynamic lookup handle for given type and qualifiers.
    pub fn select<Q: IntoIterator<Item = Qualifier>>(
        &self,
        required_type: Type,
        qualifiers: Q,
    ) -> Result<Instance<'_>, ResolutionError> {
        Instance::new(self, self, self, required_type, qualifiers)
    }

    /// Creates a handle for firing events of given type.
    pub fn event(&self, event_type: Type) -> Event<'_> {
        Event::new(self, self, event_type)
    }

    /// Starts a unit of work with an active request context.
    pub fn unit_of_work(&self) -> UnitOfWork<'_> {
        UnitOfWork::new(self)
    }

    /// Checks all declared injection points of enabled beans, reporting every unsatisfied or
    /// ambiguous one.
    pub fn validate(&self) -> Result<(), DeploymentError> {
        let problems: Vec<DeploymentProblem> = self
            .registry
            .enabled_beans()
            .flat_map(|bean| {
                bean.injection_points()
                    .iter()
                    .filter_map(move |injection_point| {
                        ResolvableBuilder::from_injection_point(injection_point)
                            .build()
                            .and_then(|resolvable| self.resolve(&resolvable))
                            .err()
                            .map(|error| DeploymentProblem {
                                bean: bean.id().clone(),
                                member: injection_point.member().to_string(),
                                error,
                            })
                    })
            })
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(DeploymentError { problems })
        }
    }

    /// Destroys application and singleton instances and clears resolution caches. Subsequent
    /// calls do nothing.
    pub fn shutdown(&self) {
        debug!("Shutting down bean manager.");

        self.application_context.invalidate();
        self.singleton_context.invalidate();
        self.bean_resolver.clear();
        self.observer_resolver.clear();
    }

    pub(crate) fn notify<Q: IntoIterator<Item = Qualifier>>(
        &self,
        provider: &dyn InstanceProvider,
        event: EventPtr,
        event_type: &Type,
        qualifiers: Q,
        injection_point: Option<InjectionPoint>,
        options: NotificationOptions,
    ) -> Result<(), NotificationError> {
        let (observers, context) =
            self.event_context(event, event_type, qualifiers, injection_point)?;
        self.notifier
            .notify(&observers, &context, provider, options)
    }

    #[cfg(feature = "async")]
    pub(crate) fn notify_async<Q: IntoIterator<Item = Qualifier>>(
        &self,
        provider: &dyn InstanceProvider,
        event: EventPtr,
        event_type: &Type,
        qualifiers: Q,
        injection_point: Option<InjectionPoint>,
    ) -> BoxFuture<'static, Result<EventPtr, NotificationError>> {
        use crate::future::FutureExt;

        match self.event_context(event, event_type, qualifiers, injection_point) {
            Ok((observers, context)) => self.notifier.notify_async(&observers, context, provider),
            Err(error) => futures::future::ready(Err(error)).boxed(),
        }
    }

    fn event_context<Q: IntoIterator<Item = Qualifier>>(
        &self,
        event: EventPtr,
        event_type: &Type,
        qualifiers: Q,
        injection_point: Option<InjectionPoint>,
    ) -> Result<(ObserverSetPtr, EventContext), NotificationError> {
        let resolvable = Resolvable::for_event(event_type, qualifiers)?;
        let observers = self.observer_resolver.resolve(&resolvable);

        trace!(event_type = %event_type, observers = observers.len(), "Firing event.");

        let metadata = EventMetadata::new(
            event_type.clone(),
            resolvable.qualifiers().clone(),
            injection_point,
        );

        Ok((observers, EventContext::new(event, metadata)))
    }

    fn global_context(&self, scope: &Scope) -> Result<ContextPtr, ContextError> {
        if scope == &APPLICATION_SCOPED {
            return Ok(self.application_context.clone());
        }

        if scope == &SINGLETON {
            return Ok(self.singleton_context.clone());
        }

        if scope == &DEPENDENT {
            return Ok(self.dependent_context.clone());
        }

        if let Some(context) = self.contexts.get(scope) {
            return Ok(context.clone());
        }

        if scope == &REQUEST_SCOPED || scope == &SESSION_SCOPED || scope == &CONVERSATION_SCOPED {
            return Err(ContextError::ContextNotActive(scope.to_string()));
        }

        Err(ContextError::NoContext(scope.to_string()))
    }

    /// Obtains an instance of given bean from its context, creating it when needed. Dependent
    /// instances are registered with the given creational context.
    fn contextual_reference(
        &self,
        bean: &BeanPtr,
        creational_context: &CreationalContext,
        contexts: &dyn ContextResolver,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        if let Some(incomplete) = creational_context.incomplete_instance(bean.id()) {
            return Ok(incomplete);
        }

        if creational_context.is_under_construction(bean.id()) {
            return Err(InstanceProviderError::DependencyCycle(bean.id().clone()));
        }

        let context = contexts.context(bean.scope())?;
        let child = if bean.is_dependent() {
            creational_context.child(bean.id())
        } else {
            creational_context.detached(bean.id())
        };

        let contextual: ContextualPtr = bean.clone();
        context
            .get(
                &contextual,
                Some(Creation {
                    creational_context: &child,
                    provider,
                }),
            )?
            .ok_or_else(|| InstanceProviderError::UnknownBean(bean.id().clone()))
    }

    fn registered_bean(&self, bean: &BeanId) -> Result<&BeanPtr, InstanceProviderError> {
        self.registry
            .bean(bean)
            .ok_or_else(|| InstanceProviderError::UnknownBean(bean.clone()))
    }

    pub(crate) fn reference_in(
        &self,
        bean: &BeanId,
        creational_context: &CreationalContext,
        contexts: &dyn ContextResolver,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        let bean = self.registered_bean(bean)?;
        self.contextual_reference(bean, creational_context, contexts, provider)
    }

    pub(crate) fn injectable_reference_in(
        &self,
        injection_point: &InjectionPoint,
        creational_context: &CreationalContext,
        contexts: &dyn ContextResolver,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        let resolvable = ResolvableBuilder::from_injection_point(injection_point).build()?;
        let bean = self.resolve(&resolvable)?;
        self.contextual_reference(&bean, creational_context, contexts, provider)
    }

    pub(crate) fn references_in(
        &self,
        resolvable: &Resolvable,
        creational_context: &CreationalContext,
        contexts: &dyn ContextResolver,
        provider: &dyn InstanceProvider,
    ) -> Result<Vec<InstanceAnyPtr>, InstanceProviderError> {
        self.resolve_all(resolvable)
            .iter()
            .map(|bean| self.contextual_reference(bean, creational_context, contexts, provider))
            .collect()
    }

    pub(crate) fn reference_by_name_in(
        &self,
        name: &str,
        creational_context: &CreationalContext,
        contexts: &dyn ContextResolver,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        let bean = self.resolve_by_name(name)?;
        self.contextual_reference(&bean, creational_context, contexts, provider)
    }

    pub(crate) fn existing_reference_in(
        &self,
        bean: &BeanId,
        contexts: &dyn ContextResolver,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError> {
        let bean = self.registered_bean(bean)?;
        if bean.is_dependent() {
            return Ok(None);
        }

        let context = match contexts.context(bean.scope()) {
            Ok(context) => context,
            Err(ContextError::ContextNotActive(_)) => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        if !context.is_active() {
            return Ok(None);
        }

        let contextual: ContextualPtr = bean.clone();
        context.get(&contextual, None)
    }
}

impl ContextResolver for BeanManager {
    fn context(&self, scope: &Scope) -> Result<ContextPtr, ContextError> {
        self.global_context(scope)
    }
}

impl InstanceProvider for BeanManager {
    fn reference(
        &self,
        bean: &BeanId,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        self.reference_in(bean, creational_context, self, self)
    }

    fn injectable_reference(
        &self,
        injection_point: &InjectionPoint,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        self.injectable_reference_in(injection_point, creational_context, self, self)
    }

    fn references(
        &self,
        resolvable: &Resolvable,
        creational_context: &CreationalContext,
    ) -> Result<Vec<InstanceAnyPtr>, InstanceProviderError> {
        self.references_in(resolvable, creational_context, self, self)
    }

    fn reference_by_name(
        &self,
        name: &str,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        self.reference_by_name_in(name, creational_context, self, self)
    }

    fn existing_reference(
        &self,
        bean: &BeanId,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError> {
        self.existing_reference_in(bean, self)
    }
}

/// A bounded piece of work, e.g. handling a single request. Owns the request context and
/// optionally attaches session and conversation stores, which outlive the unit of work and may be
/// shared by concurrent units. Ending the unit destroys request-scoped instances and detaches
/// the other stores.
pub struct UnitOfWork<'a> {
    manager: &'a BeanManager,
    request: Arc<ManagedContext>,
    session: Arc<ManagedContext>,
    conversation: Arc<ManagedContext>,
}

impl<'a> UnitOfWork<'a> {
    fn new(manager: &'a BeanManager) -> Self {
        debug!("Starting unit of work.");

        Self {
            manager,
            request: Arc::new(ManagedContext::active(REQUEST_SCOPED)),
            session: Arc::new(ManagedContext::new(SESSION_SCOPED)),
            conversation: Arc::new(ManagedContext::new(CONVERSATION_SCOPED)),
        }
    }

    #[inline]
    pub fn manager(&self) -> &'a BeanManager {
        self.manager
    }

    /// Attaches a session store.
    pub fn with_session(self, store: BeanStorePtr) -> Result<Self, ContextError> {
        self.session.activate_with(store)?;
        Ok(self)
    }

    /// Attaches a conversation store.
    pub fn with_conversation(self, store: BeanStorePtr) -> Result<Self, ContextError> {
        self.conversation.activate_with(store)?;
        Ok(self)
    }

    #[inline]
    pub fn request_context(&self) -> &Arc<ManagedContext> {
        &self.request
    }

    #[inline]
    pub fn session_context(&self) -> &Arc<ManagedContext> {
        &self.session
    }

    #[inline]
    pub fn conversation_context(&self) -> &Arc<ManagedContext> {
        &self.conversation
    }

    /// Destroys all session-scoped instances of the attached store. The store cannot be used
    /// afterwards.
    pub fn invalidate_session(&self) {
        self.session.invalidate();
    }

    pub fn select<Q: IntoIterator<Item = Qualifier>>(
        &self,
        required_type: Type,
        qualifiers: Q,
    ) -> Result<Instance<'_>, ResolutionError> {
        Instance::new(self.manager, self, self, required_type, qualifiers)
    }

    pub fn event(&self, event_type: Type) -> Event<'_> {
        Event::new(self.manager, self, event_type)
    }

    /// Ends the unit of work.
    pub fn end(self) {}
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        debug!("Ending unit of work.");

        self.request.invalidate();
        for context in [&self.session, &self.conversation] {
            if context.is_active() {
                // the store stays intact for the next unit of work
                let _ = context.deactivate();
            }
        }
    }
}

impl ContextResolver for UnitOfWork<'_> {
    fn context(&self, scope: &Scope) -> Result<ContextPtr, ContextError> {
        if scope == &REQUEST_SCOPED {
            return Ok(self.request.clone());
        }

        if scope == &SESSION_SCOPED {
            return Ok(self.session.clone());
        }

        if scope == &CONVERSATION_SCOPED {
            return Ok(self.conversation.clone());
        }

        self.manager.global_context(scope)
    }
}

impl InstanceProvider for UnitOfWork<'_> {
    fn reference(
        &self,
        bean: &BeanId,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        self.manager
            .reference_in(bean, creational_context, self, self)
    }

    fn injectable_reference(
        &self,
        injection_point: &InjectionPoint,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        self.manager
            .injectable_reference_in(injection_point, creational_context, self, self)
    }

    fn references(
        &self,
        resolvable: &Resolvable,
        creational_context: &CreationalContext,
    ) -> Result<Vec<InstanceAnyPtr>, InstanceProviderError> {
        self.manager
            .references_in(resolvable, creational_context, self, self)
    }

    fn reference_by_name(
        &self,
        name: &str,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        self.manager
            .reference_by_name_in(name, creational_context, self, self)
    }

    fn existing_reference(
        &self,
        bean: &BeanId,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError> {
        self.manager.existing_reference_in(bean, self)
    }
}

#[cfg(test)]
mod tests {
    use crate::bean::{Bean, BeanId, InjectionPoint};
    use crate::context::{BeanStore, ContextState, APPLICATION_SCOPED, REQUEST_SCOPED, SESSION_SCOPED};
    use crate::creational::CreationalContext;
    use crate::error::{ContextError, InstanceProviderError, ResolutionError};
    use crate::instance_provider::{InstanceAnyPtr, InstanceProvider, TypedInstanceProvider};
    use crate::manager::{BeanManager, BeanManagerBuilder};
    use crate::registry::BeanRegistryBuilder;
    use crate::types::{Class, Type};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(usize);

    fn manager(beans: Vec<Bean>) -> BeanManager {
        let mut builder = BeanRegistryBuilder::new();
        for bean in beans {
            builder.register_bean(bean).unwrap();
        }

        BeanManagerBuilder::new(builder.build().unwrap()).build()
    }

    fn counting_bean(name: &'static str, scope: crate::context::Scope, created: Arc<AtomicUsize>) -> Bean {
        Bean::builder(Type::class(&Class::new(name)), move |_, _| {
            Ok(Counter(created.fetch_add(1, Ordering::SeqCst)))
        })
        .scope(scope)
        .build()
    }

    #[test]
    fn should_share_application_scoped_instances() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = manager(vec![counting_bean("Service", APPLICATION_SCOPED, created.clone())]);
        let id = BeanId::from("Service");

        let first = manager
            .reference_typed::<Counter>(&id, &CreationalContext::new(None))
            .unwrap();
        let second = manager
            .reference_typed::<Counter>(&id, &CreationalContext::new(None))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_create_new_dependent_instances() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = manager(vec![counting_bean(
            "Helper",
            crate::context::DEPENDENT,
            created.clone(),
        )]);
        let id = BeanId::from("Helper");
        let cc = CreationalContext::new(None);

        manager.reference(&id, &cc).unwrap();
        manager.reference(&id, &cc).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(cc.dependent_instances().len(), 2);
    }

    #[test]
    fn should_reject_request_scope_outside_unit_of_work() {
        let manager = manager(vec![counting_bean(
            "Request",
            REQUEST_SCOPED,
            Default::default(),
        )]);

        assert!(matches!(
            manager.reference(&BeanId::from("Request"), &CreationalContext::new(None)),
            Err(InstanceProviderError::Context(ContextError::ContextNotActive(_)))
        ));
        assert!(manager
            .existing_reference(&BeanId::from("Request"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn should_destroy_request_instances_at_end_of_unit() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let manager = manager(vec![Bean::builder(
            Type::class(&Class::new("Request")),
            |_, _| Ok(Counter(0)),
        )
        .scope(REQUEST_SCOPED)
        .on_destroy(move |_: &Counter| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()]);

        let unit = manager.unit_of_work();
        let id = BeanId::from("Request");
        let first = unit.reference(&id, &CreationalContext::new(None)).unwrap();
        let second = unit.reference(&id, &CreationalContext::new(None)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        unit.end();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn should_share_session_store_between_units() {
        let created = Arc::new(AtomicUsize::new(0));
        let manager = manager(vec![counting_bean("Session", SESSION_SCOPED, created.clone())]);
        let store = Arc::new(BeanStore::new());
        let id = BeanId::from("Session");

        let first = {
            let unit = manager.unit_of_work().with_session(store.clone()).unwrap();
            let instance = unit.reference(&id, &CreationalContext::new(None)).unwrap();
            assert_eq!(unit.session_context().state(), ContextState::Active);
            instance
        };

        let unit = manager.unit_of_work().with_session(store.clone()).unwrap();
        let second = unit.reference(&id, &CreationalContext::new(None)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);

        unit.invalidate_session();
        assert!(store.is_empty());
    }

    #[test]
    fn should_detect_dependency_cycles() {
        let first = Class::new("First");
        let second = Class::new("Second");
        let manager = manager(vec![
            Bean::builder(Type::class(&first), |cc, provider| {
                provider.reference(&BeanId::from("Second"), cc)?;
                Ok(())
            })
            .build(),
            Bean::builder(Type::class(&second), |cc, provider| {
                provider.reference(&BeanId::from("First"), cc)?;
                Ok(())
            })
            .build(),
        ]);

        assert!(matches!(
            manager.reference(&BeanId::from("First"), &CreationalContext::new(None)),
            Err(InstanceProviderError::DependencyCycle(bean)) if bean == BeanId::from("First")
        ));
    }

    #[test]
    fn should_break_cycles_with_incomplete_instances() {
        struct Node {
            peer: parking_lot::Mutex<Option<InstanceAnyPtr>>,
        }

        let first = Class::new("First");
        let second = Class::new("Second");
        let manager = manager(vec![
            Bean::builder(Type::class(&first), |cc, provider| {
                let node = Arc::new(Node {
                    peer: Default::default(),
                });
                cc.push(node.clone());
                let peer = provider.reference(&BeanId::from("Second"), cc)?;
                *node.peer.lock() = Some(peer);
                Ok(node)
            })
            .scope(APPLICATION_SCOPED)
            .build(),
            Bean::builder(Type::class(&second), |cc, provider| {
                provider.reference(&BeanId::from("First"), cc)
            })
            .build(),
        ]);

        let first = manager
            .reference_typed::<Arc<Node>>(&BeanId::from("First"), &CreationalContext::new(None))
            .unwrap();
        assert!(first.peer.lock().is_some());
    }

    #[test]
    fn should_report_invalid_injection_points() {
        let service = Class::new("Service");
        let missing = Class::new("Missing");
        let manager = manager(vec![Bean::builder(Type::class(&service), |_, _| Ok(()))
            .injection_point(InjectionPoint::new("missing", Type::class(&missing)))
            .build()]);

        let error = manager.validate().unwrap_err();
        assert_eq!(error.problems.len(), 1);
        assert_eq!(error.problems[0].member, "missing");
        assert!(matches!(
            error.problems[0].error,
            ResolutionError::UnsatisfiedDependency { .. }
        ));
    }

    #[test]
    fn should_destroy_instances_on_shutdown() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let manager = manager(vec![Bean::builder(
            Type::class(&Class::new("Service")),
            |_, _| Ok(Counter(0)),
        )
        .scope(APPLICATION_SCOPED)
        .on_destroy(move |_: &Counter| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()]);

        manager
            .reference(&BeanId::from("Service"), &CreationalContext::new(None))
            .unwrap();
        manager.shutdown();
        manager.shutdown();

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    }
}
