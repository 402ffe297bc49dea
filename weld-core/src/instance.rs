//! Handles for dynamic lookup of beans and for firing events. Unlike injection points validated
//! at deployment, problems with dynamic lookups surface when the handle is used.

use crate::bean::{BeanPtr, InjectionPoint};
use crate::creational::CreationalContext;
use crate::error::{InstanceProviderError, NotificationError, ResolutionError};
use crate::event::{EventPtr, NotificationOptions};
use crate::instance_provider::{
    downcast, same_instance, InstanceAnyPtr, InstanceProvider, InstancePtr,
};
use crate::manager::{BeanManager, ContextResolver};
use crate::qualifier::Qualifier;
use crate::resolution::{BeanSetPtr, Resolvable, ResolvableBuilder};
use crate::types::Type;
use std::any::Any;
use std::sync::Arc;

#[cfg(feature = "async")]
use crate::future::BoxFuture;

/// Dynamic lookup of beans with given type and qualifiers. Dependent instances obtained through
/// the handle share its creational context, and can be destroyed with
/// [destroy](Instance::destroy) or [release](Instance::release).
pub struct Instance<'a> {
    manager: &'a BeanManager,
    provider: &'a dyn InstanceProvider,
    contexts: &'a dyn ContextResolver,
    qualifiers: Vec<Qualifier>,
    resolvable: Resolvable,
    creational_context: CreationalContext,
}

impl<'a> Instance<'a> {
    pub(crate) fn new<Q: IntoIterator<Item = Qualifier>>(
        manager: &'a BeanManager,
        provider: &'a dyn InstanceProvider,
        contexts: &'a dyn ContextResolver,
        required_type: Type,
        qualifiers: Q,
    ) -> Result<Self, ResolutionError> {
        let qualifiers: Vec<Qualifier> = qualifiers.into_iter().collect();
        let resolvable = ResolvableBuilder::new(required_type)
            .qualifiers(qualifiers.iter().cloned())
            .build()?;

        Ok(Self {
            manager,
            provider,
            contexts,
            qualifiers,
            resolvable,
            creational_context: CreationalContext::new(None),
        })
    }

    #[inline]
    pub fn resolvable(&self) -> &Resolvable {
        &self.resolvable
    }

    /// Narrows the lookup with additional qualifiers.
    pub fn select<Q: IntoIterator<Item = Qualifier>>(
        &self,
        qualifiers: Q,
    ) -> Result<Instance<'a>, ResolutionError> {
        self.select_type(self.resolvable.required_type().clone(), qualifiers)
    }

    /// Narrows the lookup to a subtype, with additional qualifiers.
    pub fn select_type<Q: IntoIterator<Item = Qualifier>>(
        &self,
        subtype: Type,
        qualifiers: Q,
    ) -> Result<Instance<'a>, ResolutionError> {
        let qualifiers: Vec<Qualifier> = self
            .qualifiers
            .iter()
            .cloned()
            .chain(qualifiers)
            .collect();
        let resolvable = ResolvableBuilder::new(subtype)
            .qualifiers(qualifiers.iter().cloned())
            .build()?;

        Ok(Instance {
            manager: self.manager,
            provider: self.provider,
            contexts: self.contexts,
            qualifiers,
            resolvable,
            creational_context: self.creational_context.clone(),
        })
    }

    /// All beans available through this handle.
    pub fn beans(&self) -> BeanSetPtr {
        self.manager.resolve_all(&self.resolvable)
    }

    pub fn is_unsatisfied(&self) -> bool {
        self.beans().is_empty()
    }

    pub fn is_ambiguous(&self) -> bool {
        self.beans().len() > 1
    }

    /// Checks if [get](Instance::get) would find exactly one bean.
    pub fn is_resolvable(&self) -> bool {
        self.beans().len() == 1
    }

    pub fn get(&self) -> Result<InstanceAnyPtr, InstanceProviderError> {
        let bean = self.manager.resolve(&self.resolvable)?;
        self.provider
            .reference(bean.id(), &self.creational_context)
    }

    pub fn get_typed<T: Any + Send + Sync>(&self) -> Result<InstancePtr<T>, InstanceProviderError> {
        self.get().and_then(downcast)
    }

    /// Iterates over instances of all available beans.
    pub fn iter(&self) -> impl Iterator<Item = Result<InstanceAnyPtr, InstanceProviderError>> + '_ {
        let beans = self.beans();
        (0..beans.len()).map(move |index| {
            self.provider
                .reference(beans[index].id(), &self.creational_context)
        })
    }

    /// Destroys an instance obtained through this handle. Dependent instances are destroyed
    /// directly, normal-scoped ones are removed from their context. Returns whether anything was
    /// destroyed.
    pub fn destroy(&self, instance: &InstanceAnyPtr) -> Result<bool, InstanceProviderError> {
        if self
            .creational_context
            .destroy_dependent_instance(instance)
        {
            return Ok(true);
        }

        for bean in self.beans().iter().filter(|bean| !bean.is_dependent()) {
            if self.is_current_instance(bean, instance)? {
                return Ok(self.contexts.context(bean.scope())?.destroy(bean.id())?);
            }
        }

        Ok(false)
    }

    fn is_current_instance(
        &self,
        bean: &BeanPtr,
        instance: &InstanceAnyPtr,
    ) -> Result<bool, InstanceProviderError> {
        Ok(self
            .provider
            .existing_reference(bean.id())?
            .map(|existing| same_instance(&existing, instance))
            .unwrap_or(false))
    }

    /// Destroys all dependent instances obtained through this handle.
    pub fn release(&self) {
        self.creational_context.release();
    }
}

/// Fires events of a given type and qualifiers.
#[derive(Clone)]
pub struct Event<'a> {
    manager: &'a BeanManager,
    provider: &'a dyn InstanceProvider,
    event_type: Type,
    qualifiers: Vec<Qualifier>,
    injection_point: Option<InjectionPoint>,
    options: NotificationOptions,
}

impl<'a> Event<'a> {
    pub(crate) fn new(
        manager: &'a BeanManager,
        provider: &'a dyn InstanceProvider,
        event_type: Type,
    ) -> Self {
        Self {
            manager,
            provider,
            event_type,
            qualifiers: vec![],
            injection_point: None,
            options: Default::default(),
        }
    }

    #[inline]
    pub fn event_type(&self) -> &Type {
        &self.event_type
    }

    /// Adds qualifiers to fired events.
    pub fn select<Q: IntoIterator<Item = Qualifier>>(&self, qualifiers: Q) -> Event<'a> {
        let mut event = self.clone();
        event.qualifiers.extend(qualifiers);
        event
    }

    /// Fires events as given subtype, with additional qualifiers.
    pub fn select_type<Q: IntoIterator<Item = Qualifier>>(
        &self,
        subtype: Type,
        qualifiers: Q,
    ) -> Event<'a> {
        let mut event = self.select(qualifiers);
        event.event_type = subtype;
        event
    }

    /// Sets the injection point reported in event metadata.
    pub fn with_injection_point(mut self, injection_point: InjectionPoint) -> Self {
        self.injection_point = Some(injection_point);
        self
    }

    /// Stops notification at the first failing observer.
    pub fn fail_fast(mut self) -> Self {
        self.options = self.options.fail_fast();
        self
    }

    pub fn fire(&self, event: EventPtr) -> Result<(), NotificationError> {
        self.manager.notify(
            self.provider,
            event,
            &self.event_type,
            self.qualifiers.iter().cloned(),
            self.injection_point.clone(),
            self.options,
        )
    }

    pub fn fire_typed<T: Any + Send + Sync>(&self, event: T) -> Result<(), NotificationError> {
        self.fire(Arc::new(event))
    }

    /// Notifies asynchronous observers when the returned future is polled.
    #[cfg(feature = "async")]
    pub fn fire_async(
        &self,
        event: EventPtr,
    ) -> BoxFuture<'static, Result<EventPtr, NotificationError>> {
        self.manager.notify_async(
            self.provider,
            event,
            &self.event_type,
            self.qualifiers.iter().cloned(),
            self.injection_point.clone(),
        )
    }
}
