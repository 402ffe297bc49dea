use crate::bean::{BeanId, InjectionPoint};
use crate::creational::CreationalContext;
pub use crate::error::InstanceProviderError;
use crate::resolution::Resolvable;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, Any};
use std::error::Error;
use std::sync::Arc;

pub type InstancePtr<T> = Arc<T>;

pub type InstanceAnyPtr = InstancePtr<dyn Any + Send + Sync + 'static>;

pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Generic provider for bean instances. Implementations decide which contexts are visible, e.g.
/// a unit of work can see its own request and session contexts on top of the global ones.
#[cfg_attr(test, automock)]
pub trait InstanceProvider {
    /// Returns a contextual reference to the bean with given id. Dependent instances become
    /// dependents of the given creational context.
    fn reference(
        &self,
        bean: &BeanId,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError>;

    /// Resolves the bean for given injection point and returns its contextual reference.
    fn injectable_reference(
        &self,
        injection_point: &InjectionPoint,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError>;

    /// Returns references to all enabled beans matching given resolvable.
    fn references(
        &self,
        resolvable: &Resolvable,
        creational_context: &CreationalContext,
    ) -> Result<Vec<InstanceAnyPtr>, InstanceProviderError>;

    /// Returns a reference to the bean with given name.
    fn reference_by_name(
        &self,
        name: &str,
        creational_context: &CreationalContext,
    ) -> Result<InstanceAnyPtr, InstanceProviderError>;

    /// Returns an already existing instance of given bean, without creating a new one. Returns
    /// `None` when no instance exists or the bean's context is not active.
    fn existing_reference(
        &self,
        bean: &BeanId,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError>;
}

/// Helper trait for [InstanceProvider] providing strongly-typed access.
pub trait TypedInstanceProvider {
    /// Typesafe version of [InstanceProvider::reference].
    fn reference_typed<T: Any + Send + Sync>(
        &self,
        bean: &BeanId,
        creational_context: &CreationalContext,
    ) -> Result<InstancePtr<T>, InstanceProviderError>;

    /// Typesafe version of [InstanceProvider::injectable_reference].
    fn injectable_reference_typed<T: Any + Send + Sync>(
        &self,
        injection_point: &InjectionPoint,
        creational_context: &CreationalContext,
    ) -> Result<InstancePtr<T>, InstanceProviderError>;

    /// Typesafe version of [InstanceProvider::references].
    fn references_typed<T: Any + Send + Sync>(
        &self,
        resolvable: &Resolvable,
        creational_context: &CreationalContext,
    ) -> Result<Vec<InstancePtr<T>>, InstanceProviderError>;
}

impl<P: InstanceProvider + ?Sized> TypedInstanceProvider for P {
    fn reference_typed<T: Any + Send + Sync>(
        &self,
        bean: &BeanId,
        creational_context: &CreationalContext,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        self.reference(bean, creational_context)
            .and_then(downcast)
    }

    fn injectable_reference_typed<T: Any + Send + Sync>(
        &self,
        injection_point: &InjectionPoint,
        creational_context: &CreationalContext,
    ) -> Result<InstancePtr<T>, InstanceProviderError> {
        self.injectable_reference(injection_point, creational_context)
            .and_then(downcast)
    }

    fn references_typed<T: Any + Send + Sync>(
        &self,
        resolvable: &Resolvable,
        creational_context: &CreationalContext,
    ) -> Result<Vec<InstancePtr<T>>, InstanceProviderError> {
        self.references(resolvable, creational_context)?
            .into_iter()
            .map(downcast)
            .collect()
    }
}

/// Casts a type-erased instance to the concrete type produced by its bean.
pub fn downcast<T: Any + Send + Sync>(
    instance: InstanceAnyPtr,
) -> Result<InstancePtr<T>, InstanceProviderError> {
    instance
        .downcast::<T>()
        .map_err(|_| InstanceProviderError::IncompatibleInstance(type_name::<T>()))
}

#[inline]
pub(crate) fn same_instance(first: &InstanceAnyPtr, second: &InstanceAnyPtr) -> bool {
    std::ptr::eq(
        Arc::as_ptr(first) as *const (),
        Arc::as_ptr(second) as *const (),
    )
}
