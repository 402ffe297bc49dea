//! Beans are the basic building blocks managed by the container. A [Bean] describes a contextual
//! object: its [types](Bean::types) and [qualifiers](Bean::qualifiers) used for typesafe
//! resolution, the [Scope] deciding the lifecycle of its instances, and a [BeanLifecycle] which
//! knows how to create and destroy instances.
//!
//! Beans are usually created with a [builder](Bean::builder):
//!
//! ```
//! use weld_core::bean::Bean;
//! use weld_core::context::APPLICATION_SCOPED;
//! use weld_core::qualifier::Qualifier;
//! use weld_core::types::{Class, Type};
//!
//! struct Dog;
//!
//! let animal = Class::new("Animal");
//! let dog = Class::builder("Dog").extends(Type::class(&animal)).build();
//!
//! let bean = Bean::builder(Type::class(&dog), |_, _| Ok(Dog))
//!     .scope(APPLICATION_SCOPED)
//!     .qualifier(Qualifier::new("Loud"))
//!     .build();
//!
//! assert!(bean.types().contains(&Type::class(&animal)));
//! ```
//!
//! Producers are beans with a [declaring bean](BeanBuilder::declaring_bean), which is usually
//! injected into the producer's create function.

use crate::context::{Scope, DEPENDENT};
use crate::creational::CreationalContext;
use crate::error::InstanceProviderError;
use crate::instance_provider::{InstanceAnyPtr, InstanceProvider};
use crate::qualifier::{Qualifier, QualifierSet, ANY, DEFAULT, NAMED};
use crate::types::Type;
use derivative::Derivative;
use fxhash::FxHashSet;
#[cfg(test)]
use mockall::automock;
use std::any::Any;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::trace;

/// Unique identifier of a bean.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(Arc<str>);

impl BeanId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BeanId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<String> for BeanId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl Display for BeanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of an observer method.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Arc<str>);

impl ObserverId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObserverId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

impl From<String> for ObserverId {
    fn from(id: String) -> Self {
        Self(id.into())
    }
}

impl Display for ObserverId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something which can create and destroy contextual instances. Contexts operate on contextuals,
/// not directly on beans.
#[cfg_attr(test, automock)]
pub trait Contextual: Send + Sync {
    fn id(&self) -> &BeanId;

    /// Creates a new instance. Dependent objects should be obtained using given creational context.
    fn create(
        &self,
        creational_context: &CreationalContext,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError>;

    /// Destroys an instance, releasing its creational context.
    fn destroy(&self, instance: &InstanceAnyPtr, creational_context: &CreationalContext);
}

pub type ContextualPtr = Arc<dyn Contextual>;

/// Creation and destruction logic of a [Bean].
pub trait BeanLifecycle: Send + Sync {
    fn create(
        &self,
        creational_context: &CreationalContext,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError>;

    /// Cleans up an instance before it is discarded. Dependents are released afterwards.
    fn destroy(&self, _instance: &InstanceAnyPtr, _creational_context: &CreationalContext) {}
}

pub type BeanLifecyclePtr = Arc<dyn BeanLifecycle>;

type CreateFn = dyn Fn(&CreationalContext, &dyn InstanceProvider) -> Result<InstanceAnyPtr, InstanceProviderError>
    + Send
    + Sync;

type DisposeFn = dyn Fn(&InstanceAnyPtr) + Send + Sync;

struct FnLifecycle {
    create: Box<CreateFn>,
}

impl BeanLifecycle for FnLifecycle {
    fn create(
        &self,
        creational_context: &CreationalContext,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        (self.create)(creational_context, provider)
    }
}

/// A point where a bean requests a dependency.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InjectionPoint {
    member: Cow<'static, str>,
    required_type: Type,
    qualifiers: Vec<Qualifier>,
    declaring_bean: Option<BeanId>,
}

impl InjectionPoint {
    pub fn new<M: Into<Cow<'static, str>>>(member: M, required_type: Type) -> Self {
        Self {
            member: member.into(),
            required_type,
            qualifiers: vec![],
            declaring_bean: None,
        }
    }

    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn declared_by(mut self, bean: BeanId) -> Self {
        self.declaring_bean = Some(bean);
        self
    }

    /// Name of the field or parameter.
    #[inline]
    pub fn member(&self) -> &str {
        &self.member
    }

    #[inline]
    pub fn required_type(&self) -> &Type {
        &self.required_type
    }

    /// Qualifiers as declared, possibly including duplicates.
    #[inline]
    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    #[inline]
    pub fn declaring_bean(&self) -> Option<&BeanId> {
        self.declaring_bean.as_ref()
    }
}

/// Definition of a contextual object managed by the container.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Bean {
    id: BeanId,
    bean_class: Type,
    types: FxHashSet<Type>,
    qualifiers: QualifierSet,
    implicit_default: bool,
    scope: Scope,
    name: Option<String>,
    alternative: bool,
    priority: Option<i32>,
    specializes: Option<BeanId>,
    declaring_bean: Option<BeanId>,
    injection_points: Vec<InjectionPoint>,
    #[derivative(Debug = "ignore")]
    lifecycle: BeanLifecyclePtr,
    #[derivative(Debug = "ignore")]
    disposer: Option<Arc<DisposeFn>>,
}

pub type BeanPtr = Arc<Bean>;

impl Bean {
    /// Creates a builder for a bean, which uses given function to create instances of `T`. The
    /// bean's types default to the type closure of `bean_class`.
    pub fn builder<T, F>(bean_class: Type, create: F) -> BeanBuilder
    where
        T: Any + Send + Sync,
        F: Fn(&CreationalContext, &dyn InstanceProvider) -> Result<T, InstanceProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_lifecycle(
            bean_class,
            Arc::new(FnLifecycle {
                create: Box::new(
                    move |creational_context: &CreationalContext,
                          provider: &dyn InstanceProvider| {
                        create(creational_context, provider)
                            .map(|instance| Arc::new(instance) as InstanceAnyPtr)
                    },
                ),
            }),
        )
    }

    /// Creates a builder for a bean with custom lifecycle.
    pub fn with_lifecycle(bean_class: Type, lifecycle: BeanLifecyclePtr) -> BeanBuilder {
        BeanBuilder {
            id: None,
            types: None,
            qualifiers: vec![],
            scope: DEPENDENT,
            name: None,
            alternative: false,
            priority: None,
            specializes: None,
            declaring_bean: None,
            injection_points: vec![],
            disposer: None,
            lifecycle,
            bean_class,
        }
    }

    #[inline]
    pub fn id(&self) -> &BeanId {
        &self.id
    }

    /// The class implementing the bean.
    #[inline]
    pub fn bean_class(&self) -> &Type {
        &self.bean_class
    }

    #[inline]
    pub fn types(&self) -> &FxHashSet<Type> {
        &self.types
    }

    /// Effective qualifiers, including the built-in ones.
    #[inline]
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }

    #[inline]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn is_alternative(&self) -> bool {
        self.alternative
    }

    #[inline]
    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    /// The bean this one specializes, if any.
    #[inline]
    pub fn specializes(&self) -> Option<&BeanId> {
        self.specializes.as_ref()
    }

    /// The bean declaring this producer, if any.
    #[inline]
    pub fn declaring_bean(&self) -> Option<&BeanId> {
        self.declaring_bean.as_ref()
    }

    #[inline]
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    #[inline]
    pub fn is_dependent(&self) -> bool {
        self.scope == DEPENDENT
    }

    /// Producers of alternative beans are alternatives themselves, with the same priority.
    pub(crate) fn inherit_from_declaring_bean(&mut self, declaring_bean: &Bean) {
        if declaring_bean.alternative {
            self.alternative = true;
            if self.priority.is_none() {
                self.priority = declaring_bean.priority;
            }
        }
    }

    /// Takes over qualifiers and name of the specialized bean.
    pub(crate) fn inherit_from_specialized(&mut self, specialized: &Bean) {
        self.qualifiers
            .extend(specialized.qualifiers.iter().cloned());
        if self.name.is_none() {
            self.name = specialized.name.clone();
        }

        if self.implicit_default
            && !specialized.implicit_default
            && !specialized.qualifiers.contains_kind(DEFAULT)
        {
            self.qualifiers.remove_kind(DEFAULT);
        }
        self.implicit_default = self.implicit_default && specialized.implicit_default;
    }
}

impl Contextual for Bean {
    #[inline]
    fn id(&self) -> &BeanId {
        &self.id
    }

    fn create(
        &self,
        creational_context: &CreationalContext,
        provider: &dyn InstanceProvider,
    ) -> Result<InstanceAnyPtr, InstanceProviderError> {
        trace!(bean = %self.id, "Creating bean instance.");

        let _guard = creational_context.begin_construction(&self.id);
        self.lifecycle
            .create(creational_context, provider)
            .map_err(|error| match error {
                InstanceProviderError::Custom(error) => InstanceProviderError::CreationFailed {
                    bean: self.id.clone(),
                    error,
                },
                error => error,
            })
    }

    fn destroy(&self, instance: &InstanceAnyPtr, creational_context: &CreationalContext) {
        self.lifecycle.destroy(instance, creational_context);
        if let Some(disposer) = &self.disposer {
            disposer(instance);
        }

        creational_context.release();
    }
}

/// Builder for [Bean]s.
pub struct BeanBuilder {
    id: Option<BeanId>,
    bean_class: Type,
    types: Option<Vec<Type>>,
    qualifiers: Vec<Qualifier>,
    scope: Scope,
    name: Option<String>,
    alternative: bool,
    priority: Option<i32>,
    specializes: Option<BeanId>,
    declaring_bean: Option<BeanId>,
    injection_points: Vec<InjectionPoint>,
    lifecycle: BeanLifecyclePtr,
    disposer: Option<Arc<DisposeFn>>,
}

impl BeanBuilder {
    /// Sets an explicit id. Defaults to the bean class name.
    pub fn id<I: Into<BeanId>>(mut self, id: I) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Restricts bean types to given ones. [Object](crate::types::Class::object) is always
    /// included.
    pub fn types<T: IntoIterator<Item = Type>>(mut self, types: T) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn name<N: ToString>(mut self, name: N) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Marks the bean as an alternative, which needs to be enabled to be resolvable.
    pub fn alternative(mut self) -> Self {
        self.alternative = true;
        self
    }

    /// Sets the priority, which also enables an alternative.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn specializes<I: Into<BeanId>>(mut self, bean: I) -> Self {
        self.specializes = Some(bean.into());
        self
    }

    /// Makes this bean a producer declared by another bean.
    pub fn declaring_bean<I: Into<BeanId>>(mut self, bean: I) -> Self {
        self.declaring_bean = Some(bean.into());
        self
    }

    /// Declares an injection point, so it can be validated at deployment.
    pub fn injection_point(mut self, injection_point: InjectionPoint) -> Self {
        self.injection_points.push(injection_point);
        self
    }

    /// Adds a function called with instances of `T` when they are destroyed.
    pub fn on_destroy<T, F>(mut self, dispose: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.disposer = Some(Arc::new(move |instance: &InstanceAnyPtr| {
            if let Some(instance) = instance.downcast_ref::<T>() {
                dispose(instance);
            }
        }));
        self
    }

    pub fn build(self) -> Bean {
        let id = self
            .id
            .unwrap_or_else(|| BeanId::from(self.bean_class.to_string()));

        let mut types: FxHashSet<Type> = match self.types {
            Some(types) => types.into_iter().collect(),
            None => self.bean_class.closure(),
        };
        types.insert(Type::object());

        let name = self.name.or_else(|| {
            self.qualifiers
                .iter()
                .find_map(Qualifier::name)
                .map(str::to_string)
        });

        let mut qualifiers: QualifierSet = self.qualifiers.into_iter().collect();
        let implicit_default = !qualifiers
            .iter()
            .any(|qualifier| qualifier.kind() != NAMED && qualifier.kind() != ANY);
        if implicit_default {
            qualifiers.insert(Qualifier::default_qualifier());
        }

        qualifiers.insert(Qualifier::any());
        if let Some(name) = &name {
            if !qualifiers.contains_kind(NAMED) {
                qualifiers.insert(Qualifier::named(name.clone()));
            }
        }

        let injection_points = self
            .injection_points
            .into_iter()
            .map(|injection_point| injection_point.declared_by(id.clone()))
            .collect();

        Bean {
            id,
            bean_class: self.bean_class,
            types,
            qualifiers,
            implicit_default,
            scope: self.scope,
            name,
            alternative: self.alternative,
            priority: self.priority,
            specializes: self.specializes,
            declaring_bean: self.declaring_bean,
            injection_points,
            lifecycle: self.lifecycle,
            disposer: self.disposer,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bean::{Bean, BeanId, Contextual};
    use crate::context::{APPLICATION_SCOPED, DEPENDENT};
    use crate::creational::CreationalContext;
    use crate::error::InstanceProviderError;
    use crate::instance_provider::MockInstanceProvider;
    use crate::qualifier::{Qualifier, ANY, DEFAULT};
    use crate::types::{Class, Type};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("broken")]
    struct Broken;

    #[test]
    fn should_add_builtin_qualifiers() {
        let dog = Class::new("Dog");
        let bean = Bean::builder(Type::class(&dog), |_, _| Ok(1)).build();

        assert_eq!(bean.id(), &BeanId::from("Dog"));
        assert!(bean.qualifiers().contains_kind(DEFAULT));
        assert!(bean.qualifiers().contains_kind(ANY));
        assert_eq!(bean.scope(), &DEPENDENT);
    }

    #[test]
    fn should_not_add_default_with_custom_qualifier() {
        let dog = Class::new("Dog");
        let bean = Bean::builder(Type::class(&dog), |_, _| Ok(1))
            .qualifier(Qualifier::new("Loud"))
            .name("dog")
            .scope(APPLICATION_SCOPED)
            .build();

        assert!(!bean.qualifiers().contains_kind(DEFAULT));
        assert!(bean.qualifiers().contains(&Qualifier::named("dog")));
        assert_eq!(bean.name(), Some("dog"));
    }

    #[test]
    fn should_restrict_types() {
        let animal = Class::new("Animal");
        let dog = Class::builder("Dog").extends(Type::class(&animal)).build();
        let bean = Bean::builder(Type::class(&dog), |_, _| Ok(1))
            .types([Type::class(&dog)])
            .build();

        assert!(bean.types().contains(&Type::object()));
        assert!(!bean.types().contains(&Type::class(&animal)));
    }

    #[test]
    fn should_wrap_custom_creation_errors() {
        let dog = Class::new("Dog");
        let bean = Bean::builder(Type::class(&dog), |_, _| -> Result<i32, _> {
            Err(InstanceProviderError::custom(Broken))
        })
        .build();

        let result = bean.create(&CreationalContext::new(None), &MockInstanceProvider::new());
        assert!(matches!(
            result,
            Err(InstanceProviderError::CreationFailed { bean, .. }) if bean == BeanId::from("Dog")
        ));
    }

    #[test]
    fn should_dispose_and_release() {
        let dog = Class::new("Dog");
        let disposed = Arc::new(AtomicUsize::new(0));
        let counter = disposed.clone();
        let bean = Bean::builder(Type::class(&dog), |_, _| Ok(7))
            .on_destroy(move |value: &i32| {
                counter.fetch_add(*value as usize, Ordering::SeqCst);
            })
            .build();

        let cc = CreationalContext::new(Some(bean.id().clone()));
        let instance = bean.create(&cc, &MockInstanceProvider::new()).unwrap();
        bean.destroy(&instance, &cc);

        assert_eq!(disposed.load(Ordering::SeqCst), 7);
        assert!(cc.is_released());
    }
}
