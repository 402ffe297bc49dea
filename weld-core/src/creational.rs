//! Creational contexts track everything created while creating a single contextual instance:
//! dependent objects which share its lifecycle, and incomplete instances used to break circular
//! dependencies. A chain of contexts shares construction bookkeeping, so a bean which is
//! requested again while still being constructed can be detected.

use crate::bean::{BeanId, ContextualPtr};
use crate::instance_provider::{same_instance, InstanceAnyPtr};
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// An instance together with the [Contextual](crate::bean::Contextual) which created it and the
/// creational context holding its dependents.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ContextualInstance {
    #[derivative(Debug = "ignore")]
    contextual: ContextualPtr,
    #[derivative(Debug = "ignore")]
    instance: InstanceAnyPtr,
    creational_context: CreationalContext,
}

impl ContextualInstance {
    pub fn new(
        contextual: ContextualPtr,
        instance: InstanceAnyPtr,
        creational_context: CreationalContext,
    ) -> Self {
        Self {
            contextual,
            instance,
            creational_context,
        }
    }

    #[inline]
    pub fn contextual(&self) -> &ContextualPtr {
        &self.contextual
    }

    #[inline]
    pub fn instance(&self) -> &InstanceAnyPtr {
        &self.instance
    }

    #[inline]
    pub fn creational_context(&self) -> &CreationalContext {
        &self.creational_context
    }

    /// Destroys the instance using its contextual, which in turn releases its dependents.
    pub fn destroy(&self) {
        trace!(bean = %self.contextual.id(), "Destroying contextual instance.");
        self.contextual
            .destroy(&self.instance, &self.creational_context);
    }
}

#[derive(Default)]
struct ConstructionState {
    under_construction: Mutex<FxHashSet<BeanId>>,
    incomplete: Mutex<FxHashMap<BeanId, InstanceAnyPtr>>,
}

struct CreationalContextInner {
    contextual: Option<BeanId>,
    construction: Arc<ConstructionState>,
    parent: Option<Weak<CreationalContextInner>>,
    dependents: Mutex<Vec<ContextualInstance>>,
    released: AtomicBool,
}

impl CreationalContextInner {
    fn new(
        contextual: Option<BeanId>,
        construction: Arc<ConstructionState>,
        parent: Option<Weak<CreationalContextInner>>,
    ) -> Self {
        Self {
            contextual,
            construction,
            parent,
            dependents: Default::default(),
            released: AtomicBool::new(false),
        }
    }
}

/// Cheaply clonable handle to a creational context.
#[derive(Clone)]
pub struct CreationalContext {
    inner: Arc<CreationalContextInner>,
}

impl CreationalContext {
    /// Creates a new root context, optionally associated with a contextual.
    pub fn new(contextual: Option<BeanId>) -> Self {
        Self {
            inner: Arc::new(CreationalContextInner::new(
                contextual,
                Default::default(),
                None,
            )),
        }
    }

    #[inline]
    pub fn contextual(&self) -> Option<&BeanId> {
        self.inner.contextual.as_ref()
    }

    /// Creates a context for a dependent object. Instances registered through the child become
    /// dependents of this context.
    pub fn child(&self, contextual: &BeanId) -> Self {
        Self {
            inner: Arc::new(CreationalContextInner::new(
                Some(contextual.clone()),
                self.inner.construction.clone(),
                Some(Arc::downgrade(&self.inner)),
            )),
        }
    }

    /// Creates a context for a bean with its own lifecycle, e.g. a normal-scoped one. The new
    /// context shares construction bookkeeping with this one, but not dependents.
    pub fn detached(&self, contextual: &BeanId) -> Self {
        Self {
            inner: Arc::new(CreationalContextInner::new(
                Some(contextual.clone()),
                self.inner.construction.clone(),
                None,
            )),
        }
    }

    /// Registers an incomplete instance of the contextual being created, so circular references
    /// can be satisfied before construction finishes.
    pub fn push(&self, incomplete: InstanceAnyPtr) {
        if let Some(contextual) = &self.inner.contextual {
            self.inner
                .construction
                .incomplete
                .lock()
                .insert(contextual.clone(), incomplete);
        }
    }

    pub fn incomplete_instance(&self, contextual: &BeanId) -> Option<InstanceAnyPtr> {
        self.inner
            .construction
            .incomplete
            .lock()
            .get(contextual)
            .cloned()
    }

    pub fn is_under_construction(&self, contextual: &BeanId) -> bool {
        self.inner
            .construction
            .under_construction
            .lock()
            .contains(contextual)
    }

    /// Marks given contextual as being constructed until the returned guard is dropped.
    pub fn begin_construction(&self, contextual: &BeanId) -> ConstructionGuard {
        self.inner
            .construction
            .under_construction
            .lock()
            .insert(contextual.clone());

        ConstructionGuard {
            construction: self.inner.construction.clone(),
            contextual: contextual.clone(),
        }
    }

    /// Adds a dependent instance to the parent context, or to this one if it has no parent.
    pub fn add_dependent_instance(&self, instance: ContextualInstance) {
        match self.inner.parent.as_ref().and_then(Weak::upgrade) {
            Some(parent) => parent.dependents.lock().push(instance),
            None => self.inner.dependents.lock().push(instance),
        }
    }

    pub fn dependent_instances(&self) -> Vec<ContextualInstance> {
        self.inner.dependents.lock().clone()
    }

    /// Destroys a single dependent instance early. Returns `false` if the instance is not a
    /// dependent of this context.
    pub fn destroy_dependent_instance(&self, instance: &InstanceAnyPtr) -> bool {
        let dependent = {
            let mut dependents = self.inner.dependents.lock();
            dependents
                .iter()
                .position(|dependent| same_instance(dependent.instance(), instance))
                .map(|index| dependents.remove(index))
        };

        match dependent {
            Some(dependent) => {
                dependent.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroys all dependent instances, in reverse order of creation. Subsequent calls do
    /// nothing.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return;
        }

        let dependents = std::mem::take(&mut *self.inner.dependents.lock());
        for dependent in dependents.into_iter().rev() {
            dependent.destroy();
        }
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }
}

impl Debug for CreationalContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationalContext")
            .field("contextual", &self.inner.contextual)
            .field("dependents", &self.inner.dependents.lock().len())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Keeps a contextual marked as under construction.
pub struct ConstructionGuard {
    construction: Arc<ConstructionState>,
    contextual: BeanId,
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        self.construction
            .under_construction
            .lock()
            .remove(&self.contextual);
        self.construction.incomplete.lock().remove(&self.contextual);
    }
}
