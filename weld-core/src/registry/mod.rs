//! Functionality related to registering and indexing beans and observer methods.
//!
//! Definitions are collected by a mutable [BeanRegistryBuilder], usually from a
//! [BeanDiscovery], and then turned into an immutable [BeanRegistry]. Building the registry
//! processes producers, specialization and alternative enablement, and indexes enabled beans and
//! observers by their raw types for fast resolution.

mod discovery;

pub use discovery::{BeanDiscovery, StaticDiscovery};
#[cfg(test)]
pub use discovery::MockBeanDiscovery;

use crate::bean::{Bean, BeanId, BeanPtr, ObserverId};
use crate::error::RegistryError;
use crate::event::{ObserverMethod, ObserverPtr, Reception};
use crate::types::Type;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Mutable registry used during deployment.
#[derive(Debug, Default)]
pub struct BeanRegistryBuilder {
    beans: Vec<Bean>,
    bean_ids: FxHashSet<BeanId>,
    observers: Vec<ObserverMethod>,
    observer_ids: FxHashSet<ObserverId>,
    enabled_alternatives: FxHashSet<BeanId>,
}

impl BeanRegistryBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers everything found by given discovery.
    pub fn discover(mut self, discovery: &dyn BeanDiscovery) -> Result<Self, RegistryError> {
        for bean in discovery.beans() {
            self.register_bean(bean)?;
        }

        for observer in discovery.observers() {
            self.register_observer(observer)?;
        }

        self.enabled_alternatives
            .extend(discovery.enabled_alternatives());

        Ok(self)
    }

    /// Adds a bean, which will be registered when building.
    pub fn with_bean(mut self, bean: Bean) -> Result<Self, RegistryError> {
        self.register_bean(bean)?;
        Ok(self)
    }

    /// Adds an observer method, which will be registered when building.
    pub fn with_observer(mut self, observer: ObserverMethod) -> Result<Self, RegistryError> {
        self.register_observer(observer)?;
        Ok(self)
    }

    pub fn register_bean(&mut self, bean: Bean) -> Result<(), RegistryError> {
        if !self.bean_ids.insert(bean.id().clone()) {
            return Err(RegistryError::DuplicateBean(bean.id().clone()));
        }

        self.beans.push(bean);
        Ok(())
    }

    pub fn register_observer(&mut self, observer: ObserverMethod) -> Result<(), RegistryError> {
        if !self.observer_ids.insert(observer.id().clone()) {
            return Err(RegistryError::DuplicateObserver(observer.id().clone()));
        }

        self.observers.push(observer);
        Ok(())
    }

    /// Enables an alternative without a priority.
    pub fn enable_alternative<I: Into<BeanId>>(&mut self, bean: I) {
        self.enabled_alternatives.insert(bean.into());
    }

    pub fn build(self) -> Result<BeanRegistry, RegistryError> {
        let mut beans = self.beans;
        let index_of: FxHashMap<BeanId, usize> = beans
            .iter()
            .enumerate()
            .map(|(index, bean)| (bean.id().clone(), index))
            .collect();

        for index in 0..beans.len() {
            if let Some(declaring_id) = beans[index].declaring_bean().cloned() {
                let declaring_index = *index_of.get(&declaring_id).ok_or_else(|| {
                    RegistryError::MissingDeclaringBean {
                        declared: beans[index].id().to_string(),
                        declaring_bean: declaring_id.clone(),
                    }
                })?;

                let declaring = beans[declaring_index].clone();
                beans[index].inherit_from_declaring_bean(&declaring);
            }
        }

        let mut visits = vec![Visit::New; beans.len()];
        for index in 0..beans.len() {
            specialize(&mut beans, &index_of, index, &mut visits)?;
        }

        let disabled = disabled_beans(&beans, &index_of, &self.enabled_alternatives);
        debug!(
            beans = beans.len(),
            disabled = disabled.len(),
            observers = self.observers.len(),
            "Building bean registry."
        );

        let beans: Vec<BeanPtr> = beans.into_iter().map(Arc::new).collect();

        let mut observers = Vec::with_capacity(self.observers.len());
        for observer in self.observers {
            if let Some(declaring_id) = observer.declaring_bean() {
                let declaring = index_of
                    .get(declaring_id)
                    .map(|index| &beans[*index])
                    .ok_or_else(|| RegistryError::MissingDeclaringBean {
                        declared: observer.id().to_string(),
                        declaring_bean: declaring_id.clone(),
                    })?;

                if observer.reception() == Reception::IfExists && declaring.is_dependent() {
                    return Err(RegistryError::ConditionalObserverOnDependentBean(
                        observer.id().clone(),
                    ));
                }

                if disabled.contains(declaring_id) {
                    continue;
                }
            }

            observers.push(Arc::new(observer));
        }

        Ok(BeanRegistry::new(beans, index_of, disabled, observers))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

fn specialize(
    beans: &mut [Bean],
    index_of: &FxHashMap<BeanId, usize>,
    index: usize,
    visits: &mut [Visit],
) -> Result<(), RegistryError> {
    let Some(specialized_id) = beans[index].specializes().cloned() else {
        visits[index] = Visit::Done;
        return Ok(());
    };

    match visits[index] {
        Visit::Done => return Ok(()),
        Visit::Active => {
            return Err(RegistryError::InvalidSpecialization {
                bean: beans[index].id().clone(),
                specialized: specialized_id,
                reason: "specialization cycle".to_string(),
            })
        }
        Visit::New => {}
    }

    visits[index] = Visit::Active;

    let specialized_index =
        *index_of
            .get(&specialized_id)
            .ok_or_else(|| RegistryError::MissingSpecializedBean {
                bean: beans[index].id().clone(),
                specialized: specialized_id.clone(),
            })?;

    specialize(beans, index_of, specialized_index, visits)?;

    let specialized = beans[specialized_index].clone();
    if !specialized
        .types()
        .iter()
        .all(|bean_type| beans[index].types().contains(bean_type))
    {
        return Err(RegistryError::InvalidSpecialization {
            bean: beans[index].id().clone(),
            specialized: specialized_id,
            reason: "bean does not have all types of the specialized bean".to_string(),
        });
    }

    beans[index].inherit_from_specialized(&specialized);
    visits[index] = Visit::Done;

    Ok(())
}

fn disabled_beans(
    beans: &[Bean],
    index_of: &FxHashMap<BeanId, usize>,
    enabled_alternatives: &FxHashSet<BeanId>,
) -> FxHashSet<BeanId> {
    let is_enabled_alternative = |bean: &Bean| {
        bean.priority().is_some()
            || enabled_alternatives.contains(bean.id())
            || bean
                .declaring_bean()
                .map(|declaring| enabled_alternatives.contains(declaring))
                .unwrap_or(false)
    };

    let mut disabled: FxHashSet<BeanId> = beans
        .iter()
        .filter(|bean| bean.is_alternative() && !is_enabled_alternative(bean))
        .map(|bean| bean.id().clone())
        .collect();

    let specializing: Vec<&Bean> = beans
        .iter()
        .filter(|bean| !disabled.contains(bean.id()))
        .collect();
    for bean in specializing {
        let mut current = bean.specializes();
        while let Some(specialized) = current {
            disabled.insert(specialized.clone());
            current = index_of
                .get(specialized)
                .and_then(|index| beans[*index].specializes());
        }
    }

    for bean in beans {
        if let Some(declaring) = bean.declaring_bean() {
            if disabled.contains(declaring) {
                disabled.insert(bean.id().clone());
            }
        }
    }

    disabled
}

/// Immutable, indexed registry of beans and observer methods.
#[derive(Debug)]
pub struct BeanRegistry {
    beans: Vec<BeanPtr>,
    index_of: FxHashMap<BeanId, usize>,
    disabled: FxHashSet<BeanId>,
    beans_by_raw_type: FxHashMap<Type, Vec<usize>>,
    beans_by_name: FxHashMap<String, Vec<usize>>,
    observers: Vec<ObserverPtr>,
    observers_by_raw_type: FxHashMap<Type, Vec<usize>>,
    unindexed_observers: Vec<usize>,
}

impl BeanRegistry {
    fn new(
        beans: Vec<BeanPtr>,
        index_of: FxHashMap<BeanId, usize>,
        disabled: FxHashSet<BeanId>,
        observers: Vec<ObserverPtr>,
    ) -> Self {
        let mut beans_by_raw_type: FxHashMap<Type, Vec<usize>> = FxHashMap::default();
        let mut beans_by_name: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for (index, bean) in beans.iter().enumerate() {
            if disabled.contains(bean.id()) {
                continue;
            }

            for raw_type in bean
                .types()
                .iter()
                .filter_map(Type::raw_type)
                .unique()
            {
                beans_by_raw_type.entry(raw_type).or_default().push(index);
            }

            if let Some(name) = bean.name() {
                beans_by_name
                    .entry(name.to_string())
                    .or_default()
                    .push(index);
            }
        }

        let mut observers_by_raw_type: FxHashMap<Type, Vec<usize>> = FxHashMap::default();
        let mut unindexed_observers = vec![];

        for (index, observer) in observers.iter().enumerate() {
            match observer.observed_type().raw_type() {
                Some(raw_type) => observers_by_raw_type
                    .entry(raw_type)
                    .or_default()
                    .push(index),
                None => unindexed_observers.push(index),
            }
        }

        Self {
            beans,
            index_of,
            disabled,
            beans_by_raw_type,
            beans_by_name,
            observers,
            observers_by_raw_type,
            unindexed_observers,
        }
    }

    /// All registered beans, including disabled ones.
    #[inline]
    pub fn beans(&self) -> &[BeanPtr] {
        &self.beans
    }

    pub fn enabled_beans(&self) -> impl Iterator<Item = &BeanPtr> {
        self.beans
            .iter()
            .filter(|bean| !self.disabled.contains(bean.id()))
    }

    pub fn bean(&self, id: &BeanId) -> Option<&BeanPtr> {
        self.index_of.get(id).map(|index| &self.beans[*index])
    }

    /// Checks if given bean is registered and takes part in resolution.
    pub fn is_enabled(&self, id: &BeanId) -> bool {
        self.index_of.contains_key(id) && !self.disabled.contains(id)
    }

    /// Enabled beans which can possibly match given required type, in registration order.
    pub fn bean_candidates(&self, required_type: &Type) -> Vec<BeanPtr> {
        if required_type.is_object() {
            return self.enabled_beans().cloned().collect();
        }

        required_type
            .raw_type()
            .and_then(|raw_type| self.beans_by_raw_type.get(&raw_type))
            .map(|indices| {
                indices
                    .iter()
                    .map(|index| self.beans[*index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Enabled beans with given name.
    pub fn beans_by_name(&self, name: &str) -> Vec<BeanPtr> {
        self.beans_by_name
            .get(name)
            .map(|indices| {
                indices
                    .iter()
                    .map(|index| self.beans[*index].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Enabled observer methods, in registration order.
    #[inline]
    pub fn observers(&self) -> &[ObserverPtr] {
        &self.observers
    }

    /// Observers which can possibly match an event with given type closure, together with their
    /// registration index.
    pub fn observer_candidates(&self, event_types: &[Type]) -> Vec<(usize, ObserverPtr)> {
        let indices: BTreeSet<usize> = event_types
            .iter()
            .filter_map(Type::raw_type)
            .filter_map(|raw_type| self.observers_by_raw_type.get(&raw_type))
            .flatten()
            .chain(self.unindexed_observers.iter())
            .copied()
            .collect();

        indices
            .into_iter()
            .map(|index| (index, self.observers[index].clone()))
            .collect()
    }
}

pub mod internal {
    use crate::bean::Bean;
    use crate::event::ObserverMethod;
    use inventory::collect;
    pub use inventory::submit;

    pub struct BeanRegisterer {
        pub register: fn() -> Bean,
    }

    pub struct ObserverRegisterer {
        pub register: fn() -> ObserverMethod,
    }

    pub struct AlternativeRegisterer {
        pub bean: &'static str,
    }

    collect!(BeanRegisterer);
    collect!(ObserverRegisterer);
    collect!(AlternativeRegisterer);
}
