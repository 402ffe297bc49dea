use crate::event::ObserverPtr;
use crate::registry::BeanRegistry;
use crate::resolution::bean_resolver::cached;
use crate::resolution::{AssignabilityRules, EventTypeAssignabilityRules, Resolvable};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

pub type ObserverSetPtr = Arc<[ObserverPtr]>;

/// Resolves observer methods for events. All matching observers are returned, ordered by
/// priority and then by registration order.
#[derive(Debug)]
pub struct TypeSafeObserverResolver {
    registry: Arc<BeanRegistry>,
    rules: EventTypeAssignabilityRules,
    cache_size: usize,
    default_priority: i32,
    resolved: DashMap<Resolvable, ObserverSetPtr>,
}

impl TypeSafeObserverResolver {
    pub fn new(registry: Arc<BeanRegistry>, cache_size: usize, default_priority: i32) -> Self {
        Self {
            registry,
            rules: EventTypeAssignabilityRules,
            cache_size,
            default_priority,
            resolved: DashMap::new(),
        }
    }

    /// Priority used for observers without an explicit one.
    #[inline]
    pub fn default_priority(&self) -> i32 {
        self.default_priority
    }

    /// Resolves observers for an event resolvable, as created by [Resolvable::for_event].
    pub fn resolve(&self, resolvable: &Resolvable) -> ObserverSetPtr {
        if let Some(observers) = self.resolved.get(resolvable) {
            return observers.clone();
        }

        debug!(
            event_type = %resolvable.required_type(),
            qualifiers = %resolvable.qualifiers(),
            "Resolving observers."
        );

        let mut observers: Vec<_> = self
            .registry
            .observer_candidates(resolvable.types())
            .into_iter()
            .filter(|(_, observer)| {
                self.rules
                    .matches_any(observer.observed_type(), resolvable.types().iter())
                    && resolvable.qualifiers().contains_all(observer.qualifiers())
            })
            .collect();

        observers.sort_by_key(|(index, observer)| {
            (
                observer.priority().unwrap_or(self.default_priority),
                *index,
            )
        });

        cached(
            &self.resolved,
            self.cache_size,
            resolvable.clone(),
            observers
                .into_iter()
                .map(|(_, observer)| observer)
                .collect(),
        )
    }

    pub fn clear(&self) {
        self.resolved.clear();
    }
}
