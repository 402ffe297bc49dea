use crate::bean::{BeanId, ContextualPtr};
use crate::context::Creation;
use crate::creational::ContextualInstance;
use crate::error::InstanceProviderError;
use crate::instance_provider::InstanceAnyPtr;
use dashmap::DashMap;
use parking_lot::{const_mutex, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

pub type BeanStorePtr = Arc<BeanStore>;

/// Identifies a creation lock across all stores.
type CreationKey = (usize, BeanId);

/// Threads holding creation locks and the locks they wait for. Creations waiting on each other in
/// a cycle would never finish, so such a wait is rejected instead.
static CREATIONS: Mutex<CreationGraph> = const_mutex(CreationGraph::new());

struct CreationGraph {
    owners: Vec<(CreationKey, ThreadId)>,
    waiting: Vec<(ThreadId, CreationKey)>,
}

impl CreationGraph {
    const fn new() -> Self {
        Self {
            owners: Vec::new(),
            waiting: Vec::new(),
        }
    }

    fn owner(&self, key: &CreationKey) -> Option<ThreadId> {
        self.owners
            .iter()
            .find(|(owned, _)| owned == key)
            .map(|(_, thread)| *thread)
    }

    /// Follows owners and their awaited locks, starting at given key, looking for given thread.
    fn leads_to(&self, key: &CreationKey, thread: ThreadId) -> bool {
        let mut current = key;
        for _ in 0..=self.waiting.len() {
            let Some(owner) = self.owner(current) else {
                return false;
            };

            if owner == thread {
                return true;
            }

            match self.waiting.iter().find(|(waiting, _)| *waiting == owner) {
                Some((_, next)) => current = next,
                None => return false,
            }
        }

        false
    }
}

/// Releases ownership of a creation lock in the [CREATIONS] graph.
struct CreationOwnership {
    key: CreationKey,
}

impl Drop for CreationOwnership {
    fn drop(&mut self) {
        CREATIONS.lock().owners.retain(|(owned, _)| owned != &self.key);
    }
}

/// Concurrent storage of contextual instances, keyed by bean id. Creation of a missing instance is
/// serialized per bean, so concurrent requests observe a single instance.
#[derive(Default, Debug)]
pub struct BeanStore {
    instances: DashMap<BeanId, ContextualInstance>,
    creation_locks: DashMap<BeanId, Arc<Mutex<()>>>,
}

impl BeanStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, contextual: &BeanId) -> Option<InstanceAnyPtr> {
        self.instances
            .get(contextual)
            .map(|instance| instance.instance().clone())
    }

    /// Returns an existing instance, or creates and stores a new one if `creation` is present.
    pub fn get_or_create(
        &self,
        contextual: &ContextualPtr,
        creation: Option<Creation<'_>>,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError> {
        let id = contextual.id();
        if let Some(instance) = self.get(id) {
            return Ok(Some(instance));
        }

        let Some(creation) = creation else {
            return Ok(None);
        };

        let lock = self
            .creation_locks
            .entry(id.clone())
            .or_default()
            .value()
            .clone();

        let key = (self as *const Self as usize, id.clone());
        let thread = thread::current().id();
        {
            let mut creations = CREATIONS.lock();
            if creations.leads_to(&key, thread) {
                warn!(bean = %id, "Concurrent creations depend on each other.");
                return Err(InstanceProviderError::DependencyCycle(id.clone()));
            }

            creations.waiting.push((thread, key.clone()));
        }

        let _guard = lock.lock();
        let _ownership = {
            let mut creations = CREATIONS.lock();
            creations.waiting.retain(|(waiting, _)| *waiting != thread);
            creations.owners.push((key.clone(), thread));
            CreationOwnership { key }
        };

        if let Some(instance) = self.get(id) {
            return Ok(Some(instance));
        }

        let instance = contextual.create(creation.creational_context, creation.provider)?;
        self.instances.insert(
            id.clone(),
            ContextualInstance::new(
                contextual.clone(),
                instance.clone(),
                creation.creational_context.clone(),
            ),
        );

        Ok(Some(instance))
    }

    pub fn remove(&self, contextual: &BeanId) -> Option<ContextualInstance> {
        self.instances
            .remove(contextual)
            .map(|(_, instance)| instance)
    }

    /// Destroys and removes the instance of given contextual.
    pub fn destroy(&self, contextual: &BeanId) -> bool {
        match self.remove(contextual) {
            Some(instance) => {
                instance.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroys and removes all stored instances.
    pub fn destroy_all(&self) {
        let ids: Vec<BeanId> = self
            .instances
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        debug!(count = ids.len(), "Destroying stored instances.");

        for id in ids {
            self.destroy(&id);
        }

        self.creation_locks.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn ids(&self) -> Vec<BeanId> {
        self.instances
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::bean::{BeanId, ContextualPtr, MockContextual};
    use crate::context::bean_store::CreationGraph;
    use crate::context::{BeanStore, Creation};
    use crate::creational::CreationalContext;
    use crate::instance_provider::{InstanceAnyPtr, MockInstanceProvider};
    use std::sync::Arc;
    use std::thread;

    fn contextual(creations: usize, destructions: usize) -> ContextualPtr {
        let mut contextual = MockContextual::new();
        contextual
            .expect_id()
            .return_const(BeanId::from("bean"));
        contextual
            .expect_create()
            .times(creations)
            .returning(|_, _| Ok(Arc::new(42) as InstanceAnyPtr));
        contextual
            .expect_destroy()
            .times(destructions)
            .return_const(());
        Arc::new(contextual)
    }

    #[test]
    fn should_reuse_instance() {
        let store = BeanStore::new();
        let contextual = contextual(1, 0);
        let cc = CreationalContext::new(None);
        let provider = MockInstanceProvider::new();
        let creation = Creation {
            creational_context: &cc,
            provider: &provider,
        };

        let first = store
            .get_or_create(&contextual, Some(creation))
            .unwrap()
            .unwrap();
        let second = store
            .get_or_create(&contextual, Some(creation))
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn should_not_create_without_creation() {
        let store = BeanStore::new();
        let contextual = contextual(0, 0);

        assert!(store.get_or_create(&contextual, None).unwrap().is_none());
    }

    #[test]
    fn should_destroy_all_instances() {
        let store = BeanStore::new();
        let contextual = contextual(1, 1);
        let cc = CreationalContext::new(None);
        let provider = MockInstanceProvider::new();

        store
            .get_or_create(
                &contextual,
                Some(Creation {
                    creational_context: &cc,
                    provider: &provider,
                }),
            )
            .unwrap();
        store.destroy_all();
        store.destroy_all();

        assert!(store.is_empty());
    }

    #[test]
    fn should_detect_creations_waiting_in_cycle() {
        let current = thread::current().id();
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        let first = (1, BeanId::from("first"));
        let second = (1, BeanId::from("second"));

        let mut graph = CreationGraph::new();
        graph.owners.push((first.clone(), current));
        assert!(graph.leads_to(&first, current));
        assert!(!graph.leads_to(&second, current));

        graph.owners.push((second.clone(), other));
        assert!(!graph.leads_to(&second, current));

        graph.waiting.push((other, first));
        assert!(graph.leads_to(&second, current));
        assert!(!graph.leads_to(&(2, BeanId::from("second")), current));
    }
}
