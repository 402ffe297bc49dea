use crate::bean::{BeanId, ContextualPtr};
use crate::context::{BeanStore, BeanStorePtr, Context, Creation, Scope};
use crate::error::{ContextError, InstanceProviderError};
use crate::instance_provider::InstanceAnyPtr;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Lifecycle state of a [ManagedContext].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextState {
    Uninitialized,
    Active,
    Inactive,
    Destroyed,
}

#[derive(Debug)]
struct ManagedState {
    state: ContextState,
    store: Option<BeanStorePtr>,
}

/// A context backed by an attachable [BeanStore]. The store can be detached on deactivation and
/// attached again later, which allows e.g. session state to outlive a single unit of work.
#[derive(Debug)]
pub struct ManagedContext {
    scope: Scope,
    state: RwLock<ManagedState>,
}

impl ManagedContext {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            state: RwLock::new(ManagedState {
                state: ContextState::Uninitialized,
                store: None,
            }),
        }
    }

    /// Creates an already active context with an empty store.
    pub fn active(scope: Scope) -> Self {
        Self {
            scope,
            state: RwLock::new(ManagedState {
                state: ContextState::Active,
                store: Some(Arc::new(BeanStore::new())),
            }),
        }
    }

    pub fn state(&self) -> ContextState {
        self.state.read().state
    }

    /// Activates the context, reattaching a previously detached store or creating a new one.
    pub fn activate(&self) -> Result<(), ContextError> {
        let mut state = self.state.write();
        let store = state
            .store
            .take()
            .unwrap_or_else(|| Arc::new(BeanStore::new()));

        Self::activate_state(&self.scope, &mut state, store)
    }

    /// Activates the context with given store.
    pub fn activate_with(&self, store: BeanStorePtr) -> Result<(), ContextError> {
        let mut state = self.state.write();
        Self::activate_state(&self.scope, &mut state, store)
    }

    fn activate_state(
        scope: &Scope,
        state: &mut ManagedState,
        store: BeanStorePtr,
    ) -> Result<(), ContextError> {
        match state.state {
            ContextState::Active => Err(ContextError::ContextAlreadyActive(scope.to_string())),
            ContextState::Destroyed => Err(ContextError::ContextDestroyed(scope.to_string())),
            ContextState::Uninitialized | ContextState::Inactive => {
                debug!(scope = %scope, "Activating context.");
                state.state = ContextState::Active;
                state.store = Some(store);
                Ok(())
            }
        }
    }

    /// Deactivates the context without destroying its instances. Returns the detached store.
    pub fn deactivate(&self) -> Result<BeanStorePtr, ContextError> {
        let mut state = self.state.write();
        if state.state != ContextState::Active {
            return Err(ContextError::ContextNotActive(self.scope.to_string()));
        }

        debug!(scope = %self.scope, "Deactivating context.");

        state.state = ContextState::Inactive;
        state
            .store
            .clone()
            .ok_or_else(|| ContextError::ContextNotActive(self.scope.to_string()))
    }

    /// Destroys all instances and makes the context permanently unusable. Subsequent calls do
    /// nothing.
    pub fn invalidate(&self) {
        let store = {
            let mut state = self.state.write();
            if state.state == ContextState::Destroyed {
                return;
            }

            state.state = ContextState::Destroyed;
            state.store.take()
        };

        debug!(scope = %self.scope, "Invalidating context.");

        if let Some(store) = store {
            store.destroy_all();
        }
    }

    fn active_store(&self) -> Result<BeanStorePtr, ContextError> {
        let state = self.state.read();
        match (&state.state, &state.store) {
            (ContextState::Active, Some(store)) => Ok(store.clone()),
            _ => Err(ContextError::ContextNotActive(self.scope.to_string())),
        }
    }
}

impl Context for ManagedContext {
    #[inline]
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn is_active(&self) -> bool {
        self.state() == ContextState::Active
    }

    fn get(
        &self,
        contextual: &ContextualPtr,
        creation: Option<Creation<'_>>,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError> {
        self.active_store()?.get_or_create(contextual, creation)
    }

    fn destroy(&self, contextual: &BeanId) -> Result<bool, ContextError> {
        Ok(self.active_store()?.destroy(contextual))
    }
}
