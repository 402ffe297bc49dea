//! Contextual instances live in [Context]s, each responsible for a single [Scope]. A context
//! decides when to reuse an existing instance and when to create a new one. Normal scopes, like
//! [APPLICATION_SCOPED] or [REQUEST_SCOPED], share a single instance per bean while the context is
//! active. The [DEPENDENT] pseudo-scope creates a new instance on each request, which then shares
//! the lifecycle of the object it was injected into.
//!
//! Note: there are no client proxies, so injecting a shorter-lived normal-scoped bean into a
//! longer-lived one pins the instance which was current at injection time.

mod bean_store;
mod dependent;
mod managed;

pub use bean_store::{BeanStore, BeanStorePtr};
pub use dependent::DependentContext;
pub use managed::{ContextState, ManagedContext};

use crate::bean::{BeanId, ContextualPtr};
use crate::creational::CreationalContext;
use crate::error::{ContextError, InstanceProviderError};
use crate::instance_provider::{InstanceAnyPtr, InstanceProvider};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Identifies a context. Normal scopes share instances, pseudo-scopes might not.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    name: Cow<'static, str>,
    normal: bool,
}

impl Scope {
    pub const fn normal(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            normal: true,
        }
    }

    pub const fn pseudo(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            normal: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_normal(&self) -> bool {
        self.normal
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Application-wide shared instances, created lazily and destroyed at shutdown.
pub const APPLICATION_SCOPED: Scope = Scope::normal("ApplicationScoped");

/// Instances shared within a single request.
pub const REQUEST_SCOPED: Scope = Scope::normal("RequestScoped");

/// Instances shared within a session, possibly spanning many requests.
pub const SESSION_SCOPED: Scope = Scope::normal("SessionScoped");

/// Instances shared within a conversation.
pub const CONVERSATION_SCOPED: Scope = Scope::normal("ConversationScoped");

/// New instance per injection, bound to the lifecycle of the injecting object.
pub const DEPENDENT: Scope = Scope::pseudo("Dependent");

/// Application-wide shared instances, without normal scope semantics.
pub const SINGLETON: Scope = Scope::pseudo("Singleton");

/// Everything needed to create a missing instance.
#[derive(Clone, Copy)]
pub struct Creation<'a> {
    pub creational_context: &'a CreationalContext,
    pub provider: &'a dyn InstanceProvider,
}

/// A container of contextual instances for a single [Scope].
pub trait Context: Send + Sync {
    fn scope(&self) -> &Scope;

    fn is_active(&self) -> bool;

    /// Returns an instance of given contextual. When no instance exists and `creation` is present,
    /// a new one is created and stored; otherwise `None` is returned. Fails with
    /// [ContextError::ContextNotActive] if the context is not active.
    fn get(
        &self,
        contextual: &ContextualPtr,
        creation: Option<Creation<'_>>,
    ) -> Result<Option<InstanceAnyPtr>, InstanceProviderError>;

    /// Destroys the instance of given contextual, if one exists. Returns whether an instance was
    /// destroyed.
    fn destroy(&self, contextual: &BeanId) -> Result<bool, ContextError>;
}

pub type ContextPtr = Arc<dyn Context>;
