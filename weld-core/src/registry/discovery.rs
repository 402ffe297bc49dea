use crate::bean::{Bean, BeanId};
use crate::event::ObserverMethod;
use crate::registry::internal::{AlternativeRegisterer, BeanRegisterer, ObserverRegisterer};
#[cfg(test)]
use mockall::automock;

/// Source of bean and observer definitions.
#[cfg_attr(test, automock)]
pub trait BeanDiscovery {
    fn beans(&self) -> Vec<Bean>;

    fn observers(&self) -> Vec<ObserverMethod>;

    /// Alternatives enabled explicitly, without a priority.
    fn enabled_alternatives(&self) -> Vec<BeanId>;
}

/// Discovers definitions registered statically with [register_bean](crate::register_bean),
/// [register_observer](crate::register_observer) and
/// [enable_alternative](crate::enable_alternative).
#[derive(Default, Copy, Clone, Debug)]
pub struct StaticDiscovery;

impl BeanDiscovery for StaticDiscovery {
    fn beans(&self) -> Vec<Bean> {
        inventory::iter::<BeanRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .collect()
    }

    fn observers(&self) -> Vec<ObserverMethod> {
        inventory::iter::<ObserverRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .collect()
    }

    fn enabled_alternatives(&self) -> Vec<BeanId> {
        inventory::iter::<AlternativeRegisterer>
            .into_iter()
            .map(|registerer| BeanId::from(registerer.bean))
            .collect()
    }
}

/// Registers a bean for [StaticDiscovery]. Takes a function returning the [Bean].
#[macro_export]
macro_rules! register_bean {
    ($register:expr) => {
        $crate::registry::internal::submit! {
            $crate::registry::internal::BeanRegisterer { register: $register }
        }
    };
}

/// Registers an observer method for [StaticDiscovery]. Takes a function returning the
/// [ObserverMethod].
#[macro_export]
macro_rules! register_observer {
    ($register:expr) => {
        $crate::registry::internal::submit! {
            $crate::registry::internal::ObserverRegisterer { register: $register }
        }
    };
}

/// Enables an alternative with given bean id for [StaticDiscovery].
#[macro_export]
macro_rules! enable_alternative {
    ($bean:literal) => {
        $crate::registry::internal::submit! {
            $crate::registry::internal::AlternativeRegisterer { bean: $bean }
        }
    };
}
