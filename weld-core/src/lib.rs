//! Contexts and dependency injection core.
//!
//! Beans are registered in a [BeanRegistry](registry::BeanRegistry), either directly or through a
//! [BeanDiscovery](registry::BeanDiscovery). The resulting registry is immutable and shared by
//! the [BeanManager](manager::BeanManager), which resolves beans by type and qualifiers, manages
//! contextual instances of different [scopes](context::Scope) and delivers events to
//! [observer methods](event::ObserverMethod).
//!
//! ```
//! use weld_core::bean::Bean;
//! use weld_core::context::APPLICATION_SCOPED;
//! use weld_core::manager::BeanManagerBuilder;
//! use weld_core::qualifier::Qualifier;
//! use weld_core::registry::BeanRegistryBuilder;
//! use weld_core::types::{Class, Type};
//!
//! trait Animal: Send + Sync {
//!     fn sound(&self) -> &'static str;
//! }
//!
//! struct Dog;
//!
//! impl Animal for Dog {
//!     fn sound(&self) -> &'static str {
//!         "woof"
//!     }
//! }
//!
//! let animal = Class::new("Animal");
//! let dog = Class::builder("Dog").extends(Type::class(&animal)).build();
//!
//! let registry = BeanRegistryBuilder::new()
//!     .with_bean(
//!         Bean::builder(Type::class(&dog), |_, _| Ok(Box::new(Dog) as Box<dyn Animal>))
//!             .scope(APPLICATION_SCOPED)
//!             .qualifier(Qualifier::new("Tame"))
//!             .build(),
//!     )
//!     .and_then(|builder| builder.build())
//!     .unwrap();
//!
//! let manager = BeanManagerBuilder::new(registry).build();
//! let tame = manager
//!     .select(Type::class(&animal), [Qualifier::new("Tame")])
//!     .unwrap();
//!
//! assert_eq!(tame.get_typed::<Box<dyn Animal>>().unwrap().sound(), "woof");
//! ```

pub mod bean;
pub mod context;
pub mod creational;
pub mod error;
pub mod event;
#[cfg(feature = "async")]
pub mod future;
pub mod instance;
pub mod instance_provider;
pub mod manager;
pub mod qualifier;
pub mod registry;
pub mod resolution;
pub mod types;
