//! Container bootstrap based on [weld_core] contexts and dependency injection.
//!
//! [weld_core] provides the building blocks: bean registries, resolution, contexts and events. This
//! crate puts them together in the form of a [Weld](container::Weld) builder, which discovers beans,
//! applies [configuration](config), validates the deployment and manages the lifecycle of the
//! resulting [WeldContainer](container::WeldContainer), including supporting infrastructure, e.g.
//! logging.
//!
//! ### Features
//!
//! * `async` - enable asynchronous events in [weld_core]

pub mod config;
pub mod container;

pub use weld_core;
