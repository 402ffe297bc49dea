use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use weld::config::{StaticConfigProvider, WeldConfig};
use weld::container::{
    before_destroyed, destroyed, initialized, BootstrapError, ContextLifecycleEvent, Weld,
};
use weld_core::bean::Bean;
use weld_core::context::APPLICATION_SCOPED;
use weld_core::error::RegistryError;
use weld_core::event::ObserverMethod;
use weld_core::instance_provider::ErrorPtr;
use weld_core::qualifier::Qualifier;
use weld_core::types::{Class, Type};

#[derive(Debug, thiserror::Error)]
#[error("Startup rejected")]
struct StartupRejected;

fn weld() -> Weld {
    let mut config = WeldConfig::default();
    config.install_tracing_logger = false;

    Weld::new()
        .without_discovery()
        .with_config_provider(Box::new(StaticConfigProvider::new(config)))
}

fn lifecycle_observer(
    id: &'static str,
    qualifier: Qualifier,
    log: &Arc<Mutex<Vec<&'static str>>>,
) -> ObserverMethod {
    let log = log.clone();
    ObserverMethod::builder(
        id,
        Type::class(&ContextLifecycleEvent::event_class()),
        move |context, _| {
            if let Some(event) = context.event_typed::<ContextLifecycleEvent>() {
                assert_eq!(event.scope, APPLICATION_SCOPED);
            }

            log.lock().push(id);
            Ok(())
        },
    )
    .qualifier(qualifier)
    .build()
}

#[test]
fn should_fire_lifecycle_events() {
    let log = Arc::new(Mutex::new(vec![]));
    let destroyed_instances = Arc::new(AtomicUsize::new(0));
    let counter = destroyed_instances.clone();

    let container = weld()
        .with_observer(lifecycle_observer(
            "initialized",
            initialized(&APPLICATION_SCOPED),
            &log,
        ))
        .with_observer(lifecycle_observer(
            "before_destroyed",
            before_destroyed(&APPLICATION_SCOPED),
            &log,
        ))
        .with_observer(lifecycle_observer(
            "destroyed",
            destroyed(&APPLICATION_SCOPED),
            &log,
        ))
        .with_bean(
            Bean::builder(Type::class(&Class::new("Service")), |_, _| Ok(()))
                .scope(APPLICATION_SCOPED)
                .on_destroy(move |_: &()| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        )
        .initialize()
        .unwrap();

    assert_eq!(*log.lock(), vec!["initialized"]);

    container
        .select(Type::class(&Class::new("Service")), [])
        .unwrap()
        .get()
        .unwrap();

    container.shutdown();
    container.shutdown();
    drop(container);

    assert_eq!(
        *log.lock(),
        vec!["initialized", "before_destroyed", "destroyed"]
    );
    assert_eq!(destroyed_instances.load(Ordering::SeqCst), 1);
}

#[test]
fn should_fail_when_startup_observer_fails() {
    let result = weld()
        .with_observer(
            ObserverMethod::builder(
                "reject",
                Type::class(&ContextLifecycleEvent::event_class()),
                |_, _| Err(Arc::new(StartupRejected) as ErrorPtr),
            )
            .qualifier(initialized(&APPLICATION_SCOPED))
            .build(),
        )
        .initialize();

    assert!(matches!(result, Err(BootstrapError::Initialization(_))));
}

#[test]
fn should_reject_duplicate_beans() {
    let bean = || Bean::builder(Type::class(&Class::new("Service")), |_, _| Ok(())).build();

    let result = weld().with_bean(bean()).with_bean(bean()).initialize();

    assert!(matches!(
        result,
        Err(BootstrapError::Registry(RegistryError::DuplicateBean(_)))
    ));
}

#[test]
fn should_enable_alternatives_per_container() {
    let service = Class::new("Service");
    let container = weld()
        .with_bean(Bean::builder(Type::class(&service), |_, _| Ok("default")).build())
        .with_bean(
            Bean::builder(Type::class(&service), |_, _| Ok("mock"))
                .id("MockService")
                .alternative()
                .build(),
        )
        .enable_alternative("MockService")
        .initialize()
        .unwrap();

    let service = container
        .select(Type::class(&service), [])
        .unwrap()
        .get_typed::<&'static str>()
        .unwrap();
    assert_eq!(*service, "mock");
}

#[test]
fn should_expose_config_bean() {
    let container = weld().initialize().unwrap();

    let config = container.config().unwrap();
    assert!(!config.install_tracing_logger);
    assert_eq!(config.resolution_cache_size, 65536);
}
