use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use weld_core::bean::{Bean, BeanId};
use weld_core::context::{BeanStore, Scope, APPLICATION_SCOPED, DEPENDENT, SESSION_SCOPED};
use weld_core::creational::CreationalContext;
use weld_core::error::InstanceProviderError;
use weld_core::instance_provider::{InstanceAnyPtr, InstanceProvider, TypedInstanceProvider};
use weld_core::manager::{BeanManager, BeanManagerBuilder};
use weld_core::registry::BeanRegistryBuilder;
use weld_core::types::{Class, Type};

struct Engine;

struct Car {
    #[allow(dead_code)]
    engine: InstanceAnyPtr,
}

struct Visits(usize);

fn manager(beans: Vec<Bean>) -> BeanManager {
    let mut builder = BeanRegistryBuilder::new();
    for bean in beans {
        builder.register_bean(bean).unwrap();
    }

    BeanManagerBuilder::new(builder.build().unwrap()).build()
}

fn counting_bean(name: &'static str, scope: Scope, created: Arc<AtomicUsize>) -> Bean {
    Bean::builder(Type::class(&Class::new(name)), move |_, _| {
        // widen the window for concurrent creation
        thread::sleep(Duration::from_millis(10));
        Ok(Visits(created.fetch_add(1, Ordering::SeqCst)))
    })
    .scope(scope)
    .build()
}

#[test]
fn should_destroy_dependents_with_their_parent() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();

    let manager = manager(vec![
        Bean::builder(Type::class(&Class::new("Engine")), |_, _| Ok(Engine))
            .scope(DEPENDENT)
            .on_destroy(move |_: &Engine| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
        Bean::builder(Type::class(&Class::new("Car")), |cc, provider| {
            Ok(Car {
                engine: provider.reference(&BeanId::from("Engine"), cc)?,
            })
        })
        .scope(APPLICATION_SCOPED)
        .build(),
    ]);

    manager
        .reference_typed::<Car>(&BeanId::from("Car"), &CreationalContext::new(None))
        .unwrap();
    assert_eq!(destroyed.load(Ordering::SeqCst), 0);

    manager.shutdown();
    manager.shutdown();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn should_create_application_instance_once_under_contention() {
    let created = Arc::new(AtomicUsize::new(0));
    let manager = manager(vec![counting_bean(
        "Shared",
        APPLICATION_SCOPED,
        created.clone(),
    )]);
    let barrier = Barrier::new(8);

    let instances: Vec<InstanceAnyPtr> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    manager
                        .reference(&BeanId::from("Shared"), &CreationalContext::new(None))
                        .unwrap()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(instances
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn should_share_session_between_concurrent_units() {
    let created = Arc::new(AtomicUsize::new(0));
    let manager = manager(vec![counting_bean(
        "Cart",
        SESSION_SCOPED,
        created.clone(),
    )]);
    let session = Arc::new(BeanStore::new());
    let barrier = Barrier::new(4);

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let unit = manager
                    .unit_of_work()
                    .with_session(session.clone())
                    .unwrap();
                barrier.wait();
                unit.reference_typed::<Visits>(&BeanId::from("Cart"), &CreationalContext::new(None))
                    .unwrap();
            });
        }
    });

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(!session.is_empty());

    // a fresh session store gets its own instance
    let unit = manager
        .unit_of_work()
        .with_session(Arc::new(BeanStore::new()))
        .unwrap();
    let cart = unit
        .reference_typed::<Visits>(&BeanId::from("Cart"), &CreationalContext::new(None))
        .unwrap();
    assert_eq!(cart.0, 1);
}

#[test]
fn should_keep_dependents_of_released_context_independent() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    let manager = manager(vec![Bean::builder(
        Type::class(&Class::new("Engine")),
        |_, _| Ok(Engine),
    )
    .on_destroy(move |_: &Engine| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .build()]);

    let first = CreationalContext::new(None);
    let second = CreationalContext::new(None);
    manager.reference(&BeanId::from("Engine"), &first).unwrap();
    manager.reference(&BeanId::from("Engine"), &second).unwrap();

    first.release();
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);

    second.release();
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

fn mutual_bean(name: &'static str, other: &'static str, barrier: Arc<Barrier>) -> Bean {
    let waited = AtomicBool::new(false);
    Bean::builder(Type::class(&Class::new(name)), move |cc, provider| {
        // both threads hold their own creation before asking for the other one
        if !waited.swap(true, Ordering::SeqCst) {
            barrier.wait();
        }

        Ok(Car {
            engine: provider.reference(&BeanId::from(other), cc)?,
        })
    })
    .scope(APPLICATION_SCOPED)
    .build()
}

#[test]
fn should_fail_concurrent_mutual_creation_instead_of_blocking() {
    let barrier = Arc::new(Barrier::new(2));
    let manager = Arc::new(manager(vec![
        mutual_bean("A", "B", barrier.clone()),
        mutual_bean("B", "A", barrier),
    ]));
    let (sender, receiver) = mpsc::channel();

    for name in ["A", "B"] {
        let manager = manager.clone();
        let sender = sender.clone();
        thread::spawn(move || {
            let result = manager.reference(&BeanId::from(name), &CreationalContext::new(None));
            let _ = sender.send(result.map(|_| ()));
        });
    }

    let results: Vec<_> = (0..2)
        .map(|_| {
            receiver
                .recv_timeout(Duration::from_secs(5))
                .expect("Creation did not finish")
        })
        .collect();

    assert!(results
        .iter()
        .any(|result| matches!(result, Err(InstanceProviderError::DependencyCycle(_)))));
    assert!(results.iter().all(|result| result.is_err()));
}
