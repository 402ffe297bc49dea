use weld_core::bean::Bean;
use weld_core::context::APPLICATION_SCOPED;
use weld_core::event::{ObserverMethod, Reception};
use weld_core::instance_provider::ErrorPtr;
use weld_core::manager::BeanManagerBuilder;
use weld_core::qualifier::Qualifier;
use weld_core::registry::{BeanRegistryBuilder, StaticDiscovery};
use weld_core::types::{Class, Type};
use weld_core::{register_bean, register_observer};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
#[error("Unexpected receiver")]
struct UnexpectedReceiver;

// an event payload - any Send + Sync type can be fired
struct OrderPlaced {
    id: u32,
}

#[derive(Default)]
struct Audit {
    entries: Mutex<Vec<String>>,
}

fn audit() -> Bean {
    Bean::builder(Type::class(&Class::new("Audit")), |_, _| Ok(Audit::default()))
        .scope(APPLICATION_SCOPED)
        .build()
}

// observers with a declaring bean are notified on an instance of that bean
fn audit_orders() -> ObserverMethod {
    ObserverMethod::builder(
        "Audit.onOrder",
        Type::class(&Class::new("OrderPlaced")),
        |context, receiver| {
            let audit = receiver
                .and_then(|receiver| receiver.downcast_ref::<Audit>())
                .ok_or_else(|| Arc::new(UnexpectedReceiver) as ErrorPtr)?;

            if let Some(order) = context.event_typed::<OrderPlaced>() {
                audit.entries.lock().push(format!("order {}", order.id));
            }

            Ok(())
        },
    )
    .declaring_bean("Audit")
    .build()
}

// this observer is only interested in priority orders, and is notified before the audit
fn expedite() -> ObserverMethod {
    ObserverMethod::builder(
        "expedite",
        Type::class(&Class::new("OrderPlaced")),
        |context, _| {
            if let Some(order) = context.event_typed::<OrderPlaced>() {
                println!("Expediting order {}", order.id);
            }

            Ok(())
        },
    )
    .qualifier(Qualifier::new("Priority"))
    .priority(100)
    .reception(Reception::Always)
    .build()
}

register_bean!(audit);
register_observer!(audit_orders);
register_observer!(expedite);

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let registry = BeanRegistryBuilder::new()
        .discover(&StaticDiscovery)
        .expect("error discovering beans")
        .build()
        .expect("error building bean registry");
    let manager = BeanManagerBuilder::new(registry).build();

    let orders = manager.event(Type::class(&Class::new("OrderPlaced")));
    orders
        .fire_typed(OrderPlaced { id: 1 })
        .expect("error firing event");

    // qualified events reach both qualified and unqualified observers
    orders
        .select([Qualifier::new("Priority")])
        .fire_typed(OrderPlaced { id: 2 })
        .expect("error firing event");

    let audit = manager
        .select(Type::class(&Class::new("Audit")), [])
        .expect("invalid lookup")
        .get_typed::<Audit>()
        .expect("error creating Audit");

    println!("Audit log: {:?}", audit.entries.lock());
}
