use std::sync::Arc;
use weld::container::{initialized, ContextLifecycleEvent, Weld};
use weld_core::bean::{Bean, InjectionPoint};
use weld_core::context::{APPLICATION_SCOPED, REQUEST_SCOPED};
use weld_core::event::ObserverMethod;
use weld_core::instance_provider::TypedInstanceProvider;
use weld_core::types::{Class, Type};
use weld_core::{register_bean, register_observer};

// a request scoped bean - each unit of work gets its own instance
struct RequestId(u32);

// another request scoped bean, depending on the one above
struct Greeter {
    request: Arc<RequestId>,
}

fn request_id() -> Bean {
    Bean::builder(Type::class(&Class::new("RequestId")), |_, _| Ok(RequestId(42)))
        .scope(REQUEST_SCOPED)
        .build()
}

fn greeter() -> Bean {
    let request = InjectionPoint::new("request", Type::class(&Class::new("RequestId")));
    let injected = request.clone();

    Bean::builder(Type::class(&Class::new("Greeter")), move |cc, provider| {
        Ok(Greeter {
            request: provider.injectable_reference_typed(&injected, cc)?,
        })
    })
    .scope(REQUEST_SCOPED)
    .injection_point(request)
    .build()
}

// observers can react to the container starting up
fn on_startup() -> ObserverMethod {
    ObserverMethod::builder(
        "onStartup",
        Type::class(&ContextLifecycleEvent::event_class()),
        |_, _| {
            println!("Container started!");
            Ok(())
        },
    )
    .qualifier(initialized(&APPLICATION_SCOPED))
    .build()
}

register_bean!(request_id);
register_bean!(greeter);
register_observer!(on_startup);

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // discovers all registered beans, validates them and starts the container
    let container = Weld::new()
        .initialize()
        .expect("error initializing container");

    // request scoped beans are only available inside a unit of work
    let unit = container.unit_of_work();
    let greeter = unit
        .select(Type::class(&Class::new("Greeter")), [])
        .expect("invalid lookup")
        .get_typed::<Greeter>()
        .expect("error creating Greeter");

    println!("Hello from request {}!", greeter.request.0);

    // ending the unit of work destroys its request scoped instances
    unit.end();

    // the container is also shut down when dropped
    container.shutdown();
}
