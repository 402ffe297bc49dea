use std::sync::Arc;
use weld_core::bean::{Bean, InjectionPoint};
use weld_core::context::{APPLICATION_SCOPED, DEPENDENT};
use weld_core::instance_provider::TypedInstanceProvider;
use weld_core::manager::BeanManagerBuilder;
use weld_core::registry::{BeanRegistryBuilder, StaticDiscovery};
use weld_core::types::{Class, ClassPtr, Type};
use weld_core::register_bean;

// this is a trait we would like to inject
trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self) -> String {
        "Hello world!".to_string()
    }
}

// a service which depends on any Greeter
struct Service {
    greeter: Arc<Box<dyn Greeter>>,
}

fn greeter_class() -> ClassPtr {
    Class::new("Greeter")
}

// beans describe how to create instances of their class - the class hierarchy determines which
// types the bean can be injected as
fn english_greeter() -> Bean {
    Bean::builder(
        Type::class(
            &Class::builder("EnglishGreeter")
                .extends(Type::class(&greeter_class()))
                .build(),
        ),
        |_, _| Ok(Box::new(EnglishGreeter) as Box<dyn Greeter>),
    )
    .scope(DEPENDENT)
    .build()
}

fn service() -> Bean {
    // declared injection points are validated before the container is used
    let greeter = InjectionPoint::new("greeter", Type::class(&greeter_class()));
    let injected = greeter.clone();

    Bean::builder(Type::class(&Class::new("Service")), move |cc, provider| {
        Ok(Service {
            greeter: provider.injectable_reference_typed(&injected, cc)?,
        })
    })
    .scope(APPLICATION_SCOPED)
    .injection_point(greeter)
    .build()
}

// registered beans are discovered automatically
register_bean!(english_greeter);
register_bean!(service);

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let registry = BeanRegistryBuilder::new()
        .discover(&StaticDiscovery)
        .expect("error discovering beans")
        .build()
        .expect("error building bean registry");

    let manager = BeanManagerBuilder::new(registry).build();
    manager.validate().expect("invalid deployment");

    // a dynamic lookup of the service
    let service = manager
        .select(Type::class(&Class::new("Service")), [])
        .expect("invalid lookup")
        .get_typed::<Service>()
        .expect("error creating Service");

    println!("{}", service.greeter.greet());

    // destroys application scoped instances along with their dependents
    manager.shutdown();
}
