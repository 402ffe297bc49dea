use std::sync::Arc;
use weld_core::bean::{Bean, BeanId, InjectionPoint};
use weld_core::context::APPLICATION_SCOPED;
use weld_core::creational::CreationalContext;
use weld_core::error::{InstanceProviderError, ResolutionError};
use weld_core::instance_provider::TypedInstanceProvider;
use weld_core::manager::{BeanManager, BeanManagerBuilder};
use weld_core::qualifier::Qualifier;
use weld_core::registry::{BeanRegistryBuilder, StaticDiscovery};
use weld_core::resolution::{Resolvable, ResolvableBuilder};
use weld_core::types::{Class, ClassPtr, Type};
use weld_core::{enable_alternative, register_bean};

struct Animal(&'static str);

fn animal_class() -> ClassPtr {
    Class::new("Animal")
}

fn animal_bean(name: &'static str) -> Bean {
    Bean::builder(
        Type::class(&Class::builder(name).extends(Type::class(&animal_class())).build()),
        move |_, _| Ok(Animal(name)),
    )
    .qualifier(Qualifier::new("Tame"))
    .build()
}

fn manager(beans: Vec<Bean>) -> BeanManager {
    let mut builder = BeanRegistryBuilder::new();
    for bean in beans {
        builder.register_bean(bean).unwrap();
    }

    BeanManagerBuilder::new(builder.build().unwrap()).build()
}

fn tame_animal() -> Resolvable {
    ResolvableBuilder::new(Type::class(&animal_class()))
        .qualifier(Qualifier::new("Tame"))
        .build()
        .unwrap()
}

#[test]
fn should_prefer_enabled_alternative() {
    let dog = animal_bean("Dog");
    let cat = Bean::builder(
        Type::class(
            &Class::builder("Cat")
                .extends(Type::class(&animal_class()))
                .build(),
        ),
        |_, _| Ok(Animal("Cat")),
    )
    .qualifier(Qualifier::new("Tame"))
    .alternative()
    .build();

    let mut builder = BeanRegistryBuilder::new();
    builder.register_bean(dog).unwrap();
    builder.register_bean(cat).unwrap();
    builder.enable_alternative("Cat");
    let manager = BeanManagerBuilder::new(builder.build().unwrap()).build();

    let bean = manager.resolve(&tame_animal()).unwrap();
    assert_eq!(bean.id(), &BeanId::from("Cat"));

    let instance = manager
        .reference_typed::<Animal>(bean.id(), &CreationalContext::new(None))
        .unwrap();
    assert_eq!(instance.0, "Cat");
}

#[test]
fn should_report_ambiguous_dependency() {
    let manager = manager(vec![animal_bean("Dog"), animal_bean("Cat")]);

    match manager.resolve(&tame_animal()) {
        Err(ResolutionError::AmbiguousDependency { mut candidates, .. }) => {
            candidates.sort();
            assert_eq!(candidates, vec![BeanId::from("Cat"), BeanId::from("Dog")]);
        }
        other => panic!("Expected ambiguous dependency, got: {other:?}"),
    }
}

#[test]
fn should_return_identical_results() {
    let manager = manager(vec![animal_bean("Dog")]);

    let first = manager.resolve(&tame_animal()).unwrap();
    let second = manager.resolve(&tame_animal()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let first = manager.resolve_all(&tame_animal());
    let second = manager.resolve_all(&tame_animal());
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn should_inject_by_injection_point() {
    let manager = manager(vec![animal_bean("Dog")]);

    let injection_point = InjectionPoint::new("pet", Type::class(&animal_class()))
        .qualifier(Qualifier::new("Tame"));
    let pet = manager
        .injectable_reference_typed::<Animal>(&injection_point, &CreationalContext::new(None))
        .unwrap();
    assert_eq!(pet.0, "Dog");

    let untamed = InjectionPoint::new("pet", Type::class(&animal_class()));
    assert!(matches!(
        manager.injectable_reference_typed::<Animal>(&untamed, &CreationalContext::new(None)),
        Err(InstanceProviderError::Resolution(
            ResolutionError::UnsatisfiedDependency { .. }
        ))
    ));
}

#[test]
fn should_resolve_named_injection_points() {
    let manager = manager(vec![
        Bean::builder(Type::class(&Class::new("Config")), |_, _| Ok(1))
            .name("timeout")
            .build(),
        Bean::builder(Type::class(&Class::new("Config")), |_, _| Ok(2))
            .id("retries")
            .name("retries")
            .build(),
    ]);

    let injection_point = InjectionPoint::new("retries", Type::class(&Class::new("Config")))
        .qualifier(Qualifier::named(""));
    let retries = manager
        .injectable_reference_typed::<i32>(&injection_point, &CreationalContext::new(None))
        .unwrap();
    assert_eq!(*retries, 2);

    let bean = manager.resolve_by_name("timeout").unwrap();
    assert_eq!(bean.id(), &BeanId::from("Config"));
}

fn discovered_service() -> Bean {
    Bean::builder(Type::class(&Class::new("DiscoveredService")), |_, _| {
        Ok("discovered")
    })
    .scope(APPLICATION_SCOPED)
    .build()
}

fn discovered_alternative() -> Bean {
    Bean::builder(Type::class(&Class::new("DiscoveredService")), |_, _| {
        Ok("alternative")
    })
    .id("DiscoveredAlternative")
    .alternative()
    .build()
}

register_bean!(discovered_service);
register_bean!(discovered_alternative);
enable_alternative!("DiscoveredAlternative");

#[test]
fn should_discover_registered_beans() {
    let registry = BeanRegistryBuilder::new()
        .discover(&StaticDiscovery)
        .unwrap()
        .build()
        .unwrap();
    let manager = BeanManagerBuilder::new(registry).build();

    let service = manager
        .select(Type::class(&Class::new("DiscoveredService")), [])
        .unwrap();
    assert_eq!(
        *service.get_typed::<&'static str>().unwrap(),
        "alternative"
    );
}
