use crate::bean::{BeanId, BeanPtr};
use crate::error::ResolutionError;
use crate::registry::BeanRegistry;
use crate::resolution::{AssignabilityRules, BeanTypeAssignabilityRules, Resolvable};
use dashmap::DashMap;
use fxhash::FxHashSet;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

pub type BeanSetPtr = Arc<[BeanPtr]>;

/// Resolves beans by type and qualifiers, or by name. Results are cached until
/// [cleared](TypeSafeBeanResolver::clear), since the registry cannot change.
#[derive(Debug)]
pub struct TypeSafeBeanResolver {
    registry: Arc<BeanRegistry>,
    rules: BeanTypeAssignabilityRules,
    cache_size: usize,
    resolved: DashMap<Resolvable, BeanSetPtr>,
    named: DashMap<String, BeanSetPtr>,
}

impl TypeSafeBeanResolver {
    pub fn new(registry: Arc<BeanRegistry>, cache_size: usize) -> Self {
        Self {
            registry,
            rules: BeanTypeAssignabilityRules,
            cache_size,
            resolved: DashMap::new(),
            named: DashMap::new(),
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<BeanRegistry> {
        &self.registry
    }

    /// Returns enabled beans matching given resolvable, with alternatives taking precedence over
    /// other beans.
    pub fn resolve(&self, resolvable: &Resolvable) -> BeanSetPtr {
        if let Some(beans) = self.resolved.get(resolvable) {
            return beans.clone();
        }

        debug!(
            required_type = %resolvable.required_type(),
            qualifiers = %resolvable.qualifiers(),
            "Resolving beans."
        );

        let beans = self
            .registry
            .bean_candidates(resolvable.required_type())
            .into_iter()
            .filter(|bean| {
                self.rules
                    .matches_any(resolvable.required_type(), bean.types().iter())
                    && bean.qualifiers().contains_all(resolvable.qualifiers())
            })
            .collect();

        cached(
            &self.resolved,
            self.cache_size,
            resolvable.clone(),
            disambiguate(beans).into(),
        )
    }

    /// Resolves a single bean for injection.
    pub fn resolve_unique(&self, resolvable: &Resolvable) -> Result<BeanPtr, ResolutionError> {
        let beans = self.resolve(resolvable);
        match &*beans {
            [bean] => Ok(bean.clone()),
            [] => Err(ResolutionError::UnsatisfiedDependency {
                required_type: resolvable.required_type().clone(),
                qualifiers: resolvable.qualifiers().clone(),
            }),
            beans => Err(ResolutionError::AmbiguousDependency {
                required_type: resolvable.required_type().clone(),
                qualifiers: resolvable.qualifiers().clone(),
                candidates: bean_ids(beans),
            }),
        }
    }

    /// Resolves a single bean by name.
    pub fn resolve_by_name(&self, name: &str) -> Result<BeanPtr, ResolutionError> {
        let beans = match self.named.get(name) {
            Some(beans) => beans.clone(),
            None => cached(
                &self.named,
                self.cache_size,
                name.to_string(),
                disambiguate(self.registry.beans_by_name(name)).into(),
            ),
        };

        match &*beans {
            [bean] => Ok(bean.clone()),
            [] => Err(ResolutionError::UnsatisfiedName(name.to_string())),
            beans => Err(ResolutionError::AmbiguousName {
                name: name.to_string(),
                candidates: bean_ids(beans),
            }),
        }
    }

    /// Number of cached results.
    pub fn cached_len(&self) -> usize {
        self.resolved.len() + self.named.len()
    }

    pub fn clear(&self) {
        self.resolved.clear();
        self.named.clear();
    }
}

/// Stores a result unless the cache is full. Concurrent first resolutions converge on the first
/// stored value.
pub(crate) fn cached<K, V>(cache: &DashMap<K, V>, cache_size: usize, key: K, value: V) -> V
where
    K: Eq + Hash,
    V: Clone,
{
    if cache.len() >= cache_size {
        return value;
    }

    cache.entry(key).or_insert(value).clone()
}

fn bean_ids(beans: &[BeanPtr]) -> Vec<BeanId> {
    beans.iter().map(|bean| bean.id().clone()).collect()
}

fn disambiguate(mut beans: Vec<BeanPtr>) -> Vec<BeanPtr> {
    if beans.len() > 1 && beans.iter().any(|bean| bean.is_alternative()) {
        beans.retain(|bean| bean.is_alternative());

        if beans.len() > 1 && beans.iter().all(|bean| bean.priority().is_some()) {
            let highest = beans.iter().filter_map(|bean| bean.priority()).max();
            beans.retain(|bean| bean.priority() == highest);
        }
    }

    if beans.len() > 1 {
        let specialized: FxHashSet<BeanId> = beans
            .iter()
            .filter_map(|bean| bean.specializes().cloned())
            .collect();
        beans.retain(|bean| !specialized.contains(bean.id()));
    }

    beans
}

#[cfg(test)]
mod tests {
    use crate::bean::{Bean, BeanId};
    use crate::error::ResolutionError;
    use crate::qualifier::Qualifier;
    use crate::registry::{BeanRegistry, BeanRegistryBuilder};
    use crate::resolution::{Resolvable, ResolvableBuilder, TypeSafeBeanResolver};
    use crate::types::{Class, ClassPtr, Type, TypeVariable};
    use std::sync::Arc;

    struct Classes {
        animal: ClassPtr,
        dog: ClassPtr,
        cat: ClassPtr,
    }

    fn classes() -> Classes {
        let animal = Class::new("Animal");
        Classes {
            dog: Class::builder("Dog").extends(Type::class(&animal)).build(),
            cat: Class::builder("Cat").extends(Type::class(&animal)).build(),
            animal,
        }
    }

    fn registry(beans: Vec<Bean>) -> Arc<BeanRegistry> {
        let mut builder = BeanRegistryBuilder::new();
        for bean in beans {
            builder.register_bean(bean).unwrap();
        }

        Arc::new(builder.build().unwrap())
    }

    fn tame() -> Qualifier {
        Qualifier::new("Tame")
    }

    #[test]
    fn should_prefer_enabled_alternative() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(()))
                    .qualifier(tame())
                    .build(),
                Bean::builder(Type::class(&classes.cat), |_, _| Ok(()))
                    .qualifier(tame())
                    .alternative()
                    .priority(1)
                    .build(),
            ]),
            16,
        );

        let resolvable = ResolvableBuilder::new(Type::class(&classes.animal))
            .qualifier(tame())
            .build()
            .unwrap();

        let bean = resolver.resolve_unique(&resolvable).unwrap();
        assert_eq!(bean.id(), &BeanId::from("Cat"));
    }

    #[test]
    fn should_report_ambiguity() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(())).build(),
                Bean::builder(Type::class(&classes.cat), |_, _| Ok(())).build(),
            ]),
            16,
        );

        let result = resolver.resolve_unique(&Resolvable::of(Type::class(&classes.animal)).unwrap());
        assert!(matches!(
            result,
            Err(ResolutionError::AmbiguousDependency { candidates, .. }) if candidates.len() == 2
        ));
    }

    #[test]
    fn should_report_unsatisfied_dependency() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(())).build()
            ]),
            16,
        );

        let resolvable = ResolvableBuilder::new(Type::class(&classes.dog))
            .qualifier(tame())
            .build()
            .unwrap();

        assert!(matches!(
            resolver.resolve_unique(&resolvable),
            Err(ResolutionError::UnsatisfiedDependency { .. })
        ));
    }

    #[test]
    fn should_match_qualifier_superset() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![Bean::builder(Type::class(&classes.dog), |_, _| Ok(()))
                .qualifier(tame())
                .qualifier(Qualifier::new("Loud"))
                .build()]),
            16,
        );

        let request = |qualifiers: Vec<Qualifier>| {
            ResolvableBuilder::new(Type::class(&classes.dog))
                .qualifiers(qualifiers)
                .build()
                .unwrap()
        };

        assert_eq!(resolver.resolve(&request(vec![tame()])).len(), 1);
        assert_eq!(
            resolver
                .resolve(&request(vec![tame(), Qualifier::new("Loud")]))
                .len(),
            1
        );
        assert!(resolver
            .resolve(&request(vec![tame(), Qualifier::new("Small")]))
            .is_empty());
        assert!(resolver.resolve(&request(vec![])).is_empty());
    }

    #[test]
    fn should_apply_default_qualifier_to_object() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(())).build(),
                Bean::builder(Type::class(&classes.cat), |_, _| Ok(()))
                    .qualifier(tame())
                    .build(),
            ]),
            16,
        );

        let beans = resolver.resolve(&Resolvable::of(Type::object()).unwrap());
        assert_eq!(beans.len(), 1);
        assert_eq!(beans[0].id(), &BeanId::from("Dog"));
    }

    #[test]
    fn should_cache_results() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(())).build()
            ]),
            16,
        );

        let resolvable = Resolvable::of(Type::class(&classes.animal)).unwrap();
        let first = resolver.resolve(&resolvable);
        let second = resolver.resolve(&resolvable);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first[0], &second[0]));

        resolver.clear();
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn should_not_cache_beyond_limit() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(())).build()
            ]),
            1,
        );

        resolver.resolve(&Resolvable::of(Type::class(&classes.animal)).unwrap());
        let dog = resolver.resolve(&Resolvable::of(Type::class(&classes.dog)).unwrap());

        assert_eq!(dog.len(), 1);
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn should_resolve_parameterized_types() {
        let list = Class::builder("List")
            .type_parameter(TypeVariable::new("E"))
            .build();
        let string = Class::new("String");
        let integer = Class::new("Integer");

        let resolver = TypeSafeBeanResolver::new(
            registry(vec![Bean::builder(
                Type::parameterized(&list, [Type::class(&string)]),
                |_, _| Ok(()),
            )
            .id("strings")
            .build()]),
            16,
        );

        let strings =
            Resolvable::of(Type::parameterized(&list, [Type::class(&string)])).unwrap();
        let integers =
            Resolvable::of(Type::parameterized(&list, [Type::class(&integer)])).unwrap();
        let any = Resolvable::of(Type::parameterized(&list, [Type::wildcard()])).unwrap();

        assert_eq!(resolver.resolve(&strings).len(), 1);
        assert!(resolver.resolve(&integers).is_empty());
        assert_eq!(resolver.resolve(&any).len(), 1);
    }

    #[test]
    fn should_resolve_by_name() {
        let classes = classes();
        let resolver = TypeSafeBeanResolver::new(
            registry(vec![
                Bean::builder(Type::class(&classes.dog), |_, _| Ok(()))
                    .name("pet")
                    .build(),
                Bean::builder(Type::class(&classes.cat), |_, _| Ok(()))
                    .name("pet")
                    .build(),
            ]),
            16,
        );

        assert!(matches!(
            resolver.resolve_by_name("pet"),
            Err(ResolutionError::AmbiguousName { .. })
        ));
        assert!(matches!(
            resolver.resolve_by_name("owner"),
            Err(ResolutionError::UnsatisfiedName(_))
        ));
    }
}
