//! Typesafe resolution of beans and observer methods. A [Resolvable] describes what is being
//! looked up: required types and qualifiers. Resolution results are cached per resolvable, up to
//! a configurable number of entries.

mod assignability;
mod bean_resolver;
mod observer_resolver;

pub use assignability::{
    AssignabilityRules, BeanTypeAssignabilityRules, EventTypeAssignabilityRules,
};
pub use bean_resolver::{BeanSetPtr, TypeSafeBeanResolver};
pub use observer_resolver::{ObserverSetPtr, TypeSafeObserverResolver};

use crate::bean::InjectionPoint;
use crate::error::ResolutionError;
use crate::qualifier::{Qualifier, QualifierSet, ANY, NAMED};
use crate::types::Type;
use fxhash::FxHashSet;

/// Default number of cached resolution results.
pub const DEFAULT_RESOLUTION_CACHE_SIZE: usize = 0x10000;

/// A lookup key for typesafe resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Resolvable {
    required_type: Type,
    types: Vec<Type>,
    qualifiers: QualifierSet,
}

impl Resolvable {
    /// Resolvable for given type with the default qualifier.
    pub fn of(required_type: Type) -> Result<Self, ResolutionError> {
        ResolvableBuilder::new(required_type).build()
    }

    /// Resolvable matching observers of given event. The event type cannot contain type
    /// variables. Every event has the [ANY] qualifier, and the default one when no other
    /// qualifiers are given.
    pub fn for_event<Q: IntoIterator<Item = Qualifier>>(
        event_type: &Type,
        qualifiers: Q,
    ) -> Result<Self, ResolutionError> {
        if event_type.contains_type_variable() {
            return Err(ResolutionError::IllegalEventType(event_type.clone()));
        }

        let mut qualifiers = collect_qualifiers(qualifiers, None)?;
        if !qualifiers
            .iter()
            .any(|qualifier| qualifier.kind() != NAMED && qualifier.kind() != ANY)
        {
            qualifiers.insert(Qualifier::default_qualifier());
        }
        qualifiers.insert(Qualifier::any());

        let mut types: Vec<Type> = event_type.closure().into_iter().collect();
        types.sort_by_cached_key(Type::to_string);

        Ok(Self {
            required_type: event_type.clone(),
            types,
            qualifiers,
        })
    }

    #[inline]
    pub fn required_type(&self) -> &Type {
        &self.required_type
    }

    /// All types taking part in resolution. For beans this is just the required type, for events
    /// the whole event type closure.
    #[inline]
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    #[inline]
    pub fn qualifiers(&self) -> &QualifierSet {
        &self.qualifiers
    }
}

/// Builds [Resolvable]s for bean lookups, normalizing and validating qualifiers.
#[derive(Clone, Debug)]
pub struct ResolvableBuilder {
    required_type: Type,
    qualifiers: Vec<Qualifier>,
    member: Option<String>,
}

impl ResolvableBuilder {
    pub fn new(required_type: Type) -> Self {
        Self {
            required_type,
            qualifiers: vec![],
            member: None,
        }
    }

    /// Starts from an injection point. An empty `@Named` value is replaced with the member name.
    pub fn from_injection_point(injection_point: &InjectionPoint) -> Self {
        Self {
            required_type: injection_point.required_type().clone(),
            qualifiers: injection_point.qualifiers().to_vec(),
            member: Some(injection_point.member().to_string()),
        }
    }

    pub fn qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn qualifiers<Q: IntoIterator<Item = Qualifier>>(mut self, qualifiers: Q) -> Self {
        self.qualifiers.extend(qualifiers);
        self
    }

    /// Validates the required type and qualifiers. Type variables and wildcards cannot be
    /// required directly. No qualifiers means the default qualifier.
    pub fn build(self) -> Result<Resolvable, ResolutionError> {
        if !self.required_type.is_actual() {
            return Err(ResolutionError::IllegalRequiredType(self.required_type));
        }

        let mut qualifiers = collect_qualifiers(self.qualifiers, self.member.as_deref())?;
        if qualifiers.is_empty() {
            qualifiers.insert(Qualifier::default_qualifier());
        }

        Ok(Resolvable {
            types: vec![self.required_type.clone()],
            required_type: self.required_type,
            qualifiers,
        })
    }
}

fn collect_qualifiers<Q: IntoIterator<Item = Qualifier>>(
    qualifiers: Q,
    member: Option<&str>,
) -> Result<QualifierSet, ResolutionError> {
    let mut kinds = FxHashSet::default();
    let mut result = QualifierSet::new();

    for qualifier in qualifiers {
        let qualifier = match (qualifier.name(), member) {
            (Some(""), Some(member)) => Qualifier::named(member.to_string()),
            _ => qualifier,
        };

        if !qualifier.is_repeatable() && !kinds.insert(qualifier.kind().to_string()) {
            return Err(ResolutionError::DuplicateQualifier(
                qualifier.kind().to_string(),
            ));
        }

        result.insert(qualifier);
    }

    Ok(result)
}
