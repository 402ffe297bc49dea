//! Runtime model of generic types used for typesafe resolution. Beans and events are matched by
//! their [Type]s, which can be plain classes, parameterized types, arrays, wildcards or type
//! variables. Classes know their type parameters and direct supertypes, which allows computing the
//! full type closure of any type, including substitution of actual type arguments into generic
//! supertypes.
//!
//! There is a single root type - [Object](Class::object), which is a supertype of every other
//! type.

use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Name of the root type.
pub const OBJECT: &str = "Object";

pub type ClassPtr = Arc<Class>;

/// A named raw type with optional type parameters. Classes are identified by name, apart from
/// the root class, which differs from any user class of the same name.
#[derive(Debug)]
pub struct Class {
    name: Cow<'static, str>,
    type_parameters: Vec<TypeVariable>,
    supertypes: Vec<Type>,
    root: bool,
}

impl Class {
    /// Creates a non-generic class, which directly extends [Object](Class::object).
    pub fn new<N: Into<Cow<'static, str>>>(name: N) -> ClassPtr {
        Self::builder(name).build()
    }

    pub fn builder<N: Into<Cow<'static, str>>>(name: N) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            type_parameters: vec![],
            supertypes: vec![],
        }
    }

    /// Returns the root class.
    pub fn object() -> ClassPtr {
        static OBJECT_CLASS: OnceLock<ClassPtr> = OnceLock::new();
        OBJECT_CLASS
            .get_or_init(|| {
                Arc::new(Class {
                    name: Cow::Borrowed(OBJECT),
                    type_parameters: vec![],
                    supertypes: vec![],
                    root: true,
                })
            })
            .clone()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_parameters(&self) -> &[TypeVariable] {
        &self.type_parameters
    }

    /// Direct supertypes, possibly referring to this class's type parameters.
    #[inline]
    pub fn supertypes(&self) -> &[Type] {
        &self.supertypes
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        self.root
    }

    #[inline]
    pub fn is_generic(&self) -> bool {
        !self.type_parameters.is_empty()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root && self.name == other.name
    }
}

impl Eq for Class {}

impl Hash for Class {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder for generic classes and classes with explicit supertypes.
pub struct ClassBuilder {
    name: Cow<'static, str>,
    type_parameters: Vec<TypeVariable>,
    supertypes: Vec<Type>,
}

impl ClassBuilder {
    pub fn type_parameter(mut self, variable: TypeVariable) -> Self {
        self.type_parameters.push(variable);
        self
    }

    /// Adds a direct supertype (superclass or implemented interface).
    pub fn extends(mut self, supertype: Type) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn build(mut self) -> ClassPtr {
        if self.supertypes.is_empty() {
            self.supertypes.push(Type::object());
        }

        Arc::new(Class {
            name: self.name,
            type_parameters: self.type_parameters,
            supertypes: self.supertypes,
            root: false,
        })
    }
}

/// A named type variable with upper bounds. No bounds means the variable is bounded by
/// [Object](Class::object).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeVariable {
    name: Cow<'static, str>,
    bounds: Vec<Type>,
}

impl TypeVariable {
    pub fn new<N: Into<Cow<'static, str>>>(name: N) -> Self {
        Self {
            name: name.into(),
            bounds: vec![],
        }
    }

    pub fn bounded<N: Into<Cow<'static, str>>, B: IntoIterator<Item = Type>>(
        name: N,
        bounds: B,
    ) -> Self {
        Self {
            name: name.into(),
            bounds: bounds.into_iter().collect(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared bounds, or [Object](Class::object) if none were declared.
    pub fn bounds(&self) -> Cow<'_, [Type]> {
        if self.bounds.is_empty() {
            Cow::Owned(vec![Type::object()])
        } else {
            Cow::Borrowed(&self.bounds)
        }
    }

    /// Checks if the variable has no bounds other than [Object](Class::object).
    pub fn is_unbounded(&self) -> bool {
        self.bounds.iter().all(Type::is_object)
    }
}

/// A wildcard type argument. Empty upper bounds mean `? extends Object`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct WildcardType {
    upper_bounds: Vec<Type>,
    lower_bounds: Vec<Type>,
}

impl WildcardType {
    pub fn upper_bounds(&self) -> Cow<'_, [Type]> {
        if self.upper_bounds.is_empty() {
            Cow::Owned(vec![Type::object()])
        } else {
            Cow::Borrowed(&self.upper_bounds)
        }
    }

    #[inline]
    pub fn lower_bounds(&self) -> &[Type] {
        &self.lower_bounds
    }

    /// Checks if given type lies within the bounds of this wildcard.
    pub fn contains(&self, candidate: &Type) -> bool {
        self.upper_bounds
            .iter()
            .all(|upper| upper.is_assignable_from(candidate))
            && self
                .lower_bounds
                .iter()
                .all(|lower| candidate.is_assignable_from(lower))
    }
}

/// A runtime type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// A raw or non-generic class.
    Class(ClassPtr),
    /// A generic class with actual type arguments.
    Parameterized {
        raw: ClassPtr,
        arguments: Vec<Type>,
    },
    /// An array of given component type.
    Array(Box<Type>),
    Wildcard(WildcardType),
    Variable(TypeVariable),
}

impl Type {
    /// Returns the root [Object](Class::object) type.
    pub fn object() -> Self {
        Type::Class(Class::object())
    }

    pub fn class(class: &ClassPtr) -> Self {
        Type::Class(class.clone())
    }

    pub fn parameterized<A: IntoIterator<Item = Type>>(raw: &ClassPtr, arguments: A) -> Self {
        Type::Parameterized {
            raw: raw.clone(),
            arguments: arguments.into_iter().collect(),
        }
    }

    pub fn array(component: Type) -> Self {
        Type::Array(Box::new(component))
    }

    pub fn variable<N: Into<Cow<'static, str>>>(name: N) -> Self {
        Type::Variable(TypeVariable::new(name))
    }

    /// Unbounded wildcard: `?`.
    pub fn wildcard() -> Self {
        Type::Wildcard(WildcardType::default())
    }

    /// Wildcard with an upper bound: `? extends T`.
    pub fn wildcard_extends(bound: Type) -> Self {
        Type::Wildcard(WildcardType {
            upper_bounds: vec![bound],
            lower_bounds: vec![],
        })
    }

    /// Wildcard with a lower bound: `? super T`.
    pub fn wildcard_super(bound: Type) -> Self {
        Type::Wildcard(WildcardType {
            upper_bounds: vec![],
            lower_bounds: vec![bound],
        })
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Type::Class(class) if class.is_object())
    }

    /// Checks if this is a concrete type, i.e. not a wildcard or type variable.
    #[inline]
    pub fn is_actual(&self) -> bool {
        matches!(
            self,
            Type::Class(_) | Type::Parameterized { .. } | Type::Array(_)
        )
    }

    /// Returns the raw class of class and parameterized types.
    pub fn raw_class(&self) -> Option<&ClassPtr> {
        match self {
            Type::Class(class) => Some(class),
            Type::Parameterized { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Returns the type with all type arguments removed. Only defined for actual types, since
    /// wildcards and type variables have no single raw type.
    pub fn raw_type(&self) -> Option<Type> {
        match self {
            Type::Class(_) => Some(self.clone()),
            Type::Parameterized { raw, .. } => Some(Type::Class(raw.clone())),
            Type::Array(component) => component.raw_type().map(Type::array),
            Type::Wildcard(_) | Type::Variable(_) => None,
        }
    }

    /// Type arguments of a parameterized type, or an empty slice for all other types.
    pub fn arguments(&self) -> &[Type] {
        match self {
            Type::Parameterized { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Checks if a type variable appears anywhere in this type.
    pub fn contains_type_variable(&self) -> bool {
        match self {
            Type::Class(_) => false,
            Type::Parameterized { arguments, .. } => {
                arguments.iter().any(Type::contains_type_variable)
            }
            Type::Array(component) => component.contains_type_variable(),
            Type::Wildcard(wildcard) => wildcard
                .upper_bounds
                .iter()
                .chain(wildcard.lower_bounds.iter())
                .any(Type::contains_type_variable),
            Type::Variable(_) => true,
        }
    }

    /// Replaces type variables with their bound types.
    pub fn substitute(&self, bindings: &FxHashMap<&str, &Type>) -> Type {
        match self {
            Type::Class(_) => self.clone(),
            Type::Parameterized { raw, arguments } => Type::Parameterized {
                raw: raw.clone(),
                arguments: arguments
                    .iter()
                    .map(|argument| argument.substitute(bindings))
                    .collect(),
            },
            Type::Array(component) => Type::array(component.substitute(bindings)),
            Type::Wildcard(wildcard) => Type::Wildcard(WildcardType {
                upper_bounds: wildcard
                    .upper_bounds
                    .iter()
                    .map(|bound| bound.substitute(bindings))
                    .collect(),
                lower_bounds: wildcard
                    .lower_bounds
                    .iter()
                    .map(|bound| bound.substitute(bindings))
                    .collect(),
            }),
            Type::Variable(variable) => bindings
                .get(variable.name())
                .map(|bound| (*bound).clone())
                .unwrap_or_else(|| self.clone()),
        }
    }

    /// Computes the type closure: this type and all its supertypes, transitively, with actual type
    /// arguments substituted into generic supertypes. Raw usage of a generic class yields erased
    /// supertypes. The closure always contains [Object](Class::object).
    pub fn closure(&self) -> FxHashSet<Type> {
        let mut closure = FxHashSet::default();
        self.collect_closure(&mut closure);
        closure.insert(Type::object());
        closure
    }

    fn collect_closure(&self, closure: &mut FxHashSet<Type>) {
        if !closure.insert(self.clone()) {
            return;
        }

        match self {
            Type::Class(class) => {
                for supertype in class.supertypes() {
                    if class.is_generic() {
                        if let Some(raw) = supertype.raw_type() {
                            raw.collect_closure(closure);
                        }
                    } else {
                        supertype.collect_closure(closure);
                    }
                }
            }
            Type::Parameterized { raw, arguments } => {
                let bindings: FxHashMap<&str, &Type> = raw
                    .type_parameters()
                    .iter()
                    .map(TypeVariable::name)
                    .zip(arguments.iter())
                    .collect();

                for supertype in raw.supertypes() {
                    supertype.substitute(&bindings).collect_closure(closure);
                }
            }
            Type::Array(_) => {}
            Type::Wildcard(wildcard) => {
                for bound in wildcard.upper_bounds.iter() {
                    bound.collect_closure(closure);
                }
            }
            Type::Variable(variable) => {
                for bound in variable.bounds.iter() {
                    bound.collect_closure(closure);
                }
            }
        }
    }

    /// Covariant assignability: checks if a value of `source` type can be assigned to this type.
    pub fn is_assignable_from(&self, source: &Type) -> bool {
        match self {
            Type::Class(class) if class.is_object() => true,
            Type::Class(class) => source
                .closure()
                .iter()
                .any(|candidate| candidate.raw_class() == Some(class)),
            Type::Parameterized { raw, arguments } => {
                source.closure().iter().any(|candidate| match candidate {
                    Type::Parameterized {
                        raw: candidate_raw,
                        arguments: candidate_arguments,
                    } if candidate_raw == raw => {
                        arguments.len() == candidate_arguments.len()
                            && arguments
                                .iter()
                                .zip(candidate_arguments.iter())
                                .all(|(argument, candidate)| {
                                    argument_contains(argument, candidate)
                                })
                    }
                    // unchecked conversion from raw type
                    Type::Class(candidate_raw) => candidate_raw == raw,
                    _ => false,
                })
            }
            Type::Array(component) => match source {
                Type::Array(source_component) => component.is_assignable_from(source_component),
                Type::Variable(variable) => variable
                    .bounds
                    .iter()
                    .any(|bound| self.is_assignable_from(bound)),
                Type::Wildcard(wildcard) => wildcard
                    .upper_bounds
                    .iter()
                    .any(|bound| self.is_assignable_from(bound)),
                _ => false,
            },
            Type::Variable(variable) => match source {
                Type::Variable(source_variable) => {
                    source_variable == variable
                        || source_variable
                            .bounds
                            .iter()
                            .any(|bound| self.is_assignable_from(bound))
                }
                _ => false,
            },
            Type::Wildcard(wildcard) => wildcard.contains(source),
        }
    }
}

fn argument_contains(argument: &Type, candidate: &Type) -> bool {
    match (argument, candidate) {
        (Type::Wildcard(wildcard), Type::Wildcard(candidate)) => {
            wildcard.upper_bounds.iter().all(|upper| {
                candidate
                    .upper_bounds()
                    .iter()
                    .any(|candidate_upper| upper.is_assignable_from(candidate_upper))
            }) && wildcard.lower_bounds.iter().all(|lower| {
                candidate
                    .lower_bounds
                    .iter()
                    .any(|candidate_lower| candidate_lower.is_assignable_from(lower))
            })
        }
        (Type::Wildcard(wildcard), _) => wildcard.contains(candidate),
        _ => argument == candidate,
    }
}

impl From<&ClassPtr> for Type {
    fn from(class: &ClassPtr) -> Self {
        Type::Class(class.clone())
    }
}

impl From<ClassPtr> for Type {
    fn from(class: ClassPtr) -> Self {
        Type::Class(class)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Class(class) => write!(f, "{class}"),
            Type::Parameterized { raw, arguments } => {
                write!(f, "{raw}<{}>", arguments.iter().join(", "))
            }
            Type::Array(component) => write!(f, "{component}[]"),
            Type::Wildcard(wildcard) => {
                f.write_str("?")?;
                if !wildcard.lower_bounds.is_empty() {
                    write!(f, " super {}", wildcard.lower_bounds.iter().join(" & "))
                } else if !wildcard.upper_bounds.is_empty() {
                    write!(f, " extends {}", wildcard.upper_bounds.iter().join(" & "))
                } else {
                    Ok(())
                }
            }
            Type::Variable(variable) => f.write_str(variable.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{Class, ClassPtr, Type, TypeVariable};

    fn collections() -> (ClassPtr, ClassPtr, ClassPtr) {
        let collection = Class::builder("Collection")
            .type_parameter(TypeVariable::new("E"))
            .build();
        let list = Class::builder("List")
            .type_parameter(TypeVariable::new("E"))
            .extends(Type::parameterized(&collection, [Type::variable("E")]))
            .build();
        let array_list = Class::builder("ArrayList")
            .type_parameter(TypeVariable::new("T"))
            .extends(Type::parameterized(&list, [Type::variable("T")]))
            .build();

        (collection, list, array_list)
    }

    #[test]
    fn should_substitute_arguments_in_closure() {
        let (collection, list, array_list) = collections();
        let string = Class::new("String");

        let closure =
            Type::parameterized(&array_list, [Type::class(&string)]).closure();

        assert!(closure.contains(&Type::parameterized(&list, [Type::class(&string)])));
        assert!(closure.contains(&Type::parameterized(&collection, [Type::class(&string)])));
        assert!(closure.contains(&Type::object()));
        assert_eq!(closure.len(), 4);
    }

    #[test]
    fn should_erase_supertypes_of_raw_generic_class() {
        let (collection, list, array_list) = collections();

        let closure = Type::class(&array_list).closure();

        assert!(closure.contains(&Type::class(&list)));
        assert!(closure.contains(&Type::class(&collection)));
    }

    #[test]
    fn should_check_covariant_assignability() {
        let number = Class::new("Number");
        let integer = Class::builder("Integer")
            .extends(Type::class(&number))
            .build();
        let (_, list, array_list) = collections();

        assert!(Type::class(&number).is_assignable_from(&Type::class(&integer)));
        assert!(!Type::class(&integer).is_assignable_from(&Type::class(&number)));
        assert!(Type::object().is_assignable_from(&Type::array(Type::class(&integer))));
        assert!(Type::parameterized(&list, [Type::wildcard_extends(Type::class(&number))])
            .is_assignable_from(&Type::parameterized(&array_list, [Type::class(&integer)])));
        assert!(!Type::parameterized(&list, [Type::class(&number)])
            .is_assignable_from(&Type::parameterized(&array_list, [Type::class(&integer)])));
    }

    #[test]
    fn should_detect_type_variables() {
        let (_, list, _) = collections();

        assert!(Type::parameterized(&list, [Type::variable("T")]).contains_type_variable());
        assert!(!Type::parameterized(&list, [Type::wildcard()]).contains_type_variable());
    }

    #[test]
    fn should_display_types() {
        let (_, list, _) = collections();
        let number = Class::new("Number");

        assert_eq!(
            Type::parameterized(&list, [Type::wildcard_super(Type::class(&number))]).to_string(),
            "List<? super Number>"
        );
        assert_eq!(Type::array(Type::class(&number)).to_string(), "Number[]");
    }

    #[test]
    fn should_keep_user_object_class_apart_from_root() {
        let object = Class::new("Object");

        assert!(!object.is_object());
        assert!(Class::object().is_object());
        assert_ne!(Type::class(&object), Type::object());
        assert!(Type::object().is_assignable_from(&Type::class(&object)));
        assert!(!Type::class(&object).is_assignable_from(&Type::class(&Class::new("Other"))));
    }
}
