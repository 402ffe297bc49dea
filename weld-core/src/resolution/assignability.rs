//! Assignability rules used by typesafe resolution. Bean resolution is stricter than Java
//! assignability: parameterized types need identical raw types and matching type arguments. Event
//! resolution allows missing type arguments on the event side, treating them as
//! [Object](crate::types::Class::object).

use crate::types::{Type, TypeVariable};

/// Decides if a bean or event type satisfies a required type.
pub trait AssignabilityRules {
    fn matches(&self, required_type: &Type, candidate: &Type) -> bool;

    /// Checks if any of the candidates satisfies the required type.
    fn matches_any<'a, I>(&self, required_type: &Type, candidates: I) -> bool
    where
        I: IntoIterator<Item = &'a Type>,
        Self: Sized,
    {
        candidates
            .into_iter()
            .any(|candidate| self.matches(required_type, candidate))
    }
}

/// Rules for matching injection points against bean types.
#[derive(Default, Copy, Clone, Debug)]
pub struct BeanTypeAssignabilityRules;

impl BeanTypeAssignabilityRules {
    fn parameters_match(&self, required: &Type, bean: &Type) -> bool {
        match (required, bean) {
            (required, bean) if required.is_actual() && bean.is_actual() => {
                self.matches(required, bean)
            }
            (Type::Wildcard(_), bean) if bean.is_actual() => required.is_assignable_from(bean),
            (Type::Wildcard(wildcard), Type::Variable(variable)) => {
                let upper_bounds = wildcard.upper_bounds();
                let upper = &upper_bounds[0];

                variable.bounds().iter().all(|bound| {
                    (bound.is_assignable_from(upper) || upper.is_assignable_from(bound))
                        && wildcard
                            .lower_bounds()
                            .first()
                            .map_or(true, |lower| bound.is_assignable_from(lower))
                })
            }
            (required, Type::Variable(variable)) if required.is_actual() => {
                actual_within_variable(required, variable)
            }
            (Type::Variable(required), Type::Variable(bean)) => {
                let bean_bounds = bean.bounds();
                required.bounds().iter().all(|required_bound| {
                    bean_bounds
                        .iter()
                        .all(|bean_bound| bean_bound.is_assignable_from(required_bound))
                })
            }
            _ => false,
        }
    }
}

fn actual_within_variable(actual: &Type, variable: &TypeVariable) -> bool {
    variable.bounds().iter().all(|bound| match bound {
        Type::Variable(inner) => actual_within_variable(actual, inner),
        bound => bound.is_assignable_from(actual),
    })
}

fn is_unbounded_or_object(argument: &Type) -> bool {
    match argument {
        Type::Variable(variable) => variable.is_unbounded(),
        argument => argument.is_object(),
    }
}

impl AssignabilityRules for BeanTypeAssignabilityRules {
    fn matches(&self, required_type: &Type, candidate: &Type) -> bool {
        match (required_type, candidate) {
            (Type::Array(required), Type::Array(candidate)) => self.matches(required, candidate),
            (Type::Class(required), Type::Class(candidate)) => required == candidate,
            (Type::Class(raw), Type::Parameterized { raw: other, arguments })
            | (Type::Parameterized { raw: other, arguments }, Type::Class(raw)) => {
                raw == other && arguments.iter().all(is_unbounded_or_object)
            }
            (
                Type::Parameterized {
                    raw: required_raw,
                    arguments: required_arguments,
                },
                Type::Parameterized {
                    raw: candidate_raw,
                    arguments: candidate_arguments,
                },
            ) => {
                required_raw == candidate_raw
                    && required_arguments.len() == candidate_arguments.len()
                    && required_arguments
                        .iter()
                        .zip(candidate_arguments.iter())
                        .all(|(required, candidate)| self.parameters_match(required, candidate))
            }
            _ => false,
        }
    }
}

/// Rules for matching observed types against event types.
#[derive(Default, Copy, Clone, Debug)]
pub struct EventTypeAssignabilityRules;

/// Raw type and type arguments of an actual type. Arrays hold the arguments of their component.
fn split_actual(candidate: &Type) -> Option<(Type, &[Type])> {
    match candidate {
        Type::Class(_) | Type::Parameterized { .. } => {
            candidate.raw_type().map(|raw| (raw, candidate.arguments()))
        }
        Type::Array(component) => component
            .raw_type()
            .map(|raw| (Type::array(raw), component.arguments())),
        _ => None,
    }
}

impl EventTypeAssignabilityRules {
    fn arguments_satisfy<F>(required: &[Type], other: &[Type], check: F) -> bool
    where
        F: Fn(&Type, &Type) -> bool,
    {
        let object = Type::object();
        required
            .iter()
            .enumerate()
            .all(|(index, argument)| check(argument, other.get(index).unwrap_or(&object)))
    }

    fn is_inside_bounds(&self, candidate: &Type, lower: &[Type], upper: &[Type]) -> bool {
        (lower.is_empty()
            || lower
                .iter()
                .any(|bound| self.is_assignable_from(candidate, bound)))
            && (upper.is_empty()
                || upper
                    .iter()
                    .any(|bound| self.is_assignable_from(bound, candidate)))
    }

    /// Java-like assignability with the relaxed handling of missing type arguments.
    pub fn is_assignable_from(&self, required_type: &Type, other: &Type) -> bool {
        if let Some((raw, arguments)) = split_actual(required_type) {
            if let Some((other_raw, other_arguments)) = split_actual(other) {
                return raw.is_assignable_from(&other_raw)
                    && Self::arguments_satisfy(arguments, other_arguments, |required, other| {
                        self.is_assignable_from(required, other)
                    });
            }

            return match other {
                Type::Variable(variable) => {
                    self.is_inside_bounds(required_type, &[], &variable.bounds())
                }
                Type::Wildcard(wildcard) => wildcard
                    .upper_bounds()
                    .iter()
                    .any(|bound| self.is_assignable_from(required_type, bound)),
                _ => false,
            };
        }

        match required_type {
            Type::Wildcard(wildcard) => self.is_inside_bounds(
                other,
                wildcard.lower_bounds(),
                &wildcard.upper_bounds(),
            ),
            Type::Variable(variable) => self.is_inside_bounds(other, &[], &variable.bounds()),
            _ => false,
        }
    }
}

impl AssignabilityRules for EventTypeAssignabilityRules {
    fn matches(&self, required_type: &Type, candidate: &Type) -> bool {
        if let Some((raw, arguments)) = split_actual(required_type) {
            if let Some((candidate_raw, candidate_arguments)) = split_actual(candidate) {
                return raw == candidate_raw
                    && Self::arguments_satisfy(
                        arguments,
                        candidate_arguments,
                        |required, candidate| self.matches(required, candidate),
                    );
            }

            return match candidate {
                Type::Variable(variable) => {
                    self.is_inside_bounds(required_type, &[], &variable.bounds())
                }
                Type::Wildcard(wildcard) => wildcard
                    .upper_bounds()
                    .iter()
                    .any(|bound| self.matches(required_type, bound)),
                _ => false,
            };
        }

        match required_type {
            Type::Wildcard(wildcard) => self.is_inside_bounds(
                candidate,
                wildcard.lower_bounds(),
                &wildcard.upper_bounds(),
            ),
            Type::Variable(variable) => {
                self.is_inside_bounds(candidate, &[], &variable.bounds())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::resolution::assignability::{
        AssignabilityRules, BeanTypeAssignabilityRules, EventTypeAssignabilityRules,
    };
    use crate::types::{Class, ClassPtr, Type, TypeVariable};

    struct Fixture {
        list: ClassPtr,
        number: ClassPtr,
        integer: ClassPtr,
        string: ClassPtr,
    }

    fn fixture() -> Fixture {
        let number = Class::new("Number");
        Fixture {
            list: Class::builder("List")
                .type_parameter(TypeVariable::new("E"))
                .build(),
            integer: Class::builder("Integer")
                .extends(Type::class(&number))
                .build(),
            string: Class::new("String"),
            number,
        }
    }

    #[test]
    fn should_require_identical_classes_for_beans() {
        let f = fixture();
        let rules = BeanTypeAssignabilityRules;

        assert!(rules.matches(&Type::class(&f.number), &Type::class(&f.number)));
        assert!(!rules.matches(&Type::class(&f.number), &Type::class(&f.integer)));
    }

    #[test]
    fn should_match_raw_with_unbounded_parameterized_bean() {
        let f = fixture();
        let rules = BeanTypeAssignabilityRules;

        assert!(rules.matches(
            &Type::class(&f.list),
            &Type::parameterized(&f.list, [Type::variable("T")])
        ));
        assert!(rules.matches(
            &Type::class(&f.list),
            &Type::parameterized(&f.list, [Type::object()])
        ));
        assert!(!rules.matches(
            &Type::class(&f.list),
            &Type::parameterized(&f.list, [Type::class(&f.string)])
        ));
    }

    #[test]
    fn should_match_bean_type_parameters() {
        let f = fixture();
        let rules = BeanTypeAssignabilityRules;
        let list_of_integers = Type::parameterized(&f.list, [Type::class(&f.integer)]);

        assert!(rules.matches(
            &Type::parameterized(&f.list, [Type::wildcard_extends(Type::class(&f.number))]),
            &list_of_integers
        ));
        assert!(!rules.matches(
            &Type::parameterized(&f.list, [Type::class(&f.number)]),
            &list_of_integers
        ));
        assert!(rules.matches(
            &Type::parameterized(&f.list, [Type::class(&f.integer)]),
            &Type::parameterized(
                &f.list,
                [Type::Variable(TypeVariable::bounded(
                    "T",
                    [Type::class(&f.number)]
                ))]
            )
        ));
        assert!(!rules.matches(
            &Type::parameterized(&f.list, [Type::class(&f.string)]),
            &Type::parameterized(
                &f.list,
                [Type::Variable(TypeVariable::bounded(
                    "T",
                    [Type::class(&f.number)]
                ))]
            )
        ));
    }

    #[test]
    fn should_match_arrays_by_component() {
        let f = fixture();
        let rules = BeanTypeAssignabilityRules;

        assert!(rules.matches(
            &Type::array(Type::class(&f.string)),
            &Type::array(Type::class(&f.string))
        ));
        assert!(!rules.matches(
            &Type::array(Type::class(&f.string)),
            &Type::class(&f.string)
        ));
    }

    #[test]
    fn should_default_missing_event_arguments_to_object() {
        let f = fixture();
        let rules = EventTypeAssignabilityRules;

        assert!(rules.matches(
            &Type::class(&f.list),
            &Type::parameterized(&f.list, [Type::class(&f.string)])
        ));
        assert!(rules.matches(
            &Type::parameterized(&f.list, [Type::wildcard()]),
            &Type::class(&f.list)
        ));
        assert!(!rules.matches(
            &Type::parameterized(&f.list, [Type::class(&f.string)]),
            &Type::class(&f.list)
        ));
    }

    #[test]
    fn should_match_event_wildcards_within_bounds() {
        let f = fixture();
        let rules = EventTypeAssignabilityRules;
        let observed = Type::parameterized(&f.list, [Type::wildcard_extends(Type::class(&f.number))]);

        assert!(rules.matches(
            &observed,
            &Type::parameterized(&f.list, [Type::class(&f.integer)])
        ));
        assert!(!rules.matches(
            &observed,
            &Type::parameterized(&f.list, [Type::class(&f.string)])
        ));
    }
}
