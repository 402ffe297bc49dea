//! Qualifiers narrow down typesafe resolution. A qualifier is identified by its kind and its
//! binding values, so `@Named("a")` and `@Named("b")` are different qualifiers, while nonbinding
//! values are ignored when comparing.

use itertools::Itertools;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Kind of the built-in qualifier every bean has.
pub const ANY: &str = "Any";

/// Kind of the built-in qualifier assumed when no other qualifiers are present.
pub const DEFAULT: &str = "Default";

/// Kind of the built-in qualifier carrying bean names.
pub const NAMED: &str = "Named";

/// Name of the value holding the bean name in a [NAMED] qualifier.
pub const NAMED_VALUE: &str = "value";

/// Value of a qualifier member.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QualifierValue {
    Bool(bool),
    Int(i64),
    Str(Cow<'static, str>),
    List(Vec<QualifierValue>),
}

impl From<bool> for QualifierValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for QualifierValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QualifierValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<&'static str> for QualifierValue {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for QualifierValue {
    fn from(value: String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

impl Display for QualifierValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QualifierValue::Bool(value) => write!(f, "{value}"),
            QualifierValue::Int(value) => write!(f, "{value}"),
            QualifierValue::Str(value) => write!(f, "\"{value}\""),
            QualifierValue::List(values) => write!(f, "{{{}}}", values.iter().join(", ")),
        }
    }
}

/// Qualifier instance. Equality, ordering and hashing only take the kind and binding values into
/// account.
#[derive(Clone, Debug)]
pub struct Qualifier {
    kind: Cow<'static, str>,
    values: BTreeMap<Cow<'static, str>, QualifierValue>,
    nonbinding: BTreeMap<Cow<'static, str>, QualifierValue>,
    repeatable: bool,
}

impl Qualifier {
    /// Creates a qualifier without members.
    pub fn new<K: Into<Cow<'static, str>>>(kind: K) -> Self {
        Self::builder(kind).build()
    }

    pub fn builder<K: Into<Cow<'static, str>>>(kind: K) -> QualifierBuilder {
        QualifierBuilder {
            qualifier: Qualifier {
                kind: kind.into(),
                values: Default::default(),
                nonbinding: Default::default(),
                repeatable: false,
            },
        }
    }

    pub fn any() -> Self {
        Self::new(ANY)
    }

    pub fn default_qualifier() -> Self {
        Self::new(DEFAULT)
    }

    pub fn named<N: Into<Cow<'static, str>>>(name: N) -> Self {
        Self::builder(NAMED)
            .value(NAMED_VALUE, QualifierValue::Str(name.into()))
            .build()
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn value(&self, name: &str) -> Option<&QualifierValue> {
        self.values
            .get(name)
            .or_else(|| self.nonbinding.get(name))
    }

    #[inline]
    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    #[inline]
    pub fn is_named(&self) -> bool {
        self.kind == NAMED
    }

    /// Returns the name carried by a [NAMED] qualifier.
    pub fn name(&self) -> Option<&str> {
        if !self.is_named() {
            return None;
        }

        match self.values.get(NAMED_VALUE) {
            Some(QualifierValue::Str(name)) => Some(name.as_ref()),
            _ => None,
        }
    }

    fn key(&self) -> (&str, &BTreeMap<Cow<'static, str>, QualifierValue>) {
        (&self.kind, &self.values)
    }
}

impl PartialEq for Qualifier {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Qualifier {}

impl PartialOrd for Qualifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Qualifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Qualifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.kind)?;
        if !self.values.is_empty() {
            write!(
                f,
                "({})",
                self.values
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .join(", ")
            )?;
        }

        Ok(())
    }
}

pub struct QualifierBuilder {
    qualifier: Qualifier,
}

impl QualifierBuilder {
    /// Adds a binding value, which takes part in qualifier equality.
    pub fn value<N: Into<Cow<'static, str>>, V: Into<QualifierValue>>(
        mut self,
        name: N,
        value: V,
    ) -> Self {
        self.qualifier.values.insert(name.into(), value.into());
        self
    }

    /// Adds a nonbinding value, which is available for inspection but ignored when matching.
    pub fn nonbinding<N: Into<Cow<'static, str>>, V: Into<QualifierValue>>(
        mut self,
        name: N,
        value: V,
    ) -> Self {
        self.qualifier.nonbinding.insert(name.into(), value.into());
        self
    }

    /// Marks the qualifier kind as allowed to appear more than once on an injection point.
    pub fn repeatable(mut self) -> Self {
        self.qualifier.repeatable = true;
        self
    }

    pub fn build(self) -> Qualifier {
        self.qualifier
    }
}

/// Ordered set of qualifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QualifierSet(BTreeSet<Qualifier>);

impl QualifierSet {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn insert(&mut self, qualifier: Qualifier) -> bool {
        self.0.insert(qualifier)
    }

    #[inline]
    pub fn contains(&self, qualifier: &Qualifier) -> bool {
        self.0.contains(qualifier)
    }

    #[inline]
    pub fn contains_kind(&self, kind: &str) -> bool {
        self.0.iter().any(|qualifier| qualifier.kind() == kind)
    }

    /// Checks if all given qualifiers are present in this set.
    pub fn contains_all(&self, other: &QualifierSet) -> bool {
        other.0.is_subset(&self.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Qualifier> {
        self.0.iter()
    }

    /// Returns the bean name carried by a [NAMED] qualifier, if present.
    pub fn name(&self) -> Option<&str> {
        self.0.iter().find_map(Qualifier::name)
    }

    pub(crate) fn remove_kind(&mut self, kind: &str) {
        self.0.retain(|qualifier| qualifier.kind() != kind);
    }
}

impl FromIterator<Qualifier> for QualifierSet {
    fn from_iter<T: IntoIterator<Item = Qualifier>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Qualifier> for QualifierSet {
    fn extend<T: IntoIterator<Item = Qualifier>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl<'a> IntoIterator for &'a QualifierSet {
    type Item = &'a Qualifier;
    type IntoIter = std::collections::btree_set::Iter<'a, Qualifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for QualifierSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}
