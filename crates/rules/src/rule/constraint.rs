//! Constraint-derived rules
//!
//! A [`ConstraintRule`] binds a declarative [`Constraint`] to one property of
//! the target through a getter. It is synchronous and produces at most one
//! message per run: the explicit message given at construction, or the
//! constraint's default message with the property name filled in.
//!
//! Only [`Required`] treats an absent value as an error. [`Range`],
//! [`Length`], [`Pattern`] and [`Email`] accept `None` ("not specified yet")
//! so they compose with a separate required rule.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use std::marker::PhantomData;

use async_trait::async_trait;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use super::{ConstraintKind, Rule, RuleKind, RuleOrder, RuleState};
use crate::error::RuleResult;
use crate::message::{RuleMessage, RuleMessages};

// ============================================================================
// CONSTRAINT TRAIT
// ============================================================================

/// Declarative check over a property value of type `V`.
pub trait Constraint<V: ?Sized>: Send + Sync + 'static {
    /// Kind of constraint.
    fn kind(&self) -> ConstraintKind;

    /// Returns `true` if `value` satisfies the constraint.
    fn is_satisfied(&self, value: &V) -> bool;

    /// Message reported for `property` when the constraint fails.
    fn default_message(&self, property: &str) -> String;
}

// ============================================================================
// VALUE TRAITS
// ============================================================================

/// Decides whether a value counts as "not provided".
///
/// - `None` is missing.
/// - Primitive numbers, `bool` and `char` are missing at their default value.
/// - Strings are missing when empty or all whitespace, also inside `Some`.
/// - `Some(0)` is **not** missing: only an unset optional is.
/// - Collections are never missing; emptiness is not absence.
pub trait IsMissing {
    /// Returns `true` if the value counts as not provided.
    fn is_missing(&self) -> bool;

    /// Returns `true` for blank text. Only strings override this.
    fn is_blank(&self) -> bool {
        false
    }
}

impl<T: IsMissing> IsMissing for Option<T> {
    fn is_missing(&self) -> bool {
        match self {
            None => true,
            Some(value) => value.is_blank(),
        }
    }
}

impl<T: IsMissing + ?Sized> IsMissing for &T {
    fn is_missing(&self) -> bool {
        (**self).is_missing()
    }

    fn is_blank(&self) -> bool {
        (**self).is_blank()
    }
}

impl IsMissing for str {
    fn is_missing(&self) -> bool {
        self.is_blank()
    }

    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl IsMissing for String {
    fn is_missing(&self) -> bool {
        self.as_str().is_missing()
    }

    fn is_blank(&self) -> bool {
        self.as_str().is_blank()
    }
}

macro_rules! zero_is_missing {
    ($zero:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl IsMissing for $ty {
                fn is_missing(&self) -> bool {
                    *self == $zero
                }
            }
        )+
    };
}

zero_is_missing!(0 => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
zero_is_missing!(0.0 => f32, f64);
zero_is_missing!(false => bool);
zero_is_missing!('\0' => char);

macro_rules! never_missing {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl<T> IsMissing for $ty {
                fn is_missing(&self) -> bool {
                    false
                }
            }
        )+
    };
}

never_missing!(Vec<T>, HashSet<T>, BTreeSet<T>);

impl<K, V> IsMissing for HashMap<K, V> {
    fn is_missing(&self) -> bool {
        false
    }
}

impl<K, V> IsMissing for BTreeMap<K, V> {
    fn is_missing(&self) -> bool {
        false
    }
}

/// Length of a value, as seen by [`Length`].
///
/// Strings count Unicode scalar values; collections count elements.
pub trait Measure {
    /// Length of the value.
    fn measure(&self) -> usize;
}

impl Measure for str {
    fn measure(&self) -> usize {
        self.chars().count()
    }
}

impl Measure for String {
    fn measure(&self) -> usize {
        self.as_str().measure()
    }
}

impl<T> Measure for [T] {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl<T> Measure for Vec<T> {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl<T> Measure for HashSet<T> {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl<K, V> Measure for HashMap<K, V> {
    fn measure(&self) -> usize {
        self.len()
    }
}

impl<T: Measure + ?Sized> Measure for &T {
    fn measure(&self) -> usize {
        (**self).measure()
    }
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

/// Value must be provided. See [`IsMissing`] for what counts as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Required;

impl<V: IsMissing + ?Sized> Constraint<V> for Required {
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Required
    }

    fn is_satisfied(&self, value: &V) -> bool {
        !value.is_missing()
    }

    fn default_message(&self, property: &str) -> String {
        format!("{property} is required.")
    }
}

/// Value must lie within `min..=max`. `None` is accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<N> {
    min: N,
    max: N,
}

impl<N: PartialOrd> Range<N> {
    /// Create an inclusive range.
    pub fn new(min: N, max: N) -> Self {
        Self { min, max }
    }
}

impl<N> Constraint<Option<N>> for Range<N>
where
    N: PartialOrd + Display + Send + Sync + 'static,
{
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Range
    }

    fn is_satisfied(&self, value: &Option<N>) -> bool {
        match value {
            None => true,
            Some(value) => *value >= self.min && *value <= self.max,
        }
    }

    fn default_message(&self, property: &str) -> String {
        format!(
            "{property} must be between {} and {}.",
            self.min, self.max
        )
    }
}

/// Length must lie within optional bounds. `None` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
}

impl Length {
    /// At most `max`.
    pub fn max(max: usize) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// At least `min`.
    pub fn min(min: usize) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Within `min..=max`.
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn accepts(&self, len: usize) -> bool {
        self.min.is_none_or(|min| len >= min) && self.max.is_none_or(|max| len <= max)
    }
}

impl<L> Constraint<Option<L>> for Length
where
    L: Measure,
{
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Length
    }

    fn is_satisfied(&self, value: &Option<L>) -> bool {
        value.as_ref().is_none_or(|v| self.accepts(v.measure()))
    }

    fn default_message(&self, property: &str) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                format!("{property} must have a length between {min} and {max}.")
            }
            (Some(min), None) => format!("{property} must have a length of at least {min}."),
            (None, Some(max)) => format!("{property} must have a length of at most {max}."),
            (None, None) => format!("{property} has an invalid length."),
        }
    }
}

/// Whole string must match a regular expression. `None` and empty text are
/// accepted.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    anchored: Regex,
}

impl Pattern {
    /// Compile `pattern`; the entire value must match it.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: pattern.to_owned(),
            anchored: Regex::new(&format!("^(?:{pattern})$"))?,
        })
    }

    /// Pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl<S> Constraint<Option<S>> for Pattern
where
    S: AsRef<str>,
{
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Pattern
    }

    fn is_satisfied(&self, value: &Option<S>) -> bool {
        match value.as_ref().map(AsRef::as_ref) {
            None | Some("") => true,
            Some(text) => self.anchored.is_match(text),
        }
    }

    fn default_message(&self, property: &str) -> String {
        format!("{property} must match the pattern '{}'.", self.source)
    }
}

/// String must contain exactly one `@`, neither first nor last. `None` and
/// blank text are accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Email;

impl Email {
    fn looks_valid(text: &str) -> bool {
        match (text.find('@'), text.rfind('@')) {
            (Some(first), Some(last)) => first == last && first > 0 && first < text.len() - 1,
            _ => false,
        }
    }
}

impl<S> Constraint<Option<S>> for Email
where
    S: AsRef<str>,
{
    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Email
    }

    fn is_satisfied(&self, value: &Option<S>) -> bool {
        match value.as_ref().map(AsRef::as_ref) {
            None => true,
            Some(text) if text.trim().is_empty() => true,
            Some(text) => Self::looks_valid(text),
        }
    }

    fn default_message(&self, property: &str) -> String {
        format!("{property} is not a valid e-mail address.")
    }
}

// ============================================================================
// CONSTRAINT RULE
// ============================================================================

/// Rule enforcing one [`Constraint`] on one property.
///
/// The property name is the rule's only trigger and the property every
/// message is routed to.
///
/// ```
/// use nebula_rules::{ConstraintRule, Length, Required};
///
/// struct Person { name: Option<String> }
///
/// let required = ConstraintRule::new("Name", |p: &Person| p.name.clone(), Required);
/// let length = ConstraintRule::new("Name", |p: &Person| p.name.clone(), Length::max(40))
///     .with_message("Name is too long");
/// ```
pub struct ConstraintRule<T, V, C> {
    state: RuleState,
    name: String,
    property: String,
    getter: Box<dyn Fn(&T) -> V + Send + Sync>,
    constraint: C,
    message: Option<String>,
    _value: PhantomData<fn() -> V>,
}

impl<T, V, C> ConstraintRule<T, V, C>
where
    C: Constraint<V>,
{
    /// Bind `constraint` to `property`, reading the value through `getter`.
    pub fn new<F>(property: impl Into<String>, getter: F, constraint: C) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let property = property.into();
        Self {
            state: RuleState::new([property.as_str()]),
            name: format!("{:?}({property})", constraint.kind()),
            property,
            getter: Box::new(getter),
            constraint,
            message: None,
            _value: PhantomData,
        }
    }

    /// Report `message` instead of the constraint's default message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the execution order.
    pub fn with_order(mut self, order: impl Into<RuleOrder>) -> Self {
        self.state.order = order.into();
        self
    }

    /// Property the constraint is bound to.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The enforced constraint.
    pub fn constraint(&self) -> &C {
        &self.constraint
    }

    /// Message reported on failure.
    pub fn message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| self.constraint.default_message(&self.property))
    }

    /// Check `target` without recording anything on the rule.
    pub fn check(&self, target: &T) -> RuleMessages {
        let value = (self.getter)(target);
        if self.constraint.is_satisfied(&value) {
            RuleMessages::new()
        } else {
            RuleMessage::new(self.property.clone(), self.message()).into()
        }
    }
}

impl<T, V, C> std::fmt::Debug for ConstraintRule<T, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintRule")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T, V, C> Rule<T> for ConstraintRule<T, V, C>
where
    T: Send + Sync + 'static,
    V: 'static,
    C: Constraint<V>,
{
    fn state(&self) -> &RuleState {
        &self.state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Constraint(self.constraint.kind())
    }

    fn is_async(&self) -> bool {
        false
    }

    async fn execute(&self, target: &T, _token: &CancellationToken) -> RuleResult<RuleMessages> {
        Ok(self.check(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Default)]
    struct Form {
        name: Option<String>,
        title: String,
        age: i32,
        score: Option<i32>,
        tags: Vec<String>,
        email: Option<String>,
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(""), true)]
    #[case(Some("   \t"), true)]
    #[case(Some("Ada"), false)]
    fn required_optional_string(#[case] value: Option<&str>, #[case] missing: bool) {
        assert_eq!(value.is_missing(), missing);
    }

    #[rstest]
    #[case(0, true)]
    #[case(1, false)]
    #[case(-1, false)]
    fn required_plain_number_uses_zero(#[case] value: i32, #[case] missing: bool) {
        assert_eq!(value.is_missing(), missing);
    }

    #[test]
    fn optional_zero_is_present() {
        assert!(!Some(0_i32).is_missing());
        assert!(!Some(0.0_f64).is_missing());
        assert!(None::<i32>.is_missing());
    }

    #[test]
    fn collections_are_never_missing() {
        assert!(!Vec::<u8>::new().is_missing());
        assert!(!HashMap::<u8, u8>::new().is_missing());
        assert!(None::<Vec<u8>>.is_missing());
    }

    #[test]
    fn default_values_of_other_primitives_are_missing() {
        assert!(false.is_missing());
        assert!('\0'.is_missing());
        assert!(!'x'.is_missing());
    }

    #[test]
    fn required_rule_uses_default_message() {
        let rule = ConstraintRule::new("Title", |f: &Form| f.title.clone(), Required);
        let messages = rule.check(&Form::default());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].property(), "Title");
        assert_eq!(messages[0].message(), Some("Title is required."));
        assert_eq!(rule.kind(), RuleKind::Constraint(ConstraintKind::Required));
    }

    #[test]
    fn explicit_message_wins() {
        let rule = ConstraintRule::new("Age", |f: &Form| f.age, Required)
            .with_message("Tell us your age");
        assert_eq!(rule.check(&Form::default())[0].message(), Some("Tell us your age"));
        let form = Form {
            age: 30,
            ..Form::default()
        };
        assert!(rule.check(&form).is_empty());
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(0), false)]
    #[case(Some(1), true)]
    #[case(Some(10), true)]
    #[case(Some(11), false)]
    fn range_is_inclusive_and_ignores_none(#[case] score: Option<i32>, #[case] ok: bool) {
        let rule = ConstraintRule::new("Score", |f: &Form| f.score, Range::new(1, 10));
        let form = Form {
            score,
            ..Form::default()
        };
        assert_eq!(rule.check(&form).is_empty(), ok);
    }

    #[test]
    fn range_message_mentions_bounds() {
        let rule = ConstraintRule::new("Score", |f: &Form| f.score, Range::new(1, 10));
        let form = Form {
            score: Some(42),
            ..Form::default()
        };
        assert_eq!(
            rule.check(&form)[0].message(),
            Some("Score must be between 1 and 10.")
        );
    }

    #[test]
    fn length_counts_chars_not_bytes() {
        let rule = ConstraintRule::new("Name", |f: &Form| f.name.clone(), Length::max(3));
        let form = Form {
            name: Some("äöü".into()),
            ..Form::default()
        };
        assert!(rule.check(&form).is_empty());

        let form = Form {
            name: Some("äöüß".into()),
            ..Form::default()
        };
        assert_eq!(
            rule.check(&form)[0].message(),
            Some("Name must have a length of at most 3.")
        );
        assert!(rule.check(&Form::default()).is_empty());
    }

    #[test]
    fn length_counts_collection_elements() {
        let rule = ConstraintRule::new(
            "Tags",
            |f: &Form| Some(f.tags.clone()),
            Length::between(1, 2),
        );
        assert_eq!(rule.check(&Form::default()).len(), 1);
        let form = Form {
            tags: vec!["a".into()],
            ..Form::default()
        };
        assert!(rule.check(&form).is_empty());
    }

    #[test]
    fn pattern_must_match_whole_value() {
        let pattern = Pattern::new("[0-9]{5}").unwrap();
        assert!(Constraint::<Option<String>>::is_satisfied(&pattern, &Some("12345".into())));
        assert!(!Constraint::<Option<String>>::is_satisfied(&pattern, &Some("123456".into())));
        assert!(!Constraint::<Option<String>>::is_satisfied(&pattern, &Some("a12345".into())));
        assert!(Constraint::<Option<String>>::is_satisfied(&pattern, &None));
        assert!(Constraint::<Option<&str>>::is_satisfied(&pattern, &Some("")));
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some(""), true)]
    #[case(Some("ada@example.com"), true)]
    #[case(Some("ada"), false)]
    #[case(Some("@example.com"), false)]
    #[case(Some("ada@"), false)]
    #[case(Some("a@b@c"), false)]
    fn email_shape(#[case] value: Option<&str>, #[case] ok: bool) {
        let value = value.map(str::to_owned);
        let rule = ConstraintRule::new("Email", move |_: &Form| value.clone(), Email);
        assert_eq!(rule.check(&Form::default()).is_empty(), ok);
    }

    #[test]
    fn email_rule_reads_property() {
        let rule = ConstraintRule::new("Email", |f: &Form| f.email.clone(), Email);
        let form = Form {
            email: Some("nobody".into()),
            ..Form::default()
        };
        assert_eq!(
            rule.check(&form)[0].message(),
            Some("Email is not a valid e-mail address.")
        );
    }
}
