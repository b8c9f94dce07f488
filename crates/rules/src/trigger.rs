//! Trigger properties
//!
//! A [`TriggerProperty`] names the property path a rule depends on. When the
//! host reports that a property changed, every rule holding a trigger whose
//! path is *exactly* the reported path is scheduled.
//!
//! Matching is plain, case-sensitive string equality. A trigger on
//! `"Child.ChildProperty"` is not fired by a change of `"Child"`, and a
//! trigger on `"Child"` is not fired by a change of `"Child.ChildProperty"`.

use std::fmt;
use std::sync::Arc;

/// Separator between the segments of a nested property path.
pub const PATH_SEPARATOR: char = '.';

/// Property path a rule is triggered by.
///
/// Cheap to clone; the path is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerProperty {
    path: Arc<str>,
}

impl TriggerProperty {
    /// Create a trigger for a (possibly dotted) property path.
    ///
    /// # Examples
    ///
    /// ```
    /// use nebula_rules::TriggerProperty;
    ///
    /// let trigger = TriggerProperty::new("Child.ChildProperty");
    /// assert!(trigger.is_match("Child.ChildProperty"));
    /// assert!(!trigger.is_match("Child"));
    /// ```
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: Arc::from(path.as_ref()),
        }
    }

    /// Create a trigger for a nested path from its segments.
    ///
    /// ```
    /// use nebula_rules::TriggerProperty;
    ///
    /// let trigger = TriggerProperty::nested(["Address", "ZipCode"]);
    /// assert_eq!(trigger.property_name(), "Address.ZipCode");
    /// ```
    pub fn nested<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for segment in segments {
            if !path.is_empty() {
                path.push(PATH_SEPARATOR);
            }
            path.push_str(segment.as_ref());
        }
        Self::new(path)
    }

    /// Full dotted property path.
    pub fn property_name(&self) -> &str {
        &self.path
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split(PATH_SEPARATOR)
    }

    /// Returns `true` if the path has more than one segment.
    pub fn is_nested(&self) -> bool {
        self.path.contains(PATH_SEPARATOR)
    }

    /// Returns `true` if `candidate` is exactly this trigger's path.
    #[inline]
    pub fn is_match(&self, candidate: &str) -> bool {
        *self.path == *candidate
    }
}

impl fmt::Display for TriggerProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl From<&str> for TriggerProperty {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for TriggerProperty {
    fn from(path: String) -> Self {
        Self {
            path: Arc::from(path),
        }
    }
}

impl AsRef<str> for TriggerProperty {
    fn as_ref(&self) -> &str {
        &self.path
    }
}
