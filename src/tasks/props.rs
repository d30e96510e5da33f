//! # Task metadata.
//!
//! [`TaskProps`] carries display name, description and tags. Properties are
//! informational only; they never change how a task is scheduled.

use std::collections::BTreeSet;

/// Display metadata attached to a task at construction.
///
/// ## Example
/// ```rust
/// use pollvisor::TaskProps;
///
/// let props = TaskProps::named("Poll")
///     .with_description("probe http latency")
///     .with_tag("poll");
///
/// assert_eq!(props.display_name.as_deref(), Some("Poll"));
/// assert!(props.tags.contains("poll"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskProps {
    /// Short human-readable name.
    pub display_name: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Classification tags.
    pub tags: BTreeSet<String>,
}

impl TaskProps {
    /// Empty properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties with only a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with_display_name(name)
    }

    /// Returns new props with the display name set.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns new props with the description set.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns new props with one more tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Returns new props with all given tags added.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
