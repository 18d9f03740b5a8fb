//! MQTT topic matching with wildcards
//!
//! Implements topic filter matching per the MQTT 3.1.1 and 5.0 specifications.
//! Supports single-level (+) and multi-level (#) wildcards. Empty levels are
//! legal in both topics and filters (`a//b` has three levels).

use crate::error::FilterError;
use std::fmt;

const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

/// Topic matcher for MQTT topic filters
#[derive(Debug, Clone)]
pub struct TopicMatcher;

impl TopicMatcher {
    /// Create a new topic matcher
    pub fn new() -> Self {
        Self
    }

    /// Check if a topic matches a topic filter
    ///
    /// # Arguments
    /// * `topic` - The actual topic name (no wildcards allowed)
    /// * `filter` - The topic filter pattern, already accepted by [`validate_filter`]
    ///
    /// # MQTT Wildcard Rules
    /// * `+` matches exactly one topic level, including an empty one
    /// * `#` matches the parent level and zero or more trailing levels
    ///
    /// Calling this with a topic that contains wildcards, or an unvalidated
    /// filter, is a contract violation; debug builds assert on it.
    ///
    /// # Examples
    /// ```
    /// use sentinel_mqtt_authz::mqtt::TopicMatcher;
    ///
    /// let matcher = TopicMatcher::new();
    /// assert!(matcher.matches("sensors/temp/living-room", "sensors/+/living-room"));
    /// assert!(matcher.matches("sensors", "sensors/#"));
    /// assert!(!matcher.matches("sensors/temp/bedroom", "sensors/+/living-room"));
    /// ```
    ///
    /// [`validate_filter`]: TopicMatcher::validate_filter
    pub fn matches(&self, topic: &str, filter: &str) -> bool {
        debug_assert!(!topic.contains(['+', '#']), "topic contains wildcards: {topic:?}");
        debug_assert!(self.validate_filter(filter).is_ok(), "unvalidated filter: {filter:?}");

        let topic_levels: Vec<&str> = topic.split('/').collect();
        let filter_levels: Vec<&str> = filter.split('/').collect();

        match_levels(&topic_levels, &filter_levels)
    }

    /// Check if a topic filter is valid
    ///
    /// # Rules
    /// * The filter must not be empty
    /// * `#` must be the last level and alone in it
    /// * `+` must be alone in its level
    /// * No null characters
    pub fn validate_filter(&self, filter: &str) -> Result<(), FilterError> {
        if filter.is_empty() {
            return Err(FilterError::Empty);
        }
        if filter.contains('\0') {
            return Err(FilterError::NullCharacter);
        }

        let level_count = filter.split('/').count();

        for (i, level) in filter.split('/').enumerate() {
            if level == MULTI_LEVEL {
                if i != level_count - 1 {
                    return Err(FilterError::MultiLevelNotLast { level: i });
                }
            } else if level != SINGLE_LEVEL && level.contains(['+', '#']) {
                return Err(FilterError::MixedWildcard {
                    level: i,
                    segment: level.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Check if a topic name is valid (no wildcards allowed)
    pub fn is_valid_topic(&self, topic: &str) -> bool {
        !topic.is_empty() && !topic.contains(['+', '#', '\0'])
    }

    /// Check if a topic is a system topic (starts with $)
    pub fn is_system_topic(&self, topic: &str) -> bool {
        topic.starts_with('$')
    }
}

impl Default for TopicMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk topic levels against filter levels.
///
/// The filter must be valid: a `#` level is only ever the last one.
fn match_levels<S: AsRef<str>>(topic: &[&str], filter: &[S]) -> bool {
    let mut i = 0;

    while i < filter.len() {
        match filter[i].as_ref() {
            // # matches the parent level and everything below it
            MULTI_LEVEL => return true,
            _ if i >= topic.len() => return false,
            SINGLE_LEVEL => {}
            literal => {
                if topic[i] != literal {
                    return false;
                }
            }
        }
        i += 1;
    }

    i == topic.len()
}

/// Does a rule filter grant every topic a subscription filter can receive?
///
/// Rule `+` covers any single subscription level (including `+`), rule `#`
/// covers everything that remains, and a subscription wildcard is never
/// covered by a rule literal.
fn covers_levels<S: AsRef<str>>(subscription: &[&str], filter: &[S]) -> bool {
    let mut i = 0;

    while i < filter.len() {
        match filter[i].as_ref() {
            MULTI_LEVEL => return true,
            _ if i >= subscription.len() => return false,
            _ if subscription[i] == MULTI_LEVEL => return false,
            SINGLE_LEVEL => {}
            literal => {
                if subscription[i] != literal {
                    return false;
                }
            }
        }
        i += 1;
    }

    i == subscription.len()
}

/// A validated, pre-split topic filter
///
/// Produced once at rule load time so that matching never re-validates or
/// re-splits the filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
    raw: String,
    levels: Vec<String>,
}

impl TopicFilter {
    /// Validate and segment a filter
    pub fn parse(filter: &str) -> Result<Self, FilterError> {
        TopicMatcher::new().validate_filter(filter)?;

        Ok(Self {
            raw: filter.to_string(),
            levels: filter.split('/').map(str::to_string).collect(),
        })
    }

    /// The filter as written in configuration
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the first level is `+` or `#`
    pub fn starts_with_wildcard(&self) -> bool {
        matches!(self.levels.first().map(String::as_str), Some(SINGLE_LEVEL | MULTI_LEVEL))
    }

    /// Check a topic against this filter
    pub fn matches(&self, topic: &str) -> bool {
        let topic_levels: Vec<&str> = topic.split('/').collect();
        self.matches_levels(&topic_levels)
    }

    /// Check an already split topic against this filter
    pub fn matches_levels(&self, topic: &[&str]) -> bool {
        match_levels(topic, &self.levels)
    }

    /// Check an already split subscription filter against this filter
    pub fn covers_levels(&self, subscription: &[&str]) -> bool {
        covers_levels(subscription, &self.levels)
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
