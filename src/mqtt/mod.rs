//! MQTT topic handling
//!
//! Topic validation and wildcard matching for the authorization engine.

mod topic;

pub use topic::{TopicFilter, TopicMatcher};
