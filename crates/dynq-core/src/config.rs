//! Compiler configuration.

use std::env;

use serde::{Deserialize, Serialize};

/// Settings shared by every plan a [`Compiler`](crate::Compiler) produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynqConfig {
    /// Predicate plans turn an absent dynamic member into `false`
    /// (default: true).
    pub absent_as_false: bool,
    /// Member lookups retry with a case-insensitive match when the exact
    /// name is missing (default: true).
    pub ignore_member_case: bool,
    /// Tracing filter used by the command-line front-end.
    pub log_level: String,
}

impl DynqConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNQ_ABSENT_AS_FALSE` | `true` |
    /// | `DYNQ_IGNORE_MEMBER_CASE` | `true` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            absent_as_false: env_bool("DYNQ_ABSENT_AS_FALSE", true),
            ignore_member_case: env_bool("DYNQ_IGNORE_MEMBER_CASE", true),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned()),
        }
    }
}

impl Default for DynqConfig {
    fn default() -> Self {
        Self {
            absent_as_false: true,
            ignore_member_case: true,
            log_level: "info".to_owned(),
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_to_absent_as_false() {
        let config = DynqConfig::default();
        assert!(config.absent_as_false);
        assert!(config.ignore_member_case);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_should_serialize_camel_case() {
        let json = serde_json::to_value(DynqConfig::default()).unwrap();
        assert_eq!(json["absentAsFalse"], serde_json::Value::Bool(true));
        assert_eq!(json["ignoreMemberCase"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_should_fall_back_to_default_for_unset_variable() {
        assert!(env_bool("DYNQ_TEST_UNSET_VARIABLE_FOR_CONFIG", true));
        assert!(!env_bool("DYNQ_TEST_UNSET_VARIABLE_FOR_CONFIG", false));
    }
}
