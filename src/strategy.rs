//! Cache strategies
//!
//! A strategy is the immutable configuration governing one logical cache:
//! a unique name (doubling as the key prefix), a default TTL, the glob
//! pattern used for bulk deletion, and optional tags. Strategies are data -
//! adding one is a table entry, not a code branch.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named configuration for one logical cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStrategy {
    /// Unique name; also used as the derived-key prefix
    pub name: String,
    /// Default seconds-to-live for entries written through this strategy
    pub ttl_seconds: u64,
    /// Glob used for bulk deletion of everything this strategy owns
    pub key_pattern: String,
    /// Tags recorded for entries written through this strategy
    pub tags: Vec<String>,
}

impl CacheStrategy {
    /// Create a strategy; TTL is clamped to at least one second
    pub fn new(name: impl Into<String>, ttl_seconds: u64) -> Self {
        let name = name.into();
        let key_pattern = format!("{}:*", name);
        Self {
            name,
            ttl_seconds: ttl_seconds.max(1),
            key_pattern,
            tags: Vec::new(),
        }
    }

    /// Override the bulk-deletion pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.key_pattern = pattern.into();
        self
    }

    /// Attach tags applied to every entry written through this strategy
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Default TTL as Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds.max(1))
    }
}

/// Strategy table registered at engine startup
///
/// TTLs reflect how fast each data category goes stale: dashboards turn over
/// quickly, company profiles barely move.
pub fn default_strategies() -> Vec<CacheStrategy> {
    vec![
        CacheStrategy::new("dashboard", 300).with_tags(vec!["dashboard".to_string()]),
        CacheStrategy::new("analytics", 900).with_tags(vec!["analytics".to_string()]),
        CacheStrategy::new("applications", 600).with_tags(vec!["applications".to_string()]),
        CacheStrategy::new("jobs", 1800).with_tags(vec!["jobs".to_string()]),
        CacheStrategy::new("candidates", 600).with_tags(vec!["candidates".to_string()]),
        CacheStrategy::new("companies", 3600).with_tags(vec!["companies".to_string()]),
        CacheStrategy::new("reports", 1200).with_tags(vec!["reports".to_string()]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_pattern_from_name() {
        let strategy = CacheStrategy::new("jobs", 1800);
        assert_eq!(strategy.key_pattern, "jobs:*");
        assert_eq!(strategy.ttl_seconds, 1800);
        assert!(strategy.tags.is_empty());
    }

    #[test]
    fn test_zero_ttl_clamped() {
        let strategy = CacheStrategy::new("x", 0);
        assert_eq!(strategy.ttl_seconds, 1);
        assert_eq!(strategy.ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_builders() {
        let strategy = CacheStrategy::new("custom", 60)
            .with_pattern("custom:v2:*")
            .with_tags(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(strategy.key_pattern, "custom:v2:*");
        assert_eq!(strategy.tags.len(), 2);
    }

    #[test]
    fn test_default_strategies_are_unique_and_positive() {
        let strategies = default_strategies();
        let mut names: Vec<&str> = strategies.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), strategies.len());
        assert!(strategies.iter().all(|s| s.ttl_seconds >= 1));
    }
}
