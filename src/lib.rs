#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Talentline Cache
//!
//! Query-result caching engine for the Talentline recruiting platform. Sits
//! in front of the relational database and absorbs the expensive aggregate
//! queries behind dashboards, analytics, and listings.
//!
//! ## Architecture
//!
//! Three layers over one shared key-value store:
//!
//! - [`instance::CacheInstance`] - one named cache bound to a key prefix and
//!   a default TTL; owns key derivation, serialization, the tag reverse
//!   index, and hit/miss accounting
//! - [`registry::CacheRegistry`] - the set of named strategies and their
//!   instances, cross-entity invalidation helpers, aggregate statistics, and
//!   the health check
//! - [`invalidation::DomainCacheLayer`] - business trigger events resolved
//!   through an invalidation rule table, a get/set facade with per-strategy
//!   response-time metrics, and cache warming
//!
//! ## Key Properties
//!
//! - **Deterministic keys**: a cache key is a pure function of (prefix,
//!   logical query name, normalized parameters) - map key order and date
//!   representation never change the key
//! - **Soft failure**: a down store degrades every operation to miss/false
//!   returns; no cache fault ever reaches business logic as an error
//! - **Over-invalidation by default**: entity mutations flush every
//!   aggregate view that might embed them; staleness is the failure mode
//!   this engine refuses
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use talentline_cache::config::CacheEngineConfig;
//! use talentline_cache::instance::CacheOptions;
//! use talentline_cache::invalidation::DomainCacheLayer;
//! use talentline_cache::registry::CacheRegistry;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = CacheEngineConfig::from_environment();
//! let registry = Arc::new(CacheRegistry::init(&config).await);
//! let cache = DomainCacheLayer::new(registry.clone(), config.invalidation_enabled);
//!
//! // Read-through: check the cache, compute on miss, write back
//! let params = json!({"company_id": "acme", "page": 1});
//! let listings: Option<serde_json::Value> = cache
//!     .get("jobs", "open_listings", &params, &CacheOptions::default())
//!     .await;
//! if listings.is_none() {
//!     let fresh = json!([]); // ... the expensive database query ...
//!     cache
//!         .set("jobs", "open_listings", &params, &fresh, &CacheOptions::default())
//!         .await;
//! }
//!
//! // A business event fires trigger-based invalidation
//! cache.invalidate("job_created", Some("acme")).await;
//!
//! registry.shutdown();
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod instance;
pub mod invalidation;
pub mod keys;
pub mod logging;
pub mod registry;
pub mod resilience;
pub mod store;
pub mod strategy;
pub mod warming;

pub use config::{CacheEngineConfig, RedisConfig};
pub use errors::{CacheError, CacheResult};
pub use instance::{CacheInstance, CacheOptions, CacheStats, WarmEntry};
pub use invalidation::{default_rules, DomainCacheLayer, InvalidationRule, ResponseTimeStats};
pub use keys::{derive_key, CanonicalValue};
pub use registry::{CacheRegistry, RegistryHealth};
pub use store::{KeyValueStore, StoreProvider};
pub use strategy::{default_strategies, CacheStrategy};
pub use warming::{CacheWarmer, WarmupSource};
