//! # Key-Value Store Boundary
//!
//! Everything the engine knows about the backing store lives behind this
//! module.
//!
//! ```text
//! StoreProvider (enum)            <- Zero-cost dispatch, no vtable
//!   ├── Redis(RedisStore)           <- ConnectionManager-based async Redis
//!   ├── Memory(MemoryStore)         <- In-process store for dev and tests
//!   ├── NoOp(NoOpStore)             <- Always-miss, always-succeed fallback
//!   └── Failing(FailingStore)       <- Fault injection for soft-failure tests
//! ```
//!
//! ## Design Decisions
//!
//! - **Enum dispatch**: zero vtable overhead on the hot path
//! - **Graceful degradation**: Redis failure -> NoOp fallback, never blocks startup
//! - **Bounded calls**: every operation carries a deadline; a timeout is a
//!   store error like any other
//! - **SCAN for patterns**: non-blocking key iteration (never uses KEYS)

pub mod provider;
pub mod providers;
pub mod traits;

pub use provider::StoreProvider;
pub use providers::{FailingStore, MemoryStore, NoOpStore};
pub use traits::KeyValueStore;

#[cfg(feature = "store-redis")]
pub use providers::RedisStore;

/// TTL sentinel: key exists but carries no expiry
pub const TTL_NO_EXPIRY: i64 = -1;

/// TTL sentinel: key does not exist
pub const TTL_MISSING: i64 = -2;
