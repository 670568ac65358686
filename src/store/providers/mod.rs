//! Concrete store providers

pub mod failing;
pub mod memory;
pub mod noop;

#[cfg(feature = "store-redis")]
pub mod redis;

pub use failing::FailingStore;
pub use memory::MemoryStore;
pub use noop::NoOpStore;

#[cfg(feature = "store-redis")]
pub use redis::RedisStore;
