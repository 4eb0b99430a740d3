pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use self::memory::MemorySessionStore;
#[cfg(feature = "redis-backend")]
pub use self::redis::RedisSessionStore;
