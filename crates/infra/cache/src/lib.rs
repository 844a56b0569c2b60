//! The durable key-value cache (§6) and the two-tier configuration cache
//! built on top of it (§4.A).

pub mod config_cache;
pub mod redis_cache;

pub use config_cache::ConfigCache;
pub use redis_cache::RedisCache;
