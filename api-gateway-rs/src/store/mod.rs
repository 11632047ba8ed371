//! Key-value store backends and the command record layer built on them

mod command_store;
mod memory;
mod redis_store;

pub use command_store::AsyncCommandStore;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
