mod directory;
mod kv;

pub use directory::{MemoryDirectory, PublisherDirectory};
pub use kv::{KvStore, MemoryStore, RedisStore};
