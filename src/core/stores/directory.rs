use crate::core::models::publisher::Publisher;
use anyhow::Error;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The relational publisher directory. The production backend is
/// externally owned; the exchange only consumes this lookup surface.
#[async_trait]
pub trait PublisherDirectory: Send + Sync {
    async fn lookup(&self, publisher_id: &str) -> Result<Option<Publisher>, Error>;
}

/// In-memory directory for local development and tests
#[derive(Default)]
pub struct MemoryDirectory {
    publishers: RwLock<HashMap<String, Publisher>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publishers(publishers: Vec<Publisher>) -> Self {
        let map = publishers
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Self {
            publishers: RwLock::new(map),
        }
    }

    pub fn insert(&self, publisher: Publisher) {
        self.publishers
            .write()
            .insert(publisher.id.clone(), publisher);
    }
}

#[async_trait]
impl PublisherDirectory for MemoryDirectory {
    async fn lookup(&self, publisher_id: &str) -> Result<Option<Publisher>, Error> {
        Ok(self.publishers.read().get(publisher_id).cloned())
    }
}
