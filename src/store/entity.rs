use crate::core::{EntityRecord, EntityType, MigrationError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// External entity collection collaborator. The core never constructs
/// queries; it only fetches, saves, and clears whole records.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<EntityRecord>>;
    async fn fetch_by_id(&self, id: &str) -> Result<Option<EntityRecord>>;
    /// Insert or replace by record id.
    async fn save(&self, record: EntityRecord) -> Result<()>;
    /// Remove every record, returning how many were removed.
    async fn delete_all(&self) -> Result<usize>;
}

/// In-memory store preserving insertion order, so batch operations see
/// records in collection-iteration order.
#[derive(Default)]
pub struct InMemoryEntityStore {
    records: RwLock<Vec<EntityRecord>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, records: Vec<EntityRecord>) {
        let mut guard = self.records.write().await;
        *guard = records;
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn fetch_all(&self) -> Result<Vec<EntityRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<EntityRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn save(&self, record: EntityRecord) -> Result<()> {
        let mut guard = self.records.write().await;
        match guard.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => guard.push(record),
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut guard = self.records.write().await;
        let removed = guard.len();
        guard.clear();
        Ok(removed)
    }
}

/// The set of tracked entity collections, one store per type.
#[derive(Clone)]
pub struct EntityStores {
    stores: HashMap<EntityType, Arc<dyn EntityStore>>,
}

impl EntityStores {
    pub fn new(stores: HashMap<EntityType, Arc<dyn EntityStore>>) -> Self {
        Self { stores }
    }

    /// One in-memory store per tracked type; the default wiring for
    /// tests and single-process runs.
    pub fn in_memory() -> Self {
        let mut stores: HashMap<EntityType, Arc<dyn EntityStore>> = HashMap::new();
        for ty in EntityType::PROCESSING_ORDER {
            stores.insert(ty, Arc::new(InMemoryEntityStore::new()));
        }
        Self { stores }
    }

    pub fn store(&self, entity_type: EntityType) -> Result<Arc<dyn EntityStore>> {
        self.stores
            .get(&entity_type)
            .cloned()
            .ok_or_else(|| MigrationError::Store(format!("no store for '{}'", entity_type)))
    }

    pub fn tracked_types(&self) -> Vec<EntityType> {
        EntityType::PROCESSING_ORDER
            .into_iter()
            .filter(|ty| self.stores.contains_key(ty))
            .collect()
    }
}
