//! In-memory blog store used by tests

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mongodb::bson::oid::ObjectId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{BlogCursor, BlogId, BlogRecord, BlogStore, NewBlog, StoreError};

#[derive(Default)]
pub struct MemoryBlogStore {
    records: RwLock<Vec<BlogRecord>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    corrupt_list: AtomicBool,
}

impl MemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert, replace and delete fail
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make `list` yield a decode failure after the stored records
    pub fn corrupt_list(&self) {
        self.corrupt_list.store(true, Ordering::SeqCst);
    }

    /// Number of successful mutations so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Decode("writes disabled".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn insert(&self, blog: NewBlog) -> Result<BlogId, StoreError> {
        self.check_writable()?;
        let id = BlogId::from_object_id(ObjectId::new());
        self.records
            .write()
            .await
            .push(BlogRecord::from_new(id, blog));
        self.record_write();
        Ok(id)
    }

    async fn find(&self, id: BlogId) -> Result<Option<BlogRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn replace(&self, record: &BlogRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
            self.record_write();
        }
        Ok(())
    }

    async fn delete(&self, id: BlogId) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() != before {
            self.record_write();
        }
        Ok(())
    }

    async fn list(&self) -> Result<BlogCursor, StoreError> {
        let mut items: Vec<Result<BlogRecord, StoreError>> =
            self.records.read().await.iter().cloned().map(Ok).collect();
        if self.corrupt_list.load(Ordering::SeqCst) {
            items.push(Err(StoreError::Decode("corrupt document".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }
}
