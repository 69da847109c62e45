//! MongoDB-backed blog store

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Cursor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BlogCursor, BlogId, BlogRecord, BlogStore, NewBlog, StoreError};
use crate::config::DatabaseConfig;

/// Persisted shape of a blog: `{_id, author_id, content, title}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlogDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: String,
}

impl From<NewBlog> for BlogDocument {
    fn from(blog: NewBlog) -> Self {
        Self {
            id: None,
            author_id: blog.author_id,
            content: blog.content,
            title: blog.title,
        }
    }
}

impl From<&BlogRecord> for BlogDocument {
    fn from(record: &BlogRecord) -> Self {
        Self {
            id: Some(record.id.object_id()),
            author_id: record.author_id.clone(),
            content: record.content.clone(),
            title: record.title.clone(),
        }
    }
}

impl TryFrom<BlogDocument> for BlogRecord {
    type Error = StoreError;

    fn try_from(document: BlogDocument) -> Result<Self, Self::Error> {
        let id = document
            .id
            .ok_or_else(|| StoreError::Decode("document has no _id".to_string()))?;
        Ok(Self {
            id: BlogId::from_object_id(id),
            author_id: document.author_id,
            title: document.title,
            content: document.content,
        })
    }
}

fn id_filter(id: BlogId) -> Document {
    doc! { "_id": id.object_id() }
}

/// Open a client and verify the server answers within the configured timeout
///
/// URI parsing is inside the bound too, since `mongodb+srv` URIs resolve DNS.
pub async fn connect(config: &DatabaseConfig) -> Result<Client, StoreError> {
    let timeout = config.connect_timeout();
    tokio::time::timeout(timeout, open_and_ping(config, timeout))
        .await
        .map_err(|_| StoreError::ConnectTimeout(timeout))?
}

async fn open_and_ping(config: &DatabaseConfig, timeout: Duration) -> Result<Client, StoreError> {
    let mut options = ClientOptions::parse(&config.uri).await?;
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

    let client = Client::with_options(options)?;

    // The driver connects lazily, so force a round trip now
    client
        .database(&config.name)
        .run_command(doc! { "ping": 1 })
        .await?;

    Ok(client)
}

/// Blog store over a single MongoDB collection
#[derive(Clone)]
pub struct MongoBlogStore {
    collection: Collection<BlogDocument>,
}

impl MongoBlogStore {
    pub fn new(client: &Client, database: &str, collection: &str) -> Self {
        Self {
            collection: client.database(database).collection(collection),
        }
    }
}

/// Advance the cursor explicitly so iteration and decode failures stay apart
fn cursor_stream(cursor: Cursor<BlogDocument>) -> BlogCursor {
    stream::unfold(Some(cursor), |state| async move {
        let mut cursor = state?;
        match cursor.advance().await {
            Ok(true) => {
                let item = cursor
                    .deserialize_current()
                    .map_err(|e| StoreError::Decode(e.to_string()))
                    .and_then(BlogRecord::try_from);
                let next = if item.is_ok() { Some(cursor) } else { None };
                Some((item, next))
            }
            Ok(false) => None,
            Err(e) => Some((Err(StoreError::Database(e)), None)),
        }
    })
    .boxed()
}

#[async_trait]
impl BlogStore for MongoBlogStore {
    async fn insert(&self, blog: NewBlog) -> Result<BlogId, StoreError> {
        let result = self.collection.insert_one(BlogDocument::from(blog)).await?;
        result
            .inserted_id
            .as_object_id()
            .map(BlogId::from_object_id)
            .ok_or_else(|| StoreError::UnexpectedId(result.inserted_id.to_string()))
    }

    async fn find(&self, id: BlogId) -> Result<Option<BlogRecord>, StoreError> {
        self.collection
            .find_one(id_filter(id))
            .await?
            .map(BlogRecord::try_from)
            .transpose()
    }

    async fn replace(&self, record: &BlogRecord) -> Result<(), StoreError> {
        self.collection
            .replace_one(id_filter(record.id), BlogDocument::from(record))
            .await?;
        Ok(())
    }

    async fn delete(&self, id: BlogId) -> Result<(), StoreError> {
        self.collection.delete_one(id_filter(id)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<BlogCursor, StoreError> {
        let cursor = self.collection.find(doc! {}).await?;
        Ok(cursor_stream(cursor))
    }
}
