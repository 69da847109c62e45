//! Record store adapter
//!
//! Owns the identifier format and the mapping between blog values and
//! persisted documents. The service only sees the [`BlogStore`] trait.

#[cfg(test)]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use futures::stream::BoxStream;
use mongodb::bson::oid::ObjectId;
use std::fmt;
use std::str::FromStr;

pub use mongo::MongoBlogStore;

/// Store-assigned blog identifier (12 bytes, 24 hex characters at the boundary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlogId(ObjectId);

impl BlogId {
    pub const fn from_object_id(oid: ObjectId) -> Self {
        Self(oid)
    }

    pub const fn object_id(self) -> ObjectId {
        self.0
    }
}

impl FromStr for BlogId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
            .map(Self)
            .map_err(|e| StoreError::InvalidId {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for BlogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Caller-supplied fields of a blog that has no identifier yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBlog {
    pub author_id: String,
    pub title: String,
    pub content: String,
}

/// A persisted blog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogRecord {
    pub id: BlogId,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl BlogRecord {
    pub fn from_new(id: BlogId, blog: NewBlog) -> Self {
        Self {
            id,
            author_id: blog.author_id,
            title: blog.title,
            content: blog.content,
        }
    }
}

/// Finite, non-restartable sequence of stored blogs in store order
pub type BlogCursor = BoxStream<'static, Result<BlogRecord, StoreError>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot parse id {input:?}: {reason}")]
    InvalidId { input: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("cannot decode document: {0}")]
    Decode(String),

    #[error("store returned an identifier that is not an object id: {0}")]
    UnexpectedId(String),

    #[error("could not reach the database within {0:?}")]
    ConnectTimeout(std::time::Duration),
}

/// Persistence operations used by the blog service
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait]
pub trait BlogStore: Send + Sync {
    /// Insert a new document and return the identifier the store assigned
    async fn insert(&self, blog: NewBlog) -> Result<BlogId, StoreError>;

    async fn find(&self, id: BlogId) -> Result<Option<BlogRecord>, StoreError>;

    /// Replace every field of the document keyed by `record.id`
    async fn replace(&self, record: &BlogRecord) -> Result<(), StoreError>;

    async fn delete(&self, id: BlogId) -> Result<(), StoreError>;

    /// Open a cursor over all documents, unfiltered and unsorted
    async fn list(&self) -> Result<BlogCursor, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let id: BlogId = "612799388e0a217939049563".parse().unwrap();
        assert_eq!(id.to_string(), "612799388e0a217939049563");
    }

    #[test]
    fn test_parse_uppercase_hex_renders_lowercase() {
        let id: BlogId = "612799388E0A217939049563".parse().unwrap();
        assert_eq!(id.to_string(), "612799388e0a217939049563");
    }

    #[test]
    fn test_parse_malformed_ids() {
        for input in [
            "",
            "abc",
            "612799388e0a21793904956",
            "612799388e0a2179390495630",
            "zz2799388e0a217939049563",
            " 612799388e0a217939049563",
        ] {
            let err = input.parse::<BlogId>().unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidId { .. }),
                "expected InvalidId for {input:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = BlogId::from_object_id(ObjectId::new());
        let b = BlogId::from_object_id(ObjectId::new());
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 24);
    }
}
