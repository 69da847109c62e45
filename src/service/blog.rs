//! `BlogService` implementation

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::logger;
use crate::proto::blog_service_server::{BlogService, BlogServiceServer};
use crate::proto::{
    Blog, CreateBlogRequest, CreateBlogResponse, DeleteBlogRequest, DeleteBlogResponse,
    ListBlogRequest, ListBlogResponse, ReadBlogRequest, ReadBlogResponse, UpdateBlogRequest,
    UpdateBlogResponse,
};
use crate::store::{BlogCursor, BlogId, BlogRecord, BlogStore, NewBlog, StoreError};

/// Buffered `ListBlog` items per stream before the producer waits
const LIST_CHANNEL_CAPACITY: usize = 16;

type ListItem = Result<ListBlogResponse, Status>;

impl From<BlogRecord> for Blog {
    fn from(record: BlogRecord) -> Self {
        Self {
            id: record.id.to_string(),
            author_id: record.author_id,
            title: record.title,
            content: record.content,
        }
    }
}

impl From<Blog> for NewBlog {
    fn from(blog: Blog) -> Self {
        Self {
            author_id: blog.author_id,
            title: blog.title,
            content: blog.content,
        }
    }
}

/// Blog service bound to an injected record store
#[derive(Clone)]
pub struct BlogApi {
    store: Arc<dyn BlogStore>,
    list_throttle: Duration,
}

impl BlogApi {
    /// `list_throttle` is the pause between streamed `ListBlog` items; zero disables it
    pub fn new(store: Arc<dyn BlogStore>, list_throttle: Duration) -> Self {
        Self {
            store,
            list_throttle,
        }
    }

    pub fn into_server(self) -> BlogServiceServer<Self> {
        BlogServiceServer::new(self)
    }

    /// Fetch the record or fail with `NotFound`
    async fn existing(&self, operation: &str, id: BlogId) -> Result<BlogRecord, Status> {
        match self.store.find(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                logger::log_warning(&format!("[RPC] {operation}: blog {id} not found"));
                Err(Status::not_found(format!("Blog with id {id} not found")))
            }
            Err(e) => Err(internal(operation, "Cannot read blog", &e)),
        }
    }
}

fn parse_id(operation: &str, raw: &str) -> Result<BlogId, Status> {
    raw.parse().map_err(|e: StoreError| {
        logger::log_warning(&format!("[RPC] {operation}: {e}"));
        Status::invalid_argument(format!("Cannot parse id: {e}"))
    })
}

fn internal(operation: &str, context: &str, err: &StoreError) -> Status {
    logger::log_error(&format!("[RPC] {operation}: {context}: {err}"));
    Status::internal(format!("{context}: {err}"))
}

#[tonic::async_trait]
impl BlogService for BlogApi {
    async fn create_blog(
        &self,
        request: Request<CreateBlogRequest>,
    ) -> Result<Response<CreateBlogResponse>, Status> {
        logger::log_rpc_invoked("CreateBlog");

        let blog = NewBlog::from(request.into_inner().blog.unwrap_or_default());
        let id = self.store.insert(blog.clone()).await.map_err(|e| match e {
            StoreError::UnexpectedId(_) => internal("CreateBlog", "Cannot convert to OID", &e),
            _ => internal("CreateBlog", "Internal error", &e),
        })?;

        Ok(Response::new(CreateBlogResponse {
            blog: Some(BlogRecord::from_new(id, blog).into()),
        }))
    }

    async fn read_blog(
        &self,
        request: Request<ReadBlogRequest>,
    ) -> Result<Response<ReadBlogResponse>, Status> {
        logger::log_rpc_invoked("ReadBlog");

        let id = parse_id("ReadBlog", &request.get_ref().blog_id)?;
        let record = self.existing("ReadBlog", id).await?;

        Ok(Response::new(ReadBlogResponse {
            blog: Some(record.into()),
        }))
    }

    async fn update_blog(
        &self,
        request: Request<UpdateBlogRequest>,
    ) -> Result<Response<UpdateBlogResponse>, Status> {
        logger::log_rpc_invoked("UpdateBlog");

        let blog = request.into_inner().blog.unwrap_or_default();
        let id = parse_id("UpdateBlog", &blog.id)?;
        self.existing("UpdateBlog", id).await?;

        let updated = BlogRecord::from_new(id, blog.into());
        self.store
            .replace(&updated)
            .await
            .map_err(|e| internal("UpdateBlog", "Cannot update blog", &e))?;

        Ok(Response::new(UpdateBlogResponse {
            blog: Some(updated.into()),
        }))
    }

    async fn delete_blog(
        &self,
        request: Request<DeleteBlogRequest>,
    ) -> Result<Response<DeleteBlogResponse>, Status> {
        logger::log_rpc_invoked("DeleteBlog");

        let id = parse_id("DeleteBlog", &request.get_ref().blog_id)?;
        self.existing("DeleteBlog", id).await?;

        self.store
            .delete(id)
            .await
            .map_err(|e| internal("DeleteBlog", "Cannot delete blog", &e))?;

        Ok(Response::new(DeleteBlogResponse {
            blog_id: id.to_string(),
        }))
    }

    type ListBlogStream = ReceiverStream<ListItem>;

    async fn list_blog(
        &self,
        _request: Request<ListBlogRequest>,
    ) -> Result<Response<Self::ListBlogStream>, Status> {
        logger::log_rpc_invoked("ListBlog");

        let cursor = self
            .store
            .list()
            .await
            .map_err(|e| internal("ListBlog", "Cannot open cursor", &e))?;

        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);
        tokio::spawn(stream_blogs(cursor, tx, self.list_throttle));

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

/// Push every cursor item to the caller until exhaustion, failure or disconnect
async fn stream_blogs(mut cursor: BlogCursor, tx: mpsc::Sender<ListItem>, throttle: Duration) {
    let mut sent = 0usize;

    loop {
        let next = tokio::select! {
            () = tx.closed() => {
                logger::log_debug(&format!("[RPC] ListBlog: caller went away after {sent} items"));
                return;
            }
            next = cursor.next() => next,
        };

        let item = match next {
            None => break,
            Some(Ok(record)) => Ok(ListBlogResponse {
                blog: Some(record.into()),
            }),
            Some(Err(e @ StoreError::Decode(_))) => {
                Err(internal("ListBlog", "Err while decoding data", &e))
            }
            Some(Err(e)) => Err(internal("ListBlog", "Cursor error", &e)),
        };

        if sent > 0 && !throttle.is_zero() {
            tokio::select! {
                () = tx.closed() => {
                    logger::log_debug(&format!("[RPC] ListBlog: caller went away after {sent} items"));
                    return;
                }
                () = tokio::time::sleep(throttle) => {}
            }
        }

        let failed = item.is_err();
        if tx.send(item).await.is_err() {
            logger::log_debug(&format!("[RPC] ListBlog: caller went away after {sent} items"));
            return;
        }
        if failed {
            return;
        }
        sent += 1;
    }

    logger::log_debug(&format!("[RPC] ListBlog: streamed {sent} items"));
}
