use crate::domain_model::{CommentRecord, PostId, PostRecord, UserId};

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("validation: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait PostService: Send + Sync {
    async fn create_post(
        &self,
        author: UserId,
        image_url: &str,
        caption: Option<&str>,
    ) -> Result<PostRecord, PostError>;

    /// Idempotent: liking twice neither fails nor re-notifies.
    async fn like_post(&self, post_id: PostId, user_id: UserId) -> Result<(), PostError>;

    async fn add_comment(
        &self,
        post_id: PostId,
        user_id: UserId,
        content: &str,
    ) -> Result<CommentRecord, PostError>;
}
