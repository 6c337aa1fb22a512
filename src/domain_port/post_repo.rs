use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait PostRepo: Send + Sync {
    async fn insert(
        &self,
        user_id: UserId,
        image_url: &str,
        caption: Option<&str>,
    ) -> Result<PostRecord, PostError>;

    async fn get_by_id(&self, post_id: PostId) -> Result<Option<PostRecord>, PostError>;

    /// Returns true when the like is new, false when it already existed.
    async fn insert_like(&self, post_id: PostId, user_id: UserId) -> Result<bool, PostError>;

    async fn insert_comment(
        &self,
        post_id: PostId,
        user_id: UserId,
        content: &str,
    ) -> Result<CommentRecord, PostError>;
}
