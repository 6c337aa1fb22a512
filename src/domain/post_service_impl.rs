use crate::application_port::{NotificationError, NotificationService, PostError, PostService};
use crate::domain_model::{CommentRecord, PostId, PostRecord, UserId};
use crate::domain_port::PostRepo;
use std::sync::Arc;

pub struct RealPostService {
    post_repo: Arc<dyn PostRepo>,
    notification_service: Arc<dyn NotificationService>,
    max_caption_len: usize,
    max_comment_len: usize,
}

impl RealPostService {
    pub fn new(
        post_repo: Arc<dyn PostRepo>,
        notification_service: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            post_repo,
            notification_service,
            max_caption_len: 2000,
            max_comment_len: 2000,
        }
    }

    async fn require_post(&self, post_id: PostId) -> Result<PostRecord, PostError> {
        self.post_repo
            .get_by_id(post_id)
            .await?
            .ok_or(PostError::NotFound)
    }
}

fn from_notification_error(e: NotificationError) -> PostError {
    match e {
        NotificationError::PostNotFound => PostError::NotFound,
        other => PostError::Store(other.to_string()),
    }
}

#[async_trait::async_trait]
impl PostService for RealPostService {
    async fn create_post(
        &self,
        author: UserId,
        image_url: &str,
        caption: Option<&str>,
    ) -> Result<PostRecord, PostError> {
        if image_url.is_empty() {
            return Err(PostError::Validation("missing image url".to_string()));
        }
        if caption.is_some_and(|c| c.len() > self.max_caption_len) {
            return Err(PostError::Validation("caption too long".to_string()));
        }

        self.post_repo.insert(author, image_url, caption).await
    }

    async fn like_post(&self, post_id: PostId, user_id: UserId) -> Result<(), PostError> {
        self.require_post(post_id).await?;

        let newly_liked = self.post_repo.insert_like(post_id, user_id).await?;
        if newly_liked {
            self.notification_service
                .create_like_notification(post_id, user_id)
                .await
                .map_err(from_notification_error)?;
        }

        Ok(())
    }

    async fn add_comment(
        &self,
        post_id: PostId,
        user_id: UserId,
        content: &str,
    ) -> Result<CommentRecord, PostError> {
        if content.is_empty() || content.len() > self.max_comment_len {
            return Err(PostError::Validation("invalid comment length".to_string()));
        }
        self.require_post(post_id).await?;

        let comment = self
            .post_repo
            .insert_comment(post_id, user_id, content)
            .await?;

        self.notification_service
            .create_comment_notification(post_id, user_id)
            .await
            .map_err(from_notification_error)?;

        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification_service_impl::tests::{
        EveryoneExists, MemoryNotificationRepo, MemoryPostRepo, RecordingPublisher,
    };
    use crate::domain::RealNotificationService;

    struct Harness {
        service: RealPostService,
        post_repo: Arc<MemoryPostRepo>,
        notification_repo: Arc<MemoryNotificationRepo>,
    }

    fn harness() -> Harness {
        let post_repo = Arc::new(MemoryPostRepo::default());
        let notification_repo = Arc::new(MemoryNotificationRepo::default());
        let notification_service = Arc::new(RealNotificationService::new(
            notification_repo.clone(),
            post_repo.clone(),
            Arc::new(EveryoneExists),
            Arc::new(RecordingPublisher::default()),
        ));
        Harness {
            service: RealPostService::new(post_repo.clone(), notification_service),
            post_repo,
            notification_repo,
        }
    }

    #[tokio::test]
    async fn like_notifies_once_even_when_repeated() {
        let h = harness();
        let post = h
            .service
            .create_post(UserId(1), "https://cdn.example.com/a.jpg", Some("caption"))
            .await
            .unwrap();

        h.service.like_post(post.post_id, UserId(2)).await.unwrap();
        h.service.like_post(post.post_id, UserId(2)).await.unwrap();

        assert_eq!(h.post_repo.likes.lock().unwrap().len(), 1);
        assert_eq!(h.notification_repo.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn comment_on_missing_post_fails() {
        let h = harness();
        assert!(matches!(
            h.service.add_comment(PostId(9), UserId(2), "nice").await,
            Err(PostError::NotFound)
        ));
    }

    #[tokio::test]
    async fn comment_notifies_post_owner() {
        let h = harness();
        let post = h
            .service
            .create_post(UserId(1), "https://cdn.example.com/a.jpg", None)
            .await
            .unwrap();

        h.service
            .add_comment(post.post_id, UserId(2), "nice shot")
            .await
            .unwrap();

        let rows = h.notification_repo.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient_id, UserId(1));
    }
}
