use crate::application_port::{
    NotificationError, NotificationPublisher, NotificationService,
};
use crate::domain_model::{NotificationId, NotificationKind, NotificationRecord, PostId, UserId};
use crate::domain_port::{NotificationRepo, PostRepo, UserRepo};
use std::sync::Arc;

pub struct RealNotificationService {
    notification_repo: Arc<dyn NotificationRepo>,
    post_repo: Arc<dyn PostRepo>,
    user_repo: Arc<dyn UserRepo>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl RealNotificationService {
    pub fn new(
        notification_repo: Arc<dyn NotificationRepo>,
        post_repo: Arc<dyn PostRepo>,
        user_repo: Arc<dyn UserRepo>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            notification_repo,
            post_repo,
            user_repo,
            publisher,
        }
    }

    /// Persist first, push after. A recipient with no live connections just
    /// picks the row up later over HTTP.
    async fn store_and_publish(
        &self,
        recipient: UserId,
        sender: UserId,
        kind: NotificationKind,
        target: Option<PostId>,
    ) -> Result<(), NotificationError> {
        let record = self
            .notification_repo
            .insert(recipient, Some(sender), kind, target)
            .await?;

        if let Err(e) = self.publisher.publish(&record).await {
            tracing::warn!(
                recipient = %recipient,
                kind = kind.as_str(),
                "realtime push failed: {e:#}"
            );
        }

        Ok(())
    }

    async fn post_owner(&self, post_id: PostId) -> Result<UserId, NotificationError> {
        let post = self
            .post_repo
            .get_by_id(post_id)
            .await
            .map_err(|e| NotificationError::Store(e.to_string()))?
            .ok_or(NotificationError::PostNotFound)?;
        Ok(post.user_id)
    }
}

#[async_trait::async_trait]
impl NotificationService for RealNotificationService {
    async fn create_like_notification(
        &self,
        post_id: PostId,
        liker: UserId,
    ) -> Result<(), NotificationError> {
        let owner = self.post_owner(post_id).await?;
        if owner == liker {
            return Ok(()); // no self-notifications
        }

        self.store_and_publish(owner, liker, NotificationKind::Like, Some(post_id))
            .await
    }

    async fn create_comment_notification(
        &self,
        post_id: PostId,
        commenter: UserId,
    ) -> Result<(), NotificationError> {
        let owner = self.post_owner(post_id).await?;
        if owner == commenter {
            return Ok(());
        }

        self.store_and_publish(owner, commenter, NotificationKind::Comment, Some(post_id))
            .await
    }

    async fn create_follow_notification(
        &self,
        follower: UserId,
        followed: UserId,
    ) -> Result<(), NotificationError> {
        if follower == followed {
            return Ok(());
        }
        let exists = self
            .user_repo
            .id_exists(followed)
            .await
            .map_err(|e| NotificationError::Store(e.to_string()))?;
        if !exists {
            return Err(NotificationError::UserNotFound);
        }

        self.store_and_publish(followed, follower, NotificationKind::Follow, None)
            .await
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>, NotificationError> {
        self.notification_repo.list_for_user(user_id, limit).await
    }

    async fn mark_read(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> Result<(), NotificationError> {
        let updated = self
            .notification_repo
            .mark_read(notification_id, user_id)
            .await?;
        if !updated {
            return Err(NotificationError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<(), NotificationError> {
        self.notification_repo.mark_all_read(user_id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application_port::{AuthError, PostError};
    use crate::domain_model::{CommentId, CommentRecord, PostRecord};
    use crate::domain_port::{StorageTx, UserRecord};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MemoryNotificationRepo {
        pub rows: Mutex<Vec<NotificationRecord>>,
    }

    #[async_trait::async_trait]
    impl NotificationRepo for MemoryNotificationRepo {
        async fn insert(
            &self,
            recipient_id: UserId,
            sender_id: Option<UserId>,
            kind: NotificationKind,
            target_id: Option<PostId>,
        ) -> Result<NotificationRecord, NotificationError> {
            let mut rows = self.rows.lock().unwrap();
            let record = NotificationRecord {
                notification_id: NotificationId(rows.len() as i64 + 1),
                recipient_id,
                sender_id,
                kind,
                target_id,
                is_read: false,
                created_at: Utc::now(),
            };
            rows.push(record.clone());
            Ok(record)
        }

        async fn list_for_user(
            &self,
            user_id: UserId,
            limit: u32,
        ) -> Result<Vec<NotificationRecord>, NotificationError> {
            let rows = self.rows.lock().unwrap();
            let mut out: Vec<_> = rows
                .iter()
                .filter(|n| n.recipient_id == user_id)
                .cloned()
                .collect();
            out.reverse();
            out.truncate(limit as usize);
            Ok(out)
        }

        async fn mark_read(
            &self,
            notification_id: NotificationId,
            recipient_id: UserId,
        ) -> Result<bool, NotificationError> {
            let mut rows = self.rows.lock().unwrap();
            match rows
                .iter_mut()
                .find(|n| n.notification_id == notification_id && n.recipient_id == recipient_id)
            {
                Some(n) => {
                    n.is_read = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn mark_all_read(&self, recipient_id: UserId) -> Result<(), NotificationError> {
            for n in self.rows.lock().unwrap().iter_mut() {
                if n.recipient_id == recipient_id {
                    n.is_read = true;
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryPostRepo {
        pub posts: Mutex<Vec<PostRecord>>,
        pub likes: Mutex<Vec<(PostId, UserId)>>,
        pub comments: Mutex<Vec<CommentRecord>>,
    }

    impl MemoryPostRepo {
        pub fn seed_post(&self, owner: UserId) -> PostId {
            let mut posts = self.posts.lock().unwrap();
            let id = PostId(posts.len() as i64 + 1);
            posts.push(PostRecord {
                post_id: id,
                user_id: owner,
                image_url: "https://cdn.example.com/img.jpg".to_string(),
                caption: None,
                created_at: Utc::now(),
            });
            id
        }
    }

    #[async_trait::async_trait]
    impl PostRepo for MemoryPostRepo {
        async fn insert(
            &self,
            user_id: UserId,
            image_url: &str,
            caption: Option<&str>,
        ) -> Result<PostRecord, PostError> {
            let mut posts = self.posts.lock().unwrap();
            let record = PostRecord {
                post_id: PostId(posts.len() as i64 + 1),
                user_id,
                image_url: image_url.to_owned(),
                caption: caption.map(str::to_owned),
                created_at: Utc::now(),
            };
            posts.push(record.clone());
            Ok(record)
        }

        async fn get_by_id(&self, post_id: PostId) -> Result<Option<PostRecord>, PostError> {
            Ok(self
                .posts
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.post_id == post_id)
                .cloned())
        }

        async fn insert_like(&self, post_id: PostId, user_id: UserId) -> Result<bool, PostError> {
            let mut likes = self.likes.lock().unwrap();
            if likes.contains(&(post_id, user_id)) {
                return Ok(false);
            }
            likes.push((post_id, user_id));
            Ok(true)
        }

        async fn insert_comment(
            &self,
            post_id: PostId,
            user_id: UserId,
            content: &str,
        ) -> Result<CommentRecord, PostError> {
            let mut comments = self.comments.lock().unwrap();
            let record = CommentRecord {
                comment_id: CommentId(comments.len() as i64 + 1),
                post_id,
                user_id,
                content: content.to_owned(),
                created_at: Utc::now(),
            };
            comments.push(record.clone());
            Ok(record)
        }
    }

    /// User repo where every id below 1000 exists. Enough for these tests.
    pub(crate) struct EveryoneExists;

    #[async_trait::async_trait]
    impl UserRepo for EveryoneExists {
        async fn create_in_tx<'t>(
            &self,
            _tx: &mut dyn StorageTx<'t>,
            _username: &str,
            _email: &str,
        ) -> Result<UserId, AuthError> {
            Err(AuthError::InternalError("not supported".to_string()))
        }

        async fn get_username_in_tx<'t>(
            &self,
            _tx: &mut dyn StorageTx<'t>,
            user_id: UserId,
        ) -> Result<String, AuthError> {
            Ok(format!("user{}", user_id))
        }

        async fn get_by_username(&self, _username: &str) -> Result<Option<UserRecord>, AuthError> {
            Ok(None)
        }

        async fn username_exists(&self, _username: &str) -> Result<bool, AuthError> {
            Ok(false)
        }

        async fn email_exists(&self, _email: &str) -> Result<bool, AuthError> {
            Ok(false)
        }

        async fn id_exists(&self, user_id: UserId) -> Result<bool, AuthError> {
            Ok(user_id.0 < 1000)
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        pub published: Mutex<Vec<NotificationRecord>>,
    }

    #[async_trait::async_trait]
    impl NotificationPublisher for RecordingPublisher {
        async fn publish(&self, notification: &NotificationRecord) -> anyhow::Result<()> {
            self.published.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Harness {
        service: RealNotificationService,
        notification_repo: Arc<MemoryNotificationRepo>,
        post_repo: Arc<MemoryPostRepo>,
        publisher: Arc<RecordingPublisher>,
    }

    fn harness() -> Harness {
        let notification_repo = Arc::new(MemoryNotificationRepo::default());
        let post_repo = Arc::new(MemoryPostRepo::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let service = RealNotificationService::new(
            notification_repo.clone(),
            post_repo.clone(),
            Arc::new(EveryoneExists),
            publisher.clone(),
        );
        Harness {
            service,
            notification_repo,
            post_repo,
            publisher,
        }
    }

    #[tokio::test]
    async fn like_notification_is_stored_then_pushed() {
        let h = harness();
        let post = h.post_repo.seed_post(UserId(1));

        h.service
            .create_like_notification(post, UserId(2))
            .await
            .unwrap();

        let rows = h.notification_repo.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient_id, UserId(1));
        assert_eq!(rows[0].sender_id, Some(UserId(2)));
        assert_eq!(rows[0].kind, NotificationKind::Like);
        assert_eq!(rows[0].target_id, Some(post));

        let pushed = h.publisher.published.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].notification_id, rows[0].notification_id);
    }

    #[tokio::test]
    async fn own_post_like_produces_nothing() {
        let h = harness();
        let post = h.post_repo.seed_post(UserId(1));

        h.service
            .create_like_notification(post, UserId(1))
            .await
            .unwrap();

        assert!(h.notification_repo.rows.lock().unwrap().is_empty());
        assert!(h.publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn like_on_missing_post_fails() {
        let h = harness();
        assert!(matches!(
            h.service.create_like_notification(PostId(77), UserId(2)).await,
            Err(NotificationError::PostNotFound)
        ));
    }

    #[tokio::test]
    async fn self_follow_produces_nothing() {
        let h = harness();
        h.service
            .create_follow_notification(UserId(5), UserId(5))
            .await
            .unwrap();
        assert!(h.notification_repo.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn follow_notification_reaches_only_the_followed() {
        let h = harness();
        h.service
            .create_follow_notification(UserId(5), UserId(6))
            .await
            .unwrap();

        let rows = h.notification_repo.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient_id, UserId(6));
        assert_eq!(rows[0].kind, NotificationKind::Follow);
        assert_eq!(rows[0].target_id, None);

        assert!(matches!(
            h.service
                .create_follow_notification(UserId(5), UserId(5000))
                .await,
            Err(NotificationError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn mark_read_requires_ownership() {
        let h = harness();
        let post = h.post_repo.seed_post(UserId(1));
        h.service
            .create_comment_notification(post, UserId(2))
            .await
            .unwrap();
        let id = h.notification_repo.rows.lock().unwrap()[0].notification_id;

        assert!(matches!(
            h.service.mark_read(id, UserId(2)).await,
            Err(NotificationError::NotFound)
        ));
        h.service.mark_read(id, UserId(1)).await.unwrap();
        assert!(h.notification_repo.rows.lock().unwrap()[0].is_read);
    }
}
