//! The comment tree.
//!
//! A comment targets exactly one of a tweet (top level) or another comment
//! (reply); replies inherit their tweet from the parent, so the whole tree
//! under a tweet shares its tweet id. Deleting a comment removes its entire
//! reply subtree. Mutations publish events after the store commit; publish
//! failures are logged, never rolled back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::bus::{publish_event, EventBus, Topology};
use common::clients::TweetApi;
use common::events::{
    event_types, routing_keys, topics, CommentCreatedPayload, CommentDeletedPayload, Envelope,
};
use common::pagination::{PageRequest, PageResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::{CommentKind, CommentRepo, CommentRow, NewComment, SORTABLE_COLUMNS};
use crate::error::CommentError;

pub fn topology() -> Topology {
    Topology::new().exchange(topics::COMMENT_EVENTS)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComment {
    pub content: String,
    pub tweet_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: Uuid,
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: CommentKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentRow> for CommentDto {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            tweet_id: row.tweet_id,
            user_id: row.user_id,
            parent_id: row.parent_id,
            kind: row.kind,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct CommentService {
    repo: Arc<dyn CommentRepo>,
    tweets: Arc<dyn TweetApi>,
    bus: Arc<dyn EventBus>,
}

impl CommentService {
    pub fn new(repo: Arc<dyn CommentRepo>, tweets: Arc<dyn TweetApi>, bus: Arc<dyn EventBus>) -> Self {
        Self { repo, tweets, bus }
    }

    pub async fn create(
        &self,
        caller_id: Uuid,
        request: CreateComment,
    ) -> Result<CommentDto, CommentError> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(CommentError::EmptyContent);
        }

        let new_comment = match (request.tweet_id, request.parent_id) {
            (Some(tweet_id), None) => {
                if self.tweets.tweet_by_id(tweet_id).await?.is_none() {
                    return Err(CommentError::TweetNotFound(tweet_id));
                }
                NewComment {
                    tweet_id,
                    user_id: caller_id,
                    parent_id: None,
                    kind: CommentKind::Parent,
                    content: content.to_string(),
                }
            }
            (None, Some(parent_id)) => {
                let parent = self
                    .repo
                    .by_id(parent_id)
                    .await?
                    .ok_or(CommentError::ParentNotFound(parent_id))?;
                NewComment {
                    tweet_id: parent.tweet_id,
                    user_id: caller_id,
                    parent_id: Some(parent.id),
                    kind: CommentKind::Reply,
                    content: content.to_string(),
                }
            }
            _ => return Err(CommentError::AmbiguousTarget),
        };

        let row = self.repo.insert(new_comment).await?;

        let envelope = Envelope::new(
            event_types::COMMENT_CREATED,
            CommentCreatedPayload {
                comment_id: row.id,
                tweet_id: row.tweet_id,
                user_id: row.user_id,
                parent_id: row.parent_id,
                created_at: row.created_at,
            },
        );
        self.publish(routing_keys::COMMENT_CREATED, &envelope).await;

        Ok(row.into())
    }

    pub async fn update(
        &self,
        caller_id: Uuid,
        id: Uuid,
        content: &str,
    ) -> Result<CommentDto, CommentError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CommentError::EmptyContent);
        }

        let row = self.repo.by_id(id).await?.ok_or(CommentError::NotFound)?;
        // Editing is for the author alone.
        if row.user_id != caller_id {
            return Err(CommentError::Forbidden);
        }

        let updated = self
            .repo
            .update_content(id, content)
            .await?
            .ok_or(CommentError::NotFound)?;

        Ok(updated.into())
    }

    /// Delete a comment and its whole reply subtree. Allowed for the
    /// comment's author, the author of the parent comment, and the author
    /// of the tweet it hangs off.
    pub async fn delete(&self, caller_id: Uuid, id: Uuid) -> Result<(), CommentError> {
        let row = self.repo.by_id(id).await?.ok_or(CommentError::NotFound)?;

        if !self.may_delete(caller_id, &row).await? {
            return Err(CommentError::Forbidden);
        }

        let removed = self.repo.delete_tree(id).await?;
        for comment_id in removed {
            let envelope = Envelope::new(
                event_types::COMMENT_DELETED,
                CommentDeletedPayload { comment_id },
            );
            self.publish(routing_keys::COMMENT_DELETED, &envelope).await;
        }

        Ok(())
    }

    async fn may_delete(&self, caller_id: Uuid, row: &CommentRow) -> Result<bool, CommentError> {
        if row.user_id == caller_id {
            return Ok(true);
        }

        if let Some(parent_id) = row.parent_id {
            if let Some(parent) = self.repo.by_id(parent_id).await? {
                if parent.user_id == caller_id {
                    return Ok(true);
                }
            }
        }

        // The tweet may be gone already; then only the authors above count.
        if let Some(tweet) = self.tweets.tweet_by_id(row.tweet_id).await? {
            if tweet.user_id == caller_id {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub async fn get(&self, id: Uuid) -> Result<CommentDto, CommentError> {
        let row = self.repo.by_id(id).await?.ok_or(CommentError::NotFound)?;
        Ok(row.into())
    }

    pub async fn top_level(
        &self,
        tweet_id: Uuid,
        request: PageRequest,
    ) -> Result<PageResponse<CommentDto>, CommentError> {
        request.sort.column(SORTABLE_COLUMNS)?;
        let (rows, total) = self.repo.page_top_level(tweet_id, &request).await?;
        Ok(to_page(rows, &request, total))
    }

    pub async fn replies(
        &self,
        parent_id: Uuid,
        request: PageRequest,
    ) -> Result<PageResponse<CommentDto>, CommentError> {
        request.sort.column(SORTABLE_COLUMNS)?;
        self.repo
            .by_id(parent_id)
            .await?
            .ok_or(CommentError::ParentNotFound(parent_id))?;
        let (rows, total) = self.repo.page_replies(parent_id, &request).await?;
        Ok(to_page(rows, &request, total))
    }

    async fn publish<T: Serialize + Sync>(&self, routing_key: &str, envelope: &Envelope<T>) {
        if let Err(err) = publish_event(
            self.bus.as_ref(),
            topics::COMMENT_EVENTS,
            routing_key,
            envelope,
        )
        .await
        {
            tracing::error!(routing_key, "failed to publish comment event: {err:#}");
        }
    }
}

fn to_page(rows: Vec<CommentRow>, request: &PageRequest, total: u64) -> PageResponse<CommentDto> {
    PageResponse::new(
        rows.into_iter().map(CommentDto::from).collect(),
        request,
        total,
    )
}

#[cfg(test)]
mod tests {
    use common::bus::memory::MemoryBus;
    use common::clients::mock::MockTweetApi;
    use common::clients::Tweet;
    use common::events::decode;
    use common::pagination::Sort;

    use super::*;
    use crate::database::MemoryCommentRepo;

    struct Fixture {
        service: CommentService,
        repo: Arc<MemoryCommentRepo>,
        tweets: Arc<MockTweetApi>,
        bus: Arc<MemoryBus>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryCommentRepo::default());
        let tweets = Arc::new(MockTweetApi::default());
        let bus = Arc::new(MemoryBus::default());
        Fixture {
            service: CommentService::new(repo.clone(), tweets.clone(), bus.clone()),
            repo,
            tweets,
            bus,
        }
    }

    fn tweet(author: Uuid) -> Tweet {
        Tweet {
            id: Uuid::new_v4(),
            user_id: author,
            content: "hello".to_string(),
            created_at: Utc::now(),
        }
    }

    fn on_tweet(content: &str, tweet_id: Uuid) -> CreateComment {
        CreateComment {
            content: content.to_string(),
            tweet_id: Some(tweet_id),
            parent_id: None,
        }
    }

    fn reply_to(content: &str, parent_id: Uuid) -> CreateComment {
        CreateComment {
            content: content.to_string(),
            tweet_id: None,
            parent_id: Some(parent_id),
        }
    }

    fn page(number: u32, size: u32) -> PageRequest {
        PageRequest::new(number, size, Sort::parse("createdAt,asc").unwrap())
    }

    #[tokio::test]
    async fn top_level_comment_publishes_created_event() {
        let f = fixture();
        let posted = tweet(Uuid::new_v4());
        f.tweets.insert(posted.clone());
        let alice = Uuid::new_v4();

        let comment = f
            .service
            .create(alice, on_tweet("nice tweet", posted.id))
            .await
            .unwrap();
        assert_eq!(comment.kind, CommentKind::Parent);
        assert_eq!(comment.tweet_id, posted.id);

        let published = f
            .bus
            .published_to(topics::COMMENT_EVENTS, routing_keys::COMMENT_CREATED);
        assert_eq!(published.len(), 1);
        let envelope: Envelope<CommentCreatedPayload> = decode(&published[0]).unwrap();
        assert_eq!(envelope.payload.comment_id, comment.id);
        assert_eq!(envelope.payload.parent_id, None);
    }

    #[tokio::test]
    async fn reply_inherits_the_tweet_from_its_parent() {
        let f = fixture();
        let posted = tweet(Uuid::new_v4());
        f.tweets.insert(posted.clone());

        let parent = f
            .service
            .create(Uuid::new_v4(), on_tweet("first", posted.id))
            .await
            .unwrap();
        let reply = f
            .service
            .create(Uuid::new_v4(), reply_to("second", parent.id))
            .await
            .unwrap();

        assert_eq!(reply.kind, CommentKind::Reply);
        assert_eq!(reply.tweet_id, posted.id);
        assert_eq!(reply.parent_id, Some(parent.id));

        // Replies to replies nest further down the same tweet.
        let nested = f
            .service
            .create(Uuid::new_v4(), reply_to("third", reply.id))
            .await
            .unwrap();
        assert_eq!(nested.tweet_id, posted.id);
    }

    #[tokio::test]
    async fn target_must_be_exactly_one_of_tweet_or_parent() {
        let f = fixture();
        let alice = Uuid::new_v4();

        let both = CreateComment {
            content: "hm".to_string(),
            tweet_id: Some(Uuid::new_v4()),
            parent_id: Some(Uuid::new_v4()),
        };
        assert!(matches!(
            f.service.create(alice, both).await,
            Err(CommentError::AmbiguousTarget)
        ));

        let neither = CreateComment {
            content: "hm".to_string(),
            tweet_id: None,
            parent_id: None,
        };
        assert!(matches!(
            f.service.create(alice, neither).await,
            Err(CommentError::AmbiguousTarget)
        ));
    }

    #[tokio::test]
    async fn missing_targets_are_not_found() {
        let f = fixture();
        let alice = Uuid::new_v4();

        assert!(matches!(
            f.service.create(alice, on_tweet("hi", Uuid::new_v4())).await,
            Err(CommentError::TweetNotFound(_))
        ));
        assert!(matches!(
            f.service.create(alice, reply_to("hi", Uuid::new_v4())).await,
            Err(CommentError::ParentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let f = fixture();
        let posted = tweet(Uuid::new_v4());
        f.tweets.insert(posted.clone());

        assert!(matches!(
            f.service
                .create(Uuid::new_v4(), on_tweet("   ", posted.id))
                .await,
            Err(CommentError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn only_the_author_may_edit() {
        let f = fixture();
        let posted = tweet(Uuid::new_v4());
        f.tweets.insert(posted.clone());
        let alice = Uuid::new_v4();

        let comment = f
            .service
            .create(alice, on_tweet("tpyo", posted.id))
            .await
            .unwrap();

        assert!(matches!(
            f.service.update(Uuid::new_v4(), comment.id, "fixed").await,
            Err(CommentError::Forbidden)
        ));

        let updated = f.service.update(alice, comment.id, "typo").await.unwrap();
        assert_eq!(updated.content, "typo");
    }

    #[tokio::test]
    async fn delete_is_allowed_for_author_parent_author_and_tweet_author() {
        let f = fixture();
        let tweet_author = Uuid::new_v4();
        let posted = tweet(tweet_author);
        f.tweets.insert(posted.clone());

        let (parent_author, commenter) = (Uuid::new_v4(), Uuid::new_v4());

        // Comment author deletes their own.
        let own = f
            .service
            .create(commenter, on_tweet("mine", posted.id))
            .await
            .unwrap();
        f.service.delete(commenter, own.id).await.unwrap();

        // Parent comment author moderates replies under them.
        let parent = f
            .service
            .create(parent_author, on_tweet("thread", posted.id))
            .await
            .unwrap();
        let reply = f
            .service
            .create(commenter, reply_to("rude", parent.id))
            .await
            .unwrap();
        f.service.delete(parent_author, reply.id).await.unwrap();

        // Tweet author moderates everything under their tweet.
        let another = f
            .service
            .create(commenter, on_tweet("spam", posted.id))
            .await
            .unwrap();
        f.service.delete(tweet_author, another.id).await.unwrap();

        // A stranger may not.
        let kept = f
            .service
            .create(commenter, on_tweet("fine", posted.id))
            .await
            .unwrap();
        assert!(matches!(
            f.service.delete(Uuid::new_v4(), kept.id).await,
            Err(CommentError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn delete_removes_the_whole_subtree() {
        let f = fixture();
        let posted = tweet(Uuid::new_v4());
        f.tweets.insert(posted.clone());
        let alice = Uuid::new_v4();

        let root = f
            .service
            .create(alice, on_tweet("root", posted.id))
            .await
            .unwrap();
        let child = f
            .service
            .create(Uuid::new_v4(), reply_to("child", root.id))
            .await
            .unwrap();
        let _grandchild = f
            .service
            .create(Uuid::new_v4(), reply_to("grandchild", child.id))
            .await
            .unwrap();
        let sibling = f
            .service
            .create(alice, on_tweet("sibling", posted.id))
            .await
            .unwrap();

        f.service.delete(alice, root.id).await.unwrap();

        assert_eq!(f.repo.len(), 1);
        assert!(f.service.get(sibling.id).await.is_ok());
        assert!(matches!(
            f.service.get(root.id).await,
            Err(CommentError::NotFound)
        ));

        // One deleted event per removed comment.
        let published = f
            .bus
            .published_to(topics::COMMENT_EVENTS, routing_keys::COMMENT_DELETED);
        assert_eq!(published.len(), 3);
    }

    #[tokio::test]
    async fn listings_separate_top_level_from_replies() {
        let f = fixture();
        let posted = tweet(Uuid::new_v4());
        f.tweets.insert(posted.clone());
        let alice = Uuid::new_v4();

        let first = f
            .service
            .create(alice, on_tweet("first", posted.id))
            .await
            .unwrap();
        f.service
            .create(alice, on_tweet("second", posted.id))
            .await
            .unwrap();
        f.service
            .create(alice, reply_to("a reply", first.id))
            .await
            .unwrap();

        let top = f.service.top_level(posted.id, page(1, 10)).await.unwrap();
        assert_eq!(top.total_elements, 2);
        assert_eq!(top.contents[0].content, "first");

        let replies = f.service.replies(first.id, page(1, 10)).await.unwrap();
        assert_eq!(replies.total_elements, 1);
        assert_eq!(replies.contents[0].content, "a reply");
    }

    #[tokio::test]
    async fn tweet_service_outage_surfaces_as_upstream_error() {
        let f = fixture();
        f.tweets.set_failing(true);

        assert!(matches!(
            f.service
                .create(Uuid::new_v4(), on_tweet("hi", Uuid::new_v4()))
                .await,
            Err(CommentError::Upstream(_))
        ));
    }
}
