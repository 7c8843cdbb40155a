//! Bus-facing side of the notification writer. Dispatch is on the
//! envelope's event-type tag; unknown tags are acked, undecodable payloads
//! dead-lettered, everything else retried.

use std::sync::Arc;

use async_trait::async_trait;
use common::bus::{Delivery, EventHandler, HandlerError};
use common::events::{
    self, event_types, CommentCreatedPayload, FollowPayload, RegisterPayload, TweetCreatedPayload,
    TweetLikedPayload,
};

use crate::notification::NotificationService;

pub struct NotificationListener {
    service: Arc<NotificationService>,
}

impl NotificationListener {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for NotificationListener {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let Some(tag) = events::event_type(&delivery.payload) else {
            return Err(HandlerError::reject(anyhow::anyhow!(
                "payload is not an event envelope"
            )));
        };

        match tag.as_str() {
            event_types::REGISTER => {
                let envelope = events::decode::<RegisterPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_registered(&envelope.event_id, &envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            event_types::FOLLOWED => {
                let envelope = events::decode::<FollowPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_followed(&envelope.event_id, &envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            event_types::TWEET_CREATED => {
                let envelope = events::decode::<TweetCreatedPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_tweet_created(&envelope.event_id, &envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            event_types::TWEET_LIKED => {
                let envelope = events::decode::<TweetLikedPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_tweet_liked(&envelope.event_id, &envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            event_types::COMMENT_CREATED => {
                let envelope = events::decode::<CommentCreatedPayload>(&delivery.payload)
                    .map_err(HandlerError::reject)?;
                self.service
                    .handle_comment_created(&envelope.event_id, &envelope.payload)
                    .await
                    .map_err(HandlerError::retry)
            }
            other => {
                tracing::debug!(queue = %delivery.queue, event_type = other, "ignoring event");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::Utc;
    use common::bus::memory::MemoryBus;
    use common::bus::publish_event;
    use common::clients::mock::{MockCommentApi, MockFollowApi, MockTweetApi};
    use common::events::{routing_keys, topics, Envelope};
    use uuid::Uuid;

    use super::*;
    use crate::database::{MemoryDeviceTokenRepo, MemoryNotificationRepo};
    use crate::notification::{queues, topology};
    use crate::push::recording::RecordingPushSender;

    fn service_with_repo() -> (Arc<NotificationService>, Arc<MemoryNotificationRepo>) {
        let repo = Arc::new(MemoryNotificationRepo::default());
        let service = Arc::new(NotificationService::new(
            repo.clone(),
            Arc::new(MemoryDeviceTokenRepo::default()),
            Arc::new(RecordingPushSender::default()),
            Arc::new(MockTweetApi::default()),
            Arc::new(MockCommentApi::default()),
            Arc::new(MockFollowApi::default()),
        ));
        (service, repo)
    }

    #[tokio::test]
    async fn follow_event_flows_from_bus_to_store() {
        let (service, repo) = service_with_repo();
        let listener = Arc::new(NotificationListener::new(service));

        let bus = MemoryBus::default();
        bus.declare(&topology());
        bus.subscribe(queues::FOLLOWED, listener).await;

        let envelope = Envelope::new(
            event_types::FOLLOWED,
            FollowPayload {
                id: Uuid::new_v4(),
                follower_id: Uuid::new_v4(),
                followed_id: Uuid::new_v4(),
                created_at: Utc::now(),
            },
        );
        publish_event(&bus, topics::FOLLOW_EVENTS, routing_keys::FOLLOWED, &envelope)
            .await
            .unwrap();

        assert_eq!(repo.all().len(), 1);
        assert_eq!(repo.all()[0].event_id, envelope.event_id);
    }

    #[tokio::test]
    async fn garbage_payloads_are_rejected() {
        let (service, _repo) = service_with_repo();
        let listener = NotificationListener::new(service);

        let result = listener
            .handle(&Delivery {
                queue: queues::FOLLOWED.to_string(),
                routing_key: routing_keys::FOLLOWED.to_string(),
                payload: Bytes::from_static(b"not json"),
                retry_count: 0,
            })
            .await;

        assert!(matches!(result, Err(HandlerError::Reject(_))));
    }

    #[tokio::test]
    async fn unknown_event_types_are_acked() {
        let (service, repo) = service_with_repo();
        let listener = NotificationListener::new(service);

        let envelope = Envelope::new("SOMETHING_ELSE", serde_json::json!({"a": 1}));
        let result = listener
            .handle(&Delivery {
                queue: queues::FOLLOWED.to_string(),
                routing_key: routing_keys::FOLLOWED.to_string(),
                payload: envelope.to_bytes().unwrap(),
                retry_count: 0,
            })
            .await;

        assert!(result.is_ok());
        assert!(repo.all().is_empty());
    }
}
