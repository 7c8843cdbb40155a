//! Wire format for everything that crosses the event bus.
//!
//! Every published message is an [`Envelope`] carrying a globally unique
//! event id, an event-type tag used as the dispatch key, an origin timestamp
//! and a type-specific payload. Consumers dispatch on the tag and ignore
//! unknown tags rather than fail.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic exchanges. One per owning service, all durable.
pub mod topics {
    pub const FOLLOW_EVENTS: &str = "follow.events";
    pub const TWEET_EVENTS: &str = "tweet.events";
    pub const COMMENT_EVENTS: &str = "comment.events";
    pub const USER_EVENTS: &str = "user.events";
}

/// Routing keys within the topics above.
pub mod routing_keys {
    pub const FOLLOWED: &str = "follow.followed";
    pub const UNFOLLOWED: &str = "follow.unfollowed";
    pub const TWEET_CREATED: &str = "tweet.created";
    pub const TWEET_LIKED: &str = "tweet.liked";
    pub const COMMENT_CREATED: &str = "comment.created";
    pub const COMMENT_DELETED: &str = "comment.deleted";
    pub const USER_REGISTERED: &str = "user.registered";
}

/// Event-type tags carried in the envelope.
pub mod event_types {
    pub const FOLLOWED: &str = "FOLLOWED";
    pub const UNFOLLOWED: &str = "UNFOLLOWED";
    pub const TWEET_CREATED: &str = "TWEET_CREATED";
    pub const TWEET_LIKED: &str = "TWEET_LIKED";
    pub const COMMENT_CREATED: &str = "COMMENT_CREATED";
    pub const COMMENT_DELETED: &str = "COMMENT_DELETED";
    pub const REGISTER: &str = "REGISTER";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: String,
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(event_type: &str, payload: T) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// Decode a full envelope. Fails if the payload does not match `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<Envelope<T>> {
    serde_json::from_slice(bytes)
}

/// Read only the event-type tag, tolerating any payload shape.
pub fn event_type(bytes: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Tag {
        event_type: String,
    }

    serde_json::from_slice::<Tag>(bytes)
        .ok()
        .map(|t| t.event_type)
}

/// Payload of `FOLLOWED` and `UNFOLLOWED`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowPayload {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub followed_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetCreatedPayload {
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetLikedPayload {
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreatedPayload {
    pub comment_id: Uuid,
    pub tweet_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDeletedPayload {
    pub comment_id: Uuid,
}

/// Payload of `REGISTER`, emitted by the identity provider when an account
/// is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_camel_case() {
        let envelope = Envelope::new(
            event_types::TWEET_CREATED,
            TweetCreatedPayload {
                tweet_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                created_at: Utc::now(),
            },
        );

        let bytes = envelope.to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("eventId").is_some());
        assert!(value.get("eventType").is_some());
        assert!(value["payload"].get("tweetId").is_some());

        let decoded: Envelope<TweetCreatedPayload> = decode(&bytes).unwrap();
        assert_eq!(decoded.event_type, event_types::TWEET_CREATED);
        assert_eq!(decoded.payload.tweet_id, envelope.payload.tweet_id);
    }

    #[test]
    fn event_type_is_readable_without_payload_shape() {
        let bytes = serde_json::to_vec(&serde_json::json!({
            "eventId": "x",
            "eventType": "SOMETHING_NEW",
            "timestamp": "t",
            "payload": {"whatever": [1, 2, 3]},
        }))
        .unwrap();

        assert_eq!(event_type(&bytes).as_deref(), Some("SOMETHING_NEW"));
        assert_eq!(event_type(b"not json"), None);
    }
}
