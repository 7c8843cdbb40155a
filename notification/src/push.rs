//! Push delivery to registered device tokens.
//!
//! Pushes are best effort: a token that fails is logged and skipped, it
//! never fails the notification write or the surrounding bus delivery.

use async_trait::async_trait;
use common::config::CollaboratorConfig;
use serde::Serialize;

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str) -> anyhow::Result<()>;
}

#[derive(Serialize)]
struct PushMessage<'a> {
    token: &'a str,
    title: &'a str,
    body: &'a str,
}

/// Talks to the push gateway over JSON/HTTP.
pub struct HttpPushSender {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPushSender {
    pub fn new(config: &CollaboratorConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_millis(config.timeout_ms))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send(&self, token: &str, title: &str, body: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(format!("{}/v1/push", self.base_url))
            .json(&PushMessage { token, title, body })
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("push gateway returned {}", response.status());
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod recording {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentPush {
        pub token: String,
        pub title: String,
        pub body: String,
    }

    /// Records every push; tokens listed in `broken` fail instead.
    #[derive(Default)]
    pub struct RecordingPushSender {
        sent: Mutex<Vec<SentPush>>,
        broken: Mutex<Vec<String>>,
    }

    impl RecordingPushSender {
        pub fn sent(&self) -> Vec<SentPush> {
            self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }

        pub fn break_token(&self, token: &str) {
            self.broken
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(token.to_string());
        }
    }

    #[async_trait]
    impl PushSender for RecordingPushSender {
        async fn send(&self, token: &str, title: &str, body: &str) -> anyhow::Result<()> {
            if self
                .broken
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .any(|t| t == token)
            {
                anyhow::bail!("token rejected by gateway");
            }

            self.sent
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(SentPush {
                    token: token.to_string(),
                    title: title.to_string(),
                    body: body.to_string(),
                });
            Ok(())
        }
    }
}
