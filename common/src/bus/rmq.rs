//! RabbitMQ implementation of the event bus.
//!
//! Messages are published persistent to durable topic exchanges. Consumers
//! ack on success; a retryable failure republishes the message to the same
//! queue with an incremented `x-retry-count` header (so the retry budget
//! travels with the message), and once the budget is exhausted, or on a
//! permanent reject, the message is moved to `<queue>.dlq`.

use std::{sync::Arc, time::Duration};

use anyhow::{Context as _, Result};
use bytes::Bytes;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};

use super::{dead_letter_queue, Delivery, EventBus, EventHandler, HandlerError, Topology};
use crate::context::Context;

const RETRY_COUNT_HEADER: &str = "x-retry-count";

pub struct RmqBus {
    connection: Connection,
    channel: Channel,
    max_retries: u32,
}

impl RmqBus {
    pub async fn connect(uri: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let connection = tokio::time::timeout(
            timeout,
            Connection::connect(uri, ConnectionProperties::default()),
        )
        .await
        .context("timed out connecting to rabbitmq")??;

        connection.on_error(|err| {
            tracing::error!("rabbitmq connection error: {err}");
        });

        let channel = connection.create_channel().await?;

        Ok(Self {
            connection,
            channel,
            max_retries,
        })
    }

    /// Declare the durable exchanges, queues, dead-letter queues and
    /// bindings this service relies on. Idempotent on the broker side.
    pub async fn declare(&self, topology: &Topology) -> Result<()> {
        for exchange in &topology.exchanges {
            self.channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        for queue in &topology.queues {
            for name in [queue.name.clone(), dead_letter_queue(&queue.name)] {
                self.channel
                    .queue_declare(
                        &name,
                        QueueDeclareOptions {
                            durable: true,
                            ..Default::default()
                        },
                        FieldTable::default(),
                    )
                    .await?;
            }

            for binding in &queue.bindings {
                self.channel
                    .queue_bind(
                        &queue.name,
                        &binding.exchange,
                        &binding.pattern,
                        QueueBindOptions::default(),
                        FieldTable::default(),
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// Spawn a consumer loop for `queue`. The loop survives channel errors
    /// by recreating its channel, and stops when the context is cancelled.
    pub fn spawn_consumer(
        self: &Arc<Self>,
        ctx: Context,
        queue: String,
        handler: Arc<dyn EventHandler>,
    ) -> tokio::task::JoinHandle<()> {
        let bus = self.clone();
        tokio::spawn(async move { bus.consume_loop(ctx, queue, handler).await })
    }

    async fn consume_loop(&self, ctx: Context, queue: String, handler: Arc<dyn EventHandler>) {
        loop {
            let channel = match self.consumer_channel(&queue).await {
                Ok(channel) => channel,
                Err(err) => {
                    tracing::error!(queue = %queue, "failed to open consumer channel: {err}");
                    tokio::select! {
                        _ = ctx.done() => return,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => continue,
                    }
                }
            };

            let mut consumer = match channel
                .basic_consume(
                    &queue,
                    &format!("{queue}-consumer"),
                    BasicConsumeOptions::default(),
                    FieldTable::default(),
                )
                .await
            {
                Ok(consumer) => consumer,
                Err(err) => {
                    tracing::error!(queue = %queue, "failed to start consumer: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            loop {
                tokio::select! {
                    _ = ctx.done() => return,
                    next = consumer.next() => match next {
                        Some(Ok(delivery)) => {
                            if let Err(err) = self.process(&queue, delivery, &*handler).await {
                                tracing::error!(queue = %queue, "failed to settle delivery: {err}");
                            }
                        }
                        Some(Err(err)) => {
                            tracing::error!(queue = %queue, "consumer stream error: {err}");
                            break;
                        }
                        None => break,
                    },
                }
            }

            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    async fn consumer_channel(&self, queue: &str) -> Result<Channel> {
        let channel = self.connection.create_channel().await?;
        channel.basic_qos(16, BasicQosOptions::default()).await?;
        tracing::debug!(queue = %queue, "consumer channel open");
        Ok(channel)
    }

    async fn process(
        &self,
        queue: &str,
        delivery: lapin::message::Delivery,
        handler: &dyn EventHandler,
    ) -> Result<()> {
        let retry_count = header_retry_count(&delivery.properties);
        let seen = Delivery {
            queue: queue.to_string(),
            routing_key: delivery.routing_key.to_string(),
            payload: Bytes::from(delivery.data.clone()),
            retry_count,
        };

        let settle = match handler.handle(&seen).await {
            Ok(()) => Ok(()),
            Err(HandlerError::Retry(err)) if retry_count < self.max_retries => {
                tracing::warn!(
                    queue = %queue,
                    retry_count,
                    "handler failed, redelivering: {err}"
                );
                self.raw_publish("", queue, &delivery.data, retry_count + 1)
                    .await
            }
            Err(err) => {
                tracing::error!(
                    queue = %queue,
                    retry_count,
                    "handler failed permanently, dead-lettering: {err}"
                );
                self.raw_publish("", &dead_letter_queue(queue), &delivery.data, retry_count)
                    .await
            }
        };

        match settle {
            Ok(()) => delivery.ack(BasicAckOptions::default()).await?,
            Err(err) => {
                // Could not hand the message on; give it back to the broker
                // instead of losing it.
                tracing::error!(queue = %queue, "failed to republish delivery: {err}");
                delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await?;
            }
        }

        Ok(())
    }

    async fn raw_publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        retry_count: u32,
    ) -> Result<()> {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from(RETRY_COUNT_HEADER),
            AMQPValue::LongUInt(retry_count),
        );

        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_content_type(ShortString::from("application/json"))
                    .with_delivery_mode(2)
                    .with_headers(headers),
            )
            .await?
            .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl EventBus for RmqBus {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> anyhow::Result<()> {
        self.raw_publish(exchange, routing_key, &payload, 0).await
    }
}

fn header_retry_count(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|table| {
            table
                .inner()
                .iter()
                .find(|(key, _)| key.as_str() == RETRY_COUNT_HEADER)
                .map(|(_, value)| value)
        })
        .and_then(|value| match value {
            AMQPValue::LongUInt(n) => Some(*n),
            AMQPValue::LongLongInt(n) => u32::try_from(*n).ok(),
            AMQPValue::LongInt(n) => u32::try_from(*n).ok(),
            AMQPValue::ShortInt(n) => u32::try_from(*n).ok(),
            _ => None,
        })
        .unwrap_or(0)
}
