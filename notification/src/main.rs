use std::{sync::Arc, time::Duration};

use anyhow::Result;
use common::bus::rmq::RmqBus;
use common::clients::http::{HttpCommentClient, HttpFollowClient, HttpTweetClient};
use common::{context::Context, logging, signal::Shutdown};
use tokio::{select, time};

mod api;
mod config;
mod database;
mod error;
mod global;
mod listener;
mod notification;
mod push;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::AppConfig::parse()?;
    logging::init(&config.logging.level, config.logging.json)?;

    let db = sqlx::PgPool::connect(&config.database.uri).await?;
    sqlx::migrate!().run(&db).await?;

    let bus = Arc::new(
        RmqBus::connect(
            &config.rmq.uri,
            Duration::from_secs(config.rmq.timeout_secs),
            config.rmq.max_retries,
        )
        .await?,
    );
    bus.declare(&notification::topology()).await?;

    let (ctx, handler) = Context::new();

    let service = Arc::new(notification::NotificationService::new(
        Arc::new(database::PgNotificationRepo::new(db.clone())),
        Arc::new(database::PgDeviceTokenRepo::new(db)),
        Arc::new(push::HttpPushSender::new(&config.push_gateway)?),
        Arc::new(HttpTweetClient::new(&config.tweet_api)?),
        Arc::new(HttpCommentClient::new(&config.comment_api)?),
        Arc::new(HttpFollowClient::new(&config.follow_api)?),
    ));

    let events = Arc::new(listener::NotificationListener::new(service.clone()));
    for queue in [
        notification::queues::USER_REGISTERED,
        notification::queues::FOLLOWED,
        notification::queues::TWEET_CREATED,
        notification::queues::TWEET_LIKED,
        notification::queues::COMMENT_CREATED,
    ] {
        bus.spawn_consumer(ctx.clone(), queue.to_string(), events.clone());
    }

    let global = Arc::new(global::GlobalState {
        config,
        ctx,
        notifications: service,
    });

    tracing::info!("starting");

    let api_future = tokio::spawn(api::run(global.clone()));

    // The first sigint or sigterm starts a graceful shutdown, a second one forces it
    let mut shutdown = Shutdown::new()?;

    select! {
        r = api_future => tracing::error!("api stopped unexpectedly: {:?}", r),
        _ = shutdown.recv() => tracing::info!("shutting down"),
    }

    // We cannot have a context in scope when we cancel the handler, otherwise it will deadlock.
    drop(global);

    // Cancel the context
    tracing::info!("waiting for tasks to finish");

    select! {
        _ = time::sleep(Duration::from_secs(60)) => tracing::warn!("force shutting down"),
        _ = shutdown.recv() => tracing::warn!("force shutting down"),
        _ = handler.cancel() => tracing::info!("shutting down"),
    }

    Ok(())
}
