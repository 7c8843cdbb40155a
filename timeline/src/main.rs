use std::{sync::Arc, time::Duration};

use anyhow::Result;
use common::bus::rmq::RmqBus;
use common::clients::http::{HttpFollowClient, HttpTweetClient};
use common::{context::Context, logging, signal::Shutdown};
use tokio::{select, time};

mod api;
mod config;
mod database;
mod error;
mod global;
mod listener;
mod timeline;

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
    bus.declare(&timeline::topology()).await?;

    let (ctx, handler) = Context::new();

    let service = Arc::new(timeline::TimelineService::new(
        Arc::new(database::PgTimelineRepo::new(db)),
        Arc::new(HttpTweetClient::new(&config.tweet_api)?),
        Arc::new(HttpFollowClient::new(&config.follow_api)?),
    ));

    let events = Arc::new(listener::TimelineListener::new(service.clone()));
    for queue in [
        timeline::queues::FOLLOWED,
        timeline::queues::UNFOLLOWED,
        timeline::queues::TWEET_CREATED,
    ] {
        bus.spawn_consumer(ctx.clone(), queue.to_string(), events.clone());
    }

    let global = Arc::new(global::GlobalState {
        config,
        ctx,
        timeline: service,
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
