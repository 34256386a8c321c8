use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use futures::future::BoxFuture;
use futures_lite::StreamExt;
use lapin::{
    Connection, ConnectionProperties, ExchangeKind,
    message::Delivery,
    options::{
        BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    core::{app_state::AppState, config, db, outbox},
    passes::PassCodec,
};

pub type ConsumerHandler = fn(Delivery, Arc<AppState>) -> BoxFuture<'static, Result<()>>;

pub fn init_tracing() {
    tracing_subscriber::fmt().with_target(false).compact().init();
}

pub fn init_env() {
    if dotenvy::dotenv().is_err() {
        info!("No .env file found, using process environment");
    }
}

/// Wires up shared state, the AMQP consumers and outbox relay, and serves
/// the HTTP API until the process is terminated.
pub async fn bootstrap(
    service_name: &str,
    app: Router<AppState>,
    consumers: &[(&str, ConsumerHandler)],
) -> Result<()> {
    let config = Arc::new(config::load()?);
    let db_pool = db::connect(&config.database.url).await?;

    let state = AppState {
        db_pool,
        http_client: reqwest::Client::new(),
        passes: PassCodec::new(&config.passes),
        config: config.clone(),
    };

    let amqp = Connection::connect(&config.amqp.url, ConnectionProperties::default())
        .await
        .context("Failed to connect to AMQP broker")?;

    let publish_channel = amqp.create_channel().await?;
    publish_channel
        .exchange_declare(
            &config.amqp.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare exchange")?;

    let shared = Arc::new(state.clone());
    for (routing_key, handler) in consumers {
        spawn_consumer(
            &amqp,
            &config.amqp.exchange,
            service_name,
            routing_key,
            *handler,
            shared.clone(),
        )
        .await
        .with_context(|| format!("Failed to start consumer for {routing_key}"))?;
    }

    tokio::spawn(outbox::run_relay(
        shared,
        publish_channel,
        config.amqp.exchange.clone(),
    ));

    let app = app
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = format!("0.0.0.0:{}", config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("{service_name} listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")?;
    Ok(())
}

async fn spawn_consumer(
    conn: &Connection,
    exchange: &str,
    service_name: &str,
    routing_key: &str,
    handler: ConsumerHandler,
    state: Arc<AppState>,
) -> Result<()> {
    let channel = conn.create_channel().await?;
    let queue_name = format!("{}.{}", service_name.to_lowercase(), routing_key);

    channel
        .queue_declare(
            &queue_name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(
            &queue_name,
            exchange,
            routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            &queue_name,
            &format!("{queue_name}.consumer"),
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let routing_key = routing_key.to_string();
    tokio::spawn(async move {
        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    if let Err(err) = handler(delivery, state.clone()).await {
                        warn!("Consumer {routing_key} failed to process delivery: {err:#}");
                    }
                }
                Err(err) => error!("Consumer {routing_key} stream error: {err}"),
            }
        }
    });

    Ok(())
}
