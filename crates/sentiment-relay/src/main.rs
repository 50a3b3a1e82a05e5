//! sentiment-relay binary entry point

use std::sync::Arc;

use sentiment_middleware::nats::redact_broker_url;
use sentiment_middleware::{NatsTransport, TlsIdentity, TopicNames, Transport};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentiment_relay::aggregator::Aggregator;
use sentiment_relay::error::ConfigError;
use sentiment_relay::pipeline::{Pipeline, PipelineSettings};
use sentiment_relay::publisher::Publisher;
use sentiment_relay::scorer::HttpSentimentScorer;
use sentiment_relay::server::{run_server, ServerState};
use sentiment_relay::Config;

const CLIENT_NAME: &str = "sentiment-relay";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Any missing setting stops us here, before touching the broker
    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "Failed to load config");
        e
    })?;

    info!(
        broker = %redact_broker_url(&config.broker_url),
        tls = config.broker_tls,
        topic_base = %config.topic_base,
        window = config.window_capacity,
        interval_ms = config.sample_interval.as_millis() as u64,
        "Starting sentiment-relay"
    );

    let identity =
        TlsIdentity::write_pem(&config.cert_dir, &config.client_cert_pem, &config.client_key_pem)
            .map_err(ConfigError::from)?;
    let topics = TopicNames::new(&config.topic_base);

    let transport: Arc<dyn Transport> = Arc::new(
        NatsTransport::connect_with_identity(
            &config.broker_url,
            CLIENT_NAME,
            &identity,
            config.broker_tls,
        )
        .await?,
    );

    let scorer = HttpSentimentScorer::new(
        config.sentiment_api_url.clone(),
        config.sentiment_api_key.clone(),
        config.sentiment_api_timeout,
    )?;

    let pipeline = Pipeline::new(
        PipelineSettings::from(&config),
        Aggregator::new(Arc::new(scorer)),
        Publisher::new(Arc::clone(&transport), topics.outbound(), config.output_partition),
    );

    let server_state = ServerState::new(
        topics.inbound(),
        pipeline.subscribed_handle(),
        pipeline.last_message_handle(),
    );
    let health_addr = config.health_addr;
    tokio::spawn(async move {
        if let Err(e) = run_server(health_addr, server_state).await {
            error!(error = %e, "Health server failed");
        }
    });
    info!(addr = %health_addr, "Health server listening");

    let subscription = transport.subscribe(topics.inbound()).await?;
    info!(topic = %topics.inbound(), "Consuming from topic");

    let shutdown = CancellationToken::new();
    let mut worker = tokio::spawn(pipeline.run(subscription, shutdown.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let outcome = tokio::select! {
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down gracefully");
            shutdown.cancel();
            worker.await
        }
        _ = sigint.recv() => {
            info!("SIGINT received, shutting down gracefully");
            shutdown.cancel();
            worker.await
        }
        joined = &mut worker => joined,
    };

    match outcome {
        Ok(Ok(())) => {
            info!("sentiment-relay stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Pipeline failed");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Pipeline task panicked");
            Err(e.into())
        }
    }
}
