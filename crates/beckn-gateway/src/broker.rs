use lapin::options::{
    BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};

use beckn_core::error::BecknError;

pub const SEARCH_EXCHANGE: &str = "beckn.gateway.search";
pub const SEARCH_QUEUE: &str = "beckn.gateway.search.work";
pub const SEARCH_ROUTING_KEY: &str = "search";
pub const DEAD_LETTER_QUEUE: &str = "beckn.gateway.search.dead_letter";

/// Durable fan-out: a direct exchange bound to a single work queue so `N`
/// consumer workers compete for deliveries. The channel is put into
/// confirm mode — a publish only counts as successful once the broker
/// acks it (§4.7 step 4).
pub async fn connect(amqp_url: &str) -> Result<Channel, BecknError> {
    let conn = Connection::connect(amqp_url, ConnectionProperties::default())
        .await
        .map_err(broker_unavailable)?;
    let channel = conn.create_channel().await.map_err(broker_unavailable)?;

    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(broker_unavailable)?;

    channel
        .exchange_declare(
            SEARCH_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(broker_unavailable)?;

    channel
        .queue_declare(
            SEARCH_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(broker_unavailable)?;

    channel
        .queue_bind(
            SEARCH_QUEUE,
            SEARCH_EXCHANGE,
            SEARCH_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(broker_unavailable)?;

    channel
        .queue_declare(
            DEAD_LETTER_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(broker_unavailable)?;

    Ok(channel)
}

/// Publish one fan-out message and wait for the broker's confirm-mode ack.
pub async fn publish(channel: &Channel, routing_key: &str, payload: &[u8]) -> Result<(), BecknError> {
    channel
        .basic_publish(
            SEARCH_EXCHANGE,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            lapin::BasicProperties::default().with_delivery_mode(2),
        )
        .await
        .map_err(broker_unavailable)?
        .await
        .map_err(broker_unavailable)?;
    Ok(())
}

/// Publish a dead-lettered delivery to the dead-letter queue for
/// after-the-fact inspection. Best-effort: a failure here is logged, not
/// propagated, since the original delivery has already been exhausted.
pub async fn publish_dead_letter(channel: &Channel, payload: &[u8]) {
    if let Err(e) = channel
        .basic_publish(
            "",
            DEAD_LETTER_QUEUE,
            BasicPublishOptions::default(),
            payload,
            lapin::BasicProperties::default().with_delivery_mode(2),
        )
        .await
    {
        tracing::warn!(error = %e, "failed to publish to dead-letter queue");
    }
}

fn broker_unavailable(e: lapin::Error) -> BecknError {
    tracing::warn!(error = %e, "broker operation failed");
    BecknError::BrokerUnavailable
}
