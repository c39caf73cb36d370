//! MQTT publishing of advertisement records.
//!
//! The [`Publisher`] trait keeps the publish loop independent of the client
//! crate. [`MqttPublisher`] talks to a broker through `rumqttc` at QoS 1;
//! [`LogPublisher`] only logs, for dry runs.

use crate::cache::FrameCache;
use crate::config::MqttConfig;
use crate::record::AdvertisementRecord;
use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use thiserror::Error;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_QUEUE: usize = 64;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[allow(async_fn_in_trait)]
pub trait Publisher {
    /// Publish one JSON payload to `topic` with at-least-once delivery.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Create the client and the event loop that drives it. The caller must
    /// keep polling the event loop, see [`run_event_loop`].
    pub fn new(cfg: &MqttConfig) -> (Self, EventLoop) {
        let mut opts = MqttOptions::new(cfg.client_id.clone(), cfg.server.clone(), cfg.port);
        opts.set_keep_alive(KEEP_ALIVE);
        // keep the session so unacknowledged QoS 1 publishes go out again after a reconnect
        opts.set_clean_session(false);
        if let Some((user, password)) = &cfg.credentials {
            opts.set_credentials(user.clone(), password.clone());
        }
        let (client, eventloop) = AsyncClient::new(opts, REQUEST_QUEUE);
        (Self { client }, eventloop)
    }
}

impl Publisher for MqttPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}

/// Drive the MQTT connection forever, reconnecting after errors.
pub async fn run_event_loop(mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to MQTT broker ({:?})", ack.code);
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                debug!("Broker acknowledged packet {}", ack.pkid);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT connection error: {e}, retrying in {RECONNECT_DELAY:?}");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// Stand-in publisher that only logs what would be sent.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        info!("mqtt(LOG): {topic} {}", String::from_utf8_lossy(&payload));
        Ok(())
    }
}

/// Drain the cache and publish every pending record under `prefix/<addr>`.
///
/// Returns how many records were handed to the publisher. A failing
/// record is logged and skipped so one bad publish cannot stall the rest.
pub async fn publish_pending<P: Publisher>(
    cache: &FrameCache,
    publisher: &mut P,
    prefix: &str,
    decoded_only: bool,
) -> usize {
    let mut sent = 0;
    for record in cache.drain() {
        if decoded_only && !record.is_decoded() {
            continue;
        }
        match publish_record(publisher, &record, prefix).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to publish {}: {e}", record.addr),
        }
    }
    sent
}

async fn publish_record<P: Publisher>(
    publisher: &mut P,
    record: &AdvertisementRecord,
    prefix: &str,
) -> Result<(), PublishError> {
    let payload = record.to_json()?;
    publisher.publish(&record.topic(prefix), payload).await
}
