//! BlueZ discovery with a restart watchdog, feeding decoded advertisements
//! into the frame cache.

use crate::cache::FrameCache;
use crate::decoder::DecodeOptions;
use crate::locator;
use crate::record::AdvertisementRecord;
use bluer::{Adapter, AdapterEvent, Address};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, sleep};
use uuid::Uuid;

const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805F9B34FB;
const ENV_SENSING_UUID16: u16 = 0x181A;

/// How often the watchdog looks at the last packet time.
const WATCHDOG_TICK: Duration = Duration::from_secs(5);

/// Time of the last decoded sensor packet, reset by [`handle_device`].
pub type LastPacket = Arc<Mutex<Instant>>;

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    /// Restart discovery if no sensor packet arrives within this time.
    pub timeout: Duration,
    /// Pause between stopping and restarting discovery.
    pub cooldown: Duration,
}

/// Short 16-bit form of a UUID built on the Bluetooth base UUID.
pub fn uuid16(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = u16::try_from(value >> 96).ok()?;
    (value & !(0xFFFF_FFFFu128 << 96) == BLUETOOTH_BASE_UUID).then_some(short)
}

/// Put BlueZ's per-UUID service data back into on-air AD structures.
///
/// A 0x181A entry is emitted on its own so the payload length after the
/// marker stays what the sensor sent. Other 16-bit entries are concatenated
/// in UUID order.
pub fn raw_advertisement(service_data: &HashMap<Uuid, Vec<u8>>) -> Vec<u8> {
    let mut entries: Vec<(u16, &Vec<u8>)> = service_data
        .iter()
        .filter_map(|(uuid, data)| uuid16(uuid).map(|short| (short, data)))
        .collect();

    if let Some((_, data)) = entries.iter().find(|(short, _)| *short == ENV_SENSING_UUID16) {
        return locator::service_data_ad(ENV_SENSING_UUID16, data).unwrap_or_default();
    }

    entries.sort_by_key(|(short, _)| *short);
    entries
        .into_iter()
        .filter_map(|(short, data)| locator::service_data_ad(short, data))
        .flatten()
        .collect()
}

/// Why a discovery session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// BlueZ closed the event stream.
    StreamEnded,
    /// No sensor packet for this long.
    Stale(Duration),
    /// The event receiver is gone.
    Closed,
}

/// How long the gateway has gone without a sensor packet, if that exceeds
/// `timeout`.
pub fn stale_for(last_packet: Instant, now: Instant, timeout: Duration) -> Option<Duration> {
    let elapsed = now.saturating_duration_since(last_packet);
    (elapsed > timeout).then_some(elapsed)
}

/// Forward device events from one discovery session until it ends or the
/// watchdog trips.
///
/// The watchdog ticks on a fixed interval, so a stream that never goes quiet
/// still gets checked.
pub async fn pump_events<S>(
    events: &mut S,
    tx: &mpsc::UnboundedSender<AdapterEvent>,
    last_packet: &LastPacket,
    timeout: Duration,
) -> SessionEnd
where
    S: Stream<Item = AdapterEvent> + Unpin,
{
    let mut tick = tokio::time::interval(WATCHDOG_TICK);
    loop {
        tokio::select! {
            evt = events.next() => {
                match evt {
                    Some(evt @ (AdapterEvent::DeviceAdded(_) | AdapterEvent::DeviceRemoved(_))) => {
                        if tx.send(evt).is_err() {
                            return SessionEnd::Closed;
                        }
                    }
                    Some(_) => {}
                    None => return SessionEnd::StreamEnded,
                }
            }

            _ = tick.tick() => {
                let last = *last_packet.lock().await;
                if let Some(elapsed) = stale_for(last, Instant::now(), timeout) {
                    return SessionEnd::Stale(elapsed);
                }
            }
        }
    }
}

/// Keep discovery running forever, forwarding device events to `tx`.
///
/// If no sensor packet is seen for `watchdog.timeout`, the discovery stream
/// is dropped and started again after `watchdog.cooldown`.
pub async fn run_discovery(
    adapter: Adapter,
    tx: mpsc::UnboundedSender<AdapterEvent>,
    last_packet: LastPacket,
    watchdog: Watchdog,
) {
    let mut restart_counter: u64 = 1;

    loop {
        info!("(Re)starting discovery...");
        let mut events = match adapter.discover_devices_with_changes().await {
            Ok(ev) => Box::pin(ev),
            Err(e) => {
                warn!("Failed to start discovery: {e}");
                sleep(watchdog.cooldown).await;
                continue;
            }
        };

        match pump_events(&mut events, &tx, &last_packet, watchdog.timeout).await {
            SessionEnd::StreamEnded => warn!("Discovery stream ended, restarting..."),
            SessionEnd::Stale(elapsed) => {
                warn!(
                    "Watchdog: no sensor packets for {:?}, restarting discovery (count {})",
                    elapsed, restart_counter
                );
                restart_counter += 1;
                *last_packet.lock().await = Instant::now();
                sleep(watchdog.cooldown).await;
            }
            // receiver gone, the gateway is shutting down
            SessionEnd::Closed => return,
        }

        // dropping the stream ends this discovery session
        drop(events);
        sleep(Duration::from_secs(2)).await;
    }
}

/// Wrap one device's properties into a record. Devices without service
/// data still get a record, with empty `raw_data` and no reading.
pub fn device_record(
    addr: Address,
    rssi: i16,
    name: Option<String>,
    service_data: Option<&HashMap<Uuid, Vec<u8>>>,
    opts: &DecodeOptions,
    seen_at: OffsetDateTime,
) -> AdvertisementRecord {
    let raw = service_data.map(raw_advertisement).unwrap_or_default();
    AdvertisementRecord::from_advertisement(&addr.to_string(), rssi, name, &raw, opts, seen_at)
}

/// Read one device's advertisement, decode it and stash the record.
pub async fn handle_device(
    adapter: &Adapter,
    addr: Address,
    opts: &DecodeOptions,
    cache: &FrameCache,
    last_packet: &LastPacket,
) -> bluer::Result<()> {
    let device = adapter.device(addr)?;
    let service_data = device.service_data().await?;
    let name = device.name().await?;
    let rssi = device.rssi().await?.unwrap_or(0);

    let record = device_record(
        addr,
        rssi,
        name,
        service_data.as_ref(),
        opts,
        OffsetDateTime::now_utc(),
    );

    if let Some(reading) = &record.data {
        debug!("{addr} RSSI={rssi}: {reading}");
        *last_packet.lock().await = Instant::now();
    }

    if !cache.insert(record) {
        warn!("Frame cache full, dropping advertisement from {addr}");
    }
    Ok(())
}
