use anyhow::Context;
use bluer::AdapterEvent;
use clap::Parser;
use log::{debug, error, info, warn};
use mitemp_gw::cache::FrameCache;
use mitemp_gw::config::{GatewayConfig, Overrides, Params};
use mitemp_gw::decoder::{AtcVoltage, DecodeOptions};
use mitemp_gw::mqtt::{self, LogPublisher, MqttPublisher, Publisher};
use mitemp_gw::scanner::{self, LastPacket, Watchdog};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

/// BLE-to-MQTT gateway for ATC1441/PVVX thermometers
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON parameter file
    #[arg(long, default_value = "params.json")]
    config: PathBuf,

    /// MQTT broker host (overrides `server` in the config file)
    #[arg(long)]
    server: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    port: Option<u16>,

    /// Topic prefix, records go to <prefix>/<address>
    #[arg(long)]
    topic_prefix: Option<String>,

    /// Seconds between publish rounds
    #[arg(long)]
    publish_interval: Option<u64>,

    /// How to read the ATC1441 battery voltage field
    #[arg(long, value_enum)]
    atc_voltage: Option<AtcVoltage>,

    /// Only publish advertisements that decoded to a reading (default:
    /// publish every device seen, with its raw service data)
    #[arg(long)]
    decoded_only: bool,

    /// Log records instead of publishing them
    #[arg(long)]
    dry_run: bool,

    /// Watchdog timeout in seconds (restart if no packets seen)
    #[arg(long, default_value_t = 20)]
    watchdog: u64,

    /// Cooldown pause between restarts in seconds
    #[arg(long, default_value_t = 5)]
    cooldown: u64,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            server: self.server.clone(),
            port: self.port,
            topic_prefix: self.topic_prefix.clone(),
            publish_interval_secs: self.publish_interval,
            atc_voltage: self.atc_voltage,
            decoded_only: self.decoded_only,
        }
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let args = Args::parse();
    let params = Params::load(&args.config)?;
    let config = GatewayConfig::resolve(params, args.overrides())?;

    let session = bluer::Session::new()
        .await
        .context("failed to open BlueZ session")?;
    let adapter = session
        .default_adapter()
        .await
        .context("no Bluetooth adapter")?;
    adapter
        .set_powered(true)
        .await
        .context("failed to power on adapter")?;
    info!(
        "Starting BLE gateway on {} (watchdog={}s, cooldown={}s)",
        adapter.name(),
        args.watchdog,
        args.cooldown
    );

    let cache = Arc::new(FrameCache::new(config.cache_capacity));
    let last_packet: LastPacket = Arc::new(Mutex::new(Instant::now()));
    let (tx, rx) = mpsc::unbounded_channel::<AdapterEvent>();

    tokio::spawn(scanner::run_discovery(
        adapter.clone(),
        tx,
        last_packet.clone(),
        Watchdog {
            timeout: Duration::from_secs(args.watchdog),
            cooldown: Duration::from_secs(args.cooldown),
        },
    ));

    let opts = DecodeOptions {
        atc_voltage: config.atc_voltage,
    };
    let scanning = process_events(&adapter, rx, &opts, &cache, &last_packet);

    tokio::select! {
        _ = scanning => warn!("Discovery task stopped"),
        _ = publish(&config, &cache, args.dry_run) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, exiting"),
    }

    Ok(())
}

async fn process_events(
    adapter: &bluer::Adapter,
    mut rx: mpsc::UnboundedReceiver<AdapterEvent>,
    opts: &DecodeOptions,
    cache: &FrameCache,
    last_packet: &LastPacket,
) {
    while let Some(evt) = rx.recv().await {
        match evt {
            AdapterEvent::DeviceAdded(addr) => {
                if let Err(e) = scanner::handle_device(adapter, addr, opts, cache, last_packet).await {
                    warn!("Error handling device {addr}: {e}");
                }
            }
            AdapterEvent::DeviceRemoved(addr) => {
                info!("Device removed: {addr}");
            }
            _ => {}
        }
    }
}

async fn publish(config: &GatewayConfig, cache: &FrameCache, dry_run: bool) {
    if dry_run {
        publish_loop(config, cache, LogPublisher).await;
    } else {
        let (publisher, eventloop) = MqttPublisher::new(&config.mqtt);
        info!(
            "Publishing to mqtt://{}:{}/{}",
            config.mqtt.server, config.mqtt.port, config.topic_prefix
        );
        tokio::select! {
            _ = mqtt::run_event_loop(eventloop) => error!("MQTT event loop stopped"),
            _ = publish_loop(config, cache, publisher) => {}
        }
    }
}

async fn publish_loop<P: Publisher>(config: &GatewayConfig, cache: &FrameCache, mut publisher: P) {
    let mut ticker = tokio::time::interval(config.publish_interval);
    loop {
        ticker.tick().await;
        let sent =
            mqtt::publish_pending(cache, &mut publisher, &config.topic_prefix, config.decoded_only)
                .await;
        if sent > 0 {
            debug!("Published {sent} records");
        }
    }
}
