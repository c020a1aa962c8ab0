// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use elro_k1_bridge::bridge::{self, DiscoveryConfig};
use elro_k1_bridge::constants::DEFAULT_HUB_PORT;
use elro_k1_bridge::{HubConfig, HubEvent, K1Hub};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "elro2mqtt")]
#[command(about = "Bridge between an ELRO Connects K1 hub and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    hub: HubToml,
    mqtt: MqttToml,
}

#[derive(Debug, Deserialize)]
struct HubToml {
    ip: String,
    #[serde(default = "default_hub_port")]
    port: u16,
    /// `ST_` followed by the 12 hex digits printed on the hub
    device_token: String,
    #[serde(default = "default_app_id")]
    app_id: String,
    #[serde(default = "default_keepalive_interval")]
    keepalive_interval_ms: u64,
    #[serde(default = "default_startup_sync_delay")]
    startup_sync_delay_ms: u64,
}

fn default_hub_port() -> u16 {
    DEFAULT_HUB_PORT
}
fn default_app_id() -> String {
    "0".to_string()
}
fn default_keepalive_interval() -> u64 {
    30000
}
fn default_startup_sync_delay() -> u64 {
    5000
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_base_topic")]
    base_topic: String,
    #[serde(default)]
    ha_autodiscover: bool,
}

fn default_client_id() -> String {
    "elro2mqtt".to_string()
}
fn default_base_topic() -> String {
    "home".to_string()
}

fn build_hub_config(toml: &HubToml) -> Result<HubConfig> {
    let config = HubConfig::builder()
        .hub_ip(&toml.ip)
        .hub_port(toml.port)
        .device_token(&toml.device_token)
        .app_id(&toml.app_id)
        .keepalive_interval_ms(toml.keepalive_interval_ms)
        .startup_sync_delay_ms(toml.startup_sync_delay_ms)
        .build();
    config.validate()?;
    Ok(config)
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&text).context("Failed to parse config file")
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// Where and how device data is published.
#[derive(Clone)]
struct Publisher {
    client: AsyncClient,
    base_topic: String,
    ha_autodiscover: bool,
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

impl Publisher {
    async fn publish_device(&self, hub: &K1Hub, id: u32) {
        let Some(device) = hub.device(id).await else {
            debug!("Device {id} gone before publishing");
            return;
        };
        let topic = bridge::device_topic(&self.base_topic, id);
        publish_json(&self.client, &topic, &device, false).await;

        if self.ha_autodiscover {
            let discovery = DiscoveryConfig::for_device(&self.base_topic, &device);
            publish_json(&self.client, &bridge::discovery_topic(id), &discovery, true).await;
        }
    }

    async fn clear_discovery(&self, id: u32) {
        if !self.ha_autodiscover {
            return;
        }
        if let Err(e) = self
            .client
            .publish(bridge::discovery_topic(id), QoS::AtLeastOnce, true, Vec::new())
            .await
        {
            error!("Failed to clear discovery for device {id}: {e}");
        }
    }
}

/// Republish a device on every update and every alarm until it is removed.
fn spawn_device_forwarder(hub: Arc<K1Hub>, publisher: Publisher, id: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(mut watch) = hub.watch_device(id).await else {
            return;
        };
        publisher.publish_device(&hub, id).await;
        loop {
            let fired = tokio::select! {
                v = watch.updated.wait() => v,
                v = watch.alarm.wait() => {
                    if v.is_some() {
                        warn!("Alarm on device {id}");
                    }
                    v
                }
            };
            if fired.is_none() {
                debug!("Device {id} forwarder finished");
                break;
            }
            publisher.publish_device(&hub, id).await;
        }
    })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=elro_k1_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let hub_config = build_hub_config(&config.hub)?;
        let (mqtt_host, mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;
        let base_topic = config.mqtt.base_topic.clone();

        info!("Connecting to K1 hub at {}", hub_config.hub_addr());
        let hub = Arc::new(K1Hub::connect(hub_config).await?);
        let hub_events = hub.subscribe();

        // Set up MQTT
        let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);
        let publisher = Publisher {
            client: client.clone(),
            base_topic: base_topic.clone(),
            ha_autodiscover: config.mqtt.ha_autodiscover,
        };

        // Task 1: hub session
        let hub_run = Arc::clone(&hub);
        let mut session_handle = tokio::spawn(async move { hub_run.run().await });

        // Task 2: hub event listener, one forwarder per device
        let hub_devices = Arc::clone(&hub);
        let publisher_devices = publisher.clone();
        let event_handle = tokio::spawn(async move {
            let mut rx = hub_events;
            let mut forwarders: HashMap<u32, JoinHandle<()>> = HashMap::new();
            loop {
                match rx.recv().await {
                    Ok(HubEvent::Connected) => info!("Hub session established"),
                    Ok(HubEvent::DeviceAdded { id }) => {
                        info!("Device {id} added");
                        let handle = spawn_device_forwarder(
                            Arc::clone(&hub_devices),
                            publisher_devices.clone(),
                            id,
                        );
                        if let Some(old) = forwarders.insert(id, handle) {
                            old.abort();
                        }
                    }
                    Ok(HubEvent::DeviceRemoved { id }) => {
                        info!("Device {id} removed");
                        if let Some(handle) = forwarders.remove(&id) {
                            handle.abort();
                        }
                        publisher_devices.clear_discovery(id).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                        for device in hub_devices.devices().await {
                            if !forwarders.contains_key(&device.id) {
                                let handle = spawn_device_forwarder(
                                    Arc::clone(&hub_devices),
                                    publisher_devices.clone(),
                                    device.id,
                                );
                                forwarders.insert(device.id, handle);
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
            for (_, handle) in forwarders {
                handle.abort();
            }
        });

        // Task 3: MQTT event loop (receives messages, handles commands)
        let hub_cmds = Arc::clone(&hub);
        let client_cmds = client.clone();
        let sub_topic = bridge::command_filter(&base_topic);
        let base_cmds = base_topic.clone();
        let mqtt_handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not resubscribe after a broker reconnect.
                        info!("MQTT: connected, subscribing to {sub_topic}");
                        if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await {
                            error!("Failed to subscribe to {sub_topic}: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        let Some(id) = bridge::parse_command_topic(&base_cmds, &msg.topic) else {
                            debug!("Ignoring message on {}", msg.topic);
                            continue;
                        };
                        let payload = String::from_utf8_lossy(&msg.payload);
                        info!("MQTT command for device {id}: {payload}");
                        bridge::handle_command_payload(hub_cmds.as_ref(), id, &payload).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Wait for a signal or the end of the hub session
        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let outcome: Option<Result<()>> = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                Some(Ok(()))
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                Some(Ok(()))
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                None
            }
            res = &mut session_handle => {
                let err = match res {
                    Ok(Ok(())) => anyhow::anyhow!("hub session ended"),
                    Ok(Err(e)) => anyhow::Error::new(e).context("Hub session failed"),
                    Err(e) => anyhow::Error::new(e).context("Hub session task panicked"),
                };
                error!("{err:#}");
                Some(Err(err))
            }
        };

        session_handle.abort();
        event_handle.abort();
        mqtt_handle.abort();
        if let Err(e) = client.disconnect().await {
            debug!("MQTT disconnect: {e}");
        }

        if let Some(result) = outcome {
            info!("Shutdown complete");
            return result;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config) {
            Ok(new_config) => match build_hub_config(&new_config.hub) {
                Ok(_) => {
                    config = new_config;
                    info!("Config reloaded successfully");
                }
                Err(e) => warn!("Invalid hub config in new config, keeping previous: {e}"),
            },
            Err(e) => warn!("Failed to reload config, keeping previous: {e}"),
        }

        info!("Reconnecting...");
    }
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}
