// MIT License - Copyright (c) 2026 Peter Wright
// Print device changes and alarms reported by a K1 hub
//
// Usage: cargo run --example device_events -- <hub-ip> <device-token>

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use elro_k1_bridge::{HubConfig, HubEvent, K1Hub};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(ip), Some(token)) = (args.next(), args.next()) else {
        bail!("usage: device_events <hub-ip> <device-token>");
    };

    let config = HubConfig::builder().hub_ip(ip).device_token(token).build();
    let hub = Arc::new(K1Hub::connect(config).await.context("Failed to open hub socket")?);
    let mut events = hub.subscribe();

    let runner = Arc::clone(&hub);
    let session = tokio::spawn(async move { runner.run().await });

    while let Ok(event) = events.recv().await {
        match event {
            HubEvent::Connected => info!("Connected"),
            HubEvent::DeviceRemoved { id } => info!("Device {id} removed"),
            HubEvent::DeviceAdded { id } => {
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    let Some(mut watch) = hub.watch_device(id).await else {
                        return;
                    };
                    loop {
                        let alarm = tokio::select! {
                            v = watch.updated.wait() => v.map(|_| false),
                            v = watch.alarm.wait() => v.map(|_| true),
                        };
                        let Some(alarm) = alarm else { break };
                        if let Some(device) = hub.device(id).await {
                            let prefix = if alarm { "ALARM " } else { "" };
                            println!(
                                "{prefix}{} [{}] {:?}: {} battery={:?} signal={:?}",
                                device.id,
                                device.category.name(),
                                device.name,
                                device.state,
                                device.battery_level,
                                device.signal_strength,
                            );
                        }
                    }
                });
            }
        }
    }

    session.await??;
    Ok(())
}
