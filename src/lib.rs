// MIT License - Copyright (c) 2026 Peter Wright
// ELRO Connects K1 hub protocol
//
//! # elro-k1-bridge
//!
//! Local UDP communication with ELRO Connects K1 alarm hubs, without the
//! vendor cloud.
//!
//! The hub speaks a JSON-in-UDP protocol: the client proves it knows the
//! hub's device token with an `IOT_KEY?` handshake, then polls the hub for
//! device statuses and names, and receives alarm triggers as they happen.
//! [`K1Hub`] runs that session and keeps a registry of the paired smoke, CO,
//! heat, water, fire and door/window devices with their decoded state.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use elro_k1_bridge::{HubConfig, K1Hub};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HubConfig::builder()
//!         .hub_ip("192.168.0.50")
//!         .device_token("ST_0123456789ab")
//!         .build();
//!
//!     let hub = Arc::new(K1Hub::connect(config).await?);
//!     let runner = Arc::clone(&hub);
//!     let session = tokio::spawn(async move { runner.run().await });
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     for device in hub.devices().await {
//!         println!("{} {}: {}", device.id, device.name, device.state);
//!     }
//!
//!     hub.set_device_state(0, "00").await?; // silence
//!     session.abort();
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod codec;
pub mod config;
pub mod constants;
pub mod devices;
pub mod error;
pub mod event;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::{HubConfig, HubConfigBuilder};
pub use devices::{Device, DeviceCategory, DeviceSnapshot, DeviceState};
pub use error::{DecodeError, K1Error, Result};
pub use event::{EventReceiver, HubEvent, Signal, SignalWaiter};
pub use hub::{DeviceWatch, K1Hub};
pub use session::SessionState;
pub use transport::{Transport, UdpTransport};
