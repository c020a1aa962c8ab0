// MIT License - Copyright (c) 2026 Peter Wright
// Public hub API

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::HubConfig;
use crate::constants::{HUB_DEVICE_ID, SILENCE_STATUS};
use crate::devices::DeviceSnapshot;
use crate::error::Result;
use crate::event::{EventReceiver, EventSender, SignalWaiter, event_channel};
use crate::protocol::Command;
use crate::registry::Registry;
use crate::session::{Session, SessionState};
use crate::transport::{Transport, UdpTransport};

/// Change notifications of one device.
#[derive(Debug, Clone)]
pub struct DeviceWatch {
    pub updated: SignalWaiter,
    pub alarm: SignalWaiter,
}

/// The main public API for talking to a K1 hub.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use elro_k1_bridge::{HubConfig, HubEvent, K1Hub};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = HubConfig::builder()
///         .hub_ip("192.168.0.50")
///         .device_token("ST_0123456789ab")
///         .build();
///
///     let hub = Arc::new(K1Hub::connect(config).await?);
///     let mut events = hub.subscribe();
///
///     let runner = Arc::clone(&hub);
///     tokio::spawn(async move { runner.run().await });
///
///     while let Ok(event) = events.recv().await {
///         if let HubEvent::DeviceAdded { id } = event {
///             println!("device {id}: {:?}", hub.device(id).await);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct K1Hub<T: Transport = UdpTransport> {
    session: Session<T>,
    registry: Arc<Mutex<Registry>>,
    event_tx: EventSender,
}

impl K1Hub<UdpTransport> {
    /// Validate the config and open the UDP socket. The handshake happens in [`K1Hub::run`].
    pub async fn connect(config: HubConfig) -> Result<Self> {
        config.validate()?;
        let transport = UdpTransport::connect(&config).await?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> K1Hub<T> {
    /// Build a hub over any transport.
    pub fn with_transport(config: HubConfig, transport: T) -> Self {
        let (event_tx, _event_rx) = event_channel(256);
        let registry = Arc::new(Mutex::new(Registry::new(event_tx.clone())));
        let session = Session::new(config, transport, registry.clone(), event_tx.clone());
        Self {
            session,
            registry,
            event_tx,
        }
    }

    /// Subscribe to hub events.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    pub fn config(&self) -> &HubConfig {
        self.session.config()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Drive the session: handshake, polling and inbound handling.
    ///
    /// Returns only when receiving from the hub fails for good.
    pub async fn run(&self) -> Result<()> {
        self.session.run().await
    }

    // --- Devices ---

    /// Get all devices, ordered by id.
    pub async fn devices(&self) -> Vec<DeviceSnapshot> {
        self.registry.lock().await.snapshots()
    }

    /// Get a device by id.
    pub async fn device(&self, id: u32) -> Option<DeviceSnapshot> {
        self.registry.lock().await.lookup(id).map(|d| d.snapshot())
    }

    /// Change notifications for a device, starting from now.
    pub async fn watch_device(&self, id: u32) -> Option<DeviceWatch> {
        let registry = self.registry.lock().await;
        let device = registry.lookup(id)?;
        Some(DeviceWatch {
            updated: device.updated(),
            alarm: device.alarm(),
        })
    }

    /// Copy of the roster used for status syncs.
    pub async fn sync_roster(&self) -> BTreeMap<u32, String> {
        self.registry.lock().await.sync_roster().clone()
    }

    // --- Commands ---

    /// Send a status code to a device (`17` test alarm, `00` on the hub silences).
    ///
    /// Returns `Ok(false)` without sending if the target is unknown.
    pub async fn set_device_state(&self, id: u32, status: &str) -> Result<bool> {
        debug!("Set device {} state {}", id, status);
        let hub_silence = id == HUB_DEVICE_ID && status == SILENCE_STATUS;
        if !hub_silence && !self.known(id).await {
            warn!("Set state: unknown device {id}");
            return Ok(false);
        }
        self.session
            .send_command(&Command::EquipmentControl {
                id,
                status: status.to_string(),
            })
            .await?;
        Ok(true)
    }

    /// Rename a device on the hub. The new name arrives with the next name poll.
    pub async fn set_device_name(&self, id: u32, name: &str) -> Result<bool> {
        debug!("Rename device {} to {:?}", id, name);
        if !self.known(id).await {
            warn!("Rename: unknown device {id}");
            return Ok(false);
        }
        let encoded = match codec::encode_ascii(name) {
            Ok(hex) => hex,
            Err(e) => {
                warn!("Rename device {id}: {e}");
                return Ok(false);
            }
        };
        let encoded_name = format!("{encoded}{}", codec::crc(&encoded));
        self.session
            .send_command(&Command::ModifyName { id, encoded_name })
            .await?;
        Ok(true)
    }

    /// Forget a device, and optionally delete it from the hub too.
    pub async fn remove_device(&self, id: u32, also_from_hub: bool) -> Result<bool> {
        if self.registry.lock().await.remove(id).is_none() {
            warn!("Remove: unknown device {id}");
            return Ok(false);
        }
        if also_from_hub {
            info!("Deleting device {id} from hub");
            self.session.send_command(&Command::Delete { id }).await?;
        }
        Ok(true)
    }

    /// Put the hub in pairing mode.
    pub async fn permit_join(&self) -> Result<()> {
        info!("Permit join");
        self.session.send_command(&Command::PermitJoin).await?;
        Ok(())
    }

    /// Leave pairing mode.
    pub async fn cancel_permit_join(&self) -> Result<()> {
        info!("Cancel permit join");
        self.session.send_command(&Command::CancelPermitJoin).await?;
        Ok(())
    }

    /// Replace a device: it is forgotten locally and the hub pairs the next device in its slot.
    pub async fn replace_device(&self, id: u32) -> Result<bool> {
        if self.registry.lock().await.remove(id).is_none() {
            warn!("Replace: unknown device {id}");
            return Ok(false);
        }
        info!("Replacing device {id}");
        self.session.send_command(&Command::Replace).await?;
        Ok(true)
    }

    /// Send a status sync: the roster checksum, or an empty sync.
    pub async fn sync_device_status(&self, with_roster: bool) -> Result<()> {
        self.session.sync_device_status(with_roster).await?;
        Ok(())
    }

    /// Ask the hub for every device status.
    pub async fn sync_devices(&self) -> Result<()> {
        self.session.send_command(&Command::SyncDevices).await?;
        Ok(())
    }

    /// Ask the hub for every device name.
    pub async fn get_device_names(&self) -> Result<()> {
        self.session.send_command(&Command::GetDeviceNames).await?;
        Ok(())
    }

    /// Request the scenes of a scene group.
    pub async fn sync_scenes(&self, group: u32) -> Result<()> {
        self.session
            .send_command(&Command::SyncScenes { group })
            .await?;
        Ok(())
    }

    async fn known(&self, id: u32) -> bool {
        self.registry.lock().await.contains(id)
    }
}
