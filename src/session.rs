// MIT License - Copyright (c) 2026 Peter Wright
// Session engine: handshake, polling, inbound dispatch

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};

use crate::codec::{self, Inbound};
use crate::config::HubConfig;
use crate::constants::{APP_ACK, CmdId, HEARTBEAT_MARKER, KEY_REQUEST_PREFIX};
use crate::error::{K1Error, Result};
use crate::event::{EventSender, HubEvent};
use crate::protocol::{self, Command, HubData, NameReply, StatusRecord};
use crate::registry::Registry;
use crate::transport::Transport;

/// Connection state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Handshaking,
    Connected,
}

/// Per-session secrets and the outbound frame counter.
///
/// Kept under one lock so a frame's id and keys are taken together and
/// frames leave in id order.
#[derive(Debug, Default)]
struct Credentials {
    ctrl_key: String,
    bind_key: String,
    msg_id: u64,
}

/// Owns the transport and drives the K1 protocol.
///
/// The read loop and the sender loop (handshake, start-up sync, keep-alive)
/// are run together by [`Session::run`]; outbound commands may be sent
/// concurrently from other tasks.
pub struct Session<T: Transport> {
    config: HubConfig,
    transport: T,
    registry: Arc<Mutex<Registry>>,
    event_tx: EventSender,
    state_tx: watch::Sender<SessionState>,
    credentials: Mutex<Credentials>,
}

impl<T: Transport> Session<T> {
    pub fn new(
        config: HubConfig,
        transport: T,
        registry: Arc<Mutex<Registry>>,
        event_tx: EventSender,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            transport,
            registry,
            event_tx,
            state_tx,
            credentials: Mutex::new(Credentials::default()),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Control key learned in the handshake (empty before it).
    pub async fn ctrl_key(&self) -> String {
        self.credentials.lock().await.ctrl_key.clone()
    }

    /// Bind key learned in the handshake (empty before it).
    pub async fn bind_key(&self) -> String {
        self.credentials.lock().await.bind_key.clone()
    }

    /// Id of the last frame sent.
    pub async fn last_msg_id(&self) -> u64 {
        self.credentials.lock().await.msg_id
    }

    /// Run the read loop and the sender loop until the read loop fails.
    pub async fn run(&self) -> Result<()> {
        tokio::try_join!(self.read_loop(), self.sender_loop())?;
        Ok(())
    }

    /// Send a datagram as-is.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        debug!("Sending: {}", text);
        self.transport.send(text.as_bytes()).await
    }

    /// Wrap a command in an envelope with the next message id and send it.
    ///
    /// Returns the message id used.
    pub async fn send_command(&self, command: &Command) -> Result<u64> {
        let mut creds = self.credentials.lock().await;
        creds.msg_id += 1;
        let frame = codec::encode_envelope(
            creds.msg_id,
            &self.config.device_token,
            &creds.ctrl_key,
            &self.config.app_id,
            &command.to_payload(),
        );
        debug!("Sending {:?} as msgId {}", command.cmd_id(), creds.msg_id);
        self.send_text(&frame).await?;
        Ok(creds.msg_id)
    }

    /// Send the roster checksum, or an empty sync when `with_roster` is false.
    pub async fn sync_device_status(&self, with_roster: bool) -> Result<u64> {
        let payload = if with_roster {
            let registry = self.registry.lock().await;
            codec::build_sync_status_payload(registry.sync_roster())
        } else {
            String::new()
        };
        self.send_command(&Command::SyncDeviceStatus { payload }).await
    }

    /// Probe the hub until it answers with its name, then send the initial sync.
    ///
    /// There is no retry bound; a hub that never answers keeps the session here.
    pub async fn handshake(&self) -> Result<()> {
        let mut state_rx = self.state_tx.subscribe();
        if self.state() != SessionState::Connected {
            self.state_tx.send_replace(SessionState::Handshaking);
            info!("Handshaking with hub {}", self.config.hub_addr());
        }

        let probe = format!("{KEY_REQUEST_PREFIX}{}", self.config.device_token);
        let interval = Duration::from_millis(self.config.handshake_interval_ms);
        while self.state() != SessionState::Connected {
            if let Err(e) = self.send_text(&probe).await {
                warn!("Handshake probe failed: {e}");
            }
            tokio::select! {
                _ = sleep(interval) => {}
                _ = state_rx.wait_for(|s| *s == SessionState::Connected) => {}
            }
        }

        self.sync_device_status(false).await?;
        Ok(())
    }

    /// Start-up requests after the handshake: scenes, names, then the roster sync.
    async fn startup(&self) -> Result<()> {
        self.send_command(&Command::SyncScenes { group: 0 }).await?;
        self.send_command(&Command::GetDeviceNames).await?;
        sleep(Duration::from_millis(self.config.startup_sync_delay_ms)).await;

        let roster_empty = self.registry.lock().await.sync_roster().is_empty();
        if !roster_empty {
            self.sync_device_status(true).await?;
        }
        Ok(())
    }

    /// Handshake, start-up, then poll the hub forever.
    ///
    /// Send failures after the handshake are logged; only the read loop ends
    /// the session.
    pub async fn sender_loop(&self) -> Result<()> {
        if let Err(e) = self.handshake().await {
            warn!("Initial sync failed: {e}");
        }
        if let Err(e) = self.startup().await {
            warn!("Start-up sync failed: {e}");
        }

        let interval = Duration::from_millis(self.config.keepalive_interval_ms);
        loop {
            sleep(interval).await;
            debug!("Keep-alive poll");
            if let Err(e) = self.send_command(&Command::SyncDevices).await {
                warn!("Device status poll failed: {e}");
            }
            if let Err(e) = self.send_command(&Command::GetDeviceNames).await {
                warn!("Device name poll failed: {e}");
            }
        }
    }

    /// Receive one datagram, retrying transient failures.
    ///
    /// After `recv_retry_attempts` consecutive failures the error is fatal.
    pub async fn receive(&self) -> Result<Vec<u8>> {
        let attempts = self.config.recv_retry_attempts.max(1);
        let delay = Duration::from_millis(self.config.recv_retry_delay_ms);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.recv().await {
                Ok(datagram) => return Ok(datagram),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("Receive failed (attempt {attempt}/{attempts}): {e}");
                    sleep(delay).await;
                }
                Err(e) => {
                    error!("Receive failed after {attempt} attempts: {e}");
                    self.state_tx.send_replace(SessionState::Disconnected);
                    return Err(K1Error::ReceiveExhausted {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    /// Receive and handle datagrams until receiving fails for good.
    pub async fn read_loop(&self) -> Result<()> {
        loop {
            let datagram = self.receive().await?;
            self.handle_datagram(&datagram).await;
        }
    }

    /// Handle one inbound datagram: handshake replies, keep-alive acks and
    /// hub messages. Malformed datagrams are logged and dropped.
    pub async fn handle_datagram(&self, raw: &[u8]) {
        let text = codec::normalize_datagram(raw);
        debug!("Received: {}", text);

        if let Some(keys) = protocol::parse_handshake_reply(&text, &self.config.device_token) {
            self.complete_handshake(keys).await;
            return;
        }

        match codec::decode_envelope(raw) {
            Ok(Inbound::KeepAliveAck) => debug!("Hub acknowledged"),
            Ok(Inbound::Message(params)) => {
                self.dispatch(&params.data).await;
                if let Err(e) = self.send_text(APP_ACK).await {
                    warn!("Failed to acknowledge hub message: {e}");
                }
            }
            Err(e) => warn!("Dropping datagram: {e}"),
        }
    }

    async fn complete_handshake(&self, keys: protocol::HandshakeKeys) {
        {
            let mut creds = self.credentials.lock().await;
            if let Some(ctrl_key) = keys.ctrl_key {
                creds.ctrl_key = ctrl_key;
            }
            if let Some(bind_key) = keys.bind_key {
                creds.bind_key = bind_key;
            }
        }
        let previous = self.state_tx.send_replace(SessionState::Connected);
        if previous != SessionState::Connected {
            info!("Connected to hub {}", self.config.device_token);
            let _ = self.event_tx.send(HubEvent::Connected);
        }
    }

    /// Route a hub message to the registry by command id.
    async fn dispatch(&self, data: &HubData) {
        let mut registry = self.registry.lock().await;
        match data.cmd() {
            Some(CmdId::DeviceStatusUpdate) => {
                if data.device_name.as_deref() == Some(HEARTBEAT_MARKER) {
                    return;
                }
                match StatusRecord::from_hub_data(data) {
                    Some(record) => registry.upsert_status(&record),
                    None => warn!("Status update without device id or type: {data:?}"),
                }
            }
            Some(CmdId::DeviceAlarmTrigger) => {
                let content = data.answer_content.as_deref().unwrap_or_default();
                match StatusRecord::from_alarm_trigger(content) {
                    Some(record) => registry.apply_alarm_trigger(&record),
                    None => warn!("Malformed alarm trigger {content:?}"),
                }
            }
            Some(CmdId::DeviceNameReply) => {
                let answer = data.answer_content.as_deref().unwrap_or_default();
                match protocol::parse_name_reply(answer) {
                    Some(NameReply::Over) => {}
                    Some(NameReply::Name { id, encoded }) => {
                        match codec::decode_ascii_name(&encoded) {
                            Some(name) => registry.apply_name_reply(id, name),
                            None => {
                                warn!("Undecodable name for device {id}: {encoded:?}");
                                registry.track_for_sync(id);
                            }
                        }
                    }
                    None => warn!("Malformed name reply {answer:?}"),
                }
            }
            Some(other) => debug!("Ignoring hub message {other:?}"),
            None => debug!("Ignoring unknown cmdId {}", data.cmd_id),
        }
    }
}
