// MIT License - Copyright (c) 2026 Peter Wright
// Hub events and per-device change signals

use tokio::sync::watch;

/// Hub-level events.
///
/// Users subscribe via `hub.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<HubEvent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Handshake with the hub completed
    Connected,
    /// A device was seen for the first time
    DeviceAdded { id: u32 },
    /// A device was removed locally or deleted on the hub
    DeviceRemoved { id: u32 },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<HubEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<HubEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}

/// Edge-triggered notification gate.
///
/// Firing bumps a version counter and wakes every waiter. Waiters only see
/// that at least one fire happened since they last looked; fires are not
/// queued, so a slow waiter may observe two quick fires as one.
#[derive(Debug)]
pub struct Signal {
    tx: watch::Sender<u64>,
}

impl Signal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Wake all current waiters.
    pub fn fire(&self) {
        self.tx.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Number of times the signal has fired.
    pub fn version(&self) -> u64 {
        *self.tx.borrow()
    }

    /// A waiter that starts from the current version.
    pub fn waiter(&self) -> SignalWaiter {
        SignalWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a [`Signal`].
#[derive(Debug, Clone)]
pub struct SignalWaiter {
    rx: watch::Receiver<u64>,
}

impl SignalWaiter {
    /// Wait until the signal fires again.
    ///
    /// Returns the new version, or `None` once the signal is gone (the device
    /// was removed).
    pub async fn wait(&mut self) -> Option<u64> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
