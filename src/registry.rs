// MIT License - Copyright (c) 2026 Peter Wright
// Device registry

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::constants::{DELETE_MARKER, PLACEHOLDER_STATUS};
use crate::devices::{Device, DeviceSnapshot};
use crate::event::{EventSender, HubEvent};
use crate::protocol::StatusRecord;

/// Devices known in this session, plus the data that arrives before a device does.
///
/// The hub reports names, statuses and alarms in no particular order. Names
/// for ids not seen yet are parked in `pending_names` and handed over when
/// the device is created. `sync_roster` keeps the last raw status per id for
/// the roster sync payload.
#[derive(Debug)]
pub struct Registry {
    devices: HashMap<u32, Device>,
    pending_names: HashMap<u32, String>,
    sync_roster: BTreeMap<u32, String>,
    event_tx: EventSender,
}

impl Registry {
    pub fn new(event_tx: EventSender) -> Self {
        Self {
            devices: HashMap::new(),
            pending_names: HashMap::new(),
            sync_roster: BTreeMap::new(),
            event_tx,
        }
    }

    pub fn lookup(&self, id: u32) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Snapshots of all devices, ordered by id.
    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        let mut all: Vec<_> = self.devices.values().map(Device::snapshot).collect();
        all.sort_by_key(|d| d.id);
        all
    }

    pub fn sync_roster(&self) -> &BTreeMap<u32, String> {
        &self.sync_roster
    }

    pub fn pending_name(&self, id: u32) -> Option<&str> {
        self.pending_names.get(&id).map(String::as_str)
    }

    /// Create a device from its first status report.
    ///
    /// A report carrying the `DEL` marker removes the id instead and yields
    /// `None`. An already known id is returned unchanged. The status itself is
    /// not applied here; see [`Registry::apply_status_update`].
    pub fn create_from_status(&mut self, record: &StatusRecord) -> Option<&Device> {
        let id = record.device_id;
        if record.device_name == DELETE_MARKER {
            self.remove(id);
            return None;
        }
        if !self.devices.contains_key(&id) {
            let mut device = Device::new(id, &record.device_name);
            if let Some(name) = self.pending_names.remove(&id) {
                debug!("Device {id}: applying buffered name {name:?}");
                device.init_name(name);
            }
            info!(
                "New device {id}: type {} ({})",
                record.device_name,
                device.category()
            );
            self.devices.insert(id, device);
            self.sync_roster.insert(id, record.device_status.clone());
            let _ = self.event_tx.send(HubEvent::DeviceAdded { id });
        }
        self.devices.get(&id)
    }

    /// Apply a status report to a known device. Returns false if the id is unknown.
    pub fn apply_status_update(&mut self, record: &StatusRecord) -> bool {
        let Some(device) = self.devices.get_mut(&record.device_id) else {
            return false;
        };
        device.apply_status(&record.device_name, &record.device_status);
        self.sync_roster
            .insert(record.device_id, record.device_status.clone());
        true
    }

    /// Handle a `DEVICE_STATUS_UPDATE`: remove on `DEL`, otherwise create if
    /// needed and apply.
    pub fn upsert_status(&mut self, record: &StatusRecord) {
        if self.create_from_status(record).is_none() {
            return;
        }
        self.apply_status_update(record);
    }

    /// Handle a `DEVICE_ALARM_TRIGGER` built from the trigger fragment.
    ///
    /// The device is created if needed, the status applied and the alarm fired.
    pub fn apply_alarm_trigger(&mut self, record: &StatusRecord) {
        self.upsert_status(record);
        match self.devices.get(&record.device_id) {
            Some(device) => device.trigger_alarm(),
            None => warn!("Alarm for device {} could not be applied", record.device_id),
        }
    }

    /// Set a device name, or park it until the device exists.
    ///
    /// Returns true if the name was applied to a known device.
    pub fn rename(&mut self, id: u32, name: impl Into<String>) -> bool {
        let name = name.into();
        match self.devices.get_mut(&id) {
            Some(device) => {
                if device.name() != name {
                    info!("Device {id}: name {:?}", name);
                }
                device.set_name(name);
                true
            }
            None => {
                debug!("Name {name:?} for unknown device {id}, buffering");
                self.pending_names.insert(id, name);
                false
            }
        }
    }

    /// Handle a decoded `DEVICE_NAME_REPLY`.
    ///
    /// Ids not yet in the roster get a placeholder status so the next roster
    /// sync asks the hub about them.
    pub fn apply_name_reply(&mut self, id: u32, name: String) {
        self.track_for_sync(id);
        self.rename(id, name);
    }

    /// Put an id in the roster with a placeholder status unless it is already there.
    pub fn track_for_sync(&mut self, id: u32) {
        self.sync_roster
            .entry(id)
            .or_insert_with(|| PLACEHOLDER_STATUS.to_string());
    }

    /// Forget a device and everything buffered for its id.
    pub fn remove(&mut self, id: u32) -> Option<Device> {
        self.sync_roster.remove(&id);
        self.pending_names.remove(&id);
        let removed = self.devices.remove(&id);
        if removed.is_some() {
            info!("Device {id} removed");
            let _ = self.event_tx.send(HubEvent::DeviceRemoved { id });
        }
        removed
    }
}
