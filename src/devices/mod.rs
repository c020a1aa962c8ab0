// MIT License - Copyright (c) 2026 Peter Wright
// Devices paired with the hub

pub mod category;
pub mod device;

pub use category::{DeviceCategory, DeviceState};
pub use device::{Device, DeviceSnapshot, StatusFields};
