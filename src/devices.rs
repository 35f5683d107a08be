//! Media device enumeration.
//!
//! Thin wrappers over the engine's synchronous enumeration calls. A return
//! of `None` means enumeration itself failed; an empty list means it worked
//! and there are no devices, an expected runtime condition rather than a
//! failure.

use crate::engine::MediaEngine;
use crate::types::DeviceInfo;

/// List video capture devices.
pub fn video_capturer_devices<E: MediaEngine + ?Sized>(engine: &E) -> Option<Vec<DeviceInfo>> {
    match engine.video_capturer_devices() {
        Some(devices) => {
            log::info!("found {} video capture device(s)", devices.len());
            Some(devices)
        }
        None => {
            log::warn!("video capture device enumeration failed");
            None
        }
    }
}

/// List audio recording devices.
pub fn audio_recording_devices<E: MediaEngine + ?Sized>(engine: &E) -> Option<Vec<DeviceInfo>> {
    match engine.audio_recording_devices() {
        Some(devices) => {
            log::info!("found {} audio recording device(s)", devices.len());
            Some(devices)
        }
        None => {
            log::warn!("audio recording device enumeration failed");
            None
        }
    }
}

/// List audio playout devices.
pub fn audio_playout_devices<E: MediaEngine + ?Sized>(engine: &E) -> Option<Vec<DeviceInfo>> {
    match engine.audio_playout_devices() {
        Some(devices) => {
            log::info!("found {} audio playout device(s)", devices.len());
            Some(devices)
        }
        None => {
            log::warn!("audio playout device enumeration failed");
            None
        }
    }
}

/// Find a device by unique id or display name.
pub fn find_device<'a>(devices: &'a [DeviceInfo], query: &str) -> Option<&'a DeviceInfo> {
    devices
        .iter()
        .find(|device| device.unique_id == query || device.name == query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_device_by_id_or_name() {
        let devices = vec![
            DeviceInfo::new("Front Camera", "cam-0"),
            DeviceInfo::new("Rear Camera", "cam-1"),
        ];
        assert_eq!(find_device(&devices, "cam-1").unwrap().name, "Rear Camera");
        assert_eq!(
            find_device(&devices, "Front Camera").unwrap().unique_id,
            "cam-0"
        );
        assert!(find_device(&devices, "cam-9").is_none());
    }
}
