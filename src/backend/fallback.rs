//! Capability-reduced fallback backend.
//!
//! Used when the platform backend cannot initialize its native subsystem.
//! Enumeration and a coarse format listing go through nokhwa's
//! auto-selected capture API; the control surface is declared unsupported so
//! callers get "not supported" instead of wrong answers.

use nokhwa::query;
use nokhwa::utils::ApiBackend;

use crate::backend::VideoBackend;
use crate::errors::ControlError;
use crate::types::{CapabilitySet, ControlInfo, DeviceInfo, FormatInfo};

pub struct FallbackBackend;

impl FallbackBackend {
    pub fn new() -> Self {
        FallbackBackend
    }

    /// Modes virtually every UVC device supports. The fallback cannot probe
    /// per-mode support, so it reports this fixed set rather than nothing.
    fn common_formats() -> Vec<FormatInfo> {
        vec![
            FormatInfo::new("MJPG", 1920, 1080, 30.0),
            FormatInfo::new("MJPG", 1280, 720, 30.0),
            FormatInfo::new("YUYV", 1280, 720, 10.0),
            FormatInfo::new("YUYV", 640, 480, 30.0),
        ]
    }
}

impl Default for FallbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::enumeration_only()
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ControlError> {
        let cameras = query(ApiBackend::Auto).map_err(|e| {
            ControlError::BackendUnavailable(format!("fallback camera query failed: {e}"))
        })?;

        let mut devices = Vec::new();
        for camera_info in cameras {
            devices.push(
                DeviceInfo::new(camera_info.index().to_string(), camera_info.human_name())
                    .with_bus_info(camera_info.description().to_string()),
            );
        }
        Ok(devices)
    }

    /// Validating the id re-runs the native query; the facade's cache keeps
    /// that to one call per device per run, but querying several distinct
    /// devices in one run enumerates once each. This backend makes no
    /// one-call guarantee of its own.
    fn list_formats(&self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError> {
        let known = self
            .enumerate_devices()?
            .into_iter()
            .any(|d| d.id == device_id);
        if !known {
            return Err(ControlError::DeviceNotFound(device_id.to_string()));
        }
        Ok(Self::common_formats())
    }

    fn list_controls(&self, _device_id: &str) -> Result<Vec<ControlInfo>, ControlError> {
        Err(ControlError::UnsupportedOperation(
            "control listing is not supported by the fallback backend".to_string(),
        ))
    }

    fn set_control(
        &mut self,
        _device_id: &str,
        name: &str,
        _value: i64,
    ) -> Result<ControlInfo, ControlError> {
        Err(ControlError::UnsupportedOperation(format!(
            "cannot set '{name}': control writes are not supported by the fallback backend"
        )))
    }
}
