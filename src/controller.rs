//! Device Controller Facade.
//!
//! Selects exactly one backend at construction time (platform probe, one
//! fallback hop on `BackendUnavailable`) and serves all queries through the
//! per-invocation result cache. The facade is the only component that talks
//! to the cache; backends stay cache-unaware.

use crate::backend::{self, fallback::FallbackBackend, VideoBackend};
use crate::cache::{CacheStats, ResultCache};
use crate::errors::ControlError;
use crate::types::{Capability, ControlInfo, DeviceInfo, FormatInfo};

pub struct DeviceController {
    backend: Box<dyn VideoBackend>,
    cache: ResultCache,
    degraded: bool,
}

impl DeviceController {
    /// Probe the platform backend and fall back once if its native subsystem
    /// is unavailable. Backends are never mixed within one invocation, and a
    /// failed platform backend is never retried within the run.
    pub fn new() -> Result<Self, ControlError> {
        match backend::platform_backend() {
            Ok(platform) => match platform.enumerate_devices() {
                Ok(devices) => {
                    log::debug!(
                        "selected {} backend ({} devices)",
                        platform.name(),
                        devices.len()
                    );
                    let mut controller = Self::with_backend(platform);
                    // The probe was the one allowed native enumeration call.
                    controller.cache.store_devices(devices);
                    Ok(controller)
                }
                Err(ControlError::BackendUnavailable(reason)) => {
                    log::warn!("platform backend unavailable ({reason}), using fallback");
                    Self::fallback()
                }
                Err(other) => Err(other),
            },
            Err(ControlError::BackendUnavailable(reason)) => {
                log::warn!("no platform backend ({reason}), using fallback");
                Self::fallback()
            }
            Err(other) => Err(other),
        }
    }

    fn fallback() -> Result<Self, ControlError> {
        let fallback = FallbackBackend::new();
        let devices = fallback.enumerate_devices()?;
        let mut controller = Self::with_backend(Box::new(fallback));
        controller.degraded = true;
        controller.cache.store_devices(devices);
        Ok(controller)
    }

    /// Build a controller around an explicit backend. Used by tests and by
    /// embedders that manage backend selection themselves.
    pub fn with_backend(backend: Box<dyn VideoBackend>) -> Self {
        Self {
            backend,
            cache: ResultCache::new(),
            degraded: false,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// True when the capability-reduced fallback backend is in use.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn require(&self, cap: Capability, what: &str) -> Result<(), ControlError> {
        if self.backend.capabilities().supports(cap) {
            Ok(())
        } else {
            Err(ControlError::UnsupportedOperation(format!(
                "{what} is not supported by the {} backend",
                self.backend.name()
            )))
        }
    }

    pub fn list_devices(&mut self) -> Result<Vec<DeviceInfo>, ControlError> {
        self.require(Capability::Enumerate, "device enumeration")?;
        if let Some(devices) = self.cache.get_devices() {
            return Ok(devices);
        }
        let devices = self.backend.enumerate_devices()?;
        self.cache.store_devices(devices.clone());
        Ok(devices)
    }

    pub fn list_formats(&mut self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError> {
        self.require(Capability::ListFormats, "format listing")?;
        if let Some(formats) = self.cache.get_formats(device_id) {
            return Ok(formats);
        }
        let formats = self.backend.list_formats(device_id)?;
        self.cache.store_formats(device_id, formats.clone());
        Ok(formats)
    }

    pub fn list_controls(&mut self, device_id: &str) -> Result<Vec<ControlInfo>, ControlError> {
        self.require(Capability::ListControls, "control listing")?;
        if let Some(controls) = self.cache.get_controls(device_id) {
            return Ok(controls);
        }
        let controls = self.backend.list_controls(device_id)?;
        self.cache.store_controls(device_id, controls.clone());
        Ok(controls)
    }

    pub fn get_control(
        &mut self,
        device_id: &str,
        name: &str,
    ) -> Result<ControlInfo, ControlError> {
        self.require(Capability::GetControl, "control reads")?;
        self.list_controls(device_id)?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                ControlError::UnsupportedOperation(format!(
                    "control '{name}' not available on {device_id}"
                ))
            })
    }

    /// Write a control and return the verified post-write snapshot.
    ///
    /// Invalidates the cached control list for the device so the next query
    /// re-reads hardware state; enumeration and format entries stay valid.
    pub fn set_control(
        &mut self,
        device_id: &str,
        name: &str,
        value: i64,
    ) -> Result<ControlInfo, ControlError> {
        self.require(Capability::SetControl, "control writes")?;
        let result = self.backend.set_control(device_id, name, value);
        self.cache.invalidate_controls(device_id);
        let stats = self.cache.stats();
        log::debug!(
            "set {name}={value} on {device_id}: {} (cache {} hits / {} misses)",
            if result.is_ok() { "ok" } else { "failed" },
            stats.hits,
            stats.misses
        );
        result
    }
}
