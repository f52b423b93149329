//! The polymorphic backend contract.
//!
//! Every backend (Windows DirectShow, Linux V4L2, macOS AVFoundation and the
//! capability-reduced fallback) implements [`VideoBackend`] against its
//! native API and reduces the results to the canonical descriptor model.
//! Callers never branch on the platform; they hold a `Box<dyn VideoBackend>`
//! handed out by [`platform_backend`].

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

pub mod fallback;

use crate::errors::ControlError;
use crate::types::{CapabilitySet, ControlInfo, DeviceInfo, FormatInfo};

/// Contract every backend implements.
///
/// All operations are side-effect-free except `set_control`. Queries return
/// fresh snapshots; nothing is cached at this layer (caching belongs to the
/// facade).
pub trait VideoBackend {
    /// Short backend identifier for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Declared operation support. Absence of a capability is a queryable
    /// fact, not an exception path.
    fn capabilities(&self) -> CapabilitySet;

    /// Enumerate capture devices.
    ///
    /// Fails with `BackendUnavailable` if the native subsystem cannot be
    /// initialized; returns an empty list (not an error) when initialization
    /// succeeds but zero devices exist.
    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ControlError>;

    /// List supported capture modes for one device.
    fn list_formats(&self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError>;

    /// List control snapshots for one device, grouped via the fixed
    /// classification table in [`crate::types::ControlGroup::classify`].
    fn list_controls(&self, device_id: &str) -> Result<Vec<ControlInfo>, ControlError>;

    /// Read a single control snapshot.
    fn get_control(&self, device_id: &str, name: &str) -> Result<ControlInfo, ControlError> {
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
    /// Implementations must validate the request locally (see
    /// [`validate_request`]), then re-read after the native write and compare
    /// (see [`verify_write`]). Reporting success without verifying the native
    /// write took effect is a contract violation.
    fn set_control(
        &mut self,
        device_id: &str,
        name: &str,
        value: i64,
    ) -> Result<ControlInfo, ControlError>;
}

/// Local validation performed before any native call.
///
/// A violation costs zero native calls: out-of-range and off-step requests
/// fail here, and read-only controls are a declared gap rather than a write
/// failure.
pub fn validate_request(ctrl: &ControlInfo, value: i64) -> Result<(), ControlError> {
    if !ctrl.writable {
        return Err(ControlError::UnsupportedOperation(format!(
            "control '{}' is read-only",
            ctrl.name
        )));
    }
    let out_of_range = value < ctrl.min || value > ctrl.max;
    let off_step = ctrl.step > 0 && (value - ctrl.min) % ctrl.step != 0;
    if out_of_range || off_step {
        return Err(ControlError::OutOfRange {
            name: ctrl.name.clone(),
            value,
            min: ctrl.min,
            max: ctrl.max,
            step: ctrl.step,
        });
    }
    Ok(())
}

/// Post-write verification shared by all backends.
///
/// Drivers in this domain have a history of acknowledging writes they never
/// applied; a re-read that disagrees with the request is a
/// `ControlWriteRejected` carrying the actual resulting value, never a
/// silent partial success.
pub fn verify_write(requested: i64, reread: ControlInfo) -> Result<ControlInfo, ControlError> {
    match reread.current_value {
        Some(actual) if actual == requested => Ok(reread),
        actual => Err(ControlError::ControlWriteRejected {
            name: reread.name,
            requested,
            actual,
            reason: "post-write read-back does not match requested value".to_string(),
        }),
    }
}

/// Construct the native backend for the current platform.
///
/// Exactly one backend per process; mixing backends within one invocation is
/// never done, so behavior stays deterministic and reproducible.
pub fn platform_backend() -> Result<Box<dyn VideoBackend>, ControlError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxBackend::new()))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsBackend::new()?))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::MacosBackend::new()))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        Err(ControlError::BackendUnavailable(
            "no native backend for this platform".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness() -> ControlInfo {
        ControlInfo::integer("brightness", 0, 255, 5, 125)
    }

    #[test]
    fn test_validate_accepts_in_range_on_step() {
        assert!(validate_request(&brightness(), 0).is_ok());
        assert!(validate_request(&brightness(), 125).is_ok());
        assert!(validate_request(&brightness(), 255).is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = validate_request(&brightness(), 300).unwrap_err();
        assert!(matches!(err, ControlError::OutOfRange { value: 300, .. }));
        assert!(validate_request(&brightness(), -1).is_err());
    }

    #[test]
    fn test_validate_rejects_off_step() {
        let err = validate_request(&brightness(), 3).unwrap_err();
        assert!(matches!(err, ControlError::OutOfRange { step: 5, .. }));
    }

    #[test]
    fn test_validate_rejects_read_only() {
        let ctrl = brightness().read_only();
        let err = validate_request(&ctrl, 10).unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_verify_write_accepts_matching_readback() {
        let reread = brightness().with_value(60);
        let out = verify_write(60, reread).unwrap();
        assert_eq!(out.current_value, Some(60));
    }

    #[test]
    fn test_verify_write_surfaces_actual_value() {
        let reread = brightness().with_value(55);
        let err = verify_write(60, reread).unwrap_err();
        match err {
            ControlError::ControlWriteRejected {
                requested, actual, ..
            } => {
                assert_eq!(requested, 60);
                assert_eq!(actual, Some(55));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_verify_write_rejects_missing_readback() {
        let err = verify_write(60, brightness()).unwrap_err();
        assert!(matches!(
            err,
            ControlError::ControlWriteRejected { actual: None, .. }
        ));
    }
}
