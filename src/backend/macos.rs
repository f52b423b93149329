//! macOS backend speaking AVFoundation through nokhwa.
//!
//! AVFoundation exposes a narrower control surface than V4L2 or DirectShow;
//! whatever the capture session reports is normalized into the canonical
//! model and everything else is absent rather than faked.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraIndex, ControlValueDescription, ControlValueSetter, KnownCameraControl,
    KnownCameraControlFlag, RequestedFormat, RequestedFormatType,
};
use nokhwa::{query, Camera};

use crate::backend::{validate_request, verify_write, VideoBackend};
use crate::errors::ControlError;
use crate::types::{CapabilitySet, ControlInfo, ControlKind, DeviceInfo, FormatInfo};

/// Session control to canonical name mapping. Order here is the output order.
const CONTROL_TABLE: &[(KnownCameraControl, &str)] = &[
    (KnownCameraControl::Brightness, "brightness"),
    (KnownCameraControl::Contrast, "contrast"),
    (KnownCameraControl::Saturation, "saturation"),
    (KnownCameraControl::Hue, "hue"),
    (KnownCameraControl::Gamma, "gamma"),
    (KnownCameraControl::Gain, "gain"),
    (KnownCameraControl::Sharpness, "sharpness"),
    (KnownCameraControl::BacklightComp, "backlight_compensation"),
    (KnownCameraControl::WhiteBalance, "white_balance_temperature"),
    (KnownCameraControl::Exposure, "exposure"),
    (KnownCameraControl::Iris, "iris"),
    (KnownCameraControl::Focus, "focus"),
    (KnownCameraControl::Zoom, "zoom"),
    (KnownCameraControl::Pan, "pan"),
    (KnownCameraControl::Tilt, "tilt"),
];

pub struct MacosBackend;

impl MacosBackend {
    pub fn new() -> Self {
        MacosBackend
    }

    fn canonical_name(id: KnownCameraControl) -> Option<&'static str> {
        CONTROL_TABLE
            .iter()
            .find(|(known, _)| *known == id)
            .map(|(_, name)| *name)
    }

    fn known_control(name: &str) -> Option<KnownCameraControl> {
        CONTROL_TABLE
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(known, _)| *known)
    }

    fn open_camera(device_id: &str) -> Result<Camera, ControlError> {
        let index: u32 = device_id
            .parse()
            .map_err(|_| ControlError::DeviceNotFound(device_id.to_string()))?;
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| ControlError::DeviceNotFound(format!("{device_id}: {e}")))
    }

    fn fourcc_tag(format: nokhwa::utils::FrameFormat) -> String {
        match format {
            nokhwa::utils::FrameFormat::MJPEG => "MJPG".to_string(),
            nokhwa::utils::FrameFormat::YUYV => "YUYV".to_string(),
            other => format!("{other}"),
        }
    }

    fn describe(control: &nokhwa::utils::CameraControl) -> Option<ControlInfo> {
        let name = Self::canonical_name(control.control())?;
        let read_only = control
            .flag()
            .contains(&KnownCameraControlFlag::ReadOnly);
        let ctrl = match control.description() {
            ControlValueDescription::IntegerRange {
                min,
                max,
                value,
                step,
                default,
            } => ControlInfo::integer(
                name,
                *min as i64,
                *max as i64,
                (*step as i64).max(1),
                *default as i64,
            )
            .with_value(*value as i64),
            ControlValueDescription::Boolean { value, default } => {
                ControlInfo::boolean(name, *default).with_value(*value as i64)
            }
            ControlValueDescription::Enum {
                value,
                possible,
                default,
            } => {
                let min = possible.iter().min().copied().unwrap_or(0);
                let max = possible.iter().max().copied().unwrap_or(0);
                ControlInfo::menu(name, min as i64, max as i64, *default as i64)
                    .with_value(*value as i64)
            }
            _ => return None,
        };
        Some(if read_only { ctrl.read_only() } else { ctrl })
    }

    fn snapshot(camera: &Camera, name: &str) -> Result<ControlInfo, ControlError> {
        let id = Self::known_control(name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("unknown control '{name}'"))
        })?;
        let controls = camera.camera_controls().map_err(|e| {
            ControlError::UnsupportedOperation(format!("control query failed: {e}"))
        })?;
        controls
            .iter()
            .find(|c| c.control() == id)
            .and_then(Self::describe)
            .ok_or_else(|| {
                ControlError::UnsupportedOperation(format!("control '{name}' not available"))
            })
    }
}

impl Default for MacosBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoBackend for MacosBackend {
    fn name(&self) -> &'static str {
        "avfoundation"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ControlError> {
        let cameras = query(ApiBackend::AVFoundation).map_err(|e| {
            ControlError::BackendUnavailable(format!("AVFoundation query failed: {e}"))
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

    fn list_formats(&self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError> {
        let mut camera = Self::open_camera(device_id)?;
        let native = camera.compatible_camera_formats().map_err(|e| {
            ControlError::UnsupportedOperation(format!("format query failed: {e}"))
        })?;

        let mut formats: Vec<FormatInfo> = Vec::new();
        for f in native {
            let fmt = FormatInfo::new(
                Self::fourcc_tag(f.format()),
                f.resolution().width_x,
                f.resolution().height_y,
                f.frame_rate() as f64,
            );
            if !formats.contains(&fmt) {
                formats.push(fmt);
            }
        }
        Ok(formats)
    }

    fn list_controls(&self, device_id: &str) -> Result<Vec<ControlInfo>, ControlError> {
        let camera = Self::open_camera(device_id)?;
        let native = camera.camera_controls().map_err(|e| {
            ControlError::UnsupportedOperation(format!("control query failed: {e}"))
        })?;

        // Table order, not session order, so output is stable across runs.
        let mut controls = Vec::new();
        for (id, _) in CONTROL_TABLE {
            if let Some(ctrl) = native.iter().find(|c| c.control() == *id) {
                if let Some(described) = Self::describe(ctrl) {
                    controls.push(described);
                }
            }
        }
        Ok(controls)
    }

    fn set_control(
        &mut self,
        device_id: &str,
        name: &str,
        value: i64,
    ) -> Result<ControlInfo, ControlError> {
        let mut camera = Self::open_camera(device_id)?;
        let before = Self::snapshot(&camera, name)?;
        validate_request(&before, value)?;

        let id = Self::known_control(name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("unknown control '{name}'"))
        })?;
        let setter = match before.kind {
            ControlKind::Boolean => ControlValueSetter::Boolean(value != 0),
            _ => ControlValueSetter::Integer(value as isize),
        };
        camera
            .set_camera_control(id, setter)
            .map_err(|e| ControlError::ControlWriteRejected {
                name: name.to_string(),
                requested: value,
                actual: before.current_value,
                reason: format!("AVFoundation set failed: {e}"),
            })?;

        let after = Self::snapshot(&camera, name)?;
        verify_write(value, after)
    }
}
