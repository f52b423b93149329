//! Linux backend speaking V4L2 through the `v4l` crate.
//!
//! Device nodes under `/dev/video*` are opened per call and closed on every
//! exit path (the `Device` handle owns the fd). Control metadata comes from
//! `VIDIOC_QUERYCTRL`, values from `VIDIOC_G_CTRL`/`VIDIOC_S_CTRL`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use v4l::control::{Control, Type, Value};
use v4l::video::Capture;
use v4l::Device;

use crate::backend::{validate_request, verify_write, VideoBackend};
use crate::errors::ControlError;
use crate::types::{CapabilitySet, ControlInfo, ControlKind, DeviceInfo, FormatInfo};

// V4L2 control IDs, from linux/v4l2-controls.h. Defined locally because the
// v4l crate does not re-export them.
const V4L2_CID_BASE: u32 = 0x0098_0900;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = 0x009A_0900;

const CID_BRIGHTNESS: u32 = V4L2_CID_BASE;
const CID_CONTRAST: u32 = V4L2_CID_BASE + 1;
const CID_SATURATION: u32 = V4L2_CID_BASE + 2;
const CID_HUE: u32 = V4L2_CID_BASE + 3;
const CID_AUTO_WHITE_BALANCE: u32 = V4L2_CID_BASE + 12;
const CID_RED_BALANCE: u32 = V4L2_CID_BASE + 14;
const CID_BLUE_BALANCE: u32 = V4L2_CID_BASE + 15;
const CID_GAMMA: u32 = V4L2_CID_BASE + 16;
const CID_EXPOSURE: u32 = V4L2_CID_BASE + 18;
const CID_GAIN: u32 = V4L2_CID_BASE + 20;
const CID_SHARPNESS: u32 = V4L2_CID_BASE + 27;
const CID_BACKLIGHT_COMPENSATION: u32 = V4L2_CID_BASE + 28;

const CID_FOCUS_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 10;
const CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;
const CID_ZOOM_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 13;
const CID_PAN_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 15;
const CID_TILT_ABSOLUTE: u32 = V4L2_CID_CAMERA_CLASS_BASE + 16;

/// Native id to canonical name mapping. Order here is the output order.
const CONTROL_TABLE: &[(u32, &str)] = &[
    (CID_BRIGHTNESS, "brightness"),
    (CID_CONTRAST, "contrast"),
    (CID_SATURATION, "saturation"),
    (CID_HUE, "hue"),
    (CID_GAMMA, "gamma"),
    (CID_GAIN, "gain"),
    (CID_EXPOSURE, "exposure"),
    (CID_SHARPNESS, "sharpness"),
    (CID_BACKLIGHT_COMPENSATION, "backlight_compensation"),
    (CID_AUTO_WHITE_BALANCE, "white_balance_automatic"),
    (CID_RED_BALANCE, "red_balance"),
    (CID_BLUE_BALANCE, "blue_balance"),
    (CID_FOCUS_ABSOLUTE, "focus"),
    (CID_FOCUS_AUTO, "focus_automatic"),
    (CID_ZOOM_ABSOLUTE, "zoom"),
    (CID_PAN_ABSOLUTE, "pan"),
    (CID_TILT_ABSOLUTE, "tilt"),
];

// Stepwise framesize reporting gets reduced to the resolutions callers
// actually ask for, matching v4l2-ctl's discrete output shape.
const COMMON_SIZES: &[(u32, u32)] = &[
    (640, 480),
    (800, 600),
    (1024, 768),
    (1280, 720),
    (1920, 1080),
];

pub struct LinuxBackend;

impl LinuxBackend {
    pub fn new() -> Self {
        LinuxBackend
    }

    fn open_device(device_id: &str) -> Result<Device, ControlError> {
        if !Path::new(device_id).exists() {
            return Err(ControlError::DeviceNotFound(device_id.to_string()));
        }
        Device::with_path(device_id).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => ControlError::BackendUnavailable(format!(
                "permission denied opening {device_id}: {e}"
            )),
            _ => ControlError::DeviceNotFound(format!("{device_id}: {e}")),
        })
    }

    fn cid_for(name: &str) -> Option<u32> {
        CONTROL_TABLE
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(cid, _)| *cid)
    }

    fn describe(desc: &v4l::control::Description, name: &str) -> Option<ControlInfo> {
        let writable = !desc.flags.contains(v4l::control::Flags::READ_ONLY);
        let ctrl = match desc.typ {
            Type::Boolean => ControlInfo::boolean(name, desc.default != 0),
            Type::Menu | Type::IntegerMenu => {
                ControlInfo::menu(name, desc.minimum as i64, desc.maximum as i64, desc.default as i64)
            }
            Type::Integer => ControlInfo::integer(
                name,
                desc.minimum as i64,
                desc.maximum as i64,
                (desc.step as i64).max(1),
                desc.default as i64,
            ),
            _ => return None,
        };
        Some(if writable { ctrl } else { ctrl.read_only() })
    }

    fn read_value(dev: &Device, desc: &v4l::control::Description) -> Option<i64> {
        match dev.control(desc.id) {
            Ok(Control {
                value: Value::Integer(v),
                ..
            }) => Some(v),
            Ok(Control {
                value: Value::Boolean(b),
                ..
            }) => Some(b as i64),
            _ => None,
        }
    }

    fn snapshot(dev: &Device, device_id: &str, name: &str) -> Result<ControlInfo, ControlError> {
        let cid = Self::cid_for(name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("unknown control '{name}'"))
        })?;
        let descriptions = dev.query_controls().map_err(|e| {
            ControlError::BackendUnavailable(format!("VIDIOC_QUERYCTRL failed: {e}"))
        })?;
        let desc = descriptions.iter().find(|d| d.id == cid).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!(
                "control '{name}' not available on {device_id}"
            ))
        })?;
        let mut ctrl = Self::describe(desc, name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!(
                "control '{name}' has an unsupported value type"
            ))
        })?;
        ctrl.current_value = Self::read_value(dev, desc);
        Ok(ctrl)
    }
}

impl Default for LinuxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoBackend for LinuxBackend {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ControlError> {
        let entries = std::fs::read_dir("/dev").map_err(|e| {
            ControlError::BackendUnavailable(format!("cannot scan /dev: {e}"))
        })?;

        let mut nodes: Vec<(u32, String)> = entries
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let name = file_name.to_string_lossy();
                let index: u32 = name.strip_prefix("video")?.parse().ok()?;
                Some((index, format!("/dev/{name}")))
            })
            .collect();
        nodes.sort();

        let mut devices = Vec::new();
        let mut per_bus: HashMap<String, u32> = HashMap::new();
        for (_, path) in nodes {
            // Nodes that refuse to open (busy, no permission) are skipped,
            // not fatal for the enumeration as a whole.
            let dev = match Device::with_path(&path) {
                Ok(dev) => dev,
                Err(e) => {
                    log::debug!("skipping {path}: {e}");
                    continue;
                }
            };
            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    log::debug!("skipping {path}: VIDIOC_QUERYCAP failed: {e}");
                    continue;
                }
            };
            let interface_index = per_bus.entry(caps.bus.clone()).or_insert(0);
            devices.push(
                DeviceInfo::new(&path, caps.card)
                    .with_bus_info(caps.bus.clone())
                    .with_interface_index(*interface_index),
            );
            *interface_index += 1;
        }
        Ok(devices)
    }

    fn list_formats(&self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError> {
        let dev = Self::open_device(device_id)?;
        let mut formats: Vec<FormatInfo> = Vec::new();

        let descriptions = dev.enum_formats().map_err(|e| {
            ControlError::UnsupportedOperation(format!("VIDIOC_ENUM_FMT failed: {e}"))
        })?;

        for fmt_desc in descriptions {
            let fourcc = fmt_desc.fourcc;
            let tag = fourcc.to_string();

            let sizes = match dev.enum_framesizes(fourcc) {
                Ok(sizes) => sizes,
                Err(_) => continue,
            };

            let mut discrete_sizes: Vec<(u32, u32)> = Vec::new();
            for size in sizes {
                match size.size {
                    v4l::framesize::FrameSizeEnum::Discrete(d) => {
                        discrete_sizes.push((d.width, d.height));
                    }
                    v4l::framesize::FrameSizeEnum::Stepwise(s) => {
                        for &(w, h) in COMMON_SIZES {
                            if w >= s.min_width
                                && w <= s.max_width
                                && h >= s.min_height
                                && h <= s.max_height
                            {
                                discrete_sizes.push((w, h));
                            }
                        }
                    }
                }
            }

            for (width, height) in discrete_sizes {
                let mut rates: Vec<f64> = Vec::new();
                if let Ok(intervals) = dev.enum_frameintervals(fourcc, width, height) {
                    for interval in intervals {
                        if let v4l::frameinterval::FrameIntervalEnum::Discrete(frac) =
                            interval.interval
                        {
                            if frac.numerator > 0 {
                                rates.push(frac.denominator as f64 / frac.numerator as f64);
                            }
                        }
                    }
                }
                if rates.is_empty() {
                    rates.push(30.0);
                }
                for rate in rates {
                    let fmt = FormatInfo::new(tag.clone(), width, height, rate);
                    // Uniqueness invariant on the (fourcc, w, h, rate) tuple.
                    if !formats.contains(&fmt) {
                        formats.push(fmt);
                    }
                }
            }
        }
        Ok(formats)
    }

    fn list_controls(&self, device_id: &str) -> Result<Vec<ControlInfo>, ControlError> {
        let dev = Self::open_device(device_id)?;
        let descriptions = dev.query_controls().map_err(|e| {
            ControlError::UnsupportedOperation(format!("VIDIOC_QUERYCTRL failed: {e}"))
        })?;

        let by_id: HashMap<u32, &v4l::control::Description> =
            descriptions.iter().map(|d| (d.id, d)).collect();

        let mut controls = Vec::new();
        for (cid, name) in CONTROL_TABLE {
            let Some(desc) = by_id.get(cid) else {
                continue;
            };
            if desc.flags.contains(v4l::control::Flags::DISABLED) {
                continue;
            }
            if let Some(mut ctrl) = Self::describe(desc, name) {
                ctrl.current_value = Self::read_value(&dev, desc);
                controls.push(ctrl);
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
        let dev = Self::open_device(device_id)?;
        let before = Self::snapshot(&dev, device_id, name)?;
        validate_request(&before, value)?;

        let cid = Self::cid_for(name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("unknown control '{name}'"))
        })?;
        let native_value = match before.kind {
            ControlKind::Boolean => Value::Boolean(value != 0),
            _ => Value::Integer(value),
        };
        dev.set_control(Control {
            id: cid,
            value: native_value,
        })
        .map_err(|e| ControlError::ControlWriteRejected {
            name: name.to_string(),
            requested: value,
            actual: before.current_value,
            reason: format!("VIDIOC_S_CTRL failed: {e}"),
        })?;

        // The driver may acknowledge the write and still clamp or ignore it.
        let after = Self::snapshot(&dev, device_id, name)?;
        verify_write(value, after)
    }
}
