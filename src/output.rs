//! Output formatter: the v4l2-ctl protocol-compatibility layer.
//!
//! Downstream scripts parse this output as fixed-width text, so the layout
//! here is a compatibility contract, not a presentation choice. Ordering is
//! always the backend's ordering; the formatter never sorts.

use crate::types::{ControlGroup, ControlInfo, DeviceInfo, FormatInfo};

/// Render enumerated devices as v4l2-ctl device groups:
///
/// ```text
/// HD Webcam C920: (usb-0000:00:14.0-1):
///         /dev/video0
///         /dev/video1
/// ```
///
/// Logical paths sharing a display name and bus descriptor collapse into one
/// physical-device group.
pub fn render_devices(devices: &[DeviceInfo]) -> String {
    let mut out = String::new();
    let mut current: Option<(&str, &str)> = None;
    for device in devices {
        let header = (device.display_name.as_str(), device.bus_info.as_str());
        if current != Some(header) {
            if current.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("{}: ({}):\n", device.display_name, device.bus_info));
            current = Some(header);
        }
        out.push_str(&format!("        {}\n", device.id));
    }
    out
}

/// Render formats one line per entry, in backend order:
///
/// ```text
/// [MJPG] 1920x1080 @ 30.00fps
/// ```
pub fn render_formats(formats: &[FormatInfo]) -> String {
    let mut out = String::new();
    for f in formats {
        out.push_str(&format!(
            "[{}] {}x{} @ {:.2}fps\n",
            f.pixel_format, f.width, f.height, f.frame_rate
        ));
    }
    out
}

/// Render controls in two aligned groups headed `User Controls` and
/// `Camera Controls`.
///
/// The name column is right-aligned to the longest name across the full set
/// being printed, recomputed per invocation.
pub fn render_controls(controls: &[ControlInfo]) -> String {
    let width = controls.iter().map(|c| c.name.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (group, header) in [
        (ControlGroup::User, "User Controls"),
        (ControlGroup::Camera, "Camera Controls"),
    ] {
        let members: Vec<&ControlInfo> =
            controls.iter().filter(|c| c.group == group).collect();
        if members.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(header);
        out.push_str("\n\n");
        for ctrl in members {
            out.push_str(&render_control_line(ctrl, width));
            out.push('\n');
        }
    }
    out
}

// The `value=` field is unconditional; fixed-width parsers count on it. A
// control whose current value could not be read renders its default.
fn render_control_line(ctrl: &ControlInfo, width: usize) -> String {
    format!(
        "{:>width$} ({})    : min={} max={} step={} default={} value={}",
        ctrl.name,
        ctrl.kind.as_str(),
        ctrl.min,
        ctrl.max,
        ctrl.step,
        ctrl.default,
        ctrl.current_value.unwrap_or(ctrl.default),
    )
}
