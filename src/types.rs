//! Canonical descriptor model shared by every backend.
//!
//! Native representations (COM property sets, V4L2 ioctl structures,
//! AVFoundation session properties) are reduced to these three value types
//! before anything else in the crate sees them.

use serde::{Deserialize, Serialize};

/// Identity of one capture device as seen by the OS.
///
/// `id` is opaque and stable for the process lifetime only. A single physical
/// multi-interface camera may appear as several entries sharing a `bus_info`
/// prefix; `interface_index` disambiguates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub display_name: String,
    pub bus_info: String,
    pub interface_index: u32,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            bus_info: String::new(),
            interface_index: 0,
        }
    }

    pub fn with_bus_info(mut self, bus_info: impl Into<String>) -> Self {
        self.bus_info = bus_info.into();
        self
    }

    pub fn with_interface_index(mut self, index: u32) -> Self {
        self.interface_index = index;
        self
    }
}

/// One supported capture mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    /// Fourcc-style tag, e.g. `MJPG` or `YUYV`.
    pub pixel_format: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

impl FormatInfo {
    pub fn new(pixel_format: impl Into<String>, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            pixel_format: pixel_format.into(),
            width,
            height,
            frame_rate,
        }
    }
}

/// Value kind of a control, rendered as `(int)`, `(bool)` or `(menu)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlKind {
    Integer,
    Boolean,
    Menu,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Integer => "int",
            ControlKind::Boolean => "bool",
            ControlKind::Menu => "menu",
        }
    }
}

/// Output grouping of a control, fixed across all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlGroup {
    User,
    Camera,
}

impl ControlGroup {
    /// Fixed classification table: pan/tilt/roll/zoom/focus* belong to the
    /// Camera group, everything else is a User control. Every backend uses
    /// this so grouping is identical on every platform.
    pub fn classify(name: &str) -> Self {
        if matches!(name, "pan" | "tilt" | "roll" | "zoom") || name.starts_with("focus") {
            ControlGroup::Camera
        } else {
            ControlGroup::User
        }
    }
}

/// One adjustable or readable device parameter.
///
/// A `ControlInfo` is a snapshot owned by the caller; a set operation returns
/// a fresh post-set snapshot rather than mutating the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlInfo {
    /// Canonical lowercase identifier, e.g. `brightness` or `focus_automatic`.
    pub name: String,
    pub kind: ControlKind,
    pub min: i64,
    pub max: i64,
    pub step: i64,
    pub default: i64,
    pub current_value: Option<i64>,
    pub group: ControlGroup,
    /// Whether the backend believes a set operation is possible. Not a
    /// guarantee that it will succeed.
    pub writable: bool,
}

impl ControlInfo {
    pub fn integer(name: impl Into<String>, min: i64, max: i64, step: i64, default: i64) -> Self {
        let name = name.into();
        let group = ControlGroup::classify(&name);
        Self {
            name,
            kind: ControlKind::Integer,
            min,
            max,
            step,
            default,
            current_value: None,
            group,
            writable: true,
        }
    }

    /// Boolean controls always report `min=0 max=1 step=1`.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        let name = name.into();
        let group = ControlGroup::classify(&name);
        Self {
            name,
            kind: ControlKind::Boolean,
            min: 0,
            max: 1,
            step: 1,
            default: default as i64,
            current_value: None,
            group,
            writable: true,
        }
    }

    pub fn menu(name: impl Into<String>, min: i64, max: i64, default: i64) -> Self {
        let name = name.into();
        let group = ControlGroup::classify(&name);
        Self {
            name,
            kind: ControlKind::Menu,
            min,
            max,
            step: 1,
            default,
            current_value: None,
            group,
            writable: true,
        }
    }

    pub fn with_value(mut self, value: i64) -> Self {
        self.current_value = Some(value);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// One operation a backend may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capability {
    Enumerate,
    ListFormats,
    ListControls,
    GetControl,
    SetControl,
}

/// Per-backend declaration of supported operations.
///
/// Absence of a capability is a first-class, queryable fact; the facade
/// checks here before calling so "not supported on this platform" never
/// surfaces as a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub enumerate: bool,
    pub list_formats: bool,
    pub list_controls: bool,
    pub get_control: bool,
    pub set_control: bool,
}

impl CapabilitySet {
    /// Every operation supported (the native platform backends).
    pub const fn full() -> Self {
        Self {
            enumerate: true,
            list_formats: true,
            list_controls: true,
            get_control: true,
            set_control: true,
        }
    }

    /// Enumeration and format listing only (the fallback backend).
    pub const fn enumeration_only() -> Self {
        Self {
            enumerate: true,
            list_formats: true,
            list_controls: false,
            get_control: false,
            set_control: false,
        }
    }

    pub fn supports(&self, cap: Capability) -> bool {
        match cap {
            Capability::Enumerate => self.enumerate,
            Capability::ListFormats => self.list_formats,
            Capability::ListControls => self.list_controls,
            Capability::GetControl => self.get_control,
            Capability::SetControl => self.set_control,
        }
    }
}
