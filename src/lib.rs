//! vidctl: cross-platform `v4l2-ctl` compatible video device control
//!
//! This crate provides one polymorphic device-control contract across
//! Windows (DirectShow), Linux (V4L2) and macOS (AVFoundation), and renders
//! results in the exact text layout `v4l2-ctl` consumers expect.
//!
//! # Features
//! - Device enumeration with multi-interface disambiguation
//! - Format listing (pixel format, frame size, frame rate)
//! - Control get/set with verified writes (no silent fake success)
//! - User/Camera control grouping identical on every platform
//! - Per-invocation result caching for repeated queries
//!
//! # Usage
//! ```rust,no_run
//! use vidctl::DeviceController;
//!
//! fn main() -> Result<(), vidctl::ControlError> {
//!     let mut ctl = DeviceController::new()?;
//!     for device in ctl.list_devices()? {
//!         println!("{} ({})", device.display_name, device.id);
//!     }
//!     Ok(())
//! }
//! ```
pub mod backend;
pub mod cache;
pub mod controller;
pub mod errors;
pub mod output;
pub mod types;

// Re-exports for convenience
pub use controller::DeviceController;
pub use errors::ControlError;
pub use types::{
    Capability, CapabilitySet, ControlGroup, ControlInfo, ControlKind, DeviceInfo, FormatInfo,
};

/// Initialize logging for the control layer.
///
/// Diagnostics go to stderr via the logger; stdout is reserved for the
/// v4l2-ctl protocol surface.
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "vidctl=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
