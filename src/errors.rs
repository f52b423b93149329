use thiserror::Error;

/// Error taxonomy for the device-control layer.
///
/// No variant is retried automatically: native camera APIs are not reliably
/// idempotent, and re-issuing a rejected control write can toggle hardware
/// state unexpectedly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// The native subsystem could not be initialized at all (COM init
    /// failure, missing device node permissions, ...). Fatal for the
    /// backend; the facade falls back once and never retries within a run.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The device id does not match any currently enumerable device.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The operation is a declared capability gap, not a failure.
    #[error("not supported: {0}")]
    UnsupportedOperation(String),

    /// Local validation failed; no native call was made.
    #[error("value {value} out of range for '{name}' (min={min} max={max} step={step})")]
    OutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
        step: i64,
    },

    /// The native call was made but the driver rejected or silently ignored
    /// it. Carries the post-write re-read value so the caller sees exactly
    /// what the hardware ended up with.
    #[error("control write rejected for '{name}': {reason} (requested={requested}, actual={actual:?})")]
    ControlWriteRejected {
        name: String,
        requested: i64,
        actual: Option<i64>,
        reason: String,
    },
}

impl ControlError {
    /// Whether retrying the same request is pointless.
    ///
    /// Permanent errors are capability gaps or caller mistakes; the rest are
    /// environmental (stale ids, wedged subsystems, driver refusals) and may
    /// clear up between invocations.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ControlError::UnsupportedOperation(_) | ControlError::OutOfRange { .. }
        )
    }
}
