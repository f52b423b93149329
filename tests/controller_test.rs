//! Controller facade tests against a scripted in-memory backend.
//!
//! The mock counts every native call so caching and validation behavior can
//! be asserted exactly: repeated queries must not touch the backend, and
//! locally rejected writes must reach it zero times.

use std::cell::RefCell;
use std::rc::Rc;

use vidctl::backend::{validate_request, verify_write, VideoBackend};
use vidctl::{
    Capability, CapabilitySet, ControlError, ControlInfo, DeviceController, DeviceInfo,
    FormatInfo,
};

#[derive(Default)]
struct CallCounts {
    enumerate: u32,
    list_formats: u32,
    list_controls: u32,
    set_control: u32,
}

struct MockState {
    calls: CallCounts,
    controls: Vec<ControlInfo>,
}

/// In-memory backend over one physical camera exposing two logical paths
/// ("mock0" for capture, "mock1" for metadata) on the same bus. `sharpness`
/// silently clamps writes to 50, mimicking firmware that accepts a value and
/// stores something else.
struct MockBackend {
    state: Rc<RefCell<MockState>>,
    capabilities: CapabilitySet,
}

impl MockBackend {
    fn new() -> (Self, Rc<RefCell<MockState>>) {
        let controls = vec![
            ControlInfo::integer("brightness", 0, 255, 1, 128).with_value(128),
            ControlInfo::integer("pan", -36000, 36000, 3600, 0).with_value(0),
            ControlInfo::integer("sharpness", 0, 100, 1, 25).with_value(25),
            ControlInfo::boolean("white_balance_automatic", true).with_value(1),
            ControlInfo::integer("exposure", 0, 1000, 1, 250)
                .with_value(250)
                .read_only(),
        ];
        let state = Rc::new(RefCell::new(MockState {
            calls: CallCounts::default(),
            controls,
        }));
        let backend = MockBackend {
            state: Rc::clone(&state),
            capabilities: CapabilitySet::full(),
        };
        (backend, state)
    }

    fn enumeration_only() -> Self {
        let (mut backend, _) = Self::new();
        backend.capabilities = CapabilitySet::enumeration_only();
        backend
    }

    fn check_device(&self, device_id: &str) -> Result<(), ControlError> {
        if device_id == "mock0" || device_id == "mock1" {
            Ok(())
        } else {
            Err(ControlError::DeviceNotFound(device_id.to_string()))
        }
    }
}

impl VideoBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ControlError> {
        self.state.borrow_mut().calls.enumerate += 1;
        Ok(vec![
            DeviceInfo::new("mock0", "Mock Camera").with_bus_info("usb-mock:1.0"),
            DeviceInfo::new("mock1", "Mock Camera")
                .with_bus_info("usb-mock:1.0")
                .with_interface_index(1),
        ])
    }

    fn list_formats(&self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError> {
        self.state.borrow_mut().calls.list_formats += 1;
        self.check_device(device_id)?;
        Ok(vec![
            FormatInfo::new("MJPG", 1920, 1080, 30.0),
            FormatInfo::new("YUYV", 640, 480, 30.0),
        ])
    }

    fn list_controls(&self, device_id: &str) -> Result<Vec<ControlInfo>, ControlError> {
        self.check_device(device_id)?;
        let mut state = self.state.borrow_mut();
        state.calls.list_controls += 1;
        Ok(state.controls.clone())
    }

    fn set_control(
        &mut self,
        device_id: &str,
        name: &str,
        value: i64,
    ) -> Result<ControlInfo, ControlError> {
        self.check_device(device_id)?;

        let before = {
            let state = self.state.borrow();
            state
                .controls
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or_else(|| {
                    ControlError::UnsupportedOperation(format!("control '{name}' not available"))
                })?
        };
        validate_request(&before, value)?;

        let mut state = self.state.borrow_mut();
        state.calls.set_control += 1;
        let stored = if name == "sharpness" { value.min(50) } else { value };
        let ctrl = state
            .controls
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| {
                ControlError::UnsupportedOperation(format!("control '{name}' not available"))
            })?;
        ctrl.current_value = Some(stored);
        let after = ctrl.clone();
        drop(state);

        verify_write(value, after)
    }
}

#[test]
fn test_multi_interface_camera_enumerates_as_distinct_entries() {
    let (backend, _) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));
    let devices = ctl.list_devices().unwrap();

    // One physical camera with two logical paths: exactly two entries, ids
    // never deduplicated, same bus descriptor.
    assert_eq!(devices.len(), 2);
    for (i, a) in devices.iter().enumerate() {
        for b in &devices[i + 1..] {
            assert_ne!(a.id, b.id);
        }
    }
    assert_eq!(devices[0].bus_info, devices[1].bus_info);
    assert_eq!(devices[0].display_name, devices[1].display_name);
    assert_ne!(devices[0].interface_index, devices[1].interface_index);
}

#[test]
fn test_repeated_queries_hit_cache() {
    let (backend, state) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    let first = ctl.list_controls("mock0").unwrap();
    let second = ctl.list_controls("mock0").unwrap();
    assert_eq!(first, second);
    assert_eq!(state.borrow().calls.list_controls, 1);

    ctl.list_formats("mock0").unwrap();
    ctl.list_formats("mock0").unwrap();
    assert_eq!(state.borrow().calls.list_formats, 1);

    let stats = ctl.cache_stats();
    assert_eq!(stats.hits, 2);
}

#[test]
fn test_set_then_list_reflects_new_value() {
    let (backend, state) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    ctl.list_controls("mock0").unwrap();
    let applied = ctl.set_control("mock0", "brightness", 60).unwrap();
    assert_eq!(applied.current_value, Some(60));

    // The write invalidated the cached control list, so this re-reads.
    let brightness = ctl.get_control("mock0", "brightness").unwrap();
    assert_eq!(brightness.current_value, Some(60));
    assert_eq!(state.borrow().calls.list_controls, 2);
}

#[test]
fn test_clamped_write_is_rejected_with_actual_value() {
    let (backend, _) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    let err = ctl.set_control("mock0", "sharpness", 90).unwrap_err();
    match err {
        ControlError::ControlWriteRejected {
            requested, actual, ..
        } => {
            assert_eq!(requested, 90);
            assert_eq!(actual, Some(50));
        }
        other => panic!("expected ControlWriteRejected, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_write_never_reaches_hardware() {
    let (backend, state) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    let err = ctl.set_control("mock0", "brightness", 300).unwrap_err();
    assert!(matches!(err, ControlError::OutOfRange { .. }));

    // 3600-step control; 100 is off the grid.
    let err = ctl.set_control("mock0", "pan", 100).unwrap_err();
    match err {
        ControlError::OutOfRange { step, .. } => assert_eq!(step, 3600),
        other => panic!("expected OutOfRange, got {other:?}"),
    }

    assert_eq!(state.borrow().calls.set_control, 0);
}

#[test]
fn test_read_only_control_rejects_writes_locally() {
    let (backend, state) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    let err = ctl.set_control("mock0", "exposure", 100).unwrap_err();
    assert!(matches!(err, ControlError::UnsupportedOperation(_)));
    assert_eq!(state.borrow().calls.set_control, 0);
}

#[test]
fn test_set_invalidates_only_control_cache() {
    let (backend, state) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    ctl.list_devices().unwrap();
    ctl.list_formats("mock0").unwrap();
    ctl.list_controls("mock0").unwrap();
    ctl.set_control("mock0", "brightness", 42).unwrap();

    ctl.list_devices().unwrap();
    ctl.list_formats("mock0").unwrap();
    ctl.list_controls("mock0").unwrap();

    let calls = &state.borrow().calls;
    assert_eq!(calls.enumerate, 1);
    assert_eq!(calls.list_formats, 1);
    assert_eq!(calls.list_controls, 2);
}

#[test]
fn test_capability_gate_blocks_unsupported_operations() {
    let backend = MockBackend::enumeration_only();
    let state = Rc::clone(&backend.state);
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    assert!(ctl.list_devices().is_ok());
    assert!(matches!(
        ctl.list_controls("mock0").unwrap_err(),
        ControlError::UnsupportedOperation(_)
    ));
    assert!(matches!(
        ctl.set_control("mock0", "brightness", 10).unwrap_err(),
        ControlError::UnsupportedOperation(_)
    ));

    // The gate fires before the backend is consulted.
    let calls = &state.borrow().calls;
    assert_eq!(calls.list_controls, 0);
    assert_eq!(calls.set_control, 0);
}

#[test]
fn test_unknown_device_propagates_not_found() {
    let (backend, _) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    let err = ctl.list_controls("mock9").unwrap_err();
    assert!(matches!(err, ControlError::DeviceNotFound(_)));
}

#[test]
fn test_unknown_control_is_unsupported() {
    let (backend, _) = MockBackend::new();
    let mut ctl = DeviceController::with_backend(Box::new(backend));

    let err = ctl.get_control("mock0", "led_mode").unwrap_err();
    assert!(matches!(err, ControlError::UnsupportedOperation(_)));
}

#[test]
fn test_capability_gate_is_not_degraded_mode() {
    let (backend, _) = MockBackend::new();
    let ctl = DeviceController::with_backend(Box::new(backend));
    assert!(!ctl.is_degraded());
    assert_eq!(ctl.backend_name(), "mock");
    assert!(ctl.cache_stats().hits == 0 && ctl.cache_stats().misses == 0);
}

#[test]
fn test_helpers_agree_with_capability_set() {
    let full = CapabilitySet::full();
    for cap in [
        Capability::Enumerate,
        Capability::ListFormats,
        Capability::ListControls,
        Capability::GetControl,
        Capability::SetControl,
    ] {
        assert!(full.supports(cap));
    }
    let reduced = CapabilitySet::enumeration_only();
    assert!(reduced.supports(Capability::Enumerate));
    assert!(!reduced.supports(Capability::SetControl));
}
