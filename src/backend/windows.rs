//! Windows backend speaking DirectShow over COM.
//!
//! Devices are enumerated through the system device enumerator
//! (`CLSID_SystemDeviceEnum` / video input category); controls go through the
//! filter's `IAMVideoProcAmp` and `IAMCameraControl` property sets. COM is
//! initialized once per backend instance and uninitialized on drop; every
//! interface pointer is scoped to the call that acquired it.

use std::ffi::c_void;
use std::mem::ManuallyDrop;

use windows::core::{Interface, PCWSTR};
use windows::Win32::Media::DirectShow::{
    IAMCameraControl, IAMStreamConfig, IAMVideoProcAmp, IBaseFilter, ICaptureGraphBuilder2,
    ICreateDevEnum, CLSID_CaptureGraphBuilder2, CLSID_SystemDeviceEnum,
    CLSID_VideoInputDeviceCategory, PIN_CATEGORY_CAPTURE, VIDEOINFOHEADER,
};
use windows::Win32::Media::MediaFoundation::{AM_MEDIA_TYPE, FORMAT_VideoInfo, MEDIATYPE_Video};
use windows::Win32::System::Com::StructuredStorage::IPropertyBag;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, IMoniker,
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED,
};
use windows::Win32::System::Variant::{VariantToStringAlloc, VARIANT};

use crate::backend::{validate_request, verify_write, VideoBackend};
use crate::errors::ControlError;
use crate::types::{CapabilitySet, ControlInfo, DeviceInfo, FormatInfo};

// Property indices from strmif.h. VideoProcAmp properties surface as User
// controls, CameraControl properties as Camera controls.
const VPA_BRIGHTNESS: i32 = 0;
const VPA_CONTRAST: i32 = 1;
const VPA_HUE: i32 = 2;
const VPA_SATURATION: i32 = 3;
const VPA_SHARPNESS: i32 = 4;
const VPA_GAMMA: i32 = 5;
const VPA_WHITE_BALANCE: i32 = 7;
const VPA_BACKLIGHT_COMPENSATION: i32 = 8;
const VPA_GAIN: i32 = 9;

const CC_PAN: i32 = 0;
const CC_TILT: i32 = 1;
const CC_ROLL: i32 = 2;
const CC_ZOOM: i32 = 3;
const CC_EXPOSURE: i32 = 4;
const CC_IRIS: i32 = 5;
const CC_FOCUS: i32 = 6;

// CameraControl_Flags_Manual == VideoProcAmp_Flags_Manual == 2
const FLAGS_MANUAL: i32 = 2;

const PROC_AMP_TABLE: &[(i32, &str)] = &[
    (VPA_BRIGHTNESS, "brightness"),
    (VPA_CONTRAST, "contrast"),
    (VPA_SATURATION, "saturation"),
    (VPA_HUE, "hue"),
    (VPA_GAMMA, "gamma"),
    (VPA_GAIN, "gain"),
    (VPA_SHARPNESS, "sharpness"),
    (VPA_BACKLIGHT_COMPENSATION, "backlight_compensation"),
    (VPA_WHITE_BALANCE, "white_balance_temperature"),
];

const CAMERA_TABLE: &[(i32, &str)] = &[
    (CC_EXPOSURE, "exposure"),
    (CC_IRIS, "iris"),
    (CC_FOCUS, "focus"),
    (CC_ZOOM, "zoom"),
    (CC_PAN, "pan"),
    (CC_TILT, "tilt"),
    (CC_ROLL, "roll"),
];

enum PropertySet {
    ProcAmp(i32),
    Camera(i32),
}

fn property_for(name: &str) -> Option<PropertySet> {
    if let Some((prop, _)) = PROC_AMP_TABLE.iter().find(|(_, n)| *n == name) {
        return Some(PropertySet::ProcAmp(*prop));
    }
    CAMERA_TABLE
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(prop, _)| PropertySet::Camera(*prop))
}

/// Pairs `CoInitializeEx` with `CoUninitialize` on every exit path; the CLI
/// is run in tight loops by scripts, so leaking COM state across repeated
/// enumerations is a correctness bug.
struct ComGuard;

impl ComGuard {
    fn new() -> Result<Self, ControlError> {
        // S_FALSE (already initialized on this thread) is fine.
        let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
        if hr.is_err() {
            return Err(ControlError::BackendUnavailable(format!(
                "COM initialization failed: {hr}"
            )));
        }
        Ok(ComGuard)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

pub struct WindowsBackend {
    _com: ComGuard,
}

impl WindowsBackend {
    pub fn new() -> Result<Self, ControlError> {
        Ok(WindowsBackend {
            _com: ComGuard::new()?,
        })
    }

    fn device_enumerator() -> Result<ICreateDevEnum, ControlError> {
        unsafe { CoCreateInstance(&CLSID_SystemDeviceEnum, None, CLSCTX_INPROC_SERVER) }.map_err(
            |e| ControlError::BackendUnavailable(format!("system device enumerator: {e}")),
        )
    }

    fn read_bag_string(bag: &IPropertyBag, property: &str) -> Option<String> {
        let wide: Vec<u16> = property.encode_utf16().chain(std::iter::once(0)).collect();
        let mut variant = VARIANT::default();
        unsafe {
            bag.Read(PCWSTR(wide.as_ptr()), &mut variant, None).ok()?;
            let pwstr = VariantToStringAlloc(&variant).ok()?;
            let value = pwstr.to_string().ok();
            CoTaskMemFree(Some(pwstr.as_ptr() as *const c_void));
            value
        }
    }

    /// Walk the video input monikers, yielding the property bag and moniker
    /// for each device.
    fn for_each_moniker<T>(
        mut visit: impl FnMut(&IMoniker, &IPropertyBag) -> Option<T>,
    ) -> Result<Option<T>, ControlError> {
        let dev_enum = Self::device_enumerator()?;
        let mut enum_moniker = None;
        unsafe {
            dev_enum
                .CreateClassEnumerator(&CLSID_VideoInputDeviceCategory, &mut enum_moniker, 0)
                .map_err(|e| {
                    ControlError::BackendUnavailable(format!("video input enumerator: {e}"))
                })?;
        }
        // No devices in the category yields no enumerator at all.
        let Some(enum_moniker) = enum_moniker else {
            return Ok(None);
        };

        loop {
            let mut monikers: [Option<IMoniker>; 1] = [None];
            let mut fetched = 0u32;
            let hr = unsafe { enum_moniker.Next(&mut monikers, Some(&mut fetched)) };
            if hr.is_err() || fetched == 0 {
                break;
            }
            let Some(moniker) = monikers[0].take() else {
                break;
            };
            let bag: IPropertyBag = match unsafe { moniker.BindToStorage(None, None) } {
                Ok(bag) => bag,
                Err(_) => continue,
            };
            if let Some(result) = visit(&moniker, &bag) {
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// Derive a vendor/product descriptor and interface index from the PnP
    /// device path, e.g. `\\?\usb#vid_046d&pid_082d&mi_00#...` becomes
    /// `usb#vid_046d&pid_082d` with interface 0.
    fn parse_device_path(path: &str) -> (String, u32) {
        let trimmed = path.trim_start_matches("\\\\?\\");
        let instance = trimmed.split('#').take(2).collect::<Vec<_>>().join("#");
        let mut interface_index = 0;
        let mut bus_parts = Vec::new();
        for part in instance.split('&') {
            if let Some(hex) = part.strip_prefix("mi_") {
                interface_index = u32::from_str_radix(hex, 16).unwrap_or(0);
            } else {
                bus_parts.push(part);
            }
        }
        (bus_parts.join("&"), interface_index)
    }

    fn bind_filter(device_id: &str) -> Result<IBaseFilter, ControlError> {
        let found = Self::for_each_moniker(|moniker, bag| {
            let path = Self::read_bag_string(bag, "DevicePath")
                .or_else(|| Self::read_bag_string(bag, "FriendlyName"))?;
            if path != device_id {
                return None;
            }
            unsafe { moniker.BindToObject::<IBaseFilter>(None, None) }.ok()
        })?;
        found.ok_or_else(|| ControlError::DeviceNotFound(device_id.to_string()))
    }

    fn query_range(
        filter: &IBaseFilter,
        name: &str,
        prop: &PropertySet,
    ) -> Option<ControlInfo> {
        let (mut min, mut max, mut step, mut default, mut flags) = (0i32, 0i32, 0i32, 0i32, 0i32);
        let ok = unsafe {
            match prop {
                PropertySet::ProcAmp(p) => {
                    let amp: IAMVideoProcAmp = filter.cast().ok()?;
                    amp.GetRange(*p, &mut min, &mut max, &mut step, &mut default, &mut flags)
                        .is_ok()
                }
                PropertySet::Camera(p) => {
                    let cam: IAMCameraControl = filter.cast().ok()?;
                    cam.GetRange(*p, &mut min, &mut max, &mut step, &mut default, &mut flags)
                        .is_ok()
                }
            }
        };
        if !ok {
            return None;
        }
        let mut ctrl = ControlInfo::integer(
            name,
            min as i64,
            max as i64,
            (step as i64).max(1),
            default as i64,
        );
        if let Some(value) = Self::read_value(filter, prop) {
            ctrl.current_value = Some(value);
        }
        Some(ctrl)
    }

    fn read_value(filter: &IBaseFilter, prop: &PropertySet) -> Option<i64> {
        let (mut value, mut flags) = (0i32, 0i32);
        let ok = unsafe {
            match prop {
                PropertySet::ProcAmp(p) => {
                    let amp: IAMVideoProcAmp = filter.cast().ok()?;
                    amp.Get(*p, &mut value, &mut flags).is_ok()
                }
                PropertySet::Camera(p) => {
                    let cam: IAMCameraControl = filter.cast().ok()?;
                    cam.Get(*p, &mut value, &mut flags).is_ok()
                }
            }
        };
        ok.then_some(value as i64)
    }

    fn write_value(
        filter: &IBaseFilter,
        prop: &PropertySet,
        value: i64,
    ) -> Result<(), windows::core::Error> {
        unsafe {
            match prop {
                PropertySet::ProcAmp(p) => {
                    let amp: IAMVideoProcAmp = filter.cast()?;
                    amp.Set(*p, value as i32, FLAGS_MANUAL)
                }
                PropertySet::Camera(p) => {
                    let cam: IAMCameraControl = filter.cast()?;
                    cam.Set(*p, value as i32, FLAGS_MANUAL)
                }
            }
        }
    }

    /// Obtain the capture pin's `IAMStreamConfig` through a capture graph
    /// builder, the documented route to stream capabilities.
    fn stream_config(filter: &IBaseFilter) -> Result<IAMStreamConfig, ControlError> {
        unsafe {
            let builder: ICaptureGraphBuilder2 =
                CoCreateInstance(&CLSID_CaptureGraphBuilder2, None, CLSCTX_INPROC_SERVER)
                    .map_err(|e| {
                        ControlError::BackendUnavailable(format!("capture graph builder: {e}"))
                    })?;
            let mut raw: *mut c_void = std::ptr::null_mut();
            builder
                .FindInterface(
                    Some(&PIN_CATEGORY_CAPTURE as *const _),
                    Some(&MEDIATYPE_Video as *const _),
                    filter,
                    &IAMStreamConfig::IID,
                    &mut raw,
                )
                .map_err(|e| {
                    ControlError::UnsupportedOperation(format!(
                        "device exposes no stream configuration: {e}"
                    ))
                })?;
            Ok(IAMStreamConfig::from_raw(raw))
        }
    }

    /// Render `biCompression` as a fourcc tag. BI_RGB (0) and BI_BITFIELDS
    /// (3) carry no fourcc; everything else is four ASCII bytes.
    fn compression_tag(compression: u32) -> String {
        let bytes = compression.to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic()) {
            String::from_utf8_lossy(&bytes).into_owned()
        } else if compression == 0 || compression == 3 {
            "RGB".to_string()
        } else {
            format!("{compression:#010X}")
        }
    }

    /// Counterpart of the SDK's `DeleteMediaType`: free the format block,
    /// release `pUnk`, then free the structure itself.
    unsafe fn free_media_type(mt: *mut AM_MEDIA_TYPE) {
        if mt.is_null() {
            return;
        }
        let media = &mut *mt;
        if !media.pbFormat.is_null() {
            CoTaskMemFree(Some(media.pbFormat as *const c_void));
            media.pbFormat = std::ptr::null_mut();
        }
        ManuallyDrop::drop(&mut media.pUnk);
        CoTaskMemFree(Some(mt as *const c_void));
    }

    fn snapshot(filter: &IBaseFilter, name: &str) -> Result<ControlInfo, ControlError> {
        let prop = property_for(name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("unknown control '{name}'"))
        })?;
        Self::query_range(filter, name, &prop).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("control '{name}' not available"))
        })
    }
}

impl VideoBackend for WindowsBackend {
    fn name(&self) -> &'static str {
        "directshow"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, ControlError> {
        let mut devices = Vec::new();
        Self::for_each_moniker(|_, bag| -> Option<()> {
            let name =
                Self::read_bag_string(bag, "FriendlyName").unwrap_or_else(|| "Unknown".into());
            let path = Self::read_bag_string(bag, "DevicePath").unwrap_or_else(|| name.clone());
            let (bus_info, interface_index) = Self::parse_device_path(&path);
            devices.push(
                DeviceInfo::new(path, name)
                    .with_bus_info(bus_info)
                    .with_interface_index(interface_index),
            );
            None // keep walking
        })?;
        Ok(devices)
    }

    fn list_formats(&self, device_id: &str) -> Result<Vec<FormatInfo>, ControlError> {
        let filter = Self::bind_filter(device_id)?;
        let config = Self::stream_config(&filter)?;

        let (mut count, mut caps_size) = (0i32, 0i32);
        unsafe {
            config
                .GetNumberOfCapabilities(&mut count, &mut caps_size)
                .map_err(|e| {
                    ControlError::UnsupportedOperation(format!("stream caps query failed: {e}"))
                })?;
        }
        if count <= 0 || caps_size <= 0 {
            return Ok(Vec::new());
        }

        // Scratch buffer for the VIDEO_STREAM_CONFIG_CAPS block each
        // GetStreamCaps call fills in alongside the media type.
        let mut caps_buf = vec![0u8; caps_size as usize];
        let mut formats: Vec<FormatInfo> = Vec::new();
        for index in 0..count {
            let mut mt: *mut AM_MEDIA_TYPE = std::ptr::null_mut();
            let fetched =
                unsafe { config.GetStreamCaps(index, &mut mt, caps_buf.as_mut_ptr()) }.is_ok();
            if !fetched || mt.is_null() {
                continue;
            }
            unsafe {
                let media = &*mt;
                if media.majortype == MEDIATYPE_Video
                    && media.formattype == FORMAT_VideoInfo
                    && !media.pbFormat.is_null()
                    && media.cbFormat as usize >= std::mem::size_of::<VIDEOINFOHEADER>()
                {
                    let header = &*(media.pbFormat as *const VIDEOINFOHEADER);
                    let width = header.bmiHeader.biWidth.max(0) as u32;
                    // Top-down DIBs report a negative height.
                    let height = header.bmiHeader.biHeight.unsigned_abs();
                    let rate = if header.AvgTimePerFrame > 0 {
                        10_000_000.0 / header.AvgTimePerFrame as f64
                    } else {
                        30.0
                    };
                    let fmt = FormatInfo::new(
                        Self::compression_tag(header.bmiHeader.biCompression),
                        width,
                        height,
                        rate,
                    );
                    if width > 0 && height > 0 && !formats.contains(&fmt) {
                        formats.push(fmt);
                    }
                }
                Self::free_media_type(mt);
            }
        }
        Ok(formats)
    }

    fn list_controls(&self, device_id: &str) -> Result<Vec<ControlInfo>, ControlError> {
        let filter = Self::bind_filter(device_id)?;
        let mut controls = Vec::new();
        for (prop, name) in PROC_AMP_TABLE {
            if let Some(ctrl) = Self::query_range(&filter, name, &PropertySet::ProcAmp(*prop)) {
                controls.push(ctrl);
            }
        }
        for (prop, name) in CAMERA_TABLE {
            if let Some(ctrl) = Self::query_range(&filter, name, &PropertySet::Camera(*prop)) {
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
        let filter = Self::bind_filter(device_id)?;
        let before = Self::snapshot(&filter, name)?;
        validate_request(&before, value)?;

        let prop = property_for(name).ok_or_else(|| {
            ControlError::UnsupportedOperation(format!("unknown control '{name}'"))
        })?;
        Self::write_value(&filter, &prop, value).map_err(|e| {
            ControlError::ControlWriteRejected {
                name: name.to_string(),
                requested: value,
                actual: before.current_value,
                reason: format!("IAM Set failed: {e}"),
            }
        })?;

        // Drivers routinely acknowledge Set() and quietly keep the old value.
        let after = Self::snapshot(&filter, name)?;
        verify_write(value, after)
    }
}
