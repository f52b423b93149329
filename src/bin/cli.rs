//! vidctl command-line entry point.
//!
//! This layer owns argument parsing and device-path resolution; the control
//! core only ever sees a resolved device id and lexically valid
//! `(name, value)` pairs.

use std::env;
use std::process;

use vidctl::{ControlError, DeviceController};

const USAGE: &str = "\
Usage: vidctl [options]

General/Common options:
  -c, --set-ctrl <ctrl>=<val>[,<ctrl>=<val>...]
                     set the value of the controls
  -d, --device <dev> use device <dev> instead of /dev/video0
  -h, --help         display this help message
  -L, --list-ctrls-menus
                     display all controls and their menus
  --list-devices     list all video devices
  --list-formats-ext display supported video formats including frame sizes
                     and intervals
";

#[derive(Debug, PartialEq)]
enum Operation {
    ListDevices,
    ListFormats,
    ListControls,
    SetControls(Vec<(String, i64)>),
}

struct Args {
    device: String,
    operation: Operation,
}

fn main() {
    vidctl::init_logging();
    let raw: Vec<String> = env::args().skip(1).collect();
    process::exit(run(&raw));
}

fn run(raw: &[String]) -> i32 {
    let args = match parse_args(raw) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print!("{USAGE}");
            return 0;
        }
        Err(message) => {
            eprintln!("vidctl: {message}");
            eprint!("{USAGE}");
            return 1;
        }
    };

    let mut controller = match DeviceController::new() {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("vidctl: {e}");
            return 1;
        }
    };
    if controller.is_degraded() {
        log::warn!("running on the fallback backend; controls are unavailable");
    }

    match execute(&mut controller, &args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("vidctl: {e}");
            if e.is_permanent() {
                eprintln!("vidctl: this operation is not supported on this platform; retrying will not help");
            }
            1
        }
    }
}

fn execute(controller: &mut DeviceController, args: &Args) -> Result<(), ControlError> {
    match &args.operation {
        Operation::ListDevices => {
            let devices = controller.list_devices()?;
            print!("{}", vidctl::output::render_devices(&devices));
            Ok(())
        }
        Operation::ListFormats => {
            let device_id = resolve_device(controller, &args.device)?;
            let formats = controller.list_formats(&device_id)?;
            print!("{}", vidctl::output::render_formats(&formats));
            Ok(())
        }
        Operation::ListControls => {
            let device_id = resolve_device(controller, &args.device)?;
            let controls = controller.list_controls(&device_id)?;
            print!("{}", vidctl::output::render_controls(&controls));
            Ok(())
        }
        Operation::SetControls(settings) => {
            let device_id = resolve_device(controller, &args.device)?;
            // Sequential; the first failure aborts the rest, and everything
            // that already succeeded has been reported.
            for (name, value) in settings {
                let applied = controller.set_control(&device_id, name, *value)?;
                println!(
                    "{} = {}",
                    applied.name,
                    applied.current_value.unwrap_or(*value)
                );
            }
            Ok(())
        }
    }
}

/// Resolve a device selector to an enumerated device id.
///
/// Accepts a literal id, a `/dev/videoN` path, or a bare index into the
/// enumeration order. Unresolvable selectors pass through verbatim so the
/// backend reports `DeviceNotFound` with the original string.
fn resolve_device(
    controller: &mut DeviceController,
    selector: &str,
) -> Result<String, ControlError> {
    let devices = controller.list_devices()?;
    if devices.iter().any(|d| d.id == selector) {
        return Ok(selector.to_string());
    }
    let index: Option<usize> = selector
        .strip_prefix("/dev/video")
        .unwrap_or(selector)
        .parse()
        .ok();
    if let Some(index) = index {
        if let Some(device) = devices.get(index) {
            return Ok(device.id.clone());
        }
    }
    Ok(selector.to_string())
}

/// Parse the raw argument list. `Ok(None)` means help was requested.
fn parse_args(raw: &[String]) -> Result<Option<Args>, String> {
    let mut device = "/dev/video0".to_string();
    let mut operation: Option<Operation> = None;

    let mut set_operation = |op: Operation, operation: &mut Option<Operation>| {
        if operation.is_some() {
            return Err("only one operation may be given per invocation".to_string());
        }
        *operation = Some(op);
        Ok(())
    };

    let mut i = 0;
    while i < raw.len() {
        let arg = raw[i].as_str();
        match arg {
            "-h" | "--help" => return Ok(None),
            "--list-devices" => set_operation(Operation::ListDevices, &mut operation)?,
            "--list-formats-ext" => set_operation(Operation::ListFormats, &mut operation)?,
            "-L" | "--list-ctrls-menus" => {
                set_operation(Operation::ListControls, &mut operation)?
            }
            "-d" | "--device" => {
                i += 1;
                device = raw
                    .get(i)
                    .ok_or_else(|| format!("{arg} requires an argument"))?
                    .clone();
            }
            "-c" | "--set-ctrl" => {
                i += 1;
                let list = raw
                    .get(i)
                    .ok_or_else(|| format!("{arg} requires an argument"))?;
                set_operation(Operation::SetControls(parse_settings(list)?), &mut operation)?;
            }
            _ => {
                if let Some(value) = arg.strip_prefix("--device=") {
                    device = value.to_string();
                } else if let Some(list) = arg.strip_prefix("--set-ctrl=") {
                    set_operation(
                        Operation::SetControls(parse_settings(list)?),
                        &mut operation,
                    )?;
                } else {
                    return Err(format!("unknown option '{arg}'"));
                }
            }
        }
        i += 1;
    }

    match operation {
        Some(operation) => Ok(Some(Args { device, operation })),
        None => Err("no operation given".to_string()),
    }
}

/// Lexically parse `name=value[,name=value...]`. Numeric parsing happens
/// here, never in the core.
fn parse_settings(list: &str) -> Result<Vec<(String, i64)>, String> {
    let mut settings = Vec::new();
    for part in list.split(',') {
        let (name, value) = part
            .split_once('=')
            .ok_or_else(|| format!("invalid control setting '{part}' (expected name=value)"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("invalid control setting '{part}' (empty name)"));
        }
        let value: i64 = value
            .trim()
            .parse()
            .map_err(|_| format!("invalid control value '{}' for '{name}'", value.trim()))?;
        settings.push((name.to_string(), value));
    }
    Ok(settings)
}
