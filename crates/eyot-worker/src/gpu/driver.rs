//! Singleton OpenCL driver: one platform, one device, one compiled
//! program shared by every GPU worker.

use std::sync::OnceLock;

use log::{info, warn};
use ocl::{Context, Device, DeviceType, Platform, Program};

use crate::error::{Result, WorkerError};

pub(crate) struct ClDriver {
    pub context: Context,
    pub device: Device,
    pub program: Program,
}

static DRIVER: OnceLock<Option<ClDriver>> = OnceLock::new();

struct DriverConfig {
    disabled: bool,
    verbose: bool,
}

impl DriverConfig {
    fn from_env() -> DriverConfig {
        DriverConfig {
            disabled: std::env::var("EyotDisableCl").map(|v| v == "y").unwrap_or(false),
            verbose: std::env::var("EyotVerbose").map(|v| v == "y").unwrap_or(false),
        }
    }
}

/// Compile `src` as the single program backing every subsequent
/// [`crate::gpu::GpuWorker`]. An empty source disables GPU support for
/// the remainder of the process (subsequent worker construction is
/// fatal). Idempotent: only the first call's source is ever compiled.
pub fn init_opencl(src: &str) {
    DRIVER.get_or_init(|| build_driver(src));
}

/// True once a working driver has been initialised by [`init_opencl`].
pub fn check_cl() -> bool {
    DRIVER.get().map(|d| d.is_some()).unwrap_or(false)
}

pub(crate) fn driver() -> Result<&'static ClDriver> {
    match DRIVER.get() {
        Some(Some(driver)) => Ok(driver),
        _ => Err(WorkerError::GpuUnavailable),
    }
}

fn build_driver(src: &str) -> Option<ClDriver> {
    if src.is_empty() {
        return None;
    }

    let config = DriverConfig::from_env();
    if config.disabled {
        return None;
    }

    if config.verbose {
        info!("{src}");
    }

    let platforms = Platform::list();
    if platforms.is_empty() {
        // Expected-to-fail case: CL is installed but no platform is
        // registered. Stay quiet unless asked to be verbose.
        if config.verbose {
            warn!("no opencl platforms found");
        }
        return None;
    }
    let platform = platforms[0];

    if config.verbose {
        info!("opencl driver initialising, {} platform(s) found (choosing 0)", platforms.len());
        for (i, p) in platforms.iter().enumerate() {
            info!(
                "  {i}: {} {} {}",
                p.name().unwrap_or_default(),
                p.vendor().unwrap_or_default(),
                p.version().unwrap_or_default()
            );
        }
    }

    let devices = match Device::list(platform, Some(DeviceType::GPU)) {
        Ok(devices) => devices,
        Err(e) => {
            if config.verbose {
                warn!("clGetDeviceIDs failed: {e}");
            }
            return None;
        }
    };
    if devices.is_empty() {
        if config.verbose {
            warn!("no opencl gpu devices found");
        }
        return None;
    }
    let device = devices[0];

    let context = match Context::builder().platform(platform).devices(device).build() {
        Ok(context) => context,
        Err(e) => {
            warn!("clCreateContext failed: {e}");
            return None;
        }
    };

    let program = match Program::builder().devices(device).src(src).build(&context) {
        Ok(program) => program,
        Err(e) => {
            print_with_line_numbers(src);
            panic!("eyot-worker: {}", WorkerError::GpuBuildFailure(e.to_string()));
        }
    };

    Some(ClDriver { context, device, program })
}

fn print_with_line_numbers(src: &str) {
    for (i, line) in src.lines().enumerate() {
        eprintln!("{}: {}", i + 1, line);
    }
}
