//! GPU worker: dispatches CPU-worker-shaped work onto an OpenCL device
//! through the kernel argument ABI fixed in the runtime core
//! specification.

mod batch;
mod driver;
mod shared;
mod worker;

pub use driver::{check_cl, init_opencl};
pub use worker::GpuWorker;
