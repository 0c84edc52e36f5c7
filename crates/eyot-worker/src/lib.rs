//! Worker abstraction: long-lived computation units that consume
//! batches of fixed-size elements and emit results.
//!
//! Three implementations share the [`Worker`] trait: [`cpu::CpuWorker`]
//! runs a per-item Rust closure on a background thread, [`gpu::GpuWorker`]
//! dispatches the same batch shape as an OpenCL kernel enqueue, and
//! [`pipeline::Pipeline`] chains two workers so the output of one feeds
//! the input of the next.

pub mod cpu;
pub mod error;
pub mod gpu;
pub mod pipeline;

use eyot_gc::GcRegion;
use eyot_vector::Vector;

pub use cpu::CpuWorker;
pub use error::WorkerError;
pub use gpu::{check_cl, init_opencl, GpuWorker};
pub use pipeline::Pipeline;

/// A function invoked once per input element on a CPU worker's
/// background thread. `user_ctx` is the byte-copy of the context
/// supplied at worker construction (see [`cpu::CpuWorker::new`]).
pub trait WorkerFunction: Send + Sync {
    fn call(&self, input: &[u8], output: &mut [u8], user_ctx: &[u8]);
}

/// The common surface every worker variant exposes: push a batch in,
/// pull results out one at a time or all at once.
///
/// `send`/`receive` pairs are owed: every element pushed by `send` must
/// eventually be retrieved by exactly one `receive` or swept up by
/// `drain`. Receiving when nothing is owed is fatal (an invariant
/// violation by the generated program, not a recoverable condition).
pub trait Worker: Send + Sync {
    /// Declared output element size in bytes; 0 means a void worker.
    fn output_size(&self) -> i32;

    /// Push every element of `values` (an `eyot_vector::Vector` of this
    /// worker's input element size) onto the worker's input.
    fn send(&self, region: &GcRegion, values: Vector);

    /// Block for exactly one result, copying `self.output_size()` bytes
    /// into `out`. Fatal if the worker owes nothing. `region` is unused
    /// by the CPU and GPU variants but kept on every variant's surface
    /// so a [`pipeline::Pipeline`] can lazily bridge its upstream worker
    /// without separately threading a region handle through.
    fn receive(&self, region: &GcRegion, out: *mut u8);

    /// Block until every currently-owed result has arrived, returning
    /// them as a freshly allocated vector (or `None` for a void worker).
    fn drain(&self, region: &GcRegion) -> Option<Vector>;
}
