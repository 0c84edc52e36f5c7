use thiserror::Error;

/// Errors surfaced by the worker layer. Every variant here is fatal: the
/// contracts it guards (send/receive balance, GPU driver availability)
/// are invariants the generated program or host environment must
/// uphold, matching the taxonomy in the runtime core specification.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("received from a worker that owes nothing")]
    NothingOwed,

    #[error("gpu support was not initialised (init_opencl was never called or disabled it)")]
    GpuUnavailable,

    #[error("opencl call failed: {0}")]
    GpuRuntime(String),

    #[error("opencl kernel build failed: {0}")]
    GpuBuildFailure(String),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
