//! A single enqueued unit of GPU work: device buffers plus the host
//! mirror of its results.

use ocl::{Buffer, Event};

pub(crate) struct WorkBatch {
    /// Device input buffer. Kept alive until the batch is popped so its
    /// `Drop` releases the underlying `cl_mem` exactly once — the
    /// original's `clworker_pop_batch` double-released the shared log
    /// buffer on the closure path; letting `ocl::Buffer`'s own `Drop`
    /// own the release sidesteps that class of bug entirely.
    pub input: Buffer<u8>,
    pub output: Buffer<u8>,
    /// Host copy of this batch's output, `output_size * count` bytes.
    pub results: Vec<u8>,
    /// Signalled once the kernel, the result read-back and the log
    /// read-back have all completed.
    pub done: Event,
    pub count: usize,
    /// Negative until the first `receive` on this batch; thereafter the
    /// index of the next unread element.
    pub read_index: i64,
}
