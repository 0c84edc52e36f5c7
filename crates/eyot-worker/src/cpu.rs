//! A worker backed by a single long-lived background thread.
//!
//! The outer [`CpuWorker`] handle is what the generated program holds;
//! [`CpuWorkerInner`] is the state the background thread actually reads
//! and writes, kept alive for the thread's lifetime by its own `Arc`
//! clone. Dropping the outer handle closes the input pipe (the thread
//! drains whatever is still queued and exits) and joins it — the
//! explicit outer-to-inner reference the original's pointer-cast
//! finaliser trick was standing in for.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use eyot_gc::GcRegion;
use eyot_pipe::Pipe;
use eyot_vector::Vector;
use parking_lot::Mutex;

use crate::error::WorkerError;
use crate::{Worker, WorkerFunction};

struct CpuWorkerInner {
    function: Arc<dyn WorkerFunction>,
    input_pipe: Pipe<Vec<u8>>,
    output_pipe: Pipe<Vec<u8>>,
    input_size: i32,
    output_size: i32,
    user_ctx: Vec<u8>,
    underway_count: AtomicI64,
}

fn run(inner: Arc<CpuWorkerInner>) {
    let is_void = inner.output_size == 0;
    while let Some(input) = inner.input_pipe.receive() {
        let mut output = vec![0u8; inner.output_size as usize];
        inner.function.call(&input, &mut output, &inner.user_ctx);
        if is_void {
            inner.output_pipe.send(vec![0u8]);
        } else {
            inner.output_pipe.send(output);
        }
    }
    inner.output_pipe.close();
}

/// A CPU-resident worker: one background thread running `function` once
/// per input element, fed and drained through a pair of bounded pipes.
pub struct CpuWorker {
    inner: Arc<CpuWorkerInner>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpuWorker {
    /// `input_size` must be non-zero. `output_size` of zero declares a
    /// void worker: `function` still runs once per input, but no result
    /// bytes are produced (the background thread sends a one-byte
    /// sentinel through its output pipe purely to keep send/receive
    /// counts balanced).
    ///
    /// `user_ctx` is copied once, here, so the background thread's view
    /// of the context outlives whatever stack frame the caller built it
    /// in.
    pub fn new(
        function: Arc<dyn WorkerFunction>,
        input_size: i32,
        output_size: i32,
        user_ctx: Vec<u8>,
    ) -> CpuWorker {
        assert!(input_size > 0, "eyot-worker: cpu worker input size must be non-zero");

        let inner = Arc::new(CpuWorkerInner {
            function,
            input_pipe: Pipe::new(),
            output_pipe: Pipe::new(),
            input_size,
            output_size,
            user_ctx,
            underway_count: AtomicI64::new(0),
        });

        let background = Arc::clone(&inner);
        let handle = std::thread::spawn(move || run(background));

        CpuWorker {
            inner,
            thread: Mutex::new(Some(handle)),
        }
    }
}

impl Worker for CpuWorker {
    fn output_size(&self) -> i32 {
        self.inner.output_size
    }

    fn send(&self, _region: &GcRegion, values: Vector) {
        let count = values.length();
        self.inner.underway_count.fetch_add(count as i64, Ordering::SeqCst);
        for i in 0..count {
            let ptr = values.access(i);
            let bytes =
                unsafe { std::slice::from_raw_parts(ptr, self.inner.input_size as usize) }.to_vec();
            self.inner.input_pipe.send(bytes);
        }
    }

    fn receive(&self, _region: &GcRegion, out: *mut u8) {
        match self.inner.output_pipe.receive() {
            Some(bytes) => {
                self.inner.underway_count.fetch_sub(1, Ordering::SeqCst);
                if self.inner.output_size > 0 {
                    unsafe {
                        std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
                    }
                }
            }
            None => panic!("eyot-worker: {}", WorkerError::NothingOwed),
        }
    }

    fn drain(&self, region: &GcRegion) -> Option<Vector> {
        let required = self.inner.underway_count.load(Ordering::SeqCst);
        let result = if self.inner.output_size > 0 {
            let v = Vector::create(region, self.inner.output_size);
            v.resize(region, required as i32);
            Some(v)
        } else {
            None
        };

        for i in 0..required {
            match &result {
                Some(v) => self.receive(region, v.access(i as i32)),
                None => {
                    let mut scratch = [0u8; 1];
                    self.receive(region, scratch.as_mut_ptr());
                }
            }
        }

        result
    }
}

impl Drop for CpuWorker {
    fn drop(&mut self) {
        self.inner.input_pipe.close();
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Increment;
    impl WorkerFunction for Increment {
        fn call(&self, input: &[u8], output: &mut [u8], user_ctx: &[u8]) {
            let x = i32::from_ne_bytes(input.try_into().unwrap());
            let ctx = i32::from_ne_bytes(user_ctx.try_into().unwrap());
            output.copy_from_slice(&(x + ctx).to_ne_bytes());
        }
    }

    fn push(region: &GcRegion, values: &[i32]) -> Vector {
        let v = Vector::create(region, 4);
        for x in values {
            v.append(region, Some(&x.to_ne_bytes()));
        }
        v
    }

    fn collect_i32(v: Vector) -> Vec<i32> {
        (0..v.length())
            .map(|i| unsafe { *(v.access(i) as *const i32) })
            .collect()
    }

    #[test]
    fn send_and_drain_applies_function_in_order() {
        let region = GcRegion::new();
        let ctx = 1234i32.to_ne_bytes().to_vec();
        let worker = CpuWorker::new(Arc::new(Increment), 4, 4, ctx);

        worker.send(&region, push(&region, &[1, 2]));
        let results = worker.drain(&region).expect("non-void worker yields a vector");
        assert_eq!(collect_i32(results), vec![1235, 1236]);
    }

    #[test]
    fn single_receive_then_drain_matches_remaining_count() {
        let region = GcRegion::new();
        let worker = CpuWorker::new(Arc::new(Increment), 4, 4, 0i32.to_ne_bytes().to_vec());

        worker.send(&region, push(&region, &[1, 2, 3]));

        let mut first = 0i32;
        worker.receive(&region, &mut first as *mut i32 as *mut u8);
        assert_eq!(first, 1);

        let rest = worker.drain(&region).unwrap();
        assert_eq!(rest.length(), 2);
        assert_eq!(collect_i32(rest), vec![2, 3]);
    }

    #[test]
    fn void_worker_still_balances_send_and_drain() {
        struct Observe(Arc<AtomicI64>);
        impl WorkerFunction for Observe {
            fn call(&self, input: &[u8], _output: &mut [u8], _user_ctx: &[u8]) {
                let x = i32::from_ne_bytes(input.try_into().unwrap());
                self.0.fetch_add(x as i64, Ordering::SeqCst);
            }
        }

        let region = GcRegion::new();
        let seen = Arc::new(AtomicI64::new(0));
        let worker = CpuWorker::new(Arc::new(Observe(Arc::clone(&seen))), 4, 0, Vec::new());

        worker.send(&region, push(&region, &[1, 2, 3]));
        let result = worker.drain(&region);
        assert!(result.is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn dropping_the_worker_closes_the_thread_cleanly() {
        let region = GcRegion::new();
        let worker = CpuWorker::new(Arc::new(Increment), 4, 4, 0i32.to_ne_bytes().to_vec());
        worker.send(&region, push(&region, &[1]));
        let _ = worker.drain(&region);
        drop(worker); // closes the input pipe and joins the background thread
    }
}
