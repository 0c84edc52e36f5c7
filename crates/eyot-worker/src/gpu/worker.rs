//! The GPU worker itself: batch send/receive/drain against the kernel
//! argument layout fixed in the runtime core specification —
//! `input, output, count, shared[, closure]`.

use std::collections::VecDeque;

use eyot_gc::GcRegion;
use eyot_vector::Vector;
use ocl::flags::MemFlags;
use ocl::{Buffer, Event, Kernel, Queue};
use parking_lot::Mutex;

use crate::error::{Result, WorkerError};
use crate::gpu::batch::WorkBatch;
use crate::gpu::driver;
use crate::gpu::shared::{LaneLog, WORKER_SHARED_STRIDE};
use crate::Worker;

const LOCAL_WORKGROUP_SIZE: usize = 64;

struct GpuWorkerState {
    queue: Queue,
    kernel: Kernel,
    input_size: i32,
    output_size: i32,
    batches: VecDeque<WorkBatch>,
    local_workgroup_size: usize,
    closure: Option<Buffer<u8>>,
    shared: LaneLog,
    shared_device: Buffer<u8>,
    ready_event: Option<Event>,
    activity_count: i64,
}

pub struct GpuWorker {
    output_size: i32,
    state: Mutex<GpuWorkerState>,
}

fn round_up(value: usize, divisor: usize) -> usize {
    let remainder = value % divisor;
    if remainder == 0 {
        value
    } else {
        value + (divisor - remainder)
    }
}

impl GpuWorker {
    pub fn new(
        kernel_name: &str,
        input_size: i32,
        output_size: i32,
        closure_bytes: Option<&[u8]>,
    ) -> Result<GpuWorker> {
        let drv = driver::driver()?;

        let queue = Queue::new(&drv.context, drv.device, None)
            .map_err(|e| WorkerError::GpuRuntime(e.to_string()))?;

        let kernel = Kernel::builder()
            .program(&drv.program)
            .name(kernel_name)
            .queue(queue.clone())
            .build()
            .map_err(|e| WorkerError::GpuRuntime(e.to_string()))?;

        let mut shared = LaneLog::new(LOCAL_WORKGROUP_SIZE);
        let shared_device = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_write())
            .len(LOCAL_WORKGROUP_SIZE * WORKER_SHARED_STRIDE)
            .build()
            .map_err(|e| WorkerError::GpuRuntime(e.to_string()))?;

        let mut ready_event = Event::empty();
        shared_device
            .cmd()
            .write(shared.as_bytes())
            .enew(&mut ready_event)
            .enq()
            .map_err(|e| WorkerError::GpuRuntime(e.to_string()))?;

        let closure = match closure_bytes {
            Some(bytes) => {
                let buf = Buffer::<u8>::builder()
                    .queue(queue.clone())
                    .flags(MemFlags::new().write_only())
                    .len(bytes.len())
                    .build()
                    .map_err(|e| WorkerError::GpuRuntime(e.to_string()))?;
                buf.cmd()
                    .write(bytes)
                    .ewait(&ready_event)
                    .enq()
                    .map_err(|e| WorkerError::GpuRuntime(e.to_string()))?;
                Some(buf)
            }
            None => None,
        };

        Ok(GpuWorker {
            output_size,
            state: Mutex::new(GpuWorkerState {
                queue,
                kernel,
                input_size,
                output_size,
                batches: VecDeque::new(),
                local_workgroup_size: LOCAL_WORKGROUP_SIZE,
                closure,
                shared,
                shared_device,
                ready_event: Some(ready_event),
                activity_count: 0,
            }),
        })
    }
}

fn maybe_clear_logs(
    shared_device: &Buffer<u8>,
    shared: &mut LaneLog,
    ready_event: &mut Option<Event>,
    activity_count: i64,
) {
    if activity_count > 0 || !shared.any_used() {
        return;
    }
    clear_logs(shared_device, shared, ready_event);
}

fn clear_logs(shared_device: &Buffer<u8>, shared: &mut LaneLog, ready_event: &mut Option<Event>) {
    shared.clear();
    let mut new_ready = Event::empty();
    let write = shared_device.cmd().write(shared.as_bytes()).enew(&mut new_ready);
    let result = match ready_event.take() {
        Some(wait_on) => write.ewait(&wait_on).enq(),
        None => write.enq(),
    };
    result.expect("eyot-worker: failed to clear gpu log buffer");
    *ready_event = Some(new_ready);
}

impl Worker for GpuWorker {
    fn output_size(&self) -> i32 {
        self.output_size
    }

    /// `ocl`'s buffer commands block by default, so by the time this
    /// returns the batch's input write, kernel run and both read-backs
    /// have already completed — `WorkBatch::done`/`read_index` exist to
    /// track what's been handed back through `receive`, not to await
    /// device completion. That synchronicity is deliberate: the log
    /// buffer is one shared allocation reused by every batch, and
    /// letting two batches' device-to-host log reads race would
    /// corrupt whichever lane wrote last.
    fn send(&self, _region: &GcRegion, values: Vector) {
        let mut state = self.state.lock();
        let GpuWorkerState {
            queue,
            kernel,
            input_size,
            output_size,
            batches,
            local_workgroup_size,
            closure,
            shared,
            shared_device,
            activity_count,
            ..
        } = &mut *state;

        let count = values.length() as usize;
        let input_bytes: &[u8] = if count == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(values.get_ptr(), count * *input_size as usize) }
        };

        let input_buf = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().read_only())
            .len((count * *input_size as usize).max(1))
            .build()
            .expect("eyot-worker: failed to allocate gpu input buffer");
        let output_buf = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(MemFlags::new().write_only())
            .len((count * *output_size as usize).max(1))
            .build()
            .expect("eyot-worker: failed to allocate gpu output buffer");

        let mut write_done = Event::empty();
        input_buf
            .cmd()
            .write(input_bytes)
            .enew(&mut write_done)
            .enq()
            .expect("eyot-worker: failed to write gpu input buffer");

        kernel.set_arg(0, &input_buf).expect("eyot-worker: failed to bind input arg");
        kernel.set_arg(1, &output_buf).expect("eyot-worker: failed to bind output arg");
        kernel
            .set_arg(2, count as u32)
            .expect("eyot-worker: failed to bind count arg");
        kernel
            .set_arg(3, &*shared_device)
            .expect("eyot-worker: failed to bind shared log arg");
        if let Some(buf) = closure.as_ref() {
            kernel.set_arg(4, buf).expect("eyot-worker: failed to bind closure arg");
        }

        let global_size = round_up(count, *local_workgroup_size);
        let mut kernel_done = Event::empty();
        unsafe {
            kernel
                .cmd()
                .global_work_size(global_size)
                .local_work_size(*local_workgroup_size)
                .ewait(&write_done)
                .enew(&mut kernel_done)
                .enq()
                .expect("eyot-worker: failed to enqueue gpu kernel");
        }

        let mut results = vec![0u8; count * *output_size as usize];
        let mut read_done = Event::empty();
        output_buf
            .cmd()
            .read(&mut results)
            .ewait(&kernel_done)
            .enew(&mut read_done)
            .enq()
            .expect("eyot-worker: failed to read gpu output buffer");

        let mut log_done = Event::empty();
        shared_device
            .cmd()
            .read(shared.as_bytes_mut())
            .ewait(&read_done)
            .enew(&mut log_done)
            .enq()
            .expect("eyot-worker: failed to read gpu log buffer");

        *activity_count += count as i64;
        batches.push_back(WorkBatch {
            input: input_buf,
            output: output_buf,
            results,
            done: log_done,
            count,
            read_index: -1,
        });
    }

    fn receive(&self, _region: &GcRegion, out: *mut u8) {
        let mut state = self.state.lock();
        let GpuWorkerState {
            batches,
            shared,
            shared_device,
            ready_event,
            activity_count,
            output_size,
            ..
        } = &mut *state;

        let batch = match batches.front_mut() {
            Some(batch) => batch,
            None => panic!("eyot-worker: {}", WorkerError::NothingOwed),
        };

        if batch.read_index < 0 {
            batch
                .done
                .wait_for()
                .expect("eyot-worker: failed waiting for gpu batch completion");
            shared.pump();
            batch.read_index = 0;
            *activity_count -= batch.count as i64;
            maybe_clear_logs(shared_device, shared, ready_event, *activity_count);
        }

        let idx = batch.read_index as usize;
        if *output_size > 0 {
            let start = idx * *output_size as usize;
            let end = start + *output_size as usize;
            unsafe {
                std::ptr::copy_nonoverlapping(batch.results[start..end].as_ptr(), out, end - start);
            }
        }
        batch.read_index += 1;

        if batch.read_index as usize == batch.count {
            batches.pop_front();
        }
    }

    fn drain(&self, region: &GcRegion) -> Option<Vector> {
        let mut state = self.state.lock();
        let GpuWorkerState {
            batches,
            shared,
            shared_device,
            ready_event,
            activity_count,
            output_size,
            ..
        } = &mut *state;

        if let Some(last) = batches.back() {
            if last.read_index < 0 {
                last.done
                    .wait_for()
                    .expect("eyot-worker: failed waiting for gpu batch completion");
                shared.pump();
            }
        }

        let mut bytes = Vec::new();
        let mut drained: i64 = 0;
        while let Some(batch) = batches.pop_front() {
            let start = (batch.read_index.max(0) as usize) * *output_size as usize;
            bytes.extend_from_slice(&batch.results[start..]);
            drained += batch.count as i64 - batch.read_index.max(0);
        }

        *activity_count -= drained;
        maybe_clear_logs(shared_device, shared, ready_event, *activity_count);

        if *output_size == 0 {
            return None;
        }

        let result = Vector::create(region, *output_size);
        let element_count = (bytes.len() / *output_size as usize) as i32;
        result.resize(region, element_count);
        if !bytes.is_empty() {
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), result.get_ptr(), bytes.len());
            }
        }
        Some(result)
    }
}
