//! End-to-end GPU worker scenarios against a real OpenCL device.
//!
//! These need an actual platform and GPU to run, so they're `#[ignore]`d
//! by default; run with `cargo test -- --ignored` on a machine that has
//! one. The kernel argument order (`input, output, count, shared[,
//! closure]`) matches what `GpuWorker::send` binds.

use std::sync::Arc;

use eyot_gc::GcRegion;
use eyot_vector::Vector;
use eyot_worker::{GpuWorker, Worker};

const SQUARE_KERNEL: &str = r#"
__kernel void square(__global const int *input,
                      __global int *output,
                      unsigned int count,
                      __global uchar *shared) {
    size_t i = get_global_id(0);
    if (i < count) {
        output[i] = input[i] * input[i];
    }
}
"#;

const SCALE_BY_CLOSURE_KERNEL: &str = r#"
__kernel void scale(__global const int *input,
                     __global int *output,
                     unsigned int count,
                     __global uchar *shared,
                     __global const int *factor) {
    size_t i = get_global_id(0);
    if (i < count) {
        output[i] = input[i] * (*factor);
    }
}
"#;

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
#[ignore = "requires a real OpenCL gpu device"]
fn square_kernel_sent_twice_receives_and_drains_in_order() {
    eyot_worker::init_opencl(SQUARE_KERNEL);
    let region = GcRegion::new();
    let worker: Arc<dyn Worker> = Arc::new(
        GpuWorker::new("square", 4, 4, None).expect("opencl device available"),
    );

    worker.send(&region, push(&region, &[1, 2, 3]));
    worker.send(&region, push(&region, &[1, 2, 3]));

    let mut first = 0i32;
    worker.receive(&region, &mut first as *mut i32 as *mut u8);
    assert_eq!(first, 1);

    let mut second = 0i32;
    worker.receive(&region, &mut second as *mut i32 as *mut u8);
    assert_eq!(second, 4);

    let rest = worker.drain(&region).expect("square worker yields a vector");
    assert_eq!(collect_i32(rest), vec![9, 1, 4, 9]);
}

#[test]
#[ignore = "requires a real OpenCL gpu device"]
fn closure_buffer_is_visible_to_every_invocation() {
    eyot_worker::init_opencl(SCALE_BY_CLOSURE_KERNEL);
    let region = GcRegion::new();
    let factor = 2i32.to_ne_bytes();
    let worker: Arc<dyn Worker> = Arc::new(
        GpuWorker::new("scale", 4, 4, Some(&factor)).expect("opencl device available"),
    );

    worker.send(&region, push(&region, &[2]));
    let mut result = 0i32;
    worker.receive(&region, &mut result as *mut i32 as *mut u8);
    assert_eq!(result, 4);
}
