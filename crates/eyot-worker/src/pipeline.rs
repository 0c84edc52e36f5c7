//! Composing two workers into one: everything sent to the pipeline goes
//! to the upstream worker; everything received comes from the
//! downstream one.
//!
//! The original bridges the two with a thread spawned at construction
//! time that calls `upstream.drain()` exactly once and forwards the
//! result to `downstream.send()`. Spawning that eagerly races the
//! caller's own `send` calls — the bridge could drain zero items before
//! the caller has pushed any. This version spawns the same one-shot
//! bridge lazily, on the first `receive`/`drain` the composite sees,
//! and blocks the caller on it via [`std::sync::Once`] — by the time
//! anyone asks the pipeline for a result, every `send` that is ever
//! going to happen already has.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Once};

use eyot_gc::GcRegion;
use eyot_vector::Vector;

use crate::Worker;

pub struct Pipeline {
    upstream: Arc<dyn Worker>,
    downstream: Arc<dyn Worker>,
    output_size: i32,
    underway_count: AtomicI64,
    bridge: Once,
}

impl Pipeline {
    pub fn new(upstream: Arc<dyn Worker>, downstream: Arc<dyn Worker>) -> Pipeline {
        let output_size = downstream.output_size();
        Pipeline {
            upstream,
            downstream,
            output_size,
            underway_count: AtomicI64::new(0),
            bridge: Once::new(),
        }
    }

    fn join_bridge(&self, region: &GcRegion) {
        self.bridge.call_once(|| {
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    if let Some(results) = self.upstream.drain(region) {
                        self.downstream.send(region, results);
                    }
                });
            });
        });
    }
}

impl Worker for Pipeline {
    fn output_size(&self) -> i32 {
        self.output_size
    }

    fn send(&self, region: &GcRegion, values: Vector) {
        self.underway_count.fetch_add(values.length() as i64, Ordering::SeqCst);
        self.upstream.send(region, values);
    }

    fn receive(&self, region: &GcRegion, out: *mut u8) {
        self.join_bridge(region);
        self.downstream.receive(region, out);
        self.underway_count.fetch_sub(1, Ordering::SeqCst);
    }

    fn drain(&self, region: &GcRegion) -> Option<Vector> {
        self.join_bridge(region);
        let required = self.underway_count.load(Ordering::SeqCst);

        let result = if self.output_size > 0 {
            let v = Vector::create(region, self.output_size);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuWorker;
    use crate::WorkerFunction;

    struct Double;
    impl WorkerFunction for Double {
        fn call(&self, input: &[u8], output: &mut [u8], _user_ctx: &[u8]) {
            let x = i32::from_ne_bytes(input.try_into().unwrap());
            output.copy_from_slice(&(x * 2).to_ne_bytes());
        }
    }

    struct AddTen;
    impl WorkerFunction for AddTen {
        fn call(&self, input: &[u8], output: &mut [u8], _user_ctx: &[u8]) {
            let x = i32::from_ne_bytes(input.try_into().unwrap());
            output.copy_from_slice(&(x + 10).to_ne_bytes());
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
    fn pipeline_applies_both_workers_in_order() {
        let region = GcRegion::new();
        let a: Arc<dyn Worker> = Arc::new(CpuWorker::new(Arc::new(Double), 4, 4, Vec::new()));
        let b: Arc<dyn Worker> = Arc::new(CpuWorker::new(Arc::new(AddTen), 4, 4, Vec::new()));
        let pipeline = Pipeline::new(a, b);

        pipeline.send(&region, push(&region, &[1, 2, 3]));
        let result = pipeline.drain(&region).expect("non-void pipeline yields a vector");

        assert_eq!(collect_i32(result), vec![12, 14, 16]);
    }
}
