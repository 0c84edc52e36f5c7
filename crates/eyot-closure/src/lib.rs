//! Packed closures: `[fid][present-flag per arg][slot per arg]`.
//!
//! The generated program is the only party that knows how many
//! arguments a function id takes and how big each one is, so this crate
//! never hard-codes a layout — it asks a host-supplied [`ClosureLayout`]
//! and dispatches through a host-supplied [`FunctionCaller`], the Rust
//! counterpart of the original's pair of generated C functions
//! (`ey_generated_arg_count`/`ey_generated_closure_arg_size`) and
//! function-pointer dispatcher (`ey_functioncaller`).

use eyot_gc::GcRegion;

/// Resolves per-function-id layout facts the generated program knows and
/// this crate does not.
pub trait ClosureLayout {
    fn arg_count(&self, fid: i32) -> i32;
    fn arg_size(&self, fid: i32, argument: i32) -> i32;
}

/// Dispatches a resolved argument list to the generated function body
/// identified by `fid`. `ctx` is an opaque, caller-defined execution
/// context pointer threaded through unmodified.
pub trait FunctionCaller {
    fn call(&self, ctx: *mut u8, fid: i32, result: *mut u8, args: &[*mut u8]);
}

/// A handle to a GC-hosted closure. Cheap to copy.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Closure(*mut u8);

unsafe impl Send for Closure {}

fn arg_step_size(layout: &dyn ClosureLayout, fid: i32, argument: i32) -> usize {
    let mut raw = layout.arg_size(fid, argument);
    while raw % 8 != 0 {
        raw += 1;
    }
    raw as usize
}

fn arg_exists_offset(argument: i32) -> usize {
    8 + 8 * argument as usize
}

fn closure_size(layout: &dyn ClosureLayout, fid: i32) -> usize {
    let arg_count = layout.arg_count(fid);
    let mut size = 8usize;
    for i in 0..arg_count {
        size += arg_step_size(layout, fid, i);
        size += 8;
    }
    size
}

impl Closure {
    /// Raw closure blob pointer.
    pub fn as_ptr(self) -> *mut u8 {
        self.0
    }

    pub fn fid(self) -> i32 {
        unsafe { *(self.0 as *const i32) }
    }

    pub fn size(self, layout: &dyn ClosureLayout) -> usize {
        closure_size(layout, self.fid())
    }

    fn arg_exists(self, argument: i32) -> bool {
        unsafe { *self.0.add(arg_exists_offset(argument)) != 0 }
    }

    fn set_arg_exists(self, argument: i32, value: bool) {
        unsafe {
            *self.0.add(arg_exists_offset(argument)) = value as u8;
        }
    }

    fn arg_pointer(self, layout: &dyn ClosureLayout, argument: i32) -> *mut u8 {
        let fid = self.fid();
        let mut offset = 8 + 8 * layout.arg_count(fid) as usize;
        for i in 0..argument {
            offset += arg_step_size(layout, fid, i);
        }
        unsafe { self.0.add(offset) }
    }

    /// Build a closure for `fid`. `args[i]` is `Some(bytes)` to capture
    /// that argument now (copied into the blob), or `None` to defer it to
    /// call time.
    pub fn create(region: &GcRegion, layout: &dyn ClosureLayout, fid: i32, args: &[Option<&[u8]>]) -> Closure {
        let size = closure_size(layout, fid);
        let ptr = region.alloc(size, None);
        unsafe {
            std::ptr::write(ptr as *mut i32, fid);
        }
        let c = Closure(ptr);

        let arg_count = layout.arg_count(fid);
        for i in 0..arg_count {
            match args.get(i as usize).copied().flatten() {
                Some(bytes) => {
                    let dest = c.arg_pointer(layout, i);
                    c.set_arg_exists(i, true);
                    unsafe {
                        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dest, bytes.len());
                    }
                }
                None => c.set_arg_exists(i, false),
            }
        }

        c
    }

    /// Resolve captured and supplied arguments, then dispatch through
    /// `caller`. `supplied` holds only the arguments whose present-flag
    /// is false, in order.
    pub fn call(
        self,
        ctx: *mut u8,
        layout: &dyn ClosureLayout,
        caller: &dyn FunctionCaller,
        result: *mut u8,
        supplied: &[*mut u8],
    ) {
        let fid = self.fid();
        let arg_count = layout.arg_count(fid);
        let mut resolved: Vec<*mut u8> = Vec::with_capacity(arg_count as usize);
        let mut passed = 0usize;
        for i in 0..arg_count {
            if self.arg_exists(i) {
                resolved.push(self.arg_pointer(layout, i));
            } else {
                resolved.push(supplied[passed]);
                passed += 1;
            }
        }
        caller.call(ctx, fid, result, &resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    // fid 0: fn(a: i32, b: i32) -> i32, both 4-byte slots.
    struct Layout;
    impl ClosureLayout for Layout {
        fn arg_count(&self, _fid: i32) -> i32 {
            2
        }
        fn arg_size(&self, _fid: i32, _argument: i32) -> i32 {
            4
        }
    }

    struct SumCaller {
        calls: RefCell<Vec<(i32, i32)>>,
    }
    impl FunctionCaller for SumCaller {
        fn call(&self, _ctx: *mut u8, fid: i32, result: *mut u8, args: &[*mut u8]) {
            assert_eq!(fid, 0);
            let a = unsafe { *(args[0] as *const i32) };
            let b = unsafe { *(args[1] as *const i32) };
            self.calls.borrow_mut().push((a, b));
            unsafe {
                *(result as *mut i32) = a + b;
            }
        }
    }

    #[test]
    fn captured_argument_is_merged_with_supplied() {
        let region = GcRegion::new();
        let layout = Layout;
        let captured = 10i32.to_ne_bytes();
        let closure = Closure::create(&region, &layout, 0, &[Some(&captured), None]);

        assert_eq!(closure.size(&layout), 8 + 8 * 2 + 4 + 4);

        let caller = SumCaller {
            calls: RefCell::new(Vec::new()),
        };
        let mut supplied = 5i32;
        let mut result = 0i32;
        closure.call(
            std::ptr::null_mut(),
            &layout,
            &caller,
            &mut result as *mut i32 as *mut u8,
            &[&mut supplied as *mut i32 as *mut u8],
        );

        assert_eq!(result, 15);
        assert_eq!(caller.calls.borrow()[0], (10, 5));
    }

    #[test]
    fn fully_captured_closure_needs_no_supplied_args() {
        let region = GcRegion::new();
        let layout = Layout;
        let a = 1i32.to_ne_bytes();
        let b = 2i32.to_ne_bytes();
        let closure = Closure::create(&region, &layout, 0, &[Some(&a), Some(&b)]);

        let caller = SumCaller {
            calls: RefCell::new(Vec::new()),
        };
        let mut result = 0i32;
        closure.call(
            std::ptr::null_mut(),
            &layout,
            &caller,
            &mut result as *mut i32 as *mut u8,
            &[],
        );
        assert_eq!(result, 3);
    }
}
