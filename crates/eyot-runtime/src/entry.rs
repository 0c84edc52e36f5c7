//! The entry-point protocol: create the region, conditionally bring up
//! the GPU driver, pin the arguments vector, run the generated program,
//! tear down. The Rust counterpart of `main()` in the original runtime's
//! entry point.

use eyot_gc::GcRegion;
use eyot_string::EyString;
use eyot_vector::Vector;

use crate::config::RuntimeConfig;
use crate::context::{ExecutionContext, GeneratedProgram};

/// Run `program` to completion against `args` (ordinarily
/// `std::env::args()` collected by the caller). Creates a fresh GC
/// region, initialises the GPU driver unless disabled or the program's
/// `runtime_cl_src` is empty, builds and roots an `EyString` vector of
/// `args`, invokes [`GeneratedProgram::generated_main`], then unroots
/// and frees the region.
pub fn run(program: &dyn GeneratedProgram, args: &[String]) {
    let config = RuntimeConfig::from_env();
    let region = GcRegion::from_env();

    if !config.disable_cl && !program.runtime_cl_src().is_empty() {
        eyot_worker::init_opencl(program.runtime_cl_src());
    }

    let args_vector = Vector::create(&region, std::mem::size_of::<EyString>() as i32);
    for arg in args {
        let s = EyString::create_literal(&region, arg.as_bytes());
        args_vector.append(&region, Some(unsafe {
            std::slice::from_raw_parts(&s as *const EyString as *const u8, std::mem::size_of::<EyString>())
        }));
    }
    region.remember_root_object(args_vector.root_ptr());

    let ctx = ExecutionContext::new(&region, program.string_pool());
    program.generated_main(&ctx);

    region.forget_root_object(args_vector.root_ptr());
    drop(region);
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyot_closure::{ClosureLayout, FunctionCaller};
    use std::cell::RefCell;

    struct Echo {
        seen_args: RefCell<Vec<String>>,
    }

    impl ClosureLayout for Echo {
        fn arg_count(&self, _fid: i32) -> i32 {
            0
        }
        fn arg_size(&self, _fid: i32, _argument: i32) -> i32 {
            0
        }
    }

    impl FunctionCaller for Echo {
        fn call(&self, _ctx: *mut u8, _fid: i32, _result: *mut u8, _args: &[*mut u8]) {}
    }

    impl GeneratedProgram for Echo {
        fn generated_main(&self, ctx: &ExecutionContext) {
            let args = ctx.gc().stats();
            // The region exists and has at least the args vector's page.
            assert!(args.pages_allocated >= 1);
            self.seen_args.borrow_mut().push("ran".to_string());
        }
    }

    #[test]
    fn run_invokes_generated_main_exactly_once() {
        let program = Echo {
            seen_args: RefCell::new(Vec::new()),
        };
        run(&program, &["prog".to_string(), "--flag".to_string()]);
        assert_eq!(program.seen_args.borrow().as_slice(), &["ran".to_string()]);
    }
}
