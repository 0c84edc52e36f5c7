//! Minimal driver exercising the entry-point protocol end to end: no
//! compiler sits in front of this binary, so the "generated program" is
//! a small fixed demo that prints its own arguments back out.

use eyot_closure::{ClosureLayout, FunctionCaller};
use eyot_runtime::{ExecutionContext, GeneratedProgram};

struct Demo;

impl ClosureLayout for Demo {
    fn arg_count(&self, _fid: i32) -> i32 {
        0
    }

    fn arg_size(&self, _fid: i32, _argument: i32) -> i32 {
        0
    }
}

impl FunctionCaller for Demo {
    fn call(&self, _ctx: *mut u8, _fid: i32, _result: *mut u8, _args: &[*mut u8]) {}
}

impl GeneratedProgram for Demo {
    fn generated_main(&self, ctx: &ExecutionContext) {
        let args: Vec<String> = std::env::args().collect();
        eyot_runtime::print::print_integer(ctx, args.len() as i64, 0);
        eyot_runtime::print::print_newline(ctx);
        for arg in &args {
            for byte in arg.bytes() {
                eyot_runtime::print::print_byte(ctx, byte);
            }
            eyot_runtime::print::print_newline(ctx);
        }
        eyot_runtime::print::print_boolean(ctx, eyot_worker::check_cl());
        eyot_runtime::print::print_newline(ctx);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    eyot_runtime::entry::run(&Demo, &args);
}
