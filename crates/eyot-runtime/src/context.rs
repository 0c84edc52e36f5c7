//! The Rust counterpart of `EyExecutionContext`: everything generated
//! code and the closure/worker layers need threaded through a call,
//! bundled behind one handle.

use std::io::Write;

use eyot_closure::{ClosureLayout, FunctionCaller};
use eyot_gc::GcRegion;
use eyot_string::EyString;
use parking_lot::Mutex;

use crate::error::runtime_panic;

/// Resolved by the generated program, never by this crate: function
/// layout and dispatch (`ClosureLayout`/`FunctionCaller`, reused
/// unmodified from `eyot-closure`), the static string pool backing
/// `string_get`, the embedded OpenCL source (empty disables GPU
/// support), and the program's own entry point.
pub trait GeneratedProgram: ClosureLayout + FunctionCaller {
    fn generated_main(&self, ctx: &ExecutionContext);

    /// Empty string disables GPU support for the process.
    fn runtime_cl_src(&self) -> &str {
        ""
    }

    fn string_pool(&self) -> &[&'static str] {
        &[]
    }
}

/// Bundles a handle to the active GC region, the static string pool and
/// the print sink that every runtime call threads through.
pub struct ExecutionContext<'a> {
    region: &'a GcRegion,
    string_pool: &'a [&'static str],
    sink: Mutex<Box<dyn Write + Send + 'a>>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(region: &'a GcRegion, string_pool: &'a [&'static str]) -> ExecutionContext<'a> {
        ExecutionContext {
            region,
            string_pool,
            sink: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Build a context writing to `sink` instead of stdout, for tests
    /// that need to assert on printed output.
    pub fn with_sink(
        region: &'a GcRegion,
        string_pool: &'a [&'static str],
        sink: Box<dyn Write + Send + 'a>,
    ) -> ExecutionContext<'a> {
        ExecutionContext {
            region,
            string_pool,
            sink: Mutex::new(sink),
        }
    }

    pub fn gc(&self) -> &'a GcRegion {
        self.region
    }

    /// Resolve a generated-program string-pool index to a fresh
    /// `EyString`, the Rust counterpart of `ey_runtime_string_get`. A
    /// generated program only ever passes indices its own compiler
    /// emitted, so an out-of-range index is a contract violation, not a
    /// recoverable condition.
    pub fn string_get(&self, index: usize) -> EyString {
        match self.string_pool.get(index) {
            Some(literal) => EyString::create_literal(self.region, literal.as_bytes()),
            None => runtime_panic(
                "eyot-runtime::string_get",
                &format!("string pool index {index} out of range"),
            ),
        }
    }

    pub(crate) fn write_bytes(&self, bytes: &[u8]) {
        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(bytes) {
            runtime_panic("eyot-runtime::write_bytes", &e.to_string());
        }
    }
}
