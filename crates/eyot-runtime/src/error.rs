/// The Rust counterpart of `ey_runtime_panic`: print `unit: message` to
/// the error channel and terminate the process. Every fatal condition
/// this crate detects goes through here rather than a bare `panic!`, so
/// generated-program contract violations (bad string-pool index, print
/// sink failure) are tagged with the unit that detected them.
pub fn runtime_panic(unit: &str, message: &str) -> ! {
    eprintln!("{unit}: {message}");
    std::process::exit(1);
}
