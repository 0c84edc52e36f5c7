//! I/O print helpers. Everything here drills down to [`print_byte`], the
//! Rust counterpart of `ey_print_byte`.

use eyot_string::EyString;

use crate::context::ExecutionContext;

pub const NEWLINE: u8 = 10;

pub fn print_byte(ctx: &ExecutionContext, byte: u8) {
    ctx.write_bytes(&[byte]);
}

pub fn print_newline(ctx: &ExecutionContext) {
    print_byte(ctx, NEWLINE);
}

/// Base-10 integer, left-padded with zeros to `min_digits` if wider than
/// the natural representation. `min_digits` of 0 behaves like ordinary
/// decimal formatting; a value of exactly zero still prints `"0"` (or
/// the requested run of zeros) rather than nothing.
pub fn print_integer(ctx: &ExecutionContext, value: i64, min_digits: usize) {
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    for _ in digits.len()..min_digits {
        out.push('0');
    }
    out.push_str(&digits);
    ctx.write_bytes(out.as_bytes());
}

pub fn print_boolean(ctx: &ExecutionContext, value: bool) {
    ctx.write_bytes(if value { b"true" } else { b"false" });
}

/// Single Unicode scalar, UTF-8 encoded.
pub fn print_char(ctx: &ExecutionContext, code: u32) {
    let c = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
    let mut buf = [0u8; 4];
    ctx.write_bytes(c.encode_utf8(&mut buf).as_bytes());
}

pub fn print_string(ctx: &ExecutionContext, s: EyString) {
    for i in 0..s.character_length() {
        print_char(ctx, s.get_character(i));
    }
}

/// Sign, integer part, `.`, then the fractional part scaled by
/// 1,000,000 and left-padded to six digits — truncated, never rounded,
/// matching the original formatter exactly.
pub fn print_float(ctx: &ExecutionContext, value: f64) {
    let negative = value.is_sign_negative() && value != 0.0;
    let magnitude = value.abs();
    let integer_part = magnitude.trunc() as i64;
    let fractional = ((magnitude - magnitude.trunc()) * 1_000_000.0).trunc() as i64;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&integer_part.to_string());
    out.push('.');
    let frac_digits = fractional.to_string();
    for _ in frac_digits.len()..6 {
        out.push('0');
    }
    out.push_str(&frac_digits);
    ctx.write_bytes(out.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyot_gc::GcRegion;
    use std::sync::{Arc, Mutex};

    struct Collector(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for Collector {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured<'a>(region: &'a GcRegion, buf: &Arc<Mutex<Vec<u8>>>) -> ExecutionContext<'a> {
        ExecutionContext::with_sink(region, &[], Box::new(Collector(Arc::clone(buf))))
    }

    #[test]
    fn integer_pads_to_minimum_width() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_integer(&ctx, 42, 5);
        assert_eq!(buf.lock().unwrap().as_slice(), b"00042");
    }

    #[test]
    fn negative_integer_keeps_sign_before_padding() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_integer(&ctx, -7, 3);
        assert_eq!(buf.lock().unwrap().as_slice(), b"-007");
    }

    #[test]
    fn zero_still_prints() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_integer(&ctx, 0, 0);
        assert_eq!(buf.lock().unwrap().as_slice(), b"0");
    }

    #[test]
    fn float_truncates_without_rounding() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_float(&ctx, 3.14159999);
        assert_eq!(buf.lock().unwrap().as_slice(), b"3.141599");
    }

    #[test]
    fn negative_float_keeps_sign() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_float(&ctx, -0.5);
        assert_eq!(buf.lock().unwrap().as_slice(), b"-0.500000");
    }

    #[test]
    fn boolean_prints_literal_words() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_boolean(&ctx, true);
        print_boolean(&ctx, false);
        assert_eq!(buf.lock().unwrap().as_slice(), b"truefalse");
    }

    #[test]
    fn char_encodes_multi_byte_scalar() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        print_char(&ctx, 0x1F600);
        assert_eq!(buf.lock().unwrap().as_slice(), "\u{1F600}".as_bytes());
    }

    #[test]
    fn string_prints_every_scalar() {
        let region = GcRegion::new();
        let buf = Arc::new(Mutex::new(Vec::new()));
        let ctx = captured(&region, &buf);
        let s = EyString::create_literal(&region, "héllo".as_bytes());
        print_string(&ctx, s);
        assert_eq!(buf.lock().unwrap().as_slice(), "héllo".as_bytes());
    }
}
