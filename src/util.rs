//! Utilities used in this crate.
//!
//! This is not part of the public interface of the crate.

/// Print a hexdump of a buffer slice, annotated with region offsets.
///
/// `base` is the region offset of the first byte of `buf`.
pub fn hexdump(buf: &[u8], base: usize) -> String {
    let step = 16;
    let lines: Vec<String> = (0..buf.len())
        .step_by(step)
        .map(|i| {
            let bytes: Vec<String> = (i..std::cmp::min(buf.len(), i + step))
                .map(|x| format!("{:02X}", buf[x]))
                .collect();
            format!("{:>8x}  {}", base + i, bytes.join(" "))
        })
        .collect();
    lines.join("\n")
}
