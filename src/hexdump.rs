//! Hex dump formatting for diagnostic output.
//!
//! Produces the classic 16-bytes-per-row listing used by the serial tools:
//! a 4-hex-digit offset, space-separated hex byte pairs with an extra
//! separator after the eighth column, and a `*...*` trailer holding the
//! printable-ASCII rendering of the row. Bytes below 0x20 or at/above 0x7f
//! render as `.`. The formatter is pure; callers decide whether the result
//! goes to stdout or a log line.

/// Format `buf` as a hex dump. Empty input yields an empty string; otherwise
/// every row (including the last) is newline-terminated.
pub fn hexdump(buf: &[u8]) -> String {
    if buf.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(buf.len() * 4 + 16);
    let mut ascii = String::with_capacity(16);

    for (j, &b) in buf.iter().enumerate() {
        if j % 16 == 0 {
            if j > 0 {
                out.push_str(&format!(" *{}*\n", ascii));
                ascii.clear();
            }
            out.push_str(&format!(" {:04x}:", j));
        }
        if j % 8 == 0 && j % 16 != 0 {
            out.push_str("  ");
        } else {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", b));
        ascii.push(if (0x20..0x7f).contains(&b) { b as char } else { '.' });
    }

    // Pad the final partial row so the ASCII trailer lines up. Rows that end
    // before the ninth column never emitted the double separator, hence the
    // extra space.
    let mut j = buf.len();
    if j % 16 != 0 && j % 16 < 9 {
        out.push(' ');
    }
    while j % 16 != 0 {
        out.push_str("   ");
        j += 1;
    }
    out.push_str(&format!(" *{}*\n", ascii));

    out
}
