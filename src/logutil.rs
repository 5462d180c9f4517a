//! Logging utilities for keeping raw byte traffic readable in single-line logs.

/// Render up to `max` bytes of `data` as a compact hex string for trace
/// logging, with an ellipsis when the buffer was longer.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    let mut out = data
        .iter()
        .take(max.min(data.len()))
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > max {
        out.push('…');
    }
    out
}
