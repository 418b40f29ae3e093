//! Pure SSE wire framing (component A).
//!
//! `format` never validates its input — the controller is trusted, per
//! the design notes. A `name` containing a newline produces a malformed
//! event on purpose; that is the controller's problem, not ours.

/// The literal heartbeat frame. Not produced via [`format`]; it carries
/// no `data:` lines at all, just the SSE comment syntax.
pub const HEARTBEAT: &[u8] = b": heartbeat\n\n";

/// Render `(name, data)` into a spec-compliant SSE event block.
///
/// `data` is split on `\n` and each segment becomes its own `data:` line;
/// an empty `data` still produces exactly one empty `data: ` line. The
/// block always ends with a blank line (two trailing newlines total).
pub fn format(name: Option<&str>, data: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    if let Some(name) = name {
        if !name.is_empty() {
            out.extend_from_slice(b"event: ");
            out.extend_from_slice(name.as_bytes());
            out.push(b'\n');
        }
    }
    for segment in data.split('\n') {
        out.extend_from_slice(b"data: ");
        out.extend_from_slice(segment.as_bytes());
        out.push(b'\n');
    }
    out.push(b'\n');
    out
}
