//! CRLF-terminated name-value blocks.
//!
//! The `client` and `server` envelope fields and every server reply carry a
//! block of `name=value` lines joined by `\r\n`, with a trailing `\r\n`
//! after the last line. The name is the substring up to the first `=`;
//! everything after it is the value, so values may themselves contain `=`.
//!
//! The encoder emits fields in the order given; the decoder does not depend
//! on order.

use crate::error::WireError;
use std::collections::HashMap;

/// Parse a name-value block into a map.
///
/// Blank lines are ignored. A non-blank line without `=` is an error.
pub fn parse(block: &str) -> Result<HashMap<String, String>, WireError> {
    let mut map = HashMap::new();
    for line in block.split("\r\n").flat_map(|l| l.split('\n')) {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| WireError::MalformedLine(line.to_string()))?;
        map.insert(name.to_string(), value.to_string());
    }
    Ok(map)
}

/// Encode ordered pairs as a name-value block, including the terminating
/// `\r\n` on the last line.
pub fn encode<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (name, value) in pairs {
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        out.push_str("\r\n");
    }
    out
}

/// Fetch a required field from a parsed block.
pub fn required<'a>(
    map: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a str, WireError> {
    map.get(field)
        .map(String::as_str)
        .ok_or(WireError::MissingField(field))
}
