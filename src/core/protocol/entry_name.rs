//! Percent-encoding of entry and label names inside header tokens.
//!
//! Bytes outside the HTTP token character set are written as `%XX` with
//! uppercase hex digits. `%` itself is always escaped so that every string
//! survives an encode/decode round trip.

use crate::core::error::{ReductError, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Token characters (RFC 9110) that are written as is.
const TOKEN_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'*')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

pub fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, TOKEN_SET).to_string()
}

/// Decode a percent-encoded name.
///
/// Every `%` must be followed by two hex digits and the decoded bytes must be
/// valid UTF-8.
pub fn decode_name(encoded: &str) -> Result<String> {
    let bytes = encoded.as_bytes();
    let mut pos = 0;
    while let Some(offset) = bytes[pos..].iter().position(|b| *b == b'%') {
        let at = pos + offset;
        let valid = bytes.len() > at + 2
            && bytes[at + 1].is_ascii_hexdigit()
            && bytes[at + 2].is_ascii_hexdigit();
        if !valid {
            return Err(ReductError::WireFormat(format!(
                "Invalid percent escape in '{}'",
                encoded
            )));
        }
        pos = at + 3;
    }

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| ReductError::WireFormat(format!("Name '{}' is not valid UTF-8", encoded)))
}

/// Encode a list of names as a comma-joined header value.
pub fn encode_name_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names.into_iter().map(encode_name).collect::<Vec<_>>().join(",")
}

/// Decode a comma-joined header value of encoded names.
pub fn decode_name_list(value: &str) -> Result<Vec<String>> {
    value.split(',').map(|name| decode_name(name.trim())).collect()
}
