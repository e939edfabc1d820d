// src/readers/bytescan.rs

//! Bounded byte-scanning primitives shared by the text readers.
//!
//! All scanning works on explicit `(buffer, start, end)` index ranges into
//! a borrowed byte slice. Nothing here touches a file or a socket; callers
//! hand in whatever window of bytes they currently hold.

use crate::common::BufIndex;

use ::bstr::ByteSlice;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// whitespace
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Is the byte whitespace as the text record format understands it?
///
/// Space, horizontal tab, newline, vertical tab, form feed, carriage return.
pub const fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

/// Index of the first non-whitespace byte in `buf[at..end]`, else `end`.
pub fn skip_space_fwd(
    buf: &[u8],
    at: BufIndex,
    end: BufIndex,
) -> BufIndex {
    let mut bi: BufIndex = at;
    while bi < end && is_space(buf[bi]) {
        bi += 1;
    }

    bi
}

/// Index of the last non-whitespace byte in `buf[start..end]`, else `None`
/// when that range is whitespace only (or empty).
pub fn rfind_non_space(
    buf: &[u8],
    start: BufIndex,
    end: BufIndex,
) -> Option<BufIndex> {
    let mut bi: BufIndex = end;
    while bi > start {
        bi -= 1;
        if !is_space(buf[bi]) {
            return Some(bi);
        }
    }

    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// tokens
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Slice out the next token in `buf[at..end]`.
///
/// A token starts at the first non-whitespace byte and runs up to (not
/// including) the next whitespace byte. A `'<'` also terminates a token,
/// except in first position where it begins a tag token that runs to just
/// past its `'>'` (a closing tag is one token).
///
/// Returns the `(start, end)` index pair of the token, or `None` when
/// `buf[at..end]` is whitespace only.
pub fn next_token(
    buf: &[u8],
    at: BufIndex,
    end: BufIndex,
) -> Option<(BufIndex, BufIndex)> {
    let beg: BufIndex = skip_space_fwd(buf, at, end);
    if beg == end {
        return None;
    }
    let mut bi: BufIndex = beg;
    if buf[bi] == b'<' {
        // tag token; runs through its '>' or to the window end
        while bi < end {
            if buf[bi] == b'>' {
                return Some((beg, bi + 1));
            }
            bi += 1;
        }
        return Some((beg, end));
    }
    while bi < end && !is_space(buf[bi]) && buf[bi] != b'<' {
        bi += 1;
    }

    Some((beg, bi))
}

/// Parse a token as a `f64`.
///
/// The caller already delimited the token; leading/trailing whitespace is
/// not tolerated here.
pub fn parse_f64(token: &[u8]) -> Result<f64, String> {
    let s: &str = match token.to_str() {
        Ok(val) => val,
        Err(_) => {
            return Err(format!("not utf-8: {:?}", token.as_bstr()));
        }
    };
    match s.parse::<f64>() {
        Ok(val) => Ok(val),
        Err(_) => Err(format!("not a number: {:?}", s)),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// tags and attributes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Is `buf[at..end]` a well-formed `</r>` closing tag, modulo interior
/// whitespace and the case of the tag letter?
///
/// `scratch` is the caller's lazily-grown tag buffer; the token is
/// materialized into it with whitespace stripped, then compared. Reusing one
/// scratch buffer across calls avoids per-token allocation.
pub fn is_closing_r_tag(
    buf: &[u8],
    at: BufIndex,
    end: BufIndex,
    scratch: &mut Vec<u8>,
) -> bool {
    scratch.clear();
    for bi in at..end {
        if !is_space(buf[bi]) {
            scratch.push(buf[bi].to_ascii_lowercase());
        }
    }

    scratch.as_slice() == b"</r>"
}

/// One `name="value"` attribute scanned from a tag interior.
pub type Attribute = (String, String);

/// Scan the interior of an opening tag, `buf[at..end]`, into its attributes.
///
/// `at..end` must cover only the region after the tag letter and before the
/// closing `'>'`. Attributes are `name="value"` pairs: whitespace-tolerant
/// around the `'='`, names unquoted, values double-quoted. Order is
/// preserved. Anything that is not a well-formed pair is an error.
pub fn scan_attributes(
    buf: &[u8],
    at: BufIndex,
    end: BufIndex,
) -> Result<Vec<Attribute>, String> {
    defñ!("({}‥{})", at, end);
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut bi: BufIndex = skip_space_fwd(buf, at, end);
    while bi < end {
        // attribute name
        let name_beg: BufIndex = bi;
        while bi < end && !is_space(buf[bi]) && buf[bi] != b'=' {
            bi += 1;
        }
        if name_beg == bi {
            return Err(format!(
                "expected an attribute name, found {:?}",
                buf[bi..end].as_bstr()
            ));
        }
        let name: String = match buf[name_beg..bi].to_str() {
            Ok(val) => String::from(val),
            Err(_) => {
                return Err(format!(
                    "attribute name is not utf-8: {:?}",
                    buf[name_beg..bi].as_bstr()
                ));
            }
        };
        // '='
        bi = skip_space_fwd(buf, bi, end);
        if bi == end || buf[bi] != b'=' {
            return Err(format!("attribute {:?} has no '='", name));
        }
        bi += 1;
        // opening quote
        bi = skip_space_fwd(buf, bi, end);
        if bi == end || buf[bi] != b'"' {
            return Err(format!("attribute {:?} has no opening quote", name));
        }
        bi += 1;
        // value, up to the closing quote
        let value_beg: BufIndex = bi;
        while bi < end && buf[bi] != b'"' {
            bi += 1;
        }
        if bi == end {
            return Err(format!("attribute {:?} has no closing quote", name));
        }
        let value: String = match buf[value_beg..bi].to_str() {
            Ok(val) => String::from(val),
            Err(_) => {
                return Err(format!(
                    "attribute {:?} value is not utf-8: {:?}",
                    name,
                    buf[value_beg..bi].as_bstr()
                ));
            }
        };
        bi += 1;
        attributes.push((name, value));
        bi = skip_space_fwd(buf, bi, end);
    }

    Ok(attributes)
}
