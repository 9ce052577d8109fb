//! Text encoding detection and decoding.
//!
//! Accounting exports arrive as UTF-8 (with or without BOM), UTF-16 from
//! some Windows tools, or legacy Windows-1252 / ISO-8859 (most FEC files
//! produced by French accounting packages).

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::Serialize;
use std::borrow::Cow;

use crate::error::{Error, Result};

/// Encoding actually used to decode a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedEncoding {
    /// WHATWG encoding name, e.g. `UTF-8` or `windows-1252`.
    pub name: &'static str,
    /// A byte-order mark was present and stripped.
    pub had_bom: bool,
    /// Malformed sequences were replaced with U+FFFD.
    pub lossy: bool,
}

/// Guess the encoding of `bytes` without decoding them.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        WINDOWS_1252
    }
}

/// Decode `bytes` to text.
///
/// `forced` is an encoding label (`"latin1"`, `"iso-8859-15"`, ...) that
/// bypasses detection. A BOM is stripped in every case.
pub fn decode<'a>(bytes: &'a [u8], forced: Option<&str>) -> Result<(Cow<'a, str>, DetectedEncoding)> {
    let bom = Encoding::for_bom(bytes);

    let encoding = match forced {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::InvalidEncoding(label.to_string()))?,
        None => detect_encoding(bytes),
    };

    let (body, had_bom) = match bom {
        Some((bom_encoding, len)) if bom_encoding == encoding => (&bytes[len..], true),
        _ => (bytes, false),
    };

    let (text, lossy) = encoding.decode_without_bom_handling(body);

    Ok((
        text,
        DetectedEncoding {
            name: encoding.name(),
            had_bom,
            lossy,
        },
    ))
}
