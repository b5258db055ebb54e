//! Filename decoding and normalization
//!
//! Local filesystems hand out names as raw bytes. Everything past the local
//! walk works with validated Unicode, so the walk decodes each name once
//! through [`decode_name`] using a fixed fallback chain:
//!
//! 1. strict UTF-8
//! 2. Latin-1 / Windows-1252 heuristic: accepted only when no byte falls in
//!    the C1 control range `0x80..=0x9F` and at least one byte is `>= 0xA0`
//! 3. lossy UTF-8, invalid sequences replaced by U+FFFD
//!
//! Names are compared in NFC on both sides ([`normalize`]).

use unicode_normalization::{is_nfc, UnicodeNormalization};

/// How a name was decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    Utf8,
    Latin1,
    Lossy,
}

/// A decoded filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub name: String,
    pub decoding: Decoding,
}

/// Decodes raw filename bytes with the fallback chain
#[must_use]
pub fn decode_name(raw: &[u8]) -> DecodedName {
    if let Ok(name) = std::str::from_utf8(raw) {
        return DecodedName {
            name: name.to_string(),
            decoding: Decoding::Utf8,
        };
    }

    if looks_like_latin1(raw) {
        return DecodedName {
            name: raw.iter().map(|&b| char::from(b)).collect(),
            decoding: Decoding::Latin1,
        };
    }

    DecodedName {
        name: String::from_utf8_lossy(raw).into_owned(),
        decoding: Decoding::Lossy,
    }
}

fn looks_like_latin1(raw: &[u8]) -> bool {
    let has_c1 = raw.iter().any(|b| (0x80..=0x9F).contains(b));
    let has_high = raw.iter().any(|&b| b >= 0xA0);
    !has_c1 && has_high
}

/// Canonical composed form used for every name comparison
#[must_use]
pub fn normalize(name: &str) -> String {
    if is_nfc(name) {
        name.to_string()
    } else {
        name.nfc().collect()
    }
}

/// Decode then normalize; the form used as a set key and remote name
#[must_use]
pub fn comparable_name(raw: &[u8]) -> String {
    normalize(&decode_name(raw).name)
}
