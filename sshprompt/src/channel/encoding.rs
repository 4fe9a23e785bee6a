//! Text encodings for shell I/O.
//!
//! Decoding comes in two flavours: [`Encoding::decode_strict`], used while
//! data is still arriving (an incomplete multi-byte sequence is not an
//! error, the caller simply waits for more bytes), and
//! [`Encoding::decode_lossy`], used once no more bytes will come.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

/// Character encoding used to decode shell output and encode input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    /// UTF-8 (the default).
    #[default]
    Utf8,

    /// ISO-8859-1. Every byte maps to the code point of the same value.
    Latin1,

    /// 7-bit US-ASCII.
    Ascii,
}

impl Encoding {
    /// Canonical label for this encoding.
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Ascii => "us-ascii",
        }
    }

    /// Decode `data`, returning `None` if any byte sequence is invalid.
    ///
    /// For UTF-8 this includes a sequence truncated at the end of `data`.
    pub fn decode_strict(self, data: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(data).ok().map(str::to_owned),
            Self::Latin1 => Some(data.iter().map(|&b| char::from(b)).collect()),
            Self::Ascii => data
                .is_ascii()
                .then(|| data.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Decode `data`, replacing invalid bytes with U+FFFD.
    pub fn decode_lossy(self, data: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Self::Latin1 => data.iter().map(|&b| char::from(b)).collect(),
            Self::Ascii => data
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
        }
    }

    /// Encode `text`, failing on the first character this encoding cannot
    /// represent.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, DriverError> {
        let limit = match self {
            Self::Utf8 => return Ok(text.as_bytes().to_vec()),
            Self::Latin1 => 0xFF,
            Self::Ascii => 0x7F,
        };

        text.chars()
            .map(|ch| {
                u8::try_from(u32::from(ch))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or(DriverError::Unencodable {
                        ch,
                        encoding: self.label(),
                    })
            })
            .collect()
    }
}

impl FromStr for Encoding {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Ok(Self::Latin1),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(DriverError::invalid_argument(format!(
                "unknown encoding '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = DriverError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Encoding> for String {
    fn from(value: Encoding) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_utf8_success() {
        assert_eq!(Encoding::Utf8.decode_strict(b"hello").as_deref(), Some("hello"));
    }

    #[test]
    fn test_strict_utf8_invalid() {
        assert_eq!(Encoding::Utf8.decode_strict(b"\xff\xff"), None);
    }

    #[test]
    fn test_strict_utf8_truncated_sequence() {
        // "é" is 0xC3 0xA9; only the lead byte has arrived
        assert_eq!(Encoding::Utf8.decode_strict(b"caf\xc3"), None);
        assert_eq!(Encoding::Utf8.decode_strict(b"caf\xc3\xa9").as_deref(), Some("café"));
    }

    #[test]
    fn test_lossy_utf8_replaces_each_invalid_byte() {
        assert_eq!(Encoding::Utf8.decode_lossy(b"\xff\xfe"), "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_latin1_never_fails() {
        assert_eq!(Encoding::Latin1.decode_strict(b"caf\xe9").as_deref(), Some("café"));
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert_eq!(Encoding::Ascii.decode_strict(b"ok\x80"), None);
        assert_eq!(Encoding::Ascii.decode_lossy(b"ok\x80"), "ok\u{FFFD}");
    }

    #[test]
    fn test_encode() {
        assert_eq!(Encoding::Utf8.encode("é").unwrap(), vec![0xC3, 0xA9]);
        assert_eq!(Encoding::Latin1.encode("é").unwrap(), vec![0xE9]);
        assert!(matches!(
            Encoding::Ascii.encode("é"),
            Err(DriverError::Unencodable { ch: 'é', .. })
        ));
        assert!(Encoding::Latin1.encode("€").is_err());
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("latin_1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert_eq!("us-ascii".parse::<Encoding>().unwrap(), Encoding::Ascii);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
