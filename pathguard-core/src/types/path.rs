use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PathError, Result};

/// Whether a path is held as decoded text or as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationMode {
    Text,
    Bytes,
}

impl fmt::Display for RepresentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepresentationMode::Text => write!(f, "text"),
            RepresentationMode::Bytes => write!(f, "bytes"),
        }
    }
}

/// Codec used when converting between text and bytes representations.
///
/// All supported codecs are ASCII-compatible, so separators and dots keep
/// their byte values in either representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin-1",
        }
    }

    /// Encodes text into bytes.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(self.unrepresentable(text))
                }
            }
            Encoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| self.unrepresentable(text)))
                .collect(),
        }
    }

    /// Decodes bytes into text.
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_owned)
                .map_err(|_| self.unrepresentable(&String::from_utf8_lossy(bytes))),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    // ASCII is a subset of UTF-8.
                    Ok(bytes.iter().map(|&b| char::from(b)).collect())
                } else {
                    Err(self.unrepresentable(&bytes.escape_ascii().to_string()))
                }
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    fn unrepresentable(self, value: &str) -> PathError {
        PathError::Encoding {
            value: value.to_string(),
            encoding: self,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "ascii" | "us-ascii" => Ok(Encoding::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Encoding::Latin1),
            _ => Err(format!("Unknown encoding: {}", s)),
        }
    }
}

/// A path, or a piece of one, in either representation mode.
///
/// Used for whole paths as well as for the segments, basenames and
/// extensions handed to and returned from [`FilePath`](crate::FilePath).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "path", rename_all = "lowercase")]
pub enum PathString {
    Text(String),
    Bytes(#[serde(with = "serde_bytes_vec")] Vec<u8>),
}

impl PathString {
    pub fn mode(&self) -> RepresentationMode {
        match self {
            PathString::Text(_) => RepresentationMode::Text,
            PathString::Bytes(_) => RepresentationMode::Bytes,
        }
    }

    /// The raw bytes. For text this is the UTF-8 encoding.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PathString::Text(s) => s.as_bytes(),
            PathString::Bytes(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PathString::Text(s) => Some(s),
            PathString::Bytes(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            PathString::Text(s) => Cow::Borrowed(s),
            PathString::Bytes(b) => String::from_utf8_lossy(b),
        }
    }

    /// Converts into the given mode, using `encoding` when the mode changes.
    pub fn into_mode(self, mode: RepresentationMode, encoding: Encoding) -> Result<PathString> {
        match (self, mode) {
            (PathString::Text(s), RepresentationMode::Bytes) => {
                encoding.encode(&s).map(PathString::Bytes)
            }
            (PathString::Bytes(b), RepresentationMode::Text) => {
                encoding.decode(&b).map(PathString::Text)
            }
            (same, _) => Ok(same),
        }
    }

    /// Builds a value of `mode` from raw bytes already in that mode's form.
    ///
    /// Text mode requires the bytes to be UTF-8.
    pub(crate) fn from_raw(mode: RepresentationMode, raw: Vec<u8>) -> Result<PathString> {
        match mode {
            RepresentationMode::Bytes => Ok(PathString::Bytes(raw)),
            RepresentationMode::Text => String::from_utf8(raw)
                .map(PathString::Text)
                .map_err(|e| PathError::Encoding {
                    value: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                    encoding: Encoding::Utf8,
                }),
        }
    }
}

impl fmt::Debug for PathString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathString::Text(s) => write!(f, "\"{}\"", s.escape_debug()),
            PathString::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
        }
    }
}

impl fmt::Display for PathString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

impl From<&str> for PathString {
    fn from(s: &str) -> Self {
        PathString::Text(s.to_string())
    }
}

impl From<String> for PathString {
    fn from(s: String) -> Self {
        PathString::Text(s)
    }
}

impl From<&String> for PathString {
    fn from(s: &String) -> Self {
        PathString::Text(s.clone())
    }
}

impl From<&[u8]> for PathString {
    fn from(b: &[u8]) -> Self {
        PathString::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for PathString {
    fn from(b: &[u8; N]) -> Self {
        PathString::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for PathString {
    fn from(b: Vec<u8>) -> Self {
        PathString::Bytes(b)
    }
}

impl From<&PathString> for PathString {
    fn from(p: &PathString) -> Self {
        p.clone()
    }
}

/// Serializes byte paths as a byte sequence rather than a list of numbers in
/// formats that distinguish the two.
mod serde_bytes_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<u8>::deserialize(deserializer)
    }
}
