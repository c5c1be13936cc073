//! Lexical path handling and secure segment validation.
//!
//! Everything here works on raw bytes and never touches the filesystem.
//! All supported encodings are ASCII-compatible, so separators, dots, colons
//! and drive letters have the same byte values in either representation.

use crate::error::{InsecureReason, PathError, Result};
use crate::types::NamingStyle;

/// Windows device names that refer to devices wherever they appear.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// The root prefix of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Root {
    /// Canonical rendering, e.g. `/`, `C:\`, `\\server\share\`.
    prefix: Vec<u8>,
    /// Bytes of the input the prefix was parsed from.
    consumed: usize,
    /// A relative path (or Windows drive-relative `C:`) is not anchored.
    absolute: bool,
}

fn has_drive(path: &[u8]) -> bool {
    path.len() >= 2 && path[0].is_ascii_alphabetic() && path[1] == b':'
}

fn split_root(style: NamingStyle, path: &[u8]) -> Root {
    let sep = style.separator();
    let is_sep = |b: &u8| style.is_separator(*b);
    let leading_seps = |from: usize| path[from..].iter().take_while(|b| is_sep(*b)).count();

    match style {
        NamingStyle::Posix => {
            let n = leading_seps(0);
            if n > 0 {
                Root { prefix: vec![sep], consumed: n, absolute: true }
            } else {
                Root { prefix: Vec::new(), consumed: 0, absolute: false }
            }
        }
        NamingStyle::Windows => {
            // \\server\share
            if path.len() > 2 && is_sep(&path[0]) && is_sep(&path[1]) && !is_sep(&path[2]) {
                let server_end = path[2..]
                    .iter()
                    .position(is_sep)
                    .map_or(path.len(), |i| i + 2);
                let share_start = (server_end + 1).min(path.len());
                let share_end = path[share_start..]
                    .iter()
                    .position(is_sep)
                    .map_or(path.len(), |i| i + share_start);

                let mut prefix = vec![sep, sep];
                prefix.extend_from_slice(&path[2..server_end]);
                prefix.push(sep);
                prefix.extend_from_slice(&path[share_start..share_end]);
                prefix.push(sep);
                let consumed = share_end + leading_seps(share_end);
                return Root { prefix, consumed, absolute: true };
            }
            if has_drive(path) {
                let drive = path[0].to_ascii_uppercase();
                let n = leading_seps(2);
                if n > 0 {
                    return Root { prefix: vec![drive, b':', sep], consumed: 2 + n, absolute: true };
                }
                return Root { prefix: vec![drive, b':'], consumed: 2, absolute: false };
            }
            let n = leading_seps(0);
            if n > 0 {
                Root { prefix: vec![sep], consumed: n, absolute: true }
            } else {
                Root { prefix: Vec::new(), consumed: 0, absolute: false }
            }
        }
    }
}

/// True when `path` is anchored at a root (or, on Windows, a UNC share or
/// a drive with a separator).
pub fn is_absolute(style: NamingStyle, path: &[u8]) -> bool {
    split_root(style, path).absolute
}

/// Lexically normalizes `path`: collapses repeated separators, drops `.`
/// and resolves `..` against the preceding segment.
///
/// `..` at the root is dropped; leading `..` of a relative path is kept.
/// An empty relative result becomes `.`.
pub fn normalize(style: NamingStyle, path: &[u8]) -> Vec<u8> {
    let root = split_root(style, path);
    let mut parts: Vec<&[u8]> = Vec::new();

    for part in path[root.consumed..].split(|b| style.is_separator(*b)) {
        match part {
            b"" | b"." => {}
            b".." => match parts.last() {
                Some(&last) if last != b".." => {
                    parts.pop();
                }
                _ if root.absolute => {}
                _ => parts.push(part),
            },
            _ => parts.push(part),
        }
    }

    let mut out = root.prefix;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(style.separator());
        }
        out.extend_from_slice(part);
    }
    if out.is_empty() {
        out.push(b'.');
    }
    out
}

/// Splits `path` into its canonical root prefix and its non-empty segments.
/// `.` and `..` are returned as they are.
pub fn split_components(style: NamingStyle, path: &[u8]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let root = split_root(style, path);
    let parts = path[root.consumed..]
        .split(|b| style.is_separator(*b))
        .filter(|part| !part.is_empty())
        .map(<[u8]>::to_vec)
        .collect();
    (root.prefix, parts)
}

/// Appends `segment` to `base` with exactly one separator between them.
pub fn join(style: NamingStyle, base: &[u8], segment: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(base.len() + segment.len() + 1);
    out.extend_from_slice(base);
    // `C:` joins without a separator to stay drive-relative.
    let drive_only = style == NamingStyle::Windows && base.len() == 2 && has_drive(base);
    let needs_sep = match base.last() {
        None => false,
        Some(&last) => !style.is_separator(last) && !drive_only,
    };
    if needs_sep {
        out.push(style.separator());
    }
    out.extend_from_slice(segment);
    out
}

/// The directory part of a normalized path. The root is its own dirname.
pub fn dirname(style: NamingStyle, path: &[u8]) -> Vec<u8> {
    let root = split_root(style, path);
    let rest = &path[root.consumed..];
    match rest.iter().rposition(|b| style.is_separator(*b)) {
        Some(i) => path[..root.consumed + i].to_vec(),
        None if root.consumed > 0 => path[..root.consumed].to_vec(),
        None if rest.is_empty() => path.to_vec(),
        None => Vec::new(),
    }
}

/// The final segment of a normalized path. Empty for the root.
pub fn basename(style: NamingStyle, path: &[u8]) -> Vec<u8> {
    let root = split_root(style, path);
    let rest = &path[root.consumed..];
    match rest.iter().rposition(|b| style.is_separator(*b)) {
        Some(i) => rest[i + 1..].to_vec(),
        None => rest.to_vec(),
    }
}

/// True for a normalized path that consists of its root alone.
pub fn is_root(style: NamingStyle, path: &[u8]) -> bool {
    let root = split_root(style, path);
    root.absolute && root.consumed == path.len()
}

/// True when `name` is a Windows device name such as `CON` or `com1.txt`.
///
/// Case and extension are ignored, as is a leading drive prefix (`C:CON`).
pub fn is_reserved_device_name(name: &[u8]) -> bool {
    let name = if has_drive(name) { &name[2..] } else { name };
    let stem = match name.iter().position(|&b| b == b'.') {
        Some(i) => &name[..i],
        None => name,
    };
    // Trailing spaces are ignored by Windows as well.
    let end = stem.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    let stem = &stem[..end];
    RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved.as_bytes()))
}

/// Validates untrusted path segments against an anchor directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureResolver {
    style: NamingStyle,
}

impl SecureResolver {
    pub fn new(style: NamingStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> NamingStyle {
        self.style
    }

    fn insecure(segment: &[u8], reason: InsecureReason) -> PathError {
        PathError::InsecurePath {
            segment: String::from_utf8_lossy(segment).into_owned(),
            reason,
        }
    }

    /// Checks one segment and returns the normalized child of `anchor`.
    pub fn resolve_child(&self, anchor: &[u8], segment: &[u8]) -> Result<Vec<u8>> {
        let style = self.style;

        if segment.is_empty() {
            return Err(Self::insecure(segment, InsecureReason::Empty));
        }
        if segment.iter().any(|b| style.is_separator(*b)) {
            return Err(Self::insecure(segment, InsecureReason::ContainsSeparator));
        }
        if segment.contains(&0) {
            return Err(Self::insecure(segment, InsecureReason::ContainsNul));
        }
        if segment == b"." || segment == b".." {
            return Err(Self::insecure(segment, InsecureReason::DotSegment));
        }
        if style == NamingStyle::Windows {
            if is_reserved_device_name(segment) {
                return Err(Self::insecure(segment, InsecureReason::ReservedDeviceName));
            }
            if has_drive(segment) {
                return Err(Self::insecure(segment, InsecureReason::Absolute));
            }
        }

        let anchor = normalize(style, anchor);
        let candidate = normalize(style, &join(style, &anchor, segment));
        if dirname(style, &candidate) != anchor || basename(style, &candidate) != segment {
            return Err(Self::insecure(segment, InsecureReason::EscapesAnchor));
        }
        Ok(candidate)
    }

    /// Folds [`resolve_child`](Self::resolve_child) over `segments`.
    /// Nothing is returned unless every segment passes.
    pub fn resolve_descendant<S: AsRef<[u8]>>(&self, anchor: &[u8], segments: &[S]) -> Result<Vec<u8>> {
        let mut current = normalize(self.style, anchor);
        for segment in segments {
            current = self.resolve_child(&current, segment.as_ref())?;
        }
        Ok(current)
    }

    /// Resolves a trusted relative path below `anchor`.
    ///
    /// The path may span several segments and contain `.` or `..`, but must
    /// not be absolute and must not end up outside `anchor`. The anchor
    /// itself is an acceptable result.
    pub fn resolve_preauth(&self, anchor: &[u8], relative: &[u8]) -> Result<Vec<u8>> {
        let style = self.style;
        let drive_relative = style == NamingStyle::Windows && has_drive(relative);
        if is_absolute(style, relative) || drive_relative {
            return Err(Self::insecure(relative, InsecureReason::Absolute));
        }

        let anchor = normalize(style, anchor);
        let candidate = normalize(style, &join(style, &anchor, relative));
        if !is_same_or_descendant(style, &anchor, &candidate) {
            return Err(Self::insecure(relative, InsecureReason::EscapesAnchor));
        }
        Ok(candidate)
    }
}

/// True when normalized `path` is `ancestor` or lies below it.
pub fn is_same_or_descendant(style: NamingStyle, ancestor: &[u8], path: &[u8]) -> bool {
    if path == ancestor {
        return true;
    }
    if !path.starts_with(ancestor) {
        return false;
    }
    let ends_with_sep = ancestor.last().is_some_and(|b| style.is_separator(*b));
    ends_with_sep || style.is_separator(path[ancestor.len()])
}
