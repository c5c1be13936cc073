//! Error types for PathGuard.

use crate::types::Encoding;
use std::fmt;
use std::io;
use thiserror::Error;

/// Why a path segment was refused by the secure resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsecureReason {
    /// The segment is empty.
    Empty,
    /// The segment contains a path separator.
    ContainsSeparator,
    /// The segment contains a NUL byte.
    ContainsNul,
    /// The segment is `.` or `..`.
    DotSegment,
    /// The segment looks like an absolute path or carries a drive prefix.
    Absolute,
    /// The segment names a Windows device (CON, NUL, COM1, ...).
    ReservedDeviceName,
    /// The segment resolves outside of its anchor directory.
    EscapesAnchor,
    /// A root path is relative and there is no current directory to anchor
    /// it to under the configured naming style.
    Relative,
}

impl fmt::Display for InsecureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsecureReason::Empty => write!(f, "empty segment"),
            InsecureReason::ContainsSeparator => write!(f, "contains a path separator"),
            InsecureReason::ContainsNul => write!(f, "contains a NUL byte"),
            InsecureReason::DotSegment => write!(f, "relative dot segment"),
            InsecureReason::Absolute => write!(f, "absolute or drive-qualified segment"),
            InsecureReason::ReservedDeviceName => write!(f, "reserved device name"),
            InsecureReason::EscapesAnchor => write!(f, "escapes the anchor directory"),
            InsecureReason::Relative => write!(f, "relative root path"),
        }
    }
}

/// Comprehensive error type for all PathGuard operations.
#[derive(Debug, Error)]
pub enum PathError {
    /// A derived path segment would escape its anchor or is otherwise unsafe.
    #[error("Insecure path segment '{segment}': {reason}")]
    InsecurePath {
        segment: String,
        reason: InsecureReason,
    },

    /// Text or bytes could not be represented in the requested encoding.
    #[error("Cannot represent '{value}' using {encoding}")]
    Encoding {
        value: String,
        encoding: Encoding,
    },

    /// File or directory not found.
    #[error("Path not found: {path}")]
    NotFound {
        path: String,
        #[source]
        source: io::Error,
    },

    /// File or directory already exists.
    #[error("Path already exists: {path}")]
    AlreadyExists {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Expected a directory but found something else.
    #[error("Not a directory: {path}")]
    NotADirectory {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The platform does not provide what the operation needs.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        operation: &'static str,
    },

    /// A chain of symbolic links loops back on itself.
    #[error("Symbolic link cycle detected at {path}")]
    LinkCycle {
        path: String,
    },

    /// `segments_from` was given a path that does not contain the receiver.
    #[error("'{ancestor}' is not an ancestor of '{path}'")]
    NotAncestor {
        ancestor: String,
        path: String,
    },

    /// Any other error from the underlying system.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A path could not be persisted or restored.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PathError {
    /// Wraps an OS error, picking the typed variant that matches it.
    ///
    /// The original `io::Error` is kept as the source so callers handling the
    /// generic category still see the same errno and message.
    pub fn from_io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            PathError::NotFound { path, source }
        } else if source.kind() == io::ErrorKind::AlreadyExists {
            PathError::AlreadyExists { path, source }
        } else if is_not_a_directory(&source) {
            PathError::NotADirectory { path, source }
        } else {
            PathError::Io { path, source }
        }
    }

    /// Returns the wrapped OS error, if this error came from one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            PathError::NotFound { source, .. }
            | PathError::AlreadyExists { source, .. }
            | PathError::NotADirectory { source, .. }
            | PathError::Io { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The errno (or Windows error code) of the wrapped OS error.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    /// The `io::ErrorKind` this error corresponds to.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            PathError::InsecurePath { .. } => io::ErrorKind::PermissionDenied,
            PathError::Encoding { .. } => io::ErrorKind::InvalidData,
            PathError::Unsupported { .. } => io::ErrorKind::Unsupported,
            PathError::LinkCycle { .. } => io::ErrorKind::Other,
            PathError::NotAncestor { .. } => io::ErrorKind::InvalidInput,
            PathError::Serialization(_) => io::ErrorKind::InvalidData,
            other => other
                .io_error()
                .map(io::Error::kind)
                .unwrap_or(io::ErrorKind::Other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PathError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, PathError::AlreadyExists { .. })
    }
}

impl From<PathError> for io::Error {
    fn from(err: PathError) -> Self {
        match err {
            PathError::NotFound { source, .. }
            | PathError::AlreadyExists { source, .. }
            | PathError::NotADirectory { source, .. }
            | PathError::Io { source, .. } => source,
            other => io::Error::new(other.kind(), other),
        }
    }
}

/// A cloneable record of an OS error, kept by the stat cache when a
/// non-raising restat fails for a reason other than "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsErrorInfo {
    pub kind: io::ErrorKind,
    pub raw_os_error: Option<i32>,
    pub message: String,
}

impl OsErrorInfo {
    /// Rebuilds an `io::Error` with the same errno (or kind) and message.
    pub fn to_io_error(&self) -> io::Error {
        match self.raw_os_error {
            Some(code) => io::Error::from_raw_os_error(code),
            None => io::Error::new(self.kind, self.message.clone()),
        }
    }
}

impl From<&io::Error> for OsErrorInfo {
    fn from(err: &io::Error) -> Self {
        Self {
            kind: err.kind(),
            raw_os_error: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for OsErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Result type alias for PathGuard operations.
pub type Result<T> = std::result::Result<T, PathError>;

/// True for "no such file" and for "a component is not a directory"; both
/// mean the entry does not exist.
pub(crate) fn is_missing(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || is_not_a_directory(err)
}

pub(crate) fn is_not_a_directory(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::ENOTDIR)
    }
    #[cfg(windows)]
    {
        // ERROR_DIRECTORY
        err.raw_os_error() == Some(267)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// True when a rename failed because source and destination live on
/// different devices.
pub(crate) fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EXDEV)
    }
    #[cfg(windows)]
    {
        // ERROR_NOT_SAME_DEVICE
        err.raw_os_error() == Some(17)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// An ENOENT error, built from the platform errno where there is one.
pub(crate) fn not_found_error() -> io::Error {
    #[cfg(unix)]
    {
        io::Error::from_raw_os_error(libc::ENOENT)
    }
    #[cfg(not(unix))]
    {
        io::Error::new(io::ErrorKind::NotFound, "No such file or directory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PathError::InsecurePath {
            segment: "..".to_string(),
            reason: InsecureReason::DotSegment,
        };
        assert_eq!(err.to_string(), "Insecure path segment '..': relative dot segment");

        let err = PathError::Encoding {
            value: "\u{2603}".to_string(),
            encoding: Encoding::Ascii,
        };
        assert_eq!(err.to_string(), "Cannot represent '\u{2603}' using ascii");

        let err = PathError::Unsupported { operation: "inode" };
        assert_eq!(err.to_string(), "Unsupported operation: inode");

        let err = PathError::LinkCycle { path: "/tmp/loop".to_string() };
        assert_eq!(err.to_string(), "Symbolic link cycle detected at /tmp/loop");

        let err = PathError::NotAncestor {
            ancestor: "/d/c/e".to_string(),
            path: "/a/b/c".to_string(),
        };
        assert_eq!(err.to_string(), "'/d/c/e' is not an ancestor of '/a/b/c'");
    }

    #[test]
    fn test_from_io_picks_typed_variant() {
        let err = PathError::from_io(
            "/missing",
            io::Error::new(io::ErrorKind::NotFound, "file not found"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Path not found: /missing");

        let err = PathError::from_io(
            "/there",
            io::Error::new(io::ErrorKind::AlreadyExists, "exists"),
        );
        assert!(err.is_already_exists());

        let err = PathError::from_io(
            "/denied",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, PathError::Io { .. }));
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[cfg(unix)]
    #[test]
    fn test_wrapping_preserves_os_attributes() {
        let original = io::Error::from_raw_os_error(libc::ENOTDIR);
        let message = original.to_string();
        let err = PathError::from_io("/file/child", original);

        assert!(matches!(err, PathError::NotADirectory { .. }));
        assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));

        let back: io::Error = err.into();
        assert_eq!(back.raw_os_error(), Some(libc::ENOTDIR));
        assert_eq!(back.to_string(), message);
    }

    #[test]
    fn test_non_io_errors_convert_with_kind() {
        let err = PathError::NotAncestor {
            ancestor: "/x".to_string(),
            path: "/y".to_string(),
        };
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn test_os_error_info_round_trip() {
        let err = io::Error::from_raw_os_error(libc::EACCES);
        let info = OsErrorInfo::from(&err);
        assert_eq!(info.kind, io::ErrorKind::PermissionDenied);
        assert_eq!(info.to_io_error().raw_os_error(), Some(libc::EACCES));
    }

    #[cfg(unix)]
    #[test]
    fn test_error_classifiers() {
        assert!(is_cross_device(&io::Error::from_raw_os_error(libc::EXDEV)));
        assert!(!is_cross_device(&io::Error::from_raw_os_error(libc::EACCES)));
        assert!(is_missing(&io::Error::from_raw_os_error(libc::ENOTDIR)));
        assert!(is_missing(&not_found_error()));
        assert_eq!(not_found_error().raw_os_error(), Some(libc::ENOENT));
    }
}
