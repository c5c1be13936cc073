//! The filesystem capability that every path operation goes through.
//!
//! Production code uses [`NativeFileSystem`](crate::native::NativeFileSystem);
//! tests plug in providers that inject faults or record calls.

use std::ffi::OsString;
use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::types::{OpenFlags, RawStat};

/// An open file. Dropping it closes it.
pub trait FileHandle: Read + Write + Send {}

impl<T: Read + Write + Send> FileHandle for T {}

/// Low-level filesystem operations used by [`FilePath`](crate::FilePath).
///
/// Implementations report failures as plain `io::Error`s carrying the OS
/// error code; the path layer wraps them into typed errors.
pub trait FileSystemProvider: Debug + Send + Sync {
    /// Stats the entry, following symbolic links.
    fn stat(&self, path: &Path) -> io::Result<RawStat>;

    /// Stats the entry itself without following a final symbolic link.
    fn lstat(&self, path: &Path) -> io::Result<RawStat>;

    /// Opens a file.
    ///
    /// # Arguments
    /// * `path` - Path to the file to open
    /// * `flags` - Flags controlling how the file is opened
    fn open(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn FileHandle>>;

    /// Renames `from` to `to`, replacing `to` if the platform allows it.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Removes an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Removes a file or a symbolic link.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Creates a symbolic link.
    ///
    /// # Arguments
    /// * `target` - What the link points to
    /// * `link` - Where the link is created
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Sets the permission bits of the entry.
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Sets access and modification times.
    fn set_times(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> io::Result<()>;

    /// Lists the names in a directory, excluding `.` and `..`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;
}
