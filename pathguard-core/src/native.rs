//! [`FileSystemProvider`] backed by the host filesystem through `std::fs`.

use std::ffi::OsString;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::trace;

use crate::traits::{FileHandle, FileSystemProvider};
use crate::types::{OpenFlags, RawStat};

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFileSystem;

impl NativeFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
fn raw_stat(meta: &fs::Metadata) -> RawStat {
    use std::os::unix::fs::MetadataExt;

    RawStat {
        mode: meta.mode(),
        size: meta.size(),
        accessed: unix_time(meta.atime(), meta.atime_nsec()),
        modified: unix_time(meta.mtime(), meta.mtime_nsec()),
        status_changed: unix_time(meta.ctime(), meta.ctime_nsec()),
        ino: Some(meta.ino()),
        dev: Some(meta.dev()),
        nlink: Some(meta.nlink()),
        uid: Some(meta.uid()),
        gid: Some(meta.gid()),
    }
}

#[cfg(unix)]
fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    use std::time::{Duration, UNIX_EPOCH};

    let nanos = Duration::from_nanos(nsecs.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nanos
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos
    }
}

/// Windows has no mode word; synthesize one with the same type bits and a
/// permission set derived from the read-only attribute.
#[cfg(not(unix))]
fn raw_stat(meta: &fs::Metadata) -> RawStat {
    use crate::types::mode_bits::{S_IFDIR, S_IFLNK, S_IFREG};

    let file_type = meta.file_type();
    let type_bits = if file_type.is_symlink() {
        S_IFLNK
    } else if file_type.is_dir() {
        S_IFDIR
    } else {
        S_IFREG
    };
    let perm_bits = match (meta.permissions().readonly(), file_type.is_dir()) {
        (true, true) => 0o555,
        (true, false) => 0o444,
        (false, true) => 0o777,
        (false, false) => 0o666,
    };
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    RawStat {
        mode: type_bits | perm_bits,
        size: meta.len(),
        accessed: meta.accessed().unwrap_or(modified),
        modified,
        status_changed: meta.created().unwrap_or(modified),
        ino: None,
        dev: None,
        nlink: None,
        uid: None,
        gid: None,
    }
}

impl FileSystemProvider for NativeFileSystem {
    fn stat(&self, path: &Path) -> io::Result<RawStat> {
        fs::metadata(path).map(|meta| raw_stat(&meta))
    }

    fn lstat(&self, path: &Path) -> io::Result<RawStat> {
        fs::symlink_metadata(path).map(|meta| raw_stat(&meta))
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn FileHandle>> {
        trace!("Opening {:?} with {}", path, flags);
        let file = OpenOptions::new()
            .read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .append(flags.contains(OpenFlags::APPEND))
            .truncate(flags.contains(OpenFlags::TRUNCATE))
            .create(flags.contains(OpenFlags::CREATE) && !flags.contains(OpenFlags::EXCLUSIVE))
            .create_new(flags.contains(OpenFlags::EXCLUSIVE))
            .open(path)?;
        Ok(Box::new(file))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    #[cfg(unix)]
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        if fs::metadata(target).map(|m| m.is_dir()).unwrap_or(false) {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _target: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "symbolic links are not supported"))
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    #[cfg(unix)]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(path, perms)
    }

    fn set_times(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> io::Result<()> {
        let file = File::options().write(true).open(path).or_else(|_| File::open(path))?;
        file.set_times(FileTimes::new().set_accessed(accessed).set_modified(modified))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let mut names = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }
}
