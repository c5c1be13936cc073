//! Filesystem providers for tests: fixed stat results, injected faults and
//! call recording.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::native::NativeFileSystem;
use crate::traits::{FileHandle, FileSystemProvider};
use crate::types::mode_bits::S_IFREG;
use crate::types::{OpenFlags, RawStat};

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "not available in this test provider")
}

fn cross_device_error() -> io::Error {
    #[cfg(unix)]
    {
        io::Error::from_raw_os_error(libc::EXDEV)
    }
    #[cfg(windows)]
    {
        io::Error::from_raw_os_error(17)
    }
    #[cfg(not(any(unix, windows)))]
    {
        io::Error::new(io::ErrorKind::Other, "cross-device link")
    }
}

fn regular_file_stat(mode: u32) -> RawStat {
    let time = UNIX_EPOCH + Duration::from_secs(1_000_000);
    RawStat {
        mode,
        size: 0,
        accessed: time,
        modified: time,
        status_changed: time,
        ino: None,
        dev: None,
        nlink: None,
        uid: None,
        gid: None,
    }
}

/// Answers every stat with one canned result and supports nothing else.
#[derive(Debug)]
pub struct FakeStatFileSystem {
    stat: Option<RawStat>,
}

impl FakeStatFileSystem {
    /// A regular file with distinctive identity fields.
    pub fn with_ids() -> Self {
        let mut stat = regular_file_stat(S_IFREG | 0o644);
        stat.ino = Some(200);
        stat.dev = Some(300);
        stat.nlink = Some(400);
        stat.uid = Some(500);
        stat.gid = Some(600);
        Self { stat: Some(stat) }
    }

    /// A regular file on a platform that reports no identity fields.
    pub fn without_ids() -> Self {
        Self { stat: Some(regular_file_stat(S_IFREG | 0o644)) }
    }

    pub fn with_mode(mode: u32) -> Self {
        Self { stat: Some(regular_file_stat(mode)) }
    }

    /// Every stat fails with a permission error.
    pub fn denied() -> Self {
        Self { stat: None }
    }

    fn answer(&self) -> io::Result<RawStat> {
        self.stat
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::PermissionDenied, "stat denied"))
    }
}

impl FileSystemProvider for FakeStatFileSystem {
    fn stat(&self, _path: &Path) -> io::Result<RawStat> {
        self.answer()
    }

    fn lstat(&self, _path: &Path) -> io::Result<RawStat> {
        self.answer()
    }

    fn open(&self, _path: &Path, _flags: OpenFlags) -> io::Result<Box<dyn FileHandle>> {
        Err(unsupported())
    }

    fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn create_dir(&self, _path: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn remove_dir(&self, _path: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn remove_file(&self, _path: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn symlink(&self, _target: &Path, _link: &Path) -> io::Result<()> {
        Err(unsupported())
    }

    fn read_link(&self, _path: &Path) -> io::Result<PathBuf> {
        Err(unsupported())
    }

    fn set_permissions(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Err(unsupported())
    }

    fn set_times(&self, _path: &Path, _accessed: SystemTime, _modified: SystemTime) -> io::Result<()> {
        Err(unsupported())
    }

    fn list_dir(&self, _path: &Path) -> io::Result<Vec<OsString>> {
        Err(unsupported())
    }
}

/// A handle whose reads and writes always fail. It flags itself closed
/// when dropped.
pub struct ExplodingHandle {
    closed: Arc<AtomicBool>,
}

impl Read for ExplodingHandle {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "read exploded"))
    }
}

impl Write for ExplodingHandle {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "write exploded"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "flush exploded"))
    }
}

impl Drop for ExplodingHandle {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Delegates to the native filesystem, recording calls and injecting the
/// faults it is configured with.
#[derive(Debug, Default)]
pub struct FaultyFileSystem {
    inner: NativeFileSystem,
    exploding_handles: bool,
    files_everywhere: bool,
    unreadable: bool,
    mkdir_errno: Option<i32>,
    cross_device_renames: AtomicUsize,
    opened: Mutex<Vec<(PathBuf, OpenFlags)>>,
    renames: Mutex<Vec<(PathBuf, PathBuf)>>,
    handles: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FaultyFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// `open` hands out [`ExplodingHandle`]s instead of real files.
    pub fn exploding_handles(mut self) -> Self {
        self.exploding_handles = true;
        self
    }

    /// Every path stats as an empty regular file.
    pub fn files_everywhere(mut self) -> Self {
        self.files_everywhere = true;
        self
    }

    /// Opening for reading only fails with `NotFound`.
    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    /// `create_dir` always fails with this OS error code.
    pub fn mkdir_errno(mut self, errno: i32) -> Self {
        self.mkdir_errno = Some(errno);
        self
    }

    /// The next `count` renames fail as if crossing devices.
    pub fn cross_device_renames(self, count: usize) -> Self {
        self.fail_next_renames(count);
        self
    }

    pub fn fail_next_renames(&self, count: usize) {
        self.cross_device_renames.store(count, Ordering::SeqCst);
    }

    pub fn opened_paths(&self) -> Vec<PathBuf> {
        lock(&self.opened).iter().map(|(path, _)| path.clone()).collect()
    }

    /// Every rename attempted, failed ones included.
    pub fn renames(&self) -> Vec<(PathBuf, PathBuf)> {
        lock(&self.renames).clone()
    }

    pub fn handle_count(&self) -> usize {
        lock(&self.handles).len()
    }

    pub fn all_handles_closed(&self) -> bool {
        lock(&self.handles).iter().all(|closed| closed.load(Ordering::SeqCst))
    }

    fn take_rename_fault(&self) -> bool {
        self.cross_device_renames
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl FileSystemProvider for FaultyFileSystem {
    fn stat(&self, path: &Path) -> io::Result<RawStat> {
        if self.files_everywhere {
            return Ok(regular_file_stat(S_IFREG | 0o644));
        }
        self.inner.stat(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<RawStat> {
        if self.files_everywhere {
            return Ok(regular_file_stat(S_IFREG | 0o644));
        }
        self.inner.lstat(path)
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> io::Result<Box<dyn FileHandle>> {
        lock(&self.opened).push((path.to_path_buf(), flags));
        if self.unreadable && !flags.modifies() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "unreadable"));
        }
        if self.exploding_handles {
            let closed = Arc::new(AtomicBool::new(false));
            lock(&self.handles).push(Arc::clone(&closed));
            return Ok(Box::new(ExplodingHandle { closed }));
        }
        self.inner.open(path, flags)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        lock(&self.renames).push((from.to_path_buf(), to.to_path_buf()));
        if self.take_rename_fault() {
            return Err(cross_device_error());
        }
        self.inner.rename(from, to)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        if let Some(errno) = self.mkdir_errno {
            return Err(io::Error::from_raw_os_error(errno));
        }
        self.inner.create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_dir(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.inner.remove_file(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.inner.symlink(target, link)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.inner.read_link(path)
    }

    fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.set_permissions(path, mode)
    }

    fn set_times(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> io::Result<()> {
        self.inner.set_times(path, accessed, modified)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        if self.files_everywhere {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        self.inner.list_dir(path)
    }
}
