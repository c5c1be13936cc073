//! Cached stat results and the metadata accessors built on them.

use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use super::FilePath;
use crate::error::{is_missing, not_found_error, OsErrorInfo, PathError, Result};
use crate::traits::FileSystemProvider;
use crate::types::{Permissions, RawStat};

/// What `lstat` (and `stat`, for a symbolic link) reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSnapshot {
    /// The entry itself, links not followed.
    pub entry: RawStat,
    /// The link target when `entry` is a symbolic link that resolves.
    pub target: Option<RawStat>,
}

impl StatSnapshot {
    /// Stats `path` through `provider`.
    pub fn capture(provider: &dyn FileSystemProvider, path: &Path) -> io::Result<Self> {
        let entry = provider.lstat(path)?;
        let target = if entry.is_symlink() {
            match provider.stat(path) {
                Ok(target) => Some(target),
                Err(e) => {
                    trace!("Link {:?} does not resolve: {}", path, e);
                    None
                }
            }
        } else {
            None
        };
        Ok(Self { entry, target })
    }

    /// The metadata links are followed to. A dangling link resolves to
    /// itself.
    pub fn resolved(&self) -> &RawStat {
        self.target.as_ref().unwrap_or(&self.entry)
    }

    pub fn is_dangling(&self) -> bool {
        self.entry.is_symlink() && self.target.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheState {
    /// Nothing cached; the next accessor stats.
    #[default]
    Unknown,
    Present(StatSnapshot),
    /// The entry does not exist.
    Absent,
    /// A non-raising restat failed for another reason.
    Failed(OsErrorInfo),
}

/// The stat cache owned by one [`FilePath`].
#[derive(Debug, Clone, Default)]
pub struct StatCache {
    state: CacheState,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.state, CacheState::Unknown)
    }

    pub fn invalidate(&mut self) {
        self.state = CacheState::Unknown;
    }

    /// Stores the outcome of a stat.
    ///
    /// "Not found" always becomes `Absent`. Other errors are handed back
    /// untouched when `reraise` is set and stored as `Failed` otherwise.
    pub fn record(&mut self, outcome: io::Result<StatSnapshot>, reraise: bool) -> io::Result<()> {
        match outcome {
            Ok(snapshot) => self.state = CacheState::Present(snapshot),
            Err(e) if is_missing(&e) => self.state = CacheState::Absent,
            Err(e) if reraise => return Err(e),
            Err(e) => self.state = CacheState::Failed(OsErrorInfo::from(&e)),
        }
        Ok(())
    }
}

/// Result of reading the cache after making sure it is populated.
enum Lookup<T> {
    Found(T),
    Absent,
    Failed(OsErrorInfo),
}

fn seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

impl FilePath {
    /// Stats the path now and replaces the cached result.
    ///
    /// With `reraise` unset, errors other than "not found" are remembered
    /// and the path reports as absent.
    pub fn restat(&self, reraise: bool) -> Result<()> {
        let outcome = StatSnapshot::capture(self.provider(), &self.to_path_buf());
        if let Err(e) = &outcome {
            debug!("Stat of {} failed: {}", self, e);
        }
        self.cache()
            .record(outcome, reraise)
            .map_err(|e| self.io_error(e))
    }

    /// Forgets cached metadata. Performs no I/O.
    pub fn changed(&self) {
        self.cache().invalidate();
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache().state().clone()
    }

    /// The error remembered by the last non-raising restat, if it failed
    /// for a reason other than "not found".
    pub fn last_stat_error(&self) -> Option<OsErrorInfo> {
        match self.cache().state() {
            CacheState::Failed(info) => Some(info.clone()),
            _ => None,
        }
    }

    fn lookup<T>(&self, f: impl FnOnce(&StatSnapshot) -> T) -> Result<Lookup<T>> {
        if self.cache().is_unknown() {
            self.restat(true)?;
        }
        Ok(match self.cache().state() {
            CacheState::Present(snapshot) => Lookup::Found(f(snapshot)),
            CacheState::Failed(info) => Lookup::Failed(info.clone()),
            CacheState::Absent | CacheState::Unknown => Lookup::Absent,
        })
    }

    /// Like `lookup`, failing when there is nothing to read.
    fn required<T>(&self, f: impl FnOnce(&StatSnapshot) -> T) -> Result<T> {
        match self.lookup(f)? {
            Lookup::Found(value) => Ok(value),
            Lookup::Absent => Err(self.io_error(not_found_error())),
            Lookup::Failed(info) => Err(self.io_error(info.to_io_error())),
        }
    }

    fn predicate(&self, f: impl FnOnce(&StatSnapshot) -> bool) -> Result<bool> {
        match self.lookup(f)? {
            Lookup::Found(value) => Ok(value),
            Lookup::Absent | Lookup::Failed(_) => Ok(false),
        }
    }

    /// True if something exists here. A dangling symbolic link does not
    /// count.
    pub fn exists(&self) -> Result<bool> {
        self.predicate(|s| !s.is_dangling())
    }

    /// True for a directory or a link to one.
    pub fn is_dir(&self) -> Result<bool> {
        self.predicate(|s| s.resolved().is_dir())
    }

    /// True for a regular file or a link to one.
    pub fn is_file(&self) -> Result<bool> {
        self.predicate(|s| s.resolved().is_file())
    }

    pub fn is_symbolic_link(&self) -> Result<bool> {
        self.predicate(|s| s.entry.is_symlink())
    }

    pub fn is_block_device(&self) -> Result<bool> {
        self.predicate(|s| s.resolved().is_block_device())
    }

    pub fn is_socket(&self) -> Result<bool> {
        self.predicate(|s| s.resolved().is_socket())
    }

    /// Size in bytes.
    pub fn size(&self) -> Result<u64> {
        self.required(|s| s.resolved().size)
    }

    pub fn permissions(&self) -> Result<Permissions> {
        self.required(|s| s.resolved().permissions())
    }

    /// Seconds since the epoch, with sub-second precision.
    pub fn access_time(&self) -> Result<f64> {
        self.required(|s| seconds(s.resolved().accessed))
    }

    pub fn modification_time(&self) -> Result<f64> {
        self.required(|s| seconds(s.resolved().modified))
    }

    pub fn status_change_time(&self) -> Result<f64> {
        self.required(|s| seconds(s.resolved().status_changed))
    }

    /// Whole seconds since the epoch.
    pub fn atime(&self) -> Result<i64> {
        self.access_time().map(|t| t as i64)
    }

    pub fn mtime(&self) -> Result<i64> {
        self.modification_time().map(|t| t as i64)
    }

    pub fn ctime(&self) -> Result<i64> {
        self.status_change_time().map(|t| t as i64)
    }

    pub fn inode(&self) -> Result<u64> {
        self.required(|s| s.resolved().ino)?
            .ok_or(PathError::Unsupported { operation: "inode" })
    }

    pub fn device(&self) -> Result<u64> {
        self.required(|s| s.resolved().dev)?
            .ok_or(PathError::Unsupported { operation: "device" })
    }

    pub fn hard_link_count(&self) -> Result<u64> {
        self.required(|s| s.resolved().nlink)?
            .ok_or(PathError::Unsupported { operation: "hard_link_count" })
    }

    pub fn user_id(&self) -> Result<u32> {
        self.required(|s| s.resolved().uid)?
            .ok_or(PathError::Unsupported { operation: "user_id" })
    }

    pub fn group_id(&self) -> Result<u32> {
        self.required(|s| s.resolved().gid)?
            .ok_or(PathError::Unsupported { operation: "group_id" })
    }
}
