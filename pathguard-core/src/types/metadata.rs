use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// File type mask and type values of a POSIX `st_mode`.
///
/// Kept here rather than taken from `libc` so that mode bits synthesized on
/// Windows are interpreted the same way.
pub mod mode_bits {
    pub const S_IFMT: u32 = 0o170_000;
    pub const S_IFSOCK: u32 = 0o140_000;
    pub const S_IFLNK: u32 = 0o120_000;
    pub const S_IFREG: u32 = 0o100_000;
    pub const S_IFBLK: u32 = 0o060_000;
    pub const S_IFDIR: u32 = 0o040_000;
    pub const S_IFCHR: u32 = 0o020_000;
    pub const S_IFIFO: u32 = 0o010_000;
    /// Permission bits, excluding setuid/setgid/sticky.
    pub const PERMISSION_MASK: u32 = 0o777;
}

use mode_bits::*;

/// One stat record as reported by a filesystem provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStat {
    /// Full mode, type bits included.
    pub mode: u32,
    /// Size in bytes
    pub size: u64,
    pub accessed: SystemTime,
    pub modified: SystemTime,
    /// Inode change time on unix, creation time where that is all there is.
    pub status_changed: SystemTime,
    pub ino: Option<u64>,
    pub dev: Option<u64>,
    pub nlink: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl RawStat {
    pub fn file_type_bits(&self) -> u32 {
        self.mode & S_IFMT
    }

    pub fn is_dir(&self) -> bool {
        self.file_type_bits() == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.file_type_bits() == S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type_bits() == S_IFLNK
    }

    pub fn is_block_device(&self) -> bool {
        self.file_type_bits() == S_IFBLK
    }

    pub fn is_socket(&self) -> bool {
        self.file_type_bits() == S_IFSOCK
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_mode(self.mode)
    }
}

/// Read, write and execute bits for one class of user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rwx {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Rwx {
    /// Builds from the low three bits of `bits`.
    pub fn from_bits(bits: u32) -> Self {
        Self {
            read: bits & 0o4 != 0,
            write: bits & 0o2 != 0,
            execute: bits & 0o1 != 0,
        }
    }

    pub fn bits(&self) -> u32 {
        u32::from(self.read) << 2 | u32::from(self.write) << 1 | u32::from(self.execute)
    }

    /// `rwx` with `-` for each missing bit.
    pub fn shorthand(&self) -> String {
        let mut s = String::with_capacity(3);
        s.push(if self.read { 'r' } else { '-' });
        s.push(if self.write { 'w' } else { '-' });
        s.push(if self.execute { 'x' } else { '-' });
        s
    }

    fn parse(chunk: &[u8]) -> Option<Self> {
        let flag = |c: u8, set: u8| match c {
            b'-' => Some(false),
            c if c == set => Some(true),
            _ => None,
        };
        match chunk {
            [r, w, x] => Some(Self {
                read: flag(*r, b'r')?,
                write: flag(*w, b'w')?,
                execute: flag(*x, b'x')?,
            }),
            _ => None,
        }
    }
}

/// User, group and other permissions decoded from mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub user: Rwx,
    pub group: Rwx,
    pub other: Rwx,
}

impl Permissions {
    /// Decodes the permission bits of `mode`. Type bits and
    /// setuid/setgid/sticky are ignored.
    pub fn from_mode(mode: u32) -> Self {
        Self {
            user: Rwx::from_bits(mode >> 6),
            group: Rwx::from_bits(mode >> 3),
            other: Rwx::from_bits(mode),
        }
    }

    pub fn mode(&self) -> u32 {
        (self.user.bits() << 6) | (self.group.bits() << 3) | self.other.bits()
    }

    /// Nine-character form such as `rwxr-x---`.
    pub fn shorthand(&self) -> String {
        format!(
            "{}{}{}",
            self.user.shorthand(),
            self.group.shorthand(),
            self.other.shorthand()
        )
    }

    /// Returns true if the entry is executable by anyone.
    pub fn is_executable(&self) -> bool {
        self.user.execute || self.group.execute || self.other.execute
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.shorthand())
    }
}

impl FromStr for Permissions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 9 {
            return Err(format!("Invalid permission string: {}", s));
        }
        let invalid = || format!("Invalid permission string: {}", s);
        Ok(Self {
            user: Rwx::parse(&bytes[0..3]).ok_or_else(invalid)?,
            group: Rwx::parse(&bytes[3..6]).ok_or_else(invalid)?,
            other: Rwx::parse(&bytes[6..9]).ok_or_else(invalid)?,
        })
    }
}
