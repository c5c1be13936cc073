use std::fmt;
use std::str::FromStr;

/// Flags for opening a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Read access flag
    pub const READ: Self = Self(1 << 0);
    /// Write access flag
    pub const WRITE: Self = Self(1 << 1);
    /// Append mode flag
    pub const APPEND: Self = Self(1 << 2);
    /// Create file if it doesn't exist
    pub const CREATE: Self = Self(1 << 3);
    /// Truncate file to zero length
    pub const TRUNCATE: Self = Self(1 << 4);
    /// Exclusive creation (fail if file exists)
    pub const EXCLUSIVE: Self = Self(1 << 5);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if all flags in `other` are set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True when opening with these flags can modify the file.
    pub const fn modifies(&self) -> bool {
        self.0 & (Self::WRITE.0 | Self::APPEND.0 | Self::CREATE.0 | Self::TRUNCATE.0) != 0
    }

    /// Parses an fopen-style mode string.
    ///
    /// `r`, `w`, `a` and `x` pick the base mode, `+` adds the other
    /// direction, `b` is accepted and ignored.
    pub fn from_mode(mode: &str) -> Result<Self, String> {
        let invalid = || format!("Invalid open mode: {}", mode);
        let mut chars = mode.chars().filter(|c| *c != 'b');
        let mut flags = match chars.next() {
            Some('r') => Self::READ,
            Some('w') => Self::WRITE | Self::CREATE | Self::TRUNCATE,
            Some('a') => Self::WRITE | Self::APPEND | Self::CREATE,
            Some('x') => Self::WRITE | Self::CREATE | Self::EXCLUSIVE,
            _ => return Err(invalid()),
        };
        match (chars.next(), chars.next()) {
            (None, None) => {}
            (Some('+'), None) => flags |= Self::READ | Self::WRITE,
            _ => return Err(invalid()),
        }
        Ok(flags)
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl FromStr for OpenFlags {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_mode(s)
    }
}

impl fmt::Display for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READ, "READ"),
            (Self::WRITE, "WRITE"),
            (Self::APPEND, "APPEND"),
            (Self::CREATE, "CREATE"),
            (Self::TRUNCATE, "TRUNCATE"),
            (Self::EXCLUSIVE, "EXCLUSIVE"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "(empty)")
        } else {
            write!(f, "{}", set.join(" | "))
        }
    }
}
