//! The [`FilePath`] value type.
//!
//! A `FilePath` is an absolute, normalized path in one representation mode
//! together with a private stat cache. Derived paths (children, siblings,
//! parents) share the configuration and filesystem provider of the value
//! they were derived from.
//!
//! ```rust,ignore
//! use pathguard_core::FilePath;
//!
//! let root = FilePath::new("/srv/uploads")?;
//! let file = root.child(name_from_the_network)?; // never escapes /srv/uploads
//! file.set_content(b"payload")?;
//! ```

mod glob;
mod io;
mod navigate;
pub mod resolver;
mod stat_cache;

use std::cmp::Ordering;
use std::ffi::OsString;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;
use uuid::Uuid;

use crate::error::{is_missing, InsecureReason, PathError, Result};
use crate::native::NativeFileSystem;
use crate::traits::FileSystemProvider;
use crate::types::{Encoding, NamingStyle, PathConfig, PathString, RepresentationMode};

pub use navigate::{Parents, Walk};
pub use resolver::SecureResolver;
pub use stat_cache::{CacheState, StatCache, StatSnapshot};

/// How many fresh names `temporary_sibling` tries before giving up.
const TEMPORARY_NAME_ATTEMPTS: usize = 100;

/// Provider and settings shared by a root and everything derived from it.
#[derive(Debug)]
struct PathContext {
    provider: Arc<dyn FileSystemProvider>,
    config: PathConfig,
}

fn default_context() -> Arc<PathContext> {
    static DEFAULT: OnceLock<Arc<PathContext>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| {
            Arc::new(PathContext {
                provider: Arc::new(NativeFileSystem),
                config: PathConfig::default(),
            })
        })
        .clone()
}

/// An absolute filesystem path with cached metadata.
pub struct FilePath {
    repr: PathString,
    ctx: Arc<PathContext>,
    cache: Mutex<StatCache>,
}

/// Compact form used by [`FilePath::persist`].
#[derive(Serialize, Deserialize)]
struct Persisted {
    mode: RepresentationMode,
    path: Vec<u8>,
    naming: NamingStyle,
}

/// Serde form: `{mode, path, naming}`. A missing `naming` means the host's.
#[derive(Serialize, Deserialize)]
struct SerializedPath {
    #[serde(flatten)]
    path: PathString,
    #[serde(default = "NamingStyle::host")]
    naming: NamingStyle,
}

impl FilePath {
    /// Creates a path on the native filesystem with default settings.
    ///
    /// A relative path is made absolute against the current directory. The
    /// result is the trusted anchor for everything derived from it.
    pub fn new(path: impl Into<PathString>) -> Result<Self> {
        Self::from_context(path.into(), default_context())
    }

    /// Creates a path whose I/O goes through `provider`.
    pub fn with_provider(
        path: impl Into<PathString>,
        provider: Arc<dyn FileSystemProvider>,
    ) -> Result<Self> {
        Self::with_options(path, provider, PathConfig::default())
    }

    pub fn with_options(
        path: impl Into<PathString>,
        provider: Arc<dyn FileSystemProvider>,
        config: PathConfig,
    ) -> Result<Self> {
        Self::from_context(path.into(), Arc::new(PathContext { provider, config }))
    }

    fn from_context(path: PathString, ctx: Arc<PathContext>) -> Result<Self> {
        let style = ctx.config.naming;
        let mode = path.mode();
        let mut raw = path.as_bytes().to_vec();

        if !resolver::is_absolute(style, &raw) {
            if style != NamingStyle::host() {
                return Err(PathError::InsecurePath {
                    segment: path.to_string(),
                    reason: InsecureReason::Relative,
                });
            }
            let cwd = std::env::current_dir().map_err(|e| PathError::from_io(".", e))?;
            let cwd = os_to_raw(cwd.into_os_string(), mode, ctx.config.default_encoding)?;
            raw = resolver::join(style, &cwd, &raw);
        }
        let normalized = resolver::normalize(style, &raw);

        Ok(Self {
            repr: PathString::from_raw(mode, normalized)?,
            ctx,
            cache: Mutex::new(StatCache::new()),
        })
    }

    /// A new value sharing this one's context, with an empty cache.
    fn derive(&self, raw: Vec<u8>) -> Result<FilePath> {
        Ok(FilePath {
            repr: PathString::from_raw(self.mode(), raw)?,
            ctx: Arc::clone(&self.ctx),
            cache: Mutex::new(StatCache::new()),
        })
    }

    /// Like `derive`, for bytes cut from an existing path of this mode.
    fn derive_piece(&self, raw: Vec<u8>) -> FilePath {
        FilePath {
            repr: self.piece(raw),
            ctx: Arc::clone(&self.ctx),
            cache: Mutex::new(StatCache::new()),
        }
    }

    /// A bytes-mode child named by raw OS bytes, for entries whose names this
    /// path's codec cannot hold.
    fn os_child(&self, name: &[u8]) -> Result<FilePath> {
        let raw = self.resolver().resolve_child(self.repr.as_bytes(), name)?;
        Ok(FilePath {
            repr: PathString::Bytes(raw),
            ctx: Arc::clone(&self.ctx),
            cache: Mutex::new(StatCache::new()),
        })
    }

    fn cache(&self) -> MutexGuard<'_, StatCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn style(&self) -> NamingStyle {
        self.ctx.config.naming
    }

    fn resolver(&self) -> SecureResolver {
        SecureResolver::new(self.style())
    }

    pub(crate) fn provider(&self) -> &dyn FileSystemProvider {
        self.ctx.provider.as_ref()
    }

    pub fn config(&self) -> &PathConfig {
        &self.ctx.config
    }

    /// Converts a caller-supplied piece into this path's mode.
    fn coerce(&self, piece: impl Into<PathString>) -> Result<PathString> {
        piece
            .into()
            .into_mode(self.mode(), self.ctx.config.default_encoding)
    }

    fn io_error(&self, err: std::io::Error) -> PathError {
        PathError::from_io(self.to_string(), err)
    }

    /// The full path.
    pub fn path(&self) -> &PathString {
        &self.repr
    }

    pub fn mode(&self) -> RepresentationMode {
        self.repr.mode()
    }

    pub fn is_root(&self) -> bool {
        resolver::is_root(self.style(), self.repr.as_bytes())
    }

    /// The final segment, empty for the root.
    pub fn basename(&self) -> PathString {
        let raw = resolver::basename(self.style(), self.repr.as_bytes());
        self.piece(raw)
    }

    /// The path of the containing directory.
    pub fn dirname(&self) -> PathString {
        let raw = resolver::dirname(self.style(), self.repr.as_bytes());
        self.piece(raw)
    }

    /// Wraps bytes cut from this path at ASCII boundaries.
    fn piece(&self, raw: Vec<u8>) -> PathString {
        match self.mode() {
            RepresentationMode::Bytes => PathString::Bytes(raw),
            RepresentationMode::Text => PathString::Text(String::from_utf8_lossy(&raw).into_owned()),
        }
    }

    /// The path as understood by the operating system.
    pub fn to_path_buf(&self) -> PathBuf {
        self.os_path(self.repr.as_bytes())
    }

    /// The OS path for raw bytes in this path's mode.
    fn os_path(&self, raw: &[u8]) -> PathBuf {
        match self.mode() {
            RepresentationMode::Text => PathBuf::from(String::from_utf8_lossy(raw).into_owned()),
            RepresentationMode::Bytes => bytes_to_path(raw, self.ctx.config.default_encoding),
        }
    }

    /// Raw bytes in this path's mode for a name or path the OS returned.
    fn raw_from_os(&self, os: OsString) -> Result<Vec<u8>> {
        os_to_raw(os, self.mode(), self.ctx.config.default_encoding)
    }

    /// The same path in bytes mode. Uses the configured encoding when
    /// `encoding` is `None`.
    pub fn as_bytes_mode(&self, encoding: Option<Encoding>) -> Result<FilePath> {
        self.as_mode(RepresentationMode::Bytes, encoding)
    }

    /// The same path in text mode.
    pub fn as_text_mode(&self, encoding: Option<Encoding>) -> Result<FilePath> {
        self.as_mode(RepresentationMode::Text, encoding)
    }

    fn as_mode(&self, mode: RepresentationMode, encoding: Option<Encoding>) -> Result<FilePath> {
        let encoding = encoding.unwrap_or(self.ctx.config.default_encoding);
        Ok(FilePath {
            repr: self.repr.clone().into_mode(mode, encoding)?,
            ctx: Arc::clone(&self.ctx),
            cache: Mutex::new(StatCache::new()),
        })
    }

    /// The child named `segment`.
    ///
    /// Fails with `InsecurePath` if the segment could refer to anything but
    /// a direct child: separators, `.`/`..`, NUL, and under Windows naming
    /// drive prefixes and device names.
    pub fn child(&self, segment: impl Into<PathString>) -> Result<FilePath> {
        let segment = self.coerce(segment)?;
        let raw = self
            .resolver()
            .resolve_child(self.repr.as_bytes(), segment.as_bytes())?;
        self.derive(raw)
    }

    /// Resolves a trusted, possibly multi-segment relative path.
    ///
    /// `..` is allowed as long as the result stays at or below this path.
    pub fn preauth_child(&self, path: impl Into<PathString>) -> Result<FilePath> {
        let path = self.coerce(path)?;
        let raw = self
            .resolver()
            .resolve_preauth(self.repr.as_bytes(), path.as_bytes())?;
        self.derive(raw)
    }

    /// Applies [`child`](Self::child) for each segment. Either every segment
    /// is accepted or an error is returned.
    pub fn descendant<I, S>(&self, segments: I) -> Result<FilePath>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathString>,
    {
        let segments = segments
            .into_iter()
            .map(|s| self.coerce(s))
            .collect::<Result<Vec<_>>>()?;
        let raw = self.resolver().resolve_descendant(
            self.repr.as_bytes(),
            &segments.iter().map(PathString::as_bytes).collect::<Vec<_>>(),
        )?;
        self.derive(raw)
    }

    /// A path with the same parent and the given name.
    pub fn sibling(&self, name: impl Into<PathString>) -> Result<FilePath> {
        self.parent().child(name)
    }

    /// This path with `extension` appended to its final segment.
    pub fn sibling_extension(&self, extension: impl Into<PathString>) -> Result<FilePath> {
        let extension = self.coerce(extension)?;
        let ext = extension.as_bytes();
        if ext.iter().any(|b| self.style().is_separator(*b)) {
            return Err(PathError::InsecurePath {
                segment: extension.to_string(),
                reason: InsecureReason::ContainsSeparator,
            });
        }
        if ext.contains(&0) {
            return Err(PathError::InsecurePath {
                segment: extension.to_string(),
                reason: InsecureReason::ContainsNul,
            });
        }
        let mut raw = self.repr.as_bytes().to_vec();
        raw.extend_from_slice(ext);
        self.derive(raw)
    }

    /// A sibling that does not exist yet, named
    /// `.<random hex><basename>`.
    pub fn temporary_sibling(&self) -> Result<FilePath> {
        self.temporary_sibling_with_extension("")
    }

    /// Like [`temporary_sibling`](Self::temporary_sibling) with `extension`
    /// appended to the name.
    pub fn temporary_sibling_with_extension(
        &self,
        extension: impl Into<PathString>,
    ) -> Result<FilePath> {
        let extension = self.coerce(extension)?;
        let basename = self.basename();

        for _ in 0..TEMPORARY_NAME_ATTEMPTS {
            let mut name = format!(".{}", Uuid::new_v4().simple()).into_bytes();
            name.extend_from_slice(basename.as_bytes());
            name.extend_from_slice(extension.as_bytes());

            let candidate = self.sibling(PathString::from_raw(self.mode(), name)?)?;
            match self.provider().lstat(&candidate.to_path_buf()) {
                Ok(_) => trace!("Temporary name {} already taken", candidate),
                Err(e) if is_missing(&e) => return Ok(candidate),
                Err(e) => return Err(candidate.io_error(e)),
            }
        }

        Err(self.io_error(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "could not find an unused temporary name",
        )))
    }

    /// Encodes this path into a compact byte form.
    pub fn persist(&self) -> Result<Vec<u8>> {
        let persisted = Persisted {
            mode: self.mode(),
            path: self.repr.as_bytes().to_vec(),
            naming: self.style(),
        };
        bincode::serialize(&persisted).map_err(|e| PathError::Serialization(e.to_string()))
    }

    /// Rebuilds a path written by [`persist`](Self::persist). The result uses
    /// the native filesystem and default settings apart from the naming
    /// style, which is kept.
    pub fn restore(data: &[u8]) -> Result<FilePath> {
        let persisted: Persisted =
            bincode::deserialize(data).map_err(|e| PathError::Serialization(e.to_string()))?;
        let path = PathString::from_raw(persisted.mode, persisted.path)?;
        Self::with_naming(path, persisted.naming)
    }

    fn with_naming(path: PathString, naming: NamingStyle) -> Result<FilePath> {
        if naming == NamingStyle::host() {
            return Self::new(path);
        }
        let config = PathConfig { naming, ..PathConfig::default() };
        Self::with_options(path, Arc::new(NativeFileSystem), config)
    }
}

/// Raw bytes of an OS string, in the form `mode` expects.
///
/// On unix the OS bytes are used as they are and text mode requires them to
/// be UTF-8.
#[cfg(unix)]
fn os_to_raw(os: OsString, mode: RepresentationMode, _encoding: Encoding) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStringExt;

    PathString::from_raw(mode, os.into_vec()).map(|p| p.as_bytes().to_vec())
}

#[cfg(not(unix))]
fn os_to_raw(os: OsString, mode: RepresentationMode, encoding: Encoding) -> Result<Vec<u8>> {
    let text = PathString::Text(os.to_string_lossy().into_owned());
    text.into_mode(mode, encoding).map(|p| p.as_bytes().to_vec())
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8], _encoding: Encoding) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8], encoding: Encoding) -> PathBuf {
    let text = encoding
        .decode(bytes)
        .unwrap_or_else(|_| String::from_utf8_lossy(bytes).into_owned());
    PathBuf::from(text)
}

impl Clone for FilePath {
    /// The clone starts with a copy of the cache and invalidates it
    /// independently.
    fn clone(&self) -> Self {
        Self {
            repr: self.repr.clone(),
            ctx: Arc::clone(&self.ctx),
            cache: Mutex::new(self.cache().clone()),
        }
    }
}

impl PartialEq for FilePath {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}

impl Eq for FilePath {}

impl PartialOrd for FilePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FilePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.repr.cmp(&other.repr)
    }
}

impl Hash for FilePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
    }
}

impl fmt::Debug for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FilePath({:?})", self.repr)
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr)
    }
}

impl Serialize for FilePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SerializedPath {
            path: self.repr.clone(),
            naming: self.style(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FilePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let SerializedPath { path, naming } = SerializedPath::deserialize(deserializer)?;
        FilePath::with_naming(path, naming).map_err(serde::de::Error::custom)
    }
}
