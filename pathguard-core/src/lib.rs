//! # PathGuard Core
//!
//! Safe, cross-platform filesystem paths as values.
//!
//! ## Overview
//!
//! A [`FilePath`] is an absolute path plus a cached snapshot of what is on
//! disk at that location. New paths are derived from a trusted one through
//! operations that refuse to step outside of it, which makes the type
//! suitable for serving or manipulating files named by untrusted input:
//!
//! - Children and descendants are validated one segment at a time
//! - Metadata is fetched lazily and cached until something invalidates it
//! - Content replacement is atomic, through a temporary sibling and a rename
//! - Moves fall back to copy-and-delete across devices
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use pathguard_core::FilePath;
//!
//! fn example() -> pathguard_core::Result<()> {
//!     let root = FilePath::new("/srv/www")?;
//!
//!     // Rejected: the segment would escape the root.
//!     assert!(root.child("..").is_err());
//!
//!     let page = root.descendant(["docs", "index.html"])?;
//!     if page.is_file()? {
//!         let content = page.get_content()?;
//!         println!("{} bytes", content.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`path`]: the [`FilePath`] type, segment validation, walking and I/O
//! - [`traits`]: the [`FileSystemProvider`] seam every operation goes through
//! - [`native`]: the provider backed by the operating system
//! - [`types`]: path strings, metadata, open flags and configuration
//! - [`error`]: error types and OS error classification

pub mod error;
pub mod native;
pub mod path;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{InsecureReason, OsErrorInfo, PathError, Result};
pub use native::NativeFileSystem;
pub use path::{CacheState, FilePath, Parents, SecureResolver, Walk};
pub use traits::{FileHandle, FileSystemProvider};
pub use types::{
    Encoding, NamingStyle, OpenFlags, PathConfig, PathString, Permissions, RawStat,
    RepresentationMode,
};
