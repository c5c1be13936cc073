// Module declarations
pub mod path;
pub mod metadata;
pub mod operations;
pub mod config;

// Re-export all types from submodules
pub use path::{Encoding, PathString, RepresentationMode};
pub use metadata::{mode_bits, Permissions, RawStat, Rwx};
pub use operations::OpenFlags;
pub use config::{LogLevel, NamingStyle, PathConfig};
