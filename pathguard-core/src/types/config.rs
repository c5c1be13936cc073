//! Configuration types for PathGuard.

use serde::{Deserialize, Serialize};

use super::path::Encoding;

/// Log level for the PathGuard command-line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only log errors
    Error,
    /// Log errors and warnings
    Warn,
    /// Log errors, warnings, and informational messages
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log everything including trace-level details
    Trace,
}

impl LogLevel {
    /// Returns the string representation of the log level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// Path naming convention used for separators, roots and reserved names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingStyle {
    Posix,
    Windows,
}

impl NamingStyle {
    /// The convention of the platform this binary was built for.
    pub const fn host() -> Self {
        if cfg!(windows) {
            NamingStyle::Windows
        } else {
            NamingStyle::Posix
        }
    }

    /// The separator used when joining.
    pub const fn separator(self) -> u8 {
        match self {
            NamingStyle::Posix => b'/',
            NamingStyle::Windows => b'\\',
        }
    }

    /// Windows accepts both slashes.
    pub const fn is_separator(self, byte: u8) -> bool {
        match self {
            NamingStyle::Posix => byte == b'/',
            NamingStyle::Windows => byte == b'/' || byte == b'\\',
        }
    }
}

impl Default for NamingStyle {
    fn default() -> Self {
        Self::host()
    }
}

impl std::fmt::Display for NamingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamingStyle::Posix => write!(f, "posix"),
            NamingStyle::Windows => write!(f, "windows"),
        }
    }
}

/// Settings shared by every path derived from the same root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Naming convention for validation and joining
    pub naming: NamingStyle,

    /// Codec used when text and bytes representations meet
    pub default_encoding: Encoding,

    /// Extension of the temporary sibling used by `set_content`
    pub temp_extension: String,

    /// Symbolic link expansions allowed while resolving one path
    pub max_link_hops: usize,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            naming: NamingStyle::host(),
            default_encoding: Encoding::Utf8,
            temp_extension: ".new".to_string(),
            max_link_hops: 40,
        }
    }
}

impl PathConfig {
    /// Creates a new PathConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default settings with Windows naming, whatever the host.
    pub fn windows() -> Self {
        Self {
            naming: NamingStyle::Windows,
            ..Self::default()
        }
    }

    /// Validates the configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.temp_extension.bytes().any(|b| self.naming.is_separator(b)) {
            errors.push(format!(
                "Temporary extension must not contain a separator: {:?}",
                self.temp_extension
            ));
        }

        if self.temp_extension.contains('\0') {
            errors.push("Temporary extension must not contain NUL".to_string());
        }

        if self.max_link_hops == 0 {
            errors.push("max_link_hops must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("TRACE".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("invalid".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Error.to_string(), "error");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_naming_style_separators() {
        assert_eq!(NamingStyle::Posix.separator(), b'/');
        assert!(!NamingStyle::Posix.is_separator(b'\\'));
        assert_eq!(NamingStyle::Windows.separator(), b'\\');
        assert!(NamingStyle::Windows.is_separator(b'/'));
        assert!(NamingStyle::Windows.is_separator(b'\\'));
    }

    #[test]
    fn test_path_config_default() {
        let config = PathConfig::default();
        assert_eq!(config.naming, NamingStyle::host());
        assert_eq!(config.default_encoding, Encoding::Utf8);
        assert_eq!(config.temp_extension, ".new");
        assert_eq!(config.max_link_hops, 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_path_config_validate_reports_all() {
        let config = PathConfig {
            naming: NamingStyle::Posix,
            temp_extension: "/bad".to_string(),
            max_link_hops: 0,
            ..PathConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("separator"));
        assert!(errors[1].contains("max_link_hops"));
    }

    #[test]
    fn test_path_config_from_partial_json() {
        let config: PathConfig =
            serde_json::from_str(r#"{"naming": "windows", "default_encoding": "latin-1"}"#).unwrap();
        assert_eq!(config.naming, NamingStyle::Windows);
        assert_eq!(config.default_encoding, Encoding::Latin1);
        assert_eq!(config.temp_extension, ".new");
    }
}
