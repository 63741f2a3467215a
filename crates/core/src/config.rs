//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the core. The core
//! never reads environment variables itself: binaries read them and hand the raw values to the
//! `*_from_env_value` helpers below.

use crate::constants::DEFAULT_STORE_FILENAME;
use crate::error::{CodeError, CodeResult};
use crate::validation::Delimiter;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    default_delimiter: Delimiter,
    default_shared: bool,
    store_path: PathBuf,
}

impl CoreConfig {
    pub fn new(default_delimiter: Delimiter, default_shared: bool, store_path: PathBuf) -> Self {
        Self {
            default_delimiter,
            default_shared,
            store_path,
        }
    }

    /// Delimiter for families created without an explicit one.
    pub fn default_delimiter(&self) -> &Delimiter {
        &self.default_delimiter
    }

    pub fn default_shared(&self) -> bool {
        self.default_shared
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(
            Delimiter::default(),
            true,
            PathBuf::from(DEFAULT_STORE_FILENAME),
        )
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the default delimiter from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`Delimiter::default`]. Whitespace is only
/// trimmed to detect blank input; a non-blank value is validated as given.
pub fn delimiter_from_env_value(value: Option<String>) -> CodeResult<Delimiter> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => Delimiter::parse(Some(&v)),
        None => Ok(Delimiter::default()),
    }
}

/// Parse the default shared flag from an optional string value.
///
/// Accepts `true/false`, `yes/no` and `1/0`, case-insensitively. Blank input means `true`.
pub fn shared_from_env_value(value: Option<String>) -> CodeResult<bool> {
    let Some(value) = trimmed(value) else {
        return Ok(true);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(CodeError::InvalidInput(format!(
            "expected a boolean shared flag, found '{other}'"
        ))),
    }
}

/// Resolve the store file path from an optional string value.
pub fn store_path_from_env_value(value: Option<String>) -> PathBuf {
    trimmed(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_defaults_when_blank() {
        assert_eq!(delimiter_from_env_value(None).unwrap().as_str(), ":");
        assert_eq!(
            delimiter_from_env_value(Some("  ".into())).unwrap().as_str(),
            ":"
        );
        assert_eq!(
            delimiter_from_env_value(Some("->".into())).unwrap().as_str(),
            "->"
        );
        assert!(matches!(
            delimiter_from_env_value(Some("----".into())),
            Err(CodeError::DelimiterTooLong { length: 4, max: 3 })
        ));
    }

    #[test]
    fn shared_flag_accepts_common_spellings() {
        assert!(shared_from_env_value(None).unwrap());
        assert!(shared_from_env_value(Some("YES".into())).unwrap());
        assert!(!shared_from_env_value(Some(" 0 ".into())).unwrap());
        assert!(!shared_from_env_value(Some("false".into())).unwrap());
        assert!(shared_from_env_value(Some("maybe".into())).is_err());
    }

    #[test]
    fn store_path_falls_back_to_default_filename() {
        assert_eq!(store_path_from_env_value(None), PathBuf::from("locode.yaml"));
        assert_eq!(
            store_path_from_env_value(Some(" data/codes.yaml ".into())),
            PathBuf::from("data/codes.yaml")
        );

        let config = CoreConfig::default();
        assert_eq!(config.store_path(), Path::new("locode.yaml"));
        assert!(config.default_shared());
    }
}
