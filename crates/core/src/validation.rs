//! Delimiter validation.
//!
//! A family joins its segments into paths with a delimiter of one to three characters. The two
//! ways a delimiter can be wrong are reported differently:
//! - a missing or empty delimiter is a programming error ([`CodeError::Configuration`]), since
//!   every caller is expected to supply one (the default is [`DEFAULT_DELIMITER`]);
//! - an over-long delimiter is a user mistake ([`CodeError::DelimiterTooLong`]) and is surfaced
//!   against the `delimiter` field.

use crate::constants::{DEFAULT_DELIMITER, MAX_DELIMITER_LEN};
use crate::error::{CodeError, CodeResult};
use std::fmt;

/// A validated segment delimiter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Delimiter(String);

impl Delimiter {
    /// Validates a delimiter value.
    ///
    /// # Errors
    ///
    /// - [`CodeError::Configuration`] if `value` is `None` or empty.
    /// - [`CodeError::DelimiterTooLong`] if `value` is longer than [`MAX_DELIMITER_LEN`] characters.
    pub fn parse(value: Option<&str>) -> CodeResult<Self> {
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ => {
                return Err(CodeError::Configuration(
                    "a delimiter cannot be empty or missing".into(),
                ))
            }
        };

        let length = value.chars().count();
        if length > MAX_DELIMITER_LEN {
            return Err(CodeError::DelimiterTooLong {
                length,
                max: MAX_DELIMITER_LEN,
            });
        }

        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `c` is one of the delimiter's characters.
    pub fn contains_char(&self, c: char) -> bool {
        self.0.contains(c)
    }

    /// Number of delimiter occurrences in `path`, which is the level of the path's last segment.
    pub fn count_in(&self, path: &str) -> usize {
        path.matches(self.0.as_str()).count()
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self(DEFAULT_DELIMITER.to_owned())
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for Delimiter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Delimiter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Delimiter::parse(Some(&s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_short_delimiters() {
        for value in ["-", ":", "->", "-->", "&"] {
            let delimiter = Delimiter::parse(Some(value)).expect("delimiter should be accepted");
            assert_eq!(delimiter.as_str(), value);
        }
    }

    #[test]
    fn test_parse_rejects_missing_delimiter_as_configuration_error() {
        let err = Delimiter::parse(None).expect_err("missing delimiter");
        assert!(matches!(err, CodeError::Configuration(msg) if msg.contains("empty or missing")));

        let err = Delimiter::parse(Some("")).expect_err("empty delimiter");
        assert!(matches!(err, CodeError::Configuration(_)));
    }

    #[test]
    fn test_parse_rejects_long_delimiter_as_validation_error() {
        let err = Delimiter::parse(Some("--->")).expect_err("long delimiter");
        assert!(matches!(
            err,
            CodeError::DelimiterTooLong { length: 4, max: 3 }
        ));
        assert_eq!(err.field(), Some("delimiter"));
        assert!(err.to_string().contains("the max length is 3"));
    }

    #[test]
    fn test_count_in_uses_whole_delimiter() {
        let delimiter = Delimiter::parse(Some("->")).unwrap();
        assert_eq!(delimiter.count_in("A01->B02->C03"), 2);
        assert_eq!(delimiter.count_in("A-1>B"), 0);
        assert!(delimiter.contains_char('>'));
    }

    #[test]
    fn test_default_is_colon() {
        assert_eq!(Delimiter::default().as_str(), ":");
    }
}
