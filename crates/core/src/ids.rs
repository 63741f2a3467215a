//! Record identifiers.
//!
//! Families, formats and segments are keyed by v4 UUIDs. Identifiers use a *canonical*
//! representation everywhere they cross the library boundary (CLI arguments, store files, log
//! lines): **32 lowercase hexadecimal characters** (no hyphens).
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Non-canonical values (uppercase, hyphenated, wrong length, non-hex) are rejected by `parse`.
//! Each record kind gets its own type so a `FormatId` can never be passed where a `SegmentId` is
//! expected.

use crate::error::{CodeError, CodeResult};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Returns true if `input` is a canonical UUID string.
///
/// This is a purely syntactic check: exactly 32 bytes, lowercase hex only.
pub fn is_canonical(input: &str) -> bool {
    input.len() == 32
        && input
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn parse_canonical(kind: &str, input: &str) -> CodeResult<Uuid> {
    if is_canonical(input) {
        return Uuid::parse_str(input).map_err(|e| {
            CodeError::InvalidInput(format!("{kind} id '{input}' is not a valid UUID: {e}"))
        });
    }
    Err(CodeError::InvalidInput(format!(
        "{kind} id must be 32 lowercase hex characters without hyphens, got: '{input}'"
    )))
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses an identifier that must already be in canonical form.
            ///
            /// # Errors
            ///
            /// Returns [`CodeError::InvalidInput`] if `input` is not canonical.
            pub fn parse(input: &str) -> CodeResult<Self> {
                parse_canonical($kind, input).map(Self)
            }

            /// Returns the underlying UUID.
            pub fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = CodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

record_id!(
    /// Identifies a [`FormatFamily`](crate::model::FormatFamily).
    FamilyId,
    "family"
);
record_id!(
    /// Identifies a [`FormatDefinition`](crate::model::FormatDefinition).
    FormatId,
    "format"
);
record_id!(
    /// Identifies a [`SegmentInstance`](crate::model::SegmentInstance).
    SegmentId,
    "segment"
);
