//! Constants used throughout the locode core crate.

/// Delimiter used when a family does not specify one.
pub const DEFAULT_DELIMITER: &str = ":";

/// Maximum number of characters in a delimiter.
pub const MAX_DELIMITER_LEN: usize = 3;

/// Maximum number of characters in a family name.
pub const MAX_FAMILY_NAME_LEN: usize = 100;

/// Maximum number of characters in a family or format description.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Characters matched by the `\p` punctuation wildcard before the delimiter is excised.
pub const PUNCTUATION: &str = "!\"#$%&'()*+,./:;<=>?@[]^_`{|}~-";

/// Default filename for the YAML store used by the CLI.
pub const DEFAULT_STORE_FILENAME: &str = "locode.yaml";

/// Version tag written at the top of every store file.
pub const STORE_FORMAT_VERSION: u32 = 1;
