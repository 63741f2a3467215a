#[allow(clippy::single_component_path_imports)]
use serde_yaml;

#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    /// Programmer-supplied input that can never be valid (for example a missing delimiter).
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("the length of the delimiter is {length}, the max length is {max}")]
    DelimiterTooLong { length: usize, max: usize },
    #[error("invalid format, found delimiter '{delimiter}' in '{definition}'")]
    DelimiterInFormat {
        delimiter: String,
        definition: String,
    },
    #[error("invalid format, found: '{definition}', parsed: {parsed:?}")]
    MalformedFormat {
        definition: String,
        parsed: Vec<String>,
    },
    #[error("format '{definition}' is used by {count} segment(s) and cannot be changed")]
    FormatInUse { definition: String, count: usize },

    #[error("invalid segment '{segment}', does not conform to '{format}'")]
    SegmentValidation { segment: String, format: String },
    #[error("segment '{segment}' does not match any format, tried: {tried:?}")]
    NoMatchingFormat { segment: String, tried: Vec<String> },

    #[error("segment '{segment}' cannot be a child of itself (ancestors: '{ancestors}')")]
    SelfAncestry { segment: String, ancestors: String },
    #[error("all segments must be derived from the same family, expected '{expected}', found '{found}'")]
    FamilyConsistency { expected: String, found: String },
    #[error("there are more segments than defined formats, found: {found}, allowed: {allowed}")]
    DepthExceeded { found: usize, allowed: usize },
    #[error("segment '{segment}' already exists at '{parent}'")]
    DuplicateSegment { segment: String, parent: String },

    #[error("family '{name}' already exists for project '{project}'")]
    DuplicateFamily { name: String, project: String },
    #[error("family '{family}' cannot be cloned: {reason}")]
    CloneNotAllowed { family: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("failed to read store file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write store file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
}

impl CodeError {
    /// The user-facing field an error should be attached to, if any.
    ///
    /// Form and admin layers use this to render validation failures next to the offending input.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CodeError::DelimiterTooLong { .. } => Some("delimiter"),
            CodeError::DelimiterInFormat { .. }
            | CodeError::MalformedFormat { .. }
            | CodeError::FormatInUse { .. } => Some("char_definition"),
            CodeError::SegmentValidation { .. }
            | CodeError::NoMatchingFormat { .. }
            | CodeError::DuplicateSegment { .. } => Some("segment"),
            CodeError::SelfAncestry { .. }
            | CodeError::FamilyConsistency { .. }
            | CodeError::DepthExceeded { .. } => Some("parent"),
            CodeError::DuplicateFamily { .. } => Some("name"),
            CodeError::CloneNotAllowed { .. } => Some("shared"),
            _ => None,
        }
    }
}

impl From<locode_types::TextError> for CodeError {
    fn from(err: locode_types::TextError) -> Self {
        CodeError::InvalidInput(err.to_string())
    }
}

pub type CodeResult<T> = std::result::Result<T, CodeError>;
