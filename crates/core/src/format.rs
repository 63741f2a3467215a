//! Format definition compiler and segment validator.
//!
//! A format definition describes, character by character, what one segment of a location code
//! looks like:
//!
//! | Token | Matches                                                    |
//! |-------|------------------------------------------------------------|
//! | `\d`  | one ASCII digit                                            |
//! | `\a`  | one ASCII letter                                           |
//! | `\p`  | one ASCII punctuation character, excluding delimiter chars |
//! | other | that exact character                                       |
//!
//! For example `\a\d\d\d` accepts `B001`, and `\a@\d\d` accepts `D@99`.
//!
//! Literal characters are limited to ASCII letters, digits and punctuation (backslash excluded).
//! Anything else, such as whitespace or a backslash that does not start `\d`, `\a` or `\p`, is
//! not recognised, which makes the rendered token list differ from the definition and the
//! definition is rejected.

use crate::constants::PUNCTUATION;
use crate::error::{CodeError, CodeResult};
use crate::validation::Delimiter;
use regex::Regex;
use std::fmt;

/// One position of a format definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Digit,
    Alpha,
    Punctuation,
    Literal(char),
}

impl Token {
    /// Returns true if `c` satisfies this token under `delimiter`.
    pub fn matches(&self, c: char, delimiter: &Delimiter) -> bool {
        match self {
            Token::Digit => c.is_ascii_digit(),
            Token::Alpha => c.is_ascii_alphabetic(),
            Token::Punctuation => PUNCTUATION.contains(c) && !delimiter.contains_char(c),
            Token::Literal(l) => *l == c,
        }
    }

    fn to_regex(self, delimiter: &Delimiter) -> String {
        match self {
            Token::Digit => "[0-9]".to_owned(),
            Token::Alpha => "[a-zA-Z]".to_owned(),
            Token::Punctuation => {
                let class: String = PUNCTUATION
                    .chars()
                    .filter(|c| !delimiter.contains_char(*c))
                    .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
                    .collect();
                format!("[{class}]")
            }
            Token::Literal(c) => regex::escape(c.encode_utf8(&mut [0; 4])),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Digit => f.write_str("\\d"),
            Token::Alpha => f.write_str("\\a"),
            Token::Punctuation => f.write_str("\\p"),
            Token::Literal(c) => write!(f, "{c}"),
        }
    }
}

/// Splits a definition into the tokens that can be recognised, skipping anything that cannot.
///
/// The caller decides whether skipped characters make the definition invalid by rendering the
/// tokens back and comparing.
pub fn tokenize(definition: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(definition.len());
    let mut chars = definition.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let token = match chars.peek() {
                Some('d') => Token::Digit,
                Some('a') => Token::Alpha,
                Some('p') => Token::Punctuation,
                _ => continue,
            };
            chars.next();
            tokens.push(token);
        } else if c.is_ascii_alphanumeric() || c.is_ascii_punctuation() {
            tokens.push(Token::Literal(c));
        }
    }

    tokens
}

/// Renders tokens back into definition syntax.
pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(Token::to_string).collect()
}

/// A format definition that has been checked and compiled against a delimiter.
#[derive(Clone, Debug)]
pub struct CompiledFormat {
    definition: String,
    tokens: Vec<Token>,
    delimiter: Delimiter,
    matcher: Regex,
}

impl CompiledFormat {
    /// Compiles `definition` for use with `delimiter`.
    ///
    /// # Errors
    ///
    /// - [`CodeError::DelimiterInFormat`] if the delimiter occurs anywhere in `definition`.
    /// - [`CodeError::MalformedFormat`] if `definition` is empty or contains characters that are
    ///   not part of any token.
    pub fn compile(definition: &str, delimiter: &Delimiter) -> CodeResult<Self> {
        if definition.contains(delimiter.as_str()) {
            return Err(CodeError::DelimiterInFormat {
                delimiter: delimiter.to_string(),
                definition: definition.to_owned(),
            });
        }

        let tokens = tokenize(definition);
        if tokens.is_empty() || render(&tokens) != definition {
            return Err(CodeError::MalformedFormat {
                definition: definition.to_owned(),
                parsed: tokens.iter().map(Token::to_string).collect(),
            });
        }

        let pattern: String = tokens.iter().map(|t| t.to_regex(delimiter)).collect();
        let matcher = Regex::new(&format!("^{pattern}$")).map_err(|e| {
            CodeError::MalformedFormat {
                definition: definition.to_owned(),
                parsed: vec![e.to_string()],
            }
        })?;

        Ok(Self {
            definition: definition.to_owned(),
            tokens,
            delimiter: delimiter.clone(),
            matcher,
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Number of characters a conforming segment has.
    pub fn segment_length(&self) -> usize {
        self.tokens.len()
    }

    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    /// Returns true if `segment` conforms to this format.
    pub fn is_match(&self, segment: &str) -> bool {
        segment.chars().count() == self.tokens.len() && self.matcher.is_match(segment)
    }

    /// Validates `segment` against this format, returning it unchanged on success.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::SegmentValidation`] naming the segment and this format.
    pub fn validate_segment<'a>(&self, segment: &'a str) -> CodeResult<&'a str> {
        if self.is_match(segment) {
            return Ok(segment);
        }
        Err(CodeError::SegmentValidation {
            segment: segment.to_owned(),
            format: self.definition.clone(),
        })
    }

    /// Returns true if some segment would satisfy both formats.
    ///
    /// Two formats overlap when they have the same length and every position admits a common
    /// character.
    pub fn overlaps(&self, other: &CompiledFormat) -> bool {
        self.tokens.len() == other.tokens.len()
            && self
                .tokens
                .iter()
                .zip(other.tokens.iter())
                .all(|(a, b)| {
                    (' '..='~').any(|c| a.matches(c, &self.delimiter) && b.matches(c, &other.delimiter))
                })
    }
}

impl fmt::Display for CompiledFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.definition)
    }
}

/// Validates `segment` against `definition` in one step.
///
/// # Errors
///
/// Propagates compile errors for `definition`, otherwise [`CodeError::SegmentValidation`].
pub fn validate_segment<'a>(
    segment: &'a str,
    definition: &str,
    delimiter: &Delimiter,
) -> CodeResult<&'a str> {
    CompiledFormat::compile(definition, delimiter)?.validate_segment(segment)
}
