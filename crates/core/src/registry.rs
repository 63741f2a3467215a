//! Ordered set of compiled formats for one family.
//!
//! The registry answers two questions: "which format does this segment conform to?" and "which
//! format has exactly this definition?". Formats are kept in family order (ascending segment
//! order, then registration order).
//!
//! Formats may overlap, e.g. `T\d\d` and `\a\d\d` both accept `T01`. The first format in family
//! order wins. Overlaps are reported by [`FormatRegistry::overlapping`] so callers can warn, but
//! they are never rejected.

use crate::error::{CodeError, CodeResult};
use crate::format::CompiledFormat;
use crate::ids::FormatId;
use crate::validation::Delimiter;

/// A compiled format together with the record it came from.
#[derive(Clone, Debug)]
pub struct RegisteredFormat {
    pub id: FormatId,
    pub segment_order: u32,
    pub compiled: CompiledFormat,
}

#[derive(Clone, Debug)]
pub struct FormatRegistry {
    delimiter: Delimiter,
    formats: Vec<RegisteredFormat>,
}

impl FormatRegistry {
    pub fn new(delimiter: Delimiter) -> Self {
        Self {
            delimiter,
            formats: Vec::new(),
        }
    }

    /// Compiles and appends a format, keeping family order.
    ///
    /// Returns the definitions of already registered formats that overlap the new one.
    ///
    /// # Errors
    ///
    /// Propagates compile errors from [`CompiledFormat::compile`].
    pub fn register(
        &mut self,
        id: FormatId,
        definition: &str,
        segment_order: u32,
    ) -> CodeResult<Vec<String>> {
        let compiled = CompiledFormat::compile(definition, &self.delimiter)?;
        let overlaps = self
            .formats
            .iter()
            .filter(|f| f.compiled.overlaps(&compiled))
            .map(|f| f.compiled.definition().to_owned())
            .collect();

        // Stable insert after every format with an order <= the new one.
        let at = self
            .formats
            .iter()
            .position(|f| f.segment_order > segment_order)
            .unwrap_or(self.formats.len());
        self.formats.insert(
            at,
            RegisteredFormat {
                id,
                segment_order,
                compiled,
            },
        );

        Ok(overlaps)
    }

    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredFormat> {
        self.formats.iter()
    }

    pub fn get(&self, id: FormatId) -> Option<&RegisteredFormat> {
        self.formats.iter().find(|f| f.id == id)
    }

    /// Finds the first format, in family order, that `segment` conforms to.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::NoMatchingFormat`] with every tried definition if none match.
    pub fn get_format_for_segment(&self, segment: &str) -> CodeResult<&RegisteredFormat> {
        self.formats
            .iter()
            .find(|f| f.compiled.is_match(segment))
            .ok_or_else(|| CodeError::NoMatchingFormat {
                segment: segment.to_owned(),
                tried: self.definitions(),
            })
    }

    /// Finds the format whose definition is exactly `definition`.
    pub fn find_by_definition(&self, definition: &str) -> Option<&RegisteredFormat> {
        self.formats
            .iter()
            .find(|f| f.compiled.definition() == definition)
    }

    /// Pairs of registered definitions that can match a common segment.
    pub fn overlapping(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (i, a) in self.formats.iter().enumerate() {
            for b in &self.formats[i + 1..] {
                if a.compiled.overlaps(&b.compiled) {
                    pairs.push((
                        a.compiled.definition().to_owned(),
                        b.compiled.definition().to_owned(),
                    ));
                }
            }
        }
        pairs
    }

    pub fn definitions(&self) -> Vec<String> {
        self.formats
            .iter()
            .map(|f| f.compiled.definition().to_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(definitions: &[&str]) -> FormatRegistry {
        let mut registry = FormatRegistry::new(Delimiter::default());
        for definition in definitions {
            registry
                .register(FormatId::new(), definition, 0)
                .expect("format should register");
        }
        registry
    }

    #[test]
    fn get_format_for_segment_finds_matching_definition() {
        let registry = registry(&[
            r"T\d\d",
            r"X\d\d",
            r"B\d\dR\d\dC\d\d",
            r"\a\p\d\d\d",
            r"0\d\p\p\p!A\a",
            "TBD",
        ]);

        let cases = [
            ("T01", r"T\d\d"),
            ("X55", r"X\d\d"),
            ("B01R05C09", r"B\d\dR\d\dC\d\d"),
            ("A!339", r"\a\p\d\d\d"),
            ("01###!AQ", r"0\d\p\p\p!A\a"),
            ("TBD", "TBD"),
        ];

        for (segment, expected) in cases {
            let found = registry
                .get_format_for_segment(segment)
                .unwrap_or_else(|e| panic!("{segment}: {e}"));
            assert_eq!(found.compiled.definition(), expected);
        }
    }

    #[test]
    fn get_format_for_segment_reports_tried_formats() {
        let registry = registry(&[r"T\d\d", r"C\d\d"]);
        let err = registry.get_format_for_segment("Z9").expect_err("no match");

        match err {
            CodeError::NoMatchingFormat { segment, tried } => {
                assert_eq!(segment, "Z9");
                assert_eq!(tried, vec![r"T\d\d".to_owned(), r"C\d\d".to_owned()]);
            }
            other => panic!("expected NoMatchingFormat, got {other:?}"),
        }
    }

    #[test]
    fn get_format_for_segment_does_not_match_partially() {
        let registry = registry(&[r"T\d\d"]);
        assert!(registry.get_format_for_segment("T012").is_err());
        assert!(registry.get_format_for_segment("xT01").is_err());
    }

    #[test]
    fn first_registered_format_wins_on_overlap() {
        let mut registry = FormatRegistry::new(Delimiter::default());
        registry.register(FormatId::new(), r"\a\d\d", 0).unwrap();
        let overlaps = registry.register(FormatId::new(), r"T\d\d", 0).unwrap();

        assert_eq!(overlaps, vec![r"\a\d\d".to_owned()]);
        let found = registry.get_format_for_segment("T01").unwrap();
        assert_eq!(found.compiled.definition(), r"\a\d\d");
        assert_eq!(registry.overlapping().len(), 1);
    }

    #[test]
    fn segment_order_takes_precedence_over_registration() {
        let mut registry = FormatRegistry::new(Delimiter::default());
        let late = FormatId::new();
        registry.register(FormatId::new(), r"\a\d\d", 2).unwrap();
        registry.register(late, r"T\d\d", 1).unwrap();
        registry.register(FormatId::new(), r"C\d\d", 2).unwrap();

        assert_eq!(
            registry.definitions(),
            vec![r"T\d\d".to_owned(), r"\a\d\d".to_owned(), r"C\d\d".to_owned()]
        );
        assert_eq!(registry.get_format_for_segment("T01").unwrap().id, late);
    }

    #[test]
    fn find_by_definition_requires_exact_text() {
        let registry = registry(&[r"T\d\d", r"C\d\d"]);
        assert!(registry.find_by_definition(r"C\d\d").is_some());
        assert!(registry.find_by_definition(r"C\d").is_none());
    }

    #[test]
    fn register_rejects_bad_definitions() {
        let mut registry = FormatRegistry::new(Delimiter::default());
        assert!(matches!(
            registry.register(FormatId::new(), r"A\d:B", 0),
            Err(CodeError::DelimiterInFormat { .. })
        ));
        assert!(registry.is_empty());
    }
}
