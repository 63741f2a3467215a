//! Composable segment filters.

use super::CodeStore;
use crate::ids::{FamilyId, FormatId, SegmentId};
use crate::model::SegmentInstance;

/// A predicate over segments, evaluated by [`CodeStore::query`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SegmentFilter {
    /// Exact path.
    Path(String),
    /// The segment at this path and everything below it.
    Under(String),
    /// Exact segment value at any position.
    Segment(String),
    Level(usize),
    Family(FamilyId),
    Format(FormatId),
    /// Children of the given segment; `None` selects roots.
    Parent(Option<SegmentId>),
    Any(Vec<SegmentFilter>),
    All(Vec<SegmentFilter>),
}

impl SegmentFilter {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn under(path: impl Into<String>) -> Self {
        Self::Under(path.into())
    }

    pub fn segment(segment: impl Into<String>) -> Self {
        Self::Segment(segment.into())
    }

    pub fn and(self, other: SegmentFilter) -> Self {
        match self {
            Self::All(mut filters) => {
                filters.push(other);
                Self::All(filters)
            }
            first => Self::All(vec![first, other]),
        }
    }

    pub fn or(self, other: SegmentFilter) -> Self {
        match self {
            Self::Any(mut filters) => {
                filters.push(other);
                Self::Any(filters)
            }
            first => Self::Any(vec![first, other]),
        }
    }

    pub fn matches(&self, store: &CodeStore, segment: &SegmentInstance) -> bool {
        match self {
            Self::Path(path) => segment.path == *path,
            Self::Under(path) => {
                if segment.path == *path {
                    return true;
                }
                let Some(delimiter) = store
                    .family_of(segment)
                    .and_then(|f| store.family(f))
                    .ok()
                    .map(|f| f.delimiter.as_str())
                else {
                    return false;
                };
                segment
                    .path
                    .strip_prefix(path.as_str())
                    .is_some_and(|rest| rest.starts_with(delimiter))
            }
            Self::Segment(value) => segment.segment == *value,
            Self::Level(level) => segment.level == *level,
            Self::Family(family) => store.family_of(segment).is_ok_and(|f| f == *family),
            Self::Format(format) => segment.format == *format,
            Self::Parent(parent) => segment.parent == *parent,
            Self::Any(filters) => filters.iter().any(|f| f.matches(store, segment)),
            Self::All(filters) => filters.iter().all(|f| f.matches(store, segment)),
        }
    }
}

impl CodeStore {
    /// Segments matching `filter`, sorted by path.
    pub fn query(&self, filter: &SegmentFilter) -> Vec<&SegmentInstance> {
        let mut found: Vec<&SegmentInstance> = self
            .segments
            .values()
            .filter(|s| filter.matches(self, s))
            .collect();
        found.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));
        found
    }
}
