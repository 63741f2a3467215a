//! Records managed by the [`CodeStore`](crate::store::CodeStore).
//!
//! - [`FormatFamily`]: a named, project-owned set of formats sharing one delimiter.
//! - [`FormatDefinition`]: one format level of a family.
//! - [`SegmentInstance`]: one concrete segment value, optionally under a parent segment.
//!
//! Drafts (`*Draft`) and updates (`*Update`) carry operator input into the store; records are
//! only ever produced by the store after validation.

use crate::ids::{FamilyId, FormatId, SegmentId};
use crate::validation::Delimiter;
use chrono::{DateTime, Utc};
use locode_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Who created and last changed a record, and when.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub creator: NonEmptyText,
    pub created: DateTime<Utc>,
    pub updater: NonEmptyText,
    pub updated: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: &Actor) -> Self {
        let now = Utc::now();
        Self {
            creator: actor.name.clone(),
            created: now,
            updater: actor.name.clone(),
            updated: now,
        }
    }

    pub fn touch(&mut self, actor: &Actor) {
        self.updater = actor.name.clone();
        self.updated = Utc::now();
    }
}

/// The user performing a mutation, and the projects it has authority over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub name: NonEmptyText,
    projects: BTreeSet<NonEmptyText>,
}

impl Actor {
    pub fn new(name: NonEmptyText) -> Self {
        Self {
            name,
            projects: BTreeSet::new(),
        }
    }

    /// Grants authority over `project`.
    pub fn with_project(mut self, project: NonEmptyText) -> Self {
        self.projects.insert(project);
        self
    }

    pub fn can_manage(&self, project: &NonEmptyText) -> bool {
        self.projects.contains(project)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatFamily {
    pub id: FamilyId,
    pub project: NonEmptyText,
    pub name: NonEmptyText,
    #[serde(default)]
    pub description: Option<NonEmptyText>,
    /// Whether other projects may clone this family's formats.
    pub shared: bool,
    pub delimiter: Delimiter,
    pub audit: AuditStamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDefinition {
    pub id: FormatId,
    pub family: FamilyId,
    pub char_definition: String,
    /// Number of characters a conforming segment has.
    pub segment_length: usize,
    pub segment_order: u32,
    #[serde(default)]
    pub description: Option<NonEmptyText>,
    pub audit: AuditStamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInstance {
    pub id: SegmentId,
    pub format: FormatId,
    pub segment: String,
    #[serde(default)]
    pub parent: Option<SegmentId>,
    /// Delimiter-joined segment values from the root down to this segment.
    pub path: String,
    /// Number of delimiters in `path`; roots are level 0.
    pub level: usize,
    pub audit: AuditStamp,
}

/// Input for [`CodeStore::create_family`](crate::store::CodeStore::create_family).
#[derive(Clone, Debug)]
pub struct FamilyDraft {
    pub project: NonEmptyText,
    pub name: String,
    pub description: Option<String>,
    pub shared: bool,
    /// `None` uses [`Delimiter::default`].
    pub delimiter: Option<Delimiter>,
}

/// Descriptive family fields that stay editable after creation.
#[derive(Clone, Debug, Default)]
pub struct FamilyUpdate {
    pub description: Option<Option<String>>,
    pub shared: Option<bool>,
}

/// Input for [`CodeStore::add_format`](crate::store::CodeStore::add_format).
#[derive(Clone, Debug, Default)]
pub struct FormatDraft {
    pub char_definition: String,
    pub segment_order: u32,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct FormatUpdate {
    pub char_definition: Option<String>,
    pub segment_order: Option<u32>,
    pub description: Option<Option<String>>,
}

/// Input for [`CodeStore::create_segment`](crate::store::CodeStore::create_segment).
#[derive(Clone, Debug, Default)]
pub struct SegmentDraft {
    pub segment: String,
    pub parent: Option<SegmentId>,
    /// `None` resolves the format from the family registry.
    pub format: Option<FormatId>,
}

/// Changes to an existing segment. `parent: Some(None)` moves the segment to the root.
#[derive(Clone, Debug, Default)]
pub struct SegmentUpdate {
    pub segment: Option<String>,
    pub parent: Option<Option<SegmentId>>,
    pub format: Option<FormatId>,
}

/// Records created by a clone operation, in creation order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClonedRecord {
    Family(FamilyId),
    Format(FormatId),
}

/// What [`CodeStore::delete_family`](crate::store::CodeStore::delete_family) removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeletedFamily {
    pub name: String,
    pub formats: Vec<DeletedFormat>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeletedFormat {
    pub char_definition: String,
    /// Paths of the deleted segments bound to this format, leaves first.
    pub paths: Vec<String>,
}

impl DeletedFamily {
    /// All deleted segment paths across formats.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.formats
            .iter()
            .flat_map(|f| f.paths.iter().map(String::as_str))
    }
}
