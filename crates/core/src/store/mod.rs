//! In-memory code store and hierarchy manager.
//!
//! The store owns every family, format and segment, and keeps explicit adjacency indices:
//!
//! ```text
//! family_order                  [FamilyId, ...]            creation order
//! family_formats   FamilyId  -> [FormatId, ...]            registration order
//! format_segments  FormatId  -> [SegmentId, ...]           creation order
//! children         SegmentId -> [SegmentId, ...]           creation order
//! ```
//!
//! Every mutating operation either completes or leaves the store untouched: multi-step
//! operations run inside [`CodeStore::transaction`], which restores a snapshot on error.
//!
//! ## Pure Data Operations
//!
//! No persistence happens here beyond the explicit [`CodeStore::save`] / [`CodeStore::load`]
//! helpers in `snapshot`. Callers that share a store across threads wrap it themselves.

mod cloning;
mod query;
mod segments;

pub use query::SegmentFilter;

use crate::constants::{MAX_DESCRIPTION_LEN, MAX_FAMILY_NAME_LEN};
use crate::error::{CodeError, CodeResult};
use crate::format::CompiledFormat;
use crate::ids::{FamilyId, FormatId, SegmentId};
use crate::model::{
    Actor, AuditStamp, FamilyDraft, FamilyUpdate, FormatDefinition, FormatDraft, FormatFamily,
    FormatUpdate, SegmentInstance,
};
use crate::registry::FormatRegistry;
use locode_types::NonEmptyText;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct CodeStore {
    families: HashMap<FamilyId, FormatFamily>,
    family_order: Vec<FamilyId>,
    formats: HashMap<FormatId, FormatDefinition>,
    family_formats: HashMap<FamilyId, Vec<FormatId>>,
    segments: HashMap<SegmentId, SegmentInstance>,
    format_segments: HashMap<FormatId, Vec<SegmentId>>,
    children: HashMap<SegmentId, Vec<SegmentId>>,
}

/// Trims optional operator text, treating blank input as absent.
pub(crate) fn optional_text(value: Option<String>, max: usize) -> CodeResult<Option<NonEmptyText>> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(Some(NonEmptyText::with_max_len(v, max)?)),
        _ => Ok(None),
    }
}

impl CodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op` against the store, restoring the previous state if it fails.
    ///
    /// The rollback point is a full clone of the store, so each call costs time and memory
    /// proportional to the total number of records, not to the records `op` touches.
    pub fn transaction<T>(&mut self, op: impl FnOnce(&mut Self) -> CodeResult<T>) -> CodeResult<T> {
        let snapshot = self.clone();
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!(error = %err, "rolling back code store transaction");
                *self = snapshot;
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn family(&self, id: FamilyId) -> CodeResult<&FormatFamily> {
        self.families.get(&id).ok_or_else(|| CodeError::NotFound {
            kind: "family",
            id: id.to_string(),
        })
    }

    pub fn format(&self, id: FormatId) -> CodeResult<&FormatDefinition> {
        self.formats.get(&id).ok_or_else(|| CodeError::NotFound {
            kind: "format",
            id: id.to_string(),
        })
    }

    pub fn segment(&self, id: SegmentId) -> CodeResult<&SegmentInstance> {
        self.segments.get(&id).ok_or_else(|| CodeError::NotFound {
            kind: "segment",
            id: id.to_string(),
        })
    }

    /// Families in creation order.
    pub fn families(&self) -> impl Iterator<Item = &FormatFamily> {
        self.family_order
            .iter()
            .filter_map(|id| self.families.get(id))
    }

    pub fn family_by_name(&self, project: &NonEmptyText, name: &str) -> Option<&FormatFamily> {
        self.families()
            .find(|f| &f.project == project && f.name.as_str() == name.trim())
    }

    /// Formats of `family` in family order (segment order, then registration order).
    pub fn formats(&self, family: FamilyId) -> Vec<&FormatDefinition> {
        let mut formats: Vec<&FormatDefinition> = self
            .family_formats
            .get(&family)
            .into_iter()
            .flatten()
            .filter_map(|id| self.formats.get(id))
            .collect();
        formats.sort_by_key(|f| f.segment_order);
        formats
    }

    /// Compiles the family's formats into a registry.
    pub fn registry(&self, family: FamilyId) -> CodeResult<FormatRegistry> {
        let record = self.family(family)?;
        let mut registry = FormatRegistry::new(record.delimiter.clone());

        for id in self.family_formats.get(&family).into_iter().flatten() {
            let format = self.format(*id)?;
            registry.register(format.id, &format.char_definition, format.segment_order)?;
        }

        Ok(registry)
    }

    /// The family a segment belongs to, through its bound format.
    pub fn family_of(&self, segment: &SegmentInstance) -> CodeResult<FamilyId> {
        Ok(self.format(segment.format)?.family)
    }

    /// Number of segments bound to `format`.
    pub fn format_usage(&self, format: FormatId) -> usize {
        self.format_segments.get(&format).map_or(0, Vec::len)
    }

    // ------------------------------------------------------------------
    // Families
    // ------------------------------------------------------------------

    /// Creates a new, empty family.
    ///
    /// # Errors
    ///
    /// - [`CodeError::InvalidInput`] for a blank or over-long name or description.
    /// - [`CodeError::DuplicateFamily`] if the project already has a family with that name.
    pub fn create_family(&mut self, draft: FamilyDraft, actor: &Actor) -> CodeResult<FamilyId> {
        let name = NonEmptyText::with_max_len(&draft.name, MAX_FAMILY_NAME_LEN)?;
        let description = optional_text(draft.description, MAX_DESCRIPTION_LEN)?;

        if self.family_by_name(&draft.project, name.as_str()).is_some() {
            return Err(CodeError::DuplicateFamily {
                name: name.into_inner(),
                project: draft.project.into_inner(),
            });
        }

        let id = FamilyId::new();
        let family = FormatFamily {
            id,
            project: draft.project,
            name,
            description,
            shared: draft.shared,
            delimiter: draft.delimiter.unwrap_or_default(),
            audit: AuditStamp::new(actor),
        };

        tracing::info!(family = %id, name = %family.name, project = %family.project, "created family");
        self.families.insert(id, family);
        self.family_order.push(id);
        self.family_formats.insert(id, Vec::new());
        Ok(id)
    }

    /// Updates the descriptive fields of a family.
    pub fn update_family(
        &mut self,
        id: FamilyId,
        update: FamilyUpdate,
        actor: &Actor,
    ) -> CodeResult<()> {
        let description = match update.description {
            Some(value) => Some(optional_text(value, MAX_DESCRIPTION_LEN)?),
            None => None,
        };

        let family = self.families.get_mut(&id).ok_or_else(|| CodeError::NotFound {
            kind: "family",
            id: id.to_string(),
        })?;
        if let Some(description) = description {
            family.description = description;
        }
        if let Some(shared) = update.shared {
            family.shared = shared;
        }
        family.audit.touch(actor);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Formats
    // ------------------------------------------------------------------

    /// Registers a new format level for `family`.
    ///
    /// A format that overlaps an existing one is accepted; the overlap is logged because the
    /// earlier format will win when segments are matched.
    ///
    /// # Errors
    ///
    /// Propagates [`CompiledFormat::compile`] errors and [`CodeError::NotFound`].
    pub fn add_format(
        &mut self,
        family: FamilyId,
        draft: FormatDraft,
        actor: &Actor,
    ) -> CodeResult<FormatId> {
        let description = optional_text(draft.description, MAX_DESCRIPTION_LEN)?;
        let mut registry = self.registry(family)?;
        let id = FormatId::new();

        let overlaps = registry.register(id, &draft.char_definition, draft.segment_order)?;
        if !overlaps.is_empty() {
            tracing::warn!(
                format = %draft.char_definition,
                overlaps = ?overlaps,
                "format overlaps existing formats; the first in family order wins"
            );
        }
        let segment_length = registry
            .get(id)
            .map_or(0, |f| f.compiled.segment_length());

        let format = FormatDefinition {
            id,
            family,
            char_definition: draft.char_definition,
            segment_length,
            segment_order: draft.segment_order,
            description,
            audit: AuditStamp::new(actor),
        };

        tracing::info!(family = %family, format = %format.char_definition, "added format");
        self.formats.insert(id, format);
        self.family_formats.entry(family).or_default().push(id);
        self.format_segments.insert(id, Vec::new());
        Ok(id)
    }

    /// Updates a format.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::FormatInUse`] when changing the definition of a format that segments
    /// already reference, and compile errors for an invalid new definition.
    ///
    /// On success returns the definitions of the family's other formats that a new definition
    /// overlaps; overlaps are logged the same way as in [`add_format`](Self::add_format).
    pub fn update_format(
        &mut self,
        id: FormatId,
        update: FormatUpdate,
        actor: &Actor,
    ) -> CodeResult<Vec<String>> {
        let current = self.format(id)?.clone();
        let delimiter = self.family(current.family)?.delimiter.clone();

        let mut segment_length = current.segment_length;
        let mut overlaps = Vec::new();
        if let Some(definition) = &update.char_definition {
            if *definition != current.char_definition {
                let count = self.format_usage(id);
                if count > 0 {
                    return Err(CodeError::FormatInUse {
                        definition: current.char_definition,
                        count,
                    });
                }
                let compiled = CompiledFormat::compile(definition, &delimiter)?;
                segment_length = compiled.segment_length();
                overlaps = self
                    .registry(current.family)?
                    .iter()
                    .filter(|f| f.id != id && f.compiled.overlaps(&compiled))
                    .map(|f| f.compiled.definition().to_owned())
                    .collect();
                if !overlaps.is_empty() {
                    tracing::warn!(
                        format = %definition,
                        overlaps = ?overlaps,
                        "format overlaps existing formats; the first in family order wins"
                    );
                }
            }
        }
        let description = match update.description {
            Some(value) => Some(optional_text(value, MAX_DESCRIPTION_LEN)?),
            None => None,
        };

        let format = self.formats.get_mut(&id).ok_or_else(|| CodeError::NotFound {
            kind: "format",
            id: id.to_string(),
        })?;
        if let Some(definition) = update.char_definition {
            format.char_definition = definition;
            format.segment_length = segment_length;
        }
        if let Some(order) = update.segment_order {
            format.segment_order = order;
        }
        if let Some(description) = description {
            format.description = description;
        }
        format.audit.touch(actor);
        Ok(overlaps)
    }

    /// Removes an unused format.
    ///
    /// # Errors
    ///
    /// - [`CodeError::FormatInUse`] if segments reference the format.
    /// - [`CodeError::DepthExceeded`] if the family's deepest segment would then have more
    ///   levels than formats.
    pub fn remove_format(&mut self, id: FormatId) -> CodeResult<FormatDefinition> {
        let format = self.format(id)?.clone();
        let count = self.format_usage(id);
        if count > 0 {
            return Err(CodeError::FormatInUse {
                definition: format.char_definition,
                count,
            });
        }

        let remaining = self.formats(format.family).len() - 1;
        let deepest = self
            .family_segments(format.family)
            .map(|s| s.level + 1)
            .max()
            .unwrap_or(0);
        if deepest > remaining {
            return Err(CodeError::DepthExceeded {
                found: deepest,
                allowed: remaining,
            });
        }

        self.formats.remove(&id);
        self.format_segments.remove(&id);
        if let Some(list) = self.family_formats.get_mut(&format.family) {
            list.retain(|f| *f != id);
        }
        tracing::info!(format = %format.char_definition, "removed format");
        Ok(format)
    }

    /// Indexes a stored family record as is.
    pub(crate) fn restore_family(&mut self, family: FormatFamily) -> CodeResult<()> {
        if self.families.contains_key(&family.id)
            || self.family_by_name(&family.project, family.name.as_str()).is_some()
        {
            return Err(CodeError::DuplicateFamily {
                name: family.name.into_inner(),
                project: family.project.into_inner(),
            });
        }
        self.family_order.push(family.id);
        self.family_formats.insert(family.id, Vec::new());
        self.families.insert(family.id, family);
        Ok(())
    }

    /// Recompiles a stored format record against its family and indexes it.
    pub(crate) fn restore_format(&mut self, mut format: FormatDefinition) -> CodeResult<()> {
        if self.formats.contains_key(&format.id) {
            return Err(CodeError::InvalidInput(format!(
                "duplicate format id {}",
                format.id
            )));
        }
        let delimiter = &self.family(format.family)?.delimiter;
        format.segment_length = CompiledFormat::compile(&format.char_definition, delimiter)?
            .segment_length();

        self.family_formats
            .entry(format.family)
            .or_default()
            .push(format.id);
        self.format_segments.insert(format.id, Vec::new());
        self.formats.insert(format.id, format);
        Ok(())
    }

    /// All segments of `family`, grouped by format in registration order.
    pub fn family_segments(&self, family: FamilyId) -> impl Iterator<Item = &SegmentInstance> {
        self.family_formats
            .get(&family)
            .into_iter()
            .flatten()
            .flat_map(|f| self.format_segments.get(f).into_iter().flatten())
            .filter_map(|s| self.segments.get(s))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn actor() -> Actor {
        Actor::new(NonEmptyText::new("tester").unwrap())
            .with_project(NonEmptyText::new("Inventory").unwrap())
    }

    pub fn project(name: &str) -> NonEmptyText {
        NonEmptyText::new(name).unwrap()
    }

    pub fn family_draft(name: &str) -> FamilyDraft {
        FamilyDraft {
            project: project("Inventory"),
            name: name.to_owned(),
            description: None,
            shared: true,
            delimiter: None,
        }
    }

    pub fn format_draft(definition: &str, order: u32) -> FormatDraft {
        FormatDraft {
            char_definition: definition.to_owned(),
            segment_order: order,
            description: None,
        }
    }

    /// A store with one family using `definitions` as its format levels.
    pub fn store_with(definitions: &[&str]) -> (CodeStore, FamilyId, Vec<FormatId>) {
        let mut store = CodeStore::new();
        let actor = actor();
        let family = store
            .create_family(family_draft("Warehouse"), &actor)
            .expect("family should be created");
        let formats = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| {
                store
                    .add_format(family, format_draft(d, i as u32), &actor)
                    .expect("format should be added")
            })
            .collect();
        (store, family, formats)
    }
}
