//! Copying families and segment trees between projects, and removing whole families.

use super::CodeStore;
use crate::error::{CodeError, CodeResult};
use crate::ids::{FamilyId, FormatId, SegmentId};
use crate::model::{
    Actor, ClonedRecord, DeletedFamily, DeletedFormat, FamilyDraft, FormatDefinition, FormatDraft,
    SegmentDraft, SegmentInstance,
};
use locode_types::NonEmptyText;
use std::collections::HashMap;

impl CodeStore {
    /// Copies a shared family and its formats into `target_project`.
    ///
    /// Families are matched by (project, name): if the target project already has a family
    /// with the source's name nothing is created and an empty list is returned. Otherwise the
    /// result holds the new family followed by one new format per source format, in family
    /// order. Segments are never copied.
    ///
    /// # Errors
    ///
    /// [`CodeError::CloneNotAllowed`] if the source is not shared or `actor` has no authority
    /// over `target_project`.
    pub fn clone_family(
        &mut self,
        target_project: &NonEmptyText,
        source: FamilyId,
        actor: &Actor,
    ) -> CodeResult<Vec<ClonedRecord>> {
        let family = self.family(source)?.clone();
        if !family.shared {
            return Err(CodeError::CloneNotAllowed {
                family: family.name.into_inner(),
                reason: "the family is not shared".into(),
            });
        }
        if !actor.can_manage(target_project) {
            return Err(CodeError::CloneNotAllowed {
                family: family.name.into_inner(),
                reason: format!("{} cannot manage project {target_project}", actor.name),
            });
        }
        if self
            .family_by_name(target_project, family.name.as_str())
            .is_some()
        {
            tracing::info!(family = %family.name, project = %target_project, "family already cloned");
            return Ok(Vec::new());
        }

        let formats: Vec<FormatDefinition> = self.formats(source).into_iter().cloned().collect();
        self.transaction(|store| {
            let id = store.create_family(
                FamilyDraft {
                    project: target_project.clone(),
                    name: family.name.to_string(),
                    description: family.description.as_ref().map(|d| d.to_string()),
                    shared: family.shared,
                    delimiter: Some(family.delimiter.clone()),
                },
                actor,
            )?;

            let mut cloned = vec![ClonedRecord::Family(id)];
            for format in &formats {
                let format_id = store.add_format(
                    id,
                    FormatDraft {
                        char_definition: format.char_definition.clone(),
                        segment_order: format.segment_order,
                        description: format.description.as_ref().map(|d| d.to_string()),
                    },
                    actor,
                )?;
                cloned.push(ClonedRecord::Format(format_id));
            }

            tracing::info!(
                family = %family.name,
                project = %target_project,
                formats = formats.len(),
                "cloned family"
            );
            Ok(cloned)
        })
    }

    /// Copies the subtree rooted at `source_root` under `target_parent` in `target_family`.
    ///
    /// Each copied segment is bound to the target format with the identical definition. Returns
    /// the new segment ids, parents before children.
    ///
    /// # Errors
    ///
    /// - [`CodeError::CloneNotAllowed`] if the source family is neither shared nor managed by
    ///   `actor`, or `actor` cannot manage the target family's project.
    /// - [`CodeError::NoMatchingFormat`] if the target family lacks a source definition.
    /// - Any segment validation error raised while inserting the copies.
    pub fn clone_segment_tree(
        &mut self,
        source_root: SegmentId,
        target_family: FamilyId,
        target_parent: Option<SegmentId>,
        actor: &Actor,
    ) -> CodeResult<Vec<SegmentId>> {
        let root = self.segment(source_root)?;
        let source = self.family(self.family_of(root)?)?;
        if !source.shared && !actor.can_manage(&source.project) {
            return Err(CodeError::CloneNotAllowed {
                family: source.name.to_string(),
                reason: "the family is not shared".into(),
            });
        }
        let target = self.family(target_family)?;
        if !actor.can_manage(&target.project) {
            return Err(CodeError::CloneNotAllowed {
                family: source.name.to_string(),
                reason: format!("{} cannot manage project {}", actor.name, target.project),
            });
        }

        let registry = self.registry(target_family)?;
        let mut plan: Vec<(SegmentInstance, FormatId)> = Vec::new();
        for id in self.pre_order(source_root) {
            let segment = self.segment(id)?;
            let definition = &self.format(segment.format)?.char_definition;
            let format = registry
                .find_by_definition(definition)
                .ok_or_else(|| CodeError::NoMatchingFormat {
                    segment: segment.segment.clone(),
                    tried: registry.definitions(),
                })?;
            plan.push((segment.clone(), format.id));
        }

        self.transaction(|store| {
            let mut mapped: HashMap<SegmentId, SegmentId> = HashMap::new();
            let mut created = Vec::with_capacity(plan.len());
            for (segment, format) in plan {
                let parent = if segment.id == source_root {
                    target_parent
                } else {
                    segment.parent.and_then(|p| mapped.get(&p).copied())
                };
                let id = store.create_segment(
                    target_family,
                    SegmentDraft {
                        segment: segment.segment,
                        parent,
                        format: Some(format),
                    },
                    actor,
                )?;
                mapped.insert(segment.id, id);
                created.push(id);
            }
            tracing::info!(root = %source_root, copied = created.len(), "cloned segment tree");
            Ok(created)
        })
    }

    /// Removes every segment of the family leaves first, then its formats, then the family.
    pub fn delete_family(&mut self, id: FamilyId) -> CodeResult<DeletedFamily> {
        let family = self.family(id)?.clone();
        let formats: Vec<(FormatId, String)> = self
            .formats(id)
            .iter()
            .map(|f| (f.id, f.char_definition.clone()))
            .collect();

        let roots: Vec<SegmentId> = self.roots(id).iter().map(|s| s.id).collect();
        let mut removed = Vec::new();
        for root in roots {
            for segment in self.post_order(root) {
                removed.extend(self.remove_segment(segment));
            }
        }

        let report = DeletedFamily {
            name: family.name.to_string(),
            formats: formats
                .into_iter()
                .map(|(format, char_definition)| DeletedFormat {
                    char_definition,
                    paths: removed
                        .iter()
                        .filter(|s| s.format == format)
                        .map(|s| s.path.clone())
                        .collect(),
                })
                .collect(),
        };

        for format in self.family_formats.remove(&id).unwrap_or_default() {
            self.formats.remove(&format);
            self.format_segments.remove(&format);
        }
        self.families.remove(&id);
        self.family_order.retain(|f| *f != id);

        tracing::info!(family = %family.name, segments = removed.len(), "deleted family");
        Ok(report)
    }
}
