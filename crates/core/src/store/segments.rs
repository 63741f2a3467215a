//! Segment lifecycle: validation, path computation, cascading repath and deletion.
//!
//! A segment moves through `clean` (validation) before it is stored. Validation checks, in
//! order:
//!
//! 1. the parent chain does not contain the segment itself and belongs to the same family,
//! 2. the depth does not exceed the family's format count,
//! 3. the bound format (explicit, or resolved through the registry) accepts the value,
//! 4. no ancestor carries the same value,
//! 5. no sibling carries the same value.
//!
//! Changing a segment's value or parent re-runs validation and then repaths every descendant,
//! depth first. Each descendant is validated again on the way, so a move that would push a
//! descendant past the family depth is rejected as a whole.

use super::CodeStore;
use crate::error::{CodeError, CodeResult};
use crate::ids::{FamilyId, FormatId, SegmentId};
use crate::model::{Actor, AuditStamp, SegmentDraft, SegmentInstance, SegmentUpdate};
use std::collections::HashSet;

/// Values computed by a successful validation.
struct Cleaned {
    format: FormatId,
    path: String,
    level: usize,
}

fn self_ancestry(segment: &str, chain: &[&SegmentInstance]) -> CodeError {
    CodeError::SelfAncestry {
        segment: segment.to_owned(),
        ancestors: chain.last().map(|a| a.path.clone()).unwrap_or_default(),
    }
}

impl CodeStore {
    fn segment_mut(&mut self, id: SegmentId) -> CodeResult<&mut SegmentInstance> {
        self.segments.get_mut(&id).ok_or_else(|| CodeError::NotFound {
            kind: "segment",
            id: id.to_string(),
        })
    }

    fn family_name(&self, family: FamilyId) -> String {
        self.family(family)
            .map(|f| f.name.to_string())
            .unwrap_or_else(|_| family.to_string())
    }

    fn clean(
        &self,
        id: SegmentId,
        family: FamilyId,
        segment: &str,
        parent: Option<SegmentId>,
        format: Option<FormatId>,
    ) -> CodeResult<Cleaned> {
        let registry = self.registry(family)?;

        let mut chain = Vec::new();
        if let Some(parent_id) = parent {
            let parent_record = self.segment(parent_id)?;
            chain = self.get_ancestors(parent_id);
            chain.push(parent_record);
        }

        if chain.iter().any(|a| a.id == id) {
            return Err(self_ancestry(segment, &chain));
        }

        for ancestor in &chain {
            let ancestor_family = self.family_of(ancestor)?;
            if ancestor_family != family {
                return Err(CodeError::FamilyConsistency {
                    expected: self.family_name(family),
                    found: self.family_name(ancestor_family),
                });
            }
        }

        let depth = chain.len() + 1;
        if depth > registry.len() {
            return Err(CodeError::DepthExceeded {
                found: depth,
                allowed: registry.len(),
            });
        }

        let registered = match format {
            Some(format_id) => match registry.get(format_id) {
                Some(registered) => registered,
                None => {
                    let other = self.format(format_id)?;
                    return Err(CodeError::FamilyConsistency {
                        expected: self.family_name(family),
                        found: self.family_name(other.family),
                    });
                }
            },
            None => registry.get_format_for_segment(segment)?,
        };
        registered.compiled.validate_segment(segment)?;

        if chain.iter().any(|a| a.segment == segment) {
            return Err(self_ancestry(segment, &chain));
        }

        if self
            .siblings(family, parent)
            .iter()
            .any(|s| s.id != id && s.segment == segment)
        {
            return Err(CodeError::DuplicateSegment {
                segment: segment.to_owned(),
                parent: chain
                    .last()
                    .map(|p| p.path.clone())
                    .unwrap_or_else(|| format!("root of {}", self.family_name(family))),
            });
        }

        let delimiter = registry.delimiter();
        let mut values: Vec<&str> = chain.iter().map(|a| a.segment.as_str()).collect();
        values.push(segment);
        let path = values.join(delimiter.as_str());
        let level = delimiter.count_in(&path);

        Ok(Cleaned {
            format: registered.id,
            path,
            level,
        })
    }

    pub(super) fn insert_segment(&mut self, record: SegmentInstance) {
        self.format_segments
            .entry(record.format)
            .or_default()
            .push(record.id);
        if let Some(parent) = record.parent {
            self.children.entry(parent).or_default().push(record.id);
        }
        self.children.entry(record.id).or_default();
        self.segments.insert(record.id, record);
    }

    pub(super) fn remove_segment(&mut self, id: SegmentId) -> Option<SegmentInstance> {
        let record = self.segments.remove(&id)?;
        if let Some(list) = self.format_segments.get_mut(&record.format) {
            list.retain(|s| *s != id);
        }
        if let Some(parent) = record.parent {
            if let Some(list) = self.children.get_mut(&parent) {
                list.retain(|s| *s != id);
            }
        }
        self.children.remove(&id);
        Some(record)
    }

    /// Moves `id` between the parent and format indices.
    fn relink(
        &mut self,
        id: SegmentId,
        (old_parent, new_parent): (Option<SegmentId>, Option<SegmentId>),
        (old_format, new_format): (FormatId, FormatId),
    ) {
        if old_parent != new_parent {
            if let Some(list) = old_parent.and_then(|p| self.children.get_mut(&p)) {
                list.retain(|s| *s != id);
            }
            if let Some(parent) = new_parent {
                self.children.entry(parent).or_default().push(id);
            }
        }
        if old_format != new_format {
            if let Some(list) = self.format_segments.get_mut(&old_format) {
                list.retain(|s| *s != id);
            }
            self.format_segments.entry(new_format).or_default().push(id);
        }
    }

    /// Segments sharing `parent`; for `None`, the roots of `family`.
    pub fn siblings(&self, family: FamilyId, parent: Option<SegmentId>) -> Vec<&SegmentInstance> {
        match parent {
            Some(parent) => self.children(parent),
            None => self.roots(family),
        }
    }

    /// Direct children of `id` in creation order.
    pub fn children(&self, id: SegmentId) -> Vec<&SegmentInstance> {
        self.children
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|c| self.segments.get(c))
            .collect()
    }

    /// Root segments of `family`.
    pub fn roots(&self, family: FamilyId) -> Vec<&SegmentInstance> {
        self.family_segments(family)
            .filter(|s| s.parent.is_none())
            .collect()
    }

    /// Ancestors of `id`, root first. Unknown ids have no ancestors.
    ///
    /// The walk stops at a missing parent or a repeated segment, so a corrupted chain cannot
    /// loop forever.
    pub fn get_ancestors(&self, id: SegmentId) -> Vec<&SegmentInstance> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut next = self.segments.get(&id).and_then(|s| s.parent);

        while let Some(parent_id) = next {
            if !seen.insert(parent_id) {
                tracing::warn!(segment = %id, "cycle in segment ancestry");
                break;
            }
            let Some(parent) = self.segments.get(&parent_id) else {
                tracing::warn!(segment = %id, parent = %parent_id, "missing parent segment");
                break;
            };
            ancestors.push(parent);
            next = parent.parent;
        }

        ancestors.reverse();
        ancestors
    }

    /// `id` and all of its descendants, children before parents.
    pub(crate) fn post_order(&self, id: SegmentId) -> Vec<SegmentId> {
        fn walk(store: &CodeStore, id: SegmentId, seen: &mut HashSet<SegmentId>, out: &mut Vec<SegmentId>) {
            if !seen.insert(id) {
                return;
            }
            for child in store.children.get(&id).into_iter().flatten() {
                walk(store, *child, seen, out);
            }
            out.push(id);
        }

        let mut out = Vec::new();
        walk(self, id, &mut HashSet::new(), &mut out);
        out
    }

    /// `id` and all of its descendants, parents before children, siblings in creation order.
    pub(crate) fn pre_order(&self, id: SegmentId) -> Vec<SegmentId> {
        fn walk(store: &CodeStore, id: SegmentId, seen: &mut HashSet<SegmentId>, out: &mut Vec<SegmentId>) {
            if !seen.insert(id) {
                return;
            }
            out.push(id);
            for child in store.children.get(&id).into_iter().flatten() {
                walk(store, *child, seen, out);
            }
        }

        let mut out = Vec::new();
        walk(self, id, &mut HashSet::new(), &mut out);
        out
    }

    /// Descendants of `id` (and `id` itself when `with_root`), sorted by case-insensitive path.
    pub fn child_tree(&self, id: SegmentId, with_root: bool) -> CodeResult<Vec<&SegmentInstance>> {
        self.segment(id)?;
        let mut tree: Vec<&SegmentInstance> = self
            .post_order(id)
            .into_iter()
            .filter(|s| with_root || *s != id)
            .filter_map(|s| self.segments.get(&s))
            .collect();
        tree.sort_by_key(|s| s.path.to_lowercase());
        Ok(tree)
    }

    /// Ancestor chains of every segment in `family` whose value is `segment`.
    ///
    /// Each chain is root first and excludes the matching segment itself. Callers use this to
    /// spot an existing value at the same tree position before inserting.
    pub fn get_all_root_trees(&self, family: FamilyId, segment: &str) -> Vec<Vec<&SegmentInstance>> {
        self.family_segments(family)
            .filter(|s| s.segment == segment)
            .map(|s| self.get_ancestors(s.id))
            .collect()
    }

    /// Re-validates a stored record, keeping its id and audit stamp, and indexes it.
    ///
    /// Parents must be restored before their children.
    pub(crate) fn restore_segment(&mut self, mut record: SegmentInstance) -> CodeResult<()> {
        if self.segments.contains_key(&record.id) {
            return Err(CodeError::InvalidInput(format!(
                "duplicate segment id {}",
                record.id
            )));
        }
        let family = self.family_of(&record)?;
        let cleaned = self.clean(
            record.id,
            family,
            &record.segment,
            record.parent,
            Some(record.format),
        )?;
        record.path = cleaned.path;
        record.level = cleaned.level;
        self.insert_segment(record);
        Ok(())
    }

    /// Validates and stores a new segment.
    ///
    /// # Errors
    ///
    /// Any validation failure listed in the module docs; nothing is stored on error.
    pub fn create_segment(
        &mut self,
        family: FamilyId,
        draft: SegmentDraft,
        actor: &Actor,
    ) -> CodeResult<SegmentId> {
        let id = SegmentId::new();
        let cleaned = self.clean(id, family, &draft.segment, draft.parent, draft.format)?;

        let record = SegmentInstance {
            id,
            format: cleaned.format,
            segment: draft.segment,
            parent: draft.parent,
            path: cleaned.path,
            level: cleaned.level,
            audit: AuditStamp::new(actor),
        };

        tracing::info!(segment = %id, path = %record.path, "created segment");
        self.insert_segment(record);
        Ok(id)
    }

    /// Changes a segment's value, parent or format, then repaths its descendants.
    ///
    /// Setting the parent to the segment itself or to one of its descendants fails with
    /// [`CodeError::SelfAncestry`]. Any failure, including one found while repathing a
    /// descendant, leaves the store unchanged.
    pub fn update_segment(
        &mut self,
        id: SegmentId,
        update: SegmentUpdate,
        actor: &Actor,
    ) -> CodeResult<()> {
        self.transaction(|store| {
            let current = store.segment(id)?.clone();
            let family = store.family_of(&current)?;
            let segment = update.segment.unwrap_or_else(|| current.segment.clone());
            let parent = update.parent.unwrap_or(current.parent);
            let format = update.format.unwrap_or(current.format);

            let cleaned = store.clean(id, family, &segment, parent, Some(format))?;
            store.relink(
                id,
                (current.parent, parent),
                (current.format, cleaned.format),
            );

            let record = store.segment_mut(id)?;
            record.segment = segment;
            record.parent = parent;
            record.format = cleaned.format;
            record.path = cleaned.path;
            record.level = cleaned.level;
            record.audit.touch(actor);
            tracing::info!(segment = %id, path = %record.path, "updated segment");

            let repathed = store.cascade_repath(id, actor)?;
            tracing::debug!(segment = %id, repathed, "repathed descendants");
            Ok(())
        })
    }

    /// Recomputes the path and level of `id` and all descendants.
    ///
    /// Returns how many segments changed; repathing an already correct tree returns 0.
    pub fn repath(&mut self, id: SegmentId, actor: &Actor) -> CodeResult<usize> {
        self.transaction(|store| {
            let own = usize::from(store.revalidate(id, actor)?);
            Ok(own + store.cascade_repath(id, actor)?)
        })
    }

    fn revalidate(&mut self, id: SegmentId, actor: &Actor) -> CodeResult<bool> {
        let current = self.segment(id)?.clone();
        let family = self.family_of(&current)?;
        let cleaned = self.clean(
            id,
            family,
            &current.segment,
            current.parent,
            Some(current.format),
        )?;
        if cleaned.path == current.path && cleaned.level == current.level {
            return Ok(false);
        }

        let record = self.segment_mut(id)?;
        record.path = cleaned.path;
        record.level = cleaned.level;
        record.audit.touch(actor);
        Ok(true)
    }

    fn cascade_repath(&mut self, id: SegmentId, actor: &Actor) -> CodeResult<usize> {
        let mut changed = 0;
        let children = self.children.get(&id).cloned().unwrap_or_default();
        for child in children {
            changed += usize::from(self.revalidate(child, actor)?);
            changed += self.cascade_repath(child, actor)?;
        }
        Ok(changed)
    }

    /// Deletes `id` and its whole subtree, leaves first.
    ///
    /// Returns the deleted paths in deletion order.
    pub fn delete_segment(&mut self, id: SegmentId) -> CodeResult<Vec<String>> {
        self.segment(id)?;
        let paths: Vec<String> = self
            .post_order(id)
            .into_iter()
            .filter_map(|s| self.remove_segment(s))
            .map(|r| r.path)
            .collect();
        tracing::info!(segment = %id, deleted = paths.len(), "deleted segment subtree");
        Ok(paths)
    }

    /// Gets or creates each value as the child of the previous one.
    ///
    /// Formats are resolved through the family registry. Returns the segment ids in order,
    /// including ones that already existed.
    pub fn create_segment_chain<S: AsRef<str>>(
        &mut self,
        family: FamilyId,
        values: &[S],
        actor: &Actor,
    ) -> CodeResult<Vec<SegmentId>> {
        self.transaction(|store| {
            let mut nodes = Vec::with_capacity(values.len());
            let mut parent = None;

            for value in values {
                let value = value.as_ref();
                let existing = store
                    .siblings(family, parent)
                    .iter()
                    .find(|s| s.segment == value)
                    .map(|s| s.id);
                let id = match existing {
                    Some(id) => id,
                    None => store.create_segment(
                        family,
                        SegmentDraft {
                            segment: value.to_owned(),
                            parent,
                            format: None,
                        },
                        actor,
                    )?,
                };
                nodes.push(id);
                parent = Some(id);
            }

            Ok(nodes)
        })
    }

    /// Deletes a chain created by [`create_segment_chain`](Self::create_segment_chain), from the
    /// last node backwards, stopping at the first node that still has children.
    ///
    /// Returns the deleted paths.
    pub fn delete_segment_chain(&mut self, nodes: &[SegmentId]) -> CodeResult<Vec<String>> {
        self.transaction(|store| {
            let mut deleted = Vec::new();
            for id in nodes.iter().rev() {
                if store.children.get(id).is_some_and(|c| !c.is_empty()) {
                    break;
                }
                let record = store.remove_segment(*id).ok_or_else(|| CodeError::NotFound {
                    kind: "segment",
                    id: id.to_string(),
                })?;
                deleted.push(record.path);
            }
            Ok(deleted)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::validation::Delimiter;

    fn draft(segment: &str, parent: Option<SegmentId>) -> SegmentDraft {
        SegmentDraft {
            segment: segment.to_owned(),
            parent,
            format: None,
        }
    }

    fn assert_level_matches_path(store: &CodeStore, family: FamilyId) {
        let delimiter = store.family(family).unwrap().delimiter.clone();
        for segment in store.family_segments(family) {
            assert_eq!(segment.level, delimiter.count_in(&segment.path), "{}", segment.path);
        }
    }

    #[test]
    fn create_segment_computes_path_and_level() {
        let (mut store, family, formats) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();

        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();

        let root = store.segment(root).unwrap();
        assert_eq!((root.path.as_str(), root.level), ("T01", 0));
        assert_eq!(root.format, formats[0]);

        let child = store.segment(child).unwrap();
        assert_eq!((child.path.as_str(), child.level), ("T01:C01", 1));
        assert_eq!(child.format, formats[1]);
        assert_level_matches_path(&store, family);
    }

    #[test]
    fn create_segment_validates_against_explicit_format() {
        let (mut store, family, formats) = store_with(&[r"T\d\d"]);
        let actor = actor();

        let ok = SegmentDraft {
            segment: "T01".into(),
            parent: None,
            format: Some(formats[0]),
        };
        assert!(store.create_segment(family, ok, &actor).is_ok());

        let bad = SegmentDraft {
            segment: "T1".into(),
            parent: None,
            format: Some(formats[0]),
        };
        let err = store.create_segment(family, bad, &actor).unwrap_err();
        assert!(matches!(err, CodeError::SegmentValidation { .. }));
        assert_eq!(err.field(), Some("segment"));
    }

    #[test]
    fn create_segment_reports_unmatched_values() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let err = store
            .create_segment(family, draft("Q01", None), &actor())
            .unwrap_err();
        assert!(matches!(err, CodeError::NoMatchingFormat { tried, .. } if tried.len() == 2));
    }

    #[test]
    fn depth_beyond_registered_formats_is_rejected() {
        let (mut store, family, formats) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();

        let err = store
            .create_segment(family, draft("X01", Some(child)), &actor)
            .expect_err("third level with an unregistered format");
        assert!(matches!(
            err,
            CodeError::DepthExceeded {
                found: 3,
                allowed: 2
            }
        ));

        let explicit = SegmentDraft {
            segment: "C02".into(),
            parent: Some(child),
            format: Some(formats[1]),
        };
        assert!(matches!(
            store.create_segment(family, explicit, &actor),
            Err(CodeError::DepthExceeded { .. })
        ));
        assert_eq!(store.family_segments(family).count(), 2);
    }

    #[test]
    fn segment_equal_to_ancestor_is_rejected() {
        let (mut store, family, formats) = store_with(&[r"T\d\d", r"C\d\d", r"\a\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();

        let repeat = SegmentDraft {
            segment: "T01".into(),
            parent: Some(child),
            format: Some(formats[2]),
        };
        let err = store.create_segment(family, repeat, &actor).unwrap_err();
        assert!(matches!(err, CodeError::SelfAncestry { segment, ancestors }
            if segment == "T01" && ancestors == "T01:C01"));
    }

    #[test]
    fn parent_cannot_be_self_or_descendant() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"X\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();
        let grandchild = store
            .create_segment(family, draft("X01", Some(child)), &actor)
            .unwrap();

        for new_parent in [root, child, grandchild] {
            let update = SegmentUpdate {
                parent: Some(Some(new_parent)),
                ..Default::default()
            };
            let err = store.update_segment(root, update, &actor).unwrap_err();
            assert!(matches!(err, CodeError::SelfAncestry { .. }), "{err:?}");
        }

        let root = store.segment(root).unwrap();
        assert_eq!(root.parent, None);
        assert_eq!(root.path, "T01");
    }

    #[test]
    fn ancestors_must_share_the_family() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let other = store
            .create_family(family_draft("Yard"), &actor)
            .unwrap();
        let other_format = store
            .add_format(other, format_draft(r"C\d\d", 0), &actor)
            .unwrap();
        store.add_format(other, format_draft(r"D\d\d", 1), &actor).unwrap();

        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let err = store
            .create_segment(other, draft("C01", Some(root)), &actor)
            .unwrap_err();
        assert!(matches!(err, CodeError::FamilyConsistency { expected, found }
            if expected == "Yard" && found == "Warehouse"));

        let foreign_format = SegmentDraft {
            segment: "C01".into(),
            parent: Some(root),
            format: Some(other_format),
        };
        assert!(matches!(
            store.create_segment(family, foreign_format, &actor),
            Err(CodeError::FamilyConsistency { .. })
        ));
    }

    #[test]
    fn siblings_must_be_unique() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();

        assert!(matches!(
            store.create_segment(family, draft("T01", None), &actor),
            Err(CodeError::DuplicateSegment { .. })
        ));
        let err = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap_err();
        assert!(matches!(err, CodeError::DuplicateSegment { parent, .. } if parent == "T01"));

        let other_root = store.create_segment(family, draft("T02", None), &actor).unwrap();
        assert!(store
            .create_segment(family, draft("C01", Some(other_root)), &actor)
            .is_ok());
    }

    #[test]
    fn renaming_a_segment_cascades_to_descendants() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"\a\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();
        let leaf = store
            .create_segment(family, draft("B07", Some(child)), &actor)
            .unwrap();

        let update = SegmentUpdate {
            segment: Some("T09".into()),
            ..Default::default()
        };
        store.update_segment(root, update, &actor).unwrap();

        assert_eq!(store.segment(child).unwrap().path, "T09:C01");
        assert_eq!(store.segment(leaf).unwrap().path, "T09:C01:B07");
        assert_level_matches_path(&store, family);
    }

    #[test]
    fn moving_a_subtree_repaths_it() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"\a\d\d"]);
        let actor = actor();
        let first = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let second = store.create_segment(family, draft("T02", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(first)), &actor)
            .unwrap();
        let leaf = store
            .create_segment(family, draft("B07", Some(child)), &actor)
            .unwrap();

        let update = SegmentUpdate {
            parent: Some(Some(second)),
            ..Default::default()
        };
        store.update_segment(child, update, &actor).unwrap();

        assert!(store.children(first).is_empty());
        assert_eq!(store.children(second).len(), 1);
        assert_eq!(store.segment(leaf).unwrap().path, "T02:C01:B07");
        assert_eq!(store.segment(leaf).unwrap().level, 2);
    }

    #[test]
    fn failed_cascade_rolls_back_the_move() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"X\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();
        let leaf = store
            .create_segment(family, draft("X01", Some(child)), &actor)
            .unwrap();
        let other = store.create_segment(family, draft("T02", None), &actor).unwrap();

        let update = SegmentUpdate {
            parent: Some(Some(other)),
            format: None,
            segment: None,
        };
        let err = store.update_segment(root, update, &actor).unwrap_err();
        assert!(matches!(err, CodeError::DepthExceeded { found: 4, .. }));

        assert_eq!(store.segment(root).unwrap().parent, None);
        assert_eq!(store.segment(root).unwrap().path, "T01");
        assert_eq!(store.segment(leaf).unwrap().path, "T01:C01:X01");
        assert!(store.children(other).is_empty());
    }

    #[test]
    fn repath_is_idempotent() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let root = store.create_segment(family, draft("T01", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("C01", Some(root)), &actor)
            .unwrap();
        let before = store.segment(child).unwrap().clone();

        assert_eq!(store.repath(root, &actor).unwrap(), 0);
        assert_eq!(store.repath(root, &actor).unwrap(), 0);
        assert_eq!(store.segment(child).unwrap(), &before);
    }

    #[test]
    fn multi_character_delimiter_counts_levels() {
        let mut store = CodeStore::new();
        let actor = actor();
        let mut racks = family_draft("Racks");
        racks.delimiter = Some(Delimiter::parse(Some("->")).unwrap());
        let family = store.create_family(racks, &actor).unwrap();
        store.add_format(family, format_draft(r"\a\a>\d\d", 0), &actor).unwrap();
        store.add_format(family, format_draft(r"\d\d", 1), &actor).unwrap();

        let root = store.create_segment(family, draft("XY>00", None), &actor).unwrap();
        let child = store
            .create_segment(family, draft("42", Some(root)), &actor)
            .unwrap();

        let child = store.segment(child).unwrap();
        assert_eq!(child.path, "XY>00->42");
        assert_eq!(child.level, 1);
        assert_level_matches_path(&store, family);
    }

    #[test]
    fn get_ancestors_is_root_first() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"X\d\d"]);
        let actor = actor();
        let nodes = store
            .create_segment_chain(family, &["T01", "C01", "X01"], &actor)
            .unwrap();

        let ancestors: Vec<_> = store
            .get_ancestors(nodes[2])
            .iter()
            .map(|s| s.segment.clone())
            .collect();
        assert_eq!(ancestors, vec!["T01", "C01"]);
        assert!(store.get_ancestors(nodes[0]).is_empty());
        assert!(store.get_ancestors(SegmentId::new()).is_empty());
    }

    #[test]
    fn get_all_root_trees_returns_each_chain() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        store.create_segment_chain(family, &["T01", "C01"], &actor).unwrap();
        store.create_segment_chain(family, &["T02", "C01"], &actor).unwrap();

        let mut trees: Vec<Vec<String>> = store
            .get_all_root_trees(family, "C01")
            .into_iter()
            .map(|chain| chain.iter().map(|s| s.segment.clone()).collect())
            .collect();
        trees.sort();
        assert_eq!(trees, vec![vec!["T01".to_owned()], vec!["T02".to_owned()]]);
        assert!(store.get_all_root_trees(family, "C99").is_empty());
    }

    #[test]
    fn create_segment_chain_reuses_existing_nodes() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let first = store.create_segment_chain(family, &["T01", "C01"], &actor).unwrap();
        let second = store.create_segment_chain(family, &["T01", "C02"], &actor).unwrap();

        assert_eq!(first[0], second[0]);
        assert_ne!(first[1], second[1]);
        assert_eq!(store.family_segments(family).count(), 3);
    }

    #[test]
    fn create_segment_chain_is_all_or_nothing() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let err = store
            .create_segment_chain(family, &["T01", "bad"], &actor())
            .unwrap_err();
        assert!(matches!(err, CodeError::NoMatchingFormat { .. }));
        assert_eq!(store.family_segments(family).count(), 0);
    }

    #[test]
    fn delete_segment_chain_stops_at_shared_nodes() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        store.create_segment_chain(family, &["T01", "C01"], &actor).unwrap();
        let added = store.create_segment_chain(family, &["T01", "C02"], &actor).unwrap();

        let deleted = store.delete_segment_chain(&added).unwrap();
        assert_eq!(deleted, vec!["T01:C02"]);
        assert_eq!(store.family_segments(family).count(), 2);
    }

    #[test]
    fn delete_segment_removes_subtree_leaves_first() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"X\d\d"]);
        let actor = actor();
        let nodes = store
            .create_segment_chain(family, &["T01", "C01", "X01"], &actor)
            .unwrap();
        store.create_segment_chain(family, &["T02"], &actor).unwrap();

        let deleted = store.delete_segment(nodes[0]).unwrap();
        assert_eq!(deleted, vec!["T01:C01:X01", "T01:C01", "T01"]);
        assert_eq!(store.roots(family).len(), 1);
        assert!(store.segment(nodes[2]).is_err());
    }

    #[test]
    fn traversals_terminate_on_corrupted_chains() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d", r"X\d\d"]);
        let actor = actor();
        let nodes = store
            .create_segment_chain(family, &["T01", "C01", "X01"], &actor)
            .unwrap();
        let (root, child, leaf) = (nodes[0], nodes[1], nodes[2]);

        // Close the chain into a cycle: T01 -> C01 -> X01 -> T01.
        store.segments.get_mut(&root).unwrap().parent = Some(leaf);
        store.children.entry(leaf).or_default().push(root);

        fn values(found: Vec<&SegmentInstance>) -> Vec<String> {
            found.iter().map(|s| s.segment.clone()).collect()
        }
        assert_eq!(values(store.get_ancestors(leaf)), vec!["T01", "C01"]);
        assert_eq!(values(store.get_ancestors(child)), vec!["X01", "T01"]);
        assert_eq!(store.post_order(root), vec![leaf, child, root]);
        assert_eq!(store.pre_order(root), vec![root, child, leaf]);
    }

    #[test]
    fn ancestors_stop_at_missing_parent() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let nodes = store
            .create_segment_chain(family, &["T02", "C02"], &actor)
            .unwrap();

        store.segments.get_mut(&nodes[0]).unwrap().parent = Some(SegmentId::new());

        assert!(store.get_ancestors(nodes[0]).is_empty());
        let ancestors = store.get_ancestors(nodes[1]);
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].id, nodes[0]);
    }

    #[test]
    fn pre_order_keeps_sibling_order() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let mut expected = Vec::new();
        for child in ["C03", "C01", "C02"] {
            let nodes = store
                .create_segment_chain(family, &["T01", child], &actor)
                .unwrap();
            if expected.is_empty() {
                expected.push(nodes[0]);
            }
            expected.push(nodes[1]);
        }

        assert_eq!(store.pre_order(expected[0]), expected);
    }

    #[test]
    fn child_tree_is_sorted_by_path() {
        let (mut store, family, _) = store_with(&[r"T\d\d", r"C\d\d"]);
        let actor = actor();
        let nodes = store.create_segment_chain(family, &["T01", "C02"], &actor).unwrap();
        store.create_segment_chain(family, &["T01", "C01"], &actor).unwrap();

        let paths: Vec<_> = store
            .child_tree(nodes[0], true)
            .unwrap()
            .iter()
            .map(|s| s.path.clone())
            .collect();
        assert_eq!(paths, vec!["T01", "T01:C01", "T01:C02"]);
        assert_eq!(store.child_tree(nodes[0], false).unwrap().len(), 2);
    }
}
