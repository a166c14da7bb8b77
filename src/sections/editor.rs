//! Section editor: the stateful controller behind the admin case-study
//! editor. One instance per editing session.
//!
//! Reconciliation policy for single-row writes (add, remove, publish,
//! update): the local collection changes first, then the store is written.
//! When the write fails the section id is marked dirty, `needs_resync` is
//! raised and an error notice is posted; [`SectionEditor::reconcile`]
//! refetches and clears the dirty set.
//!
//! A move rewrites two rows and is treated as a unit: if the second write
//! fails, the first is written back. Local state only changes once both
//! writes have landed.
//!
//! The snapshot (`last_valid`) mirrors what the store holds: it only takes
//! writes the store acknowledged, so reverting to it leaves nothing to
//! resync unless the initial load itself failed.
//!
//! `sort_order` values are kept dense (0..n) once a removal lands, so a new
//! section's order (the collection length) always sorts last and no two
//! sections tie.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::fetch::fetch_admin_sections;
use super::notice::{NoticeLevel, Notices};
use super::order::{apply_plan, plan_move, MoveRejection};
use super::store::SectionStore;
use super::{sort_sections, ComponentType, Section, SortDirection};
use crate::error::{SectionError, SectionResult};

const ADD_KEY: &str = "add-section";
const REMOVE_KEY: &str = "remove-section";
const PUBLISH_KEY: &str = "publish-section";
const UPDATE_KEY: &str = "update-section";
const MOVE_KEY: &str = "move-section";
const SYNC_KEY: &str = "sync-sections";

/// Editable section content. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<Value>,
    pub image_url: Option<String>,
}

impl SectionPatch {
    fn apply(self, section: &mut Section) {
        if let Some(title) = self.title {
            section.title = title;
        }
        if let Some(content) = self.content {
            section.content = content;
        }
        if let Some(metadata) = self.metadata {
            section.metadata = metadata;
        }
        if let Some(image_url) = self.image_url {
            section.image_url = Some(image_url);
        }
    }
}

pub struct SectionEditor<S> {
    store: S,
    case_study_id: Option<Uuid>,
    sections: Vec<Section>,
    last_valid: Vec<Section>,
    dirty: BTreeSet<Uuid>,
    needs_resync: bool,
    snapshot_loaded: bool,
    notices: Notices,
}

impl<S: SectionStore> SectionEditor<S> {
    /// Start a session over an already fetched collection.
    pub fn new(store: S, case_study_id: Option<Uuid>, mut sections: Vec<Section>) -> Self {
        sort_sections(&mut sections);
        Self {
            store,
            case_study_id,
            last_valid: sections.clone(),
            sections,
            dirty: BTreeSet::new(),
            needs_resync: false,
            snapshot_loaded: true,
            notices: Notices::new(),
        }
    }

    /// Start a session by fetching the admin view of `case_study_id`.
    pub async fn load(store: S, case_study_id: Option<Uuid>) -> Self {
        let state = fetch_admin_sections(&store, case_study_id).await;
        let mut editor = Self::new(store, case_study_id, state.sections);
        if let Some(error) = state.error {
            editor.needs_resync = true;
            editor.snapshot_loaded = false;
            editor
                .notices
                .push(SYNC_KEY, NoticeLevel::Error, format!("Failed to load sections: {error}"));
        }
        editor
    }

    pub fn case_study_id(&self) -> Option<Uuid> {
        self.case_study_id
    }

    /// Attach the identity assigned when a new case study is first saved.
    pub fn set_case_study_id(&mut self, id: Uuid) {
        self.case_study_id = Some(id);
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn snapshot(&self) -> &[Section] {
        &self.last_valid
    }

    pub fn dirty_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.dirty.iter()
    }

    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Notices {
        std::mem::take(&mut self.notices)
    }

    fn mark_dirty(&mut self, id: Uuid) {
        self.dirty.insert(id);
        self.needs_resync = true;
    }

    fn require_identity(&mut self, key: &str) -> SectionResult<Uuid> {
        match self.case_study_id {
            Some(id) => Ok(id),
            None => {
                self.notices.push(
                    key,
                    NoticeLevel::Error,
                    "Save the case study before editing its sections",
                );
                Err(SectionError::MissingIdentity)
            }
        }
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    fn is_dense(&self) -> bool {
        let mut orders: Vec<i32> = self.sections.iter().map(|s| s.sort_order).collect();
        orders.sort_unstable();
        orders.iter().enumerate().all(|(i, &order)| order == i as i32)
    }

    fn has_tied_orders(&self) -> bool {
        let mut orders: Vec<i32> = self.sections.iter().map(|s| s.sort_order).collect();
        orders.sort_unstable();
        orders.windows(2).any(|pair| pair[0] == pair[1])
    }

    /// Rewrite `sort_order` to 0..n in the current display order and persist
    /// every row whose value changed.
    async fn renumber(&mut self, key: &str) -> SectionResult<()> {
        sort_sections(&mut self.sections);
        let changed: Vec<Section> = self
            .sections
            .iter_mut()
            .enumerate()
            .filter(|(i, s)| s.sort_order != *i as i32)
            .map(|(i, s)| {
                s.sort_order = i as i32;
                s.clone()
            })
            .collect();

        for (written, row) in changed.iter().enumerate() {
            // Rows the store never acknowledged stay local.
            let stored = self.last_valid.iter().any(|s| s.id == row.id);
            if self.case_study_id.is_some() && stored {
                if let Err(e) = self.store.update(row).await {
                    for pending in &changed[written..] {
                        self.mark_dirty(pending.id);
                    }
                    sort_sections(&mut self.last_valid);
                    self.notices
                        .push(key, NoticeLevel::Error, format!("Failed to renumber sections: {e}"));
                    return Err(e);
                }
            }
            self.replace_in_snapshot(row);
        }

        if !changed.is_empty() {
            tracing::debug!(rows = changed.len(), "renumbered section order");
        }
        sort_sections(&mut self.last_valid);
        Ok(())
    }

    /// Append a draft section of `component_type` at the end of the order.
    pub async fn add_section(&mut self, component_type: ComponentType) -> SectionResult<Section> {
        let case_study_id = self.require_identity(ADD_KEY)?;

        if !self.is_dense() {
            self.renumber(ADD_KEY).await?;
        }

        let section = Section::draft(case_study_id, component_type, self.sections.len() as i32);
        self.sections.push(section.clone());
        sort_sections(&mut self.sections);

        match self.store.insert(&section).await {
            Ok(()) => {
                self.last_valid.push(section.clone());
                sort_sections(&mut self.last_valid);
                self.notices.push(
                    ADD_KEY,
                    NoticeLevel::Success,
                    format!("{} section added", component_type.default_title()),
                );
                Ok(section)
            }
            Err(e) => {
                self.mark_dirty(section.id);
                self.notices
                    .push(ADD_KEY, NoticeLevel::Error, format!("Failed to save new section: {e}"));
                Err(e)
            }
        }
    }

    /// Delete a section remotely, then drop it locally whatever the outcome.
    /// After a confirmed delete the remaining orders are closed up.
    pub async fn remove_section(&mut self, id: Uuid) -> SectionResult<()> {
        if self.position(id).is_none() {
            self.notices.push(REMOVE_KEY, NoticeLevel::Error, "Section not found");
            return Err(SectionError::NotFound(id));
        }

        let remote = match self.case_study_id {
            Some(_) => self.store.delete(id).await,
            None => Ok(()),
        };

        self.sections.retain(|s| s.id != id);

        match remote {
            Ok(()) => {
                self.last_valid.retain(|s| s.id != id);
                self.dirty.remove(&id);
                self.renumber(REMOVE_KEY).await?;
                self.notices.push(REMOVE_KEY, NoticeLevel::Success, "Section removed");
                Ok(())
            }
            Err(e) => {
                self.mark_dirty(id);
                self.notices
                    .push(REMOVE_KEY, NoticeLevel::Error, format!("Failed to delete section: {e}"));
                Err(e)
            }
        }
    }

    /// Set the published flag. The notice reflects the store's answer.
    pub async fn toggle_section_published(
        &mut self,
        id: Uuid,
        published: bool,
    ) -> SectionResult<()> {
        let Some(index) = self.position(id) else {
            self.notices.push(PUBLISH_KEY, NoticeLevel::Error, "Section not found");
            return Err(SectionError::NotFound(id));
        };

        self.sections[index].published = published;
        let updated = self.sections[index].clone();

        if self.case_study_id.is_none() {
            self.replace_in_snapshot(&updated);
            return Ok(());
        }

        match self.store.update(&updated).await {
            Ok(()) => {
                self.replace_in_snapshot(&updated);
                let message = if published {
                    "Section published"
                } else {
                    "Section moved to drafts"
                };
                self.notices.push(PUBLISH_KEY, NoticeLevel::Success, message);
                Ok(())
            }
            Err(e) => {
                self.mark_dirty(id);
                self.notices.push(
                    PUBLISH_KEY,
                    NoticeLevel::Error,
                    format!("Failed to update publish state: {e}"),
                );
                Err(e)
            }
        }
    }

    /// Edit title, content, metadata or image of a section.
    pub async fn update_section(
        &mut self,
        id: Uuid,
        patch: SectionPatch,
    ) -> SectionResult<Section> {
        let Some(index) = self.position(id) else {
            self.notices.push(UPDATE_KEY, NoticeLevel::Error, "Section not found");
            return Err(SectionError::NotFound(id));
        };

        patch.apply(&mut self.sections[index]);
        let updated = self.sections[index].clone();

        if self.case_study_id.is_none() {
            self.replace_in_snapshot(&updated);
            return Ok(updated);
        }

        match self.store.update(&updated).await {
            Ok(()) => {
                self.replace_in_snapshot(&updated);
                self.notices.push(UPDATE_KEY, NoticeLevel::Success, "Section saved");
                Ok(updated)
            }
            Err(e) => {
                self.mark_dirty(id);
                self.notices
                    .push(UPDATE_KEY, NoticeLevel::Error, format!("Failed to save section: {e}"));
                Err(e)
            }
        }
    }

    /// Swap `sort_order` with the neighbour in `direction`.
    ///
    /// Returns `Ok(false)` for a no-op (boundary or fewer than two sections).
    /// Tied orders, as left by older rows, are renumbered before planning.
    pub async fn move_section(
        &mut self,
        id: Uuid,
        direction: SortDirection,
    ) -> SectionResult<bool> {
        if self.position(id).is_some() && self.has_tied_orders() {
            self.renumber(MOVE_KEY).await?;
        }

        let plan = match plan_move(&self.sections, id, direction) {
            Ok(plan) => plan,
            Err(MoveRejection::NotFound) => {
                self.notices
                    .push(MOVE_KEY, NoticeLevel::Error, MoveRejection::NotFound.message());
                return Err(SectionError::NotFound(id));
            }
            Err(rejection) => {
                self.notices.push(MOVE_KEY, NoticeLevel::Info, rejection.message());
                return Ok(false);
            }
        };

        if self.case_study_id.is_some() {
            let find = |id: Uuid| {
                self.sections
                    .iter()
                    .find(|s| s.id == id)
                    .cloned()
                    .ok_or(SectionError::NotFound(id))
            };
            let original = find(plan.moved)?;
            let neighbour = find(plan.neighbour)?;

            let moved_row = Section {
                sort_order: plan.moved_order,
                ..original.clone()
            };
            let neighbour_row = Section {
                sort_order: plan.neighbour_order,
                ..neighbour
            };

            self.notices.push(MOVE_KEY, NoticeLevel::Loading, "Moving section...");

            if let Err(e) = self.store.update(&moved_row).await {
                self.notices
                    .push(MOVE_KEY, NoticeLevel::Error, format!("Failed to move section: {e}"));
                return Err(e);
            }

            if let Err(e) = self.store.update(&neighbour_row).await {
                match self.store.update(&original).await {
                    Ok(()) => {
                        tracing::warn!(
                            section_id = %plan.moved,
                            "reverted first half of failed section swap"
                        );
                    }
                    Err(revert_err) => {
                        // The store kept the first write.
                        self.replace_in_snapshot(&moved_row);
                        sort_sections(&mut self.last_valid);
                        tracing::error!(
                            section_id = %plan.moved,
                            neighbour_id = %plan.neighbour,
                            error = %revert_err,
                            "failed to revert section swap, order needs resync"
                        );
                        self.mark_dirty(plan.moved);
                        self.mark_dirty(plan.neighbour);
                    }
                }
                self.notices
                    .push(MOVE_KEY, NoticeLevel::Error, format!("Failed to move section: {e}"));
                return Err(e);
            }
        }

        apply_plan(&mut self.sections, &plan);
        sort_sections(&mut self.sections);
        apply_plan(&mut self.last_valid, &plan);
        sort_sections(&mut self.last_valid);

        let message = match direction {
            SortDirection::Up => "Section moved up",
            SortDirection::Down => "Section moved down",
        };
        self.notices.push(MOVE_KEY, NoticeLevel::Success, message);
        Ok(true)
    }

    /// Refetch the admin view and replace local state and snapshot with it.
    pub async fn reconcile(&mut self) -> SectionResult<()> {
        if self.case_study_id.is_none() {
            return Err(SectionError::MissingIdentity);
        }

        let state = fetch_admin_sections(&self.store, self.case_study_id).await;
        if let Some(error) = state.error {
            self.notices
                .push(SYNC_KEY, NoticeLevel::Error, format!("Failed to refresh sections: {error}"));
            return Err(SectionError::Store(error));
        }

        self.sections = state.sections;
        self.last_valid = self.sections.clone();
        self.dirty.clear();
        self.needs_resync = false;
        self.snapshot_loaded = true;
        self.notices.push(SYNC_KEY, NoticeLevel::Info, "Sections refreshed");
        Ok(())
    }

    /// Discard unconfirmed local changes without a refetch.
    pub fn revert_to_snapshot(&mut self) {
        self.sections = self.last_valid.clone();
        self.dirty.clear();
        self.needs_resync = !self.snapshot_loaded;
    }

    fn replace_in_snapshot(&mut self, section: &Section) {
        if let Some(existing) = self.last_valid.iter_mut().find(|s| s.id == section.id) {
            *existing = section.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::MemorySectionStore;
    use std::sync::Arc;

    fn abc(cs: Uuid) -> Vec<Section> {
        ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut s = Section::draft(cs, ComponentType::Introduction, i as i32);
                s.title = name.to_string();
                s
            })
            .collect()
    }

    async fn editor_with_abc() -> (
        Arc<MemorySectionStore>,
        SectionEditor<Arc<MemorySectionStore>>,
    ) {
        let cs = Uuid::new_v4();
        let store = Arc::new(MemorySectionStore::with_sections(abc(cs)));
        let editor = SectionEditor::load(store.clone(), Some(cs)).await;
        (store, editor)
    }

    fn titles(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_move_b_up_persists_swap() {
        let (store, mut editor) = editor_with_abc().await;
        let a = editor.sections()[0].id;
        let b = editor.sections()[1].id;

        assert!(editor.move_section(b, SortDirection::Up).await.unwrap());

        assert_eq!(titles(editor.sections()), vec!["B", "A", "C"]);
        assert_eq!(store.get(b).await.unwrap().sort_order, 0);
        assert_eq!(store.get(a).await.unwrap().sort_order, 1);
        assert_eq!(editor.snapshot(), editor.sections());
        assert_eq!(editor.notices().get(MOVE_KEY).unwrap().level, NoticeLevel::Success);
        assert_eq!(editor.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_move_at_boundary_is_info_noop() {
        let (_, mut editor) = editor_with_abc().await;
        let before = editor.sections().to_vec();
        let first = before[0].id;
        let last = before[2].id;

        assert!(!editor.move_section(first, SortDirection::Up).await.unwrap());
        assert!(!editor.move_section(last, SortDirection::Down).await.unwrap());

        assert_eq!(editor.sections(), before.as_slice());
        assert_eq!(editor.notices().get(MOVE_KEY).unwrap().level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_move_with_single_section_is_noop() {
        let cs = Uuid::new_v4();
        let only = Section::draft(cs, ComponentType::Hero, 0);
        let store = Arc::new(MemorySectionStore::with_sections(vec![only.clone()]));
        let mut editor = SectionEditor::load(store, Some(cs)).await;

        assert!(!editor.move_section(only.id, SortDirection::Down).await.unwrap());
        assert_eq!(editor.sections(), &[only]);
        assert_eq!(editor.notices().get(MOVE_KEY).unwrap().level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_move_first_write_failure_changes_nothing() {
        let (store, mut editor) = editor_with_abc().await;
        let before = editor.sections().to_vec();
        store.fail_updates_after(0);

        let result = editor.move_section(before[1].id, SortDirection::Up).await;

        assert!(matches!(result, Err(SectionError::Store(_))));
        assert_eq!(editor.sections(), before.as_slice());
        assert_eq!(store.all().await.len(), 3);
        assert_eq!(store.get(before[1].id).await.unwrap().sort_order, 1);
        assert!(!editor.needs_resync());
    }

    #[tokio::test]
    async fn test_move_second_write_failure_reverts_first() {
        let (store, mut editor) = editor_with_abc().await;
        let before = editor.sections().to_vec();
        // first write ok, second fails, compensating write fails too unless reset
        store.fail_updates_after(1);

        let b = before[1].id;
        let result = editor.move_section(b, SortDirection::Up).await;
        assert!(result.is_err());

        // Compensation also hit the exhausted budget: both rows marked dirty.
        assert!(editor.needs_resync());
        let dirty: Vec<Uuid> = editor.dirty_ids().copied().collect();
        assert!(dirty.contains(&b) && dirty.contains(&before[0].id));
        assert_eq!(editor.sections(), before.as_slice());

        store.reset_failures();
        editor.reconcile().await.unwrap();
        assert!(!editor.needs_resync());
        assert_eq!(editor.dirty_ids().count(), 0);
    }

    /// Fails exactly the second update it sees.
    struct SecondUpdateFails {
        inner: MemorySectionStore,
        updates: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SectionStore for SecondUpdateFails {
        async fn select(
            &self,
            case_study_id: Uuid,
            query: &crate::sections::SectionQuery,
        ) -> SectionResult<Vec<Section>> {
            self.inner.select(case_study_id, query).await
        }

        async fn insert(&self, section: &Section) -> SectionResult<()> {
            self.inner.insert(section).await
        }

        async fn update(&self, section: &Section) -> SectionResult<()> {
            let n = self
                .updates
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n == 1 {
                return Err(SectionError::Store("connection reset".into()));
            }
            self.inner.update(section).await
        }

        async fn delete(&self, id: Uuid) -> SectionResult<()> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_move_compensation_restores_store() {
        let cs = Uuid::new_v4();
        let sections = abc(cs);
        let store = Arc::new(SecondUpdateFails {
            inner: MemorySectionStore::with_sections(sections.clone()),
            updates: std::sync::atomic::AtomicUsize::new(0),
        });
        let mut editor = SectionEditor::load(store.clone(), Some(cs)).await;

        let result = editor.move_section(sections[1].id, SortDirection::Up).await;
        assert!(result.is_err());

        let stored: Vec<i32> = store.inner.all().await.iter().map(|s| s.sort_order).collect();
        assert_eq!(stored, vec![0, 1, 2]);
        assert_eq!(store.inner.get(sections[1].id).await.unwrap().sort_order, 1);
        assert!(!editor.needs_resync());
        assert_eq!(titles(editor.sections()), vec!["A", "B", "C"]);
        assert_eq!(editor.notices().get(MOVE_KEY).unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_move_without_identity_is_local_only() {
        let cs = Uuid::new_v4();
        let store = Arc::new(MemorySectionStore::new());
        let mut editor = SectionEditor::new(store.clone(), None, abc(cs));
        let c = editor.sections()[2].id;

        assert!(editor.move_section(c, SortDirection::Up).await.unwrap());
        assert_eq!(titles(editor.sections()), vec!["A", "C", "B"]);
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_section_appends_draft() {
        let (store, mut editor) = editor_with_abc().await;

        let added = editor.add_section(ComponentType::Carousel).await.unwrap();

        assert_eq!(editor.sections().len(), 4);
        assert_eq!(added.sort_order, 3);
        assert!(!added.published);
        assert_eq!(added.title, "Carousel");
        assert_eq!(editor.sections().last().unwrap().id, added.id);
        assert_eq!(store.get(added.id).await, Some(added));
        assert_eq!(editor.snapshot().len(), 4);
    }

    #[tokio::test]
    async fn test_add_section_requires_identity() {
        let store = Arc::new(MemorySectionStore::new());
        let mut editor = SectionEditor::new(store, None, Vec::new());

        let result = editor.add_section(ComponentType::Introduction).await;

        assert_eq!(result, Err(SectionError::MissingIdentity));
        assert!(editor.sections().is_empty());
        assert_eq!(editor.notices().get(ADD_KEY).unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_add_section_remote_failure_keeps_local_and_flags_resync() {
        let (store, mut editor) = editor_with_abc().await;
        store.fail_inserts(true);

        let result = editor.add_section(ComponentType::Alignment).await;

        assert!(result.is_err());
        assert_eq!(editor.sections().len(), 4);
        assert_eq!(editor.snapshot().len(), 3);
        assert!(editor.needs_resync());

        editor.revert_to_snapshot();
        assert_eq!(editor.sections().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_section_drops_locally_and_remotely() {
        let (store, mut editor) = editor_with_abc().await;
        let b = editor.sections()[1].id;

        editor.remove_section(b).await.unwrap();

        assert!(editor.sections().iter().all(|s| s.id != b));
        assert!(store.get(b).await.is_none());
        assert!(editor.snapshot().iter().all(|s| s.id != b));
    }

    #[tokio::test]
    async fn test_remove_section_drops_locally_even_when_remote_fails() {
        let (store, mut editor) = editor_with_abc().await;
        let b = editor.sections()[1].id;
        store.fail_deletes(true);

        assert!(editor.remove_section(b).await.is_err());

        assert!(editor.sections().iter().all(|s| s.id != b));
        assert!(store.get(b).await.is_some());
        assert!(editor.needs_resync());
        assert_eq!(editor.notices().get(REMOVE_KEY).unwrap().level, NoticeLevel::Error);

        store.reset_failures();
        editor.reconcile().await.unwrap();
        assert_eq!(editor.sections().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_then_add_then_move_swaps_distinct_orders() {
        let (store, mut editor) = editor_with_abc().await;
        let a = editor.sections()[0].id;
        let c = editor.sections()[2].id;

        editor.remove_section(a).await.unwrap();
        let added = editor.add_section(ComponentType::Carousel).await.unwrap();

        assert_eq!(added.sort_order, 2);
        assert_eq!(titles(editor.sections()), vec!["B", "C", "Carousel"]);
        let stored: Vec<i32> = store.all().await.iter().map(|s| s.sort_order).collect();
        assert_eq!(stored, vec![0, 1, 2]);

        assert!(editor.move_section(c, SortDirection::Up).await.unwrap());
        assert_eq!(titles(editor.sections()), vec!["C", "B", "Carousel"]);
        assert_eq!(store.get(c).await.unwrap().sort_order, 0);
        assert_eq!(editor.notices().get(MOVE_KEY).unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_move_renumbers_tied_rows_first() {
        let cs = Uuid::new_v4();
        let mut sections = abc(cs);
        sections[2].sort_order = 1;
        let store = Arc::new(MemorySectionStore::with_sections(sections.clone()));
        let mut editor = SectionEditor::load(store.clone(), Some(cs)).await;
        let last = editor.sections()[2].clone();

        assert!(editor.move_section(last.id, SortDirection::Up).await.unwrap());

        let orders: Vec<i32> = editor.sections().iter().map(|s| s.sort_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(editor.sections()[1].id, last.id);
        let stored: Vec<i32> = store.all().await.iter().map(|s| s.sort_order).collect();
        assert_eq!(stored, vec![0, 1, 2]);
        assert_eq!(store.get(last.id).await.unwrap().sort_order, 1);
    }

    #[tokio::test]
    async fn test_add_after_gapped_rows_lands_last() {
        let cs = Uuid::new_v4();
        let mut sections = abc(cs);
        sections[1].sort_order = 5;
        sections[2].sort_order = 9;
        let store = Arc::new(MemorySectionStore::with_sections(sections));
        let mut editor = SectionEditor::load(store.clone(), Some(cs)).await;

        let added = editor.add_section(ComponentType::Alignment).await.unwrap();

        assert_eq!(added.sort_order, 3);
        assert_eq!(editor.sections().last().unwrap().id, added.id);
        let stored: Vec<i32> = store.all().await.iter().map(|s| s.sort_order).collect();
        assert_eq!(stored, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_revert_clears_dirty_and_resync() {
        let (store, mut editor) = editor_with_abc().await;
        let b = editor.sections()[1].id;
        store.fail_deletes(true);
        assert!(editor.remove_section(b).await.is_err());
        assert!(editor.needs_resync());

        editor.revert_to_snapshot();

        assert_eq!(titles(editor.sections()), vec!["A", "B", "C"]);
        assert_eq!(editor.dirty_ids().count(), 0);
        assert!(!editor.needs_resync());
    }

    #[tokio::test]
    async fn test_revert_after_failed_compensation_matches_store() {
        let (store, mut editor) = editor_with_abc().await;
        let b = editor.sections()[1].id;
        store.fail_updates_after(1);
        assert!(editor.move_section(b, SortDirection::Up).await.is_err());

        editor.revert_to_snapshot();

        assert!(!editor.needs_resync());
        store.reset_failures();
        let stored = store.all().await;
        for section in editor.sections() {
            let row = stored.iter().find(|s| s.id == section.id).unwrap();
            assert_eq!(row.sort_order, section.sort_order);
        }
    }

    #[tokio::test]
    async fn test_revert_keeps_resync_when_load_failed() {
        let store = Arc::new(MemorySectionStore::new());
        store.fail_selects(true);
        let mut editor = SectionEditor::load(store, Some(Uuid::new_v4())).await;

        editor.revert_to_snapshot();

        assert!(editor.needs_resync());
    }

    #[tokio::test]
    async fn test_toggle_published_persists_flag() {
        let (store, mut editor) = editor_with_abc().await;
        let a = editor.sections()[0].id;

        editor.toggle_section_published(a, true).await.unwrap();

        assert!(editor.sections()[0].published);
        assert!(store.get(a).await.unwrap().published);
        assert_eq!(editor.notices().get(PUBLISH_KEY).unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_toggle_published_reports_remote_failure() {
        let (store, mut editor) = editor_with_abc().await;
        let a = editor.sections()[0].id;
        store.fail_updates_after(0);

        assert!(editor.toggle_section_published(a, true).await.is_err());

        assert!(editor.sections()[0].published);
        assert!(!editor.snapshot()[0].published);
        assert!(!store.get(a).await.unwrap().published);
        assert_eq!(editor.notices().get(PUBLISH_KEY).unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_update_section_applies_patch() {
        let (store, mut editor) = editor_with_abc().await;
        let c = editor.sections()[2].id;

        let updated = editor
            .update_section(
                c,
                SectionPatch {
                    content: Some("We interviewed twelve users.".into()),
                    metadata: Some(serde_json::json!({ "subhead": "Research" })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "C");
        assert_eq!(store.get(c).await.unwrap().content, "We interviewed twelve users.");
        assert_eq!(updated.metadata["subhead"], "Research");
    }

    #[tokio::test]
    async fn test_unknown_section_is_not_found() {
        let (_, mut editor) = editor_with_abc().await;
        let missing = Uuid::new_v4();
        assert_eq!(
            editor.remove_section(missing).await,
            Err(SectionError::NotFound(missing))
        );
        assert_eq!(
            editor.toggle_section_published(missing, true).await,
            Err(SectionError::NotFound(missing))
        );
        assert_eq!(
            editor.move_section(missing, SortDirection::Up).await,
            Err(SectionError::NotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_load_failure_flags_resync() {
        let store = Arc::new(MemorySectionStore::new());
        store.fail_selects(true);
        let editor = SectionEditor::load(store, Some(Uuid::new_v4())).await;
        assert!(editor.sections().is_empty());
        assert!(editor.needs_resync());
    }
}
