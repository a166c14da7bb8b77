//! In-process section store.
//!
//! Backs the editor in development runs without `DATABASE_URL`, and is the
//! store double in tests.
//! Failures can be injected per operation to exercise reconciliation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{SectionQuery, SectionStore};
use super::{sort_sections, Section};
use crate::error::{SectionError, SectionResult};

#[derive(Debug)]
pub struct MemorySectionStore {
    rows: RwLock<HashMap<Uuid, Section>>,
    fail_selects: AtomicBool,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
    /// Remaining successful updates; negative means unlimited.
    update_budget: AtomicI64,
    select_calls: AtomicUsize,
}

impl Default for MemorySectionStore {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            fail_selects: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            update_budget: AtomicI64::new(-1),
            select_calls: AtomicUsize::new(0),
        }
    }
}

impl MemorySectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sections(sections: impl IntoIterator<Item = Section>) -> Self {
        Self {
            rows: RwLock::new(sections.into_iter().map(|s| (s.id, s)).collect()),
            ..Self::default()
        }
    }

    pub fn fail_selects(&self, fail: bool) {
        self.fail_selects.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Allow `n` more updates to succeed, then fail every following one.
    pub fn fail_updates_after(&self, n: i64) {
        self.update_budget.store(n, Ordering::SeqCst);
    }

    pub fn reset_failures(&self) {
        self.fail_selects(false);
        self.fail_inserts(false);
        self.fail_deletes(false);
        self.update_budget.store(-1, Ordering::SeqCst);
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub async fn get(&self, id: Uuid) -> Option<Section> {
        self.rows.read().await.get(&id).cloned()
    }

    /// Every stored row, ordered, regardless of case study or filters.
    pub async fn all(&self) -> Vec<Section> {
        let mut sections: Vec<Section> = self.rows.read().await.values().cloned().collect();
        sort_sections(&mut sections);
        sections
    }

    fn take_update_budget(&self) -> bool {
        let mut current = self.update_budget.load(Ordering::SeqCst);
        loop {
            if current < 0 {
                return true;
            }
            if current == 0 {
                return false;
            }
            match self.update_budget.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[async_trait]
impl SectionStore for MemorySectionStore {
    async fn select(
        &self,
        case_study_id: Uuid,
        query: &SectionQuery,
    ) -> SectionResult<Vec<Section>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(SectionError::Store("select failed".into()));
        }
        let mut sections: Vec<Section> = self
            .rows
            .read()
            .await
            .values()
            .filter(|s| s.case_study_id == case_study_id && query.matches(s))
            .cloned()
            .collect();
        sort_sections(&mut sections);
        Ok(sections)
    }

    async fn insert(&self, section: &Section) -> SectionResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(SectionError::Store("insert failed".into()));
        }
        let mut rows = self.rows.write().await;
        if rows.contains_key(&section.id) {
            return Err(SectionError::Store(format!(
                "duplicate key value violates unique constraint: {}",
                section.id
            )));
        }
        rows.insert(section.id, section.clone());
        Ok(())
    }

    async fn update(&self, section: &Section) -> SectionResult<()> {
        if !self.take_update_budget() {
            return Err(SectionError::Store("update failed".into()));
        }
        let mut rows = self.rows.write().await;
        match rows.get_mut(&section.id) {
            Some(row) => {
                *row = section.clone();
                Ok(())
            }
            None => Err(SectionError::NotFound(section.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> SectionResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SectionError::Store("delete failed".into()));
        }
        self.rows.write().await.remove(&id);
        Ok(())
    }
}

/// Wraps a [`MemorySectionStore`] and holds the first select open until
/// [`GatedStore::release`] is called.
#[cfg(test)]
pub(crate) struct GatedStore {
    pub inner: MemorySectionStore,
    gate: tokio::sync::Notify,
    selects: AtomicUsize,
}

#[cfg(test)]
impl GatedStore {
    pub fn new(inner: MemorySectionStore) -> Self {
        Self {
            inner,
            gate: tokio::sync::Notify::new(),
            selects: AtomicUsize::new(0),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[cfg(test)]
#[async_trait]
impl SectionStore for GatedStore {
    async fn select(
        &self,
        case_study_id: Uuid,
        query: &SectionQuery,
    ) -> SectionResult<Vec<Section>> {
        if self.selects.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
        }
        self.inner.select(case_study_id, query).await
    }

    async fn insert(&self, section: &Section) -> SectionResult<()> {
        self.inner.insert(section).await
    }

    async fn update(&self, section: &Section) -> SectionResult<()> {
        self.inner.update(section).await
    }

    async fn delete(&self, id: Uuid) -> SectionResult<()> {
        self.inner.delete(id).await
    }
}
