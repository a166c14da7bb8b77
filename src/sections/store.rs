//! Remote section store: row-level select / insert / update / delete.
//!
//! There is no batch or transactional operation. Multi-row changes (a
//! reorder swap) are issued as sequential calls and the editor compensates
//! when one of them fails.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::{ComponentType, Section};
use crate::db::models::SectionRow;
use crate::error::{SectionError, SectionResult};

/// Filter for [`SectionStore::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionQuery {
    pub only_published: bool,
    pub exclude_type: Option<ComponentType>,
}

impl Default for SectionQuery {
    fn default() -> Self {
        Self {
            only_published: true,
            exclude_type: Some(ComponentType::EditorState),
        }
    }
}

impl SectionQuery {
    pub fn admin() -> Self {
        Self {
            only_published: false,
            ..Self::default()
        }
    }

    pub fn public() -> Self {
        Self::default()
    }

    pub fn matches(&self, section: &Section) -> bool {
        (!self.only_published || section.published)
            && self.exclude_type != Some(section.component_type)
    }
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Sections of a case study matching `query`, ordered by `sort_order` ascending.
    async fn select(
        &self,
        case_study_id: Uuid,
        query: &SectionQuery,
    ) -> SectionResult<Vec<Section>>;

    async fn insert(&self, section: &Section) -> SectionResult<()>;

    /// Overwrite the row with `section.id`.
    async fn update(&self, section: &Section) -> SectionResult<()>;

    async fn delete(&self, id: Uuid) -> SectionResult<()>;
}

#[async_trait]
impl<S: SectionStore + ?Sized> SectionStore for Arc<S> {
    async fn select(
        &self,
        case_study_id: Uuid,
        query: &SectionQuery,
    ) -> SectionResult<Vec<Section>> {
        (**self).select(case_study_id, query).await
    }

    async fn insert(&self, section: &Section) -> SectionResult<()> {
        (**self).insert(section).await
    }

    async fn update(&self, section: &Section) -> SectionResult<()> {
        (**self).update(section).await
    }

    async fn delete(&self, id: Uuid) -> SectionResult<()> {
        (**self).delete(id).await
    }
}

/// PostgreSQL-backed store over `case_study_sections`.
#[derive(Debug, Clone)]
pub struct PgSectionStore {
    pool: Arc<PgPool>,
}

impl PgSectionStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SectionStore for PgSectionStore {
    async fn select(
        &self,
        case_study_id: Uuid,
        query: &SectionQuery,
    ) -> SectionResult<Vec<Section>> {
        let rows = sqlx::query_as::<_, SectionRow>(
            r#"
            SELECT id, case_study_id, component_type, title, content, sort_order, published, metadata, image_url
            FROM case_study_sections
            WHERE case_study_id = $1
              AND ($2 = false OR published = true)
              AND ($3::TEXT IS NULL OR component_type <> $3)
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .bind(case_study_id)
        .bind(query.only_published)
        .bind(query.exclude_type.map(|t| t.as_str()))
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(Section::try_from).collect()
    }

    async fn insert(&self, section: &Section) -> SectionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO case_study_sections
                (id, case_study_id, component_type, title, content, sort_order, published, metadata, image_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            "#,
        )
        .bind(section.id)
        .bind(section.case_study_id)
        .bind(section.component_type.as_str())
        .bind(&section.title)
        .bind(&section.content)
        .bind(section.sort_order)
        .bind(section.published)
        .bind(&section.metadata)
        .bind(&section.image_url)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn update(&self, section: &Section) -> SectionResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE case_study_sections
            SET component_type = $2, title = $3, content = $4, sort_order = $5,
                published = $6, metadata = $7, image_url = $8, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(section.id)
        .bind(section.component_type.as_str())
        .bind(&section.title)
        .bind(&section.content)
        .bind(section.sort_order)
        .bind(section.published)
        .bind(&section.metadata)
        .bind(&section.image_url)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(SectionError::NotFound(section.id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> SectionResult<()> {
        sqlx::query("DELETE FROM case_study_sections WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(component_type: ComponentType, published: bool) -> Section {
        let mut s = Section::draft(Uuid::new_v4(), component_type, 0);
        s.published = published;
        s
    }

    #[test]
    fn test_default_query_is_published_only() {
        let q = SectionQuery::default();
        assert!(q.only_published);
        assert_eq!(q.exclude_type, Some(ComponentType::EditorState));
        assert_eq!(q, SectionQuery::public());
    }

    #[test]
    fn test_admin_query_matches_drafts_but_not_bookkeeping() {
        let q = SectionQuery::admin();
        assert!(q.matches(&section(ComponentType::Alignment, false)));
        assert!(q.matches(&section(ComponentType::Alignment, true)));
        assert!(!q.matches(&section(ComponentType::EditorState, true)));
    }

    #[test]
    fn test_public_query_rejects_drafts() {
        let q = SectionQuery::public();
        assert!(!q.matches(&section(ComponentType::Carousel, false)));
        assert!(q.matches(&section(ComponentType::Carousel, true)));
    }
}
