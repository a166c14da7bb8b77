//! Read-only projections of a case study's sections.
//!
//! Three variants: admin (all publish states), public (published only) and
//! the parameterized [`fetch_sections`]. None of them write to the store.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use super::store::{SectionQuery, SectionStore};
use super::Section;

/// Result of a section fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchState {
    pub sections: Vec<Section>,
    pub loading: bool,
    pub error: Option<String>,
}

impl FetchState {
    /// State while a request is in flight.
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }
}

/// Fetch sections for `case_study_id`, ordered by `sort_order` ascending.
///
/// No identity resolves immediately to an empty collection without touching
/// the store. A store error yields an empty collection with `error` set.
pub async fn fetch_sections<S>(
    store: &S,
    case_study_id: Option<Uuid>,
    only_published: bool,
) -> FetchState
where
    S: SectionStore + ?Sized,
{
    let Some(case_study_id) = case_study_id else {
        return FetchState::default();
    };

    let query = SectionQuery {
        only_published,
        ..SectionQuery::default()
    };

    match store.select(case_study_id, &query).await {
        Ok(sections) => {
            tracing::debug!(
                case_study_id = %case_study_id,
                count = sections.len(),
                only_published,
                "fetched sections"
            );
            FetchState {
                sections,
                loading: false,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(case_study_id = %case_study_id, error = %e, "failed to fetch sections");
            FetchState {
                sections: Vec::new(),
                loading: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// All sections regardless of publish state, minus editor bookkeeping.
pub async fn fetch_admin_sections<S>(store: &S, case_study_id: Option<Uuid>) -> FetchState
where
    S: SectionStore + ?Sized,
{
    fetch_sections(store, case_study_id, false).await
}

/// Published sections only, minus editor bookkeeping.
pub async fn fetch_public_sections<S>(store: &S, case_study_id: Option<Uuid>) -> FetchState
where
    S: SectionStore + ?Sized,
{
    fetch_sections(store, case_study_id, true).await
}

/// Issues fetches and drops responses that a newer request has superseded.
#[derive(Debug, Default)]
pub struct SectionFetcher {
    generation: AtomicU64,
}

impl SectionFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when another fetch started after this one.
    pub async fn fetch<S>(
        &self,
        store: &S,
        case_study_id: Option<Uuid>,
        only_published: bool,
    ) -> Option<FetchState>
    where
        S: SectionStore + ?Sized,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = fetch_sections(store, case_study_id, only_published).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "discarding superseded section fetch");
            return None;
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::memory::GatedStore;
    use crate::sections::{ComponentType, MemorySectionStore};

    fn seeded() -> (Uuid, MemorySectionStore) {
        let cs = Uuid::new_v4();
        let mut published = Section::draft(cs, ComponentType::Introduction, 0);
        published.published = true;
        let draft = Section::draft(cs, ComponentType::Alignment, 1);
        let mut bookkeeping = Section::draft(cs, ComponentType::EditorState, 2);
        bookkeeping.published = true;
        let mut carousel = Section::draft(cs, ComponentType::Carousel, 3);
        carousel.published = true;
        (
            cs,
            MemorySectionStore::with_sections(vec![published, draft, bookkeeping, carousel]),
        )
    }

    #[tokio::test]
    async fn test_public_fetch_never_returns_drafts() {
        let (cs, store) = seeded();
        let state = fetch_public_sections(&store, Some(cs)).await;
        assert_eq!(state.sections.len(), 2);
        assert!(state.sections.iter().all(|s| s.published));
        assert!(state
            .sections
            .iter()
            .all(|s| s.component_type != ComponentType::EditorState));
    }

    #[tokio::test]
    async fn test_admin_fetch_includes_drafts_excludes_bookkeeping() {
        let (cs, store) = seeded();
        let state = fetch_admin_sections(&store, Some(cs)).await;
        let types: Vec<ComponentType> = state.sections.iter().map(|s| s.component_type).collect();
        assert_eq!(
            types,
            vec![
                ComponentType::Introduction,
                ComponentType::Alignment,
                ComponentType::Carousel
            ]
        );
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_without_identity_skips_store() {
        let (_, store) = seeded();
        let state = fetch_sections(&store, None, true).await;
        assert_eq!(state, FetchState::default());
        assert_eq!(store.select_calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_yields_empty_with_error() {
        let (cs, store) = seeded();
        store.fail_selects(true);
        let state = fetch_admin_sections(&store, Some(cs)).await;
        assert!(state.sections.is_empty());
        assert!(!state.loading);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn test_public_fetch_of_empty_case_study() {
        let store = MemorySectionStore::new();
        let state = fetch_public_sections(&store, Some(Uuid::new_v4())).await;
        assert!(state.sections.is_empty());
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_fetcher_returns_latest_response() {
        let (cs, store) = seeded();
        let fetcher = SectionFetcher::new();
        let state = fetcher.fetch(&store, Some(cs), true).await;
        assert_eq!(state.map(|s| s.sections.len()), Some(2));
    }

    #[tokio::test]
    async fn test_fetcher_discards_superseded_response() {
        let (cs, inner) = seeded();
        let store = GatedStore::new(inner);
        let fetcher = SectionFetcher::new();

        let (first, second) = tokio::join!(fetcher.fetch(&store, Some(cs), true), async {
            let state = fetcher.fetch(&store, Some(cs), false).await;
            store.release();
            state
        });

        assert!(first.is_none());
        assert_eq!(second.map(|s| s.sections.len()), Some(3));
    }

    #[test]
    fn test_loading_state() {
        let state = FetchState::loading();
        assert!(state.loading);
        assert!(state.sections.is_empty());
    }
}
