/**
 * Case Study Routes
 * Public listing and pages, admin CRUD and draft preview
 */
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    self,
    models::{CaseStudy, CaseStudyFields, CaseStudySummary, CASE_STUDY_COLUMNS},
};
use crate::render::{render_case_study, RenderBlock, RenderMode};
use crate::routes::auth::require_admin;
use crate::routes::sections::editor_session;
use crate::routes::{invalid_slug, is_valid_slug, sanitize_html, AppState, ErrorResponse};
use crate::sections::{fetch_admin_sections, fetch_public_sections, FetchState, Section};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CaseStudyListResponse {
    pub items: Vec<CaseStudySummary>,
}

/// A case study with its resolved sections and render sequence.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStudyPage {
    pub case_study: CaseStudy,
    pub sections: Vec<Section>,
    pub blocks: Vec<RenderBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections_error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseStudyRequest {
    pub slug: String,
    #[serde(flatten)]
    pub fields: CaseStudyFields,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// ============================================================================
// Helpers
// ============================================================================

fn database() -> Result<Arc<sqlx::PgPool>, Response> {
    db::get_pool().ok_or_else(|| {
        ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
            .into_response()
    })
}

fn database_error(context: &str, e: sqlx::Error) -> Response {
    tracing::error!("Database error {}: {}", context, e);
    ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
}

fn not_found() -> Response {
    ErrorResponse::reply(StatusCode::NOT_FOUND, "Not found").into_response()
}

/// Rich-text fields of the legacy layout are stored sanitized.
fn sanitize_fields(fields: &mut CaseStudyFields) {
    for field in [
        &mut fields.intro,
        &mut fields.challenge,
        &mut fields.approach,
        &mut fields.solution,
        &mut fields.results,
        &mut fields.conclusion,
    ] {
        *field = field.as_deref().map(sanitize_html);
    }
}

async fn find_by_slug(pool: &sqlx::PgPool, slug: &str) -> Result<Option<CaseStudy>, sqlx::Error> {
    sqlx::query_as::<_, CaseStudy>(&format!(
        "SELECT {CASE_STUDY_COLUMNS} FROM case_studies WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
}

/// Sections for a page. `None` means the same editor session started a
/// newer page load while this one was in flight.
async fn resolve_sections(
    state: &AppState,
    session: Option<&str>,
    case_study_id: Uuid,
    mode: RenderMode,
) -> Option<FetchState> {
    let Some(store) = &state.sections else {
        return Some(FetchState::default());
    };
    let only_published = mode == RenderMode::Public;

    match session {
        Some(session_id) => {
            let session = state.sessions.session(session_id);
            session
                .fetcher()
                .fetch(store.as_ref(), Some(case_study_id), only_published)
                .await
        }
        None => Some(match mode {
            RenderMode::Public => fetch_public_sections(store.as_ref(), Some(case_study_id)).await,
            RenderMode::Preview => fetch_admin_sections(store.as_ref(), Some(case_study_id)).await,
        }),
    }
}

async fn load_page(
    state: &AppState,
    session: Option<&str>,
    slug: &str,
    mode: RenderMode,
) -> Response {
    if !is_valid_slug(slug) {
        return invalid_slug().into_response();
    }
    let pool = match database() {
        Ok(pool) => pool,
        Err(response) => return response,
    };

    let case_study = match find_by_slug(&pool, slug).await {
        Ok(Some(case_study)) => case_study,
        Ok(None) => return not_found(),
        Err(e) => return database_error("fetching case study", e),
    };

    let Some(fetched) = resolve_sections(state, session, case_study.id, mode).await else {
        return ErrorResponse::reply_with(
            StatusCode::CONFLICT,
            "Superseded",
            "A newer page load from this session replaced this one",
        )
        .into_response();
    };

    let blocks = render_case_study(&case_study, &fetched.sections, mode);
    Json(CaseStudyPage {
        case_study,
        sections: fetched.sections,
        blocks,
        sections_error: fetched.error,
    })
    .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/case-studies
pub async fn list_case_studies() -> Response {
    let pool = match database() {
        Ok(pool) => pool,
        Err(response) => return response,
    };

    match sqlx::query_as::<_, CaseStudySummary>(
        r#"
        SELECT id, slug, title, summary, cover_image_url, category
        FROM case_studies
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool.as_ref())
    .await
    {
        Ok(items) => Json(CaseStudyListResponse { items }).into_response(),
        Err(e) => database_error("listing case studies", e),
    }
}

/// GET /api/case-studies/{slug}
pub async fn get_case_study(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    load_page(&state, editor_session(&headers), &slug, RenderMode::Public).await
}

/// GET /api/admin/case-studies/{slug}/preview
pub async fn preview_case_study(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Response {
    if let Err(e) = require_admin(&headers).await {
        return e.into_response();
    }
    load_page(&state, editor_session(&headers), &slug, RenderMode::Preview).await
}

/// POST /api/admin/case-studies
pub async fn create_case_study(
    headers: HeaderMap,
    Json(payload): Json<CreateCaseStudyRequest>,
) -> Response {
    if let Err(e) = require_admin(&headers).await {
        return e.into_response();
    }

    let CreateCaseStudyRequest { slug, mut fields } = payload;
    let title = fields.title.take().unwrap_or_default();
    if title.trim().is_empty() {
        return ErrorResponse::reply(StatusCode::BAD_REQUEST, "Title is required").into_response();
    }
    if !is_valid_slug(&slug) {
        return invalid_slug().into_response();
    }

    let pool = match database() {
        Ok(pool) => pool,
        Err(response) => return response,
    };

    sanitize_fields(&mut fields);
    let mut case_study = CaseStudy {
        slug,
        title,
        ..CaseStudy::default()
    };
    fields.apply_to(&mut case_study);

    match sqlx::query_as::<_, CaseStudy>(&format!(
        r#"
        INSERT INTO case_studies (slug, title, summary, cover_image_url, category, layout,
            intro, intro_image_url, challenge, challenge_image_url, approach, approach_image_url,
            solution, solution_image_url, results, results_image_url, conclusion, conclusion_image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {CASE_STUDY_COLUMNS}
        "#
    ))
    .bind(&case_study.slug)
    .bind(&case_study.title)
    .bind(&case_study.summary)
    .bind(&case_study.cover_image_url)
    .bind(&case_study.category)
    .bind(&case_study.layout)
    .bind(&case_study.intro)
    .bind(&case_study.intro_image_url)
    .bind(&case_study.challenge)
    .bind(&case_study.challenge_image_url)
    .bind(&case_study.approach)
    .bind(&case_study.approach_image_url)
    .bind(&case_study.solution)
    .bind(&case_study.solution_image_url)
    .bind(&case_study.results)
    .bind(&case_study.results_image_url)
    .bind(&case_study.conclusion)
    .bind(&case_study.conclusion_image_url)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(created) => {
            tracing::info!(slug = %created.slug, id = %created.id, "case study created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => {
            if e.to_string().contains("duplicate key") || e.to_string().contains("unique constraint")
            {
                return ErrorResponse::reply(StatusCode::CONFLICT, "Slug already exists")
                    .into_response();
            }
            database_error("creating case study", e)
        }
    }
}

/// PATCH /api/admin/case-studies/{slug}
pub async fn update_case_study(
    headers: HeaderMap,
    Path(slug): Path<String>,
    Json(mut payload): Json<CaseStudyFields>,
) -> Response {
    if let Err(e) = require_admin(&headers).await {
        return e.into_response();
    }
    if !is_valid_slug(&slug) {
        return invalid_slug().into_response();
    }
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return ErrorResponse::reply(StatusCode::BAD_REQUEST, "Title is required").into_response();
    }

    let pool = match database() {
        Ok(pool) => pool,
        Err(response) => return response,
    };

    let mut case_study = match find_by_slug(&pool, &slug).await {
        Ok(Some(case_study)) => case_study,
        Ok(None) => return not_found(),
        Err(e) => return database_error("fetching case study", e),
    };

    sanitize_fields(&mut payload);
    payload.apply_to(&mut case_study);

    match sqlx::query_as::<_, CaseStudy>(&format!(
        r#"
        UPDATE case_studies
        SET title = $2, summary = $3, cover_image_url = $4, category = $5, layout = $6,
            intro = $7, intro_image_url = $8, challenge = $9, challenge_image_url = $10,
            approach = $11, approach_image_url = $12, solution = $13, solution_image_url = $14,
            results = $15, results_image_url = $16, conclusion = $17, conclusion_image_url = $18,
            updated_at = now()
        WHERE id = $1
        RETURNING {CASE_STUDY_COLUMNS}
        "#
    ))
    .bind(case_study.id)
    .bind(&case_study.title)
    .bind(&case_study.summary)
    .bind(&case_study.cover_image_url)
    .bind(&case_study.category)
    .bind(&case_study.layout)
    .bind(&case_study.intro)
    .bind(&case_study.intro_image_url)
    .bind(&case_study.challenge)
    .bind(&case_study.challenge_image_url)
    .bind(&case_study.approach)
    .bind(&case_study.approach_image_url)
    .bind(&case_study.solution)
    .bind(&case_study.solution_image_url)
    .bind(&case_study.results)
    .bind(&case_study.results_image_url)
    .bind(&case_study.conclusion)
    .bind(&case_study.conclusion_image_url)
    .fetch_one(pool.as_ref())
    .await
    {
        Ok(updated) => Json(updated).into_response(),
        Err(e) => database_error("updating case study", e),
    }
}

/// DELETE /api/admin/case-studies/{slug}
/// Sections go with it via ON DELETE CASCADE.
pub async fn delete_case_study(headers: HeaderMap, Path(slug): Path<String>) -> Response {
    if let Err(e) = require_admin(&headers).await {
        return e.into_response();
    }
    if !is_valid_slug(&slug) {
        return invalid_slug().into_response();
    }

    let pool = match database() {
        Ok(pool) => pool,
        Err(response) => return response,
    };

    match sqlx::query("DELETE FROM case_studies WHERE slug = $1")
        .bind(&slug)
        .execute(pool.as_ref())
        .await
    {
        Ok(result) if result.rows_affected() == 0 => not_found(),
        Ok(_) => {
            tracing::info!(slug = %slug, "case study deleted");
            Json(SuccessResponse { success: true }).into_response()
        }
        Err(e) => database_error("deleting case study", e),
    }
}
