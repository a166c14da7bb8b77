/**
 * Section Routes
 * Admin editing of case study sections: list, add, edit, delete,
 * publish, reorder, resync, and per-session open state
 *
 * Requests carrying an x-editor-session header share one editor per case
 * study for the life of that session; requests without it get a freshly
 * loaded editor.
 */
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{SectionError, SectionResult};
use crate::routes::auth::require_admin;
use crate::routes::{sanitize_html, AppState, ErrorResponse};
use crate::sections::{
    ComponentType, Notices, OpenSections, Section, SectionEditor, SectionPatch, SectionStore,
    SharedEditor, SortDirection,
};

type Editor = SectionEditor<Arc<dyn SectionStore>>;

pub const SESSION_HEADER: &str = "x-editor-session";

// ============================================================================
// Types
// ============================================================================

/// Body returned by every section mutation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorResponse {
    pub sections: Vec<Section>,
    pub notices: Notices,
    pub needs_resync: bool,
}

impl EditorResponse {
    fn from_editor(editor: &mut Editor) -> Self {
        Self {
            sections: editor.sections().to_vec(),
            notices: editor.take_notices(),
            needs_resync: editor.needs_resync(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSectionRequest {
    pub component_type: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: SortDirection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenSectionsBody {
    pub open: BTreeMap<String, bool>,
}

// ============================================================================
// Helpers
// ============================================================================

fn error_status(error: &SectionError) -> StatusCode {
    match error {
        SectionError::NotFound(_) => StatusCode::NOT_FOUND,
        SectionError::MissingIdentity | SectionError::UnknownComponentType(_) => {
            StatusCode::BAD_REQUEST
        }
        SectionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Reply with the editor's state; the status reflects the operation outcome.
///
/// A failed write that left the editor out of sync is followed by a refetch,
/// so the reply shows what the store holds.
async fn respond<T>(
    editor: &mut Editor,
    result: SectionResult<T>,
    success: StatusCode,
) -> Response {
    let status = match &result {
        Ok(_) => success,
        Err(e) => error_status(e),
    };
    if result.is_err() && editor.needs_resync() {
        if let Err(e) = editor.reconcile().await {
            tracing::warn!(error = %e, "refetch after failed section write did not succeed");
        }
    }
    (status, Json(EditorResponse::from_editor(editor))).into_response()
}

/// The editor session named by the request, if any.
pub fn editor_session(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn require_session(headers: &HeaderMap) -> Result<&str, Response> {
    editor_session(headers).ok_or_else(|| {
        ErrorResponse::reply_with(
            StatusCode::BAD_REQUEST,
            "Missing editor session",
            "Send an x-editor-session header",
        )
        .into_response()
    })
}

/// The editor for this request, and whether it was loaded just now.
async fn open_editor(
    state: &AppState,
    headers: &HeaderMap,
    case_study_id: Uuid,
) -> Result<(SharedEditor, bool), Response> {
    require_admin(headers).await.map_err(IntoResponse::into_response)?;
    let store = state.section_store().map_err(IntoResponse::into_response)?;

    let Some(session_id) = editor_session(headers) else {
        let editor = SectionEditor::load(store, Some(case_study_id)).await;
        return Ok((Arc::new(tokio::sync::Mutex::new(editor)), true));
    };

    let session = state.sessions.session(session_id);
    if let Some(editor) = session.editor(case_study_id) {
        return Ok((editor, false));
    }
    let editor = SectionEditor::load(store, Some(case_study_id)).await;
    Ok((session.insert_editor(case_study_id, editor), true))
}

fn open_scope(case_study_id: Uuid) -> String {
    format!("case-study-{case_study_id}")
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/admin/case-studies/{case_study}/sections
/// An editor kept from earlier requests is refetched first.
pub async fn list_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(case_study_id): Path<Uuid>,
) -> Response {
    let (handle, fresh) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    if !fresh {
        // A failed refetch posts its own notice and leaves needs_resync set.
        let _ = editor.reconcile().await;
    }
    let status = if editor.needs_resync() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(EditorResponse::from_editor(&mut editor))).into_response()
}

/// POST /api/admin/case-studies/{case_study}/sections
pub async fn add_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(case_study_id): Path<Uuid>,
    Json(payload): Json<AddSectionRequest>,
) -> Response {
    let component_type = match payload.component_type.parse::<ComponentType>() {
        Ok(ComponentType::EditorState) | Err(_) => {
            return ErrorResponse::reply_with(
                StatusCode::BAD_REQUEST,
                "Invalid component type",
                &payload.component_type,
            )
            .into_response();
        }
        Ok(t) => t,
    };

    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    let result = editor.add_section(component_type).await;
    respond(&mut editor, result, StatusCode::CREATED).await
}

/// PATCH /api/admin/case-studies/{case_study}/sections/{section_id}
pub async fn update_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((case_study_id, section_id)): Path<(Uuid, Uuid)>,
    Json(mut patch): Json<SectionPatch>,
) -> Response {
    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    patch.content = patch.content.as_deref().map(sanitize_html);
    let mut editor = handle.lock().await;
    let result = editor.update_section(section_id, patch).await;
    respond(&mut editor, result, StatusCode::OK).await
}

/// DELETE /api/admin/case-studies/{case_study}/sections/{section_id}
pub async fn delete_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((case_study_id, section_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    let result = editor.remove_section(section_id).await;
    respond(&mut editor, result, StatusCode::OK).await
}

/// POST /api/admin/case-studies/{case_study}/sections/{section_id}/publish
pub async fn publish_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((case_study_id, section_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<PublishRequest>,
) -> Response {
    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    let result = editor
        .toggle_section_published(section_id, payload.published)
        .await;
    respond(&mut editor, result, StatusCode::OK).await
}

/// POST /api/admin/case-studies/{case_study}/sections/{section_id}/move
pub async fn move_section(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((case_study_id, section_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MoveRequest>,
) -> Response {
    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    let result = editor.move_section(section_id, payload.direction).await;
    respond(&mut editor, result, StatusCode::OK).await
}

/// POST /api/admin/case-studies/{case_study}/sections/sync
/// Refetch the session's sections and drop the dirty set.
pub async fn sync_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(case_study_id): Path<Uuid>,
) -> Response {
    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    let result = editor.reconcile().await;
    let status = match &result {
        Ok(()) => StatusCode::OK,
        Err(e) => error_status(e),
    };
    (status, Json(EditorResponse::from_editor(&mut editor))).into_response()
}

/// POST /api/admin/case-studies/{case_study}/sections/revert
/// Drop unconfirmed local changes without asking the store.
pub async fn revert_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(case_study_id): Path<Uuid>,
) -> Response {
    let (handle, _) = match open_editor(&state, &headers, case_study_id).await {
        Ok(opened) => opened,
        Err(response) => return response,
    };
    let mut editor = handle.lock().await;
    editor.revert_to_snapshot();
    (StatusCode::OK, Json(EditorResponse::from_editor(&mut editor))).into_response()
}

/// GET /api/admin/case-studies/{case_study}/open-sections
pub async fn get_open_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(case_study_id): Path<Uuid>,
) -> Response {
    if let Err(e) = require_admin(&headers).await {
        return e.into_response();
    }
    let session = match require_session(&headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let storage = state.sessions.storage(session);
    let open = OpenSections::load(storage.as_ref(), &open_scope(case_study_id));
    Json(OpenSectionsBody {
        open: open.as_map().clone(),
    })
    .into_response()
}

/// PUT /api/admin/case-studies/{case_study}/open-sections
pub async fn put_open_sections(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(case_study_id): Path<Uuid>,
    Json(payload): Json<OpenSectionsBody>,
) -> Response {
    if let Err(e) = require_admin(&headers).await {
        return e.into_response();
    }
    let session = match require_session(&headers) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let storage = state.sessions.storage(session);
    let mut open = OpenSections::load(storage.as_ref(), &open_scope(case_study_id));
    open.replace(payload.open);
    open.save(storage.as_ref());

    Json(OpenSectionsBody {
        open: open.as_map().clone(),
    })
    .into_response()
}
