use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{CandidateId, Evaluator, PanelId};
use super::forwarding::ForwardError;
use super::panels::PanelError;
use super::repository::{CandidateRepository, Notifier, RepositoryError};
use super::service::{PanelAllocationService, ServiceError};
use super::session::SessionError;

#[derive(Debug, Deserialize)]
pub struct PanelRequest {
    pub evaluators: Vec<Evaluator>,
}

#[derive(Debug, Deserialize)]
pub struct MarkInputRequest {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForwardRequest {
    #[serde(default)]
    pub consent_acknowledged: bool,
}

/// Router builder exposing the panel console over HTTP.
pub fn panel_router<R, N>(service: Arc<PanelAllocationService<R, N>>) -> Router
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/panels",
            get(list_panels_handler::<R, N>).post(create_panel_handler::<R, N>),
        )
        .route(
            "/api/v1/panels/:panel_id",
            put(update_panel_handler::<R, N>).delete(remove_panel_handler::<R, N>),
        )
        .route(
            "/api/v1/panels/:panel_id/forward",
            post(forward_panel_handler::<R, N>),
        )
        .route("/api/v1/rosters", get(rosters_handler::<R, N>))
        .route(
            "/api/v1/allocation/refresh",
            post(refresh_handler::<R, N>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/edit",
            post(begin_edit_handler::<R, N>).delete(close_edit_handler::<R, N>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/marks/:slot",
            put(mark_input_handler::<R, N>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/commit",
            post(commit_handler::<R, N>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/forward",
            post(forward_candidate_handler::<R, N>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/state",
            get(edit_state_handler::<R, N>),
        )
        .with_state(service)
}

pub(crate) async fn list_panels_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    (StatusCode::OK, axum::Json(service.panels())).into_response()
}

pub(crate) async fn create_panel_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    axum::Json(request): axum::Json<PanelRequest>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.create_panel(request.evaluators) {
        Ok(change) => {
            let payload = json!({
                "panels": change.panels,
                "allocation": change.allocation.summary(),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_panel_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(panel_id): Path<u32>,
    axum::Json(request): axum::Json<PanelRequest>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.update_panel(PanelId(panel_id), request.evaluators) {
        Ok(panel) => (StatusCode::OK, axum::Json(panel)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn remove_panel_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(panel_id): Path<u32>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.remove_panel(PanelId(panel_id)) {
        Ok(change) => {
            let payload = json!({
                "panels": change.panels,
                "allocation": change.allocation.summary(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn forward_panel_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(panel_id): Path<u32>,
    request: Option<axum::Json<ForwardRequest>>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    let request = request.map(|axum::Json(body)| body).unwrap_or_default();
    match service.forward_panel(PanelId(panel_id), request.consent_acknowledged) {
        Ok(report) => (StatusCode::OK, axum::Json(report.summary())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn rosters_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.rosters() {
        Ok(rosters) => (StatusCode::OK, axum::Json(rosters)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn refresh_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.refresh() {
        Ok(Some(outcome)) => {
            let payload = json!({
                "reallocated": true,
                "allocation": outcome.summary(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(None) => {
            let payload = json!({ "reallocated": false });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn begin_edit_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(candidate_id): Path<String>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.begin_edit(&CandidateId(candidate_id)) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn close_edit_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(candidate_id): Path<String>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    let closed = service.close_edit(&CandidateId(candidate_id));
    (StatusCode::OK, axum::Json(json!({ "closed": closed }))).into_response()
}

/// `slot` is 1-based on the wire, matching the evaluator columns of the score sheet.
pub(crate) async fn mark_input_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path((candidate_id, slot)): Path<(String, usize)>,
    axum::Json(request): axum::Json<MarkInputRequest>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    let Some(index) = slot.checked_sub(1) else {
        let payload = json!({ "error": "mark slots are numbered from 1" });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    };
    match service.input_mark(&CandidateId(candidate_id), index, &request.value) {
        Ok(snapshot) => (StatusCode::ACCEPTED, axum::Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn commit_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(candidate_id): Path<String>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    match service.commit_marks(&CandidateId(candidate_id)) {
        Ok(candidate) => (StatusCode::OK, axum::Json(candidate)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_state_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(candidate_id): Path<String>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    let id = CandidateId(candidate_id);
    let payload = json!({
        "candidate_id": id,
        "state": service.edit_state(&id).label(),
        "autosave_pending": service.session().has_pending_autosave(&id),
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn forward_candidate_handler<R, N>(
    State(service): State<Arc<PanelAllocationService<R, N>>>,
    Path(candidate_id): Path<String>,
    request: Option<axum::Json<ForwardRequest>>,
) -> Response
where
    R: CandidateRepository + 'static,
    N: Notifier + 'static,
{
    let request = request.map(|axum::Json(body)| body).unwrap_or_default();
    match service.forward_candidate(&CandidateId(candidate_id), request.consent_acknowledged) {
        Ok(candidate) => (StatusCode::OK, axum::Json(candidate)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Panel(PanelError::NotFound(_)) => StatusCode::NOT_FOUND,
        ServiceError::Panel(PanelError::LastPanel) => StatusCode::CONFLICT,
        ServiceError::Panel(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Session(SessionError::NotFound(_))
        | ServiceError::Forward(ForwardError::NotFound(_)) => StatusCode::NOT_FOUND,
        ServiceError::Session(SessionError::Input(_))
        | ServiceError::Session(SessionError::SlotOutOfRange { .. })
        | ServiceError::Forward(ForwardError::ConsentRequired(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServiceError::Session(SessionError::Forwarded(_))
        | ServiceError::Session(SessionError::Unassigned(_))
        | ServiceError::Session(SessionError::NotEditing(_))
        | ServiceError::Forward(ForwardError::AlreadyForwarded(_))
        | ServiceError::Forward(ForwardError::Unassigned(_)) => StatusCode::CONFLICT,
        ServiceError::Session(SessionError::Repository(err))
        | ServiceError::Forward(ForwardError::Repository(err))
        | ServiceError::Repository(err) => repository_status(err),
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound(_) => StatusCode::NOT_FOUND,
        RepositoryError::Frozen(_) => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(err: ServiceError) -> Response {
    let payload = json!({
        "error": err.to_string(),
    });
    (status_for(&err), axum::Json(payload)).into_response()
}
