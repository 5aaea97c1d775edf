//! Classes and timetable routes.

use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::account::{Account, Role};
use crate::classroom::{Class, Source, Timetable};
use crate::error::Result;
use crate::export;
use crate::notification::{Level, Notification, ResourceKind};
use crate::router::Valid;
use crate::{AppState, ServerError};

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
/// JSON envelope around the base64 payload.
const BODY_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TimetableBody {
    #[validate(length(min = 1, message = "Please provide a link or a file."))]
    source: String,
}

fn viewable(state: &AppState, account: &Account, id: &str) -> Result<Class> {
    if !account.can_view(id) {
        return Err(ServerError::Forbidden);
    }
    state.classes.get(id).ok_or(ServerError::NotFound("class"))
}

fn manageable(state: &AppState, account: &Account, id: &str) -> Result<Class> {
    if !account.can_manage(id) {
        return Err(ServerError::Forbidden);
    }
    state.classes.get(id).ok_or(ServerError::NotFound("class"))
}

fn csv(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// `GET /classes`.
async fn list(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Json<Vec<Class>> {
    Json(
        state
            .classes
            .list()
            .into_iter()
            .filter(|class| account.can_view(&class.id))
            .collect(),
    )
}

/// `GET /classes/{id}`.
async fn get_class(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<Json<Class>> {
    Ok(Json(viewable(&state, &account, &id)?))
}

/// `GET /classes/{id}/timetable`, download the current timetable.
async fn download(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<Response> {
    let timetable = viewable(&state, &account, &id)?
        .timetable
        .ok_or(ServerError::NotFound("timetable"))?;

    Ok(match timetable.source()? {
        Source::Link(url) => Redirect::temporary(url.as_str()).into_response(),
        Source::Document(document) => (
            [
                (header::CONTENT_TYPE, document.mime.clone()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", document.file_name()),
                ),
            ],
            document.bytes,
        )
            .into_response(),
    })
}

/// `PUT /classes/{id}/timetable`, publish a link or an uploaded file.
async fn update(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
    Valid(body): Valid<TimetableBody>,
) -> Result<Json<Class>> {
    manageable(&state, &account, &id)?;

    let timetable =
        Timetable::parse(&body.source, state.config.upload.max_size, Utc::now())?;
    let class = state
        .classes
        .set_timetable(&id, timetable)
        .ok_or(ServerError::NotFound("class"))?;

    state
        .notifier
        .notify(&id, Level::Success, "Timetable updated successfully.");
    tracing::info!(class_id = %id, by = %account.email, "timetable updated");

    Ok(Json(class))
}

/// `DELETE /classes/{id}/timetable`.
async fn delete(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    manageable(&state, &account, &id)?;

    state
        .classes
        .delete_timetable(&id)
        .ok_or(ServerError::NotFound("class"))?;

    state.notifier.notify(&id, Level::Info, "Timetable deleted.");
    tracing::info!(class_id = %id, by = %account.email, "timetable deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /classes/{id}/timetable/share`.
async fn share(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<Notification>)> {
    let timetable = manageable(&state, &account, &id)?
        .timetable
        .ok_or(ServerError::NotFound("timetable"))?;

    // Uploads are shared by download route, never by payload.
    let url = if timetable.is_data_file() {
        format!("/classes/{id}/timetable")
    } else {
        timetable.url
    };
    let notification = state.notifier.share(&id, ResourceKind::Timetable, url);

    Ok((StatusCode::CREATED, Json(notification)))
}

/// `GET /classes/{id}/notifications`.
async fn notifications(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Notification>>> {
    viewable(&state, &account, &id)?;
    Ok(Json(state.notifier.list(&id)))
}

/// `GET /classes/{id}/members.csv`.
async fn members(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<Response> {
    let class = manageable(&state, &account, &id)?;
    let bytes = export::members_csv(&class, &state.accounts.members(&id))?;

    Ok(csv(&format!("{id}-members.csv"), bytes))
}

/// `GET /classes/export.csv`. Administrators only.
async fn export_all(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
) -> Result<Response> {
    if account.role != Role::Admin {
        return Err(ServerError::Forbidden);
    }

    let bytes = export::classes_csv(&state.classes.list())?;
    Ok(csv("classes.csv", bytes))
}

/// Request body limit fitting a base64 document of `max_size` bytes.
fn body_limit(max_size: usize) -> usize {
    // base64 grows uploads by a third.
    max_size
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(BODY_OVERHEAD)
}

pub fn router(state: &AppState) -> Router<AppState> {
    let body_limit = body_limit(state.config.upload.max_size);

    Router::new()
        .route("/", get(list))
        .route("/export.csv", get(export_all))
        .route("/{id}", get(get_class))
        .route(
            "/{id}/timetable",
            get(download)
                .put(update)
                .delete(delete)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/{id}/timetable/share", post(share))
        .route("/{id}/notifications", get(notifications))
        .route("/{id}/members.csv", get(members))
}
