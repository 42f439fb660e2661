use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use mirror::{BlobStore, StorePath};
use rsvp_core::{
    ExportFormat, LandingPageSettings, ListPage, ListQuery, NewRsvp, Pagination, SyncError,
    SyncStatus,
};
use serde_json::{Value, json};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::auth::{AdminSession, LoginForm, LoginResponse, check_credentials, issue_token};
use crate::error::ApiError;

pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/login", post(login))
        .route("/rsvps", get(list_rsvps).delete(delete_all_rsvps))
        .route("/rsvps/{id}", delete(delete_rsvp))
        .route("/settings", get(admin_settings).put(update_settings))
        .route(
            "/background",
            post(upload_background).layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route("/export/{format}", get(export_rsvps));

    Router::new()
        .route("/api/settings", get(landing_page_settings))
        .route("/api/rsvps", post(submit_rsvp))
        .route("/api/status", get(status))
        .route("/assets/{*path}", get(serve_asset))
        .nest("/api/admin", admin)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .with_state(state)
}

fn default_guests() -> i64 {
    1
}

#[derive(Debug, serde::Deserialize)]
struct RsvpForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    affiliation: String,
    #[serde(default = "default_guests")]
    guests: i64,
}

#[derive(Debug, serde::Deserialize)]
struct UploadParams {
    filename: String,
}

async fn landing_page_settings(State(state): State<AppState>) -> Json<LandingPageSettings> {
    Json(state.sync.settings_or_default())
}

async fn status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status())
}

async fn submit_rsvp(
    State(state): State<AppState>,
    Json(form): Json<RsvpForm>,
) -> Result<impl IntoResponse, ApiError> {
    let rsvp = NewRsvp::new(&form.name, &form.affiliation, form.guests).map_err(SyncError::from)?;
    let id = state.sync.add_record(rsvp).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn serve_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blob = state.sync.store().read(&StorePath::new(&path)).await?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}

async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Json<LoginResponse>, ApiError> {
    check_credentials(&state, &form)?;
    let session = issue_token(
        &state.keys,
        state.config.admin_email.trim(),
        Utc::now(),
        state.config.session_hours,
    )?;
    log::info!("Admin signed in until {}", session.expires_at);
    Ok(Json(session))
}

async fn list_rsvps(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ListPage> {
    let pagination = Pagination::new(state.config.page_size);
    Json(state.sync.with_rsvps(|records| query.run(records, pagination)))
}

async fn delete_rsvp(
    session: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    log::debug!("{} is deleting RSVP {id}", session.email);
    state.sync.delete_record(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_all_rsvps(
    session: AdminSession,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    log::warn!("{} is deleting every RSVP", session.email);
    state.sync.delete_all_records().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reads the stored settings directly instead of the mirror, so the form starts from what is saved.
async fn admin_settings(
    _session: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<LandingPageSettings>, ApiError> {
    let settings = state.sync.fetch_settings().await?;
    Ok(Json(settings.unwrap_or_default()))
}

async fn update_settings(
    _session: AdminSession,
    State(state): State<AppState>,
    Json(settings): Json<LandingPageSettings>,
) -> Result<StatusCode, ApiError> {
    state.sync.update_settings(settings).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_background(
    _session: AdminSession,
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let url = state
        .sync
        .upload_asset(body.to_vec(), &params.filename, media_type)
        .await?;
    Ok(Json(json!({ "url": url })))
}

async fn export_rsvps(
    _session: AdminSession,
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let format: ExportFormat = format.parse().map_err(ApiError::BadRequest)?;
    let bytes = format.render(&state.sync.rsvps())?;
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", format.file_name()),
            ),
        ],
        bytes,
    ))
}
