//! Folder and scan job routes.
//!
//! Scans are dispatched to the blocking pool and answered with `202 Accepted`
//! plus a job id; clients poll `/scans/:job_id` for the outcome.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reelhouse_common::{FolderId, ScanJobId};
use reelhouse_db::{models::Folder, queries::folders};
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::scanner::ScanMode;

/// Create folder and scan routes.
pub fn scan_routes() -> Router<AppContext> {
    Router::new()
        .route("/folders", get(list_root_folders))
        .route("/folders/:folder_id/scan", post(scan_folder))
        .route("/folders/:folder_id/scan/full", post(full_scan_folder))
        .route("/scans", get(list_scans))
        .route("/scans/:job_id", get(get_scan))
}

/// Body of a `202 Accepted` scan response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanAccepted {
    pub job_id: ScanJobId,
    pub folder_id: FolderId,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

/// List root folders.
pub async fn list_root_folders(State(ctx): State<AppContext>) -> Response {
    let conn = match ctx.db.get() {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    };

    match folders::list_root_folders(&conn) {
        Ok(roots) => Json::<Vec<Folder>>(roots).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Start an incremental scan of a folder.
pub async fn scan_folder(State(ctx): State<AppContext>, Path(folder_id): Path<String>) -> Response {
    start_scan(&ctx, &folder_id, ScanMode::Incremental)
}

/// Start a full rescan of a folder.
pub async fn full_scan_folder(
    State(ctx): State<AppContext>,
    Path(folder_id): Path<String>,
) -> Response {
    start_scan(&ctx, &folder_id, ScanMode::Full)
}

fn start_scan(ctx: &AppContext, folder_id: &str, mode: ScanMode) -> Response {
    let Ok(folder_id) = folder_id.parse::<FolderId>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid folder ID");
    };

    let conn = match ctx.db.get() {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    };

    match folders::get_folder(&conn, folder_id) {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "Folder not found"),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
    drop(conn);

    let handle = ctx.dispatcher.dispatch(folder_id, mode);
    tracing::info!(job_id = %handle.id, folder_id = %folder_id, ?mode, "Scan requested");

    (
        StatusCode::ACCEPTED,
        Json(ScanAccepted {
            job_id: handle.id,
            folder_id,
        }),
    )
        .into_response()
}

/// List dispatched scans, newest first.
pub async fn list_scans(State(ctx): State<AppContext>) -> Response {
    Json(ctx.dispatcher.jobs()).into_response()
}

/// Get one dispatched scan.
pub async fn get_scan(
    State(ctx): State<AppContext>,
    Path(job_id): Path<String>,
) -> Result<Response, StatusCode> {
    let job_id = job_id
        .parse::<ScanJobId>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    ctx.dispatcher
        .job(job_id)
        .map(|job| Json(job).into_response())
        .ok_or(StatusCode::NOT_FOUND)
}
