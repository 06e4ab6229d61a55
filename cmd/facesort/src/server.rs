//! HTTP API.
//!
//! API endpoints:
//! - POST /process?user=<id>                         - multipart `images` → cluster into albums
//! - GET  /clusters?user=<id>                        - album → image filenames
//! - GET  /clustered/{user}/{person}/{image}         - one published image
//! - GET  /download_cluster?user=<id>&folder=<album> - album as zip
//! - POST /delete_all?user=<id>                      - remove all tenant data

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use facesort_album::AlbumError;
use facesort_pipeline::{ProcessError, Processor, Upload};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the uploaded images.
const IMAGES_FIELD: &str = "images";

#[derive(Clone)]
struct AppState {
    processor: Arc<Processor>,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    user: Option<String>,
    folder: Option<String>,
}

impl UserQuery {
    fn user(&self) -> Result<&str, Response> {
        match self.user.as_deref() {
            Some(user) if !user.is_empty() => Ok(user),
            _ => Err(error_response(
                StatusCode::BAD_REQUEST,
                "missing_user",
                "Missing user ID",
            )),
        }
    }
}

/// Builds the application router.
pub fn router(processor: Arc<Processor>, max_upload_bytes: usize) -> Router {
    let state = AppState { processor };
    Router::new()
        .route("/process", post(process))
        .route("/clusters", get(list_clusters))
        .route("/clustered/{user}/{person}/{image}", get(serve_image))
        .route("/download_cluster", get(download_cluster))
        .route("/delete_all", post(delete_all))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves `app` until the process exits.
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let addr = parse_addr(addr)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "facesort: listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Parse address string to SocketAddr.
fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let body = json!({
        "status": "error",
        "kind": kind,
        "message": message.into(),
    });
    (status, Json(body)).into_response()
}

fn album_error_response(e: &AlbumError) -> Response {
    let (status, kind) = match e {
        AlbumError::InvalidTenantKey { .. } => (StatusCode::BAD_REQUEST, "invalid_tenant"),
        AlbumError::InvalidName { .. } => (StatusCode::BAD_REQUEST, "invalid_name"),
        AlbumError::ForeignImage { .. } => (StatusCode::BAD_REQUEST, "foreign_image"),
        AlbumError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        AlbumError::Storage { .. } => {
            error!(error = %e, "facesort: storage failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage")
        }
    };
    error_response(status, kind, e.to_string())
}

fn process_error_response(e: ProcessError) -> Response {
    let status = match &e {
        ProcessError::NoValidInput { .. } | ProcessError::Cluster(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ProcessError::InvalidTenantKey { .. } => StatusCode::BAD_REQUEST,
        ProcessError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut body = json!({
        "status": "error",
        "kind": e.kind(),
        "message": e.to_string(),
    });
    if let ProcessError::NoValidInput { skipped } = &e {
        body["skipped"] = json!(skipped);
    }
    (status, Json(body)).into_response()
}

async fn process(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    mut multipart: Multipart,
) -> Response {
    let user = match query.user() {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut uploads = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(e.status(), "bad_upload", e.body_text()),
        };
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(data) => uploads.push(Upload::new(filename, data.to_vec())),
            Err(e) => return error_response(e.status(), "bad_upload", e.body_text()),
        }
    }
    info!(user, files = uploads.len(), "facesort: process request");

    match state.processor.process_uploads(user, uploads).await {
        Ok(report) => Json(json!({
            "status": "success",
            "message": "Faces clustered",
            "report": report,
        }))
        .into_response(),
        Err(e) => {
            warn!(user, error = %e, "facesort: process failed");
            process_error_response(e)
        }
    }
}

async fn list_clusters(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    let user = match query.user() {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.processor.workspace().list_albums(user).await {
        Ok(albums) => Json::<BTreeMap<String, Vec<String>>>(albums).into_response(),
        Err(e) => album_error_response(&e),
    }
}

async fn serve_image(
    State(state): State<AppState>,
    Path((user, person, image)): Path<(String, String, String)>,
) -> Response {
    let workspace = state.processor.workspace();
    let (path, kind) = match workspace.album_image(&user, &person, &image).await {
        Ok(found) => found,
        Err(e) => return album_error_response(&e),
    };
    match tokio::fs::read(&path).await {
        Ok(data) => ([(header::CONTENT_TYPE, kind.content_type())], data).into_response(),
        Err(e) => album_error_response(&AlbumError::Storage { path, source: e }),
    }
}

async fn download_cluster(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Response {
    let user = match query.user() {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let Some(folder) = query.folder.as_deref() else {
        return error_response(StatusCode::BAD_REQUEST, "missing_folder", "Missing folder");
    };

    let files = match state.processor.workspace().album_files(user, folder).await {
        Ok(files) => files,
        Err(e) => return album_error_response(&e),
    };

    let archive = match tokio::task::spawn_blocking(move || zip_files(files)).await {
        Ok(Ok(archive)) => archive,
        Ok(Err(e)) => {
            error!(user, folder, error = %e, "facesort: zip failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "zip", e.to_string());
        }
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "zip", e.to_string());
        }
    };

    let disposition = format!("attachment; filename=\"{folder}.zip\"");
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    )
        .into_response()
}

/// Packs files into an in-memory zip archive, one entry per file at the
/// archive root.
fn zip_files(files: Vec<(String, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in files {
        zip.start_file(name, options)?;
        zip.write_all(&data)?;
    }
    Ok(zip.finish()?.into_inner())
}

async fn delete_all(State(state): State<AppState>, Query(query): Query<UserQuery>) -> Response {
    let user = match query.user() {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.processor.workspace().teardown(user).await {
        Ok(report) if report.is_complete() => Json(json!({
            "status": "success",
            "message": format!("Data deleted for user {user}"),
            "report": report,
        }))
        .into_response(),
        Ok(report) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "kind": "partial_delete",
                "message": format!("Data partially deleted for user {user}"),
                "report": report,
            })),
        )
            .into_response(),
        Err(e) => album_error_response(&e),
    }
}
