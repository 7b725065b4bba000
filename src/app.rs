use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::{HeaderValue, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::downloader::{self, XLSX_CONTENT_TYPE};
use crate::error::{AppError, Context};
use crate::grid::{self, GridLayout, PLACEHOLDER};
use crate::loader::{self, Row};
use crate::store::{FileStore, FileSummary};

/// Name stored for uploads whose multipart part carries no filename
const DEFAULT_UPLOAD_NAME: &str = "upload.xlsx";

/// Shared, read-only state handed to every request
pub struct AppState {
    pub store: FileStore,
    pub layout: GridLayout,
}

#[derive(Serialize)]
struct FileContents {
    filename: String,
    data: Vec<Row>,
}

#[derive(Deserialize)]
struct UpdateRequest {
    data: Vec<Row>,
}

#[derive(Deserialize)]
struct ExportRequest {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    query: String,
    data: Vec<Row>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Start the web server
///
/// Connects to the database, builds the router and serves it until the
/// process is stopped.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::connect(&config.database_url, config.max_connections).await?;
    log::info!("Using database {}", config.database_url);

    let app_state = Arc::new(AppState {
        store,
        layout: config.grid_layout(),
    });
    let app = router(app_state, &config.static_dir, config.max_upload_bytes);

    let listener = TcpListener::bind(&config.bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
///
/// # Arguments
/// * `state` - Store handle and column layout
/// * `static_dir` - Directory served under `/static`
/// * `max_upload_bytes` - Largest accepted request body
pub fn router(state: Arc<AppState>, static_dir: &str, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_upload_page))
        .route("/browse", get(serve_browse_page))
        .route("/browse/:id", get(serve_sheet_page))
        .route("/upload", post(upload_file))
        .route("/files", get(list_files))
        .route("/files/:id", get(get_file).put(update_file))
        .route("/download/:id", get(download_file))
        .route("/delete/:id", delete(delete_file))
        .route("/export", post(export_rows))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn serve_upload_page() -> Html<&'static str> {
    Html(include_str!("./static/upload.html"))
}

async fn serve_browse_page() -> Html<&'static str> {
    Html(include_str!("./static/browse.html"))
}

async fn serve_sheet_page(Path(id): Path<i64>, State(state): State<Arc<AppState>>) -> Html<String> {
    let mut template = include_str!("./static/sheet.html").to_string();

    // Hand the page its file id, column layout and placeholder glyph
    let layout_json = serde_json::to_string(&state.layout).unwrap_or_else(|_| "{}".to_string());
    let placeholder_json = serde_json::to_string(PLACEHOLDER).unwrap_or_else(|_| "\"\"".to_string());

    template = template.replace(
        "</head>",
        &format!(
            "    <script>const FILE_ID = {}; const GRID_LAYOUT = {}; const PLACEHOLDER = {};</script>\n</head>",
            id,
            script_safe(&layout_json),
            script_safe(&placeholder_json)
        ),
    );

    Html(template)
}

// Keeps injected JSON from closing the surrounding <script> element
fn script_safe(json: &str) -> String {
    json.replace("</", "<\\/")
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<Row>>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let bytes = field.bytes().await?;
        upload = Some((filename, bytes));
    }

    let Some((filename, bytes)) = upload.filter(|(_, bytes)| !bytes.is_empty()) else {
        return Err(AppError::MissingFile);
    };

    // Decode before storing so an unreadable upload leaves no record behind
    let rows = loader::decode(bytes.clone())
        .await
        .context("Failed to read uploaded file")?;
    let id = state
        .store
        .insert(&filename, &bytes)
        .await
        .context("Failed to save file")?;

    log::info!("Stored {} as file {} ({} rows)", filename, id, rows.len());
    Ok(Json(rows))
}

async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FileSummary>>, AppError> {
    let files = state.store.list().await.context("Failed to fetch files")?;
    Ok(Json(files))
}

async fn get_file(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<FileContents>, AppError> {
    let record = state
        .store
        .get(id)
        .await
        .context("Failed to fetch file")?
        .ok_or(AppError::NotFound)?;

    let data = loader::decode(Bytes::from(record.file_data))
        .await
        .context("Failed to read file")?;

    Ok(Json(FileContents {
        filename: record.filename,
        data,
    }))
}

async fn update_file(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let row_count = payload.data.len();
    let bytes = downloader::encode(payload.data)
        .await
        .context("Failed to update file")?;

    let updated = state
        .store
        .update_content(id, &bytes)
        .await
        .context("Failed to update file")?;
    if !updated {
        return Err(AppError::NotFound);
    }

    log::info!("Updated file {} ({} rows)", id, row_count);
    Ok(Json(MessageResponse {
        message: "File updated successfully",
    }))
}

async fn download_file(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, AppError> {
    let record = state
        .store
        .get(id)
        .await
        .context("Failed to fetch file")?
        .ok_or(AppError::NotFound)?;

    Ok(attachment(&record.filename, Bytes::from(record.file_data)))
}

async fn delete_file(
    Path(id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = state
        .store
        .delete(id)
        .await
        .context("Failed to delete file")?;
    if !deleted {
        return Err(AppError::NotFound);
    }

    log::info!("Deleted file {}", id);
    Ok(Json(MessageResponse {
        message: "File deleted successfully.",
    }))
}

async fn export_rows(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, AppError> {
    let columns = state.layout.visible_headers(&request.data);
    let rows: Vec<Row> = grid::filter_rows(&request.data, &request.query, &columns)
        .into_iter()
        .cloned()
        .collect();

    let filename = grid::export_filename(&request.filename);
    let bytes = downloader::encode(rows)
        .await
        .context("Failed to export file")?;

    Ok(attachment(&filename, bytes))
}

/// Respond with workbook bytes as a file download
fn attachment(filename: &str, bytes: Bytes) -> Response {
    let disposition = content_disposition(filename);

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response()
}

/// Build an attachment header carrying both an ASCII and a UTF-8 filename
fn content_disposition(filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    let value = if ascii == filename {
        format!("attachment; filename=\"{}\"", ascii)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            utf8_percent_encode(filename, NON_ALPHANUMERIC)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
