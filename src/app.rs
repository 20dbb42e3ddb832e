use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path as AxumPath, State},
    routing::{delete, get, post, put},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::artifacts::{self, FinalizeOutcome, PlotArtifact};
use crate::error::AppError;
use crate::loader;
use crate::login::{self, UserRegistry};
use crate::plot::{self, PlotRequest, SeriesArtifact};
use crate::render::{ChartOptions, ChartRenderer, PlottersRenderer};
use crate::store::FileStore;

/// Server configuration, read from the environment with local defaults
pub struct AppConfig {
    /// Root directory for the user registry and per-user namespaces
    pub data_dir: PathBuf,

    /// Address the HTTP server binds to
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("database"),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Configuration from `PLOTDASH_DATA_DIR` / `PLOTDASH_ADDR`, with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("PLOTDASH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            bind_addr: std::env::var("PLOTDASH_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub store: FileStore,
    pub users: UserRegistry,
    pub renderer: Arc<dyn ChartRenderer>,
}

/// Uniform JSON envelope for auth and upload responses
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(rename = "oldFilename")]
    pub old_filename: String,

    #[serde(rename = "newFilename")]
    pub new_filename: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub filename: String,
}

// How generated series leave the server: as structured data for the client
// to render, or as server-rendered images
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum RenderMode {
    #[default]
    Inline,
    Image,
}

// Rendering runs out-of-loop but never unbounded
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    // The dashboard is a separate origin; let it talk to us
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/register", post(login::handle_register))
        .route("/auth/login", post(login::handle_login))
        .route("/upload/:username", post(handle_upload))
        .route("/fetch/:username", get(list_saved_files))
        .route("/fetch/:username/file/:filename", get(fetch_saved_file))
        .route("/fetch/:username/edit", put(rename_saved_file))
        .route("/fetch/:username/delete", delete(delete_saved_file))
        .layer(cors)
        .with_state(state)
}

/// Initialize storage and serve the application
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::new(&config.data_dir);
    store.init().await?;

    let users = UserRegistry::open(config.data_dir.join("users.json"))?;
    let renderer = Arc::new(PlottersRenderer::new(store.scratch_dir()));

    let state = Arc::new(AppState {
        store,
        users,
        renderer,
    });

    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Handle a spreadsheet upload and plot request
///
/// Pipeline: receive the multipart body into memory, parse the file (pure),
/// validate the plot spec against the parsed schema, persist the raw upload,
/// generate one series per non-Y column, optionally render to images, then
/// finalize (inline response or saved files). Parse and validation failures
/// happen strictly before the upload is written.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    AxumPath(username): AxumPath<String>,
    multipart: Multipart,
) -> Result<Json<ApiResponse>, AppError> {
    let username = username.to_lowercase();

    if !state.users.contains(&username) {
        return Err(AppError::NotFound(format!(
            "user '{}' is not registered",
            username
        )));
    }

    let form = read_upload_form(multipart).await?;

    let file_name = form.file_name;
    let bytes = form.file_bytes;

    let extension = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();

    // Pure, in-memory steps first: a bad request never touches storage
    let dataset = loader::parse_bytes(&bytes, &extension)?;
    let spec = form.request.validate(dataset.schema())?;

    state
        .store
        .store_upload(&username, &file_name, &bytes)
        .await?;

    let series = plot::generate(&dataset, &spec);
    if series.is_empty() {
        return Ok(Json(ApiResponse {
            success: true,
            message: "No plottable columns besides the y-axis".to_string(),
            token: None,
            data: Some(serde_json::json!([])),
        }));
    }

    let artifacts = match form.render {
        RenderMode::Inline => series.into_iter().map(PlotArtifact::Series).collect(),
        RenderMode::Image => render_charts(Arc::clone(&state.renderer), series).await?,
    };

    let outcome = artifacts::finalize(artifacts, &state.store, &username, spec.save_plot).await?;

    let response = match outcome {
        FinalizeOutcome::Transient(plots) => ApiResponse {
            success: true,
            message: "Plots generated successfully".to_string(),
            token: None,
            data: Some(serde_json::json!({
                "plot_type": spec.plot_type,
                "plots": plots,
            })),
        },
        FinalizeOutcome::Persisted(saved) => ApiResponse {
            success: true,
            message: "Data saved successfully".to_string(),
            token: None,
            data: Some(serde_json::json!({ "saved": saved })),
        },
    };

    Ok(Json(response))
}

// Everything the upload form can carry, collected off the wire
struct UploadForm {
    file_name: String,
    file_bytes: Vec<u8>,
    request: PlotRequest,
    render: RenderMode,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut request = PlotRequest::default();
    let mut render = RenderMode::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file field: {}", e)))?;
                file_bytes = Some(bytes.to_vec());
            }
            "y_axis_key" => request.y_axis_key = read_text(field).await?,
            "plot_type" => request.plot_type = read_text(field).await?,
            "graph_type" => request.graph_type = read_text(field).await?,
            "save_plot" => {
                let text = read_text(field).await?;
                request.save_plot = matches!(text.to_lowercase().as_str(), "true" | "1" | "on");
            }
            "render" => {
                let text = read_text(field).await?;
                render = match text.to_lowercase().as_str() {
                    "" | "inline" => RenderMode::Inline,
                    "image" => RenderMode::Image,
                    other => {
                        return Err(AppError::Validation(format!(
                            "invalid render mode '{}', must be 'inline' or 'image'",
                            other
                        )));
                    }
                };
            }
            // Drain unknown fields so the stream keeps moving
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    let file_bytes = match file_bytes {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(AppError::Validation("No file data received".to_string())),
    };

    Ok(UploadForm {
        file_name: file_name.unwrap_or_else(|| "upload".to_string()),
        file_bytes,
        request,
        render,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("failed to read form field: {}", e)))
}

// Render every series on a blocking task, bounded by RENDER_TIMEOUT.
// A client disconnect drops the response future; the temp files travel with
// the task result and are removed when it is discarded.
async fn render_charts(
    renderer: Arc<dyn ChartRenderer>,
    series: Vec<SeriesArtifact>,
) -> Result<Vec<PlotArtifact>, AppError> {
    let task = tokio::task::spawn_blocking(move || -> Result<Vec<PlotArtifact>, AppError> {
        let mut rendered = Vec::with_capacity(series.len());
        for artifact in &series {
            let options = ChartOptions::for_series(artifact);
            let file = renderer.render(artifact, &options)?;
            rendered.push(PlotArtifact::Image {
                series_name: artifact.series_name.clone(),
                file,
                extension: renderer.extension(),
            });
        }
        Ok(rendered)
    });

    let rendered = tokio::time::timeout(RENDER_TIMEOUT, task)
        .await
        .map_err(|_| {
            AppError::Render(format!(
                "rendering exceeded the {}s deadline",
                RENDER_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| AppError::Render(format!("render task failed: {}", e)))??;

    // Degenerate success is not accepted
    if rendered.is_empty() {
        return Err(AppError::Render("renderer produced no artifacts".to_string()));
    }

    Ok(rendered)
}

/// List a user's saved files
async fn list_saved_files(
    State(state): State<Arc<AppState>>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let files = state.store.list_saved(&username.to_lowercase()).await?;
    Ok(Json(serde_json::json!({ "files": files })))
}

/// Fetch the contents of one saved file
///
/// Text content comes back as-is; binary content (rendered charts) is
/// base64-encoded and flagged through the `encoding` field.
async fn fetch_saved_file(
    State(state): State<Arc<AppState>>,
    AxumPath((username, filename)): AxumPath<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let bytes = state
        .store
        .read_saved(&username.to_lowercase(), &filename)
        .await?;

    let (content, encoding) = match String::from_utf8(bytes) {
        Ok(text) => (text, "utf-8"),
        Err(err) => (BASE64.encode(err.into_bytes()), "base64"),
    };

    Ok(Json(serde_json::json!({
        "filename": filename,
        "content": content,
        "encoding": encoding,
    })))
}

/// Rename a saved file (extension preserved from the old name)
async fn rename_saved_file(
    State(state): State<Arc<AppState>>,
    AxumPath(username): AxumPath<String>,
    Json(body): Json<RenameRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .store
        .rename_saved(
            &username.to_lowercase(),
            &body.old_filename,
            &body.new_filename,
        )
        .await?;
    Ok(Json(serde_json::json!({ "message": "File renamed successfully" })))
}

/// Delete a saved file
async fn delete_saved_file(
    State(state): State<Arc<AppState>>,
    AxumPath(username): AxumPath<String>,
    Json(body): Json<DeleteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .store
        .delete_saved(&username.to_lowercase(), &body.filename)
        .await?;
    Ok(Json(serde_json::json!({ "message": "File deleted successfully" })))
}
