use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::AppError;
use crate::plot::SeriesArtifact;
use crate::store::FileStore;

/// A generated plot before its lifecycle is decided
///
/// Either structured series data (client-rendered) or a rendered image
/// backed by a temporary file. Dropping an unfinalized image artifact
/// removes its temp file.
pub enum PlotArtifact {
    Series(SeriesArtifact),
    Image {
        series_name: String,
        file: NamedTempFile,
        extension: &'static str,
    },
}

/// One artifact returned inline in the response body
#[derive(Debug, Serialize)]
pub struct InlineArtifact {
    pub series_name: String,

    /// "application/json" for series data, "image/png" for rendered charts
    pub content_type: String,

    /// The series object itself, or a base64 string for binary content
    pub data: serde_json::Value,
}

/// Result of finalizing a batch of artifacts
pub enum FinalizeOutcome {
    /// Contents returned to the caller; nothing remains on disk
    Transient(Vec<InlineArtifact>),

    /// Stored filenames under the user's saved namespace
    Persisted(Vec<String>),
}

// Monotonic component of derived filenames; timestamps alone can collide
// across concurrent requests
static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

fn derived_name(username: &str, extension: &str) -> String {
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    format!(
        "{}-{}-{}.{}",
        FileStore::local_part(username),
        stamp,
        seq,
        extension
    )
}

/// Decide the fate of generated artifacts
///
/// With `save_plot` false every artifact's content is read fully into memory,
/// backing temp files are deleted, and the contents come back as the response
/// payload; durable storage is untouched. With `save_plot` true the user's
/// saved namespace is created if absent, series artifacts are written there
/// as JSON documents and image temp files are moved (renamed, not copied)
/// there under a derived unique filename; the stored names come back.
///
/// # Errors
/// * `PersistenceError` when the namespace cannot be written. If some
///   artifacts were already persisted, the error message names them, so a
///   partial persist is never silent.
pub async fn finalize(
    artifacts: Vec<PlotArtifact>,
    store: &FileStore,
    username: &str,
    save_plot: bool,
) -> Result<FinalizeOutcome, AppError> {
    if save_plot {
        persist_all(artifacts, store, username).await
    } else {
        read_back_all(artifacts).await
    }
}

// save_plot == false: inline everything, leave no trace on disk
async fn read_back_all(artifacts: Vec<PlotArtifact>) -> Result<FinalizeOutcome, AppError> {
    let mut inline = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        match artifact {
            PlotArtifact::Series(series) => {
                let data = serde_json::to_value(&series)
                    .map_err(|e| AppError::Render(format!("failed to encode series: {}", e)))?;
                inline.push(InlineArtifact {
                    series_name: series.series_name,
                    content_type: "application/json".to_string(),
                    data,
                });
            }
            PlotArtifact::Image {
                series_name,
                file,
                extension,
            } => {
                let bytes = tokio::fs::read(file.path()).await.map_err(|e| {
                    AppError::Render(format!("failed to read rendered chart: {}", e))
                })?;
                // Dropping the handle deletes the temp file
                drop(file);
                inline.push(InlineArtifact {
                    series_name,
                    content_type: format!("image/{}", extension),
                    data: serde_json::Value::String(BASE64.encode(bytes)),
                });
            }
        }
    }

    Ok(FinalizeOutcome::Transient(inline))
}

// save_plot == true: move everything under <user>/saved/
async fn persist_all(
    artifacts: Vec<PlotArtifact>,
    store: &FileStore,
    username: &str,
) -> Result<FinalizeOutcome, AppError> {
    store.ensure_saved(username).await?;

    let mut stored: Vec<String> = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let result = persist_one(artifact, store, username).await;
        match result {
            Ok(name) => stored.push(name),
            Err(err) => {
                log::error!(
                    "persisting plot for '{}' failed after {} stored: {}",
                    username,
                    stored.len(),
                    err
                );
                return Err(partial_failure(&stored, err));
            }
        }
    }

    Ok(FinalizeOutcome::Persisted(stored))
}

async fn persist_one(
    artifact: PlotArtifact,
    store: &FileStore,
    username: &str,
) -> Result<String, AppError> {
    match artifact {
        PlotArtifact::Series(series) => {
            let name = derived_name(username, "json");
            let bytes = serde_json::to_vec_pretty(&series)
                .map_err(|e| AppError::Persistence(format!("failed to encode series: {}", e)))?;
            store.write_saved(username, &name, &bytes).await
        }
        PlotArtifact::Image {
            file, extension, ..
        } => {
            let name = derived_name(username, extension);
            let dest = store.saved_path(username, &name)?;
            // Move, not copy: the temp location is dead after this
            file.persist(&dest)
                .map_err(|e| AppError::Persistence(format!("failed to move chart: {}", e.error)))?;
            Ok(name)
        }
    }
}

// Partial persistence must be surfaced, not swallowed
fn partial_failure(stored: &[String], err: AppError) -> AppError {
    if stored.is_empty() {
        err
    } else {
        AppError::Persistence(format!(
            "{}; artifacts persisted before the failure: [{}]",
            err,
            stored.join(", ")
        ))
    }
}
