use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;

use crate::error::AppError;

/// Metadata view over one file in a user's saved namespace
#[derive(Debug, Serialize)]
pub struct SavedFile {
    pub filename: String,

    /// Size in bytes
    pub size: u64,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Per-user namespaced directory abstraction
///
/// The store owns every byte the application keeps on disk. Each user gets
/// `<root>/<local-part>` (the part of the email before `@`, lowercased): raw
/// uploads live at that root, generated artifacts under its `saved/` child.
/// Temporary render output goes to a scratch directory on the same
/// filesystem so finalizing a plot is a rename, never a copy.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

const SAVED_DIR: &str = "saved";
const SCRATCH_DIR: &str = "tmp";

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the data root and the scratch directory if they don't exist
    pub async fn init(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to create data root: {}", e)))?;
        fs::create_dir_all(self.scratch_dir())
            .await
            .map_err(|e| AppError::Persistence(format!("failed to create scratch dir: {}", e)))?;
        Ok(())
    }

    /// Directory for temporary artifacts, on the same filesystem as the data
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    /// Directory name a username maps onto: local part, lowercased
    pub fn local_part(username: &str) -> String {
        username
            .split('@')
            .next()
            .unwrap_or(username)
            .to_lowercase()
    }

    pub fn user_root(&self, username: &str) -> PathBuf {
        self.root.join(Self::local_part(username))
    }

    fn saved_dir(&self, username: &str) -> PathBuf {
        self.user_root(username).join(SAVED_DIR)
    }

    /// Create the user's namespace (and return its path)
    pub async fn ensure_user(&self, username: &str) -> Result<PathBuf, AppError> {
        let dir = self.user_root(username);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to create user directory: {}", e)))?;
        Ok(dir)
    }

    /// Create the user's saved namespace (and return its path)
    pub async fn ensure_saved(&self, username: &str) -> Result<PathBuf, AppError> {
        let dir = self.saved_dir(username);
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Persistence(format!("failed to create saved directory: {}", e))
        })?;
        Ok(dir)
    }

    /// Persist a raw upload at the root of the user's namespace
    ///
    /// Uploads are retained indefinitely and never mutated, only deleted
    /// through the delete endpoint.
    pub async fn store_upload(
        &self,
        username: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, AppError> {
        let name = checked_name(original_name)?;
        let dir = self.ensure_user(username).await?;
        let path = dir.join(name);
        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to store upload: {}", e)))?;
        Ok(path)
    }

    /// Write a document (e.g. the profile) at the root of the user's namespace
    pub async fn write_user_doc(
        &self,
        username: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(), AppError> {
        let name = checked_name(filename)?;
        let dir = self.ensure_user(username).await?;
        fs::write(dir.join(name), bytes)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to write '{}': {}", filename, e)))
    }

    /// Read a document from the root of the user's namespace
    pub async fn read_user_doc(&self, username: &str, filename: &str) -> Result<Vec<u8>, AppError> {
        let name = checked_name(filename)?;
        let path = self.user_root(username).join(name);
        fs::read(&path)
            .await
            .map_err(|_| AppError::NotFound(format!("file '{}' not found", filename)))
    }

    /// List the user's saved files with name, size and creation time
    ///
    /// A user namespace with no `saved/` directory yet lists as empty; a
    /// missing namespace altogether is `NotFound`.
    pub async fn list_saved(&self, username: &str) -> Result<Vec<SavedFile>, AppError> {
        let user_root = self.user_root(username);
        if !fs::try_exists(&user_root).await.unwrap_or(false) {
            return Err(AppError::NotFound(format!(
                "no files for user '{}'",
                username
            )));
        }

        let dir = self.saved_dir(username);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::Persistence(format!("failed to read saved directory: {}", e)))?
        {
            let metadata = match entry.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            files.push(SavedFile {
                filename: entry.file_name().to_string_lossy().to_string(),
                size: metadata.len(),
                created_at: created,
            });
        }

        // Deterministic listing order
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// Read one saved file's content bytes
    pub async fn read_saved(&self, username: &str, filename: &str) -> Result<Vec<u8>, AppError> {
        let name = checked_name(filename)?;
        let path = self.saved_dir(username).join(name);
        fs::read(&path)
            .await
            .map_err(|_| AppError::NotFound(format!("file '{}' not found", filename)))
    }

    /// Write bytes as a new saved file, returning the stored name
    pub async fn write_saved(
        &self,
        username: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let name = checked_name(filename)?;
        let path = self.saved_dir(username).join(name);
        fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to write '{}': {}", filename, e)))?;
        Ok(name.to_string())
    }

    /// Full path a saved filename would occupy (for temp-file adoption)
    pub fn saved_path(&self, username: &str, filename: &str) -> Result<PathBuf, AppError> {
        let name = checked_name(filename)?;
        Ok(self.saved_dir(username).join(name))
    }

    /// Rename a saved file, preserving the extension of the old name
    ///
    /// Returns the full new filename. The new name supplied by the caller is
    /// taken as a stem; the old file's extension is appended to it.
    pub async fn rename_saved(
        &self,
        username: &str,
        old_filename: &str,
        new_stem: &str,
    ) -> Result<String, AppError> {
        let old_name = checked_name(old_filename)?;
        let new_stem = checked_name(new_stem)?;

        let new_name = match Path::new(old_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", new_stem, ext),
            None => new_stem.to_string(),
        };

        let dir = self.saved_dir(username);
        let old_path = dir.join(old_name);
        if !fs::try_exists(&old_path).await.unwrap_or(false) {
            return Err(AppError::NotFound(format!(
                "file '{}' not found",
                old_filename
            )));
        }

        fs::rename(&old_path, dir.join(&new_name))
            .await
            .map_err(|e| AppError::Persistence(format!("failed to rename file: {}", e)))?;
        Ok(new_name)
    }

    /// Delete a saved file
    pub async fn delete_saved(&self, username: &str, filename: &str) -> Result<(), AppError> {
        let name = checked_name(filename)?;
        let path = self.saved_dir(username).join(name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(AppError::NotFound(format!("file '{}' not found", filename)));
        }
        fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Persistence(format!("failed to delete file: {}", e)))
    }
}

// Filenames must stay inside the namespace they belong to
fn checked_name(name: &str) -> Result<&str, AppError> {
    if name.is_empty() {
        return Err(AppError::Validation("filename must not be empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::Validation(format!(
            "invalid filename '{}'",
            name
        )));
    }
    Ok(name)
}
