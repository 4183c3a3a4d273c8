use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use axum::Json;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::web::responses::{ApiMessage, json_error};

pub const STAGING_DIR: &str = "upload";
pub const MERGED_PDF: &str = "merged.pdf";
pub const MERGED_IMAGES_PDF: &str = "merged_images.pdf";

pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
}

impl FileKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_ascii_lowercase();

        if PDF_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Image => "Image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub size: u64,
    pub kind: Option<FileKind>,
}

/// A user's directory tree: `<root>/<username>/` holds finished outputs and
/// `<root>/<username>/upload/` holds staged uploads.
#[derive(Debug, Clone)]
pub struct UserArea {
    root: PathBuf,
    staging: PathBuf,
}

impl UserArea {
    pub fn for_user(upload_root: &Path, username: &str) -> Self {
        let mut folder = sanitize_filename::sanitize(username);
        if folder.is_empty() || folder == "." || folder == ".." {
            folder = "_".to_string();
        }
        let root = upload_root.join(folder);
        let staging = root.join(STAGING_DIR);
        Self { root, staging }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn staged_path(&self, name: &str) -> PathBuf {
        self.staging.join(name)
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.staging)
            .await
            .with_context(|| format!("failed to create {}", self.staging.display()))
    }

    /// Regular files in the staging directory, sorted by name.
    pub async fn staged_files(&self) -> Result<Vec<StagedFile>> {
        let mut files = list_regular_files(&self.staging).await?;
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub async fn staged_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .staged_files()
            .await?
            .into_iter()
            .map(|file| file.name)
            .collect())
    }

    /// Regular files directly in the user's folder (finished outputs).
    pub async fn output_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = list_regular_files(&self.root)
            .await?
            .into_iter()
            .map(|file| file.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Removes every staged file and every output file, leaving an empty
    /// staging directory behind. A missing folder is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.staging).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to remove {}", self.staging.display()));
            }
        }

        for name in self.output_files().await? {
            let path = self.output_path(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("failed to remove {}", path.display()));
                }
            }
        }

        self.ensure().await
    }

    /// Deletes the whole user folder. A missing folder is not an error.
    pub async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", self.root.display())),
        }
    }

    /// Maps a requested download name onto a regular file directly inside the
    /// user's folder, or `None` if there is no such file.
    pub async fn resolve_download(&self, requested: &str) -> Option<PathBuf> {
        let sanitized = sanitize_filename::sanitize(requested);
        if sanitized.is_empty() || sanitized != requested {
            return None;
        }

        let path = self.output_path(&sanitized);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

async fn list_regular_files(dir: &Path) -> Result<Vec<StagedFile>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to list {}", dir.display()));
        }
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read entry in {}", dir.display()))?
    {
        let meta = entry
            .metadata()
            .await
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        if !meta.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        // Uploads in flight.
        if name.starts_with('.') {
            continue;
        }
        files.push(StagedFile {
            kind: FileKind::from_name(&name),
            name,
            size: meta.len(),
        });
    }

    Ok(files)
}

/// Stream a file with a standard attachment disposition.
pub async fn stream_file(
    path: &Path,
    filename: &str,
    content_type: &str,
) -> Result<Response, (StatusCode, Json<ApiMessage>)> {
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        error!(?err, file = %path.display(), "failed to read download file");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read the file.")
    })?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    let disposition = format!("attachment; filename=\"{}\"", filename);
    let disposition = HeaderValue::from_str(&disposition).map_err(|_| {
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Invalid download header.",
        )
    })?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((headers, bytes).into_response())
}
