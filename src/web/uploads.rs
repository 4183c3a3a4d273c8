use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use axum::extract::Multipart;
use tokio::{fs::File, io::AsyncWriteExt};
use uuid::Uuid;

/// Result type used by the shared upload helpers.
pub type UploadResult<T> = Result<T, UploadError>;

/// Error returned when validating or persisting uploaded files.
#[derive(Debug)]
pub struct UploadError {
    message: String,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UploadError {}

/// Configuration describing the expectations for a single multipart file field.
#[derive(Debug, Clone, Copy)]
pub struct FileFieldConfig<'a> {
    pub field_name: &'a str,
    pub allowed_extensions: &'a [&'a str],
    pub max_files: usize,
    pub min_files: usize,
}

impl<'a> FileFieldConfig<'a> {
    pub fn new(field_name: &'a str, allowed_extensions: &'a [&'a str], max_files: usize) -> Self {
        Self {
            field_name,
            allowed_extensions,
            max_files,
            min_files: if max_files == 0 { 0 } else { 1 },
        }
    }

    pub fn with_min_files(mut self, min_files: usize) -> Self {
        self.min_files = min_files;
        self
    }
}

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub field_name: String,
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

/// Aggregated output of the shared upload processor.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub files: Vec<SavedFile>,
}

impl UploadOutcome {
    pub fn files_for<'a>(&'a self, field_name: &str) -> impl Iterator<Item = &'a SavedFile> {
        self.files
            .iter()
            .filter(move |file| file.field_name == field_name)
    }
}

/// Ensures the destination directory exists.
pub async fn ensure_directory(path: &Path) -> UploadResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| UploadError::new(format!("cannot create upload directory: {err}")))
}

/// Parses multipart form data, persisting files into `dest_dir` under their
/// sanitized original names. An upload whose name already exists replaces
/// the earlier file. Non-file fields are ignored.
///
/// Files are received under hidden temporary names and only moved into place
/// once the whole form has been accepted, so a rejected form leaves
/// `dest_dir` as it was.
pub async fn process_upload_form(
    mut multipart: Multipart,
    dest_dir: &Path,
    field_configs: &[FileFieldConfig<'_>],
) -> UploadResult<UploadOutcome> {
    ensure_directory(dest_dir).await?;

    let mut field_states = HashMap::new();
    for config in field_configs {
        if config.max_files == 0 {
            return Err(UploadError::new(format!(
                "field `{}` must allow at least one file",
                config.field_name
            )));
        }
        if config.min_files > config.max_files {
            return Err(UploadError::new(format!(
                "field `{}` has min_files greater than max_files",
                config.field_name
            )));
        }
        field_states.insert(
            config.field_name.to_string(),
            FieldState {
                config: *config,
                count: 0,
            },
        );
    }

    let mut pending: Vec<PendingFile> = Vec::new();
    let received = receive_files(&mut multipart, dest_dir, &mut field_states, &mut pending).await;

    let checked = received.and_then(|()| {
        for state in field_states.values() {
            if state.count < state.config.min_files {
                return Err(UploadError::new(format!(
                    "field `{}` needs at least {} file(s)",
                    state.config.field_name, state.config.min_files
                )));
            }
        }
        Ok(())
    });

    if let Err(err) = checked {
        discard_pending(&pending).await;
        return Err(err);
    }

    for (index, file) in pending.iter().enumerate() {
        if let Err(err) = tokio::fs::rename(&file.temp_path, &file.saved.stored_path).await {
            discard_pending(&pending[index..]).await;
            return Err(UploadError::new(format!("failed to save file: {err}")));
        }
    }

    Ok(UploadOutcome {
        files: pending.into_iter().map(|file| file.saved).collect(),
    })
}

/// A received upload still sitting under its temporary name.
struct PendingFile {
    temp_path: PathBuf,
    saved: SavedFile,
}

async fn receive_files(
    multipart: &mut Multipart,
    dest_dir: &Path,
    field_states: &mut HashMap<String, FieldState<'_>>,
    pending: &mut Vec<PendingFile>,
) -> UploadResult<()> {
    let allowed_lookup: HashMap<String, HashSet<String>> = field_states
        .iter()
        .map(|(name, state)| {
            let set = state
                .config
                .allowed_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect();
            (name.clone(), set)
        })
        .collect();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::new(format!("failed to parse upload form: {err}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        let file_name = match field.file_name() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            // Plain form fields and empty file inputs.
            _ => continue,
        };

        let Some(state) = field_states.get_mut(field_name.as_str()) else {
            return Err(UploadError::new(format!(
                "unsupported file field `{field_name}`"
            )));
        };

        if state.count >= state.config.max_files {
            return Err(UploadError::new(format!(
                "field `{}` accepts at most {} files",
                state.config.field_name, state.config.max_files
            )));
        }

        let stored_name = sanitize_filename::sanitize(&file_name)
            .trim_start_matches('.')
            .to_string();
        let extension = Path::new(&stored_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if stored_name.is_empty() {
            return Err(UploadError::new(format!(
                "`{file_name}` is not a usable file name"
            )));
        }

        let allowed = allowed_lookup
            .get(field_name.as_str())
            .map(|set| set.is_empty() || set.contains(&extension))
            .unwrap_or(false);

        if !allowed {
            return Err(UploadError::new(format!(
                "field `{}` does not accept `.{extension}` files",
                state.config.field_name
            )));
        }

        // Stored names never start with a dot, so this cannot collide.
        let temp_path = dest_dir.join(format!(".upload-{}.part", Uuid::new_v4()));
        let mut file = File::create(&temp_path)
            .await
            .map_err(|err| UploadError::new(format!("failed to save file: {err}")))?;

        let mut total_bytes: u64 = 0;
        let written: UploadResult<()> = async {
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|err| UploadError::new(format!("failed to read upload data: {err}")))?
            {
                total_bytes += chunk.len() as u64;
                file.write_all(&chunk)
                    .await
                    .map_err(|err| UploadError::new(format!("failed to write file: {err}")))?;
            }
            file.flush()
                .await
                .map_err(|err| UploadError::new(format!("failed to flush file: {err}")))
        }
        .await;
        drop(file);

        if let Err(err) = written {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err);
        }

        pending.push(PendingFile {
            temp_path,
            saved: SavedFile {
                field_name: state.config.field_name.to_string(),
                original_name: file_name,
                stored_path: dest_dir.join(&stored_name),
                stored_name,
                file_size: total_bytes,
            },
        });

        state.count += 1;
    }

    Ok(())
}

async fn discard_pending(pending: &[PendingFile]) {
    for file in pending {
        let _ = tokio::fs::remove_file(&file.temp_path).await;
    }
}

#[derive(Clone, Copy, Debug)]
struct FieldState<'a> {
    config: FileFieldConfig<'a>,
    count: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header},
    };
    use tempfile::tempdir;

    const BOUNDARY: &str = "workbench-boundary";

    /// Builds a `Multipart` extractor from `(field, filename, bytes)` parts.
    pub(crate) async fn multipart_from(parts: &[(&str, Option<&str>, &[u8])]) -> Multipart {
        let mut body = Vec::new();
        for (field, filename, bytes) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        Multipart::from_request(request, &()).await.unwrap()
    }

    fn pdf_field() -> FileFieldConfig<'static> {
        FileFieldConfig::new("file", &["pdf"], 10)
    }

    #[tokio::test]
    async fn stores_files_under_sanitized_names() {
        let dir = tempdir().unwrap();
        let multipart = multipart_from(&[
            ("file", Some("../../escape.pdf"), b"%PDF-1.5"),
            ("note", None, b"ignored"),
        ])
        .await;

        let outcome = process_upload_form(multipart, dir.path(), &[pdf_field()])
            .await
            .expect("upload");

        let saved: Vec<_> = outcome.files_for("file").collect();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].original_name, "../../escape.pdf");
        assert_eq!(saved[0].stored_name, "escape.pdf");
        assert!(saved[0].stored_path.starts_with(dir.path()));
        assert_eq!(saved[0].file_size, 8);
        assert_eq!(std::fs::read(&saved[0].stored_path).unwrap(), b"%PDF-1.5");
    }

    #[tokio::test]
    async fn rejects_disallowed_extension() {
        let dir = tempdir().unwrap();
        let multipart = multipart_from(&[("file", Some("notes.txt"), b"hello")]).await;
        let err = process_upload_form(multipart, dir.path(), &[pdf_field()])
            .await
            .unwrap_err();
        assert!(err.message().contains(".txt"));
        assert!(!dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn empty_file_input_counts_as_missing() {
        let dir = tempdir().unwrap();
        let multipart = multipart_from(&[("file", Some(""), b"")]).await;
        let err = process_upload_form(multipart, dir.path(), &[pdf_field()])
            .await
            .unwrap_err();
        assert!(err.message().contains("at least 1"));
    }

    #[tokio::test]
    async fn same_name_overwrites_previous_upload() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"old").unwrap();
        let multipart = multipart_from(&[("file", Some("a.pdf"), b"new")]).await;
        process_upload_form(multipart, dir.path(), &[pdf_field()])
            .await
            .expect("upload");
        assert_eq!(std::fs::read(dir.path().join("a.pdf")).unwrap(), b"new");
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn rejected_form_stores_nothing() {
        let dir = tempdir().unwrap();
        let multipart = multipart_from(&[
            ("file", Some("b.pdf"), b"%PDF-b"),
            ("file", Some("a.pdf"), b"%PDF-a"),
            ("file", Some("notes.txt"), b"hello"),
        ])
        .await;

        process_upload_form(multipart, dir.path(), &[pdf_field()])
            .await
            .expect_err("txt is not accepted");
        assert!(dir_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn rejected_form_keeps_earlier_copy_of_same_name() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"old").unwrap();
        let multipart = multipart_from(&[
            ("file", Some("a.pdf"), b"new"),
            ("file", Some("notes.txt"), b"hello"),
        ])
        .await;

        process_upload_form(multipart, dir.path(), &[pdf_field()])
            .await
            .expect_err("txt is not accepted");
        assert_eq!(std::fs::read(dir.path().join("a.pdf")).unwrap(), b"old");
        assert_eq!(dir_names(dir.path()), vec!["a.pdf".to_string()]);
    }
}
