//! Multipart handling for multimodal requests.
//!
//! The uploaded image is staged in a temporary file for the duration of the
//! request. [`TempUpload`] owns that file and removes it when dropped, so
//! every exit path of the handler cleans up.

use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;
use tempfile::NamedTempFile;

use crate::error::GatewayError;

/// Largest accepted multipart body (20MB).
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Prefix of staged upload files.
const TEMP_PREFIX: &str = "gateway-upload-";

/// Uploaded file part.
#[derive(Debug)]
pub struct UploadedFile {
    /// Client-side file name, if sent.
    pub file_name: Option<String>,
    /// Raw file content.
    pub bytes: Bytes,
}

impl UploadedFile {
    /// True when the file name maps to an `image/*` type.
    #[must_use]
    pub fn looks_like_image(&self) -> bool {
        self.file_name.as_deref().is_some_and(is_image_name)
    }
}

/// Parsed `/generate-multimodal` form.
#[derive(Debug)]
pub struct MultimodalForm {
    /// Prompt text.
    pub prompt: String,
    /// Requested model, if any.
    pub model: Option<String>,
    /// Image part.
    pub file: UploadedFile,
}

/// Read the `prompt`, `model` and `file` fields. Unknown fields are skipped.
///
/// # Errors
/// Returns [`GatewayError::MalformedUpload`] if the body cannot be read or a
/// required field is missing.
pub async fn read_form(multipart: &mut Multipart) -> Result<MultimodalForm, GatewayError> {
    let mut prompt = None;
    let mut model = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::MalformedUpload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => prompt = Some(read_text(field).await?),
            "model" => model = Some(read_text(field).await?),
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::MalformedUpload(format!("failed to read file: {e}")))?;
                file = Some(UploadedFile { file_name, bytes });
            }
            other => tracing::debug!("ignoring multipart field {other:?}"),
        }
    }

    Ok(MultimodalForm {
        prompt: prompt.ok_or_else(|| missing("prompt"))?,
        model: model.filter(|m| !m.trim().is_empty()),
        file: file.ok_or_else(|| missing("file"))?,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, GatewayError> {
    field
        .text()
        .await
        .map_err(|e| GatewayError::MalformedUpload(e.to_string()))
}

fn missing(field: &str) -> GatewayError {
    GatewayError::MalformedUpload(format!("missing field '{field}'"))
}

/// True when `name` has an image extension.
#[must_use]
pub fn is_image_name(name: &str) -> bool {
    mime_guess::from_path(name)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE)
}

/// Upload staged on disk, deleted on drop.
#[derive(Debug)]
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    /// Write `bytes` to a fresh file in `dir`, keeping the original extension.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub async fn stage(dir: &Path, file_name: Option<&str>, bytes: &[u8]) -> std::io::Result<Self> {
        let suffix = file_name.map(extension_suffix).unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(dir)?;

        let staged = Self { file };
        tokio::fs::write(staged.path(), bytes).await?;
        tracing::debug!(path = %staged.path().display(), size = bytes.len(), "staged upload");
        Ok(staged)
    }

    /// Location of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the staged content back.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }
}

/// `.ext` for names with a plain alphanumeric extension, empty otherwise.
fn extension_suffix(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
