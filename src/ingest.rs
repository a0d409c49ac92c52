use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::UploadLimits;
use crate::db::{NewPhoto, Photo, PhotoRepository};
use crate::error::{PhotoError, PhotoResult};
use crate::metadata_extractor::MetadataExtractor;
use crate::mimetype_detector;
use crate::storage_layout::StorageLayout;

/// One file part of an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    /// Bytes the client actually sent. Larger than `data.len()` when the
    /// part was cut off at the size limit.
    pub size: u64,
}

impl IncomingFile {
    pub fn new(original_name: impl Into<String>, content_type: Option<&str>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self {
            original_name: original_name.into(),
            content_type: content_type.map(str::to_string),
            data,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedType,
    TooLarge { size: u64, limit: u64 },
    Storage(String),
    Persistence(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedType => {
                write!(f, "Only image files are allowed (JPEG, PNG, GIF, WebP, HEIC)")
            }
            SkipReason::TooLarge { size, limit } => {
                write!(f, "File is {} bytes, the limit is {} bytes", size, limit)
            }
            SkipReason::Storage(msg) => write!(f, "Could not store file: {}", msg),
            SkipReason::Persistence(msg) => write!(f, "Could not record file: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub original_name: String,
    #[serde(skip)]
    pub reason_kind: SkipReason,
    pub reason: String,
}

impl FailedFile {
    fn new(original_name: &str, reason: SkipReason) -> Self {
        Self {
            original_name: original_name.to_string(),
            reason: reason.to_string(),
            reason_kind: reason,
        }
    }
}

/// Result of a batch: the photos that made it, in request order, and the files that did not.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub photos: Vec<Photo>,
    pub failures: Vec<FailedFile>,
}

struct ValidatedFile {
    file: IncomingFile,
    extension: String,
    mime_type: String,
}

/// Turns uploaded files into catalogued photos.
///
/// Files are handled one after another. A file that fails after it was written
/// is removed again, so the catalog and the content directory stay in step.
pub struct Ingestor {
    repository: Arc<dyn PhotoRepository>,
    storage: StorageLayout,
    limits: UploadLimits,
}

impl Ingestor {
    pub fn new(
        repository: Arc<dyn PhotoRepository>,
        storage: StorageLayout,
        limits: UploadLimits,
    ) -> Self {
        Self {
            repository,
            storage,
            limits,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    pub async fn ingest_batch(&self, files: Vec<IncomingFile>) -> PhotoResult<BatchOutcome> {
        self.ingest_batch_at(files, Utc::now()).await
    }

    /// Same as [`Ingestor::ingest_batch`] with an explicit receive time, which
    /// decides the storage directory and the fallback capture date.
    pub async fn ingest_batch_at(
        &self,
        files: Vec<IncomingFile>,
        received_at: DateTime<Utc>,
    ) -> PhotoResult<BatchOutcome> {
        if files.is_empty() {
            return Err(PhotoError::Validation("No files uploaded".to_string()));
        }
        if files.len() > self.limits.max_files {
            return Err(PhotoError::PayloadTooLarge(format!(
                "At most {} files can be uploaded at once",
                self.limits.max_files
            )));
        }

        let mut outcome = BatchOutcome::default();
        let mut accepted = Vec::with_capacity(files.len());

        for file in files {
            match self.validate(file) {
                Ok(validated) => accepted.push(validated),
                Err(failure) => {
                    warn!(
                        "Rejected upload {}: {}",
                        failure.original_name, failure.reason
                    );
                    outcome.failures.push(failure);
                }
            }
        }

        if accepted.is_empty() {
            let any_too_large = outcome
                .failures
                .iter()
                .any(|f| matches!(f.reason_kind, SkipReason::TooLarge { .. }));
            return Err(if any_too_large {
                PhotoError::PayloadTooLarge(format!(
                    "Each file must be at most {} bytes",
                    self.limits.max_file_size
                ))
            } else {
                PhotoError::Validation(
                    "No valid image files uploaded (JPEG, PNG, GIF, WebP, HEIC)".to_string(),
                )
            });
        }

        for validated in accepted {
            let original_name = validated.file.original_name.clone();
            match self.store(validated, received_at).await {
                Ok(photo) => outcome.photos.push(photo),
                Err(reason) => {
                    error!("Failed to ingest {}: {}", original_name, reason);
                    outcome.failures.push(FailedFile::new(&original_name, reason));
                }
            }
        }

        info!(
            "Ingested {} photo(s), skipped {}",
            outcome.photos.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn validate(&self, file: IncomingFile) -> Result<ValidatedFile, FailedFile> {
        let extension = mimetype_detector::allowed_extension(&file.original_name);
        let mime_type = file
            .content_type
            .as_deref()
            .and_then(mimetype_detector::from_content_type);

        let (extension, mime_type) = match (extension, mime_type) {
            (Some(extension), Some(mime_type)) => (extension, mime_type),
            _ => {
                return Err(FailedFile::new(
                    &file.original_name,
                    SkipReason::UnsupportedType,
                ))
            }
        };

        if file.size > self.limits.max_file_size {
            return Err(FailedFile::new(
                &file.original_name,
                SkipReason::TooLarge {
                    size: file.size,
                    limit: self.limits.max_file_size,
                },
            ));
        }

        Ok(ValidatedFile {
            file,
            extension,
            mime_type: mime_type.to_string(),
        })
    }

    async fn store(
        &self,
        validated: ValidatedFile,
        received_at: DateTime<Utc>,
    ) -> Result<Photo, SkipReason> {
        let ValidatedFile {
            file,
            extension,
            mime_type,
        } = validated;

        let location = self
            .storage
            .allocate(received_at, &extension)
            .await
            .map_err(|e| SkipReason::Storage(e.to_string()))?;

        if let Err(e) = tokio::fs::write(&location.path, &file.data).await {
            self.storage.discard(&location.path).await;
            return Err(SkipReason::Storage(e.to_string()));
        }

        let written = match tokio::fs::read(&location.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.storage.discard(&location.path).await;
                return Err(SkipReason::Storage(e.to_string()));
            }
        };
        let metadata = MetadataExtractor::extract(&written);

        let new_photo = NewPhoto {
            filename: location.filename.clone(),
            original_name: file.original_name,
            file_path: location.path.to_string_lossy().to_string(),
            file_size: written.len() as i64,
            mime_type,
            capture_date: Some(metadata.capture_date.unwrap_or(received_at.date_naive())),
            width: metadata.width.map(i64::from),
            height: metadata.height.map(i64::from),
            camera_make: metadata.camera_make,
            camera_model: metadata.camera_model,
            upload_date: received_at,
        };

        match self.repository.insert(&new_photo).await {
            Ok(id) => Ok(new_photo.into_photo(id)),
            Err(e) => {
                self.storage.discard(&location.path).await;
                Err(SkipReason::Persistence(e.to_string()))
            }
        }
    }

    /// Deletes a photo's file and record. A file that cannot be removed is
    /// logged and left behind; the record is removed regardless.
    pub async fn delete_photo(&self, id: i64) -> PhotoResult<bool> {
        let Some(photo) = self.repository.get_by_id(id).await? else {
            return Ok(false);
        };

        if !self.storage.discard(Path::new(&photo.file_path)).await {
            warn!(
                "File {} for photo {} is now orphaned",
                photo.file_path, photo.id
            );
        }

        self.repository.delete_by_id(id).await
    }
}
