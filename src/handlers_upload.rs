use bytes::{Buf, BufMut};
use futures_util::TryStreamExt;
use serde::Serialize;
use std::sync::Arc;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

use crate::config::FailureReporting;
use crate::handlers_photo::PhotoResponse;
use crate::ingest::{BatchOutcome, FailedFile, IncomingFile, Ingestor};
use crate::rate_limit::{rate_limit, RateLimiter};
use crate::warp_helpers::{reject_photo_error, validation, with_ingestor};

/// Multipart field that carries the images.
pub const UPLOAD_FIELD: &str = "photos";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub photos: Vec<PhotoResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Vec<FailedFile>>,
}

impl UploadResponse {
    pub fn new(outcome: BatchOutcome, reporting: FailureReporting) -> Self {
        let failed = match reporting {
            FailureReporting::Silent => None,
            FailureReporting::Detailed => Some(outcome.failures),
        };
        Self {
            success: true,
            message: format!("Successfully uploaded {} photo(s)", outcome.photos.len()),
            photos: outcome.photos.into_iter().map(PhotoResponse::from).collect(),
            failed,
        }
    }
}

/// Buffers one part. Bytes past `max_file_size` are counted but not kept, so an
/// oversized file can be reported without holding all of it in memory.
async fn read_part(part: Part, max_file_size: u64) -> Result<IncomingFile, Rejection> {
    let original_name = part.filename().unwrap_or("").to_string();
    let content_type = part.content_type().map(str::to_string);

    let mut data = Vec::new();
    let mut size: u64 = 0;
    let mut stream = Box::pin(part.stream());
    while let Some(mut chunk) = stream.try_next().await.map_err(|e| {
        log::warn!("Failed to read upload part {}: {}", original_name, e);
        validation(format!("Malformed multipart body: {}", e))
    })? {
        let len = chunk.remaining() as u64;
        if size + len <= max_file_size {
            data.put(&mut chunk);
        }
        size += len;
    }

    Ok(IncomingFile {
        original_name,
        content_type,
        data,
        size,
    })
}

async fn collect_files(form: FormData, max_file_size: u64) -> Result<Vec<IncomingFile>, Rejection> {
    let mut files = Vec::new();
    let mut parts = Box::pin(form);
    while let Some(part) = parts.try_next().await.map_err(|e| {
        log::warn!("Failed to read multipart body: {}", e);
        validation(format!("Malformed multipart body: {}", e))
    })? {
        if part.name() != UPLOAD_FIELD {
            log::debug!("Ignoring multipart field {}", part.name());
            continue;
        }
        files.push(read_part(part, max_file_size).await?);
    }
    Ok(files)
}

pub async fn upload_photos(
    form: FormData,
    ingestor: Arc<Ingestor>,
    reporting: FailureReporting,
) -> Result<impl Reply, Rejection> {
    let files = collect_files(form, ingestor.limits().max_file_size).await?;
    log::info!("Received upload with {} file(s)", files.len());

    let outcome = ingestor
        .ingest_batch(files)
        .await
        .map_err(reject_photo_error)?;

    Ok(warp::reply::json(&UploadResponse::new(outcome, reporting)))
}

/// `upload_limiter` counts upload requests only, on top of the `/api` wide limit.
pub fn build_upload_routes(
    ingestor: Arc<Ingestor>,
    reporting: FailureReporting,
    upload_limiter: RateLimiter,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let max_request_size = ingestor.limits().max_request_size();

    warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::end())
        .and(warp::post())
        .and(rate_limit(upload_limiter))
        .and(warp::multipart::form().max_length(max_request_size))
        .and(with_ingestor(ingestor))
        .and(warp::any().map(move || reporting))
        .and_then(upload_photos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::SkipReason;

    fn outcome() -> BatchOutcome {
        let photo = crate::db::tests::sample_photo(3, None).into_photo(3);
        BatchOutcome {
            photos: vec![photo],
            failures: vec![FailedFile {
                original_name: "notes.txt".to_string(),
                reason_kind: SkipReason::UnsupportedType,
                reason: SkipReason::UnsupportedType.to_string(),
            }],
        }
    }

    #[test]
    fn test_silent_response_omits_failures() {
        let json =
            serde_json::to_value(UploadResponse::new(outcome(), FailureReporting::Silent)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Successfully uploaded 1 photo(s)");
        assert_eq!(json["photos"].as_array().unwrap().len(), 1);
        assert_eq!(json["photos"][0]["url"], "/api/photos/3/image");
        assert!(json.get("failed").is_none());
    }

    #[test]
    fn test_detailed_response_lists_failures() {
        let json = serde_json::to_value(UploadResponse::new(outcome(), FailureReporting::Detailed))
            .unwrap();

        let failed = json["failed"].as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["originalName"], "notes.txt");
        assert!(failed[0]["reason"].is_string());
    }
}
