use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

use crate::db::{
    Catalog, PageRequest, Pagination, Photo, PhotoFilter, PhotoListQuery, PhotoRepository,
    SortColumn, SortOrder,
};
use crate::ingest::Ingestor;
use crate::warp_helpers::{
    not_found, parse_photo_id, reject_photo_error, validation, with_catalog, with_ingestor,
};

const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub order_by: Option<String>,
    pub order: Option<String>,
}

impl PhotoQuery {
    pub fn to_list_query(&self) -> Result<PhotoListQuery, Rejection> {
        Ok(PhotoListQuery {
            filter: PhotoFilter {
                start_date: parse_date_param("startDate", self.start_date.as_deref())?,
                end_date: parse_date_param("endDate", self.end_date.as_deref())?,
            },
            page: PageRequest::new(self.page, self.limit),
            sort: SortColumn::parse(self.order_by.as_deref()),
            order: SortOrder::parse(self.order.as_deref()),
        })
    }
}

fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, Rejection> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| validation(format!("{} must be a date in YYYY-MM-DD format", name))),
    }
}

/// A photo as clients see it: the record plus where to fetch its bytes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResponse {
    #[serde(flatten)]
    pub photo: Photo,
    pub url: String,
    pub thumbnail_url: String,
}

impl From<Photo> for PhotoResponse {
    fn from(photo: Photo) -> Self {
        Self {
            url: photo.image_url(),
            thumbnail_url: photo.thumbnail_url(),
            photo,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhotosResponse {
    pub success: bool,
    pub data: Vec<PhotoResponse>,
    pub pagination: Pagination,
}

pub async fn list_photos(query: PhotoQuery, catalog: Catalog) -> Result<impl Reply, Rejection> {
    let list_query = query.to_list_query()?;
    let page = catalog
        .query(&list_query)
        .await
        .map_err(reject_photo_error)?;

    Ok(warp::reply::json(&PhotosResponse {
        success: true,
        data: page.photos.into_iter().map(PhotoResponse::from).collect(),
        pagination: page.pagination,
    }))
}

async fn find_photo(catalog: &Catalog, raw_id: &str) -> Result<Photo, Rejection> {
    let id = parse_photo_id(raw_id)?;
    catalog.require(id).await.map_err(reject_photo_error)
}

pub async fn get_photo(photo_id: String, catalog: Catalog) -> Result<impl Reply, Rejection> {
    let photo = find_photo(&catalog, &photo_id).await?;
    Ok(warp::reply::json(&json!({
        "success": true,
        "data": PhotoResponse::from(photo),
    })))
}

pub async fn get_photo_image(photo_id: String, catalog: Catalog) -> Result<impl Reply, Rejection> {
    let photo = find_photo(&catalog, &photo_id).await?;

    match tokio::fs::read(&photo.file_path).await {
        Ok(file_data) => {
            let reply = warp::reply::with_header(file_data, "content-type", photo.mime_type);
            Ok(warp::reply::with_header(
                reply,
                "cache-control",
                IMAGE_CACHE_CONTROL,
            ))
        }
        Err(e) => {
            log::warn!(
                "Photo {} has no readable file at {}: {}",
                photo.id,
                photo.file_path,
                e
            );
            Err(not_found("Photo file not found"))
        }
    }
}

/// No resized variants are generated; the thumbnail is the original image.
pub async fn get_photo_thumbnail(
    photo_id: String,
    catalog: Catalog,
) -> Result<impl Reply, Rejection> {
    log::debug!("Thumbnail requested for photo {}", photo_id);
    get_photo_image(photo_id, catalog).await
}

pub async fn delete_photo(
    photo_id: String,
    ingestor: Arc<Ingestor>,
) -> Result<impl Reply, Rejection> {
    let id = parse_photo_id(&photo_id)?;

    if ingestor.delete_photo(id).await.map_err(reject_photo_error)? {
        log::info!("Deleted photo {}", id);
        Ok(warp::reply::json(&json!({
            "success": true,
            "message": "Photo deleted",
        })))
    } else {
        Err(not_found("Photo not found"))
    }
}

pub fn build_photo_routes(
    catalog: Catalog,
    ingestor: Arc<Ingestor>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let photos = warp::path("api").and(warp::path("photos"));

    let list = photos
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<PhotoQuery>())
        .and(with_catalog(catalog.clone()))
        .and_then(list_photos);

    let get = photos
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_catalog(catalog.clone()))
        .and_then(get_photo);

    let image = photos
        .and(warp::path::param::<String>())
        .and(warp::path("image"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_catalog(catalog.clone()))
        .and_then(get_photo_image);

    let thumbnail = photos
        .and(warp::path::param::<String>())
        .and(warp::path("thumbnail"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_catalog(catalog))
        .and_then(get_photo_thumbnail);

    let delete = photos
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_ingestor(ingestor))
        .and_then(delete_photo);

    list.or(get).or(image).or(thumbnail).or(delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadLimits;
    use crate::db::create_in_memory_pool;
    use crate::ingest::IncomingFile;
    use crate::storage_layout::StorageLayout;
    use crate::warp_helpers::{NotFoundError, ValidationError};
    use tempfile::TempDir;
    use warp::http::StatusCode;

    async fn setup() -> (TempDir, Catalog, Arc<Ingestor>) {
        let temp = TempDir::new().unwrap();
        let catalog = Catalog::new(create_in_memory_pool().await.unwrap());
        let ingestor = Arc::new(Ingestor::new(
            Arc::new(catalog.clone()),
            StorageLayout::new(temp.path()),
            UploadLimits::default(),
        ));
        (temp, catalog, ingestor)
    }

    async fn upload_one(ingestor: &Ingestor, body: &[u8]) -> Photo {
        let outcome = ingestor
            .ingest_batch(vec![IncomingFile::new(
                "photo.png",
                Some("image/png"),
                body.to_vec(),
            )])
            .await
            .unwrap();
        outcome.photos.into_iter().next().unwrap()
    }

    #[test]
    fn test_query_defaults() {
        let query = PhotoQuery::default().to_list_query().unwrap();
        assert_eq!(query, PhotoListQuery::default());
    }

    #[test]
    fn test_query_parsing() {
        let query = PhotoQuery {
            page: Some(0),
            limit: Some(500),
            start_date: Some("2024-01-01".into()),
            end_date: Some("".into()),
            order_by: Some("fileSize".into()),
            order: Some("asc".into()),
        }
        .to_list_query()
        .unwrap();

        assert_eq!(query.page.page, 1);
        assert_eq!(query.page.limit, 100);
        assert_eq!(query.filter.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(query.filter.end_date, None);
        assert_eq!(query.sort, SortColumn::FileSize);
        assert_eq!(query.order, SortOrder::Asc);
    }

    #[test]
    fn test_unknown_ordering_falls_back() {
        let query = PhotoQuery {
            order_by: Some("filename; DROP TABLE photos".into()),
            order: Some("sideways".into()),
            ..Default::default()
        }
        .to_list_query()
        .unwrap();

        assert_eq!(query.sort, SortColumn::UploadDate);
        assert_eq!(query.order, SortOrder::Desc);
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let err = PhotoQuery {
            end_date: Some("2024/01/31".into()),
            ..Default::default()
        }
        .to_list_query()
        .unwrap_err();

        assert!(err.find::<ValidationError>().is_some());
    }

    #[test]
    fn test_photo_response_json() {
        let photo = crate::db::tests::sample_photo(1, None).into_photo(7);
        let json = serde_json::to_value(PhotoResponse::from(photo)).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["url"], "/api/photos/7/image");
        assert_eq!(json["thumbnailUrl"], "/api/photos/7/thumbnail");
        assert!(json.get("originalName").is_some());
        assert!(json.get("filePath").is_none());
    }

    #[tokio::test]
    async fn test_get_photo_statuses() {
        let (_temp, catalog, ingestor) = setup().await;
        let photo = upload_one(&ingestor, b"png bytes").await;

        let reply = get_photo(photo.id.to_string(), catalog.clone()).await.unwrap();
        assert_eq!(reply.into_response().status(), StatusCode::OK);

        let missing = get_photo("9999".into(), catalog.clone()).await.err().unwrap();
        assert!(missing.find::<NotFoundError>().is_some());

        let invalid = get_photo("abc".into(), catalog).await.err().unwrap();
        assert!(invalid.find::<ValidationError>().is_some());
    }

    #[tokio::test]
    async fn test_image_headers() {
        let (_temp, catalog, ingestor) = setup().await;
        let photo = upload_one(&ingestor, b"png bytes").await;

        let response = get_photo_image(photo.id.to_string(), catalog.clone())
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
        assert_eq!(response.headers()["cache-control"], IMAGE_CACHE_CONTROL);

        let thumbnail = get_photo_thumbnail(photo.id.to_string(), catalog)
            .await
            .unwrap()
            .into_response();
        assert_eq!(thumbnail.headers()["content-type"], "image/png");
    }

    #[tokio::test]
    async fn test_image_with_missing_file_is_not_found() {
        let (_temp, catalog, ingestor) = setup().await;
        let photo = upload_one(&ingestor, b"png bytes").await;
        std::fs::remove_file(&photo.file_path).unwrap();

        let err = get_photo_image(photo.id.to_string(), catalog)
            .await
            .err()
            .unwrap();
        assert!(err.find::<NotFoundError>().is_some());
    }

    #[tokio::test]
    async fn test_delete_then_image_is_not_found() {
        let (_temp, catalog, ingestor) = setup().await;
        let photo = upload_one(&ingestor, b"png bytes").await;

        let reply = delete_photo(photo.id.to_string(), ingestor.clone())
            .await
            .unwrap();
        assert_eq!(reply.into_response().status(), StatusCode::OK);

        let err = get_photo_image(photo.id.to_string(), catalog)
            .await
            .err()
            .unwrap();
        assert!(err.find::<NotFoundError>().is_some());

        let again = delete_photo(photo.id.to_string(), ingestor).await.err().unwrap();
        assert!(again.find::<NotFoundError>().is_some());
    }
}
