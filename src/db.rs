use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite};

pub use crate::db_pool::{close_db_pool, create_db_pool, create_in_memory_pool, DbPool};
pub use crate::db_types::{
    PageRequest, Pagination, PhotoFilter, PhotoListQuery, PhotoPage, SortColumn, SortOrder,
};
use crate::error::{PhotoError, PhotoResult};

/// One catalogued upload. Rows are written once by the ingestion pipeline and
/// never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    /// Generated name on disk
    pub filename: String,
    /// Name the client sent; display only
    pub original_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub capture_date: Option<NaiveDate>,
    pub upload_date: DateTime<Utc>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn image_url(&self) -> String {
        format!("/api/photos/{}/image", self.id)
    }

    pub fn thumbnail_url(&self) -> String {
        format!("/api/photos/{}/thumbnail", self.id)
    }
}

/// A photo that has been written to disk but not yet recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub filename: String,
    pub original_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub capture_date: Option<NaiveDate>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub upload_date: DateTime<Utc>,
}

impl NewPhoto {
    pub fn into_photo(self, id: i64) -> Photo {
        Photo {
            id,
            filename: self.filename,
            original_name: self.original_name,
            file_path: self.file_path,
            file_size: self.file_size,
            mime_type: self.mime_type,
            capture_date: self.capture_date,
            upload_date: self.upload_date,
            width: self.width,
            height: self.height,
            camera_make: self.camera_make,
            camera_model: self.camera_model,
            created_at: self.upload_date,
            updated_at: self.upload_date,
        }
    }
}

#[async_trait]
pub trait PhotoRepository: Send + Sync {
    /// Records a photo and returns its new id. Either the whole row is written or nothing is.
    async fn insert(&self, photo: &NewPhoto) -> PhotoResult<i64>;

    async fn query(&self, query: &PhotoListQuery) -> PhotoResult<PhotoPage>;

    async fn get_by_id(&self, id: i64) -> PhotoResult<Option<Photo>>;

    /// Like `get_by_id`, with a missing row reported as `PhotoError::NotFound`.
    async fn require(&self, id: i64) -> PhotoResult<Photo> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| PhotoError::NotFound("Photo not found".to_string()))
    }

    /// Returns true iff a row was removed.
    async fn delete_by_id(&self, id: i64) -> PhotoResult<bool>;
}

/// SQLite-backed photo catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: DbPool,
}

impl Catalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn close(&self) {
        close_db_pool(&self.pool).await;
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PhotoFilter) {
        builder.push(" WHERE 1=1");
        if let Some(start_date) = filter.start_date {
            builder.push(" AND capture_date >= ").push_bind(start_date);
        }
        if let Some(end_date) = filter.end_date {
            builder.push(" AND capture_date <= ").push_bind(end_date);
        }
    }
}

#[async_trait]
impl PhotoRepository for Catalog {
    async fn insert(&self, photo: &NewPhoto) -> PhotoResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO photos (
                filename, original_name, file_path, file_size, mime_type,
                capture_date, width, height, camera_make, camera_model,
                upload_date, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(photo.filename.as_str())
        .bind(photo.original_name.as_str())
        .bind(photo.file_path.as_str())
        .bind(photo.file_size)
        .bind(photo.mime_type.as_str())
        .bind(photo.capture_date)
        .bind(photo.width)
        .bind(photo.height)
        .bind(photo.camera_make.as_deref())
        .bind(photo.camera_model.as_deref())
        .bind(photo.upload_date)
        .bind(photo.upload_date)
        .bind(photo.upload_date)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn query(&self, query: &PhotoListQuery) -> PhotoResult<PhotoPage> {
        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM photos");
        Self::push_filters(&mut count_query, &query.filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        // Column and direction come from closed enums, never from request text
        let order = query.order.as_sql();
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM photos");
        Self::push_filters(&mut select, &query.filter);
        select.push(format!(
            " ORDER BY {} {}, id {}",
            query.sort.as_sql(),
            order,
            order
        ));
        select
            .push(" LIMIT ")
            .push_bind(query.page.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.page.offset());

        let photos = select
            .build_query_as::<Photo>()
            .fetch_all(&self.pool)
            .await?;

        Ok(PhotoPage {
            photos,
            pagination: Pagination::new(query.page, total),
        })
    }

    async fn get_by_id(&self, id: i64) -> PhotoResult<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>("SELECT * FROM photos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(photo)
    }

    async fn delete_by_id(&self, id: i64) -> PhotoResult<bool> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
