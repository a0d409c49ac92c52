pub mod app;
pub mod config;
pub mod db;
pub mod db_pool;
pub mod db_schema;
pub mod db_types;
pub mod error;
pub mod handlers_health;
pub mod handlers_photo;
pub mod handlers_static;
pub mod handlers_upload;
pub mod ingest;
pub mod metadata_extractor;
pub mod mimetype_detector;
pub mod rate_limit;
pub mod storage_layout;
pub mod warp_helpers;
