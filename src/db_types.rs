use chrono::NaiveDate;
use serde::Serialize;

use crate::db::Photo;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Columns a listing may be ordered by. Only these ever reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    UploadDate,
    CaptureDate,
    FileSize,
}

impl SortColumn {
    /// Unknown names are ignored rather than rejected.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("uploadDate") | Some("upload_date") => SortColumn::UploadDate,
            Some("captureDate") | Some("capture_date") => SortColumn::CaptureDate,
            Some("fileSize") | Some("file_size") => SortColumn::FileSize,
            Some(other) => {
                log::debug!("Ignoring unknown sort column {:?}", other);
                SortColumn::default()
            }
            None => SortColumn::default(),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::UploadDate => "upload_date",
            SortColumn::CaptureDate => "capture_date",
            SortColumn::FileSize => "file_size",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("ASC") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Inclusive capture-date bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotoFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// 1-indexed page request, already clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoListQuery {
    pub filter: PhotoFilter,
    pub page: PageRequest,
    pub sort: SortColumn,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: PageRequest, total: i64) -> Self {
        let limit = page.limit as i64;
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub pagination: Pagination,
}
