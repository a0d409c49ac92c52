use chrono::NaiveDate;
use exif::{In, Reader, Tag, Value};
use image::ImageReader;
use log::debug;
use std::io::Cursor;

/// Metadata pulled out of an uploaded image. Every field is independently optional.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PhotoMetadata {
    pub capture_date: Option<NaiveDate>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}

impl PhotoMetadata {
    pub fn is_empty(&self) -> bool {
        *self == PhotoMetadata::default()
    }
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Clean EXIF string values by removing null bytes, trimming whitespace,
    /// and handling arrays with empty trailing values
    fn clean_exif_string(value: String) -> String {
        value
            .replace('\0', "")
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches('"')
            .trim()
            .to_string()
    }

    /// Extracts what it can from the buffer. Never fails: unreadable or missing
    /// metadata simply leaves the corresponding fields empty.
    pub fn extract(bytes: &[u8]) -> PhotoMetadata {
        let mut metadata = PhotoMetadata::default();

        match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif_reader) => {
                Self::extract_capture_date(&exif_reader, &mut metadata);
                Self::extract_dimensions(&exif_reader, &mut metadata);
                Self::extract_camera_info(&exif_reader, &mut metadata);
            }
            Err(e) => {
                debug!("No EXIF data in {} byte buffer: {}", bytes.len(), e);
            }
        }

        if metadata.width.is_none() || metadata.height.is_none() {
            if let Some((width, height)) = Self::header_dimensions(bytes) {
                metadata.width = metadata.width.or(Some(width));
                metadata.height = metadata.height.or(Some(height));
            }
        }

        metadata
    }

    fn extract_capture_date(reader: &exif::Exif, metadata: &mut PhotoMetadata) {
        // Original capture time wins over the generic modification time
        metadata.capture_date = [Tag::DateTimeOriginal, Tag::DateTime]
            .iter()
            .filter_map(|tag| reader.get_field(*tag, In::PRIMARY))
            .filter_map(|field| Self::parse_exif_date(&Self::field_text(&field.value)?))
            .next();
    }

    fn extract_dimensions(reader: &exif::Exif, metadata: &mut PhotoMetadata) {
        metadata.width = reader
            .get_field(Tag::PixelXDimension, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|v| *v > 0);

        metadata.height = reader
            .get_field(Tag::PixelYDimension, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .filter(|v| *v > 0);
    }

    fn extract_camera_info(reader: &exif::Exif, metadata: &mut PhotoMetadata) {
        if let Some(field) = reader.get_field(Tag::Make, In::PRIMARY) {
            let value = Self::clean_exif_string(field.display_value().to_string());
            if !value.is_empty() {
                metadata.camera_make = Some(value);
            }
        }

        if let Some(field) = reader.get_field(Tag::Model, In::PRIMARY) {
            let value = Self::clean_exif_string(field.display_value().to_string());
            if !value.is_empty() {
                metadata.camera_model = Some(value);
            }
        }
    }

    fn header_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?;
        reader.format()?;
        reader
            .into_dimensions()
            .ok()
            .filter(|(w, h)| *w > 0 && *h > 0)
    }

    fn field_text(value: &Value) -> Option<String> {
        match value {
            Value::Ascii(parts) => parts
                .first()
                .map(|raw| String::from_utf8_lossy(raw).to_string()),
            _ => None,
        }
    }

    /// Parses the date portion of an EXIF timestamp.
    ///
    /// EXIF writes `2023:01:15 10:30:00`, with colons in the date. Some software
    /// rewrites it as `2023-01-15 10:30:00`. Both yield `2023-01-15`; anything
    /// else, including the `0000:00:00` placeholder some cameras write, is `None`.
    pub fn parse_exif_date(datetime_str: &str) -> Option<NaiveDate> {
        let cleaned = Self::clean_exif_string(datetime_str.to_string());
        let date_part = cleaned.split_whitespace().next()?;

        NaiveDate::parse_from_str(date_part, "%Y:%m:%d")
            .or_else(|_| NaiveDate::parse_from_str(date_part, "%F"))
            .ok()
    }
}
