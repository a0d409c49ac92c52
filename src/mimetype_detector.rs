use std::path::Path;

/// Detects MIME type from file extension string. Only image types accepted for
/// upload are recognized.
pub fn from_extension(ext: &str) -> Option<MimeType> {
    let ext_lower = ext.to_lowercase();
    match ext_lower.as_str() {
        "jpg" | "jpeg" => Some(MimeType::new("image", "jpeg")),
        "png" => Some(MimeType::new("image", "png")),
        "gif" => Some(MimeType::new("image", "gif")),
        "webp" => Some(MimeType::new("image", "webp")),
        "heic" => Some(MimeType::new("image", "heic")),
        "heif" => Some(MimeType::new("image", "heif")),
        _ => None,
    }
}

/// Parses a declared `Content-Type` value, accepting only allowed image types.
/// Parameters such as `; charset=...` are ignored.
pub fn from_content_type(content_type: &str) -> Option<MimeType> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    let (type_, subtype) = essence.split_once('/')?;
    if type_ != "image" {
        return None;
    }
    match subtype {
        "jpeg" | "jpg" | "pjpeg" => Some(MimeType::new("image", "jpeg")),
        "png" => Some(MimeType::new("image", "png")),
        "gif" => Some(MimeType::new("image", "gif")),
        "webp" => Some(MimeType::new("image", "webp")),
        "heic" | "heic-sequence" => Some(MimeType::new("image", "heic")),
        "heif" | "heif-sequence" => Some(MimeType::new("image", "heif")),
        _ => None,
    }
}

/// Lowercased extension of a client-supplied filename, if it is an allowed one.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
    from_extension(&ext).map(|_| ext)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    type_: String,
    subtype: String,
}

impl MimeType {
    fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
        }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}
