//! Message types and data structures.
//!
//! This module contains:
//! - Message, Author, Attachment structs
//! - ImageUpload, the pre-upload format for image sends
//! - Timestamp parsing shared by ordering and display

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::snowflake::Snowflake;

/// Image file extensions recognised when an attachment carries no content type
const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub author_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    pub channel_id: String,
    /// ISO-8601, empty when the server sent none
    pub created_at: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// The creation time, if `created_at` parses
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    /// The id as an ordered snowflake, if it is decimal
    pub fn snowflake(&self) -> Option<Snowflake> {
        Snowflake::parse(&self.id)
    }

    /// Attachments that should render inline as images
    pub fn image_attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }
}

/// Denormalized sender info carried on a message
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Author {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    /// Size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// CDN-resized variant of `url`, preferred for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    /// Image pixel width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Image pixel height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Blurred preview placeholder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl Attachment {
    /// The URL to display: the proxied variant when present
    pub fn display_url(&self) -> Option<&str> {
        self.proxy_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }

    /// An attachment is an image if its content type says so, or failing that, if its
    /// URL path ends in a known image extension.
    pub fn is_image(&self) -> bool {
        if let Some(content_type) = &self.content_type {
            if content_type.to_ascii_lowercase().starts_with("image/") {
                return true;
            }
        }

        let url = self.display_url().unwrap_or_default().to_ascii_lowercase();
        let path = url.split('?').next().unwrap_or_default();
        IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

/// A picked image waiting to be uploaded alongside a message.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub bytes: Arc<Vec<u8>>,
    /// Original file name, if the picker supplied one
    pub file_name: Option<String>,
    /// MIME type, if the picker supplied one
    pub mime_type: Option<String>,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Arc::new(bytes), file_name: None, mime_type: None }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// The file name to upload under: the picked name, or a timestamped default
    pub fn upload_name(&self, now_ms: i64) -> String {
        match self.file_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("image_{}.jpg", now_ms),
        }
    }

    /// The MIME type to upload with, defaulting to JPEG
    pub fn upload_mime(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("image/jpeg")
    }
}

/// MIME type for an image file extension (with or without the leading dot)
pub fn image_mime_from_extension(extension: &str) -> Option<&'static str> {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 (with offset), a local date-time without offset (read as UTC so
/// ordering never depends on the machine's zone), and a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
