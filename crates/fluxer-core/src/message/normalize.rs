//! Turning raw server records into canonical messages.
//!
//! The server is not consistent about field names or types, so every field is read
//! leniently. Normalization never fails: a malformed record yields a best-effort
//! `Message` (possibly blank) rather than an error.

use serde_json::Value;

use crate::json::{coerce_string, field, first_field, is_truthy, opt_string, opt_u64, string_field};

use super::types::{Attachment, Author, Message};

/// Timestamp keys in priority order
const TIMESTAMP_KEYS: &[&str] = &["created_at", "timestamp", "createdAt", "created_at_iso"];

/// Normalize one raw message record.
///
/// An absent `id` becomes the empty string; merge will collapse all such records into
/// one entry, so callers should treat blank ids as suspect.
pub fn normalize_message(raw: &Value) -> Message {
    let created_at = match first_field(raw, TIMESTAMP_KEYS) {
        Some(value) if is_truthy(value) => coerce_string(value),
        _ => String::new(),
    };

    let author = field(raw, "author")
        .filter(|a| is_truthy(a))
        .map(normalize_author);

    let author_id = match field(raw, "author_id") {
        Some(value) => coerce_string(value),
        None => author.as_ref().map(|a| a.id.clone()).unwrap_or_default(),
    };

    let channel_id = first_field(raw, &["channel_id", "channelId"])
        .map(coerce_string)
        .unwrap_or_default();

    let attachments = raw
        .get("attachments")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(normalize_attachment).collect())
        .unwrap_or_default();

    Message {
        id: string_field(raw, "id"),
        content: string_field(raw, "content"),
        author_id,
        author,
        channel_id,
        created_at,
        attachments,
    }
}

/// Normalize a list of raw records, preserving order
pub fn normalize_messages(raw: &[Value]) -> Vec<Message> {
    raw.iter().map(normalize_message).collect()
}

fn normalize_author(raw: &Value) -> Author {
    Author {
        id: string_field(raw, "id"),
        username: string_field(raw, "username"),
        avatar: opt_string(raw, "avatar"),
    }
}

/// Each field is kept only if it has the expected type
pub fn normalize_attachment(raw: &Value) -> Attachment {
    Attachment {
        id: string_field(raw, "id"),
        filename: string_field(raw, "filename"),
        size: opt_u64(raw, "size"),
        content_type: opt_string(raw, "content_type"),
        url: opt_string(raw, "url"),
        proxy_url: opt_string(raw, "proxy_url"),
        width: opt_u64(raw, "width").and_then(|w| u32::try_from(w).ok()),
        height: opt_u64(raw, "height").and_then(|h| u32::try_from(h).ok()),
        placeholder: opt_string(raw, "placeholder"),
    }
}
