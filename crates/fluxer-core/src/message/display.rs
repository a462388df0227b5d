//! Presentation helpers for rendering a message row.

use chrono::{Local, TimeZone};

use super::types::{parse_timestamp, Attachment, Author, Message};

/// Whether `message` was sent by the signed-in user.
///
/// `current_user` is a username; older records only carry `author_id`, which some
/// servers fill with the username, so both are checked.
pub fn is_own(message: &Message, current_user: &str) -> bool {
    message.author.as_ref().is_some_and(|a| a.username == current_user)
        || message.author_id == current_user
}

/// The sender label: "You" for own messages, else the username, else "Unknown"
pub fn author_label(message: &Message, current_user: &str) -> String {
    if is_own(message, current_user) {
        return "You".to_string();
    }
    match message.author.as_ref().map(|a| a.username.as_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Up to two uppercase initials, or "?" when the name has none
pub fn initials(name: &str) -> String {
    let letters: String = name
        .split(' ')
        .filter(|part| !part.is_empty())
        .take(2)
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect();

    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

/// The avatar image URL for an author, if they have one
pub fn avatar_uri(author: Option<&Author>, media_base_url: &str) -> Option<String> {
    let author = author?;
    let avatar = author.avatar.as_deref().filter(|a| !a.is_empty())?;
    if author.id.is_empty() {
        return None;
    }

    let lower = avatar.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(avatar.to_string());
    }

    let filename = if avatar.contains('.') {
        avatar.to_string()
    } else {
        format!("{}.png", avatar)
    };
    Some(format!(
        "{}/avatars/{}/{}?size=64&format=png",
        media_base_url.trim_end_matches('/'),
        author.id,
        filename
    ))
}

/// The URL to load an image attachment from, sized for inline display
pub fn attachment_image_uri(attachment: &Attachment) -> Option<String> {
    let raw = attachment.display_url()?;

    // Ask the CDN for a reasonable size unless the URL already has parameters
    if raw.contains("fluxerusercontent.com/attachments/") && !raw.contains('?') {
        return Some(format!("{}?size=512&format=png&quality=high", raw));
    }

    Some(raw.to_string())
}

/// A short "Mon D, HH:MM" label in the local zone, empty if unparseable
pub fn timestamp_label(created_at: &str) -> String {
    timestamp_label_in(&Local, created_at)
}

/// [`timestamp_label`] rendered in an explicit zone
pub fn timestamp_label_in<Tz: TimeZone>(zone: &Tz, created_at: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match parse_timestamp(created_at) {
        Some(at) => at.with_timezone(zone).format("%b %-d, %H:%M").to_string(),
        None => String::new(),
    }
}
