//! Plain-text rendering of channels and messages for the terminal.

use fluxer_core::message::display::{
    attachment_image_uri, author_label, avatar_uri, initials, timestamp_label,
};
use fluxer_core::{Channel, Guild, Message, User};

pub fn message_line(message: &Message, current_user: &str) -> String {
    let mut line = String::new();
    let stamp = timestamp_label(&message.created_at);
    if !stamp.is_empty() {
        line.push_str(&format!("[{}] ", stamp));
    }
    line.push_str(&author_label(message, current_user));
    line.push(':');
    if !message.content.is_empty() {
        line.push(' ');
        line.push_str(&message.content);
    }

    for attachment in message.image_attachments() {
        if let Some(uri) = attachment_image_uri(attachment) {
            line.push_str(&format!("\n    [image] {}", uri));
        }
    }
    line
}

pub fn channel_line(channel: &Channel) -> String {
    match channel.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => format!("{:<20} #{}  ({})", channel.id, channel.display_name(), description),
        None => format!("{:<20} #{}", channel.id, channel.display_name()),
    }
}

pub fn guild_line(guild: &Guild) -> String {
    format!("{:<20} {}", guild.id, guild.name.as_deref().unwrap_or("Unnamed server"))
}

/// The signed-in user, with their avatar link when they have one
pub fn user_line(user: &User, media_base_url: &str) -> String {
    let mut line = format!(
        "[{}] {} <{}> (id {})",
        initials(&user.username),
        user.username,
        user.email,
        user.id
    );
    if let Some(uri) = avatar_uri(Some(&user.as_author()), media_base_url) {
        line.push_str(&format!("\n    avatar: {}", uri));
    }
    line
}
