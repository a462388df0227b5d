//! Channels and guilds (servers) as listed by the API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::{field, is_truthy, opt_string, string_field};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChannelKind {
    /// Numeric type code
    Code(i64),
    /// Textual type, e.g. "text"
    Name(String),
}

impl Default for ChannelKind {
    fn default() -> Self {
        ChannelKind::Name("unknown".to_string())
    }
}

impl ChannelKind {
    fn from_value(raw: Option<&Value>) -> Self {
        match raw {
            Some(Value::Number(n)) => n.as_i64().map(ChannelKind::Code).unwrap_or_default(),
            Some(Value::String(s)) => ChannelKind::Name(s.clone()),
            _ => ChannelKind::default(),
        }
    }
}

/// A participant of a direct-message channel
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Recipient {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: ChannelKind,
    pub guild_id: Option<String>,
    pub recipients: Vec<Recipient>,
}

impl Channel {
    /// The name to show: the channel name, else its recipients, else "Direct Message"
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        recipients_label(&self.recipients).unwrap_or_else(|| "Direct Message".to_string())
    }

    /// The descriptor a chat view is opened with
    pub fn to_ref(&self) -> ChannelRef {
        ChannelRef { id: self.id.clone(), name: self.name.clone() }
    }
}

/// What navigation hands to a chat view: an id and maybe a name
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ChannelRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: None }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: Some(name.into()) }
    }

    /// Header title, e.g. "#general"
    pub fn title(&self) -> String {
        format!("#{}", self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Direct Message"))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Guild {
    pub id: String,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub owner_id: Option<String>,
}

fn recipients_label(recipients: &[Recipient]) -> Option<String> {
    let names: Vec<&str> = recipients
        .iter()
        .map(|r| r.username.as_str())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

fn normalize_recipient(raw: &Value) -> Recipient {
    Recipient {
        id: string_field(raw, "id"),
        username: string_field(raw, "username"),
        avatar: opt_string(raw, "avatar"),
    }
}

fn name_field(raw: &Value) -> Option<String> {
    field(raw, "name").filter(|n| is_truthy(n)).and_then(Value::as_str).map(str::to_string)
}

/// Normalize a channel from the user's own channel list.
///
/// Direct-message channels often have no name; one is derived from the recipients.
pub fn normalize_channel(raw: &Value) -> Channel {
    let recipients: Vec<Recipient> = raw
        .get("recipients")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(normalize_recipient).collect())
        .unwrap_or_default();

    let name = name_field(raw)
        .or_else(|| recipients_label(&recipients))
        .unwrap_or_else(|| "Direct Message".to_string());

    Channel {
        id: string_field(raw, "id"),
        name: Some(name),
        description: opt_string(raw, "description"),
        kind: ChannelKind::from_value(field(raw, "type")),
        guild_id: opt_string(raw, "guild_id"),
        recipients,
    }
}

/// Normalize a channel listed under a guild, which owns it when the record is silent
pub fn normalize_guild_channel(raw: &Value, guild_id: &str) -> Channel {
    Channel {
        id: string_field(raw, "id"),
        name: name_field(raw),
        description: opt_string(raw, "description"),
        kind: ChannelKind::from_value(field(raw, "type")),
        guild_id: Some(opt_string(raw, "guild_id").unwrap_or_else(|| guild_id.to_string())),
        recipients: Vec::new(),
    }
}

pub fn normalize_guild(raw: &Value) -> Guild {
    Guild {
        id: string_field(raw, "id"),
        name: opt_string(raw, "name"),
        icon: opt_string(raw, "icon"),
        owner_id: opt_string(raw, "owner_id"),
    }
}
