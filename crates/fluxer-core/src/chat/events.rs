use serde::Serialize;

use crate::message::Message;

/// What an open chat view tells its renderer
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// The ordered message list changed; carries the full list
    MessagesChanged { messages: Vec<Message> },
    ScrollToBottom { animated: bool },
    LoadFailed { error: String },
    /// `restored_input` is the text put back into the compose box, if any
    SendFailed {
        error: String,
        restored_input: Option<String>,
    },
}

/// Progress of the initial window load
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LoadPhase {
    Loading,
    Ready,
    Failed { error: String },
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    Sent,
    /// Another send is still in flight; nothing happened
    Busy,
    /// Nothing to send
    Empty,
    /// The initial load has not succeeded yet; nothing happened
    NotReady,
}
