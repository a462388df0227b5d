//! Interactive chat: stdin lines are sent, the channel is printed as it changes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fluxer_core::message::image_mime_from_extension;
use fluxer_core::{ChannelRef, ChatApi, ChatView, ImageUpload, SendOutcome, SyncSettings, ViewEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::render::message_line;

#[derive(Debug, PartialEq)]
enum Input {
    Quit,
    Retry,
    Image { path: PathBuf, caption: String },
    Text(String),
    Usage(&'static str),
    Blank,
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Blank;
    }
    match trimmed.split_once(' ').map_or((trimmed, ""), |(cmd, rest)| (cmd, rest.trim())) {
        ("/quit", _) | ("/exit", _) => Input::Quit,
        ("/retry", _) => Input::Retry,
        ("/image", "") => Input::Usage("/image <path> [caption]"),
        ("/image", rest) => {
            let (path, caption) = rest.split_once(' ').unwrap_or((rest, ""));
            Input::Image { path: PathBuf::from(path), caption: caption.trim().to_string() }
        }
        _ => Input::Text(line.to_string()),
    }
}

pub(crate) async fn load_image(path: &Path) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut image = ImageUpload::new(bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        image = image.with_file_name(name);
    }
    if let Some(mime) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(image_mime_from_extension)
    {
        image = image.with_mime_type(mime);
    }
    Ok(image)
}

/// Print new messages and failures as the view reports them
async fn print_events(mut events: UnboundedReceiver<ViewEvent>, current_user: String) {
    let mut printed: HashSet<String> = HashSet::new();
    while let Some(event) = events.recv().await {
        match event {
            ViewEvent::MessagesChanged { messages } => {
                for message in messages.iter() {
                    if printed.contains(&message.id) {
                        continue;
                    }
                    println!("{}", message_line(message, &current_user));
                    printed.insert(message.id.clone());
                }
            }
            ViewEvent::LoadFailed { error } => {
                eprintln!("Failed to load messages: {} (type /retry)", error);
            }
            ViewEvent::SendFailed { error, restored_input } => match restored_input {
                Some(text) => eprintln!("Failed to send \"{}\": {}", text, error),
                None => eprintln!("Failed to send: {}", error),
            },
            // A terminal is always scrolled to the newest line
            ViewEvent::ScrollToBottom { .. } => {}
        }
    }
}

/// Explain a send that did not go out; failures arrive on the event stream
fn report(outcome: fluxer_core::Result<SendOutcome>) {
    if let Ok(outcome) = outcome {
        if let Some(note) = outcome_note(outcome) {
            eprintln!("{}", note);
        }
    }
}

fn outcome_note(outcome: SendOutcome) -> Option<&'static str> {
    match outcome {
        SendOutcome::Sent | SendOutcome::Empty => None,
        SendOutcome::Busy => Some("Still sending the previous message"),
        SendOutcome::NotReady => Some("Messages have not loaded yet; type /retry or /quit"),
    }
}

pub async fn run(
    api: Arc<dyn ChatApi>,
    channel: ChannelRef,
    current_user: String,
    settings: SyncSettings,
) -> Result<()> {
    let title = channel.title();
    let (view, events) = ChatView::open(api, channel, current_user.clone(), settings);
    let printer = tokio::spawn(print_events(events, current_user));

    println!("{}  (/image <path> [caption] sends an image, /quit leaves)", title);
    // Failures are printed from the event stream
    let _ = view.load().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Blank => {}
            Input::Usage(usage) => eprintln!("Usage: {}", usage),
            Input::Retry => {
                let _ = view.load().await;
            }
            Input::Image { path, caption } => {
                let image = match load_image(&path).await {
                    Ok(image) => image,
                    Err(e) => {
                        eprintln!("{:#}", e);
                        continue;
                    }
                };
                view.set_input(caption);
                report(view.send_image(image).await);
            }
            Input::Text(text) => {
                view.set_input(text);
                report(view.send_text().await);
            }
        }
    }

    view.close();
    printer.abort();
    Ok(())
}
