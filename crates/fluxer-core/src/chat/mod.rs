//! A live view of one channel.
//!
//! [`ChatView`] owns the message list of the channel it was opened on. An initial load
//! fills it, a background poller keeps it fresh, and sends fold the server's record
//! back in. Every mutation goes through the merge engine and is reported to the
//! renderer on the event channel returned by [`ChatView::open`].

mod composer;
mod events;
mod poll;
pub mod scroll;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::channel::ChannelRef;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::message::{merge_messages, ImageUpload, Message};

use composer::Composer;
use scroll::{DelayedScroll, ScrollPolicy};

pub use events::{LoadPhase, SendOutcome, ViewEvent};
pub use scroll::ScrollMetrics;

/// A point-in-time copy of what the view shows
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatSnapshot {
    pub channel: ChannelRef,
    pub phase: LoadPhase,
    pub messages: Vec<Message>,
    pub input: String,
    pub sending: bool,
    pub send_error: Option<String>,
    pub at_bottom: bool,
}

struct ViewState {
    closed: bool,
    phase: LoadPhase,
    messages: Vec<Message>,
    composer: Composer,
    scroll: ScrollPolicy,
    follow: DelayedScroll,
    initial_scroll: DelayedScroll,
}

/// State shared between the view handle, the poller and in-flight requests
struct Shared {
    api: Arc<dyn ChatApi>,
    channel: ChannelRef,
    settings: SyncSettings,
    events: UnboundedSender<ViewEvent>,
    state: Mutex<ViewState>,
}

impl Shared {
    // Never held across an await
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn emit(&self, event: ViewEvent) {
        // The renderer may have gone away; the view keeps working without it
        let _ = self.events.send(event);
    }

    /// Publish the list and follow it if the reader is at the bottom
    fn publish(&self, state: &mut ViewState) {
        self.emit(ViewEvent::MessagesChanged { messages: state.messages.clone() });
        if state.scroll.is_at_bottom() {
            state.follow.schedule(self.settings.follow_debounce(), &self.events);
        }
    }

    fn merge_into(&self, state: &mut ViewState, incoming: &[Message]) {
        let merged = merge_messages(&state.messages, incoming);
        if merged != state.messages {
            state.messages = merged;
            self.publish(state);
        }
    }

    /// Merge a batch into the list; returns false if the view was closed and the
    /// batch was discarded
    fn apply_batch(&self, incoming: &[Message]) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        self.merge_into(&mut state, incoming);
        true
    }

    /// Settle a send: merge the server's record, or reopen the gate and report
    fn finish_send(&self, result: Result<Message>, restore: Option<String>) -> Result<SendOutcome> {
        let mut state = self.lock();
        if state.closed {
            debug!("Discarding send result for closed channel {}", self.channel.id);
            return result.map(|_| SendOutcome::Sent);
        }

        match result {
            Ok(message) => {
                state.composer.succeed();
                self.merge_into(&mut state, std::slice::from_ref(&message));
                self.emit(ViewEvent::ScrollToBottom { animated: true });
                Ok(SendOutcome::Sent)
            }
            Err(e) => {
                warn!("Send to channel {} failed: {}", self.channel.id, e);
                let error = e.to_string();
                let restored_input = state.composer.fail(error.clone(), restore);
                self.emit(ViewEvent::SendFailed { error, restored_input });
                Err(e)
            }
        }
    }
}

/// An open channel. Closing or dropping it stops the poller and discards any
/// response still in flight.
pub struct ChatView {
    shared: Arc<Shared>,
    current_user: String,
    poller: JoinHandle<()>,
}

impl ChatView {
    /// Open a view on `channel` and start polling. Must be called within a tokio runtime.
    ///
    /// The list stays empty until [`ChatView::load`] completes.
    pub fn open(
        api: Arc<dyn ChatApi>,
        channel: ChannelRef,
        current_user: impl Into<String>,
        settings: SyncSettings,
    ) -> (Self, UnboundedReceiver<ViewEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let state = ViewState {
            closed: false,
            phase: LoadPhase::Loading,
            messages: Vec::new(),
            composer: Composer::default(),
            scroll: ScrollPolicy::new(settings.bottom_threshold_px),
            follow: DelayedScroll::default(),
            initial_scroll: DelayedScroll::default(),
        };
        let period = settings.poll_interval();

        info!("Opening channel {}", channel.id);
        let shared = Arc::new(Shared { api, channel, settings, events, state: Mutex::new(state) });
        let poller = poll::spawn_poller(Arc::downgrade(&shared), period);

        let view = Self { shared, current_user: current_user.into(), poller };
        (view, receiver)
    }

    pub fn channel(&self) -> &ChannelRef {
        &self.shared.channel
    }

    /// The username own messages are matched against
    pub fn current_user(&self) -> &str {
        &self.current_user
    }

    /// Fetch the latest window and replace the list with it.
    ///
    /// On failure the phase becomes [`LoadPhase::Failed`] and a [`ViewEvent::LoadFailed`]
    /// is emitted; call `load` again to retry.
    pub async fn load(&self) -> Result<()> {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(Error::ViewClosed);
            }
            state.phase = LoadPhase::Loading;
        }

        let channel_id = self.shared.channel.id.as_str();
        let result = self
            .shared
            .api
            .get_messages(channel_id, self.shared.settings.message_window, None)
            .await;

        let mut state = self.shared.lock();
        if state.closed {
            return Err(Error::ViewClosed);
        }

        match result {
            Ok(batch) => {
                state.messages = merge_messages(&[], &batch);
                state.phase = LoadPhase::Ready;
                info!("Loaded {} messages in channel {}", state.messages.len(), channel_id);
                self.shared.publish(&mut state);
                state
                    .initial_scroll
                    .schedule(self.shared.settings.initial_scroll_delay(), &self.shared.events);
                Ok(())
            }
            Err(e) => {
                warn!("Loading channel {} failed: {}", channel_id, e);
                let error = e.to_string();
                state.phase = LoadPhase::Failed { error: error.clone() };
                self.shared.emit(ViewEvent::LoadFailed { error });
                Err(e)
            }
        }
    }

    /// Replace the compose input; refused (false) while a send is in flight
    pub fn set_input(&self, text: impl Into<String>) -> bool {
        let mut state = self.shared.lock();
        !state.closed && state.composer.set_input(text.into())
    }

    /// Send the compose input as a text message. Refused with
    /// [`SendOutcome::NotReady`] until a load has succeeded.
    pub async fn send_text(&self) -> Result<SendOutcome> {
        let content = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(Error::ViewClosed);
            }
            if state.phase != LoadPhase::Ready {
                return Ok(SendOutcome::NotReady);
            }
            match state.composer.begin_text() {
                Ok(content) => content,
                Err(outcome) => return Ok(outcome),
            }
        };

        let result = self.shared.api.send_message(&self.shared.channel.id, &content).await;
        self.shared.finish_send(result, Some(content))
    }

    /// Send `image` with the compose input as its caption. The caption is not restored
    /// if the upload fails.
    pub async fn send_image(&self, image: ImageUpload) -> Result<SendOutcome> {
        let caption = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(Error::ViewClosed);
            }
            if state.phase != LoadPhase::Ready {
                return Ok(SendOutcome::NotReady);
            }
            match state.composer.begin_image() {
                Ok(caption) => caption,
                Err(outcome) => return Ok(outcome),
            }
        };

        let result = self
            .shared
            .api
            .send_message_with_image(&self.shared.channel.id, &caption, &image)
            .await;
        self.shared.finish_send(result, None)
    }

    /// Feed a user scroll event to the scroll policy
    pub fn on_scroll(&self, metrics: ScrollMetrics) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }

        let was_at_bottom = state.scroll.is_at_bottom();
        let at_bottom = state.scroll.observe(metrics);
        if at_bottom && !was_at_bottom {
            state.follow.schedule(self.shared.settings.follow_debounce(), &self.shared.events);
        } else if !at_bottom && was_at_bottom {
            state.follow.cancel();
        }
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let state = self.shared.lock();
        ChatSnapshot {
            channel: self.shared.channel.clone(),
            phase: state.phase.clone(),
            messages: state.messages.clone(),
            input: state.composer.input.clone(),
            sending: state.composer.sending,
            send_error: state.composer.send_error.clone(),
            at_bottom: state.scroll.is_at_bottom(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop polling and drop the list. Responses that arrive later are ignored.
    pub fn close(&self) {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.messages.clear();
            state.follow.cancel();
            state.initial_scroll.cancel();
        }
        self.poller.abort();
        info!("Closed channel {}", self.shared.channel.id);
    }
}

impl Drop for ChatView {
    fn drop(&mut self) {
        self.close();
    }
}
