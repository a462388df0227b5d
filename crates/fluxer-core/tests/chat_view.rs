use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio::time::sleep;

use fluxer_core::message::Snowflake;
use fluxer_core::{
    Attachment, Author, ChannelRef, ChatApi, ChatView, Error, ImageUpload, LoadPhase, Message,
    Result, ScrollMetrics, SendOutcome, SyncSettings, ViewEvent,
};

const CHANNEL: &str = "100";

fn msg(n: u64) -> Message {
    Message {
        id: n.to_string(),
        content: format!("message {}", n),
        author_id: "7".to_string(),
        author: Some(Author { id: "7".to_string(), username: "devin".to_string(), avatar: None }),
        channel_id: CHANNEL.to_string(),
        created_at: format!("2024-01-01T00:{:02}:{:02}Z", n / 60, n % 60),
        attachments: Vec::new(),
    }
}

fn window(range: std::ops::RangeInclusive<u64>) -> Vec<Message> {
    // Servers return newest first
    range.rev().map(msg).collect()
}

#[derive(Default)]
struct MockApi {
    window: Mutex<Vec<Message>>,
    failing_gets: AtomicUsize,
    get_calls: AtomicUsize,
    get_gate: Mutex<Option<Arc<Notify>>>,
    fail_sends: AtomicBool,
    send_gate: Mutex<Option<Arc<Notify>>>,
    sent: Mutex<Vec<(String, Option<String>)>>,
    next_id: AtomicU64,
}

impl MockApi {
    fn with_window(messages: Vec<Message>) -> Arc<Self> {
        let api = MockApi { next_id: AtomicU64::new(1000), ..Default::default() };
        *api.window.lock().unwrap() = messages;
        Arc::new(api)
    }

    fn set_window(&self, messages: Vec<Message>) {
        *self.window.lock().unwrap() = messages;
    }

    fn gate_gets(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.get_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn gate_sends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn failure() -> Error {
        Error::Api { status: 500, code: None, message: "HTTP 500: Internal Server Error".to_string() }
    }

    async fn record_send(&self, content: &str, filename: Option<String>) -> Result<Message> {
        let gate = self.send_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }

        self.sent.lock().unwrap().push((content.to_string(), filename.clone()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = Message {
            id: id.to_string(),
            content: content.to_string(),
            author_id: "1".to_string(),
            author: Some(Author { id: "1".to_string(), username: "mara".to_string(), avatar: None }),
            channel_id: CHANNEL.to_string(),
            created_at: "2024-01-02T00:00:00Z".to_string(),
            attachments: filename
                .map(|name| {
                    vec![Attachment {
                        id: "1".to_string(),
                        filename: name,
                        content_type: Some("image/png".to_string()),
                        ..Default::default()
                    }]
                })
                .unwrap_or_default(),
        };
        self.window.lock().unwrap().insert(0, message.clone());
        Ok(message)
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn get_messages(
        &self,
        channel_id: &str,
        limit: u32,
        _before: Option<&str>,
    ) -> Result<Vec<Message>> {
        assert_eq!(channel_id, CHANNEL);
        assert_eq!(limit, 50);
        self.get_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.get_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failing = self.failing_gets.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_gets.store(failing - 1, Ordering::SeqCst);
            return Err(Self::failure());
        }
        Ok(self.window.lock().unwrap().clone())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        assert_eq!(channel_id, CHANNEL);
        self.record_send(content, None).await
    }

    async fn send_message_with_image(
        &self,
        channel_id: &str,
        content: &str,
        image: &ImageUpload,
    ) -> Result<Message> {
        assert_eq!(channel_id, CHANNEL);
        self.record_send(content, Some(image.upload_name(0))).await
    }
}

fn open(api: &Arc<MockApi>) -> (ChatView, UnboundedReceiver<ViewEvent>) {
    ChatView::open(api.clone(), ChannelRef::named(CHANNEL, "general"), "mara", SyncSettings::default())
}

fn drain(rx: &mut UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn scrolls(events: &[ViewEvent], animated: bool) -> usize {
    events
        .iter()
        .filter(|e| **e == ViewEvent::ScrollToBottom { animated })
        .count()
}

fn changes(events: &[ViewEvent]) -> Vec<&Vec<Message>> {
    events
        .iter()
        .filter_map(|e| match e {
            ViewEvent::MessagesChanged { messages } => Some(messages),
            _ => None,
        })
        .collect()
}

fn assert_unique_ascending(messages: &[Message]) {
    let ids: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), messages.len());
    for pair in messages.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.timestamp() < b.timestamp()
                || (a.timestamp() == b.timestamp() && Snowflake::parse(&a.id) <= Snowflake::parse(&b.id)),
            "{} sorted before {}",
            a.id,
            b.id
        );
    }
}

const SCROLLED_UP: ScrollMetrics = ScrollMetrics { content_height: 5000.0, offset_y: 0.0, viewport_height: 600.0 };
const AT_BOTTOM: ScrollMetrics = ScrollMetrics { content_height: 5000.0, offset_y: 4400.0, viewport_height: 600.0 };

#[tokio::test(start_paused = true)]
async fn test_initial_load_scrolls_without_animation() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    assert_eq!(view.snapshot().phase, LoadPhase::Loading);

    view.load().await.unwrap();
    let snapshot = view.snapshot();
    assert_eq!(snapshot.phase, LoadPhase::Ready);
    let ids: Vec<&str> = snapshot.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    let events = drain(&mut rx);
    assert_eq!(changes(&events).len(), 1);
    assert_eq!(scrolls(&events, false), 0);

    sleep(Duration::from_millis(150)).await;
    let events = drain(&mut rx);
    // The follow debounce and the initial scroll both land
    assert_eq!(scrolls(&events, false), 2);
    assert_eq!(scrolls(&events, true), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_at_bottom_follows_new_messages() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    drain(&mut rx);

    api.set_window(window(1..=5));
    sleep(Duration::from_millis(3310)).await; // just past the first tick at 3500ms

    let events = drain(&mut rx);
    let changed = changes(&events);
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].len(), 5);
    assert_eq!(scrolls(&events, false), 0);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(scrolls(&drain(&mut rx), false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_changes_debounce_into_one_scroll() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    drain(&mut rx);

    view.set_input("one");
    view.send_text().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    view.set_input("two");
    view.send_text().await.unwrap();
    sleep(Duration::from_millis(60)).await;

    let events = drain(&mut rx);
    assert_eq!(scrolls(&events, true), 2);
    assert_eq!(scrolls(&events, false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scrolled_up_reader_is_left_alone() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    drain(&mut rx);

    view.on_scroll(SCROLLED_UP);
    assert!(!view.snapshot().at_bottom);

    api.set_window(window(1..=5));
    sleep(Duration::from_millis(3500)).await;

    let events = drain(&mut rx);
    assert_eq!(changes(&events).len(), 1);
    assert_eq!(scrolls(&events, false), 0);
    assert_eq!(scrolls(&events, true), 0);

    // Coming back to the bottom resumes following
    view.on_scroll(AT_BOTTOM);
    sleep(Duration::from_millis(60)).await;
    assert_eq!(scrolls(&drain(&mut rx), false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scrolling_away_cancels_pending_follow() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    view.on_scroll(SCROLLED_UP);

    sleep(Duration::from_millis(60)).await;
    let events = drain(&mut rx);
    assert_eq!(scrolls(&events, false), 0);

    // The one-shot initial scroll is not part of the follow policy
    sleep(Duration::from_millis(60)).await;
    assert_eq!(scrolls(&drain(&mut rx), false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_concurrent_with_poll_keeps_every_message() {
    let api = MockApi::with_window(window(1..=50));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    assert_eq!(view.snapshot().messages.len(), 50);

    let gate = api.gate_sends();
    assert!(view.set_input("hello"));
    let view = Arc::new(view);
    let sender = {
        let view = view.clone();
        tokio::spawn(async move { view.send_text().await })
    };

    // A poll lands while the send is in flight
    sleep(Duration::from_millis(3600)).await;
    assert!(view.snapshot().sending);

    gate.notify_one();
    assert_eq!(sender.await.unwrap().unwrap(), SendOutcome::Sent);

    let snapshot = view.snapshot();
    assert_eq!(snapshot.messages.len(), 51);
    assert_eq!(snapshot.messages.last().unwrap().id, "1000");
    assert_eq!(snapshot.input, "");
    assert!(!snapshot.sending);
    assert_unique_ascending(&snapshot.messages);
    assert_eq!(scrolls(&drain(&mut rx), true), 1);

    // The next poll carries the sent message too; nothing is duplicated
    sleep(Duration::from_millis(3500)).await;
    let snapshot = view.snapshot();
    assert_eq!(snapshot.messages.len(), 51);
    assert_unique_ascending(&snapshot.messages);
}

#[tokio::test(start_paused = true)]
async fn test_failed_send_restores_input() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    drain(&mut rx);

    api.fail_sends.store(true, Ordering::SeqCst);
    view.set_input("hello");
    let err = view.send_text().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));

    let snapshot = view.snapshot();
    assert_eq!(snapshot.input, "hello");
    assert!(!snapshot.sending);
    assert_eq!(snapshot.send_error.as_deref(), Some("HTTP 500: Internal Server Error"));
    assert_eq!(snapshot.messages.len(), 3);

    let events = drain(&mut rx);
    assert!(events.contains(&ViewEvent::SendFailed {
        error: "HTTP 500: Internal Server Error".to_string(),
        restored_input: Some("hello".to_string()),
    }));
    assert_eq!(scrolls(&events, true), 0);

    // The gate is open again
    api.fail_sends.store(false, Ordering::SeqCst);
    assert_eq!(view.send_text().await.unwrap(), SendOutcome::Sent);
    let snapshot = view.snapshot();
    assert_eq!(snapshot.send_error, None);
    assert_eq!(snapshot.messages.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_single_flight_gate() {
    let api = MockApi::with_window(window(1..=3));
    let (view, _rx) = open(&api);
    view.load().await.unwrap();

    assert!(view.set_input("   "));
    assert_eq!(view.send_text().await.unwrap(), SendOutcome::Empty);
    assert!(api.sent.lock().unwrap().is_empty());

    let gate = api.gate_sends();
    view.set_input("first");
    let view = Arc::new(view);
    let sender = {
        let view = view.clone();
        tokio::spawn(async move { view.send_text().await })
    };
    while !view.snapshot().sending {
        tokio::task::yield_now().await;
    }

    assert!(!view.set_input("second"));
    assert_eq!(view.send_text().await.unwrap(), SendOutcome::Busy);
    assert_eq!(
        view.send_image(ImageUpload::new(vec![1, 2, 3])).await.unwrap(),
        SendOutcome::Busy
    );

    gate.notify_one();
    assert_eq!(sender.await.unwrap().unwrap(), SendOutcome::Sent);
    assert_eq!(api.sent.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_image_send_uses_caption_and_is_not_restored() {
    let api = MockApi::with_window(window(1..=3));
    let (view, _rx) = open(&api);
    view.load().await.unwrap();

    view.set_input("look");
    let image = ImageUpload::new(vec![0x89, 0x50]).with_file_name("cat.png").with_mime_type("image/png");
    assert_eq!(view.send_image(image).await.unwrap(), SendOutcome::Sent);

    let sent = api.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![("look".to_string(), Some("cat.png".to_string()))]);
    let last = view.snapshot().messages.last().cloned().unwrap();
    assert_eq!(last.image_attachments().count(), 1);

    // An image with no caption is still sent
    assert_eq!(view.send_image(ImageUpload::new(vec![1])).await.unwrap(), SendOutcome::Sent);

    api.fail_sends.store(true, Ordering::SeqCst);
    view.set_input("caption");
    assert!(view.send_image(ImageUpload::new(vec![1])).await.is_err());
    let snapshot = view.snapshot();
    assert_eq!(snapshot.input, "");
    assert!(snapshot.send_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_load_failure_then_retry() {
    let api = MockApi::with_window(window(1..=3));
    api.failing_gets.store(1, Ordering::SeqCst);
    let (view, mut rx) = open(&api);

    assert!(view.load().await.is_err());
    assert_eq!(
        view.snapshot().phase,
        LoadPhase::Failed { error: "HTTP 500: Internal Server Error".to_string() }
    );
    assert_eq!(
        drain(&mut rx),
        vec![ViewEvent::LoadFailed { error: "HTTP 500: Internal Server Error".to_string() }]
    );

    view.load().await.unwrap();
    let snapshot = view.snapshot();
    assert_eq!(snapshot.phase, LoadPhase::Ready);
    assert_eq!(snapshot.messages.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_are_silent() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    drain(&mut rx);

    api.failing_gets.store(2, Ordering::SeqCst);
    api.set_window(window(1..=4));
    sleep(Duration::from_millis(7400)).await; // two failed ticks
    assert!(drain(&mut rx).is_empty());
    assert_eq!(view.snapshot().phase, LoadPhase::Ready);

    sleep(Duration::from_millis(3500)).await;
    assert_eq!(view.snapshot().messages.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_sends_wait_for_a_successful_load() {
    let api = MockApi::with_window(window(1..=3));
    api.failing_gets.store(1, Ordering::SeqCst);
    let (view, _rx) = open(&api);

    assert!(view.set_input("early"));
    assert_eq!(view.send_text().await.unwrap(), SendOutcome::NotReady);

    assert!(view.load().await.is_err());
    assert_eq!(view.send_text().await.unwrap(), SendOutcome::NotReady);
    assert_eq!(
        view.send_image(ImageUpload::new(vec![1])).await.unwrap(),
        SendOutcome::NotReady
    );
    assert!(api.sent.lock().unwrap().is_empty());

    // The input survives the refusals
    let snapshot = view.snapshot();
    assert_eq!(snapshot.input, "early");
    assert!(!snapshot.sending);

    view.load().await.unwrap();
    assert_eq!(view.send_text().await.unwrap(), SendOutcome::Sent);
    assert_eq!(*api.sent.lock().unwrap(), vec![("early".to_string(), None)]);
}

#[tokio::test(start_paused = true)]
async fn test_send_resolving_after_close_is_discarded() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    drain(&mut rx);

    let gate = api.gate_sends();
    view.set_input("hello");
    let view = Arc::new(view);
    let sender = {
        let view = view.clone();
        tokio::spawn(async move { view.send_text().await })
    };
    while !view.snapshot().sending {
        tokio::task::yield_now().await;
    }

    view.close();
    gate.notify_one();
    // Delivered, so still reported as sent
    assert_eq!(sender.await.unwrap().unwrap(), SendOutcome::Sent);
    assert_eq!(api.sent.lock().unwrap().len(), 1);

    assert!(view.snapshot().messages.is_empty());
    sleep(Duration::from_millis(200)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_still_polls() {
    let api = MockApi::with_window(window(1..=3));
    let settings = SyncSettings { poll_interval_ms: 0, ..Default::default() };
    let (view, _rx) = ChatView::open(api.clone(), ChannelRef::named(CHANNEL, "general"), "mara", settings);
    view.load().await.unwrap();

    sleep(Duration::from_millis(10)).await;
    // The load plus several polls
    assert!(api.get_calls.load(Ordering::SeqCst) > 2);
    assert_eq!(view.snapshot().messages.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_poll_resolving_after_close_is_discarded() {
    let api = MockApi::with_window(window(1..=3));
    let (view, mut rx) = open(&api);
    view.load().await.unwrap();
    sleep(Duration::from_millis(200)).await;
    drain(&mut rx);

    let gate = api.gate_gets();
    api.set_window(window(1..=10));
    sleep(Duration::from_millis(3400)).await; // the poll is now waiting on the gate
    let calls = api.get_calls.load(Ordering::SeqCst);

    view.close();
    gate.notify_one();
    sleep(Duration::from_millis(10)).await;

    assert!(drain(&mut rx).is_empty());
    assert!(view.snapshot().messages.is_empty());
    assert!(view.is_closed());

    // No further polls
    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.get_calls.load(Ordering::SeqCst), calls);

    assert!(matches!(view.load().await, Err(Error::ViewClosed)));
    assert!(matches!(view.send_text().await, Err(Error::ViewClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_view_stops_polling() {
    let api = MockApi::with_window(window(1..=3));
    let (view, _rx) = open(&api);
    drop(view);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(api.get_calls.load(Ordering::SeqCst), 0);
}
