//! Scroll-position policy: follow new messages only while the reader is at the bottom.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::events::ViewEvent;

/// Geometry of the message list at a user scroll event, in pixels
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct ScrollMetrics {
    pub content_height: f64,
    pub offset_y: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        self.content_height - (self.offset_y + self.viewport_height)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScrollPolicy {
    threshold_px: f64,
    at_bottom: bool,
}

impl ScrollPolicy {
    /// A fresh view counts as being at the bottom
    pub fn new(threshold_px: f64) -> Self {
        Self { threshold_px, at_bottom: true }
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    /// Record a user scroll; returns the new at-bottom flag
    pub fn observe(&mut self, metrics: ScrollMetrics) -> bool {
        self.at_bottom = metrics.distance_from_bottom() < self.threshold_px;
        self.at_bottom
    }
}

/// A cancellable, restartable "scroll to bottom later" request
#[derive(Debug, Default)]
pub(crate) struct DelayedScroll {
    pending: Option<JoinHandle<()>>,
}

impl DelayedScroll {
    /// (Re)start the timer; an earlier pending request is dropped
    pub(crate) fn schedule(&mut self, delay: Duration, events: &UnboundedSender<ViewEvent>) {
        self.cancel();
        let events = events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(ViewEvent::ScrollToBottom { animated: false });
        }));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for DelayedScroll {
    fn drop(&mut self) {
        self.cancel();
    }
}
