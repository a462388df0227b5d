//! Fixed-interval refresh of the latest message window.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::Shared;

/// Start the ticker. Every tick launches an independent fetch; the ticker never waits
/// for one to finish, so a slow request cannot delay the next poll.
pub(super) fn spawn_poller(shared: Weak<Shared>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(view) = shared.upgrade() else { break };
            if view.is_closed() {
                break;
            }
            tokio::spawn(poll_once(view));
        }
    })
}

async fn poll_once(shared: Arc<Shared>) {
    let channel_id = shared.channel.id.as_str();
    match shared
        .api
        .get_messages(channel_id, shared.settings.message_window, None)
        .await
    {
        Ok(batch) => {
            if !shared.apply_batch(&batch) {
                debug!("Discarding poll result for closed channel {}", channel_id);
            }
        }
        // The next tick is the retry
        Err(e) => debug!("Poll of channel {} failed: {}", channel_id, e),
    }
}
