//! Transport to a Fluxer server.
//!
//! [`ChatApi`] is the narrow surface a chat view needs; [`FluxerClient`] implements it
//! over HTTP along with the account, channel and guild endpoints.

mod client;
pub mod discovery;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{ImageUpload, Message};

pub use client::{Captcha, FluxerClient};
pub use discovery::DiscoveryDocument;

/// The message operations a chat view performs against the server
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// The latest `limit` messages of a channel, or those before `before` when given
    async fn get_messages(
        &self,
        channel_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<Message>>;

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<Message>;

    /// Send `content` with exactly one image attached
    async fn send_message_with_image(
        &self,
        channel_id: &str,
        content: &str,
        image: &ImageUpload,
    ) -> Result<Message>;
}
