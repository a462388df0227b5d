//! Core of the Fluxer chat client.
//!
//! Message normalization and ordering, the per-channel [`ChatView`] that keeps a
//! conversation in sync, and [`FluxerClient`], the HTTP transport.

pub mod account;
pub mod api;
pub mod channel;
pub mod chat;
pub mod config;
pub mod error;
mod json;
pub mod message;

pub use account::{AuthResponse, IpAuthorizationPoll, IpAuthorizationRequired, LoginOutcome, Session, User};
pub use api::{Captcha, ChatApi, FluxerClient};
pub use channel::{Channel, ChannelKind, ChannelRef, Guild, Recipient};
pub use chat::{ChatSnapshot, ChatView, LoadPhase, ScrollMetrics, SendOutcome, ViewEvent};
pub use config::{ClientConfig, SyncSettings};
pub use error::{Error, Result};
pub use message::{merge_messages, normalize_message, Attachment, Author, ImageUpload, Message, Snowflake};
