//! Message handling module.
//!
//! This module handles the canonical message shape, normalizing raw server records
//! into it, ordering by snowflake and timestamp, and merging batches.

mod types;
mod normalize;
mod merge;
pub mod display;
pub mod snowflake;

pub use types::{
    Message, Author, Attachment, ImageUpload,
    image_mime_from_extension, parse_timestamp,
};
pub use normalize::{normalize_message, normalize_messages, normalize_attachment};
pub use merge::{merge_messages, compare_messages};
pub use snowflake::Snowflake;
