//! Remote API access: collection data, image bytes and comments

pub mod client;
pub mod errors;
pub mod messages;
pub mod types;

pub use client::ApiClient;
pub use errors::FetchError;
pub use messages::{MessageClient, MessageError};
pub use types::*;
