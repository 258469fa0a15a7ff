//! # Mailosaur Client
//! Asynchronous client for the Mailosaur email testing HTTP API. It searches a server (mailbox) for a message matching [`SearchCriteria`] and waits for it to arrive, using [`Client`] and [`ClientBuilder`].
//!
//! ## Audience and uses
//! For Rust developers who need to assert on emails sent by the system under test: configure a [`Client`] with the API key of a server, trigger the email, then [`Client::search`] until the [`Message`] shows up and inspect its subject, senders, bodies, links and attachments.
//!
//! ## Runtime requirements
//! Async-only; run inside a Tokio (v1) runtime. HTTP calls use `reqwest`. Polling sleeps on the Tokio timer, and a search can be cancelled through a `tokio::sync::watch` channel passed in [`SearchOptions`].
//!
//! ## Out of scope
//! Not a mail parser, SMTP sender or mailbox store. Message content, extracted links and attachment metadata are whatever the service returns.
//!
//! ## Errors
//! Bad input is reported as [`Error::Validation`] before any request. A refused API key is [`Error::Authentication`] and is never retried. Network failures and `5xx`/`429` statuses ([`Error::Transport`], [`Error::Unavailable`]) are retried by [`Client::search`] within its time budget. A search that finds nothing in time fails with [`Error::SearchTimeout`]. The crate-wide [`Result`] alias wraps these errors.
//!
//! ## Logging
//! Search attempts are reported through `tracing` under a `search` span carrying the server id. The API key is never logged.
//!
//! ## Example
//! ```no_run
//! use mailosaur_client::{Client, SearchCriteria, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailosaur_client::Error> {
//!     let client = Client::new("YOUR-API-KEY")?;
//!     let criteria = SearchCriteria::new().with_sent_to("anything@abc123.mailosaur.net");
//!
//!     let message = client
//!         .search("abc123", &criteria, &SearchOptions::default())
//!         .await?;
//!     println!("Subject: {}", message.subject);
//!     println!("From: {:?}", message.sender_email());
//!     println!("Links: {}", message.links().len());
//!     println!("Attachments: {}", message.attachments.len());
//!     Ok(())
//! }
//! ```

mod client;
mod criteria;
mod error;
mod models;
mod poll;

pub use client::{Client, ClientBuilder};
pub use criteria::{MatchMode, SearchCriteria};
pub use error::Error;
pub use models::{Attachment, Link, Message, MessageAddress, MessageContent, MessageSummary};
pub use poll::{
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, MIN_POLL_INTERVAL, SearchOptions, poll_until,
};

/// Result type alias for Mailosaur operations.
///
/// This is equivalent to `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
