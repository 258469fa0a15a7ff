//! Public data models returned by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sender or recipient of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAddress {
    /// Display name, if the header carried one.
    #[serde(default)]
    pub name: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// A hyperlink extracted from a message body by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link text as displayed in the body.
    #[serde(default)]
    pub text: Option<String>,
    /// Link target.
    #[serde(default)]
    pub href: Option<String>,
}

/// One rendition of a message body (plaintext or HTML).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    /// Raw body content.
    #[serde(default)]
    pub body: Option<String>,
    /// Links in document order.
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Attachment metadata. The content itself is not downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Service identifier of the attachment.
    pub id: String,
    /// Filename as given in the message.
    #[serde(default)]
    pub file_name: Option<String>,
    /// MIME content type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub length: Option<u64>,
}

/// A full message as returned by `GET /api/messages/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Service identifier of the message.
    pub id: String,
    /// When the service received the message.
    #[serde(default)]
    pub received: Option<DateTime<Utc>>,
    /// Subject line.
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: Vec<MessageAddress>,
    #[serde(default)]
    pub to: Vec<MessageAddress>,
    #[serde(default)]
    pub cc: Vec<MessageAddress>,
    /// Plaintext body.
    #[serde(default)]
    pub text: Option<MessageContent>,
    /// HTML body.
    #[serde(default)]
    pub html: Option<MessageContent>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Server (mailbox) the message belongs to.
    #[serde(default)]
    pub server: Option<String>,
}

impl Message {
    /// Address of the first sender.
    pub fn sender_email(&self) -> Option<&str> {
        self.from.first().and_then(|a| a.email.as_deref())
    }

    /// Plaintext body, if any.
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_ref().and_then(|c| c.body.as_deref())
    }

    /// Links found in the HTML body, in document order.
    pub fn links(&self) -> &[Link] {
        self.html.as_ref().map(|c| c.links.as_slice()).unwrap_or(&[])
    }

    /// First link of the HTML body.
    pub fn first_link(&self) -> Option<&Link> {
        self.links().first()
    }
}

/// List-level view of a message, as returned by search and list requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub id: String,
    #[serde(default)]
    pub received: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: Vec<MessageAddress>,
    #[serde(default)]
    pub to: Vec<MessageAddress>,
    /// Number of attachments.
    #[serde(default)]
    pub attachments: u32,
}

/// Envelope of list and search responses.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageListResult {
    #[serde(default)]
    pub items: Vec<MessageSummary>,
}

/// Pick the most recently received summary.
///
/// Summaries without a timestamp sort first. Among equal timestamps the
/// last one in service order wins.
pub(crate) fn latest(items: Vec<MessageSummary>) -> Option<MessageSummary> {
    items.into_iter().max_by_key(|s| s.received)
}
