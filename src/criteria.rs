//! Search filters sent to the service.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// How multiple filters combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchMode {
    /// Every set filter must match.
    #[default]
    All,
    /// Any set filter may match.
    Any,
}

/// Filters selecting a message within a server.
///
/// Text filters travel in the request body; the time range travels in the
/// query string. At least one filter must be set.
///
/// # Examples
/// ```
/// use mailosaur_client::SearchCriteria;
///
/// let criteria = SearchCriteria::new()
///     .with_sent_to("anything@abc123.mailosaur.net")
///     .with_subject("Welcome");
/// assert!(!criteria.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    sent_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sent_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(rename = "match")]
    match_mode: MatchMode,
    #[serde(skip)]
    received_after: Option<DateTime<Utc>>,
    #[serde(skip)]
    received_before: Option<DateTime<Utc>>,
}

impl SearchCriteria {
    /// Empty criteria. Set at least one filter before searching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match messages sent to this address.
    pub fn with_sent_to(mut self, address: impl Into<String>) -> Self {
        self.sent_to = Some(address.into());
        self
    }

    /// Match messages sent from this address.
    pub fn with_sent_from(mut self, address: impl Into<String>) -> Self {
        self.sent_from = Some(address.into());
        self
    }

    /// Match messages whose subject contains this text.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Match messages whose body contains this text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Only match messages received at or after this instant.
    pub fn received_after(mut self, at: DateTime<Utc>) -> Self {
        self.received_after = Some(at);
        self
    }

    /// Only match messages received at or before this instant.
    pub fn received_before(mut self, at: DateTime<Utc>) -> Self {
        self.received_before = Some(at);
        self
    }

    /// Combine filters with `ALL` (default) or `ANY`.
    pub fn with_match(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn sent_to(&self) -> Option<&str> {
        self.sent_to.as_deref()
    }

    pub fn sent_from(&self) -> Option<&str> {
        self.sent_from.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    /// True when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.sent_to.is_none()
            && self.sent_from.is_none()
            && self.subject.is_none()
            && self.body.is_none()
            && self.received_after.is_none()
            && self.received_before.is_none()
    }

    /// Reject criteria that would target every message, or an inverted
    /// time range.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation(
                "at least one search filter must be set".into(),
            ));
        }
        if let (Some(after), Some(before)) = (self.received_after, self.received_before) {
            if after > before {
                return Err(Error::Validation(format!(
                    "received_after ({after}) is later than received_before ({before})"
                )));
            }
        }
        Ok(())
    }

    /// Time range as query parameters.
    pub(crate) fn time_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(after) = self.received_after {
            params.push((
                "receivedAfter",
                after.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        if let Some(before) = self.received_before {
            params.push((
                "receivedBefore",
                before.to_rfc3339_opts(SecondsFormat::Millis, true),
            ));
        }
        params
    }
}
