//! Outbound notifications.
//!
//! The bot only needs fire-and-forget delivery with a success/failure
//! report. Transports implement [`NotificationSink`].

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Rendering of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Markdown,
}

/// A message for the group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub title: Option<String>,
    pub body: String,
    /// Mention everyone in the group.
    pub mention_all: bool,
}

impl Message {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            title: None,
            body: body.into(),
            mention_all: false,
        }
    }

    pub fn markdown(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Markdown,
            title: Some(title.into()),
            body: body.into(),
            mention_all: false,
        }
    }

    pub fn with_mention_all(mut self) -> Self {
        self.mention_all = true;
        self
    }

    /// First characters of the body, for log lines.
    pub fn snapshot(&self) -> String {
        let mut snapshot: String = self.body.chars().take(50).collect();
        if self.body.chars().count() > 50 {
            snapshot.push_str("...");
        }
        snapshot
    }
}

/// Delivers messages to the group chat.
pub trait NotificationSink {
    fn send(&self, message: &Message) -> Result<()>;
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn send(&self, message: &Message) -> Result<()> {
        (**self).send(message)
    }
}

impl<S: NotificationSink + ?Sized> NotificationSink for Box<S> {
    fn send(&self, message: &Message) -> Result<()> {
        (**self).send(message)
    }
}

/// Writes every message to the log instead of a chat.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, message: &Message) -> Result<()> {
        info!(
            kind = ?message.kind,
            title = message.title.as_deref().unwrap_or(""),
            mention_all = message.mention_all,
            "message:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Keeps every message in memory. Optionally fails every send.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Message>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records nothing and reports every send as failed.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<Message> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.sent.lock() {
            Ok(mut sent) => sent.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, message: &Message) -> Result<()> {
        if self.fail {
            return Err(Error::Notify("sink configured to fail".to_string()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| Error::Notify("recording sink lock poisoned".to_string()))?;
        sent.push(message.clone());
        Ok(())
    }
}
