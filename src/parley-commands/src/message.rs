//! Transport boundary: inbound messages and outbound delivery.
//!
//! The dispatcher never talks to a chat platform directly. It receives an
//! [`IncomingMessage`] and writes replies through a [`MessageSink`].

use parking_lot::Mutex;

use crate::error::DeliveryError;
use crate::help::HelpDocument;

/// A chat message that may contain a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Raw message text.
    pub content: String,
    /// Channel the message was posted in; replies go here.
    pub channel_id: String,
    /// Permission groups of the author.
    pub groups: Vec<String>,
    /// Author identifier, if the transport provides one.
    pub author: Option<String>,
}

impl IncomingMessage {
    pub fn new(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            channel_id: channel_id.into(),
            groups: Vec::new(),
            author: None,
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Outbound delivery to the chat platform.
pub trait MessageSink: Send + Sync {
    /// Post plain text to a channel.
    fn send_text(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError>;

    /// Post a help document to a channel.
    fn send_help(&self, channel_id: &str, help: &HelpDocument) -> Result<(), DeliveryError>;
}

/// Something a [`RecordingSink`] was asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Text { channel_id: String, text: String },
    Help { channel_id: String, help: HelpDocument },
}

/// In-memory sink that keeps every delivery, in order.
///
/// Useful for tests and for transports that batch replies.
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Text { text, .. } => Some(text.clone()),
                Delivery::Help { .. } => None,
            })
            .collect()
    }

    pub fn helps(&self) -> Vec<HelpDocument> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Help { help, .. } => Some(help.clone()),
                Delivery::Text { .. } => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }
}

impl MessageSink for RecordingSink {
    fn send_text(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.deliveries.lock().push(Delivery::Text {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn send_help(&self, channel_id: &str, help: &HelpDocument) -> Result<(), DeliveryError> {
        self.deliveries.lock().push(Delivery::Help {
            channel_id: channel_id.to_string(),
            help: help.clone(),
        });
        Ok(())
    }
}
