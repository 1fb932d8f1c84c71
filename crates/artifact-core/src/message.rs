//! Domain messages and raw network stanzas
//!
//! A [`Stanza`] is what travels over a session: a kind, routing addresses
//! and an opaque payload. A [`Message`] is the structured form artifact logic
//! works with. A [`Codec`](crate::codec::Codec) converts between the two.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::Jid;

/// Kind of a network message stanza
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StanzaKind {
    /// One-to-one chat message
    #[default]
    Chat,
    /// Standalone message outside a conversation
    Normal,
    /// Multi-user room message
    GroupChat,
    /// Alert or notification, no reply expected
    Headline,
    /// Error bounce
    Error,
}

impl fmt::Display for StanzaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StanzaKind::Chat => "chat",
            StanzaKind::Normal => "normal",
            StanzaKind::GroupChat => "groupchat",
            StanzaKind::Headline => "headline",
            StanzaKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// Raw message as carried by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stanza {
    /// Stanza kind
    pub kind: StanzaKind,
    /// Sender (stamped by the server on delivery)
    pub from: Option<Jid>,
    /// Recipient
    pub to: Jid,
    /// Encoded message content
    pub payload: Vec<u8>,
}

impl Stanza {
    /// Create a stanza
    pub fn new(kind: StanzaKind, from: Option<Jid>, to: Jid, payload: Vec<u8>) -> Self {
        Self {
            kind,
            from,
            to,
            payload,
        }
    }
}

/// A structured message exchanged between artifacts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Sender; defaulted to the sending artifact's identity on send
    pub sender: Option<Jid>,
    /// Recipient
    pub to: Option<Jid>,
    /// Message body
    pub body: Option<String>,
    /// Conversation thread identifier
    pub thread: Option<String>,
    /// Free-form metadata
    pub metadata: BTreeMap<String, String>,
    /// Set once the message has been handed to the network
    #[serde(skip)]
    pub sent: bool,
}

impl Message {
    /// Create an empty message addressed to `to`
    pub fn new(to: Jid) -> Self {
        Self {
            to: Some(to),
            ..Self::default()
        }
    }

    /// Create a message with a text body
    pub fn text(to: Jid, body: impl Into<String>) -> Self {
        Self::new(to).with_body(body)
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the thread
    pub fn with_thread(mut self, thread: impl Into<String>) -> Self {
        self.thread = Some(thread.into());
        self
    }

    /// Set the sender explicitly
    pub fn with_sender(mut self, sender: Jid) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a metadata entry
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Build a reply: addressed to our sender, same thread
    pub fn make_reply(&self) -> Self {
        Self {
            to: self.sender.clone(),
            thread: self.thread.clone(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.sender.as_ref().map(Jid::to_string);
        let to = self.to.as_ref().map(Jid::to_string);
        write!(
            f,
            "<message from={:?} to={:?} thread={:?}>{}</message>",
            from,
            to,
            self.thread,
            self.body.as_deref().unwrap_or_default()
        )
    }
}

/// Selects which inbound stanzas are delivered to the mailbox
///
/// `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Required stanza kind
    pub kind: Option<StanzaKind>,
    /// Required sender
    pub from: Option<Jid>,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self::chat()
    }
}

impl MessageFilter {
    /// Chat messages from anyone
    pub fn chat() -> Self {
        Self {
            kind: Some(StanzaKind::Chat),
            from: None,
        }
    }

    /// Every stanza kind, from anyone
    pub fn any() -> Self {
        Self {
            kind: None,
            from: None,
        }
    }

    /// Restrict to a single sender
    pub fn from_sender(mut self, sender: Jid) -> Self {
        self.from = Some(sender);
        self
    }

    /// Whether a stanza addressed to `local` passes this filter
    pub fn matches(&self, stanza: &Stanza, local: &Jid) -> bool {
        if &stanza.to != local {
            return false;
        }
        if let Some(kind) = self.kind {
            if stanza.kind != kind {
                return false;
            }
        }
        match &self.from {
            Some(from) => stanza.from.as_ref() == Some(from),
            None => true,
        }
    }
}
