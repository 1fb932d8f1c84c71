//! Wire codec between [`Message`] and [`Stanza`]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::message::{Message, Stanza, StanzaKind};

/// Converts domain messages to network stanzas and back
pub trait Codec: Send + Sync {
    /// Encode an outbound message
    fn encode(&self, message: &Message) -> Result<Stanza, CodecError>;

    /// Decode an inbound stanza
    fn decode(&self, stanza: &Stanza) -> Result<Message, CodecError>;
}

/// Payload carried inside a stanza by [`PostcardCodec`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MessagePayload {
    body: Option<String>,
    thread: Option<String>,
    metadata: BTreeMap<String, String>,
}

/// Default codec: chat stanzas with a postcard-encoded payload
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardCodec {
    kind: StanzaKind,
}

impl PostcardCodec {
    /// Codec producing chat stanzas
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec producing stanzas of the given kind
    pub fn with_kind(kind: StanzaKind) -> Self {
        Self { kind }
    }
}

impl Codec for PostcardCodec {
    fn encode(&self, message: &Message) -> Result<Stanza, CodecError> {
        let to = message
            .to
            .clone()
            .ok_or_else(|| CodecError::Encode("message has no recipient".into()))?;

        let payload = MessagePayload {
            body: message.body.clone(),
            thread: message.thread.clone(),
            metadata: message.metadata.clone(),
        };
        let payload = postcard::to_allocvec(&payload).map_err(|e| CodecError::Encode(e.to_string()))?;

        Ok(Stanza::new(self.kind, message.sender.clone(), to, payload))
    }

    fn decode(&self, stanza: &Stanza) -> Result<Message, CodecError> {
        if stanza.kind == StanzaKind::Error {
            return Err(CodecError::UnsupportedKind(stanza.kind.to_string()));
        }

        let payload: MessagePayload = postcard::from_bytes(&stanza.payload)?;

        Ok(Message {
            sender: stanza.from.clone(),
            to: Some(stanza.to.clone()),
            body: payload.body,
            thread: payload.thread,
            metadata: payload.metadata,
            sent: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Jid;

    #[test]
    fn test_encode_carries_addresses() {
        let codec = PostcardCodec::new();
        let msg = Message::text(Jid::parse("b@x.org").unwrap(), "hi")
            .with_sender(Jid::parse("a@x.org").unwrap());

        let stanza = codec.encode(&msg).unwrap();
        assert_eq!(stanza.kind, StanzaKind::Chat);
        assert_eq!(stanza.from, msg.sender);
        assert_eq!(Some(stanza.to.clone()), msg.to);

        let decoded = codec.decode(&stanza).unwrap();
        assert_eq!(decoded.body.as_deref(), Some("hi"));
        assert!(!decoded.sent);
    }

    #[test]
    fn test_encode_requires_recipient() {
        let codec = PostcardCodec::new();
        let msg = Message::default().with_body("lost");
        assert!(matches!(codec.encode(&msg), Err(CodecError::Encode(_))));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = PostcardCodec::new();
        let stanza = Stanza::new(
            StanzaKind::Chat,
            None,
            Jid::parse("b@x.org").unwrap(),
            vec![0xff, 0xff, 0xff],
        );
        assert!(matches!(
            codec.decode(&stanza),
            Err(CodecError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_error_bounces() {
        let codec = PostcardCodec::new();
        let stanza = Stanza::new(StanzaKind::Error, None, Jid::parse("b@x.org").unwrap(), vec![]);
        assert!(matches!(
            codec.decode(&stanza),
            Err(CodecError::UnsupportedKind(_))
        ));
    }
}
