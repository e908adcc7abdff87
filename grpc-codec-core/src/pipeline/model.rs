use crate::{registry::Direction, tree::Message};
use bytes::Bytes;
use std::{collections::HashMap, time::SystemTime};

/// Identifies a message within a session stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub session_alias: String,
    pub direction: Direction,
    pub sequence: u64,
}

impl MessageId {
    pub fn new(session_alias: impl Into<String>, direction: Direction, sequence: u64) -> Self {
        Self {
            session_alias: session_alias.into(),
            direction,
            sequence,
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.session_alias, self.direction, self.sequence)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMessageMetadata {
    pub id: MessageId,
    pub timestamp: Option<SystemTime>,
    pub properties: HashMap<String, String>,
    pub protocol: String,
}

/// A message as captured on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub metadata: RawMessageMetadata,
    pub parent_event_id: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageMetadata {
    pub id: MessageId,
    pub timestamp: Option<SystemTime>,
    pub protocol: String,
    pub message_type: String,
    pub properties: HashMap<String, String>,
}

/// A message whose body has been transcoded into a generic tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub metadata: MessageMetadata,
    pub parent_event_id: Option<String>,
    pub body: Message,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnyMessage {
    Raw(RawMessage),
    Parsed(ParsedMessage),
}

impl AnyMessage {
    pub fn is_raw(&self) -> bool {
        matches!(self, AnyMessage::Raw(_))
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, AnyMessage::Parsed(_))
    }
}

impl From<RawMessage> for AnyMessage {
    fn from(value: RawMessage) -> Self {
        AnyMessage::Raw(value)
    }
}

impl From<ParsedMessage> for AnyMessage {
    fn from(value: ParsedMessage) -> Self {
        AnyMessage::Parsed(value)
    }
}

/// An ordered batch of messages processed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageGroup {
    pub messages: Vec<AnyMessage>,
}

impl MessageGroup {
    pub fn new(messages: Vec<AnyMessage>) -> Self {
        Self { messages }
    }
}
