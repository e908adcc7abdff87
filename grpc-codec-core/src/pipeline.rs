//! # Pipeline Codec
//!
//! Adapts the message codec to a message pipeline that moves [`MessageGroup`]s around.
//!
//! Raw messages carry their call path in the [`GRPC_CALL`] property and their direction in the
//! message id. Decoding turns every raw message of a group into a parsed one; a message that
//! cannot be decoded does not fail the group, it is replaced by a [`ERROR_MESSAGE_TYPE`] message
//! describing what went wrong. Encoding is the reverse operation and fails the whole group on
//! the first error.
use crate::{
    decoder::{DecodeError, MessageDecoder},
    encoder::{EncodeError, MessageEncoder},
    registry::SharedRegistry,
    tree::{ConvertOptions, Message, Value},
};

pub mod factory;
mod model;

pub use model::{
    AnyMessage, MessageGroup, MessageId, MessageMetadata, ParsedMessage, RawMessage,
    RawMessageMetadata,
};

/// Message property holding the gRPC call path (`/Service/Method`).
pub const GRPC_CALL: &str = "GRPC_CALL";
/// Protocol stamped on every message produced by this codec.
pub const PROTOCOL: &str = "grpc";
/// Message type of the messages replacing payloads that failed to decode.
pub const ERROR_MESSAGE_TYPE: &str = "codec-error";
/// Field of an error message holding the error description.
pub const ERROR_CONTENT_FIELD: &str = "content";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid argument: message '{0}' has no 'GRPC_CALL' property")]
    MissingCallProperty(MessageId),

    #[error("Failed to decode message '{id}'")]
    Decode {
        id: MessageId,
        #[source]
        source: DecodeError,
    },

    #[error("Failed to encode message '{id}'")]
    Encode {
        id: MessageId,
        #[source]
        source: EncodeError,
    },
}

/// Decodes and encodes message groups carrying gRPC payloads.
#[derive(Debug, Clone)]
pub struct PipelineCodec {
    decoder: MessageDecoder,
    encoder: MessageEncoder,
}

impl PipelineCodec {
    pub fn new(registry: impl Into<SharedRegistry>, options: ConvertOptions) -> Self {
        let registry = registry.into();
        Self {
            decoder: MessageDecoder::new(registry.clone()).with_options(options),
            encoder: MessageEncoder::new(registry),
        }
    }

    /// Decodes every raw message of `group`.
    ///
    /// Groups without raw messages are returned untouched and already parsed messages are kept as
    /// they are. The order of the messages is preserved.
    pub fn decode(&self, group: MessageGroup) -> MessageGroup {
        if !group.messages.iter().any(AnyMessage::is_raw) {
            return group;
        }

        let messages = group
            .messages
            .into_iter()
            .map(|message| match message {
                AnyMessage::Raw(raw) => AnyMessage::Parsed(self.parse(raw)),
                parsed => parsed,
            })
            .collect();

        MessageGroup { messages }
    }

    fn parse(&self, raw: RawMessage) -> ParsedMessage {
        match self.decode_message(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::error!(
                    id = %raw.metadata.id,
                    error = %err,
                    "cannot decode message, replacing it with an error message"
                );
                error_message(raw, &err)
            }
        }
    }

    /// Decodes a single raw message.
    ///
    /// The parsed message keeps the id, timestamp, properties and parent event of the raw one,
    /// and is typed after the schema message its body was decoded against.
    pub fn decode_message(&self, raw: &RawMessage) -> Result<ParsedMessage, PipelineError> {
        let id = &raw.metadata.id;
        let call_path = call_path(&raw.metadata.properties, id)?;

        let decode_err = |source: DecodeError| PipelineError::Decode {
            id: id.clone(),
            source,
        };
        let descriptor = self
            .decoder
            .resolve(call_path, id.direction)
            .map_err(decode_err)?;
        let message_type = descriptor.name().to_string();
        let body = self
            .decoder
            .decode_with_descriptor(&raw.body, descriptor)
            .map_err(decode_err)?;

        Ok(ParsedMessage {
            metadata: MessageMetadata {
                id: id.clone(),
                timestamp: raw.metadata.timestamp,
                protocol: PROTOCOL.to_string(),
                message_type,
                properties: raw.metadata.properties.clone(),
            },
            parent_event_id: raw.parent_event_id.clone(),
            body,
        })
    }

    /// Encodes every parsed message of `group` that belongs to this protocol.
    ///
    /// Messages of another protocol, error messages and raw messages pass through unchanged.
    pub fn encode(&self, group: MessageGroup) -> Result<MessageGroup, PipelineError> {
        let messages = group
            .messages
            .into_iter()
            .map(|message| match message {
                AnyMessage::Parsed(parsed) if is_encodable(&parsed) => {
                    self.encode_message(parsed).map(AnyMessage::Raw)
                }
                other => Ok(other),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessageGroup { messages })
    }

    /// Encodes a single parsed message back into its binary form.
    pub fn encode_message(&self, parsed: ParsedMessage) -> Result<RawMessage, PipelineError> {
        let id = parsed.metadata.id;
        let call_path = call_path(&parsed.metadata.properties, &id)?;

        let body = match self.encoder.encode(&parsed.body, call_path, id.direction) {
            Ok(body) => body,
            Err(source) => return Err(PipelineError::Encode { id, source }),
        };

        Ok(RawMessage {
            metadata: RawMessageMetadata {
                id,
                timestamp: parsed.metadata.timestamp,
                properties: parsed.metadata.properties,
                protocol: PROTOCOL.to_string(),
            },
            parent_event_id: parsed.parent_event_id,
            body: body.into(),
        })
    }
}

fn call_path<'a>(
    properties: &'a std::collections::HashMap<String, String>,
    id: &MessageId,
) -> Result<&'a str, PipelineError> {
    properties
        .get(GRPC_CALL)
        .map(String::as_str)
        .ok_or_else(|| PipelineError::MissingCallProperty(id.clone()))
}

fn is_encodable(parsed: &ParsedMessage) -> bool {
    let protocol = parsed.metadata.protocol.as_str();
    (protocol.is_empty() || protocol == PROTOCOL)
        && parsed.metadata.message_type != ERROR_MESSAGE_TYPE
}

/// Builds the message standing in for a raw message that failed to decode.
fn error_message(raw: RawMessage, err: &PipelineError) -> ParsedMessage {
    let body: Message = [(ERROR_CONTENT_FIELD, Value::Simple(error_chain(err)))]
        .into_iter()
        .collect();

    ParsedMessage {
        metadata: MessageMetadata {
            id: raw.metadata.id,
            timestamp: raw.metadata.timestamp,
            protocol: PROTOCOL.to_string(),
            message_type: ERROR_MESSAGE_TYPE.to_string(),
            properties: raw.metadata.properties,
        },
        parent_event_id: raw.parent_event_id,
        body,
    }
}

/// Renders `err` and all of its sources as `Caused by: <message>. ` segments.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    std::iter::successors(Some(err), |err| err.source())
        .map(|err| format!("Caused by: {err}. "))
        .collect()
}
