//! # Message Decoder
//!
//! Transcodes a binary payload into a generic [`Message`] given only the call path it travelled
//! on and its [`Direction`].
//!
//! ## How it works
//!
//! 1. The call path is parsed into `(service, method)`.
//! 2. The service and then the method are looked up in the current registry snapshot.
//! 3. The direction selects the schema: `First` (request) uses the method input, `Second`
//!    (response) the method output.
//! 4. The payload is deserialized against the schema by the [`wire`](crate::wire) reader. Field
//!    numbers the schema does not declare are rejected.
//! 5. The decoded message is converted into the generic tree by [`tree::convert`].
//!
//! Decoding holds no shared mutable state: any number of threads can decode concurrently, and a
//! registry published mid-call only affects calls that start afterwards.
use crate::{
    call_path::{CallPath, CallPathError},
    registry::{Direction, LookupError, SharedRegistry},
    tree::{self, ConvertOptions, Message},
    wire::{self, WireError},
};
use prost_reflect::MessageDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid argument: malformed call path")]
    InvalidCallPath(#[from] CallPathError),

    #[error(transparent)]
    NotFound(#[from] LookupError),

    #[error("Unknown field number {number} in message '{message}'")]
    UnknownField { message: String, number: u32 },

    #[error("Payload is not a valid '{message}'")]
    MalformedPayload {
        message: String,
        #[source]
        source: WireError,
    },
}

/// Decodes binary payloads into generic messages.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    registry: SharedRegistry,
    options: ConvertOptions,
}

impl MessageDecoder {
    pub fn new(registry: impl Into<SharedRegistry>) -> Self {
        Self {
            registry: registry.into(),
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Decodes `payload`, resolving its schema from `call_path` and `direction`.
    ///
    /// # Arguments
    ///
    /// * `payload` - The binary protobuf message.
    /// * `call_path` - The gRPC path the payload travelled on (e.g. `/my.package.Service/Method`).
    /// * `direction` - Whether the payload is the request (`First`) or the response (`Second`).
    ///
    /// # Returns
    ///
    /// * `Ok(Message)` - The generic field tree.
    /// * `Err(DecodeError)` - If the call path is malformed, the service or method is not
    ///   registered, or the payload does not match the schema.
    pub fn decode(
        &self,
        payload: &[u8],
        call_path: &str,
        direction: Direction,
    ) -> Result<Message, DecodeError> {
        let descriptor = self.resolve(call_path, direction)?;
        self.decode_with_descriptor(payload, descriptor)
    }

    /// Resolves the schema a payload on `call_path` in `direction` must follow.
    pub fn resolve(
        &self,
        call_path: &str,
        direction: Direction,
    ) -> Result<MessageDescriptor, DecodeError> {
        let call_path = CallPath::parse(call_path)?;
        Ok(self.registry.snapshot().resolve(&call_path, direction)?)
    }

    /// Decodes `payload` against an already resolved schema.
    pub fn decode_with_descriptor(
        &self,
        payload: &[u8],
        descriptor: MessageDescriptor,
    ) -> Result<Message, DecodeError> {
        let message_name = descriptor.full_name().to_string();

        let decoded = wire::decode_message(descriptor, payload).map_err(|err| match err {
            WireError::UnknownField { message, number } => {
                DecodeError::UnknownField { message, number }
            }
            source => DecodeError::MalformedPayload {
                message: message_name.clone(),
                source,
            },
        })?;

        tracing::debug!(
            message = %message_name,
            bytes = payload.len(),
            fields = decoded.fields().count(),
            "decoded payload"
        );

        Ok(tree::convert(&decoded, &self.options))
    }
}
