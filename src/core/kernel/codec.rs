use crate::core::errors::ExchangeError;

/// Turns the payload of one WebSocket data frame into a typed message.
///
/// Control frames (ping, pong, close) never reach a codec; the transport
/// handles them. A codec sees text and binary payloads only.
pub trait WsCodec: Send + Sync + 'static {
    /// The type produced for each frame
    type Message: Send;

    /// Decode one frame payload.
    ///
    /// Returns `DecodeError` for malformed payloads and `UnknownStreamType`
    /// when the payload is well-formed but names something no decoder handles.
    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError>;
}

/// Passes payloads through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl WsCodec for RawCodec {
    type Message = Vec<u8>;

    fn decode_message(&self, payload: &[u8]) -> Result<Self::Message, ExchangeError> {
        Ok(payload.to_vec())
    }
}
