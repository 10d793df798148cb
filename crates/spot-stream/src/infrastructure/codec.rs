//! Frame codec - classifies inbound frames and builds outbound messages

use flate2::read::DeflateDecoder;
use std::io::Read;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::{InboundFrame, OutboundFrame, StreamPayload};
use crate::error::DecodeError;

/// Leading bytes of a compressed pong (raw deflate of `pong`)
pub const COMPRESSED_PONG_MAGIC: [u8; 6] = [0x2B, 0xC8, 0xCF, 0x4B, 0x07, 0x00];

/// Result of classifying an inbound frame
#[derive(Debug)]
pub enum Decoded {
    /// Regular payload for `on_response`
    Payload(StreamPayload),
    /// Counts as a heartbeat; carries the inflated payload (or why it failed)
    CompressedPong(Result<StreamPayload, DecodeError>),
    /// Protocol pong, counts as a heartbeat
    Pong,
    /// Protocol ping, answered by the transport
    Ping,
}

pub fn is_compressed_pong(bytes: &[u8]) -> bool {
    bytes.starts_with(&COMPRESSED_PONG_MAGIC)
}

/// Raw-deflate inflate
pub fn inflate(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = DeflateDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// JSON when it parses, text when it is UTF-8, raw bytes otherwise
fn inflated_payload(bytes: Vec<u8>) -> StreamPayload {
    match String::from_utf8(bytes) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(value) => StreamPayload::Json(value),
            Err(_) => StreamPayload::Text(text),
        },
        Err(e) => StreamPayload::Binary(e.into_bytes()),
    }
}

/// Classify and decode an inbound frame. Malformed JSON text is a `DecodeError`.
pub fn decode(frame: InboundFrame) -> Result<Decoded, DecodeError> {
    match frame {
        InboundFrame::Text(text) => {
            let value = serde_json::from_str(&text)?;
            Ok(Decoded::Payload(StreamPayload::Json(value)))
        }
        InboundFrame::Binary(bytes) if is_compressed_pong(&bytes) => Ok(Decoded::CompressedPong(
            inflate(&bytes).map(inflated_payload),
        )),
        InboundFrame::Binary(bytes) => Ok(Decoded::Payload(StreamPayload::Binary(bytes))),
        InboundFrame::Pong(_) => Ok(Decoded::Pong),
        InboundFrame::Ping(_) => Ok(Decoded::Ping),
    }
}

/// Map a socket message to an inbound frame. Close and raw frames map to `None`.
pub fn from_message(message: Message) -> Option<InboundFrame> {
    match message {
        Message::Text(text) => Some(InboundFrame::Text(text.to_string())),
        Message::Binary(bytes) => Some(InboundFrame::Binary(bytes.to_vec())),
        Message::Ping(bytes) => Some(InboundFrame::Ping(bytes.to_vec())),
        Message::Pong(bytes) => Some(InboundFrame::Pong(bytes.to_vec())),
        Message::Close(_) | Message::Frame(_) => None,
    }
}

pub fn to_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Text(text) => Message::Text(text.into()),
        OutboundFrame::Binary(bytes) => Message::Binary(bytes.into()),
        OutboundFrame::Ping => Message::Ping(Default::default()),
        OutboundFrame::Pong(bytes) => Message::Pong(bytes.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use serde_json::json;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_text_frame_decodes_json() {
        let decoded = decode(InboundFrame::Text(
            r#"{"e":"depthUpdate","s":"BTCUSDT"}"#.into(),
        ))
        .unwrap();
        match decoded {
            Decoded::Payload(StreamPayload::Json(value)) => {
                assert_eq!(value, json!({"e": "depthUpdate", "s": "BTCUSDT"}));
            }
            other => panic!("Expected JSON payload, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let result = decode(InboundFrame::Text("{not json".into()));
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_magic_bytes_are_compressed_pong() {
        assert_eq!(inflate(&COMPRESSED_PONG_MAGIC).unwrap(), b"pong".to_vec());

        let decoded = decode(InboundFrame::Binary(COMPRESSED_PONG_MAGIC.to_vec())).unwrap();
        match decoded {
            Decoded::CompressedPong(Ok(StreamPayload::Text(text))) => assert_eq!(text, "pong"),
            other => panic!("Expected inflated pong, got {:?}", other),
        }
    }

    #[test]
    fn test_compressed_pong_with_trailing_garbage_still_counts() {
        let mut bytes = COMPRESSED_PONG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        let decoded = decode(InboundFrame::Binary(bytes)).unwrap();
        assert!(matches!(decoded, Decoded::CompressedPong(_)));
    }

    #[test]
    fn test_other_binary_passes_through() {
        let bytes = vec![0x01, 0x02, 0x03];
        let decoded = decode(InboundFrame::Binary(bytes.clone())).unwrap();
        match decoded {
            Decoded::Payload(StreamPayload::Binary(out)) => assert_eq!(out, bytes),
            other => panic!("Expected binary passthrough, got {:?}", other),
        }
        // deflated JSON without the magic prefix is not a pong
        let compressed = deflate(br#"{"e":"trade"}"#);
        assert!(!is_compressed_pong(&compressed));
    }

    #[test]
    fn test_inflated_json_payload() {
        let payload = inflated_payload(br#"{"result":null,"id":1}"#.to_vec());
        assert_eq!(payload, StreamPayload::Json(json!({"result": null, "id": 1})));
    }

    #[test]
    fn test_protocol_control_frames() {
        assert!(matches!(
            decode(InboundFrame::Pong(Vec::new())).unwrap(),
            Decoded::Pong
        ));
        assert!(matches!(
            decode(InboundFrame::Ping(b"hi".to_vec())).unwrap(),
            Decoded::Ping
        ));
    }

    #[test]
    fn test_message_mapping() {
        assert!(matches!(to_message(OutboundFrame::Ping), Message::Ping(p) if p.is_empty()));
        assert_eq!(
            from_message(Message::Text("{}".into())),
            Some(InboundFrame::Text("{}".into()))
        );
        assert_eq!(
            from_message(Message::Binary(vec![1u8, 2].into())),
            Some(InboundFrame::Binary(vec![1, 2]))
        );
        assert_eq!(from_message(Message::Close(None)), None);
    }
}
