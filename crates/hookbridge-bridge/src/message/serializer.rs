//! JSON framing for bridge messages.

use bytes::Bytes;

use super::types::{HookMessage, HostMessage};

/// Serialize a main → hook message into a frame.
pub fn encode_host(msg: &HostMessage) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(msg).map(Bytes::from)
}

/// Deserialize a main → hook frame.
pub fn decode_host(frame: &[u8]) -> Result<HostMessage, serde_json::Error> {
    serde_json::from_slice(frame)
}

/// Serialize a hook → main message into a frame.
pub fn encode_hook(msg: &HookMessage) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(msg).map(Bytes::from)
}

/// Deserialize a hook → main frame.
pub fn decode_hook(frame: &[u8]) -> Result<HookMessage, serde_json::Error> {
    serde_json::from_slice(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookbridge_core::types::{InvocationId, InvocationResult, SourceBytes};

    #[test]
    fn test_source_bytes_cross_byte_exact() {
        let source = SourceBytes(vec![0xef, 0xbb, 0xbf, b'{', b'}', 0x00, 0xff]);
        let msg = HookMessage::fulfilled(
            InvocationId(9),
            InvocationResult::loaded("json", Some(source.clone())).short_circuited(),
        );
        let frame = encode_hook(&msg).unwrap();
        match decode_hook(&frame).unwrap() {
            HookMessage::Response {
                result: Some(result),
                ..
            } => assert_eq!(result.source, Some(source)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_garbage_frame_fails_to_decode() {
        assert!(decode_hook(b"{\"type\":\"response\"").is_err());
        assert!(decode_hook(b"{\"type\":\"teleport\"}").is_err());
    }

    #[test]
    fn test_shutdown_frame() {
        let frame = encode_host(&HostMessage::Shutdown).unwrap();
        assert_eq!(&frame[..], br#"{"type":"shutdown"}"#);
        assert_eq!(decode_host(&frame).unwrap(), HostMessage::Shutdown);
    }
}
