//! Helpers for driving a [`sysmon_core::Dispatcher`] over in-memory streams.
//!
//! The end-to-end tests live in `tests/` and pair these with the scripted
//! sampler from `sysmon_core::testing`.

use std::io::Cursor;

use serde_json::Value;
use sysmon_core::{Error, FrameCodec};

/// Concatenate one frame per request document.
pub fn request_stream(requests: &[Value]) -> Cursor<Vec<u8>> {
    let mut stream = Vec::new();
    for r in requests {
        stream.extend(raw_frame(r.to_string().as_bytes()));
    }
    Cursor::new(stream)
}

/// Raw frame for an arbitrary payload, bypassing JSON.
pub fn raw_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame
}

/// Split a response stream back into JSON documents.
///
/// Stops at end of stream. Any other framing error, or a payload that is not
/// JSON, is returned.
pub fn read_responses(out: Vec<u8>) -> Result<Vec<Value>, Error> {
    let codec = FrameCodec::new();
    let mut cursor = Cursor::new(out);
    let mut docs = Vec::new();
    loop {
        match codec.read_frame(&mut cursor) {
            Ok(payload) => docs.push(serde_json::from_slice(&payload).map_err(Error::Serialize)?),
            Err(Error::StreamClosed) => return Ok(docs),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_read_back_as_documents() {
        let docs = vec![json!({"type": "os"}), json!({"type": "echo", "message": "é\u{0}"})];
        let stream = request_stream(&docs).into_inner();
        assert_eq!(read_responses(stream).unwrap(), docs);
    }

    #[test]
    fn raw_frame_is_length_prefixed() {
        assert_eq!(raw_frame(b"hi"), vec![2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn garbage_response_is_an_error() {
        assert!(matches!(
            read_responses(raw_frame(b"not json")),
            Err(Error::Serialize(_))
        ));
    }
}
