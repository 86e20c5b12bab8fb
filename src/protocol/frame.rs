//! Length-prefixed frame codec.
//!
//! Every unit of wire data is a frame: a 4-byte little-endian unsigned
//! length `L` followed by exactly `L` bytes of payload.
//!
//! A request payload decomposes further as a 4-byte count `N`, then `N`
//! entries of (4-byte length, raw bytes). A response payload is a 4-byte
//! status code followed by an opaque body.
//!
//! Decoding is incremental and non-destructive: it inspects the buffer
//! without consuming it, and the caller removes the decoded frame's bytes
//! only after processing.

use thiserror::Error;

/// Size of the length prefix preceding every frame.
pub const HEADER_LEN: usize = 4;

/// Default ceiling on a frame payload.
pub const DEFAULT_MAX_FRAME: usize = 32 * 1024 * 1024;

/// Protocol errors. All of them are connection-fatal: the offending
/// connection is torn down, others are unaffected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Declared payload length exceeds the configured maximum.
    #[error("frame payload of {len} bytes exceeds maximum {max}")]
    Oversized { len: usize, max: usize },

    /// Request payload does not decompose cleanly into count + strings.
    #[error("malformed request payload: {0}")]
    Malformed(&'static str),

    /// Buffered data would exceed the per-connection cap.
    #[error("read buffer would exceed {max} buffered bytes")]
    BufferLimit { max: usize },
}

/// Response status codes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    Error = 1,
    NotFound = 2,
}

impl Status {
    /// Decode a wire status code.
    pub fn from_wire(code: u32) -> Option<Status> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Error),
            2 => Some(Status::NotFound),
            _ => None,
        }
    }
}

/// Result of attempting to decode one frame from the head of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Decode<'a> {
    /// A complete frame: its payload and the total bytes it occupies in the
    /// buffer, header included. The caller consumes `frame_len` bytes after
    /// processing.
    Complete { payload: &'a [u8], frame_len: usize },
    /// Not enough buffered bytes yet. Never an error.
    Incomplete,
    /// The declared length violates the configured maximum.
    Error(FrameError),
}

/// Attempt to decode one frame from the head of `buf`.
pub fn decode(buf: &[u8], max_payload: usize) -> Decode<'_> {
    if buf.len() < HEADER_LEN {
        return Decode::Incomplete;
    }
    let len = read_u32_le(buf, 0) as usize;
    if len > max_payload {
        return Decode::Error(FrameError::Oversized {
            len,
            max: max_payload,
        });
    }
    if buf.len() < HEADER_LEN + len {
        return Decode::Incomplete;
    }
    Decode::Complete {
        payload: &buf[HEADER_LEN..HEADER_LEN + len],
        frame_len: HEADER_LEN + len,
    }
}

/// Decompose a request payload into its argument vector.
///
/// The count field precedes the strings; total consumed bytes must match the
/// payload length exactly. A zero-length payload is a valid empty request.
pub fn parse_request(payload: &[u8]) -> Result<Vec<Vec<u8>>, FrameError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    if payload.len() < 4 {
        return Err(FrameError::Malformed("truncated count field"));
    }

    let count = read_u32_le(payload, 0) as usize;
    let mut args = Vec::with_capacity(count.min(64));
    let mut pos = 4;

    for _ in 0..count {
        if payload.len() - pos < 4 {
            return Err(FrameError::Malformed("truncated string header"));
        }
        let len = read_u32_le(payload, pos) as usize;
        pos += 4;
        if payload.len() - pos < len {
            return Err(FrameError::Malformed("string overruns payload"));
        }
        args.push(payload[pos..pos + len].to_vec());
        pos += len;
    }

    if pos != payload.len() {
        return Err(FrameError::Malformed("trailing bytes after last string"));
    }

    Ok(args)
}

/// Encode an argument vector as a request frame, outer length prefix
/// included.
pub fn encode_request<S: AsRef<[u8]>>(args: &[S]) -> Vec<u8> {
    let payload_len = 4 + args
        .iter()
        .map(|a| 4 + a.as_ref().len())
        .sum::<usize>();

    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    out.extend_from_slice(&(payload_len as u32).to_le_bytes());
    out.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        out.extend_from_slice(arg);
    }
    out
}

/// Encode a response frame: status code plus opaque body.
pub fn encode_response(status: Status, body: &[u8]) -> Vec<u8> {
    let payload_len = 4 + body.len();
    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    out.extend_from_slice(&(payload_len as u32).to_le_bytes());
    out.extend_from_slice(&(status as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// A decoded response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub body: Vec<u8>,
}

/// Result of attempting to decode one response frame.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeResponse {
    /// A complete response and the total bytes it occupies in the buffer.
    Complete {
        response: Response,
        frame_len: usize,
    },
    /// Not enough buffered bytes yet.
    Incomplete,
    /// The frame is oversized or carries an invalid status code.
    Error(FrameError),
}

/// Attempt to decode one response frame from the head of `buf`.
pub fn decode_response(buf: &[u8], max_payload: usize) -> DecodeResponse {
    let (payload, frame_len) = match decode(buf, max_payload) {
        Decode::Complete { payload, frame_len } => (payload, frame_len),
        Decode::Incomplete => return DecodeResponse::Incomplete,
        Decode::Error(e) => return DecodeResponse::Error(e),
    };

    if payload.len() < 4 {
        return DecodeResponse::Error(FrameError::Malformed("response shorter than status code"));
    }
    let Some(status) = Status::from_wire(read_u32_le(payload, 0)) else {
        return DecodeResponse::Error(FrameError::Malformed("unknown status code"));
    };

    DecodeResponse::Complete {
        response: Response {
            status,
            body: payload[4..].to_vec(),
        },
        frame_len,
    }
}

fn read_u32_le(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let args: Vec<&[u8]> = vec![b"set", b"a", b"1"];
        let encoded = encode_request(&args);

        match decode(&encoded, DEFAULT_MAX_FRAME) {
            Decode::Complete { payload, frame_len } => {
                assert_eq!(frame_len, encoded.len());
                let parsed = parse_request(payload).unwrap();
                assert_eq!(parsed, vec![b"set".to_vec(), b"a".to_vec(), b"1".to_vec()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_incomplete_header() {
        assert_eq!(decode(b"", DEFAULT_MAX_FRAME), Decode::Incomplete);
        assert_eq!(decode(&[7, 0], DEFAULT_MAX_FRAME), Decode::Incomplete);
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let encoded = encode_request(&[b"get".as_ref(), b"key"]);
        for cut in HEADER_LEN..encoded.len() {
            assert_eq!(decode(&encoded[..cut], DEFAULT_MAX_FRAME), Decode::Incomplete);
        }
    }

    #[test]
    fn test_decode_oversized() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u32.to_le_bytes());
        match decode(&buf, 64) {
            Decode::Error(FrameError::Oversized { len: 100, max: 64 }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_zero_length_payload_is_empty_request() {
        let buf = 0u32.to_le_bytes();
        match decode(&buf, DEFAULT_MAX_FRAME) {
            Decode::Complete { payload, frame_len } => {
                assert!(payload.is_empty());
                assert_eq!(frame_len, 4);
                assert_eq!(parse_request(payload).unwrap(), Vec::<Vec<u8>>::new());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_zero_count_is_empty_request() {
        let encoded = encode_request::<&[u8]>(&[]);
        match decode(&encoded, DEFAULT_MAX_FRAME) {
            Decode::Complete { payload, .. } => {
                assert_eq!(parse_request(payload).unwrap(), Vec::<Vec<u8>>::new());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_truncated_string() {
        // count = 1 but no string follows
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes());
        assert_eq!(
            parse_request(&payload),
            Err(FrameError::Malformed("truncated string header"))
        );

        // string header declares more bytes than the payload holds
        payload.extend_from_slice(&10u32.to_le_bytes());
        payload.extend_from_slice(b"abc");
        assert_eq!(
            parse_request(&payload),
            Err(FrameError::Malformed("string overruns payload"))
        );
    }

    #[test]
    fn test_parse_request_trailing_bytes() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(b"get");
        payload.push(0xff);
        assert_eq!(
            parse_request(&payload),
            Err(FrameError::Malformed("trailing bytes after last string"))
        );
    }

    #[test]
    fn test_binary_safe_arguments() {
        let args: Vec<Vec<u8>> = vec![b"set".to_vec(), vec![0, 1, 2, 255], vec![b'\r', b'\n', 0]];
        let encoded = encode_request(&args);
        match decode(&encoded, DEFAULT_MAX_FRAME) {
            Decode::Complete { payload, .. } => {
                assert_eq!(parse_request(payload).unwrap(), args);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_response_round_trip() {
        let encoded = encode_response(Status::Ok, b"hello");
        match decode_response(&encoded, DEFAULT_MAX_FRAME) {
            DecodeResponse::Complete { response, frame_len } => {
                assert_eq!(frame_len, encoded.len());
                assert_eq!(response.status, Status::Ok);
                assert_eq!(response.body, b"hello");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_response_status_codes() {
        for (status, code) in [
            (Status::Ok, 0u32),
            (Status::Error, 1),
            (Status::NotFound, 2),
        ] {
            let encoded = encode_response(status, b"");
            assert_eq!(read_u32_le(&encoded, HEADER_LEN), code);
            assert_eq!(Status::from_wire(code), Some(status));
        }
        assert_eq!(Status::from_wire(9), None);
    }

    #[test]
    fn test_decode_response_malformed() {
        // total length shorter than the status field
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u32.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        match decode_response(&buf, DEFAULT_MAX_FRAME) {
            DecodeResponse::Error(FrameError::Malformed(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }

        // unknown status code
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&9u32.to_le_bytes());
        match decode_response(&buf, DEFAULT_MAX_FRAME) {
            DecodeResponse::Error(FrameError::Malformed("unknown status code")) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
