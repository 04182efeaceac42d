// Length-delimited message framing over TCP, with close frames.
//
// Wire format of one frame:
//
//   [len: u32 BE][opcode: u8][payload: len - 1 bytes]
//
// `len` counts the opcode byte plus the payload. Opcodes reuse WebSocket
// numbering so the close-code convention carries over unchanged:
// - `OP_DATA`  (0x1): payload is one JSON-serialized message;
// - `OP_CLOSE` (0x8): payload is a 2-byte BE close code then a UTF-8 reason.
//
// A `MAX_MESSAGE_SIZE` constant (16 MB) protects against unbounded allocation
// from malformed or malicious length prefixes. Start messages replaying a long
// turn history are the largest expected frames.
//
// A peer that disappears without sending a close frame is reported by the
// socket layer as `CloseCode::ABNORMAL`, matching WebSocket semantics.
// Reserved codes (`ABNORMAL` among them) are local status only and are
// never written into a close frame.

use std::io::{self, Read, Write};

/// Maximum allowed frame size (16 MB), opcode included.
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

pub const OP_DATA: u8 = 0x1;
pub const OP_CLOSE: u8 = 0x8;

/// Close status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Intentional close (leave game). Suppresses reconnection.
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// The authority is shutting down.
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    /// Connection lost without a close frame. Reserved.
    pub const ABNORMAL: CloseCode = CloseCode(1006);
    /// The sender hit an unexpected condition, such as a socket error.
    pub const INTERNAL_ERROR: CloseCode = CloseCode(1011);

    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }

    /// Codes that report a local condition and must not appear on the
    /// wire (no status, abnormal closure, TLS failure).
    pub fn is_reserved(self) -> bool {
        matches!(self.0, 1005 | 1006 | 1015)
    }
}

/// One decoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Data(Vec<u8>),
    Close { code: CloseCode, reason: String },
}

/// Write a data frame carrying `msg`.
pub fn write_message<W: Write>(writer: &mut W, msg: &[u8]) -> io::Result<()> {
    write_raw(writer, OP_DATA, msg)
}

/// Write a close frame. Reserved codes are refused with `InvalidInput`.
pub fn write_close<W: Write>(writer: &mut W, code: CloseCode, reason: &str) -> io::Result<()> {
    if code.is_reserved() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("close code {} is reserved", code.0),
        ));
    }
    let mut payload = Vec::with_capacity(2 + reason.len());
    payload.extend_from_slice(&code.0.to_be_bytes());
    payload.extend_from_slice(reason.as_bytes());
    write_raw(writer, OP_CLOSE, &payload)
}

fn write_raw<W: Write>(writer: &mut W, opcode: u8, payload: &[u8]) -> io::Result<()> {
    let len = payload.len() + 1;
    let len = match u32::try_from(len) {
        Ok(len) if len <= MAX_MESSAGE_SIZE => len,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("message too large: {len} bytes (max {MAX_MESSAGE_SIZE})"),
            ));
        }
    };
    let len_bytes = len.to_be_bytes();
    writer.write_all(&len_bytes)?;
    writer.write_all(&[opcode])?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame.
///
/// Returns `UnexpectedEof` if the stream closes before or during a frame,
/// and `InvalidData` for oversized, empty, or unknown-opcode frames.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Frame> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {len} bytes (max {MAX_MESSAGE_SIZE})"),
        ));
    }
    if len == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "empty frame"));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    let opcode = buf[0];
    let payload = buf.split_off(1);
    match opcode {
        OP_DATA => Ok(Frame::Data(payload)),
        OP_CLOSE => {
            if payload.len() < 2 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "close frame without status code",
                ));
            }
            let code = CloseCode(u16::from_be_bytes([payload[0], payload[1]]));
            let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
            Ok(Frame::Close { code, reason })
        }
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown opcode {other:#x}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn data_frame_survives_the_wire() {
        let original = b"hello, authority!";
        let mut buf = Vec::new();
        write_message(&mut buf, original).unwrap();

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Frame::Data(original.to_vec()));
    }

    #[test]
    fn close_frame_carries_code_and_reason() {
        let mut buf = Vec::new();
        write_close(&mut buf, CloseCode::NORMAL, "leaving").unwrap();

        let mut cursor = Cursor::new(&buf);
        match read_frame(&mut cursor).unwrap() {
            Frame::Close { code, reason } => {
                assert!(code.is_normal());
                assert_eq!(reason, "leaving");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[test]
    fn reserved_close_codes_never_reach_the_wire() {
        let mut buf = Vec::new();
        let err = write_close(&mut buf, CloseCode::ABNORMAL, "lost").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(buf.is_empty());

        write_close(&mut buf, CloseCode::INTERNAL_ERROR, "socket error").unwrap();
        let mut cursor = Cursor::new(&buf);
        match read_frame(&mut cursor).unwrap() {
            Frame::Close { code, .. } => assert_eq!(code, CloseCode::INTERNAL_ERROR),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![0u8; MAX_MESSAGE_SIZE as usize];
        let mut buf = Vec::new();
        let err = write_message(&mut buf, &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_oversized_read() {
        // Craft a length prefix that exceeds MAX_MESSAGE_SIZE.
        let fake_len = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        let mut cursor = Cursor::new(fake_len.to_vec());
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_unknown_opcode() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 2, 0x9, 0]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_frame_is_unexpected_eof() {
        // Only 2 bytes when 4 are needed for the length prefix.
        let mut cursor = Cursor::new(vec![0u8, 1]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn frames_read_back_in_order() {
        let mut buf = Vec::new();
        write_message(&mut buf, b"first").unwrap();
        write_message(&mut buf, b"second").unwrap();
        write_close(&mut buf, CloseCode::GOING_AWAY, "").unwrap();

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Frame::Data(b"first".to_vec()));
        assert_eq!(read_frame(&mut cursor).unwrap(), Frame::Data(b"second".to_vec()));
        assert_eq!(
            read_frame(&mut cursor).unwrap(),
            Frame::Close {
                code: CloseCode::GOING_AWAY,
                reason: String::new()
            }
        );
    }
}
