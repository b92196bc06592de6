//! Length-prefixed framing over a byte stream.
//!
//! Each frame is a 4-byte little-endian unsigned length followed by exactly
//! that many payload bytes. This is the browser native-messaging wire format:
//!
//! ```text
//! +----------------+----------------------------+
//! | len: u32 (LE)  | payload: [u8; len]         |
//! +----------------+----------------------------+
//! ```

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Largest payload the 32-bit prefix can describe.
pub const MAX_FRAME_LEN: usize = u32::MAX as usize;

/// Encoder/decoder for length-prefixed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    max_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Codec accepting any payload the wire format can represent.
    pub fn new() -> Self {
        Self {
            max_len: MAX_FRAME_LEN,
        }
    }

    /// Codec with a lower payload limit. Values above [`MAX_FRAME_LEN`] are
    /// clamped to it.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len: max_len.min(MAX_FRAME_LEN),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Prefix `payload` with its length.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let header = self.header(payload.len())?;
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);
        Ok(frame)
    }

    /// Write one complete frame and flush.
    ///
    /// `write_all` keeps writing through short writes and `Interrupted`
    /// until the frame is out or the writer reports a real error.
    pub fn write_frame<W: Write + ?Sized>(&self, writer: &mut W, payload: &[u8]) -> Result<()> {
        let header = self.header(payload.len())?;
        writer.write_all(&header)?;
        writer.write_all(payload)?;
        writer.flush()?;
        Ok(())
    }

    /// Block until one complete frame has been read and return its payload.
    ///
    /// End of stream before the 4-byte header is complete yields
    /// [`Error::StreamClosed`]; end of stream inside the payload yields
    /// [`Error::TruncatedFrame`].
    pub fn read_frame<R: Read + ?Sized>(&self, reader: &mut R) -> Result<Vec<u8>> {
        let mut header = [0u8; HEADER_LEN];
        let got = read_full(reader, &mut header)?;
        if got < HEADER_LEN {
            if got > 0 {
                log::warn!("stream closed after {got} of {HEADER_LEN} length header bytes");
            }
            return Err(Error::StreamClosed);
        }

        let len = u32::from_le_bytes(header) as usize;
        if len > self.max_len {
            return Err(Error::FrameTooLarge {
                len,
                max: self.max_len,
            });
        }

        // Grow with what actually arrives; the declared length is untrusted.
        let mut payload = Vec::new();
        let received = Read::take(&mut *reader, len as u64).read_to_end(&mut payload)?;
        if received < len {
            return Err(Error::TruncatedFrame {
                expected: len,
                received,
            });
        }
        Ok(payload)
    }

    fn header(&self, len: usize) -> Result<[u8; HEADER_LEN]> {
        if len > self.max_len {
            return Err(Error::FrameTooLarge {
                len,
                max: self.max_len,
            });
        }
        let len = u32::try_from(len).map_err(|_| Error::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        })?;
        Ok(len.to_le_bytes())
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
/// Returns the number of bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}
