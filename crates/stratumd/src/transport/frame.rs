//! Wire primitives shared by the daemon and its clients.
//!
//! Integers are 32-bit in host byte order. Strings are an `i32` byte length
//! followed by that many bytes, with no terminator. Every read buffers the
//! whole value before returning it.

use std::io::{Read, Write};

use super::FrameError;

/// Upper bound on a single string payload.
pub(crate) const MAX_STRING_BYTES: usize = 1024 * 1024;

/// Frame decoding over any byte source.
pub(crate) trait FrameRead: Read {
    /// Reads one `i32`.
    #[expect(
        clippy::host_endian_bytes,
        reason = "peers share the host and speak its native byte order"
    )]
    fn read_int(&mut self) -> Result<i32, FrameError> {
        let mut bytes = [0_u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(i32::from_ne_bytes(bytes))
    }

    /// Reads a length-prefixed byte string.
    fn read_bytes(&mut self) -> Result<Vec<u8>, FrameError> {
        let declared = self.read_int()?;
        let len = usize::try_from(declared)
            .map_err(|_| FrameError::protocol(format!("negative string length {declared}")))?;
        if len > MAX_STRING_BYTES {
            return Err(FrameError::protocol(format!(
                "string length {len} exceeds {MAX_STRING_BYTES} byte limit"
            )));
        }
        let mut buffer = vec![0_u8; len];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads a length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, FrameError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|error| FrameError::protocol(error.to_string()))
    }
}

impl<R: Read + ?Sized> FrameRead for R {}

/// Frame encoding over any byte sink.
pub(crate) trait FrameWrite: Write {
    /// Writes one `i32`.
    #[expect(
        clippy::host_endian_bytes,
        reason = "peers share the host and speak its native byte order"
    )]
    fn write_int(&mut self, value: i32) -> Result<(), FrameError> {
        self.write_all(&value.to_ne_bytes())?;
        Ok(())
    }

    /// Writes a length-prefixed byte string.
    #[expect(
        clippy::host_endian_bytes,
        reason = "peers share the host and speak its native byte order"
    )]
    fn write_bytes(&mut self, value: &[u8]) -> Result<(), FrameError> {
        if value.len() > MAX_STRING_BYTES {
            return Err(FrameError::protocol(format!(
                "string length {} exceeds {MAX_STRING_BYTES} byte limit",
                value.len()
            )));
        }
        let len = i32::try_from(value.len())
            .map_err(|_| FrameError::protocol("string length overflows i32"))?;
        // Prefix and payload leave in a single write.
        let mut frame = Vec::with_capacity(value.len() + 4);
        frame.extend_from_slice(&len.to_ne_bytes());
        frame.extend_from_slice(value);
        self.write_all(&frame)?;
        Ok(())
    }

    /// Writes a length-prefixed UTF-8 string.
    fn write_string(&mut self, value: &str) -> Result<(), FrameError> {
        self.write_bytes(value.as_bytes())
    }
}

impl<W: Write + ?Sized> FrameWrite for W {}
