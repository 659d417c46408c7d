//! bounded, endianness-aware data streams

use crossfile_types::{ByteOrder, Scalar};

/// An error produced by a [`DataStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// A read would consume more bytes than the stream has remaining.
    InsufficientData,
    /// A seek targeted a position outside `[0, stream size]`.
    OutOfRange,
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::InsufficientData => write!(f, "Insufficient data remaining in stream"),
            StreamError::OutOfRange => write!(f, "Stream position out of range"),
        }
    }
}

impl std::error::Error for StreamError {}

/// A bounded, endianness-aware reader over a byte source.
///
/// This is the entire contract the VM consumes: typed primitive reads that
/// honor the stream's configured byte order and advance the cursor, absolute
/// seeks, and remaining-size queries. The VM never mutates a stream beyond
/// advancing its cursor.
///
/// Every read must fail with [`StreamError::InsufficientData`] rather than
/// return partial or padded values when the remaining bytes are too few.
pub trait DataStream {
    /// The byte order applied to multi-byte reads.
    fn byte_order(&self) -> ByteOrder;

    fn read_u8(&mut self) -> Result<u8, StreamError>;
    fn read_u16(&mut self) -> Result<u16, StreamError>;
    fn read_u32(&mut self) -> Result<u32, StreamError>;
    fn read_u64(&mut self) -> Result<u64, StreamError>;

    fn read_i8(&mut self) -> Result<i8, StreamError>;
    fn read_i16(&mut self) -> Result<i16, StreamError>;
    fn read_i32(&mut self) -> Result<i32, StreamError>;
    fn read_i64(&mut self) -> Result<i64, StreamError>;

    /// Move the cursor to an absolute position.
    ///
    /// Seeking to exactly the stream size is allowed; it leaves zero bytes
    /// remaining.
    fn seek(&mut self, pos: usize) -> Result<(), StreamError>;

    /// The current cursor position, in bytes from the start of the stream.
    fn position(&self) -> usize;

    /// The number of bytes between the cursor and the end of the stream.
    fn remaining(&self) -> usize;
}

/// A [`DataStream`] over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStream<'a> {
    bytes: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> MemoryStream<'a> {
    /// Create a new `MemoryStream` reading `bytes` in the given byte order.
    pub const fn new(bytes: &'a [u8], order: ByteOrder) -> Self {
        MemoryStream {
            bytes,
            pos: 0,
            order,
        }
    }

    /// The total length of the underlying bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` if the underlying bytes have a length of zero.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn read_scalar<T: Scalar>(&mut self) -> Result<T, StreamError> {
        let value = T::read_at(self.bytes, self.pos, self.order)
            .ok_or(StreamError::InsufficientData)?;
        self.pos += T::RAW_BYTE_LEN;
        Ok(value)
    }
}

impl DataStream for MemoryStream<'_> {
    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn read_u8(&mut self) -> Result<u8, StreamError> {
        self.read_scalar()
    }

    fn read_u16(&mut self) -> Result<u16, StreamError> {
        self.read_scalar()
    }

    fn read_u32(&mut self) -> Result<u32, StreamError> {
        self.read_scalar()
    }

    fn read_u64(&mut self) -> Result<u64, StreamError> {
        self.read_scalar()
    }

    fn read_i8(&mut self) -> Result<i8, StreamError> {
        self.read_scalar()
    }

    fn read_i16(&mut self) -> Result<i16, StreamError> {
        self.read_scalar()
    }

    fn read_i32(&mut self) -> Result<i32, StreamError> {
        self.read_scalar()
    }

    fn read_i64(&mut self) -> Result<i64, StreamError> {
        self.read_scalar()
    }

    fn seek(&mut self, pos: usize) -> Result<(), StreamError> {
        if pos > self.bytes.len() {
            return Err(StreamError::OutOfRange);
        }
        self.pos = pos;
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_cursor() {
        let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
        let mut stream = MemoryStream::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(stream.read_u16(), Ok(1));
        assert_eq!(stream.position(), 2);
        assert_eq!(stream.read_u32(), Ok(2));
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn little_endian_reads() {
        let bytes = [0x01, 0x00, 0x00, 0x00];
        let mut stream = MemoryStream::new(&bytes, ByteOrder::LittleEndian);
        assert_eq!(stream.read_u32(), Ok(1));
    }

    #[test]
    fn truncated_read_fails_without_advancing() {
        let bytes = [0xAB, 0xCD];
        let mut stream = MemoryStream::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(stream.read_u32(), Err(StreamError::InsufficientData));
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_u16(), Ok(0xABCD));
    }

    #[test]
    fn signed_reads() {
        let bytes = [0xFF, 0xFE];
        let mut stream = MemoryStream::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(stream.read_i16(), Ok(-2));
    }

    #[test]
    fn seek_bounds() {
        let bytes = [0u8; 4];
        let mut stream = MemoryStream::new(&bytes, ByteOrder::BigEndian);
        assert_eq!(stream.seek(4), Ok(()));
        assert_eq!(stream.remaining(), 0);
        assert_eq!(stream.seek(5), Err(StreamError::OutOfRange));
        assert_eq!(stream.position(), 4);
    }
}
