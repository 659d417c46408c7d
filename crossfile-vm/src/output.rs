//! The materialized output buffer.

/// A parsed structure, materialized as a contiguous byte region.
///
/// Instructions address the buffer by byte offset; scalar fields are stored
/// in native byte order (the stream's endianness correction happens at read
/// time). Accessors are bounds-checked against the buffer's `alloc_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
}

impl OutputBuffer {
    /// Create a zeroed buffer of `alloc_size` bytes.
    pub fn new(alloc_size: usize) -> Self {
        OutputBuffer {
            bytes: vec![0; alloc_size],
        }
    }

    /// The buffer length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a scalar field at `offset`, or `None` if out of bounds.
    pub fn read<T: bytemuck::AnyBitPattern>(&self, offset: usize) -> Option<T> {
        read_pod(&self.bytes, offset)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Consume the buffer, returning the underlying bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for OutputBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read a pod value out of `region` at `offset`, bounds-checked.
pub(crate) fn read_pod<T: bytemuck::AnyBitPattern>(region: &[u8], offset: usize) -> Option<T> {
    let slice = region.get(offset..offset.checked_add(std::mem::size_of::<T>())?)?;
    Some(bytemuck::pod_read_unaligned(slice))
}

/// Write a pod value into `region` at `offset`, bounds-checked.
pub(crate) fn write_pod<T: bytemuck::NoUninit>(
    region: &mut [u8],
    offset: usize,
    value: T,
) -> Option<()> {
    let slice = region.get_mut(offset..offset.checked_add(std::mem::size_of::<T>())?)?;
    slice.copy_from_slice(bytemuck::bytes_of(&value));
    Some(())
}
