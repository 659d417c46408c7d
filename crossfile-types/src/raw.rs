//! types for working with raw bytes in either byte order

/// The byte order of a multi-byte scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Most significant byte first. The default, since most binary file
    /// formats (OpenType included) are big-endian on the wire.
    #[default]
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

/// A trait for fixed-width scalars with a defined wire representation.
///
/// This is an internal trait for encoding and decoding fixed-width integers;
/// you should not need to implement it yourself. It is implemented for the
/// unsigned and signed integers up to 64 bits.
pub trait Scalar: Sized + Copy {
    /// The raw byte representation of this type.
    type Raw: Copy + AsRef<[u8]>;

    /// The size of the raw type. Essentially an alias for `std::mem::size_of`.
    const RAW_BYTE_LEN: usize = std::mem::size_of::<Self::Raw>();

    /// Create an instance of this type from raw big-endian bytes
    fn from_be_raw(raw: Self::Raw) -> Self;

    /// Create an instance of this type from raw little-endian bytes
    fn from_le_raw(raw: Self::Raw) -> Self;

    /// Encode this type as raw big-endian bytes
    fn to_be_raw(self) -> Self::Raw;

    /// Encode this type as raw little-endian bytes
    fn to_le_raw(self) -> Self::Raw;

    /// Attempt to construct the raw representation from a slice.
    ///
    /// This will always succeed if `slice.len() == Self::RAW_BYTE_LEN`, and
    /// will always return `None` otherwise.
    fn raw_from_slice(slice: &[u8]) -> Option<Self::Raw>;

    /// Attempt to read a scalar from a slice in the given byte order.
    fn read(slice: &[u8], order: ByteOrder) -> Option<Self> {
        let raw = Self::raw_from_slice(slice)?;
        Some(match order {
            ByteOrder::BigEndian => Self::from_be_raw(raw),
            ByteOrder::LittleEndian => Self::from_le_raw(raw),
        })
    }

    /// Attempt to read a scalar at `offset` into `bytes`, bounds-checked.
    fn read_at(bytes: &[u8], offset: usize, order: ByteOrder) -> Option<Self> {
        bytes
            .get(offset..offset.checked_add(Self::RAW_BYTE_LEN)?)
            .and_then(|slice| Self::read(slice, order))
    }
}

/// An internal macro for implementing `Scalar` for the builtin integers.
macro_rules! int_scalar {
    ($ty:ty, $raw:ty) => {
        impl Scalar for $ty {
            type Raw = $raw;

            fn from_be_raw(raw: $raw) -> $ty {
                Self::from_be_bytes(raw)
            }

            fn from_le_raw(raw: $raw) -> $ty {
                Self::from_le_bytes(raw)
            }

            fn to_be_raw(self) -> $raw {
                self.to_be_bytes()
            }

            fn to_le_raw(self) -> $raw {
                self.to_le_bytes()
            }

            fn raw_from_slice(slice: &[u8]) -> Option<$raw> {
                slice.try_into().ok()
            }
        }
    };
}

int_scalar!(u8, [u8; 1]);
int_scalar!(i8, [u8; 1]);
int_scalar!(u16, [u8; 2]);
int_scalar!(i16, [u8; 2]);
int_scalar!(u32, [u8; 4]);
int_scalar!(i32, [u8; 4]);
int_scalar!(u64, [u8; 8]);
int_scalar!(i64, [u8; 8]);
