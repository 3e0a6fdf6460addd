//! Low-level byte order and safe reading utilities for instruction and blob decoding.
//!
//! This module provides endian-aware binary reading for the cursor-based
//! [`crate::file::parser::Parser`]. It implements safe, bounds-checked operations for
//! reading primitive types from byte buffers, preventing buffer overruns while decoding
//! instruction streams and metadata blobs.
//!
//! All functions return [`crate::Result`] and fail with [`crate::Error::OutOfBounds`]
//! when the buffer does not hold enough bytes to complete the read.

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be decoded from raw bytes.
///
/// Implemented for the unsigned and signed integer widths and both float widths;
/// the associated `Bytes` array type ties the read length to the target type.
pub trait CilIO: Sized {
    /// The byte array type holding exactly one encoded value.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read `Self` from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_cilio {
    ($($ty:ty),*) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_cilio!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Arguments
/// * `data` - The byte buffer to read from
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (advanced after reading)
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}
