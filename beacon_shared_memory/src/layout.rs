//! Checked little-endian field access over mapped byte regions
//!
//! Every structure that lives in shared memory is described by explicit
//! offsets and read/written through these helpers. Nothing is ever cast
//! in place, so a truncated or foreign region yields `OutOfBounds` rather
//! than undefined behaviour.

use crate::error::{ShmError, ShmResult};
use std::ops::Range;

/// Validate that `len` bytes starting at `offset` fit into a region of `size` bytes
pub fn checked_range(size: usize, offset: usize, len: usize) -> ShmResult<Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(ShmError::OutOfBounds { offset, len, size }),
    }
}

fn field<const N: usize>(buf: &[u8], offset: usize) -> ShmResult<[u8; N]> {
    let range = checked_range(buf.len(), offset, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[range]);
    Ok(out)
}

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) -> ShmResult<()> {
    let range = checked_range(buf.len(), offset, bytes.len())?;
    buf[range].copy_from_slice(bytes);
    Ok(())
}

/// Read a `u8` at `offset`
pub fn read_u8(buf: &[u8], offset: usize) -> ShmResult<u8> {
    Ok(field::<1>(buf, offset)?[0])
}

/// Read a little-endian `u32` at `offset`
pub fn read_u32(buf: &[u8], offset: usize) -> ShmResult<u32> {
    field(buf, offset).map(u32::from_le_bytes)
}

/// Read a little-endian `i32` at `offset`
pub fn read_i32(buf: &[u8], offset: usize) -> ShmResult<i32> {
    field(buf, offset).map(i32::from_le_bytes)
}

/// Read a little-endian `u64` at `offset`
pub fn read_u64(buf: &[u8], offset: usize) -> ShmResult<u64> {
    field(buf, offset).map(u64::from_le_bytes)
}

/// Read a little-endian `i64` at `offset`
pub fn read_i64(buf: &[u8], offset: usize) -> ShmResult<i64> {
    field(buf, offset).map(i64::from_le_bytes)
}

/// Write a `u8` at `offset`
pub fn write_u8(buf: &mut [u8], offset: usize, value: u8) -> ShmResult<()> {
    put(buf, offset, &[value])
}

/// Write a little-endian `u32` at `offset`
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) -> ShmResult<()> {
    put(buf, offset, &value.to_le_bytes())
}

/// Write a little-endian `i32` at `offset`
pub fn write_i32(buf: &mut [u8], offset: usize, value: i32) -> ShmResult<()> {
    put(buf, offset, &value.to_le_bytes())
}

/// Write a little-endian `u64` at `offset`
pub fn write_u64(buf: &mut [u8], offset: usize, value: u64) -> ShmResult<()> {
    put(buf, offset, &value.to_le_bytes())
}

/// Write a little-endian `i64` at `offset`
pub fn write_i64(buf: &mut [u8], offset: usize, value: i64) -> ShmResult<()> {
    put(buf, offset, &value.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_round_trip_at_offsets() {
        let mut buf = [0u8; 24];
        write_u32(&mut buf, 0, 0xDEAD_BEEF).unwrap();
        write_i32(&mut buf, 4, -7).unwrap();
        write_i64(&mut buf, 8, -1_000_000).unwrap();
        write_u64(&mut buf, 16, u64::MAX - 1).unwrap();

        assert_eq!(read_u32(&buf, 0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_i32(&buf, 4).unwrap(), -7);
        assert_eq!(read_i64(&buf, 8).unwrap(), -1_000_000);
        assert_eq!(read_u64(&buf, 16).unwrap(), u64::MAX - 1);
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let mut buf = [0u8; 8];
        assert!(matches!(
            read_u64(&buf, 1),
            Err(ShmError::OutOfBounds { offset: 1, len: 8, size: 8 })
        ));
        assert!(write_u32(&mut buf, 6, 1).is_err());
        assert!(checked_range(8, usize::MAX, 2).is_err());
    }
}
