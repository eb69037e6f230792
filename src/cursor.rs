//! Sequential big-endian reader over a borrowed byte buffer.
use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

/// `ByteCursor` reads fixed-width unsigned integers and byte runs from the
/// front of a buffer. A failed read leaves the position where it was.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Returns the offset of the next byte to be read.
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes left to read.
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns true once every byte has been consumed.
    pub const fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn read_u1(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u2(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_u4(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    /// Returns a view of the next `n` bytes and advances past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: n,
                remaining,
            });
        }
        let start = self.position;
        self.position += n;
        Ok(&self.data[start..self.position])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn reads_big_endian_integers() {
        let data = [0xca, 0xfe, 0xba, 0xbe, 0x00, 0x34, 0x07];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u4().unwrap(), 0xcafe_babe);
        assert_eq!(cursor.read_u2().unwrap(), 0x34);
        assert_eq!(cursor.read_u1().unwrap(), 7);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn read_bytes_returns_view_and_advances() {
        let data = b"Hello, World!";
        let mut cursor = ByteCursor::new(data);
        assert_eq!(cursor.read_bytes(5).unwrap(), b"Hello");
        assert_eq!(cursor.position(), 5);
        assert_eq!(cursor.remaining(), 8);
        assert_eq!(cursor.read_bytes(0).unwrap(), b"");
        assert_eq!(cursor.position(), 5);
    }

    #[test]
    fn out_of_bounds_read_fails_without_moving() {
        let data = [0x00, 0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);
        cursor.read_u2().unwrap();
        let err = cursor.read_u4().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(matches!(
            err,
            Error::UnexpectedEof {
                offset: 2,
                needed: 4,
                remaining: 1
            }
        ));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.read_u1().unwrap(), 0x02);
        assert!(cursor.read_u1().is_err());
    }
}
