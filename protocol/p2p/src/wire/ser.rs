//!
//! Binary serialization layer for the wire protocol: little-endian integers,
//! canonical variable-length integers, and length-prefixed byte arrays.
//!

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerError {
    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("variable-length integer is not canonically encoded")]
    NonCanonicalVarInt,

    #[error("declared collection length {0} exceeds the allowed maximum {1}")]
    TooLargeRead(u64, u64),

    #[error("corrupted data: {0}")]
    CorruptedData(&'static str),
}

pub type SerResult<T> = std::result::Result<T, SerError>;

/// Accumulates the little-endian wire encoding of a message payload
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, n: u8) {
        self.buf.push(n);
    }

    pub fn write_u16(&mut self, n: u16) {
        self.buf.extend(n.to_le_bytes());
    }

    pub fn write_u32(&mut self, n: u32) {
        self.buf.extend(n.to_le_bytes());
    }

    pub fn write_u64(&mut self, n: u64) {
        self.buf.extend(n.to_le_bytes());
    }

    pub fn write_i32(&mut self, n: i32) {
        self.buf.extend(n.to_le_bytes());
    }

    pub fn write_i64(&mut self, n: i64) {
        self.buf.extend(n.to_le_bytes());
    }

    pub fn write_bool(&mut self, b: bool) {
        self.buf.push(b as u8);
    }

    pub fn write_raw_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }

    /// Writes a canonical minimal-form variable-length integer:
    /// 1 byte below 0xFD, otherwise a 0xFD/0xFE/0xFF width prefix
    pub fn write_var_int(&mut self, n: u64) {
        match n {
            0..=0xFC => self.write_u8(n as u8),
            0xFD..=0xFFFF => {
                self.write_u8(0xFD);
                self.write_u16(n as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                self.write_u8(0xFE);
                self.write_u32(n as u32);
            }
            _ => {
                self.write_u8(0xFF);
                self.write_u64(n);
            }
        }
    }

    /// Writes a length-prefixed byte array
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_var_int(bytes.len() as u64);
        self.write_raw_bytes(bytes);
    }
}

/// Decodes a message payload, enforcing canonical encodings and length limits
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Succeeds only when the full payload was consumed
    pub fn finish(self) -> SerResult<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(SerError::CorruptedData("trailing bytes after message payload"))
        }
    }

    fn take(&mut self, len: usize) -> SerResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(SerError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> SerResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> SerResult<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> SerResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> SerResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> SerResult<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> SerResult<i64> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_bool(&mut self) -> SerResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerError::CorruptedData("boolean is neither 0 nor 1")),
        }
    }

    pub fn read_raw_bytes(&mut self, len: usize) -> SerResult<&'a [u8]> {
        self.take(len)
    }

    /// Reads a variable-length integer, rejecting non-minimal encodings
    pub fn read_var_int(&mut self) -> SerResult<u64> {
        let prefix = self.read_u8()?;
        match prefix {
            0xFD => {
                let value = self.read_u16()? as u64;
                if value < 0xFD {
                    return Err(SerError::NonCanonicalVarInt);
                }
                Ok(value)
            }
            0xFE => {
                let value = self.read_u32()? as u64;
                if value <= 0xFFFF {
                    return Err(SerError::NonCanonicalVarInt);
                }
                Ok(value)
            }
            0xFF => {
                let value = self.read_u64()?;
                if value <= 0xFFFF_FFFF {
                    return Err(SerError::NonCanonicalVarInt);
                }
                Ok(value)
            }
            _ => Ok(prefix as u64),
        }
    }

    /// Reads a collection length, enforcing the given upper bound
    pub fn read_len(&mut self, max: u64) -> SerResult<usize> {
        let len = self.read_var_int()?;
        if len > max {
            return Err(SerError::TooLargeRead(len, max));
        }
        Ok(len as usize)
    }

    pub fn read_var_bytes(&mut self, max: u64) -> SerResult<Vec<u8>> {
        let len = self.read_len(max)?;
        Ok(self.take(len)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_int_widths() {
        // (value, expected encoded width)
        let cases: [(u64, usize); 7] =
            [(0, 1), (0xFC, 1), (0xFD, 3), (0xFFFF, 3), (0x1_0000, 5), (0xFFFF_FFFF, 5), (0x1_0000_0000, 9)];
        for (value, width) in cases {
            let mut writer = Writer::new();
            writer.write_var_int(value);
            let bytes = writer.into_inner();
            assert_eq!(bytes.len(), width, "value {value:#x}");
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.read_var_int().unwrap(), value);
            reader.finish().unwrap();
        }
    }

    #[test]
    fn test_non_canonical_var_int_rejected() {
        // 3-byte encoding of 0x50 must fail to decode
        let bytes = [0xFD, 0x50, 0x00];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_var_int(), Err(SerError::NonCanonicalVarInt));

        // 5-byte encoding of 0xFFFF must fail as well
        let bytes = [0xFE, 0xFF, 0xFF, 0x00, 0x00];
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_var_int(), Err(SerError::NonCanonicalVarInt));

        // 9-byte encoding of 0xFFFFFFFF must fail as well
        let mut bytes = vec![0xFF];
        bytes.extend(0xFFFF_FFFFu64.to_le_bytes());
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_var_int(), Err(SerError::NonCanonicalVarInt));
    }

    #[test]
    fn test_var_bytes_roundtrip() {
        let mut writer = Writer::new();
        writer.write_var_bytes(&[1, 2, 3]);
        let bytes = writer.into_inner();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_var_bytes(10).unwrap(), vec![1, 2, 3]);
        reader.finish().unwrap();
    }

    #[test]
    fn test_length_limit_enforced() {
        let mut writer = Writer::new();
        writer.write_var_int(1000);
        let bytes = writer.into_inner();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.read_len(100), Err(SerError::TooLargeRead(1000, 100)));
    }

    #[test]
    fn test_eof_detection() {
        let mut reader = Reader::new(&[1, 2]);
        assert_eq!(reader.read_u32(), Err(SerError::UnexpectedEof));
    }
}
