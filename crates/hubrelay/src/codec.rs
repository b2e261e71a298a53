//! Zero-copy binary codec shared with the hub.
//!
//! Fixed-width integers are little-endian. Byte strings carry a var-uint length prefix:
//! one byte below `0xFD`, otherwise a marker byte (`0xFD`/`0xFE`/`0xFF`) followed by a
//! u16/u32/u64. Non-minimal length encodings are rejected on read.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input reading {0}")]
    Eof(&'static str),
    #[error("non-canonical length prefix in {0}")]
    NonCanonical(&'static str),
    #[error("invalid utf-8 in {0}")]
    Utf8(&'static str),
    #[error("{0} trailing bytes after record")]
    Trailing(usize),
}

/// Append-only writer.
#[derive(Debug, Default)]
pub struct Sink {
    buf: Vec<u8>,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_var_uint(&mut self, v: u64) {
        if v < 0xFD {
            self.write_u8(v as u8);
        } else if v <= u64::from(u16::MAX) {
            self.write_u8(0xFD);
            self.write_u16(v as u16);
        } else if v <= u64::from(u32::MAX) {
            self.write_u8(0xFE);
            self.write_u32(v as u32);
        } else {
            self.write_u8(0xFF);
            self.write_u64(v);
        }
    }

    pub fn write_var_bytes(&mut self, data: &[u8]) {
        self.write_var_uint(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_var_bytes(s.as_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over borrowed input. Every read names the field it decodes for error context.
#[derive(Debug)]
pub struct Source<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Source<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn next_slice(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Eof(field));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn next_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.next_slice(N, field)?);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.next_array::<1>(field)?[0])
    }

    pub fn read_u16(&mut self, field: &'static str) -> Result<u16, CodecError> {
        self.next_array(field).map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        self.next_array(field).map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        self.next_array(field).map(u64::from_le_bytes)
    }

    pub fn read_var_uint(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let (value, min) = match self.read_u8(field)? {
            0xFD => (u64::from(self.read_u16(field)?), 0xFD),
            0xFE => (u64::from(self.read_u32(field)?), u64::from(u16::MAX) + 1),
            0xFF => (self.read_u64(field)?, u64::from(u32::MAX) + 1),
            b => return Ok(u64::from(b)),
        };
        if value < min {
            return Err(CodecError::NonCanonical(field));
        }
        Ok(value)
    }

    pub fn read_var_bytes(&mut self, field: &'static str) -> Result<&'a [u8], CodecError> {
        let len = self.read_var_uint(field)?;
        let len = usize::try_from(len).map_err(|_| CodecError::Eof(field))?;
        self.next_slice(len, field)
    }

    pub fn read_string(&mut self, field: &'static str) -> Result<String, CodecError> {
        let bytes = self.read_var_bytes(field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::Utf8(field))
    }

    /// Fails if anything is left unread.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::Trailing(n)),
        }
    }
}
