//! Little-endian byte cursor and writer shared by the binary codecs.

use crate::error::{CrunchError, Result};

/// Bounds-checked reader over a borrowed buffer.
///
/// Every read either returns data borrowed from the input or a
/// [`CrunchError::Truncated`] naming the offset that ran out.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reader positioned at `pos`, which must lie within the buffer.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        let mut r = Self::new(data);
        r.seek(pos)?;
        Ok(r)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(CrunchError::Truncated {
                offset: self.data.len(),
                needed: pos - self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.data.len());
        let Some(end) = end else {
            return Err(CrunchError::Truncated {
                offset: self.pos,
                needed: n,
            });
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    /// int16 length followed by that many raw bytes.
    pub fn read_prefixed_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.take(len)
    }

    pub fn read_prefixed_str(&mut self) -> Result<&'a str> {
        let at = self.pos;
        let bytes = self.read_prefixed_bytes()?;
        utf8(bytes, at)
    }

    /// Null-terminated string; the terminator is consumed but not returned.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let at = self.pos;
        let rest = &self.data[self.pos..];
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(CrunchError::Truncated {
                offset: self.data.len(),
                needed: 1,
            });
        };
        self.pos += nul + 1;
        utf8(&rest[..nul], at)
    }

    /// Skips forward to the next multiple of `alignment` (no-op when aligned).
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.take(alignment - rem)?;
        }
        Ok(())
    }
}

fn utf8(bytes: &[u8], at: usize) -> Result<&str> {
    std::str::from_utf8(bytes)
        .map_err(|_| CrunchError::Malformed(format!("name at offset {at} is not valid UTF-8")))
}

/// Growable little-endian writer.
#[derive(Debug, Default)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a count into an int16 field.
    pub fn write_count(&mut self, field: &'static str, n: usize) -> Result<()> {
        let v = i16::try_from(n).map_err(|_| CrunchError::OutOfRange {
            field,
            value: n as i64,
        })?;
        self.write_i16(v);
        Ok(())
    }

    pub fn write_prefixed_str(&mut self, s: &str) -> Result<()> {
        self.write_count("name length", s.len())?;
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    pub fn write_cstr(&mut self, s: &str) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(CrunchError::InvalidInput(format!(
                "name {s:?} contains a NUL byte"
            )));
        }
        self.write_bytes(s.as_bytes());
        self.write_u8(0);
        Ok(())
    }

    /// Zero-pads to the next multiple of `alignment` (no-op when aligned).
    pub fn pad_to(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.buf.resize(self.buf.len() + alignment - rem, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_fields() {
        let data = [0x34, 0x12, 0xFF, 0xFF, 0x03, 0x00, b'a', b'b', b'c', b'x', 0, 9];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_i16().unwrap(), -1);
        assert_eq!(r.read_prefixed_str().unwrap(), "abc");
        assert_eq!(r.read_cstr().unwrap(), "x");
        assert_eq!(r.read_u8().unwrap(), 9);
        assert!(matches!(
            r.read_u8(),
            Err(CrunchError::Truncated { offset: 12, needed: 1 })
        ));
    }

    #[test]
    fn truncated_string_is_an_error() {
        let data = [0x05, 0x00, b'a'];
        let mut r = ByteReader::new(&data);
        assert!(matches!(
            r.read_prefixed_str(),
            Err(CrunchError::Truncated { offset: 2, needed: 5 })
        ));
        let mut r = ByteReader::new(b"abc");
        assert!(r.read_cstr().is_err());
    }

    #[test]
    fn align_is_noop_when_already_aligned() {
        let mut w = ByteWriter::new();
        w.write_bytes(&[1; 8]);
        w.pad_to(8);
        w.write_u8(2);
        w.pad_to(8);
        let data = w.into_inner();
        assert_eq!(data.len(), 16);
        assert_eq!(data[8..], [2, 0, 0, 0, 0, 0, 0, 0]);

        let mut r = ByteReader::at(&data, 8).unwrap();
        r.align(8).unwrap();
        assert_eq!(r.position(), 8);
        r.read_u8().unwrap();
        r.align(8).unwrap();
        assert_eq!(r.position(), 16);
        assert!(r.align(32).is_err());
    }
}
