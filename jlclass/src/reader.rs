use crate::error::{ClassFileError, ClassFileResult};

/// Big-endian cursor over class-file bytes.
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    pub fn read_bytes(&mut self, len: usize) -> ClassFileResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ClassFileError::UnexpectedEnd(self.position));
        }
        let bytes = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> ClassFileResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> ClassFileResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> ClassFileResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> ClassFileResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> ClassFileResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> ClassFileResult<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> ClassFileResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> ClassFileResult<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> ClassFileResult<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// Reads a `u2`-length-prefixed modified UTF-8 string.
    pub fn read_modified_utf8(&mut self) -> ClassFileResult<String> {
        let start = self.position;
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        decode_modified_utf8(bytes).ok_or(ClassFileError::InvalidUtf8(start))
    }
}

/// Decodes the class-file flavour of UTF-8: NUL is two bytes and supplementary
/// characters are stored as surrogate pairs of three bytes each.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            0x01..=0x7f => {
                units.push(b as u16);
                i += 1;
            }
            0xc0..=0xdf => {
                let b2 = *bytes.get(i + 1)?;
                if b2 & 0xc0 != 0x80 {
                    return None;
                }
                units.push((((b & 0x1f) as u16) << 6) | (b2 & 0x3f) as u16);
                i += 2;
            }
            0xe0..=0xef => {
                let b2 = *bytes.get(i + 1)?;
                let b3 = *bytes.get(i + 2)?;
                if b2 & 0xc0 != 0x80 || b3 & 0xc0 != 0x80 {
                    return None;
                }
                units.push(
                    (((b & 0x0f) as u16) << 12) | (((b2 & 0x3f) as u16) << 6) | (b3 & 0x3f) as u16,
                );
                i += 3;
            }
            _ => return None,
        }
    }
    String::from_utf16(&units).ok()
}

/// Inverse of [`decode_modified_utf8`].
pub fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}
