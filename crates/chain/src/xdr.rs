//! Minimal XDR (RFC 4506) reader/writer.
//!
//! Covers exactly the subset the bots touch: transaction envelopes, `ScVal`
//! payloads, ledger keys, and the account-entry slice carrying the sequence
//! number. Values are big-endian; variable-length opaques pad to 4 bytes.

use crate::error::ChainError;

/// Append-only XDR encoder.
#[derive(Debug, Default)]
pub struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Fixed-length opaque: raw bytes, caller guarantees 4-byte alignment.
    pub fn bytes_fixed(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    /// Variable-length opaque: length prefix + data + zero padding.
    pub fn bytes_var(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.buf.extend_from_slice(b);
        let pad = (4 - b.len() % 4) % 4;
        self.buf.extend_from_slice(&[0u8; 3][..pad]);
    }

    pub fn string(&mut self, s: &str) {
        self.bytes_var(s.as_bytes());
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an XDR byte stream.
#[derive(Debug)]
pub struct XdrReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ChainError> {
        if self.pos + n > self.data.len() {
            return Err(ChainError::Decode(format!(
                "xdr underrun: wanted {n} bytes at offset {}, have {}",
                self.pos,
                self.data.len() - self.pos
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u32(&mut self) -> Result<u32, ChainError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, ChainError> {
        Ok(self.u32()? as i32)
    }

    pub fn u64(&mut self) -> Result<u64, ChainError> {
        let b = self.take(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(u64::from_be_bytes(out))
    }

    pub fn i64(&mut self) -> Result<i64, ChainError> {
        Ok(self.u64()? as i64)
    }

    pub fn bytes_fixed(&mut self, n: usize) -> Result<&'a [u8], ChainError> {
        self.take(n)
    }

    pub fn bytes_var(&mut self) -> Result<Vec<u8>, ChainError> {
        let len = self.u32()? as usize;
        let data = self.take(len)?.to_vec();
        let pad = (4 - len % 4) % 4;
        self.take(pad)?;
        Ok(data)
    }

    pub fn string(&mut self) -> Result<String, ChainError> {
        let raw = self.bytes_var()?;
        String::from_utf8(raw).map_err(|e| ChainError::Decode(format!("non-utf8 xdr string: {e}")))
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_opaque_padding() {
        let mut w = XdrWriter::new();
        w.bytes_var(b"abcde");
        let buf = w.finish();
        // 4 length + 5 data + 3 pad
        assert_eq!(buf.len(), 12);

        let mut r = XdrReader::new(&buf);
        assert_eq!(r.bytes_var().unwrap(), b"abcde");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_integers_roundtrip() {
        let mut w = XdrWriter::new();
        w.u32(7);
        w.i64(-42);
        w.u64(u64::MAX);
        let buf = w.finish();

        let mut r = XdrReader::new(&buf);
        assert_eq!(r.u32().unwrap(), 7);
        assert_eq!(r.i64().unwrap(), -42);
        assert_eq!(r.u64().unwrap(), u64::MAX);
    }

    #[test]
    fn test_underrun_is_decode_error() {
        let mut r = XdrReader::new(&[0, 0]);
        assert!(matches!(r.u32(), Err(ChainError::Decode(_))));
    }
}
