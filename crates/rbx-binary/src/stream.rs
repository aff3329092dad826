// SPDX-License-Identifier: Apache-2.0
//! Length-tracking byte reader/writer with typed number I/O (§4.A).
//!
//! Both latch the first error they hit; every subsequent call is a no-op that
//! returns the latched error, so decode code can read linearly without
//! checking a `Result` after every field.

use thiserror::Error;

/// Errors that can occur while reading or writing the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Attempted to read past the end of the input.
    #[error("truncated stream: needed {needed} bytes, {remaining} remained")]
    Truncated {
        /// Bytes the read required.
        needed: usize,
        /// Bytes actually left.
        remaining: usize,
    },
    /// A length-prefixed string's declared length did not fit in the
    /// remaining input.
    #[error("truncated string: declared length {declared}, {remaining} bytes remained")]
    TruncatedString {
        /// Declared string length.
        declared: u32,
        /// Bytes actually left.
        remaining: usize,
    },
}

/// A cursor over a borrowed byte slice with sticky error latching.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    error: Option<StreamError>,
}

impl<'a> ByteReader<'a> {
    /// Wrap `buf` for reading from the start.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, error: None }
    }

    /// Current byte offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The first error latched, if any.
    #[must_use]
    pub fn error(&self) -> Option<StreamError> {
        self.error
    }

    /// Take the latched error as a `Result`, `Ok(())` if none was latched.
    ///
    /// # Errors
    ///
    /// Returns the latched [`StreamError`], if any.
    pub fn finish(&self) -> Result<(), StreamError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.error.is_some() {
            return None;
        }
        if self.remaining() < n {
            self.error = Some(StreamError::Truncated { needed: n, remaining: self.remaining() });
            return None;
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    /// Read a raw byte slice of length `n`. Returns an empty slice once
    /// latched.
    pub fn read_bytes(&mut self, n: usize) -> &'a [u8] {
        self.take(n).unwrap_or(&[])
    }

    /// Read one `u8`.
    pub fn read_u8(&mut self) -> u8 {
        self.take(1).map_or(0, |b| b[0])
    }

    /// Read one `i8`.
    pub fn read_i8(&mut self) -> i8 {
        self.read_u8() as i8
    }

    /// Read one little-endian `u16`.
    pub fn read_u16(&mut self) -> u16 {
        self.take(2).map_or(0, |b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read one little-endian `i16`.
    pub fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    /// Read one little-endian `u32`.
    pub fn read_u32(&mut self) -> u32 {
        self.take(4).map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read one little-endian `i32`.
    pub fn read_i32(&mut self) -> i32 {
        self.read_u32() as i32
    }

    /// Read one little-endian `u64`.
    pub fn read_u64(&mut self) -> u64 {
        self.take(8).map_or(0, |b| {
            u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })
    }

    /// Read one little-endian `i64`.
    pub fn read_i64(&mut self) -> i64 {
        self.read_u64() as i64
    }

    /// Read one little-endian `f32`.
    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    /// Read one little-endian `f64`.
    pub fn read_f64(&mut self) -> f64 {
        f64::from_bits(self.read_u64())
    }

    /// Read a `u32`-length-prefixed byte string (no terminator).
    pub fn read_prefixed_string(&mut self) -> Vec<u8> {
        let len = self.read_u32();
        if self.error.is_some() {
            return Vec::new();
        }
        if self.remaining() < len as usize {
            self.error = Some(StreamError::TruncatedString { declared: len, remaining: self.remaining() });
            return Vec::new();
        }
        self.read_bytes(len as usize).to_vec()
    }
}

/// An append-only byte buffer writer with sticky error latching.
///
/// No write operation in this format can actually fail (there is no backing
/// I/O, only a growable buffer), but the writer keeps the same `error()`/
/// `finish()` shape as [`ByteReader`] so encode code reads symmetrically with
/// decode code.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// A new, empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Consume the writer, returning the accumulated bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write one `u8`.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Write one `i8`.
    pub fn write_i8(&mut self, v: i8) {
        self.write_u8(v as u8);
    }

    /// Write one little-endian `u16`.
    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write one little-endian `i16`.
    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    /// Write one little-endian `u32`.
    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write one little-endian `i32`.
    pub fn write_i32(&mut self, v: i32) {
        self.write_u32(v as u32);
    }

    /// Write one little-endian `u64`.
    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write one little-endian `i64`.
    pub fn write_i64(&mut self, v: i64) {
        self.write_u64(v as u64);
    }

    /// Write one little-endian `f32`.
    pub fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    /// Write one little-endian `f64`.
    pub fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    /// Write a `u32`-length-prefixed byte string (no terminator).
    pub fn write_prefixed_string(&mut self, bytes: &[u8]) {
        #[allow(clippy::cast_possible_truncation)]
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip() {
        let mut w = ByteWriter::new();
        w.write_i8(-7);
        w.write_u16(0xBEEF);
        w.write_i32(-123456);
        w.write_u64(0xDEAD_BEEF_CAFE_0001);
        w.write_f32(1.5);
        w.write_f64(2.25);
        w.write_prefixed_string(b"hello");

        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_i8(), -7);
        assert_eq!(r.read_u16(), 0xBEEF);
        assert_eq!(r.read_i32(), -123456);
        assert_eq!(r.read_u64(), 0xDEAD_BEEF_CAFE_0001);
        assert_eq!(r.read_f32(), 1.5);
        assert_eq!(r.read_f64(), 2.25);
        assert_eq!(r.read_prefixed_string(), b"hello");
        assert!(r.finish().is_ok());
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn latches_first_error_and_short_circuits() {
        let mut r = ByteReader::new(&[1, 2]);
        assert_eq!(r.read_u32(), 0);
        assert!(r.error().is_some());
        // Further reads are inert no-ops, not panics.
        assert_eq!(r.read_u64(), 0);
        assert_eq!(r.read_prefixed_string(), Vec::<u8>::new());
        assert_eq!(
            r.finish(),
            Err(StreamError::Truncated { needed: 4, remaining: 2 })
        );
    }

    #[test]
    fn truncated_prefixed_string_latches() {
        let mut w = ByteWriter::new();
        w.write_u32(10);
        w.write_bytes(b"abc");
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert!(r.read_prefixed_string().is_empty());
        assert!(matches!(r.error(), Some(StreamError::TruncatedString { .. })));
    }
}
