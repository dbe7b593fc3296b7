//! Byte buffers handed to attribute serializers.
//!
//! All multi-byte numbers are big-endian. Strings and byte arrays are
//! prefixed with their length as a `u32`.

use std::io::{self, Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use strata_common::utils::error::{Result, SerializerError};

/// Growable output buffer.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    buf: BytesMut,
}

impl WriteBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Writes one byte.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    /// Writes a boolean as one byte.
    pub fn put_bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    /// Writes a `u16`.
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    /// Writes a `u32`.
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    /// Writes an `i32`.
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    /// Writes an `i64`.
    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    /// Writes a `u64`.
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    /// Writes an `f32`.
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }

    /// Writes an `f64`.
    pub fn put_f64(&mut self, v: f64) {
        self.buf.put_f64(v);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, v: &str) {
        self.put_bytes(v.as_bytes());
    }

    /// Writes a length-prefixed byte array.
    pub fn put_bytes(&mut self, v: &[u8]) {
        self.buf.put_u32(v.len() as u32);
        self.buf.put_slice(v);
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finishes writing and returns the bytes.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Finishes writing and returns an owned vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Cursor over serialized bytes.
#[derive(Debug)]
pub struct ReadBuffer<'a> {
    cursor: Cursor<&'a [u8]>,
}

fn malformed(e: io::Error) -> strata_common::Error {
    let msg = if e.kind() == io::ErrorKind::UnexpectedEof {
        "unexpected end of value".to_string()
    } else {
        e.to_string()
    };
    SerializerError::Malformed(msg).into()
}

impl<'a> ReadBuffer<'a> {
    /// Wraps a byte slice.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Reads one byte.
    pub fn get_u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(malformed)
    }

    /// Reads a boolean written by [`WriteBuffer::put_bool`].
    pub fn get_bool(&mut self) -> Result<bool> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SerializerError::Malformed(format!("invalid boolean byte {other}")).into()),
        }
    }

    /// Reads a `u16`.
    pub fn get_u16(&mut self) -> Result<u16> {
        self.cursor.read_u16::<BigEndian>().map_err(malformed)
    }

    /// Reads a `u32`.
    pub fn get_u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<BigEndian>().map_err(malformed)
    }

    /// Reads an `i32`.
    pub fn get_i32(&mut self) -> Result<i32> {
        self.cursor.read_i32::<BigEndian>().map_err(malformed)
    }

    /// Reads an `i64`.
    pub fn get_i64(&mut self) -> Result<i64> {
        self.cursor.read_i64::<BigEndian>().map_err(malformed)
    }

    /// Reads a `u64`.
    pub fn get_u64(&mut self) -> Result<u64> {
        self.cursor.read_u64::<BigEndian>().map_err(malformed)
    }

    /// Reads an `f32`.
    pub fn get_f32(&mut self) -> Result<f32> {
        self.cursor.read_f32::<BigEndian>().map_err(malformed)
    }

    /// Reads an `f64`.
    pub fn get_f64(&mut self) -> Result<f64> {
        self.cursor.read_f64::<BigEndian>().map_err(malformed)
    }

    /// Reads a length-prefixed byte array.
    pub fn get_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        if len > self.remaining() {
            return Err(SerializerError::Malformed(format!(
                "length {len} exceeds remaining {} bytes",
                self.remaining()
            ))
            .into());
        }
        let mut out = vec![0u8; len];
        self.cursor.read_exact(&mut out).map_err(malformed)?;
        Ok(out)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| SerializerError::Malformed(format!("invalid UTF-8: {e}")).into())
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let total = self.cursor.get_ref().len();
        total.saturating_sub(self.cursor.position() as usize)
    }

    /// True if unread bytes remain.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }
}
