//! Primitive encoding cursor.
//!
//! All multi-byte values are little-endian and fixed width. Byte sequences and strings carry a
//! 4-byte signed length prefix where `-1` means null and `0` means empty.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::handle::TypeHandle;
use crate::timestamp::Timestamp;

/// Length prefix reserved for a null byte sequence or string.
pub const NULL_LENGTH: i32 = -1;

/// Sequential writer over one output stream. Not shareable between threads; callers serialize
/// access per stream.
pub struct Writer<'a> {
    inner: &'a mut dyn Write,
    position: u64,
}

impl<'a> Writer<'a> {
    pub fn new(inner: &'a mut dyn Write) -> Self {
        Self { inner, position: 0 }
    }

    /// Number of bytes written through this cursor so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.inner.write_i8(v)?;
        self.position += 1;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.inner.write_u8(v)?;
        self.position += 1;
        Ok(())
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.inner.write_i16::<LittleEndian>(v)?;
        self.position += 2;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.position += 2;
        Ok(())
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(v)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.inner.write_i64::<LittleEndian>(v)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(v)?;
        self.position += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.inner.write_f32::<LittleEndian>(v)?;
        self.position += 4;
        Ok(())
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.inner.write_f64::<LittleEndian>(v)?;
        self.position += 8;
        Ok(())
    }

    /// Chars are written as their 4-byte scalar value.
    pub fn write_char(&mut self, v: char) -> Result<()> {
        self.write_u32(v as u32)
    }

    pub fn write_timestamp(&mut self, v: &Timestamp) -> Result<()> {
        self.write_raw(&v.to_fixed())
    }

    pub fn write_uuid(&mut self, v: &Uuid) -> Result<()> {
        self.write_raw(v.as_bytes())
    }

    pub fn write_handle(&mut self, handle: TypeHandle) -> Result<()> {
        self.write_i16(handle.get())
    }

    /// Write a 4-byte element count or byte length.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| Error::InvalidLength(len as i64))?;
        self.write_i32(len)
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.write_len(v.len())?;
        self.write_raw(v)
    }

    pub fn write_opt_bytes(&mut self, v: Option<&[u8]>) -> Result<()> {
        match v {
            Some(v) => self.write_bytes(v),
            None => self.write_i32(NULL_LENGTH),
        }
    }

    pub fn write_str(&mut self, v: &str) -> Result<()> {
        self.write_bytes(v.as_bytes())
    }

    pub fn write_opt_str(&mut self, v: Option<&str>) -> Result<()> {
        self.write_opt_bytes(v.map(str::as_bytes))
    }

    /// Write bytes with no length prefix.
    pub fn write_raw(&mut self, v: &[u8]) -> Result<()> {
        self.inner.write_all(v)?;
        self.position += v.len() as u64;
        Ok(())
    }
}
