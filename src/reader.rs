//! Primitive decoding cursor.
//!
//! Every `read_*` has a `skip_*` twin that consumes exactly the same number of bytes without
//! allocating. Nothing in the stream marks field boundaries, so a skip that is off by a single
//! byte corrupts every field after it.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use uuid::Uuid;

use crate::config::MAX_LENGTH;
use crate::error::{Error, Result};
use crate::handle::TypeHandle;
use crate::timestamp::{Timestamp, TIMESTAMP_WIDTH};
use crate::writer::NULL_LENGTH;

/// Sequential reader over one input stream. Not shareable between threads; callers serialize
/// access per stream.
pub struct Reader<'a> {
    inner: &'a mut dyn Read,
    position: u64,
    max_length: usize,
}

fn eof(width: u64) -> impl FnOnce(io::Error) -> Error {
    move |e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof { needed: width }
        } else {
            Error::Io(e)
        }
    }
}

macro_rules! fixed_read {
    ($read:ident, $skip:ident, $t:ty, $width:expr, $call:ident $(::<$bo:ty>)?) => {
        pub fn $read(&mut self) -> Result<$t> {
            let v = self.inner.$call$(::<$bo>)?().map_err(eof($width))?;
            self.position += $width;
            Ok(v)
        }

        pub fn $skip(&mut self) -> Result<()> {
            self.skip_raw($width)
        }
    };
}

impl<'a> Reader<'a> {
    pub fn new(inner: &'a mut dyn Read) -> Self {
        Self {
            inner,
            position: 0,
            max_length: MAX_LENGTH,
        }
    }

    /// Reject any declared length above `max_length` before materializing it.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Number of bytes consumed through this cursor so far, by reads and skips alike.
    pub fn position(&self) -> u64 {
        self.position
    }

    fixed_read!(read_i8, skip_i8, i8, 1, read_i8);
    fixed_read!(read_u8, skip_u8, u8, 1, read_u8);
    fixed_read!(read_i16, skip_i16, i16, 2, read_i16::<LittleEndian>);
    fixed_read!(read_u16, skip_u16, u16, 2, read_u16::<LittleEndian>);
    fixed_read!(read_i32, skip_i32, i32, 4, read_i32::<LittleEndian>);
    fixed_read!(read_u32, skip_u32, u32, 4, read_u32::<LittleEndian>);
    fixed_read!(read_i64, skip_i64, i64, 8, read_i64::<LittleEndian>);
    fixed_read!(read_u64, skip_u64, u64, 8, read_u64::<LittleEndian>);
    fixed_read!(read_f32, skip_f32, f32, 4, read_f32::<LittleEndian>);
    fixed_read!(read_f64, skip_f64, f64, 8, read_f64::<LittleEndian>);

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::InvalidBool(b)),
        }
    }

    pub fn skip_bool(&mut self) -> Result<()> {
        self.skip_raw(1)
    }

    pub fn read_char(&mut self) -> Result<char> {
        let v = self.read_u32()?;
        char::from_u32(v).ok_or(Error::InvalidChar(v))
    }

    pub fn skip_char(&mut self) -> Result<()> {
        self.skip_raw(4)
    }

    pub fn read_timestamp(&mut self) -> Result<Timestamp> {
        let mut raw = [0u8; TIMESTAMP_WIDTH];
        self.read_exact(&mut raw)?;
        Timestamp::from_fixed(raw).map_err(Error::InvalidTimestamp)
    }

    pub fn skip_timestamp(&mut self) -> Result<()> {
        self.skip_raw(TIMESTAMP_WIDTH as u64)
    }

    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let mut raw = [0u8; 16];
        self.read_exact(&mut raw)?;
        Ok(Uuid::from_bytes(raw))
    }

    pub fn skip_uuid(&mut self) -> Result<()> {
        self.skip_raw(16)
    }

    pub fn read_handle(&mut self) -> Result<TypeHandle> {
        Ok(TypeHandle(self.read_i16()?))
    }

    pub fn skip_handle(&mut self) -> Result<()> {
        self.skip_raw(2)
    }

    /// Read a length prefix. `None` is the null sentinel.
    pub fn read_len(&mut self) -> Result<Option<usize>> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        if len < 0 {
            return Err(Error::InvalidLength(len as i64));
        }
        let len = len as usize;
        self.check_length(len)?;
        Ok(Some(len))
    }

    /// Read an element count, where null isn't meaningful.
    pub fn read_count(&mut self) -> Result<usize> {
        self.read_len()?.ok_or(Error::InvalidLength(NULL_LENGTH as i64))
    }

    pub fn read_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.read_len()? {
            Some(len) => Ok(Some(self.read_raw(len)?)),
            None => Ok(None),
        }
    }

    pub fn skip_bytes(&mut self) -> Result<()> {
        match self.read_len()? {
            Some(len) => self.skip_raw(len as u64),
            None => Ok(()),
        }
    }

    pub fn read_str(&mut self) -> Result<Option<String>> {
        match self.read_bytes()? {
            Some(raw) => Ok(Some(String::from_utf8(raw).map_err(Error::InvalidUtf8)?)),
            None => Ok(None),
        }
    }

    pub fn skip_str(&mut self) -> Result<()> {
        self.skip_bytes()
    }

    /// Materialize exactly `len` bytes. The buffer grows as bytes arrive, so a declared length
    /// the stream can't back fails at EOF instead of allocating it all first.
    pub fn read_raw(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_append(len, &mut buf)?;
        Ok(buf)
    }

    /// Append exactly `len` bytes to `buf`.
    pub fn read_append(&mut self, len: usize, buf: &mut Vec<u8>) -> Result<()> {
        buf.try_reserve_exact(len.min(PREALLOC_LIMIT))
            .map_err(|_| Error::Allocation { requested: len })?;
        let got = (&mut self.inner).take(len as u64).read_to_end(buf)?;
        self.position += got as u64;
        if got < len {
            return Err(Error::UnexpectedEof {
                needed: (len - got) as u64,
            });
        }
        Ok(())
    }

    /// Check a length that didn't come through [`read_len`](Self::read_len).
    pub fn check_length(&self, len: usize) -> Result<()> {
        if len > self.max_length {
            return Err(Error::LengthLimit {
                max: self.max_length,
                actual: len,
            });
        }
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner
            .read_exact(buf)
            .map_err(eof(buf.len() as u64))?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Advance `len` bytes without keeping them.
    pub fn skip_raw(&mut self, len: u64) -> Result<()> {
        let got = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        self.position += got;
        if got < len {
            return Err(Error::UnexpectedEof { needed: len - got });
        }
        Ok(())
    }
}

/// Most items or bytes reserved on the strength of a declared length alone. Anything past this
/// is allocated as it is actually read.
pub(crate) const PREALLOC_LIMIT: usize = 4096;

/// Reserve room for up to `len` decoded items before reading any of them.
pub(crate) fn reserve<T>(len: usize) -> Result<Vec<T>> {
    let capped = len.min(PREALLOC_LIMIT);
    let mut out = Vec::new();
    out.try_reserve_exact(capped).map_err(|_| Error::Allocation {
        requested: capped.saturating_mul(std::mem::size_of::<T>()),
    })?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::writer::Writer;

    /// Write with `write`, then check `read` returns `expected` and `skip` lands on the same
    /// byte as `read`.
    fn check<T, W, R, S>(write: W, read: R, skip: S, expected: T)
    where
        T: PartialEq + std::fmt::Debug,
        W: FnOnce(&mut Writer) -> Result<()>,
        R: FnOnce(&mut Reader) -> Result<T>,
        S: FnOnce(&mut Reader) -> Result<()>,
    {
        let mut buf = Vec::new();
        let written = {
            let mut w = Writer::new(&mut buf);
            write(&mut w).unwrap();
            w.position()
        };
        // Trailing sentinel catches skips that run long.
        buf.push(0xAA);

        let mut src = &buf[..];
        let mut r = Reader::new(&mut src);
        assert_eq!(read(&mut r).unwrap(), expected);
        assert_eq!(r.position(), written);
        assert_eq!(r.read_u8().unwrap(), 0xAA);

        let mut src = &buf[..];
        let mut r = Reader::new(&mut src);
        skip(&mut r).unwrap();
        assert_eq!(r.position(), written);
        assert_eq!(r.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn fixed_width_values() {
        check(|w| w.write_i8(-3), |r| r.read_i8(), |r| r.skip_i8(), -3);
        check(|w| w.write_u16(0xBEEF), |r| r.read_u16(), |r| r.skip_u16(), 0xBEEF);
        check(|w| w.write_i32(i32::MIN), |r| r.read_i32(), |r| r.skip_i32(), i32::MIN);
        check(|w| w.write_u64(u64::MAX), |r| r.read_u64(), |r| r.skip_u64(), u64::MAX);
        check(|w| w.write_f64(1.5), |r| r.read_f64(), |r| r.skip_f64(), 1.5);
        check(|w| w.write_bool(true), |r| r.read_bool(), |r| r.skip_bool(), true);
        check(|w| w.write_char('漢'), |r| r.read_char(), |r| r.skip_char(), '漢');
        let ts = Timestamp::from_utc(-5, 999).unwrap();
        check(
            |w| w.write_timestamp(&ts),
            |r| r.read_timestamp(),
            |r| r.skip_timestamp(),
            ts,
        );
        let id = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        check(|w| w.write_uuid(&id), |r| r.read_uuid(), |r| r.skip_uuid(), id);
    }

    #[test]
    fn strings() {
        check(
            |w| w.write_str("hello"),
            |r| r.read_str(),
            |r| r.skip_str(),
            Some("hello".to_string()),
        );
        check(
            |w| w.write_str(""),
            |r| r.read_str(),
            |r| r.skip_str(),
            Some(String::new()),
        );
        check(
            |w| w.write_opt_str(None),
            |r| r.read_str(),
            |r| r.skip_str(),
            None,
        );
    }

    #[test]
    fn bytes() {
        check(
            |w| w.write_bytes(&[]),
            |r| r.read_bytes(),
            |r| r.skip_bytes(),
            Some(Vec::new()),
        );
        check(
            |w| w.write_bytes(&[1, 2, 3]),
            |r| r.read_bytes(),
            |r| r.skip_bytes(),
            Some(vec![1, 2, 3]),
        );
        check(
            |w| w.write_opt_bytes(None),
            |r| r.read_bytes(),
            |r| r.skip_bytes(),
            None,
        );
    }

    #[test]
    fn invalid_values() {
        let mut src: &[u8] = &[2];
        assert!(matches!(
            Reader::new(&mut src).read_bool(),
            Err(Error::InvalidBool(2))
        ));

        let mut src: &[u8] = &[0x00, 0xD8, 0x00, 0x00];
        assert!(matches!(
            Reader::new(&mut src).read_char(),
            Err(Error::InvalidChar(0xD800))
        ));

        let raw = (-2i32).to_le_bytes();
        let mut src: &[u8] = &raw;
        assert!(matches!(
            Reader::new(&mut src).read_str(),
            Err(Error::InvalidLength(-2))
        ));

        let mut src: &[u8] = &[2, 0, 0, 0, 0xff, 0xfe];
        assert!(matches!(
            Reader::new(&mut src).read_str(),
            Err(Error::InvalidUtf8(_))
        ));
    }

    #[test]
    fn truncated_input() {
        let mut src: &[u8] = &[1, 2];
        assert!(matches!(
            Reader::new(&mut src).read_i32(),
            Err(Error::UnexpectedEof { .. })
        ));

        // Declares 10 bytes, carries 3.
        let mut src: &[u8] = &[10, 0, 0, 0, 1, 2, 3];
        let mut r = Reader::new(&mut src);
        assert!(matches!(
            r.read_bytes(),
            Err(Error::UnexpectedEof { needed: 7 })
        ));

        let mut src: &[u8] = &[10, 0, 0, 0, 1, 2, 3];
        let mut r = Reader::new(&mut src);
        assert!(matches!(
            r.skip_bytes(),
            Err(Error::UnexpectedEof { needed: 7 })
        ));
    }

    #[test]
    fn length_limit_is_checked_before_allocating() {
        let raw = i32::MAX.to_le_bytes();
        let mut src: &[u8] = &raw;
        let mut r = Reader::new(&mut src).with_max_length(1024);
        match r.read_bytes() {
            Err(Error::LengthLimit { max: 1024, actual }) => assert_eq!(actual, i32::MAX as usize),
            other => panic!("unexpected {:?}", other),
        }
    }
}
