use std::convert::TryFrom;

use byteorder::{LittleEndian, ReadBytesExt};
use serde::de::Unexpected;

use crate::{depth_tracking::DepthTracker, marker::*};
use crate::{
    error::{Error, Result},
    reader::Reader,
    timestamp::Timestamp,
};

/// One item of the pack format. Arrays and maps only carry their length; their contents are
/// the elements that follow.
#[derive(Clone, Debug, PartialEq)]
pub enum Element<'a> {
    Null,
    Bool(bool),
    UInt(u64),
    /// Always negative.
    NegInt(i64),
    Str(&'a str),
    F32(f32),
    F64(f64),
    Bin(&'a [u8]),
    Array(usize),
    Map(usize),
    Timestamp(Timestamp),
}

impl<'a> Element<'a> {
    pub fn name(&self) -> &'static str {
        use self::Element::*;
        match self {
            Null => "Null",
            Bool(_) => "Bool",
            UInt(_) | NegInt(_) => "Int",
            Str(_) => "Str",
            F32(_) => "F32",
            F64(_) => "F64",
            Bin(_) => "Bin",
            Array(_) => "Array",
            Map(_) => "Map",
            Timestamp(_) => "Time",
        }
    }

    pub fn unexpected(&self) -> Unexpected<'_> {
        use self::Element::*;
        match self {
            Null => Unexpected::Unit,
            Bool(v) => Unexpected::Bool(*v),
            UInt(v) => Unexpected::Unsigned(*v),
            NegInt(v) => Unexpected::Signed(*v),
            Str(v) => Unexpected::Str(v),
            F32(v) => Unexpected::Float(*v as f64),
            F64(v) => Unexpected::Float(*v),
            Bin(v) => Unexpected::Bytes(v),
            Array(_) => Unexpected::Seq,
            Map(_) => Unexpected::Map,
            Timestamp(_) => Unexpected::Other("timestamp"),
        }
    }

    /// Length of the element's variable part, for the elements that have one.
    pub fn declared_len(&self) -> usize {
        match self {
            Element::Str(v) => v.len(),
            Element::Bin(v) => v.len(),
            Element::Array(len) | Element::Map(len) => *len,
            _ => 0,
        }
    }
}

fn push_len(buf: &mut Vec<u8>, len: usize, small: Marker, mid: Marker, large: Marker) {
    if len <= u8::MAX as usize {
        buf.push(small.into());
        buf.push(len as u8);
    } else if len <= u16::MAX as usize {
        buf.push(mid.into());
        buf.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        buf.push(large.into());
        buf.extend_from_slice(&(len as u32).to_le_bytes());
    }
}

/// Serialize an element onto a byte vector. Doesn't check if Array & Map structures make
/// sense, just writes elements out. Lengths must already fit in a u32.
pub fn serialize_elem(buf: &mut Vec<u8>, elem: Element) {
    use self::Element::*;
    match elem {
        Null => buf.push(Marker::Null.into()),
        Bool(v) => buf.push(if v { Marker::True } else { Marker::False }.into()),
        UInt(v) => {
            if v <= 127 {
                buf.push(Marker::PosFixInt(v as u8).into());
            } else if v <= u8::MAX as u64 {
                buf.push(Marker::UInt8.into());
                buf.push(v as u8);
            } else if v <= u16::MAX as u64 {
                buf.push(Marker::UInt16.into());
                buf.extend_from_slice(&(v as u16).to_le_bytes());
            } else if v <= u32::MAX as u64 {
                buf.push(Marker::UInt32.into());
                buf.extend_from_slice(&(v as u32).to_le_bytes());
            } else {
                buf.push(Marker::UInt64.into());
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        NegInt(v) => {
            if v >= -32 {
                buf.push(Marker::NegFixInt(v as i8).into());
            } else if v >= i8::MIN as i64 {
                buf.push(Marker::Int8.into());
                buf.push(v as u8);
            } else if v >= i16::MIN as i64 {
                buf.push(Marker::Int16.into());
                buf.extend_from_slice(&(v as i16).to_le_bytes());
            } else if v >= i32::MIN as i64 {
                buf.push(Marker::Int32.into());
                buf.extend_from_slice(&(v as i32).to_le_bytes());
            } else {
                buf.push(Marker::Int64.into());
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        Str(v) => {
            let len = v.len();
            if len <= 31 {
                buf.push(Marker::FixStr(len as u8).into());
            } else {
                push_len(buf, len, Marker::Str8, Marker::Str16, Marker::Str32);
            }
            buf.extend_from_slice(v.as_bytes());
        }
        F32(v) => {
            buf.push(Marker::F32.into());
            buf.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        F64(v) => {
            buf.push(Marker::F64.into());
            buf.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        Bin(v) => {
            push_len(buf, v.len(), Marker::Bin8, Marker::Bin16, Marker::Bin32);
            buf.extend_from_slice(v);
        }
        Array(len) => {
            if len <= 15 {
                buf.push(Marker::FixArray(len as u8).into());
            } else {
                push_len(buf, len, Marker::Array8, Marker::Array16, Marker::Array32);
            }
        }
        Map(len) => {
            if len <= 15 {
                buf.push(Marker::FixMap(len as u8).into());
            } else {
                push_len(buf, len, Marker::Map8, Marker::Map16, Marker::Map32);
            }
        }
        Timestamp(v) => {
            let enc = v.as_vec();
            Marker::encode_ext_marker(buf, enc.len());
            buf.push(ExtType::Timestamp.into());
            buf.extend_from_slice(&enc);
        }
    }
}

fn not_shortest(what: &str, value: impl std::fmt::Display) -> Error {
    Error::Pack(format!(
        "Got {} with value = {}. This is not the shortest encoding.",
        what, value
    ))
}

/// Element iterator over a complete pack encoding held in memory.
#[derive(Clone, Debug)]
pub struct Parser<'a> {
    data: &'a [u8],
    depth_tracking: DepthTracker,
    errored: bool,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8], max_depth: usize) -> Parser<'a> {
        Self {
            data,
            depth_tracking: DepthTracker::new(max_depth),
            errored: false,
        }
    }

    pub fn peek_marker(&self) -> Option<Marker> {
        self.data.first().map(|n| Marker::from_u8(*n))
    }

    /// Bytes not yet parsed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.data.len() {
            return Err(Error::UnexpectedEof {
                needed: (len - self.data.len()) as u64,
            });
        }
        let (bytes, data) = self.data.split_at(len);
        self.data = data;
        Ok(bytes)
    }

    fn take_len(&mut self, marker: Marker) -> Result<usize> {
        let width = marker.length_width().unwrap_or(0);
        let raw = self.take(width)?;
        let mut padded = [0u8; 4];
        padded[..width].copy_from_slice(raw);
        Ok(u32::from_le_bytes(padded) as usize)
    }

    fn take_str(&mut self, len: usize) -> Result<&'a str> {
        let raw = self.take(len)?;
        std::str::from_utf8(raw).map_err(|e| Error::Pack(format!("{}", e)))
    }

    // Given a retrieved marker, try to turn it into the next element, which may move through the
    // indexed data. If we can't, error. This function *does not* set the the errored flag. That's
    // up to the caller.
    fn parse_element(&mut self, marker: Marker) -> Result<Element<'a>> {
        use self::Marker::*;
        let elem = match marker {
            Reserved => return Err(Error::Pack(String::from("Reserved marker found"))),
            Null => Element::Null,
            False => Element::Bool(false),
            True => Element::Bool(true),
            PosFixInt(v) => Element::UInt(v.into()),
            NegFixInt(v) => Element::NegInt(v.into()),
            UInt8 => {
                let v = self.take(1)?.read_u8()?;
                if v < 128 {
                    return Err(not_shortest("UInt8", v));
                }
                Element::UInt(v.into())
            }
            UInt16 => {
                let v = self.take(2)?.read_u16::<LittleEndian>()?;
                if v <= u8::MAX as u16 {
                    return Err(not_shortest("UInt16", v));
                }
                Element::UInt(v.into())
            }
            UInt32 => {
                let v = self.take(4)?.read_u32::<LittleEndian>()?;
                if v <= u16::MAX as u32 {
                    return Err(not_shortest("UInt32", v));
                }
                Element::UInt(v.into())
            }
            UInt64 => {
                let v = self.take(8)?.read_u64::<LittleEndian>()?;
                if v <= u32::MAX as u64 {
                    return Err(not_shortest("UInt64", v));
                }
                Element::UInt(v)
            }
            Int8 => {
                let v = self.take(1)?.read_i8()?;
                if v >= -32 {
                    return Err(not_shortest("Int8", v));
                }
                Element::NegInt(v.into())
            }
            Int16 => {
                let v = self.take(2)?.read_i16::<LittleEndian>()?;
                if v >= i8::MIN as i16 {
                    return Err(not_shortest("Int16", v));
                }
                Element::NegInt(v.into())
            }
            Int32 => {
                let v = self.take(4)?.read_i32::<LittleEndian>()?;
                if v >= i16::MIN as i32 {
                    return Err(not_shortest("Int32", v));
                }
                Element::NegInt(v.into())
            }
            Int64 => {
                let v = self.take(8)?.read_i64::<LittleEndian>()?;
                if v >= i32::MIN as i64 {
                    return Err(not_shortest("Int64", v));
                }
                Element::NegInt(v)
            }
            F32 => Element::F32(self.take(4)?.read_f32::<LittleEndian>()?),
            F64 => Element::F64(self.take(8)?.read_f64::<LittleEndian>()?),
            Bin8 | Bin16 | Bin32 => {
                let len = self.take_len(marker)?;
                check_width(marker, len, 0)?;
                Element::Bin(self.take(len)?)
            }
            FixStr(len) => Element::Str(self.take_str(len as usize)?),
            Str8 | Str16 | Str32 => {
                let len = self.take_len(marker)?;
                check_width(marker, len, 31)?;
                Element::Str(self.take_str(len)?)
            }
            FixArray(len) => Element::Array(len as usize),
            Array8 | Array16 | Array32 => {
                let len = self.take_len(marker)?;
                check_width(marker, len, 15)?;
                if len > self.data.len() {
                    return Err(Error::Pack(format!(
                        "Got {:?} marker with length = {}, but there are only {} bytes left.",
                        marker,
                        len,
                        self.data.len()
                    )));
                }
                Element::Array(len)
            }
            FixMap(len) => Element::Map(len as usize),
            Map8 | Map16 | Map32 => {
                let len = self.take_len(marker)?;
                check_width(marker, len, 15)?;
                if len.saturating_mul(2) > self.data.len() {
                    return Err(Error::Pack(format!(
                        "Got {:?} marker with length = {}, but there are only {} bytes left.",
                        marker,
                        len,
                        self.data.len()
                    )));
                }
                Element::Map(len)
            }
            Ext8 | Ext16 | Ext32 => {
                let len = self.take_len(marker)?;
                check_width(marker, len, 0)?;
                self.parse_ext(len)?
            }
        };
        self.depth_tracking.update_elem(&elem)?;
        Ok(elem)
    }

    fn parse_ext(&mut self, len: usize) -> Result<Element<'a>> {
        let ext_type = self.take(1)?[0];
        let ext_type = ExtType::from_u8(ext_type)
            .ok_or_else(|| Error::Pack(format!("Got unrecognized Ext type {}.", ext_type)))?;
        let bytes = self.take(len)?;
        Ok(match ext_type {
            ExtType::Timestamp => {
                Element::Timestamp(Timestamp::try_from(bytes).map_err(Error::Pack)?)
            }
        })
    }
}

/// Reject a sized marker whose length would have fit a narrower form. `fix_max` is the largest
/// length the fixed-size form (if any) holds.
fn check_width(marker: Marker, len: usize, fix_max: usize) -> Result<()> {
    let floor = match marker.length_width() {
        Some(1) if fix_max == 0 => return Ok(()),
        Some(1) => fix_max,
        Some(2) => u8::MAX as usize,
        _ => u16::MAX as usize,
    };
    if len <= floor {
        return Err(Error::Pack(format!(
            "Got {:?} marker with length = {}. This is not the shortest encoding.",
            marker, len
        )));
    }
    Ok(())
}

impl<'a> std::iter::Iterator for Parser<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        let (&marker, data) = self.data.split_first()?;
        self.data = data;
        let result = self.parse_element(Marker::from_u8(marker));
        if result.is_err() {
            self.errored = true;
        }
        Some(result)
    }
}

/// Copy exactly one element tree from `reader` onto `out`, without interpreting scalar
/// contents. Nesting and declared lengths are still bounded.
pub fn capture_elem(reader: &mut Reader, out: &mut Vec<u8>, max_depth: usize) -> Result<()> {
    use self::Marker::*;
    let mut depth_tracking = DepthTracker::new(max_depth);
    let mut pending: usize = 1;
    while pending > 0 {
        pending -= 1;
        let byte = reader.read_u8()?;
        out.push(byte);
        let marker = Marker::from_u8(byte);
        let (content, nested) = match marker {
            Reserved => {
                return Err(Error::Pack(format!(
                    "Reserved marker 0x{:x} found",
                    byte
                )))
            }
            FixArray(len) => (0, Element::Array(len as usize)),
            FixMap(len) => (0, Element::Map(len as usize)),
            m => match m.length_width() {
                Some(width) => {
                    let mut raw = [0u8; 4];
                    reader.read_exact(&mut raw[..width])?;
                    out.extend_from_slice(&raw[..width]);
                    let len = u32::from_le_bytes(raw) as usize;
                    reader.check_length(len)?;
                    match m {
                        Array8 | Array16 | Array32 => (0, Element::Array(len)),
                        Map8 | Map16 | Map32 => (0, Element::Map(len)),
                        // Extension type byte precedes the content
                        Ext8 | Ext16 | Ext32 => (len + 1, Element::Null),
                        _ => (len, Element::Null),
                    }
                }
                None => (m.fixed_content().unwrap_or(0), Element::Null),
            },
        };
        depth_tracking.update_elem(&nested)?;
        let children = match nested {
            Element::Array(len) => len,
            Element::Map(len) => len.saturating_mul(2),
            _ => 0,
        };
        pending = pending
            .checked_add(children)
            .ok_or(Error::InvalidLength(children as i64))?;
        if content > 0 {
            reader.read_append(content, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::MAX_DEPTH;

    fn roundtrip(elem: Element) -> Vec<u8> {
        let mut enc = Vec::new();
        serialize_elem(&mut enc, elem.clone());
        let mut parser = Parser::new(enc.as_ref(), MAX_DEPTH);
        let val = parser.next().unwrap().unwrap();
        assert_eq!(val, elem);
        assert!(parser.next().is_none());
        enc
    }

    fn parse_err(data: &[u8]) -> Error {
        let mut parser = Parser::new(data, MAX_DEPTH);
        match parser.next() {
            Some(Err(e)) => e,
            other => panic!("expected an error, got {:?}", other),
        }
    }

    #[test]
    fn reserved() {
        for byte in [0xc1u8, 0xdd, 0xde, 0xdf] {
            let data = [byte, 0x00];
            let mut parser = Parser::new(&data, MAX_DEPTH);
            assert!(
                parser.next().unwrap().is_err(),
                "0x{:x} should fail because it is a reserved marker byte",
                byte
            );
            assert!(parser.next().is_none());
        }
    }

    mod null {
        use super::*;

        #[test]
        fn encoding() {
            assert_eq!(roundtrip(Element::Null), &[0xc0]);
        }
    }

    mod bool {
        use super::*;

        #[test]
        fn encoding() {
            assert_eq!(roundtrip(Element::Bool(false)), &[0xc2]);
            assert_eq!(roundtrip(Element::Bool(true)), &[0xc3]);
        }
    }

    mod integer {
        use super::*;

        #[test]
        fn roundtrip_pos_int() {
            // Run through all the boundary cases
            let mut test_cases: Vec<u64> = vec![0, 1];
            for edge in [127, u8::MAX as u64, u16::MAX as u64, u32::MAX as u64] {
                for i in 0..5 {
                    test_cases.push(edge - 2 + i)
                }
            }
            for i in 0..3 {
                test_cases.push(u64::MAX - 2 + i)
            }
            for case in test_cases {
                roundtrip(Element::UInt(case));
            }
        }

        #[test]
        fn roundtrip_neg_int() {
            let mut test_cases: Vec<i64> = vec![-1];
            for edge in [-32, i8::MIN as i64, i16::MIN as i64, i32::MIN as i64] {
                for i in -2..3 {
                    test_cases.push(edge - i)
                }
            }
            test_cases.push(i64::MIN);
            test_cases.push(i64::MIN + 1);
            for case in test_cases {
                roundtrip(Element::NegInt(case));
            }
        }

        #[test]
        fn encoding() {
            assert_eq!(roundtrip(Element::UInt(5)), &[0x05]);
            assert_eq!(roundtrip(Element::UInt(200)), &[0xcc, 200]);
            assert_eq!(roundtrip(Element::UInt(0x1234)), &[0xcd, 0x34, 0x12]);
            assert_eq!(roundtrip(Element::NegInt(-1)), &[0xff]);
            assert_eq!(roundtrip(Element::NegInt(-33)), &[0xd0, (-33i8) as u8]);
        }

        #[test]
        fn rejects_long_forms() {
            assert!(matches!(parse_err(&[0xcc, 0x05]), Error::Pack(_)));
            assert!(matches!(parse_err(&[0xcd, 0x05, 0x00]), Error::Pack(_)));
            assert!(matches!(parse_err(&[0xd0, 0x01]), Error::Pack(_)));
            assert!(matches!(parse_err(&[0xd1, 0xff, 0xff]), Error::Pack(_)));
        }

        #[test]
        fn truncated() {
            assert!(matches!(
                parse_err(&[0xcf, 0x00, 0x01]),
                Error::UnexpectedEof { needed: 6 }
            ));
        }
    }

    mod float {
        use super::*;

        #[test]
        fn encoding() {
            let enc = roundtrip(Element::F32(1.0));
            assert_eq!(enc, &[0xca, 0x00, 0x00, 0x80, 0x3f]);
            roundtrip(Element::F64(-0.25));
        }
    }

    mod string {
        use super::*;

        #[test]
        fn lengths() {
            for len in [0usize, 31, 32, 255, 256, 65535, 65536] {
                let s = "a".repeat(len);
                let enc = roundtrip(Element::Str(&s));
                let header = match len {
                    0..=31 => 1,
                    32..=255 => 2,
                    256..=65535 => 3,
                    _ => 5,
                };
                assert_eq!(enc.len(), header + len);
            }
        }

        #[test]
        fn rejects_bad_utf8() {
            assert!(matches!(parse_err(&[0xa2, 0xff, 0xfe]), Error::Pack(_)));
        }

        #[test]
        fn rejects_long_forms() {
            assert!(matches!(parse_err(&[0xd4, 0x01, b'a']), Error::Pack(_)));
        }
    }

    mod binary {
        use super::*;

        #[test]
        fn lengths() {
            for len in [0usize, 255, 256, 65536] {
                let v = vec![7u8; len];
                roundtrip(Element::Bin(&v));
            }
        }
    }

    mod nesting {
        use super::*;

        #[test]
        fn containers() {
            roundtrip(Element::Array(0));
            roundtrip(Element::Map(0));
        }

        #[test]
        fn depth_limit() {
            let data = [0x91u8, 0x91, 0x91, 0xc0];
            let mut parser = Parser::new(&data, 2);
            assert!(parser.next().unwrap().is_ok());
            assert!(parser.next().unwrap().is_ok());
            assert!(matches!(parser.next(), Some(Err(Error::DepthLimit(2)))));
            assert!(parser.next().is_none());
        }
    }

    mod timestamp {
        use super::*;

        #[test]
        fn roundtrip_ext() {
            let enc = roundtrip(Element::Timestamp(Timestamp::from_sec(1)));
            assert_eq!(enc, &[0xc7, 4, 0, 1, 0, 0, 0]);
            roundtrip(Element::Timestamp(Timestamp::from_utc(-3, 17).unwrap()));
        }

        #[test]
        fn unknown_ext() {
            assert!(matches!(parse_err(&[0xc7, 1, 9, 0]), Error::Pack(_)));
        }
    }

    mod capture {
        use super::*;

        fn elements(elems: &[Element]) -> Vec<u8> {
            let mut enc = Vec::new();
            for e in elems {
                serialize_elem(&mut enc, e.clone());
            }
            enc
        }

        #[test]
        fn stops_after_one_tree() {
            let long = "x".repeat(300);
            let tree = elements(&[
                Element::Map(2),
                Element::Str("a"),
                Element::Array(2),
                Element::UInt(70000),
                Element::Bin(&[1, 2, 3]),
                Element::Str(&long),
                Element::Timestamp(Timestamp::from_utc(5, 5).unwrap()),
            ]);
            let mut data = tree.clone();
            data.push(0xc0);

            let mut src = &data[..];
            let mut reader = Reader::new(&mut src);
            let mut out = Vec::new();
            capture_elem(&mut reader, &mut out, MAX_DEPTH).unwrap();
            assert_eq!(out, tree);
            assert_eq!(reader.position() as usize, tree.len());
        }

        #[test]
        fn truncated_tree() {
            let tree = elements(&[Element::Array(3), Element::Null, Element::Null]);
            let mut src = &tree[..];
            let mut reader = Reader::new(&mut src);
            let mut out = Vec::new();
            assert!(matches!(
                capture_elem(&mut reader, &mut out, MAX_DEPTH),
                Err(Error::UnexpectedEof { .. })
            ));
        }

        #[test]
        fn depth_limit() {
            let tree = elements(&[Element::Array(1), Element::Array(1), Element::Null]);
            let mut src = &tree[..];
            let mut reader = Reader::new(&mut src);
            let mut out = Vec::new();
            assert!(matches!(
                capture_elem(&mut reader, &mut out, 1),
                Err(Error::DepthLimit(1))
            ));
        }
    }
}
