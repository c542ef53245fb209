use std::cmp;
use std::convert::TryFrom;
use std::fmt;
use std::ops;
use std::time;

use byteorder::{LittleEndian, ReadBytesExt};

use serde::{
    de::{Deserialize, Deserializer, Error, MapAccess, Visitor},
    ser::{SerializeStruct, Serialize, Serializer},
};
use serde_bytes::ByteBuf;

const MAX_NANOSEC: u32 = 1_999_999_999;

/// Newtype-struct name the pack serializer recognizes to emit a timestamp extension element
/// instead of a plain byte sequence.
pub(crate) const TIMESTAMP_TOKEN: &str = "$graph_pack::Timestamp";

/// Fixed width of a timestamp in the primitive I/O layer.
pub const TIMESTAMP_WIDTH: usize = 8 + 4;

/// UTC time as seconds since the UNIX epoch plus nanoseconds. Nanoseconds may exceed one
/// second to represent a leap second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    sec: i64,
    nano: u32,
}

impl Timestamp {
    /// Create a timestamp from a raw seconds + nanoseconds value
    pub fn from_utc(sec: i64, nano: u32) -> Option<Timestamp> {
        if nano > MAX_NANOSEC {
            None
        } else {
            Some(Timestamp { sec, nano })
        }
    }

    pub fn from_sec(sec: i64) -> Timestamp {
        Timestamp { sec, nano: 0 }
    }

    pub fn min_value() -> Timestamp {
        Timestamp {
            sec: i64::MIN,
            nano: 0,
        }
    }

    pub fn max_value() -> Timestamp {
        Timestamp {
            sec: i64::MAX,
            nano: MAX_NANOSEC,
        }
    }

    /// Return the UNIX timestamp (number of seconds since January 1, 1970
    /// 0:00:00 UTC).
    pub fn timestamp_utc(&self) -> i64 {
        self.sec
    }

    /// Returns the number of nanoseconds past the second count.
    pub fn timestamp_subsec_nanos(&self) -> u32 {
        self.nano
    }

    /// Fixed-width form used by the primitive I/O layer: seconds as little-endian i64, then
    /// nanoseconds as little-endian u32.
    pub fn to_fixed(&self) -> [u8; TIMESTAMP_WIDTH] {
        let mut out = [0u8; TIMESTAMP_WIDTH];
        out[..8].copy_from_slice(&self.sec.to_le_bytes());
        out[8..].copy_from_slice(&self.nano.to_le_bytes());
        out
    }

    pub fn from_fixed(raw: [u8; TIMESTAMP_WIDTH]) -> Result<Timestamp, String> {
        let mut raw = &raw[..];
        let sec = raw.read_i64::<LittleEndian>().map_err(|e| e.to_string())?;
        let nano = raw.read_u32::<LittleEndian>().map_err(|e| e.to_string())?;
        Timestamp::from_utc(sec, nano)
            .ok_or_else(|| format!("nanoseconds out of range ({})", nano))
    }

    /// Compact form used inside the fallback serializer's extension element. One of 3
    /// formats:
    /// 1. If nanoseconds is nonzero, the seconds as little-endian i64 and the nanoseconds as
    ///    little-endian u32.
    /// 2. If nanoseconds is zero & seconds maps to a u32, the seconds as little-endian u32.
    /// 3. Otherwise, the seconds as little-endian i64.
    pub fn encode_vec(&self, vec: &mut Vec<u8>) {
        if self.nano != 0 {
            vec.extend_from_slice(&self.to_fixed());
        } else if (self.sec <= u32::MAX as i64) && (self.sec >= 0) {
            vec.extend_from_slice(&(self.sec as u32).to_le_bytes());
        } else {
            vec.extend_from_slice(&self.sec.to_le_bytes());
        }
    }

    pub fn as_vec(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(TIMESTAMP_WIDTH);
        self.encode_vec(&mut v);
        v
    }

    /// Create a Timestamp based on the current system time. Fails if the system clock is
    /// before the UNIX epoch.
    pub fn now() -> Option<Timestamp> {
        match time::SystemTime::now().duration_since(time::SystemTime::UNIX_EPOCH) {
            Ok(t) => Timestamp::from_utc(t.as_secs() as i64, t.subsec_nanos()),
            Err(_) => None,
        }
    }
}

impl ops::Add<i64> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: i64) -> Self {
        Timestamp {
            sec: self.sec + rhs,
            nano: self.nano,
        }
    }
}

impl ops::Sub<i64> for Timestamp {
    type Output = Timestamp;
    fn sub(self, rhs: i64) -> Self {
        Timestamp {
            sec: self.sec - rhs,
            nano: self.nano,
        }
    }
}

impl cmp::Ord for Timestamp {
    fn cmp(&self, other: &Timestamp) -> cmp::Ordering {
        self.sec.cmp(&other.sec).then(self.nano.cmp(&other.nano))
    }
}

impl cmp::PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Timestamp) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UTC: {} sec + {} ns", self.sec, self.nano)
    }
}

impl TryFrom<&[u8]> for Timestamp {
    type Error = String;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let mut raw = value;
        let (sec, nano) = match value.len() {
            12 => {
                let sec = raw.read_i64::<LittleEndian>().map_err(|e| e.to_string())?;
                let nano = raw.read_u32::<LittleEndian>().map_err(|e| e.to_string())?;
                (sec, nano)
            }
            8 => (raw.read_i64::<LittleEndian>().map_err(|e| e.to_string())?, 0),
            4 => (
                raw.read_u32::<LittleEndian>().map_err(|e| e.to_string())? as i64,
                0,
            ),
            _ => {
                return Err(format!(
                    "not a recognized Timestamp length ({} bytes)",
                    value.len()
                ))
            }
        };
        Timestamp::from_utc(sec, nano).ok_or_else(|| format!("nanoseconds out of range ({})", nano))
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            let mut st = serializer.serialize_struct("Timestamp", 2)?;
            st.serialize_field("secs", &self.sec)?;
            st.serialize_field("nanos", &self.nano)?;
            st.end()
        } else {
            serializer.serialize_newtype_struct(TIMESTAMP_TOKEN, &ByteBuf::from(self.as_vec()))
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TimeVisitor;

        impl<'de> Visitor<'de> for TimeVisitor {
            type Value = Timestamp;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(fmt, "a timestamp")
            }

            fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                let bytes: ByteBuf = Deserialize::deserialize(deserializer)?;
                Timestamp::try_from(&bytes[..]).map_err(D::Error::custom)
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Timestamp::try_from(v).map_err(E::custom)
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut secs: Option<i64> = None;
                let mut nanos: u32 = 0;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_ref() {
                        "secs" => secs = Some(map.next_value()?),
                        "nanos" => nanos = map.next_value()?,
                        _ => return Err(A::Error::unknown_field(key.as_ref(), &["secs", "nanos"])),
                    }
                }
                let secs = secs.ok_or_else(|| A::Error::missing_field("secs"))?;
                Timestamp::from_utc(secs, nanos)
                    .ok_or_else(|| A::Error::custom("Invalid timestamp"))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_struct("Timestamp", &["secs", "nanos"], TimeVisitor)
        } else {
            deserializer.deserialize_newtype_struct(TIMESTAMP_TOKEN, TimeVisitor)
        }
    }
}
