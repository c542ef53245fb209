use std::fmt;

/// Compact identifier for a registered type within one cache context.
///
/// Assignable handles are `0..=i16::MAX`. Negative values are reserved for the wire: see
/// [`TypeHandle::NULL`] and [`TypeHandle::BACK_REFERENCE`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub i16);

impl TypeHandle {
    /// Marks an absent object.
    pub const NULL: TypeHandle = TypeHandle(-1);
    /// Marks a reference to an object already seen in this stream. Followed by an i32
    /// encounter index.
    pub const BACK_REFERENCE: TypeHandle = TypeHandle(-2);

    pub fn is_reserved(self) -> bool {
        self.0 < 0
    }

    pub fn get(self) -> i16 {
        self.0
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Secondary identifier used next to a [`TypeHandle`] when the primary handle alone isn't
/// enough, e.g. an enumeration's underlying integer width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubtypeHandle(pub i16);

impl From<TypeHandle> for SubtypeHandle {
    fn from(h: TypeHandle) -> Self {
        SubtypeHandle(h.0)
    }
}

impl fmt::Display for SubtypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
