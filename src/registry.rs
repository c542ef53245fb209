//! Type handle assignment.
//!
//! A [`RegistryBuilder`] collects surrogates and hands out type handles; [`build`] freezes the
//! result into a [`CacheContext`]. Nothing can be registered after that, so every reader of a
//! context sees the same table for its whole life.
//!
//! [`build`]: RegistryBuilder::build

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, trace};

use crate::context::CacheContext;
use crate::error::{Error, Result};
use crate::handle::{SubtypeHandle, TypeHandle};
use crate::packed::Packed;
use crate::surrogate::{
    ContextSurrogate, DictSurrogate, DirectSurrogate, EnumSurrogate, FallbackSurrogate,
    ListSurrogate, ObjectArraySurrogate, PackedSurrogate, PairSurrogate, RecordSurrogate,
};
use crate::timestamp::Timestamp;
use crate::type_key::{builtin, TypeKey};
use crate::value::IntWidth;

pub enum Surrogate {
    Direct(Box<dyn DirectSurrogate>),
    Context(Box<dyn ContextSurrogate>),
}

impl Surrogate {
    pub fn direct<S: DirectSurrogate + 'static>(surrogate: S) -> Self {
        Surrogate::Direct(Box::new(surrogate))
    }

    pub fn context<S: ContextSurrogate + 'static>(surrogate: S) -> Self {
        Surrogate::Context(Box::new(surrogate))
    }

    pub fn as_direct(&self) -> Option<&dyn DirectSurrogate> {
        match self {
            Surrogate::Direct(s) => Some(s.as_ref()),
            Surrogate::Context(_) => None,
        }
    }

    pub fn as_context(&self) -> Option<&dyn ContextSurrogate> {
        match self {
            Surrogate::Context(s) => Some(s.as_ref()),
            Surrogate::Direct(_) => None,
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Surrogate::Context(_))
    }
}

impl fmt::Debug for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Surrogate::Direct(_) => f.write_str("Direct"),
            Surrogate::Context(_) => f.write_str("Context"),
        }
    }
}

/// One registered type: its key, its handles, and the surrogate that codes it.
#[derive(Debug)]
pub struct Registration {
    pub key: TypeKey,
    pub handle: TypeHandle,
    /// Set for enumerations: the type handle of the underlying integer primitive.
    pub subtype: Option<SubtypeHandle>,
    pub surrogate: Surrogate,
}

/// Immutable handle table for one cache context.
#[derive(Debug, Default)]
pub struct SurrogateRegistry {
    entries: Vec<Registration>,
    by_key: HashMap<TypeKey, usize>,
    by_handle: HashMap<TypeHandle, usize>,
    by_subtype: HashMap<(TypeHandle, SubtypeHandle), usize>,
}

impl SurrogateRegistry {
    /// Write path lookup.
    pub fn get_surrogate_for_type(&self, key: &TypeKey) -> Option<&Registration> {
        self.by_key.get(key).map(|&i| &self.entries[i])
    }

    /// Read path lookup.
    pub fn get_surrogate_for_type_handle(&self, handle: TypeHandle) -> Option<&Registration> {
        let found = self.by_handle.get(&handle).map(|&i| &self.entries[i]);
        if found.is_none() {
            trace!(%handle, "no surrogate for type handle");
        }
        found
    }

    /// Secondary read path lookup, tried when a handle embedded by an enumeration has no
    /// registration of its own.
    pub fn get_surrogate_for_subtype_handle(
        &self,
        handle: TypeHandle,
        subtype: SubtypeHandle,
    ) -> Option<&Registration> {
        let found = self
            .by_subtype
            .get(&(handle, subtype))
            .map(|&i| &self.entries[i]);
        if found.is_none() {
            trace!(%handle, %subtype, "no surrogate for subtype handle");
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registrations in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter()
    }

    /// Every `(key, handle)` pair, ordered by handle. Two peers can compare these to confirm
    /// they built the same context.
    pub fn handle_table(&self) -> Vec<(TypeKey, TypeHandle)> {
        let mut table: Vec<_> = self
            .entries
            .iter()
            .map(|r| (r.key.clone(), r.handle))
            .collect();
        table.sort_by_key(|(_, handle)| *handle);
        table
    }
}

/// Collects registrations for a [`CacheContext`].
///
/// Handles are assigned in registration order, starting at 0 and skipping any handle already
/// pinned with [`register_with_handle`](Self::register_with_handle). Both sides of a stream
/// must register the same types in the same order.
///
/// ```
/// use graph_pack::{IntWidth, RegistryBuilder};
///
/// let mut builder = RegistryBuilder::with_builtins();
/// let color = builder.register_enum("Color", IntWidth::U8).unwrap();
/// let context = builder.build("example");
/// let reg = context.registry().get_surrogate_for_type(&"Color".into()).unwrap();
/// assert_eq!(reg.handle, color);
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: SurrogateRegistry,
    next: i16,
}

impl RegistryBuilder {
    /// An empty builder with no built-in types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder holding the built-in catalog at fixed handles 0 through 31.
    pub fn with_builtins() -> Self {
        let mut b = Self::new();
        b.push_packed::<bool>();
        b.push_packed::<i8>();
        b.push_packed::<u8>();
        b.push_packed::<i16>();
        b.push_packed::<u16>();
        b.push_packed::<i32>();
        b.push_packed::<u32>();
        b.push_packed::<i64>();
        b.push_packed::<u64>();
        b.push_packed::<f32>();
        b.push_packed::<f64>();
        b.push_packed::<char>();

        b.push_packed::<Option<Vec<bool>>>();
        b.push_packed::<Option<Vec<i8>>>();
        b.push_packed::<Option<Vec<i16>>>();
        b.push_packed::<Option<Vec<u16>>>();
        b.push_packed::<Option<Vec<i32>>>();
        b.push_packed::<Option<Vec<u32>>>();
        b.push_packed::<Option<Vec<i64>>>();
        b.push_packed::<Option<Vec<u64>>>();
        b.push_packed::<Option<Vec<f32>>>();
        b.push_packed::<Option<Vec<f64>>>();
        b.push_packed::<Option<Vec<char>>>();

        b.push_packed::<Option<Vec<u8>>>();
        b.push_packed::<Option<String>>();
        b.push_packed::<Timestamp>();
        b.push_packed::<uuid::Uuid>();
        b.push(builtin::PAIR, None, Surrogate::direct(PairSurrogate));

        b.push(builtin::LIST, None, Surrogate::context(ListSurrogate));
        b.push(builtin::DICT, None, Surrogate::context(DictSurrogate));
        b.push(
            builtin::OBJECT_ARRAY,
            None,
            Surrogate::context(ObjectArraySurrogate),
        );
        b.push(
            builtin::OBJECT,
            None,
            Surrogate::direct(FallbackSurrogate::catch_all()),
        );
        b
    }

    /// Add an entry without validation. Only used while filling a fresh builder, where keys and
    /// handles can't collide.
    fn push(&mut self, key: TypeKey, subtype: Option<SubtypeHandle>, surrogate: Surrogate) {
        let handle = TypeHandle(self.next);
        self.next += 1;
        self.index(Registration {
            key,
            handle,
            subtype,
            surrogate,
        });
    }

    fn push_packed<T: Packed + 'static>(&mut self) {
        self.push(T::KEY, None, Surrogate::direct(PackedSurrogate::<T>::new()));
    }

    fn index(&mut self, registration: Registration) {
        let i = self.registry.entries.len();
        self.registry.by_key.insert(registration.key.clone(), i);
        self.registry.by_handle.insert(registration.handle, i);
        self.registry.entries.push(registration);
    }

    fn next_handle(&mut self) -> Result<TypeHandle> {
        while self.registry.by_handle.contains_key(&TypeHandle(self.next)) {
            self.next = self
                .next
                .checked_add(1)
                .ok_or(Error::HandleSpaceExhausted)?;
        }
        Ok(TypeHandle(self.next))
    }

    fn insert(
        &mut self,
        key: TypeKey,
        handle: TypeHandle,
        subtype: Option<SubtypeHandle>,
        surrogate: Surrogate,
    ) -> Result<()> {
        if handle.is_reserved() {
            return Err(Error::ReservedHandle(handle));
        }
        if self.registry.by_key.contains_key(&key) {
            return Err(Error::DuplicateType(key));
        }
        if self.registry.by_handle.contains_key(&handle) {
            return Err(Error::DuplicateHandle(handle));
        }
        self.index(Registration {
            key,
            handle,
            subtype,
            surrogate,
        });
        Ok(())
    }

    fn register(&mut self, key: TypeKey, surrogate: Surrogate) -> Result<TypeHandle> {
        if self.registry.by_key.contains_key(&key) {
            return Err(Error::DuplicateType(key));
        }
        let handle = self.next_handle()?;
        self.insert(key, handle, None, surrogate)?;
        Ok(handle)
    }

    pub fn register_direct<S>(
        &mut self,
        key: impl Into<TypeKey>,
        surrogate: S,
    ) -> Result<TypeHandle>
    where
        S: DirectSurrogate + 'static,
    {
        self.register(key.into(), Surrogate::direct(surrogate))
    }

    pub fn register_context<S>(
        &mut self,
        key: impl Into<TypeKey>,
        surrogate: S,
    ) -> Result<TypeHandle>
    where
        S: ContextSurrogate + 'static,
    {
        self.register(key.into(), Surrogate::context(surrogate))
    }

    /// Register at a fixed handle instead of the next free one.
    pub fn register_with_handle(
        &mut self,
        key: impl Into<TypeKey>,
        handle: TypeHandle,
        surrogate: Surrogate,
    ) -> Result<()> {
        self.insert(key.into(), handle, None, surrogate)
    }

    /// Register an enumeration stored at `width`. The width's primitive must already be
    /// registered; its handle becomes the enumeration's subtype handle.
    pub fn register_enum(
        &mut self,
        key: impl Into<TypeKey>,
        width: IntWidth,
    ) -> Result<TypeHandle> {
        let key = key.into();
        let primitive = width.type_key();
        let target = *self
            .registry
            .by_key
            .get(&primitive)
            .ok_or(Error::Unregistered(primitive))?;
        if self.registry.by_key.contains_key(&key) {
            return Err(Error::DuplicateType(key));
        }
        let subtype = SubtypeHandle::from(self.registry.entries[target].handle);
        let handle = self.next_handle()?;
        let surrogate = Surrogate::direct(EnumSurrogate::new(key.clone(), handle, width));
        self.insert(key, handle, Some(subtype), surrogate)?;
        self.registry.by_subtype.insert((handle, subtype), target);
        Ok(handle)
    }

    /// Register a serde-backed type under its own handle.
    pub fn register_fallback(&mut self, key: impl Into<TypeKey>) -> Result<TypeHandle> {
        let key = key.into();
        let surrogate = Surrogate::direct(FallbackSurrogate::bound(key.clone()));
        self.register(key, surrogate)
    }

    /// Register a record type: a graph node with positional fields.
    pub fn register_record(&mut self, key: impl Into<TypeKey>) -> Result<TypeHandle> {
        let key = key.into();
        let surrogate = Surrogate::context(RecordSurrogate::new(key.clone()));
        self.register(key, surrogate)
    }

    /// Make `(handle, subtype)` resolve to `target` on the secondary lookup path. Lets a
    /// reader accept enumeration payloads that embed a handle this context doesn't assign.
    pub fn register_subtype_alias(
        &mut self,
        handle: TypeHandle,
        subtype: SubtypeHandle,
        target: &TypeKey,
    ) -> Result<()> {
        let i = *self
            .registry
            .by_key
            .get(target)
            .ok_or_else(|| Error::Unregistered(target.clone()))?;
        if self.registry.by_subtype.contains_key(&(handle, subtype)) {
            return Err(Error::DuplicateHandle(handle));
        }
        self.registry.by_subtype.insert((handle, subtype), i);
        Ok(())
    }

    pub fn build(self, name: impl Into<String>) -> CacheContext {
        let name = name.into();
        debug!(
            context = %name,
            registrations = self.registry.len(),
            "built surrogate registry"
        );
        CacheContext::new(name, self.registry)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    mod builtins {
        use super::*;

        #[test]
        fn fixed_handles() {
            let context = RegistryBuilder::with_builtins().build("test");
            let registry = context.registry();
            let expect = [
                (builtin::BOOL, 0),
                (builtin::CHAR, 11),
                (builtin::BOOL_ARRAY, 12),
                (builtin::CHAR_ARRAY, 22),
                (builtin::BYTES, 23),
                (builtin::STRING, 24),
                (builtin::TIMESTAMP, 25),
                (builtin::UUID, 26),
                (builtin::PAIR, 27),
                (builtin::LIST, 28),
                (builtin::DICT, 29),
                (builtin::OBJECT_ARRAY, 30),
                (builtin::OBJECT, 31),
            ];
            for (key, handle) in expect.iter() {
                let reg = registry.get_surrogate_for_type(key).unwrap();
                assert_eq!(reg.handle, TypeHandle(*handle), "{}", key);
            }
            assert_eq!(registry.len(), 32);
            assert!(registry
                .get_surrogate_for_type(&builtin::LIST)
                .unwrap()
                .surrogate
                .is_context());
        }

        #[test]
        fn lookup_is_stable() {
            let context = RegistryBuilder::with_builtins().build("test");
            let a = context.registry().get_surrogate_for_type(&builtin::I32).unwrap();
            let b = context.registry().get_surrogate_for_type(&builtin::I32).unwrap();
            assert_eq!(a.handle, b.handle);
            let by_handle = context
                .registry()
                .get_surrogate_for_type_handle(a.handle)
                .unwrap();
            assert_eq!(by_handle.key, builtin::I32);
        }

        #[test]
        fn table_matches_between_builds() {
            let a = RegistryBuilder::with_builtins().build("a");
            let b = RegistryBuilder::with_builtins().build("b");
            assert_eq!(a.handle_table(), b.handle_table());
        }
    }

    mod assignment {
        use super::*;

        #[test]
        fn continues_after_builtins() {
            let mut builder = RegistryBuilder::with_builtins();
            assert_eq!(builder.register_fallback("Point").unwrap(), TypeHandle(32));
            assert_eq!(builder.register_record("Node").unwrap(), TypeHandle(33));
        }

        #[test]
        fn skips_pinned_handles() {
            let mut builder = RegistryBuilder::new();
            builder
                .register_with_handle(
                    "pinned",
                    TypeHandle(0),
                    Surrogate::direct(PairSurrogate),
                )
                .unwrap();
            assert_eq!(builder.register_fallback("next").unwrap(), TypeHandle(1));
        }

        #[test]
        fn rejects_duplicates() {
            let mut builder = RegistryBuilder::with_builtins();
            assert!(matches!(
                builder.register_fallback("i32"),
                Err(Error::DuplicateType(_))
            ));
            assert!(matches!(
                builder.register_with_handle(
                    "other",
                    TypeHandle(3),
                    Surrogate::direct(PairSurrogate)
                ),
                Err(Error::DuplicateHandle(TypeHandle(3)))
            ));
            assert!(matches!(
                builder.register_with_handle(
                    "other",
                    TypeHandle::NULL,
                    Surrogate::direct(PairSurrogate)
                ),
                Err(Error::ReservedHandle(TypeHandle::NULL))
            ));
        }

        #[test]
        fn exhaustion() {
            let mut builder = RegistryBuilder::new();
            builder
                .register_with_handle(
                    "last",
                    TypeHandle(i16::MAX),
                    Surrogate::direct(PairSurrogate),
                )
                .unwrap();
            for i in 0..i16::MAX {
                builder.register_fallback(format!("t{}", i)).unwrap();
            }
            assert!(matches!(
                builder.register_fallback("one more"),
                Err(Error::HandleSpaceExhausted)
            ));
        }
    }

    mod subtype {
        use super::*;

        #[test]
        fn enum_records_primitive() {
            let mut builder = RegistryBuilder::with_builtins();
            let handle = builder.register_enum("Level", IntWidth::I32).unwrap();
            let context = builder.build("test");
            let registry = context.registry();
            let reg = registry.get_surrogate_for_type_handle(handle).unwrap();
            assert_eq!(reg.subtype, Some(SubtypeHandle(5)));
            let prim = registry
                .get_surrogate_for_subtype_handle(handle, SubtypeHandle(5))
                .unwrap();
            assert_eq!(prim.key, builtin::I32);
        }

        #[test]
        fn enum_needs_primitive() {
            let mut builder = RegistryBuilder::new();
            assert!(matches!(
                builder.register_enum("Level", IntWidth::U8),
                Err(Error::Unregistered(_))
            ));
        }

        #[test]
        fn alias() {
            let mut builder = RegistryBuilder::with_builtins();
            let handle = builder.register_enum("Level", IntWidth::I32).unwrap();
            builder
                .register_subtype_alias(handle, SubtypeHandle(900), &builtin::I64)
                .unwrap();
            assert!(matches!(
                builder.register_subtype_alias(handle, SubtypeHandle(900), &builtin::I64),
                Err(Error::DuplicateHandle(_))
            ));
            let context = builder.build("test");
            let reg = context
                .registry()
                .get_surrogate_for_subtype_handle(handle, SubtypeHandle(900))
                .unwrap();
            assert_eq!(reg.key, builtin::I64);
        }
    }
}
