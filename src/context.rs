use std::fmt;
use std::sync::Arc;

use crate::handle::TypeHandle;
use crate::registry::SurrogateRegistry;
use crate::type_key::TypeKey;

/// The handle namespace an encoder or decoder works in.
///
/// Nothing in a stream says which context produced it. Decoding with a context built
/// differently from the encoder's either fails on an unknown handle or, worse, picks the wrong
/// surrogate. Clones share one registry.
#[derive(Clone)]
pub struct CacheContext {
    name: Arc<str>,
    registry: Arc<SurrogateRegistry>,
}

impl CacheContext {
    pub fn new(name: impl Into<String>, registry: SurrogateRegistry) -> Self {
        Self {
            name: Arc::from(name.into()),
            registry: Arc::new(registry),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &SurrogateRegistry {
        &self.registry
    }

    pub fn handle_table(&self) -> Vec<(TypeKey, TypeHandle)> {
        self.registry.handle_table()
    }
}

impl fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CacheContext")
            .field("name", &self.name)
            .field("registrations", &self.registry.len())
            .finish()
    }
}
