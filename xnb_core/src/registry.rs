use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::codec::{CodecFactory, ContentCodec};
use crate::error::{Result, XnbError};
use crate::types::{Type, MAX_TYPE_DEPTH};

/// Ordered, append-only collection of codec factories.
///
/// Lookup walks factories in registration order and returns the first match,
/// so a factory registered later can only add readers, never shadow the ones
/// already present.
#[derive(Default, Clone)]
pub struct Registry {
    factories: Vec<Arc<dyn CodecFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: impl CodecFactory + 'static) {
        self.factories.push(Arc::new(factory));
    }

    pub fn register_shared(&mut self, factory: Arc<dyn CodecFactory>) {
        self.factories.push(factory);
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolve a type descriptor, matching either a reader name or a
    /// content type.
    pub fn get_codec(&self, ty: &Type) -> Result<Arc<dyn ContentCodec>> {
        self.resolve(ty, 0)
    }

    /// Parse a type string and resolve it.
    pub fn get_codec_by_name(&self, name: &str) -> Result<Arc<dyn ContentCodec>> {
        self.get_codec(&Type::parse(name)?)
    }

    /// Resolve at a given nesting depth. Composite factories call this for
    /// their element types with `depth + 1`.
    pub fn resolve(&self, ty: &Type, depth: usize) -> Result<Arc<dyn ContentCodec>> {
        if depth > MAX_TYPE_DEPTH {
            return Err(XnbError::TypeTooDeep(MAX_TYPE_DEPTH));
        }
        let factory = self
            .factories
            .iter()
            .find(|f| f.is_codec(ty) || f.reads(ty))
            .ok_or_else(|| XnbError::UnknownReader(ty.to_string()))?;
        let codec = factory.instantiate(ty, self, depth)?;
        debug!(requested = %ty, resolved = %codec.reader_type(), "resolved reader");
        Ok(codec)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("factories", &self.factories.len())
            .finish()
    }
}
