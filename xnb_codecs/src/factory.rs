use std::sync::Arc;

use xnb_core::{CodecFactory, ContentCodec, Registry, Result, Type};

/// Factory for a codec without generic arguments.
///
/// Matches the reader name, and the content type when one is given.
pub struct LeafFactory {
    reader: &'static str,
    content: Option<&'static str>,
    build: fn() -> Arc<dyn ContentCodec>,
}

impl LeafFactory {
    pub fn new(reader: &'static str, content: Option<&'static str>, build: fn() -> Arc<dyn ContentCodec>) -> Self {
        Self { reader, content, build }
    }
}

impl CodecFactory for LeafFactory {
    fn is_codec(&self, ty: &Type) -> bool {
        ty.name == self.reader
    }

    fn reads(&self, ty: &Type) -> bool {
        self.content.is_some_and(|content| ty.name == content)
    }

    fn instantiate(&self, _ty: &Type, _registry: &Registry, _depth: usize) -> Result<Arc<dyn ContentCodec>> {
        Ok((self.build)())
    }
}
