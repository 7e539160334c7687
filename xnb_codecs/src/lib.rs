//! Bundled content codecs and the process-wide reader registry.
//!
//! [`builtin_registry`] knows every reader shipped here. The global registry
//! starts from it and can be extended with [`register`] before files are
//! processed; [`unpack`], [`pack`], [`export_document`] and
//! [`import_document`] all resolve readers through it.

mod blobs;
mod collections;
mod dxt;
mod factory;
mod json;
mod lz4_codec;
mod primitives;
mod sprite_font;
mod texture;

pub use blobs::{BlobCodec, BMFONT_READER, EFFECT_READER, EFFECT_TYPE, TIDE_READER};
pub use collections::{
    DictionaryCodec, DictionaryFactory, NullableCodec, NullableFactory, SequenceCodec, SequenceFactory, SequenceKind,
    ARRAY_READER, DICTIONARY_READER, LIST_READER, NULLABLE_READER,
};
pub use dxt::Dxt;
pub use factory::LeafFactory;
pub use lz4_codec::Lz4Codec;
pub use primitives::{Primitive, PrimitiveCodec, PrimitiveFactory};
pub use sprite_font::{SpriteFontCodec, SPRITE_FONT_READER, SPRITE_FONT_TYPE};
pub use texture::{decode_png, encode_png, premultiply, unpremultiply, Texture2DCodec, TEXTURE2D_READER, TEXTURE2D_TYPE};

use std::sync::{OnceLock, PoisonError, RwLock};

use xnb_core::{CodecFactory, ContentCodec, Document, JsonDocument, Registry, Result, SideFiles};

/// A fresh registry holding every bundled reader.
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    for kind in Primitive::ALL {
        registry.register(PrimitiveFactory(kind));
    }
    registry.register(SequenceFactory(SequenceKind::Array));
    registry.register(SequenceFactory(SequenceKind::List));
    registry.register(DictionaryFactory);
    registry.register(NullableFactory);
    registry.register(Texture2DCodec::factory());
    registry.register(SpriteFontCodec::factory());
    for factory in BlobCodec::factories() {
        registry.register(factory);
    }
    registry
}

fn global() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(builtin_registry()))
}

/// Add a reader factory to the global registry.
///
/// Later registrations are consulted after the bundled readers.
pub fn register(factory: impl CodecFactory + 'static) {
    global().write().unwrap_or_else(PoisonError::into_inner).register(factory);
}

/// Run `f` with read access to the global registry.
pub fn with_registry<T>(f: impl FnOnce(&Registry) -> T) -> T {
    let registry = global().read().unwrap_or_else(PoisonError::into_inner);
    f(&registry)
}

/// Parse an XNB file with the global registry.
pub fn unpack(file: &[u8]) -> Result<Document> {
    with_registry(|registry| xnb_core::unpack(file, registry, &Lz4Codec))
}

/// Parse an XNB file whose root object must be read by `expected`'s reader.
pub fn unpack_expecting(file: &[u8], expected: &dyn ContentCodec) -> Result<Document> {
    with_registry(|registry| xnb_core::unpack_expecting(file, registry, &Lz4Codec, expected))
}

/// Serialize a document with the global registry.
pub fn pack(doc: &Document) -> Result<Vec<u8>> {
    with_registry(|registry| xnb_core::pack(doc, registry, &Lz4Codec))
}

/// Convert a document's content to JSON, spilling binary payloads to `files`.
pub fn export_document(doc: &Document, files: &mut dyn SideFiles) -> Result<JsonDocument> {
    with_registry(|registry| doc.export(registry, files))
}

/// Rebuild a document from its JSON form, reading payloads from `files`.
pub fn import_document(doc: &JsonDocument, files: &mut dyn SideFiles) -> Result<Document> {
    with_registry(|registry| doc.import(registry, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xnb_core::Type;

    fn resolves(name: &str) -> String {
        builtin_registry()
            .get_codec(&Type::parse(name).unwrap())
            .unwrap()
            .reader_type()
            .to_string()
    }

    #[test]
    fn content_types_resolve_to_readers() {
        assert_eq!(resolves("System.Int32"), "Microsoft.Xna.Framework.Content.Int32Reader");
        assert_eq!(
            resolves("System.String[]"),
            "Microsoft.Xna.Framework.Content.ArrayReader`1[[Microsoft.Xna.Framework.Content.StringReader]]"
        );
        assert_eq!(
            resolves("System.Collections.Generic.List`1[[Microsoft.Xna.Framework.Rectangle]]"),
            "Microsoft.Xna.Framework.Content.ListReader`1[[Microsoft.Xna.Framework.Content.RectangleReader]]"
        );
        assert_eq!(resolves(TEXTURE2D_TYPE), TEXTURE2D_READER);
    }

    #[test]
    fn assembly_qualified_reader_names_resolve() {
        let name = "Microsoft.Xna.Framework.Content.DictionaryReader`2[[System.String, mscorlib, Version=4.0.0.0, \
                    Culture=neutral, PublicKeyToken=b77a5c561934e089],[System.Int32, mscorlib]]";
        let codec = builtin_registry().get_codec_by_name(name).unwrap();
        assert!(codec.is_polymorphic());
        assert_eq!(codec.reader_type().subtypes.len(), 2);
    }

    #[test]
    fn polymorphism_of_composites() {
        let registry = builtin_registry();
        let poly = |name: &str| registry.get_codec_by_name(name).unwrap().is_polymorphic();
        assert!(!poly("Microsoft.Xna.Framework.Content.ListReader`1[[System.Int32]]"));
        assert!(poly("Microsoft.Xna.Framework.Content.ArrayReader`1[[System.Int32]]"));
        assert!(poly("Microsoft.Xna.Framework.Content.NullableReader`1[[System.Char]]"));
        assert!(poly("Microsoft.Xna.Framework.Content.StringReader"));
        assert!(!poly("Microsoft.Xna.Framework.Content.Vector2Reader"));
    }

    #[test]
    fn unknown_readers_are_reported() {
        let err = builtin_registry()
            .get_codec_by_name("Some.Custom.Reader")
            .unwrap_err();
        assert!(matches!(err, xnb_core::XnbError::UnknownReader(_)));
    }
}
