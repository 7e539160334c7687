use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use xnb_core::{ByteReader, ByteWriter, ContentCodec, Resolver, Result, SideFiles, Type, Value};

use crate::collections::{NullableCodec, SequenceCodec};
use crate::factory::LeafFactory;
use crate::json;
use crate::primitives::{Primitive, PrimitiveCodec};
use crate::texture::Texture2DCodec;

pub const SPRITE_FONT_READER: &str = "Microsoft.Xna.Framework.Content.SpriteFontReader";
pub const SPRITE_FONT_TYPE: &str = "Microsoft.Xna.Framework.Graphics.SpriteFont";

/// Bitmap font: a glyph atlas texture plus per-character metrics.
///
/// The texture and the three list fields are written behind a reader index
/// even though lists are not polymorphic elsewhere; the default character
/// is an inline `Nullable<Char>`.
#[derive(Debug)]
pub struct SpriteFontCodec {
    ty: Type,
    texture: Arc<dyn ContentCodec>,
    rectangles: Arc<dyn ContentCodec>,
    chars: Arc<dyn ContentCodec>,
    kerning: Arc<dyn ContentCodec>,
    default_char: Arc<dyn ContentCodec>,
    int32: Arc<dyn ContentCodec>,
    single: Arc<dyn ContentCodec>,
}

impl SpriteFontCodec {
    pub fn new() -> Self {
        let leaf = |kind| -> Arc<dyn ContentCodec> { Arc::new(PrimitiveCodec::new(kind)) };
        Self {
            ty: Type::simple(SPRITE_FONT_READER),
            texture: Arc::new(Texture2DCodec::new()),
            rectangles: Arc::new(SequenceCodec::list(leaf(Primitive::Rectangle))),
            chars: Arc::new(SequenceCodec::list(leaf(Primitive::Char))),
            kerning: Arc::new(SequenceCodec::list(leaf(Primitive::Vector3))),
            default_char: Arc::new(NullableCodec::new(leaf(Primitive::Char))),
            int32: leaf(Primitive::Int32),
            single: leaf(Primitive::Single),
        }
    }

    pub fn factory() -> LeafFactory {
        LeafFactory::new(SPRITE_FONT_READER, Some(SPRITE_FONT_TYPE), || Arc::new(SpriteFontCodec::new()))
    }

    /// Field names in wire order, each with its codec and whether it is
    /// preceded by a reader index.
    fn fields(&self) -> [(&'static str, &dyn ContentCodec, bool); 8] {
        [
            ("texture", self.texture.as_ref(), true),
            ("glyphs", self.rectangles.as_ref(), true),
            ("cropping", self.rectangles.as_ref(), true),
            ("characterMap", self.chars.as_ref(), true),
            ("verticalLineSpacing", self.int32.as_ref(), false),
            ("horizontalSpacing", self.single.as_ref(), false),
            ("kerning", self.kerning.as_ref(), true),
            ("defaultCharacter", self.default_char.as_ref(), false),
        ]
    }
}

impl Default for SpriteFontCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCodec for SpriteFontCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        true
    }

    fn read(&self, input: &mut ByteReader<'_>, resolver: &Resolver) -> Result<Value> {
        let mut record = Vec::with_capacity(8);
        for (name, codec, indexed) in self.fields() {
            let value = if indexed {
                resolver.read_expecting(input, codec)?
            } else {
                codec.read(input, resolver)?
            };
            record.push((name, value));
        }
        Ok(Value::record(record))
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, resolver: &Resolver) -> Result<()> {
        for (name, codec, indexed) in self.fields() {
            let field = value.field(self.short_name(), name)?;
            if indexed {
                if field.is_null() {
                    output.write_7bit(0);
                    continue;
                }
                resolver.write_index(output, codec)?;
            }
            codec.write(output, field, resolver)?;
        }
        Ok(())
    }

    fn export(&self, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
        let mut out = Map::new();
        for (name, codec, indexed) in self.fields() {
            let field = value.field(self.short_name(), name)?;
            let json = if indexed && field.is_null() {
                JsonValue::Null
            } else {
                codec.export(field, files)?
            };
            out.insert(name.to_string(), json);
        }
        Ok(JsonValue::Object(out))
    }

    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
        let mut record = Vec::with_capacity(8);
        for (name, codec, indexed) in self.fields() {
            let field = json::field(json, self.short_name(), name)?;
            let value = if indexed && field.is_null() {
                Value::Null
            } else {
                codec.import(field, files)?
            };
            record.push((name, value));
        }
        Ok(Value::record(record))
    }
}
