use std::sync::Arc;

use serde_json::Value as JsonValue;
use xnb_core::{
    ByteReader, ByteWriter, CodecFactory, ContentCodec, Registry, Resolver, Result, SideFiles, Type, Value, XnbError,
};

use crate::json;

/// Leaf content types with a fixed wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Boolean,
    Int32,
    UInt32,
    Single,
    Double,
    Char,
    String,
    Vector2,
    Vector3,
    Vector4,
    Rectangle,
}

impl Primitive {
    pub const ALL: [Primitive; 11] = [
        Primitive::Boolean,
        Primitive::Int32,
        Primitive::UInt32,
        Primitive::Single,
        Primitive::Double,
        Primitive::Char,
        Primitive::String,
        Primitive::Vector2,
        Primitive::Vector3,
        Primitive::Vector4,
        Primitive::Rectangle,
    ];

    pub fn reader_name(self) -> &'static str {
        match self {
            Primitive::Boolean => "Microsoft.Xna.Framework.Content.BooleanReader",
            Primitive::Int32 => "Microsoft.Xna.Framework.Content.Int32Reader",
            Primitive::UInt32 => "Microsoft.Xna.Framework.Content.UInt32Reader",
            Primitive::Single => "Microsoft.Xna.Framework.Content.SingleReader",
            Primitive::Double => "Microsoft.Xna.Framework.Content.DoubleReader",
            Primitive::Char => "Microsoft.Xna.Framework.Content.CharReader",
            Primitive::String => "Microsoft.Xna.Framework.Content.StringReader",
            Primitive::Vector2 => "Microsoft.Xna.Framework.Content.Vector2Reader",
            Primitive::Vector3 => "Microsoft.Xna.Framework.Content.Vector3Reader",
            Primitive::Vector4 => "Microsoft.Xna.Framework.Content.Vector4Reader",
            Primitive::Rectangle => "Microsoft.Xna.Framework.Content.RectangleReader",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Primitive::Boolean => "System.Boolean",
            Primitive::Int32 => "System.Int32",
            Primitive::UInt32 => "System.UInt32",
            Primitive::Single => "System.Single",
            Primitive::Double => "System.Double",
            Primitive::Char => "System.Char",
            Primitive::String => "System.String",
            Primitive::Vector2 => "Microsoft.Xna.Framework.Vector2",
            Primitive::Vector3 => "Microsoft.Xna.Framework.Vector3",
            Primitive::Vector4 => "Microsoft.Xna.Framework.Vector4",
            Primitive::Rectangle => "Microsoft.Xna.Framework.Rectangle",
        }
    }

    /// Strings are reference types and carry a reader index in element
    /// slots; every other leaf is a value type.
    pub fn is_polymorphic(self) -> bool {
        self == Primitive::String
    }

    fn vector_fields(self) -> &'static [&'static str] {
        match self {
            Primitive::Vector2 => &["x", "y"],
            Primitive::Vector3 => &["x", "y", "z"],
            Primitive::Vector4 => &["x", "y", "z", "w"],
            _ => &[],
        }
    }
}

const RECTANGLE_FIELDS: [&str; 4] = ["x", "y", "width", "height"];

/// Byte length of a UTF-8 sequence from its lead byte.
fn utf8_len(lead: u8) -> usize {
    (((0xE500_0000u32 >> ((lead >> 3) & 0x1E)) & 3) + 1) as usize
}

/// Codec for one [`Primitive`].
#[derive(Debug)]
pub struct PrimitiveCodec {
    kind: Primitive,
    ty: Type,
}

impl PrimitiveCodec {
    pub fn new(kind: Primitive) -> Self {
        Self {
            kind,
            ty: Type::simple(kind.reader_name()),
        }
    }

    pub fn kind(&self) -> Primitive {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.kind.reader_name()
    }

    fn int_in<T: TryFrom<i64>>(&self, v: i64) -> Result<T> {
        T::try_from(v).map_err(|_| XnbError::invalid_value(self.name(), "an integer in range"))
    }
}

impl ContentCodec for PrimitiveCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        self.kind.is_polymorphic()
    }

    fn read(&self, input: &mut ByteReader<'_>, _resolver: &Resolver) -> Result<Value> {
        Ok(match self.kind {
            Primitive::Boolean => Value::Bool(input.read_u8()? != 0),
            Primitive::Int32 => input.read_i32()?.into(),
            Primitive::UInt32 => input.read_u32()?.into(),
            Primitive::Single => input.read_f32()?.into(),
            Primitive::Double => input.read_f64()?.into(),
            Primitive::Char => {
                let len = utf8_len(input.peek_u8()?);
                let bytes = input.peek_bytes(len)?;
                let c = std::str::from_utf8(bytes)?
                    .chars()
                    .next()
                    .ok_or(XnbError::Malformed("empty char"))?;
                input.skip(len)?;
                Value::Char(c)
            }
            Primitive::String => input.read_prefixed_string()?.into(),
            Primitive::Vector2 | Primitive::Vector3 | Primitive::Vector4 => {
                let mut fields = Vec::with_capacity(4);
                for &name in self.kind.vector_fields() {
                    fields.push((name, Value::from(input.read_f32()?)));
                }
                Value::record(fields)
            }
            Primitive::Rectangle => {
                let mut fields = Vec::with_capacity(4);
                for name in RECTANGLE_FIELDS {
                    fields.push((name, Value::from(input.read_i32()?)));
                }
                Value::record(fields)
            }
        })
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, _resolver: &Resolver) -> Result<()> {
        let name = self.name();
        match self.kind {
            Primitive::Boolean => output.write_u8(u8::from(value.try_bool(name)?)),
            Primitive::Int32 => output.write_i32(self.int_in(value.try_i64(name)?)?),
            Primitive::UInt32 => output.write_u32(self.int_in(value.try_i64(name)?)?),
            Primitive::Single => output.write_f32(value.try_f64(name)? as f32),
            Primitive::Double => output.write_f64(value.try_f64(name)?),
            Primitive::Char => {
                let mut buf = [0u8; 4];
                output.write_bytes(value.try_char(name)?.encode_utf8(&mut buf).as_bytes());
            }
            Primitive::String => output.write_prefixed_string(value.try_str(name)?)?,
            Primitive::Vector2 | Primitive::Vector3 | Primitive::Vector4 => {
                for &field in self.kind.vector_fields() {
                    output.write_f32(value.field(name, field)?.try_f64(name)? as f32);
                }
            }
            Primitive::Rectangle => {
                for field in RECTANGLE_FIELDS {
                    output.write_i32(self.int_in(value.field(name, field)?.try_i64(name)?)?);
                }
            }
        }
        Ok(())
    }

    fn import(&self, json: &JsonValue, _files: &mut dyn SideFiles) -> Result<Value> {
        let name = self.name();
        Ok(match self.kind {
            Primitive::Boolean => Value::Bool(json::as_bool(json, name)?),
            Primitive::Int32 => Value::Int(self.int_in::<i32>(json::as_i64(json, name)?)?.into()),
            Primitive::UInt32 => Value::Int(self.int_in::<u32>(json::as_i64(json, name)?)?.into()),
            Primitive::Single | Primitive::Double => Value::Float(json::as_f64(json, name)?),
            Primitive::Char => Value::Char(single_char(json::as_str(json, name)?, name)?),
            Primitive::String => json::as_str(json, name)?.into(),
            Primitive::Vector2 | Primitive::Vector3 | Primitive::Vector4 => {
                let mut fields = Vec::with_capacity(4);
                for &field in self.kind.vector_fields() {
                    fields.push((field, Value::Float(json::as_f64(json::field(json, name, field)?, name)?)));
                }
                Value::record(fields)
            }
            Primitive::Rectangle => {
                let mut fields = Vec::with_capacity(4);
                for field in RECTANGLE_FIELDS {
                    let v = json::as_i64(json::field(json, name, field)?, name)?;
                    fields.push((field, Value::Int(self.int_in::<i32>(v)?.into())));
                }
                Value::record(fields)
            }
        })
    }

    fn export_key(&self, value: &Value) -> Result<String> {
        match self.kind {
            Primitive::Int32 | Primitive::UInt32 | Primitive::Single | Primitive::Double => value.to_key(),
            Primitive::Char => Ok(value.try_char(self.name())?.to_string()),
            Primitive::String => Ok(value.try_str(self.name())?.to_string()),
            _ => Err(XnbError::UnsupportedKey(self.name().to_string())),
        }
    }

    fn import_key(&self, key: &str) -> Result<Value> {
        let name = self.name();
        let bad_key = || XnbError::invalid_value(name, "a numeric object key");
        match self.kind {
            Primitive::Int32 => {
                let v: i32 = key.parse().map_err(|_| bad_key())?;
                Ok(v.into())
            }
            Primitive::UInt32 => {
                let v: u32 = key.parse().map_err(|_| bad_key())?;
                Ok(v.into())
            }
            Primitive::Single | Primitive::Double => {
                let v: f64 = key.parse().map_err(|_| bad_key())?;
                Ok(Value::Float(v))
            }
            Primitive::Char => Ok(Value::Char(single_char(key, name)?)),
            Primitive::String => Ok(key.into()),
            _ => Err(XnbError::UnsupportedKey(name.to_string())),
        }
    }
}

fn single_char(s: &str, codec: &str) -> Result<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(XnbError::invalid_value(codec, "exactly one character")),
    }
}

/// Resolves a [`Primitive`] by reader name or content type.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveFactory(pub Primitive);

impl CodecFactory for PrimitiveFactory {
    fn is_codec(&self, ty: &Type) -> bool {
        ty.name == self.0.reader_name()
    }

    fn reads(&self, ty: &Type) -> bool {
        ty.name == self.0.content_type()
    }

    fn instantiate(&self, _ty: &Type, _registry: &Registry, _depth: usize) -> Result<Arc<dyn ContentCodec>> {
        Ok(Arc::new(PrimitiveCodec::new(self.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xnb_core::MemorySideFiles;

    fn write(kind: Primitive, value: &Value) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        PrimitiveCodec::new(kind).write(&mut w, value, &Resolver::default())?;
        Ok(w.into_inner())
    }

    fn read(kind: Primitive, bytes: &[u8]) -> Result<Value> {
        let mut r = ByteReader::new(bytes);
        PrimitiveCodec::new(kind).read(&mut r, &Resolver::default())
    }

    #[test]
    fn utf8_lengths_from_lead_byte() {
        assert_eq!(utf8_len(b'A'), 1);
        assert_eq!(utf8_len(0xC3), 2);
        assert_eq!(utf8_len(0xE2), 3);
        assert_eq!(utf8_len(0xF0), 4);
    }

    #[test]
    fn char_reads_multibyte_sequences() {
        assert_eq!(read(Primitive::Char, "é".as_bytes()).unwrap(), Value::Char('é'));
        assert_eq!(read(Primitive::Char, "€x".as_bytes()).unwrap(), Value::Char('€'));
        assert_eq!(write(Primitive::Char, &Value::Char('€')).unwrap(), "€".as_bytes());
    }

    #[test]
    fn char_import_rejects_multiple_characters() {
        let codec = PrimitiveCodec::new(Primitive::Char);
        let mut files = MemorySideFiles::new();
        assert!(codec.import(&json!("ab"), &mut files).is_err());
        assert_eq!(codec.import(&json!("a"), &mut files).unwrap(), Value::Char('a'));
    }

    #[test]
    fn string_is_length_prefixed() {
        assert_eq!(write(Primitive::String, &Value::from("hi")).unwrap(), b"\x02hi");
        assert_eq!(read(Primitive::String, b"\x02hi").unwrap(), Value::from("hi"));
    }

    #[test]
    fn double_reads_eight_bytes() {
        let bytes = 1.5f64.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        let v = PrimitiveCodec::new(Primitive::Double).read(&mut r, &Resolver::default()).unwrap();
        assert_eq!(v, Value::Float(1.5));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn rectangle_layout_is_four_i32() {
        let rect = Value::record([
            ("x", Value::Int(1)),
            ("y", Value::Int(-2)),
            ("width", Value::Int(3)),
            ("height", Value::Int(4)),
        ]);
        let bytes = write(Primitive::Rectangle, &rect).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[4..8], &(-2i32).to_le_bytes());
        assert_eq!(read(Primitive::Rectangle, &bytes).unwrap(), rect);
    }

    #[test]
    fn vector_export_names_components() {
        let codec = PrimitiveCodec::new(Primitive::Vector3);
        let v = read(Primitive::Vector3, &[0, 0, 128, 63, 0, 0, 0, 64, 0, 0, 64, 64]).unwrap();
        let mut files = MemorySideFiles::new();
        assert_eq!(codec.export(&v, &mut files).unwrap(), json!({"x": 1.0, "y": 2.0, "z": 3.0}));
    }

    #[test]
    fn int32_rejects_out_of_range_values() {
        assert!(matches!(
            write(Primitive::Int32, &Value::Int(i64::from(i32::MAX) + 1)),
            Err(XnbError::InvalidValue { .. })
        ));
        assert!(write(Primitive::UInt32, &Value::Int(-1)).is_err());
    }

    #[test]
    fn numeric_keys_round_trip_through_strings() {
        let codec = PrimitiveCodec::new(Primitive::Int32);
        assert_eq!(codec.export_key(&Value::Int(-7)).unwrap(), "-7");
        assert_eq!(codec.import_key("-7").unwrap(), Value::Int(-7));
        assert!(codec.import_key("seven").is_err());
        assert!(PrimitiveCodec::new(Primitive::Boolean).import_key("true").is_err());
    }

    #[test]
    fn only_strings_are_polymorphic() {
        for kind in Primitive::ALL {
            assert_eq!(PrimitiveCodec::new(kind).is_polymorphic(), kind == Primitive::String);
        }
    }
}
