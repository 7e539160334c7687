//! Opaque payloads exported verbatim as side files.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use xnb_core::{ByteReader, ByteWriter, ContentCodec, Resolver, Result, SideFiles, Type, Value, XnbError};

use crate::factory::LeafFactory;
use crate::json;

pub const EFFECT_READER: &str = "Microsoft.Xna.Framework.Content.EffectReader";
pub const EFFECT_TYPE: &str = "Microsoft.Xna.Framework.Graphics.Effect";
pub const TIDE_READER: &str = "xTile.Pipeline.TideReader";
pub const BMFONT_READER: &str = "BmFont.XmlSourceReader";

/// How the payload length is stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// `u32` byte count, then the bytes.
    U32Bytes,
    /// `i32` byte count, then the bytes.
    I32Bytes,
    /// 7-bit length-prefixed UTF-8 string.
    String,
}

/// Compiled shader (`.cso`), xTile map (`.tbin`) or BMFont descriptor (`.xml`).
#[derive(Debug)]
pub struct BlobCodec {
    framing: Framing,
    extension: &'static str,
    ty: Type,
}

impl BlobCodec {
    pub fn effect() -> Self {
        Self {
            framing: Framing::U32Bytes,
            extension: "cso",
            ty: Type::simple(EFFECT_READER),
        }
    }

    pub fn tbin() -> Self {
        Self {
            framing: Framing::I32Bytes,
            extension: "tbin",
            ty: Type::simple(TIDE_READER),
        }
    }

    pub fn bmfont() -> Self {
        Self {
            framing: Framing::String,
            extension: "xml",
            ty: Type::simple(BMFONT_READER),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn factories() -> [LeafFactory; 3] {
        [
            LeafFactory::new(EFFECT_READER, Some(EFFECT_TYPE), || Arc::new(BlobCodec::effect())),
            LeafFactory::new(TIDE_READER, None, || Arc::new(BlobCodec::tbin())),
            LeafFactory::new(BMFONT_READER, None, || Arc::new(BlobCodec::bmfont())),
        ]
    }

    fn payload<'v>(&self, value: &'v Value) -> Result<&'v [u8]> {
        match self.framing {
            Framing::String => Ok(value.try_str(self.short_name())?.as_bytes()),
            _ => value.try_bytes(self.short_name()),
        }
    }
}

impl ContentCodec for BlobCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        true
    }

    fn read(&self, input: &mut ByteReader<'_>, _resolver: &Resolver) -> Result<Value> {
        Ok(match self.framing {
            Framing::U32Bytes => {
                let size = input.read_u32()? as usize;
                Value::Bytes(input.read_bytes(size)?.to_vec())
            }
            Framing::I32Bytes => {
                let size = usize::try_from(input.read_i32()?).map_err(|_| XnbError::Malformed("negative blob size"))?;
                Value::Bytes(input.read_bytes(size)?.to_vec())
            }
            Framing::String => input.read_prefixed_string()?.into(),
        })
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, _resolver: &Resolver) -> Result<()> {
        let too_big = || XnbError::Malformed("blob larger than its length field");
        match self.framing {
            Framing::U32Bytes => {
                let data = value.try_bytes(self.short_name())?;
                output.write_u32(u32::try_from(data.len()).map_err(|_| too_big())?);
                output.write_bytes(data);
            }
            Framing::I32Bytes => {
                let data = value.try_bytes(self.short_name())?;
                output.write_i32(i32::try_from(data.len()).map_err(|_| too_big())?);
                output.write_bytes(data);
            }
            Framing::String => output.write_prefixed_string(value.try_str(self.short_name())?)?,
        }
        Ok(())
    }

    fn export(&self, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
        let name = files.export_file(self.payload(value)?, self.extension)?;
        Ok(JsonValue::String(name))
    }

    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
        let data = files.import_file(json::as_str(json, self.short_name())?)?;
        Ok(match self.framing {
            Framing::String => Value::String(String::from_utf8(data).map_err(|e| e.utf8_error())?),
            _ => Value::Bytes(data),
        })
    }
}
