use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use xnb_core::{ByteReader, ByteWriter, ContentCodec, Resolver, Result, SideFiles, Type, Value, XnbError};

use crate::dxt::{rgba_len, Dxt};
use crate::factory::LeafFactory;
use crate::json;

pub const TEXTURE2D_READER: &str = "Microsoft.Xna.Framework.Content.Texture2DReader";
pub const TEXTURE2D_TYPE: &str = "Microsoft.Xna.Framework.Graphics.Texture2D";

/// `SurfaceFormat.Color`: straight RGBA8.
pub const FORMAT_COLOR: i32 = 0;

/// Single-surface 2D texture.
///
/// Values are records `{format, width, height, data}` where `data` is always
/// straight-alpha RGBA8, whatever the surface format on the wire. Stored
/// pixels are premultiplied, so reads divide by alpha (rounding up) and
/// writes multiply by it (rounding down), both in `f64`. The two are not
/// exact inverses.
#[derive(Debug)]
pub struct Texture2DCodec {
    ty: Type,
}

impl Texture2DCodec {
    pub fn new() -> Self {
        Self {
            ty: Type::simple(TEXTURE2D_READER),
        }
    }

    pub fn factory() -> LeafFactory {
        LeafFactory::new(TEXTURE2D_READER, Some(TEXTURE2D_TYPE), || Arc::new(Texture2DCodec::new()))
    }

    fn dimension(&self, value: &Value, name: &'static str) -> Result<u32> {
        u32::try_from(value.field(self.short_name(), name)?.try_i64(self.short_name())?)
            .map_err(|_| XnbError::invalid_value(self.short_name(), "a non-negative dimension"))
    }
}

impl Default for Texture2DCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Undo premultiplied alpha in place.
///
/// Scaling goes through `f64` as `ceil(c * (255 / a))`, so results follow
/// float rounding rather than exact rationals. A zero alpha saturates every
/// non-zero channel and leaves zero channels at zero.
pub fn unpremultiply(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let alpha = px[3];
        let scale = 255.0 / f64::from(alpha);
        for c in &mut px[..3] {
            *c = match (alpha, *c) {
                (_, 0) => 0,
                (0, _) => 255,
                (_, v) => (f64::from(v) * scale).ceil().min(255.0) as u8,
            };
        }
    }
}

/// Premultiply alpha in place, as `floor(c * (a / 255))` in `f64`.
pub fn premultiply(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let scale = f64::from(px[3]) / 255.0;
        for c in &mut px[..3] {
            *c = (f64::from(*c) * scale).floor() as u8;
        }
    }
}

impl ContentCodec for Texture2DCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        true
    }

    fn read(&self, input: &mut ByteReader<'_>, _resolver: &Resolver) -> Result<Value> {
        let format = input.read_i32()?;
        let width = input.read_u32()?;
        let height = input.read_u32()?;
        let mip_count = input.read_u32()?;
        if mip_count > 1 {
            warn!(mip_count, "texture has extra mip levels, only the first is kept");
        }

        let size = input.read_u32()? as usize;
        let surface = input.read_bytes(size)?;
        for _ in 1..mip_count {
            let size = input.read_u32()? as usize;
            input.skip(size)?;
        }

        let mut data = match (format, Dxt::from_surface_format(format)) {
            (_, Some(dxt)) => dxt.decompress(surface, width as usize, height as usize)?,
            (FORMAT_COLOR, None) => surface.to_vec(),
            (other, None) => return Err(XnbError::UnsupportedTextureFormat(other)),
        };
        unpremultiply(&mut data);

        Ok(Value::record([
            ("format", Value::from(format)),
            ("width", Value::from(width)),
            ("height", Value::from(height)),
            ("data", Value::Bytes(data)),
        ]))
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, _resolver: &Resolver) -> Result<()> {
        let name = self.short_name();
        let format = i32::try_from(value.field(name, "format")?.try_i64(name)?)
            .map_err(|_| XnbError::invalid_value(name, "an i32 surface format"))?;
        let width = self.dimension(value, "width")?;
        let height = self.dimension(value, "height")?;
        debug!(format, width, height, "writing texture");

        let mut data = value.field(name, "data")?.try_bytes(name)?.to_vec();
        premultiply(&mut data);
        let surface = match (format, Dxt::from_surface_format(format)) {
            (_, Some(dxt)) => dxt.compress(&data, width as usize, height as usize)?,
            (FORMAT_COLOR, None) => data,
            (other, None) => return Err(XnbError::UnsupportedTextureFormat(other)),
        };

        output.write_i32(format);
        output.write_u32(width);
        output.write_u32(height);
        output.write_u32(1);
        output.write_u32(u32::try_from(surface.len()).map_err(|_| XnbError::Malformed("texture surface too large"))?);
        output.write_bytes(&surface);
        Ok(())
    }

    fn export(&self, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
        let name = self.short_name();
        let format = value.field(name, "format")?.try_i64(name)?;
        let width = self.dimension(value, "width")?;
        let height = self.dimension(value, "height")?;
        let data = value.field(name, "data")?.try_bytes(name)?;
        let png = encode_png(data, width, height)?;
        let filename = files.export_file(&png, "png")?;
        Ok(serde_json::json!({ "format": format, "filename": filename }))
    }

    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
        let name = self.short_name();
        let format = json::as_i64(json::field(json, name, "format")?, name)?;
        let filename = json::as_str(json::field(json, name, "filename")?, name)?;
        let (width, height, data) = decode_png(&files.import_file(filename)?)?;
        Ok(Value::record([
            ("format", Value::Int(format)),
            ("width", Value::from(width)),
            ("height", Value::from(height)),
            ("data", Value::Bytes(data)),
        ]))
    }
}

fn image_err(e: impl std::fmt::Display) -> XnbError {
    XnbError::Image(e.to_string())
}

/// Encode straight RGBA8 pixels as a PNG.
pub fn encode_png(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected = rgba_len(width as usize, height as usize)?;
    if rgba.len() != expected {
        return Err(XnbError::Image(format!(
            "{width}x{height} image needs {expected} RGBA bytes, found {}",
            rgba.len()
        )));
    }
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().map_err(image_err)?;
        writer.write_image_data(rgba).map_err(image_err)?;
        writer.finish().map_err(image_err)?;
    }
    Ok(out)
}

/// Decode a PNG of any colour type to `(width, height, rgba8)`.
pub fn decode_png(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>)> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(image_err)?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(image_err)?;
    buf.truncate(info.buffer_size());

    if info.bit_depth != png::BitDepth::Eight {
        return Err(XnbError::Image(format!("unsupported bit depth {:?}", info.bit_depth)));
    }
    let rgba = match info.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => buf.chunks_exact(3).flat_map(|p| [p[0], p[1], p[2], 255]).collect(),
        png::ColorType::GrayscaleAlpha => buf.chunks_exact(2).flat_map(|p| [p[0], p[0], p[0], p[1]]).collect(),
        png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        png::ColorType::Indexed => return Err(XnbError::Image("palette was not expanded".into())),
    };
    Ok((info.width, info.height, rgba))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xnb_core::MemorySideFiles;

    fn color_texture(width: u32, height: u32, premultiplied: &[u8]) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_i32(FORMAT_COLOR);
        w.write_u32(width);
        w.write_u32(height);
        w.write_u32(1);
        w.write_u32(premultiplied.len() as u32);
        w.write_bytes(premultiplied);
        w.into_inner()
    }

    fn read(bytes: &[u8]) -> Result<Value> {
        Texture2DCodec::new().read(&mut ByteReader::new(bytes), &Resolver::default())
    }

    #[test]
    fn half_alpha_pixel_is_close_after_round_trip() {
        let mut px = [10u8, 20, 30, 128];
        unpremultiply(&mut px);
        assert_eq!(px, [20, 40, 60, 128]);
        premultiply(&mut px);
        for (got, want) in px.iter().zip([10u8, 20, 30]) {
            assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
        }
    }

    #[test]
    fn zero_alpha_saturates_non_zero_channels() {
        let mut px = [0u8, 5, 255, 0];
        unpremultiply(&mut px);
        assert_eq!(px, [0, 255, 255, 0]);
    }

    #[test]
    fn alpha_scaling_follows_float_rounding() {
        let mut px = [85u8, 51, 0, 147];
        premultiply(&mut px);
        assert_eq!(px, [48, 29, 0, 147]);

        let mut px = [67u8, 0, 0, 201];
        unpremultiply(&mut px);
        assert_eq!(px, [86, 0, 0, 201]);
    }

    #[test]
    fn opaque_pixels_are_untouched() {
        let mut px = [1u8, 128, 254, 255];
        unpremultiply(&mut px);
        assert_eq!(px, [1, 128, 254, 255]);
        premultiply(&mut px);
        assert_eq!(px, [1, 128, 254, 255]);
    }

    #[test]
    fn reads_color_surface() {
        let value = read(&color_texture(1, 1, &[10, 20, 30, 128])).unwrap();
        assert_eq!(value.field("t", "width").unwrap(), &Value::Int(1));
        assert_eq!(value.field("t", "data").unwrap(), &Value::Bytes(vec![20, 40, 60, 128]));
    }

    #[test]
    fn extra_mips_are_skipped() {
        let mut w = ByteWriter::new();
        w.write_i32(FORMAT_COLOR);
        w.write_u32(1);
        w.write_u32(1);
        w.write_u32(2);
        w.write_u32(4);
        w.write_bytes(&[1, 2, 3, 255]);
        w.write_u32(4);
        w.write_bytes(&[9, 9, 9, 9]);
        w.write_u8(0x7F);
        let bytes = w.into_inner();

        let mut r = ByteReader::new(&bytes);
        Texture2DCodec::new().read(&mut r, &Resolver::default()).unwrap();
        assert_eq!(r.read_u8().unwrap(), 0x7F);
    }

    #[test]
    fn etc1_and_unknown_formats_fail() {
        let mut bytes = color_texture(1, 1, &[0, 0, 0, 0]);
        bytes[0] = 2;
        assert!(matches!(read(&bytes), Err(XnbError::UnsupportedTextureFormat(2))));
        bytes[0] = 9;
        assert!(matches!(read(&bytes), Err(XnbError::UnsupportedTextureFormat(9))));
    }

    #[test]
    fn write_emits_one_premultiplied_level() {
        let value = Value::record([
            ("format", Value::Int(0)),
            ("width", Value::Int(1)),
            ("height", Value::Int(1)),
            ("data", Value::Bytes(vec![255, 255, 255, 51])),
        ]);
        let mut w = ByteWriter::new();
        Texture2DCodec::new().write(&mut w, &value, &Resolver::default()).unwrap();
        assert_eq!(w.into_inner(), color_texture(1, 1, &[51, 51, 51, 51]));
    }

    #[test]
    fn dxt1_surface_decodes_to_rgba() {
        // One DXT1 block: both endpoints white, all indices 0.
        let mut w = ByteWriter::new();
        w.write_i32(4);
        w.write_u32(4);
        w.write_u32(4);
        w.write_u32(1);
        w.write_u32(8);
        w.write_bytes(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
        let value = read(&w.into_inner()).unwrap();
        let data = value.field("t", "data").unwrap().try_bytes("t").unwrap();
        assert_eq!(data.len(), 64);
        assert!(data.iter().all(|&b| b == 255));
    }

    #[test]
    fn png_export_and_import() {
        let codec = Texture2DCodec::new();
        let value = Value::record([
            ("format", Value::Int(0)),
            ("width", Value::Int(2)),
            ("height", Value::Int(1)),
            ("data", Value::Bytes(vec![1, 2, 3, 4, 5, 6, 7, 8])),
        ]);
        let mut files = MemorySideFiles::new();
        let json = codec.export(&value, &mut files).unwrap();
        assert_eq!(json["format"], 0);
        assert!(json["filename"].as_str().unwrap().ends_with(".png"));
        assert_eq!(codec.import(&json, &mut files).unwrap(), value);
    }

    #[test]
    fn rgb_png_gains_opaque_alpha() {
        let mut png_bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_bytes, 1, 1);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[7, 8, 9]).unwrap();
        }
        assert_eq!(decode_png(&png_bytes).unwrap(), (1, 1, vec![7, 8, 9, 255]));
    }

    #[test]
    fn png_size_must_match_dimensions() {
        assert!(matches!(encode_png(&[0; 3], 1, 1), Err(XnbError::Image(_))));
    }
}
