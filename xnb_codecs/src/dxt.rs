//! DXT1/3/5 block (de)compression through `texpresso`.

use texpresso::{Format, Params};
use xnb_core::{Result, XnbError};

/// Block-compressed surface formats of XNA's `SurfaceFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dxt {
    Dxt1,
    Dxt3,
    Dxt5,
}

impl Dxt {
    /// Map an XNA surface format id; `None` for non-DXT formats.
    pub fn from_surface_format(format: i32) -> Option<Self> {
        match format {
            4 => Some(Dxt::Dxt1),
            5 => Some(Dxt::Dxt3),
            6 => Some(Dxt::Dxt5),
            _ => None,
        }
    }

    fn format(self) -> Format {
        match self {
            Dxt::Dxt1 => Format::Bc1,
            Dxt::Dxt3 => Format::Bc2,
            Dxt::Dxt5 => Format::Bc3,
        }
    }

    pub fn compressed_size(self, width: usize, height: usize) -> usize {
        self.format().compressed_size(width, height)
    }

    /// Expand block data to RGBA8.
    pub fn decompress(self, data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
        let needed = self.compressed_size(width, height);
        if data.len() < needed {
            return Err(XnbError::OutOfBounds {
                offset: 0,
                requested: needed,
                len: data.len(),
            });
        }
        let mut rgba = vec![0u8; rgba_len(width, height)?];
        self.format().decompress(&data[..needed], width, height, &mut rgba);
        Ok(rgba)
    }

    /// Compress RGBA8 pixels into blocks.
    pub fn compress(self, rgba: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
        let needed = rgba_len(width, height)?;
        if rgba.len() < needed {
            return Err(XnbError::OutOfBounds {
                offset: 0,
                requested: needed,
                len: rgba.len(),
            });
        }
        let mut out = vec![0u8; self.compressed_size(width, height)];
        self.format()
            .compress(&rgba[..needed], width, height, Params::default(), &mut out);
        Ok(out)
    }
}

/// Byte length of an RGBA8 image.
pub fn rgba_len(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(XnbError::Malformed("texture dimensions overflow"))
}
