use lz4_flex::block::{compress, decompress};
use xnb_core::{BlockCodec, Result, XnbError};

/// Raw LZ4 block codec for mobile-target XNB bodies.
///
/// The container stores the decompressed size in its own header, so blocks
/// carry no size prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl BlockCodec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(compress(raw))
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let raw = decompress(compressed, raw_len).map_err(|e| XnbError::Compression(format!("lz4: {e}")))?;
        if raw.len() != raw_len {
            return Err(XnbError::SizeMismatch {
                expected: raw_len,
                actual: raw.len(),
            });
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_round_trip() {
        let raw: Vec<u8> = b"content content content content".repeat(8);
        let packed = Lz4Codec.compress_block(&raw).unwrap();
        assert!(packed.len() < raw.len());
        assert_eq!(Lz4Codec.decompress_block(&packed, raw.len()).unwrap(), raw);
    }

    #[test]
    fn garbage_is_a_compression_error() {
        let err = Lz4Codec.decompress_block(&[0xF0, 0xFF, 0xFF], 64).unwrap_err();
        assert!(matches!(err, XnbError::Compression(_) | XnbError::SizeMismatch { .. }));
    }
}
