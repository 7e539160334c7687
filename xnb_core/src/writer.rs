use std::sync::Arc;

use tracing::{debug, info};

use crate::buffer::ByteWriter;
use crate::codec::{BlockCodec, ContentCodec};
use crate::document::Document;
use crate::error::{Result, XnbError};
use crate::format::{
    uses_lz4, Prologue, COMPRESSED_PROLOGUE_SIZE, DECOMPRESSED_SIZE_OFFSET, FILE_SIZE_OFFSET, FLAG_HIDEF, FLAG_LZ4,
};
use crate::registry::Registry;
use crate::resolver::Resolver;

/// Encode a document as a complete XNB file.
///
/// # Layout decisions
/// - Android (`a`) and iOS (`i`) targets are LZ4 compressed; every other
///   target is written uncompressed. LZX is never produced.
/// - Size fields are written as placeholders and backpatched: offset 6 gets
///   the final file size, offset 10 (LZ4 only) the uncompressed length of
///   everything after the 14-byte prologue.
/// - The root object is always written with reader index 1.
pub fn pack(doc: &Document, registry: &Registry, lz4: &dyn BlockCodec) -> Result<Vec<u8>> {
    let target = u8::try_from(doc.header.target.to_ascii_lowercase())
        .map_err(|_| XnbError::invalid_value("header", "a single-byte target platform"))?;
    let compress = uses_lz4(doc.header.target);
    let flags = if doc.header.hidef { FLAG_HIDEF } else { 0 } | if compress { FLAG_LZ4 } else { 0 };

    let mut out = ByteWriter::with_capacity(1024);
    Prologue {
        target,
        format_version: doc.header.format_version,
        flags,
        file_size: 0,
        decompressed_size: compress.then_some(0),
    }
    .write(&mut out);

    if doc.readers.is_empty() {
        return Err(XnbError::InvalidReaderIndex { index: 0, count: 0 });
    }
    out.write_7bit(doc.readers.len() as u32);
    let mut codecs: Vec<Arc<dyn ContentCodec>> = Vec::with_capacity(doc.readers.len());
    for entry in &doc.readers {
        codecs.push(registry.get_codec_by_name(&entry.type_name)?);
        out.write_prefixed_string(&entry.type_name)?;
        out.write_u32(entry.version);
    }
    let resolver = Resolver::new(codecs);

    // Shared resources are never written.
    out.write_7bit(0);

    resolver.write_root(&mut out, &doc.content)?;
    out.trim();

    if compress {
        let content = out.as_slice()[COMPRESSED_PROLOGUE_SIZE..].to_vec();
        let compressed = lz4.compress_block(&content)?;
        debug!(raw = content.len(), compressed = compressed.len(), codec = lz4.name(), "payload compressed");
        out.seek(COMPRESSED_PROLOGUE_SIZE);
        out.write_bytes(&compressed);
        out.trim();
        out.patch_u32(DECOMPRESSED_SIZE_OFFSET, size_u32(content.len())?)?;
    }
    out.patch_u32(FILE_SIZE_OFFSET, size_u32(out.len())?)?;
    let bytes = out.into_inner();

    info!(size = bytes.len(), compressed = compress, "packed");
    Ok(bytes)
}

fn size_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| XnbError::Malformed("file larger than 4 GiB"))
}
