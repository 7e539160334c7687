use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::buffer::ByteReader;
use crate::codec::{BlockCodec, ContentCodec};
use crate::document::{Document, ReaderEntry};
use crate::error::{Result, XnbError};
use crate::format::{
    platform_name, version_name, Compression, Prologue, COMPRESSED_PROLOGUE_SIZE, KNOWN_VERSIONS, PROLOGUE_SIZE,
};
use crate::lzx::LzxCodec;
use crate::registry::Registry;
use crate::resolver::Resolver;

/// Decode a complete XNB file.
///
/// # Sequence
/// 1. Parse and validate the prologue (magic, declared file size).
/// 2. Decompress the payload after byte 14 if flagged; LZX is built in,
///    LZ4 goes through `lz4`.
/// 3. Read the reader table and instantiate a codec per entry via `registry`.
/// 4. Reject shared resources, then read the root object.
pub fn unpack(file: &[u8], registry: &Registry, lz4: &dyn BlockCodec) -> Result<Document> {
    unpack_root(file, registry, lz4, None)
}

/// Like [`unpack`], but the root object must be read by `expected`'s reader;
/// any other root fails with [`XnbError::ReaderTypeMismatch`].
pub fn unpack_expecting(
    file: &[u8],
    registry: &Registry,
    lz4: &dyn BlockCodec,
    expected: &dyn ContentCodec,
) -> Result<Document> {
    unpack_root(file, registry, lz4, Some(expected))
}

fn unpack_root(
    file: &[u8],
    registry: &Registry,
    lz4: &dyn BlockCodec,
    expected: Option<&dyn ContentCodec>,
) -> Result<Document> {
    let mut input = ByteReader::new(file);
    let prologue = Prologue::read(&mut input)?;
    let header = prologue.header();

    match platform_name(header.target) {
        Some(name) => debug!(platform = %header.target, name, "target platform"),
        None => warn!(platform = %header.target, "unrecognised target platform"),
    }
    if !KNOWN_VERSIONS.contains(&header.format_version) {
        warn!(version = header.format_version, "unrecognised format version");
    } else if let Some(name) = version_name(header.format_version) {
        debug!(version = header.format_version, name, "format version");
    }
    debug!(hidef = header.hidef, compression = ?prologue.compression(), "header flags");

    if prologue.file_size as usize != file.len() {
        return Err(XnbError::Truncated {
            declared: u64::from(prologue.file_size),
            actual: file.len() as u64,
        });
    }

    let working: Cow<'_, [u8]> = match (prologue.compression(), prologue.decompressed_size) {
        (Compression::None, _) | (_, None) => Cow::Borrowed(file),
        (compression, Some(raw_len)) => {
            let compressed = &file[COMPRESSED_PROLOGUE_SIZE..];
            let raw = match compression {
                Compression::Lzx => LzxCodec::default().decompress_block(compressed, raw_len as usize)?,
                _ => lz4.decompress_block(compressed, raw_len as usize)?,
            };
            if raw.len() != raw_len as usize {
                return Err(XnbError::SizeMismatch {
                    expected: raw_len as usize,
                    actual: raw.len(),
                });
            }
            debug!(compressed = compressed.len(), decompressed = raw.len(), "payload decompressed");
            let mut spliced = Vec::with_capacity(COMPRESSED_PROLOGUE_SIZE + raw.len());
            spliced.extend_from_slice(&file[..COMPRESSED_PROLOGUE_SIZE]);
            spliced.extend_from_slice(&raw);
            Cow::Owned(spliced)
        }
    };

    let mut input = ByteReader::new(&working);
    input.seek(if prologue.compression().is_compressed() {
        COMPRESSED_PROLOGUE_SIZE
    } else {
        PROLOGUE_SIZE
    })?;

    let (readers, resolver) = read_reader_table(&mut input, registry)?;

    let shared = input.read_7bit()?;
    if shared != 0 {
        return Err(XnbError::UnexpectedSharedResources(shared));
    }

    let content = match expected {
        Some(codec) => resolver.read_root_expecting(&mut input, codec)?,
        None => resolver.read_root(&mut input)?,
    };
    if input.remaining() > 0 {
        warn!(bytes = input.remaining(), "trailing bytes after content");
    }
    info!(readers = readers.len(), root = %resolver.readers()[0].reader_type(), "unpacked");

    Ok(Document {
        header,
        readers,
        content,
    })
}

/// Read the reader count and entries, resolving each through `registry`.
pub fn read_reader_table(input: &mut ByteReader<'_>, registry: &Registry) -> Result<(Vec<ReaderEntry>, Resolver)> {
    let count = input.read_7bit()? as usize;
    if count == 0 {
        return Err(XnbError::InvalidReaderIndex { index: 0, count: 0 });
    }
    let mut entries = Vec::with_capacity(count.min(256));
    let mut codecs: Vec<Arc<dyn ContentCodec>> = Vec::with_capacity(count.min(256));
    for i in 0..count {
        let type_name = input.read_prefixed_string()?.to_string();
        let version = input.read_u32()?;
        debug!(index = i, reader = %type_name, version, "reader table entry");
        codecs.push(registry.get_codec_by_name(&type_name)?);
        entries.push(ReaderEntry { type_name, version });
    }
    Ok((entries, Resolver::new(codecs)))
}
