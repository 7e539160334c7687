use serde::{Deserialize, Serialize};

use crate::buffer::{ByteReader, ByteWriter};
use crate::error::{Result, XnbError};

/// Magic bytes at the start of every XNB file.
pub const MAGIC: &[u8; 3] = b"XNB";

/// Bytes before the reader table when the payload is compressed:
///   magic[3] + target:u8 + version:u8 + flags:u8 + file_size:u32
///   + decompressed_size:u32 = 14
pub const COMPRESSED_PROLOGUE_SIZE: usize = 14;

/// Bytes before the reader table of an uncompressed file.
pub const PROLOGUE_SIZE: usize = 10;

/// Offset of the `file_size` field.
pub const FILE_SIZE_OFFSET: usize = 6;

/// Offset of the `decompressed_size` field (compressed files only).
pub const DECOMPRESSED_SIZE_OFFSET: usize = 10;

// ── Flags ──────────────────────────────────────────────────────────────────

/// HiDef graphics profile.
pub const FLAG_HIDEF: u8 = 0x01;

/// Payload after the prologue is LZ4 block compressed.
pub const FLAG_LZ4: u8 = 0x40;

/// Payload after the prologue is LZX compressed. Checked before LZ4.
pub const FLAG_LZX: u8 = 0x80;

/// Format versions the codecs were written against; others only warn.
pub const KNOWN_VERSIONS: [u8; 3] = [3, 4, 5];

/// Human-readable name of a target platform byte.
pub fn platform_name(target: char) -> Option<&'static str> {
    match target {
        'w' => Some("Microsoft Windows"),
        'm' => Some("Windows Phone 7"),
        'x' => Some("Xbox 360"),
        'a' => Some("Android"),
        'i' => Some("iOS"),
        _ => None,
    }
}

/// Platforms whose files are written LZ4 compressed.
pub fn uses_lz4(target: char) -> bool {
    matches!(target.to_ascii_lowercase(), 'a' | 'i')
}

/// Human-readable name of a format version.
pub fn version_name(version: u8) -> Option<&'static str> {
    match version {
        3 => Some("XNA Game Studio 3.0"),
        4 => Some("XNA Game Studio 3.1"),
        5 => Some("XNA Game Studio 4.0"),
        _ => None,
    }
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Payload compression named by the header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzx,
    Lz4,
}

impl Compression {
    pub fn from_flags(flags: u8) -> Self {
        if flags & FLAG_LZX != 0 {
            Compression::Lzx
        } else if flags & FLAG_LZ4 != 0 {
            Compression::Lz4
        } else {
            Compression::None
        }
    }

    pub fn is_compressed(self) -> bool {
        self != Compression::None
    }
}

/// Decoded XNB file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Target platform byte as a lower-case character (`w`, `x`, `a`, ...).
    pub target: char,
    pub format_version: u8,
    pub hidef: bool,
    /// Whether the source payload was compressed. Ignored when packing:
    /// the target platform decides.
    pub compressed: bool,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            target: 'w',
            format_version: 5,
            hidef: false,
            compressed: false,
        }
    }
}

/// Raw prologue fields as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prologue {
    pub target: u8,
    pub format_version: u8,
    pub flags: u8,
    pub file_size: u32,
    /// Present only when the payload is compressed.
    pub decompressed_size: Option<u32>,
}

impl Prologue {
    pub fn compression(&self) -> Compression {
        Compression::from_flags(self.flags)
    }

    /// Parse from the start of a buffer, checking the magic.
    pub fn read(input: &mut ByteReader<'_>) -> Result<Self> {
        let magic = input.read_bytes(3)?;
        if magic != MAGIC {
            return Err(XnbError::BadMagic([magic[0], magic[1], magic[2]]));
        }
        let target = input.read_u8()?;
        let format_version = input.read_u8()?;
        let flags = input.read_u8()?;
        let file_size = input.read_u32()?;
        let decompressed_size = if Compression::from_flags(flags).is_compressed() {
            Some(input.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            target,
            format_version,
            flags,
            file_size,
            decompressed_size,
        })
    }

    /// Write with the given sizes; callers backpatch them once known.
    pub fn write(&self, output: &mut ByteWriter) {
        output.write_bytes(MAGIC);
        output.write_u8(self.target);
        output.write_u8(self.format_version);
        output.write_u8(self.flags);
        output.write_u32(self.file_size);
        if let Some(size) = self.decompressed_size {
            output.write_u32(size);
        }
    }

    pub fn header(&self) -> Header {
        Header {
            target: char::from(self.target.to_ascii_lowercase()),
            format_version: self.format_version,
            hidef: self.flags & FLAG_HIDEF != 0,
            compressed: self.compression().is_compressed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lzx_flag_wins_over_lz4() {
        assert_eq!(Compression::from_flags(FLAG_LZX | FLAG_LZ4), Compression::Lzx);
        assert_eq!(Compression::from_flags(FLAG_LZ4 | FLAG_HIDEF), Compression::Lz4);
        assert_eq!(Compression::from_flags(FLAG_HIDEF), Compression::None);
    }

    #[test]
    fn prologue_round_trips() {
        let prologue = Prologue {
            target: b'a',
            format_version: 5,
            flags: FLAG_LZ4 | FLAG_HIDEF,
            file_size: 1234,
            decompressed_size: Some(5678),
        };
        let mut w = ByteWriter::new();
        prologue.write(&mut w);
        assert_eq!(w.len(), COMPRESSED_PROLOGUE_SIZE);

        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        let back = Prologue::read(&mut r).unwrap();
        assert_eq!(back, prologue);
        assert_eq!(
            back.header(),
            Header {
                target: 'a',
                format_version: 5,
                hidef: true,
                compressed: true,
            }
        );
    }

    #[test]
    fn header_target_is_lower_case() {
        let prologue = Prologue {
            target: b'I',
            format_version: 5,
            flags: 0,
            file_size: 10,
            decompressed_size: None,
        };
        assert_eq!(prologue.header().target, 'i');
    }

    #[test]
    fn bad_magic_is_reported() {
        let bytes = *b"XNA\x77\x05\x00\x0a\x00\x00\x00";
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(Prologue::read(&mut r), Err(XnbError::BadMagic(m)) if &m == b"XNA"));
    }

    #[test]
    fn lz4_platforms() {
        assert!(uses_lz4('a'));
        assert!(uses_lz4('i'));
        assert!(!uses_lz4('w'));
        assert!(!uses_lz4('x'));
    }
}
