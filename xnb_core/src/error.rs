use thiserror::Error;

/// Every failure the XNB library can report.
///
/// Bounds violations on untrusted input always surface as one of these
/// variants; nothing in the decoding path panics on malformed data.
#[derive(Debug, Error)]
pub enum XnbError {
    #[error("invalid file magic: expected \"XNB\", found {0:?}")]
    BadMagic([u8; 3]),

    #[error("file size mismatch: header declares {declared} bytes but {actual} are present")]
    Truncated { declared: u64, actual: u64 },

    #[error("read of {requested} bytes at offset {offset} exceeds buffer length {len}")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        len: usize,
    },

    #[error("LZX intel E8 call translation is not supported")]
    UnsupportedIntelE8,

    #[error("invalid LZX block type {0}")]
    InvalidBlockType(u32),

    #[error("LZX Huffman decode table overrun")]
    HuffmanTableOverrun,

    #[error("LZX run of {run} bytes at window position {position} exceeds window size {window}")]
    WindowOverrun {
        position: usize,
        run: usize,
        window: usize,
    },

    #[error("LZX window size of {0} bits is outside 15..=21")]
    InvalidWindowSize(u32),

    #[error("invalid LZX frame: frame size {frame}, block size {block}")]
    InvalidFrameSize { frame: usize, block: usize },

    #[error("decompressed {actual} bytes but the header declares {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("no reader registered for type {0}")]
    UnknownReader(String),

    #[error("reader index {index} is out of bounds for a table of {count} readers")]
    InvalidReaderIndex { index: usize, count: usize },

    #[error("reader type mismatch: expected {expected}, found {found}")]
    ReaderTypeMismatch { expected: String, found: String },

    #[error("reader {0} does not appear in the file's reader table")]
    ReaderNotInTable(String),

    #[error("{0} shared resources present; shared resources are not supported")]
    UnexpectedSharedResources(u32),

    #[error("type descriptor nesting exceeds the maximum depth of {0}")]
    TypeTooDeep(usize),

    #[error("malformed type descriptor {0:?}")]
    InvalidTypeName(String),

    #[error("unsupported texture surface format {0}")]
    UnsupportedTextureFormat(i32),

    #[error("{codec} expected {expected}")]
    InvalidValue {
        codec: String,
        expected: &'static str,
    },

    #[error("{0} values cannot be used as JSON object keys")]
    UnsupportedKey(String),

    #[error("invalid UTF-8 in string data: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("side file error: {0}")]
    SideFile(String),

    #[error("malformed data: {0}")]
    Malformed(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl XnbError {
    /// Shorthand for a value-shape mismatch reported by a codec.
    pub fn invalid_value(codec: impl Into<String>, expected: &'static str) -> Self {
        XnbError::InvalidValue {
            codec: codec.into(),
            expected,
        }
    }
}

pub type Result<T> = std::result::Result<T, XnbError>;
