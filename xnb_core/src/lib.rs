pub mod bits;
pub mod buffer;
pub mod codec;
pub mod document;
pub mod error;
pub mod format;
pub mod lzx;
pub mod reader;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod value;
pub mod writer;

pub use buffer::{ByteReader, ByteWriter};
pub use codec::{BlockCodec, CodecFactory, ContentCodec, MemorySideFiles, SideFiles};
pub use document::{Document, JsonDocument, ReaderEntry};
pub use error::{Result, XnbError};
pub use format::Header;
pub use lzx::LzxCodec;
pub use reader::{unpack, unpack_expecting};
pub use registry::Registry;
pub use resolver::Resolver;
pub use types::Type;
pub use value::Value;
pub use writer::pack;
