use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::buffer::{ByteReader, ByteWriter};
use crate::error::{Result, XnbError};
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::types::Type;
use crate::value::Value;

// ── Content codecs ──────────────────────────────────────────────────────────

/// Reads and writes one kind of XNB content value.
///
/// A codec instance is bound to a concrete reader type: composite codecs
/// hold the codecs of their element types, so `reader_type()` of a
/// `ListReader` over `Int32Reader` is `ListReader`1[[Int32Reader]]`.
///
/// A polymorphic codec is preceded on the wire by a 7-bit reader index
/// whenever it appears as an element slot of another codec.
pub trait ContentCodec: Send + Sync + fmt::Debug {
    /// Reader type descriptor this codec instance was resolved to.
    fn reader_type(&self) -> &Type;

    fn is_polymorphic(&self) -> bool;

    /// `true` when `Value::Null` is a valid payload rather than a null
    /// reference. Only the Nullable codec overrides this.
    fn accepts_null(&self) -> bool {
        false
    }

    fn read(&self, input: &mut ByteReader<'_>, resolver: &Resolver) -> Result<Value>;

    fn write(&self, output: &mut ByteWriter, value: &Value, resolver: &Resolver) -> Result<()>;

    /// Convert a value to its JSON form, pushing binary payloads to `files`.
    fn export(&self, value: &Value, _files: &mut dyn SideFiles) -> Result<JsonValue> {
        value.to_json()
    }

    /// Rebuild a value from its JSON form, pulling binary payloads from `files`.
    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value>;

    /// Render a value of this codec as a JSON object key.
    fn export_key(&self, _value: &Value) -> Result<String> {
        Err(XnbError::UnsupportedKey(self.reader_type().name.clone()))
    }

    /// Parse a JSON object key back into a value of this codec.
    fn import_key(&self, _key: &str) -> Result<Value> {
        Err(XnbError::UnsupportedKey(self.reader_type().name.clone()))
    }

    /// Short display name: the last path segment of the reader type.
    fn short_name(&self) -> &str {
        let name = &self.reader_type().name;
        name.rsplit('.').next().unwrap_or(name)
    }
}

/// Recognises type descriptors and builds [`ContentCodec`] instances for them.
///
/// Factories are consulted in registration order; the first one whose
/// `is_codec` or `reads` matches wins.
pub trait CodecFactory: Send + Sync {
    /// Does `ty` name this factory's reader?
    fn is_codec(&self, ty: &Type) -> bool;

    /// Does this factory's reader deserialize content of type `ty`?
    fn reads(&self, _ty: &Type) -> bool {
        false
    }

    /// Build a codec for `ty`. Composite factories resolve their element
    /// types through `registry` at `depth + 1`.
    fn instantiate(&self, ty: &Type, registry: &Registry, depth: usize) -> Result<Arc<dyn ContentCodec>>;
}

// ── Side channel ────────────────────────────────────────────────────────────

/// Storage for binary payloads kept outside the JSON document.
pub trait SideFiles {
    /// Store `data` and return the name the JSON document should refer to.
    fn export_file(&mut self, data: &[u8], extension: &str) -> Result<String>;

    fn import_file(&mut self, name: &str) -> Result<Vec<u8>>;
}

/// In-memory side channel, handy for tests and library callers that keep
/// everything in process.
#[derive(Debug, Default, Clone)]
pub struct MemorySideFiles {
    files: HashMap<String, Vec<u8>>,
    counter: usize,
}

impl MemorySideFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SideFiles for MemorySideFiles {
    fn export_file(&mut self, data: &[u8], extension: &str) -> Result<String> {
        let name = format!("{}.{}", self.counter, extension);
        self.counter += 1;
        self.files.insert(name.clone(), data.to_vec());
        Ok(name)
    }

    fn import_file(&mut self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| XnbError::SideFile(format!("no side file named {name:?}")))
    }
}

// ── Block compression ───────────────────────────────────────────────────────

/// Whole-payload compression used by the container envelope.
///
/// LZX is built in; LZ4 is supplied by the caller so the core stays free of
/// compression backends.
pub trait BlockCodec: Send + Sync {
    /// Human-readable codec name for logs.
    fn name(&self) -> &'static str;

    fn compress_block(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// Decompress `compressed` into exactly `raw_len` bytes.
    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>>;
}
