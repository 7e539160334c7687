use std::sync::Arc;

use crate::buffer::{ByteReader, ByteWriter};
use crate::codec::ContentCodec;
use crate::error::{Result, XnbError};
use crate::types::Type;
use crate::value::Value;

/// Per-file reader table.
///
/// Holds the codecs instantiated from a file's reader list, in file order.
/// On the wire a reader is referenced by its table index plus one; index 0
/// denotes a null reference.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    readers: Vec<Arc<dyn ContentCodec>>,
}

impl Resolver {
    pub fn new(readers: Vec<Arc<dyn ContentCodec>>) -> Self {
        Self { readers }
    }

    pub fn readers(&self) -> &[Arc<dyn ContentCodec>] {
        &self.readers
    }

    /// Table position of the reader whose type equals `ty`.
    pub fn index_of(&self, ty: &Type) -> Option<usize> {
        self.readers.iter().position(|r| r.reader_type() == ty)
    }

    /// Read a 7-bit reader index and dispatch to that reader.
    pub fn read(&self, input: &mut ByteReader<'_>) -> Result<Value> {
        match self.read_index(input)? {
            Some(codec) => codec.read(input, self),
            None => Ok(Value::Null),
        }
    }

    /// Like [`Resolver::read`], but the indexed reader must have the same
    /// type as `expected`.
    pub fn read_expecting(&self, input: &mut ByteReader<'_>, expected: &dyn ContentCodec) -> Result<Value> {
        let Some(codec) = self.read_index(input)? else {
            return Ok(Value::Null);
        };
        if codec.reader_type() != expected.reader_type() {
            return Err(XnbError::ReaderTypeMismatch {
                expected: expected.reader_type().to_string(),
                found: codec.reader_type().to_string(),
            });
        }
        codec.read(input, self)
    }

    fn read_index(&self, input: &mut ByteReader<'_>) -> Result<Option<&Arc<dyn ContentCodec>>> {
        let index = input.read_7bit()? as usize;
        if index == 0 {
            return Ok(None);
        }
        self.readers
            .get(index - 1)
            .map(Some)
            .ok_or(XnbError::InvalidReaderIndex {
                index: index - 1,
                count: self.readers.len(),
            })
    }

    /// Write the 7-bit index (table position plus one) of `codec`'s reader.
    pub fn write_index(&self, output: &mut ByteWriter, codec: &dyn ContentCodec) -> Result<()> {
        let index = self
            .index_of(codec.reader_type())
            .ok_or_else(|| XnbError::ReaderNotInTable(codec.reader_type().to_string()))?;
        output.write_7bit(index as u32 + 1);
        Ok(())
    }

    // ── Element slots ───────────────────────────────────────────────────────
    //
    // A composite's element slot carries a reader index iff the element codec
    // is polymorphic. Every composite goes through these two helpers so the
    // rule is applied the same way on read and write.

    pub fn read_slot(&self, codec: &dyn ContentCodec, input: &mut ByteReader<'_>) -> Result<Value> {
        if codec.is_polymorphic() {
            self.read_expecting(input, codec)
        } else {
            codec.read(input, self)
        }
    }

    pub fn write_slot(&self, codec: &dyn ContentCodec, output: &mut ByteWriter, value: &Value) -> Result<()> {
        if codec.is_polymorphic() {
            if value.is_null() && !codec.accepts_null() {
                output.write_7bit(0);
                return Ok(());
            }
            self.write_index(output, codec)?;
        }
        codec.write(output, value, self)
    }

    // ── Root object ─────────────────────────────────────────────────────────

    /// The root object is always read through an index.
    pub fn read_root(&self, input: &mut ByteReader<'_>) -> Result<Value> {
        self.read(input)
    }

    /// Read the root object, failing unless its reader is `expected`'s.
    pub fn read_root_expecting(&self, input: &mut ByteReader<'_>, expected: &dyn ContentCodec) -> Result<Value> {
        self.read_expecting(input, expected)
    }

    /// The root object is written by the first reader with index 1.
    pub fn write_root(&self, output: &mut ByteWriter, value: &Value) -> Result<()> {
        let root = self.readers.first().ok_or(XnbError::InvalidReaderIndex { index: 0, count: 0 })?;
        output.write_7bit(1);
        root.write(output, value, self)
    }
}
