use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::codec::SideFiles;
use crate::error::{Result, XnbError};
use crate::format::Header;
use crate::registry::Registry;
use crate::value::Value;

/// One entry of a file's reader table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderEntry {
    /// Assembly-qualified reader type string, kept verbatim.
    #[serde(rename = "type")]
    pub type_name: String,
    pub version: u32,
}

impl ReaderEntry {
    pub fn new(type_name: impl Into<String>, version: u32) -> Self {
        Self {
            type_name: type_name.into(),
            version,
        }
    }
}

/// An unpacked XNB file: header, reader table and root content.
///
/// `Document` carries a [`Value`] tree; [`JsonDocument`] is the same shape
/// with JSON content, as written next to exported side files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<C = Value> {
    pub header: Header,
    pub readers: Vec<ReaderEntry>,
    pub content: C,
}

pub type JsonDocument = Document<JsonValue>;

impl Document {
    /// Convert content to JSON through the root reader's codec, pushing
    /// binary payloads to `files`.
    pub fn export(&self, registry: &Registry, files: &mut dyn SideFiles) -> Result<JsonDocument> {
        let root = root_entry(&self.readers)?;
        let codec = registry.get_codec_by_name(&root.type_name)?;
        let content = codec.export(&self.content, files)?;
        debug!(root = %codec.reader_type(), "exported content");
        Ok(Document {
            header: self.header.clone(),
            readers: self.readers.clone(),
            content,
        })
    }
}

impl JsonDocument {
    /// Rebuild the value tree through the root reader's codec, pulling
    /// binary payloads from `files`.
    pub fn import(&self, registry: &Registry, files: &mut dyn SideFiles) -> Result<Document> {
        let root = root_entry(&self.readers)?;
        let codec = registry.get_codec_by_name(&root.type_name)?;
        let content = codec.import(&self.content, files)?;
        debug!(root = %codec.reader_type(), "imported content");
        Ok(Document {
            header: self.header.clone(),
            readers: self.readers.clone(),
            content,
        })
    }
}

fn root_entry(readers: &[ReaderEntry]) -> Result<&ReaderEntry> {
    readers.first().ok_or(XnbError::InvalidReaderIndex { index: 0, count: 0 })
}
