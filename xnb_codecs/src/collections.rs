use std::sync::Arc;

use serde_json::Value as JsonValue;
use xnb_core::{
    ByteReader, ByteWriter, CodecFactory, ContentCodec, Registry, Resolver, Result, SideFiles, Type, Value, XnbError,
};

use crate::json;

pub const ARRAY_READER: &str = "Microsoft.Xna.Framework.Content.ArrayReader";
pub const LIST_READER: &str = "Microsoft.Xna.Framework.Content.ListReader";
pub const DICTIONARY_READER: &str = "Microsoft.Xna.Framework.Content.DictionaryReader";
pub const NULLABLE_READER: &str = "Microsoft.Xna.Framework.Content.NullableReader";

const GENERIC_LIST: &str = "System.Collections.Generic.List";
const GENERIC_DICTIONARY: &str = "System.Collections.Generic.Dictionary";
const NULLABLE: &str = "System.Nullable";

/// Resolve the `count` generic arguments of `ty` through `registry`.
fn resolve_args(ty: &Type, count: usize, registry: &Registry, depth: usize) -> Result<Vec<Arc<dyn ContentCodec>>> {
    if ty.subtypes.len() != count {
        return Err(XnbError::InvalidTypeName(format!(
            "{ty} needs {count} generic argument(s), found {}",
            ty.subtypes.len()
        )));
    }
    ty.subtypes.iter().map(|sub| registry.resolve(sub, depth + 1)).collect()
}

/// Cap a wire-declared element count so a corrupt header cannot force a huge
/// allocation before the first element read fails.
fn capacity_hint(count: u32, input: &ByteReader<'_>) -> usize {
    (count as usize).min(input.remaining())
}

// ── Array / List ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Array,
    List,
}

/// `u32` count followed by the elements, each in an element slot.
///
/// Arrays are reference types and thus polymorphic themselves; lists are not.
#[derive(Debug)]
pub struct SequenceCodec {
    kind: SequenceKind,
    element: Arc<dyn ContentCodec>,
    ty: Type,
}

impl SequenceCodec {
    pub fn new(kind: SequenceKind, element: Arc<dyn ContentCodec>) -> Self {
        let reader = match kind {
            SequenceKind::Array => ARRAY_READER,
            SequenceKind::List => LIST_READER,
        };
        let ty = Type::generic(reader, vec![element.reader_type().clone()]);
        Self { kind, element, ty }
    }

    pub fn list(element: Arc<dyn ContentCodec>) -> Self {
        Self::new(SequenceKind::List, element)
    }

    pub fn array(element: Arc<dyn ContentCodec>) -> Self {
        Self::new(SequenceKind::Array, element)
    }
}

impl ContentCodec for SequenceCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        self.kind == SequenceKind::Array
    }

    fn read(&self, input: &mut ByteReader<'_>, resolver: &Resolver) -> Result<Value> {
        let count = input.read_u32()?;
        let mut items = Vec::with_capacity(capacity_hint(count, input));
        for _ in 0..count {
            items.push(resolver.read_slot(self.element.as_ref(), input)?);
        }
        Ok(Value::List(items))
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, resolver: &Resolver) -> Result<()> {
        let items = value.try_list(self.short_name())?;
        let count = u32::try_from(items.len()).map_err(|_| XnbError::Malformed("more than u32::MAX elements"))?;
        output.write_u32(count);
        for item in items {
            resolver.write_slot(self.element.as_ref(), output, item)?;
        }
        Ok(())
    }

    fn export(&self, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
        let items = value.try_list(self.short_name())?;
        Ok(JsonValue::Array(
            items
                .iter()
                .map(|item| export_slot(self.element.as_ref(), item, files))
                .collect::<Result<_>>()?,
        ))
    }

    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
        let items = json::as_array(json, self.short_name())?;
        Ok(Value::List(
            items
                .iter()
                .map(|item| import_slot(self.element.as_ref(), item, files))
                .collect::<Result<_>>()?,
        ))
    }
}

/// Null references in polymorphic slots pass through export untouched.
fn export_slot(codec: &dyn ContentCodec, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
    if value.is_null() && codec.is_polymorphic() && !codec.accepts_null() {
        return Ok(JsonValue::Null);
    }
    codec.export(value, files)
}

fn import_slot(codec: &dyn ContentCodec, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
    if json.is_null() && codec.is_polymorphic() && !codec.accepts_null() {
        return Ok(Value::Null);
    }
    codec.import(json, files)
}

pub struct SequenceFactory(pub SequenceKind);

impl CodecFactory for SequenceFactory {
    fn is_codec(&self, ty: &Type) -> bool {
        match self.0 {
            SequenceKind::Array => ty.name == ARRAY_READER,
            SequenceKind::List => ty.name == LIST_READER,
        }
    }

    fn reads(&self, ty: &Type) -> bool {
        match self.0 {
            SequenceKind::Array => ty.is_array,
            SequenceKind::List => ty.name == GENERIC_LIST,
        }
    }

    fn instantiate(&self, ty: &Type, registry: &Registry, depth: usize) -> Result<Arc<dyn ContentCodec>> {
        let element = match ty.array_element() {
            Some(element) if self.0 == SequenceKind::Array => registry.resolve(&element, depth + 1)?,
            _ => resolve_args(ty, 1, registry, depth)?.remove(0),
        };
        Ok(Arc::new(SequenceCodec::new(self.0, element)))
    }
}

// ── Dictionary ───────────────────────────────────────────────────────────────

/// `u32` count followed by key/value pairs, each side in an element slot.
///
/// Exported as a JSON object; only keys whose codec supports
/// [`ContentCodec::export_key`] (strings, chars, numbers) can be exported.
#[derive(Debug)]
pub struct DictionaryCodec {
    key: Arc<dyn ContentCodec>,
    value: Arc<dyn ContentCodec>,
    ty: Type,
}

impl DictionaryCodec {
    pub fn new(key: Arc<dyn ContentCodec>, value: Arc<dyn ContentCodec>) -> Self {
        let ty = Type::generic(
            DICTIONARY_READER,
            vec![key.reader_type().clone(), value.reader_type().clone()],
        );
        Self { key, value, ty }
    }
}

impl ContentCodec for DictionaryCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        true
    }

    fn read(&self, input: &mut ByteReader<'_>, resolver: &Resolver) -> Result<Value> {
        let count = input.read_u32()?;
        let mut pairs = Vec::with_capacity(capacity_hint(count, input));
        for _ in 0..count {
            let key = resolver.read_slot(self.key.as_ref(), input)?;
            let value = resolver.read_slot(self.value.as_ref(), input)?;
            pairs.push((key, value));
        }
        Ok(Value::Map(pairs))
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, resolver: &Resolver) -> Result<()> {
        let pairs = value.try_map(self.short_name())?;
        let count = u32::try_from(pairs.len()).map_err(|_| XnbError::Malformed("more than u32::MAX entries"))?;
        output.write_u32(count);
        for (k, v) in pairs {
            resolver.write_slot(self.key.as_ref(), output, k)?;
            resolver.write_slot(self.value.as_ref(), output, v)?;
        }
        Ok(())
    }

    fn export(&self, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
        let pairs = value.try_map(self.short_name())?;
        let mut out = serde_json::Map::with_capacity(pairs.len());
        for (k, v) in pairs {
            out.insert(self.key.export_key(k)?, export_slot(self.value.as_ref(), v, files)?);
        }
        Ok(JsonValue::Object(out))
    }

    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
        let object = json::as_object(json, self.short_name())?;
        let mut pairs = Vec::with_capacity(object.len());
        for (k, v) in object {
            pairs.push((self.key.import_key(k)?, import_slot(self.value.as_ref(), v, files)?));
        }
        Ok(Value::Map(pairs))
    }
}

pub struct DictionaryFactory;

impl CodecFactory for DictionaryFactory {
    fn is_codec(&self, ty: &Type) -> bool {
        ty.name == DICTIONARY_READER
    }

    fn reads(&self, ty: &Type) -> bool {
        ty.name == GENERIC_DICTIONARY
    }

    fn instantiate(&self, ty: &Type, registry: &Registry, depth: usize) -> Result<Arc<dyn ContentCodec>> {
        let mut args = resolve_args(ty, 2, registry, depth)?;
        let value = args.remove(1);
        let key = args.remove(0);
        Ok(Arc::new(DictionaryCodec::new(key, value)))
    }
}

// ── Nullable ─────────────────────────────────────────────────────────────────

/// Presence byte followed, when set, by the payload in an element slot.
#[derive(Debug)]
pub struct NullableCodec {
    inner: Arc<dyn ContentCodec>,
    ty: Type,
}

impl NullableCodec {
    pub fn new(inner: Arc<dyn ContentCodec>) -> Self {
        let ty = Type::generic(NULLABLE_READER, vec![inner.reader_type().clone()]);
        Self { inner, ty }
    }
}

impl ContentCodec for NullableCodec {
    fn reader_type(&self) -> &Type {
        &self.ty
    }

    fn is_polymorphic(&self) -> bool {
        true
    }

    fn accepts_null(&self) -> bool {
        true
    }

    fn read(&self, input: &mut ByteReader<'_>, resolver: &Resolver) -> Result<Value> {
        if input.read_u8()? == 0 {
            return Ok(Value::Null);
        }
        resolver.read_slot(self.inner.as_ref(), input)
    }

    fn write(&self, output: &mut ByteWriter, value: &Value, resolver: &Resolver) -> Result<()> {
        if value.is_null() {
            output.write_u8(0);
            return Ok(());
        }
        output.write_u8(1);
        resolver.write_slot(self.inner.as_ref(), output, value)
    }

    fn export(&self, value: &Value, files: &mut dyn SideFiles) -> Result<JsonValue> {
        if value.is_null() {
            return Ok(JsonValue::Null);
        }
        self.inner.export(value, files)
    }

    fn import(&self, json: &JsonValue, files: &mut dyn SideFiles) -> Result<Value> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        self.inner.import(json, files)
    }
}

pub struct NullableFactory;

impl CodecFactory for NullableFactory {
    fn is_codec(&self, ty: &Type) -> bool {
        ty.name == NULLABLE_READER
    }

    fn reads(&self, ty: &Type) -> bool {
        ty.name == NULLABLE
    }

    fn instantiate(&self, ty: &Type, registry: &Registry, depth: usize) -> Result<Arc<dyn ContentCodec>> {
        let inner = resolve_args(ty, 1, registry, depth)?.remove(0);
        Ok(Arc::new(NullableCodec::new(inner)))
    }
}
