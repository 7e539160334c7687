/// Container-level tests: whole files go through `unpack` / `pack` with the
/// bundled reader set.
///
/// Files are assembled by hand so every byte of the expected layout is
/// visible in the test:
///   magic "XNB", target, version, flags, file size,
///   [decompressed size], reader table, shared count, root object.
use xnb_codecs::{builtin_registry, Lz4Codec, Primitive, PrimitiveCodec, Texture2DCodec};
use xnb_core::format::{FLAG_LZ4, FLAG_LZX};
use xnb_core::{pack, unpack, unpack_expecting, ByteWriter, Document, Header, MemorySideFiles, ReaderEntry, Value, XnbError};

const STRING_READER: &str = "Microsoft.Xna.Framework.Content.StringReader";
const INT32_READER: &str = "Microsoft.Xna.Framework.Content.Int32Reader";
const DICT_READER: &str = "Microsoft.Xna.Framework.Content.DictionaryReader`2[[System.String, mscorlib, \
                           Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089],[System.Int32, mscorlib, \
                           Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089]]";
const LIST_STRING_READER: &str = "Microsoft.Xna.Framework.Content.ListReader`1[[System.String, mscorlib]]";
const LIST_INT_READER: &str = "Microsoft.Xna.Framework.Content.ListReader`1[[System.Int32, mscorlib]]";

// ── helpers ───────────────────────────────────────────────────────────────

/// Reader table, shared-resource count and root object.
fn body(readers: &[&str], root: impl FnOnce(&mut ByteWriter)) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_7bit(readers.len() as u32);
    for name in readers {
        w.write_prefixed_string(name).unwrap();
        w.write_u32(0);
    }
    w.write_7bit(0);
    w.write_7bit(1);
    root(&mut w);
    w.into_inner()
}

/// Uncompressed file around `body`.
fn xnb(target: u8, body: &[u8]) -> Vec<u8> {
    let mut out = b"XNB".to_vec();
    out.extend_from_slice(&[target, 5, 0]);
    out.extend_from_slice(&((10 + body.len()) as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// File whose payload is flagged `flags` and stored as `payload`.
fn compressed_xnb(flags: u8, payload: &[u8], raw_len: usize) -> Vec<u8> {
    let mut out = b"XNB".to_vec();
    out.extend_from_slice(&[b'w', 5, flags]);
    out.extend_from_slice(&((14 + payload.len()) as u32).to_le_bytes());
    out.extend_from_slice(&(raw_len as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// One LZX frame holding `raw` in a single uncompressed block.
///
/// Bit layout, 16-bit little-endian words read MSB first:
///   e8 flag (1) = 0, block type (3) = 3, size (24), 4 pad bits,
///   then R0..R2 as i32 LE and the raw bytes.
fn lzx_stored(raw: &[u8]) -> Vec<u8> {
    let size = raw.len() as u32;
    let hi = size >> 8;
    let lo = size & 0xFF;
    let word1 = (3 << 12) | (hi >> 4);
    let word2 = ((hi & 0xF) << 12) | (lo << 4);

    let mut frame = Vec::new();
    frame.extend_from_slice(&(word1 as u16).to_le_bytes());
    frame.extend_from_slice(&(word2 as u16).to_le_bytes());
    for _ in 0..3 {
        frame.extend_from_slice(&1i32.to_le_bytes());
    }
    frame.extend_from_slice(raw);

    let mut payload = vec![0xFF];
    payload.extend_from_slice(&(raw.len() as u16).to_be_bytes());
    payload.extend_from_slice(&(frame.len() as u16).to_be_bytes());
    payload.extend_from_slice(&frame);
    payload
}

fn dictionary_body() -> Vec<u8> {
    body(&[DICT_READER, STRING_READER, INT32_READER], |w| {
        w.write_u32(2);
        w.write_7bit(2);
        w.write_prefixed_string("apple").unwrap();
        w.write_i32(3);
        w.write_7bit(2);
        w.write_prefixed_string("pear").unwrap();
        w.write_i32(-1);
    })
}

fn dictionary_value() -> Value {
    Value::Map(vec![
        (Value::from("apple"), Value::Int(3)),
        (Value::from("pear"), Value::Int(-1)),
    ])
}

fn string_doc(target: char, text: &str) -> Document {
    Document {
        header: Header {
            target,
            ..Header::default()
        },
        readers: vec![ReaderEntry::new(STRING_READER, 0)],
        content: Value::from(text),
    }
}

fn unpack_file(file: &[u8]) -> xnb_core::Result<Document> {
    unpack(file, &builtin_registry(), &Lz4Codec)
}

fn pack_doc(doc: &Document) -> xnb_core::Result<Vec<u8>> {
    pack(doc, &builtin_registry(), &Lz4Codec)
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_uncompressed_roundtrip_is_byte_exact() {
    let file = xnb(b'w', &dictionary_body());
    let doc = unpack_file(&file).unwrap();

    assert_eq!(doc.header.target, 'w');
    assert_eq!(doc.header.format_version, 5);
    assert!(!doc.header.compressed);
    assert_eq!(doc.readers.len(), 3);
    assert_eq!(doc.readers[0].type_name, DICT_READER);
    assert_eq!(doc.content, dictionary_value());

    assert_eq!(pack_doc(&doc).unwrap(), file, "repacked file should match the original");
}

#[test]
fn test_lz4_targets_are_compressed() {
    let text = "a long line of text ".repeat(20);
    let doc = string_doc('a', &text);
    let file = pack_doc(&doc).unwrap();

    assert_eq!(&file[..3], b"XNB");
    assert_eq!(file[5], FLAG_LZ4);
    assert_eq!(u32::from_le_bytes(file[6..10].try_into().unwrap()) as usize, file.len());
    let raw_len = u32::from_le_bytes(file[10..14].try_into().unwrap()) as usize;
    assert!(file.len() - 14 < raw_len, "payload should shrink");

    let back = unpack_file(&file).unwrap();
    assert!(back.header.compressed);
    assert_eq!(back.content, Value::from(text.as_str()));
    assert_eq!(pack_doc(&back).unwrap(), file);
}

#[test]
fn test_hidef_and_lz4_flags_combine() {
    let mut doc = string_doc('i', "x");
    doc.header.hidef = true;
    let file = pack_doc(&doc).unwrap();
    assert_eq!(file[5], FLAG_LZ4 | 0x01);
    assert!(unpack_file(&file).unwrap().header.hidef);
}

#[test]
fn test_desktop_targets_are_uncompressed() {
    for target in ['w', 'x', 'm'] {
        let mut doc = string_doc(target, "plain");
        doc.header.compressed = true;
        let file = pack_doc(&doc).unwrap();
        assert_eq!(file[5], 0);
        assert_eq!(u32::from_le_bytes(file[6..10].try_into().unwrap()) as usize, file.len());
        assert_eq!(unpack_file(&file).unwrap().content, Value::from("plain"));
    }
}

#[test]
fn test_lzx_payload_unpacks() {
    let raw = dictionary_body();
    let file = compressed_xnb(FLAG_LZX, &lzx_stored(&raw), raw.len());

    let doc = unpack_file(&file).unwrap();
    assert!(doc.header.compressed);
    assert_eq!(doc.content, dictionary_value());

    // Repacking a desktop file drops the compression.
    let repacked = pack_doc(&doc).unwrap();
    assert_eq!(repacked, xnb(b'w', &raw));
}

#[test]
fn test_lzx_takes_precedence_over_lz4_flag() {
    let raw = dictionary_body();
    let file = compressed_xnb(FLAG_LZX | FLAG_LZ4, &lzx_stored(&raw), raw.len());
    assert_eq!(unpack_file(&file).unwrap().content, dictionary_value());
}

#[test]
fn test_declared_size_must_match() {
    let mut file = xnb(b'w', &dictionary_body());
    file.push(0);
    let err = unpack_file(&file).unwrap_err();
    assert!(matches!(err, XnbError::Truncated { actual, .. } if actual == file.len() as u64));
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut file = xnb(b'w', &dictionary_body());
    file[0] = b'Y';
    assert!(matches!(unpack_file(&file), Err(XnbError::BadMagic(m)) if &m == b"YNB"));
}

#[test]
fn test_shared_resources_are_rejected() {
    let mut w = ByteWriter::new();
    w.write_7bit(1);
    w.write_prefixed_string(STRING_READER).unwrap();
    w.write_u32(0);
    w.write_7bit(2);
    let file = xnb(b'w', w.as_slice());
    assert!(matches!(unpack_file(&file), Err(XnbError::UnexpectedSharedResources(2))));
}

#[test]
fn test_unknown_reader_is_reported() {
    let file = xnb(b'w', &body(&["Game.Custom.LevelReader"], |_| {}));
    match unpack_file(&file) {
        Err(XnbError::UnknownReader(name)) => assert_eq!(name, "Game.Custom.LevelReader"),
        other => panic!("expected UnknownReader, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_reader_index() {
    let mut w = ByteWriter::new();
    w.write_7bit(1);
    w.write_prefixed_string(STRING_READER).unwrap();
    w.write_u32(0);
    w.write_7bit(0);
    w.write_7bit(4);
    let file = xnb(b'w', w.as_slice());
    assert!(matches!(
        unpack_file(&file),
        Err(XnbError::InvalidReaderIndex { index: 3, count: 1 })
    ));
}

#[test]
fn test_polymorphic_list_elements_carry_an_index() {
    let file = xnb(
        b'w',
        &body(&[LIST_STRING_READER, STRING_READER], |w| {
            w.write_u32(3);
            w.write_7bit(2);
            w.write_prefixed_string("a").unwrap();
            // Null reference.
            w.write_7bit(0);
            w.write_7bit(2);
            w.write_prefixed_string("c").unwrap();
        }),
    );
    let doc = unpack_file(&file).unwrap();
    assert_eq!(
        doc.content,
        Value::List(vec![Value::from("a"), Value::Null, Value::from("c")])
    );
    assert_eq!(pack_doc(&doc).unwrap(), file);
}

#[test]
fn test_value_list_elements_carry_no_index() {
    let file = xnb(
        b'w',
        &body(&[LIST_INT_READER, INT32_READER], |w| {
            w.write_u32(2);
            w.write_i32(7);
            w.write_i32(8);
        }),
    );
    let doc = unpack_file(&file).unwrap();
    assert_eq!(doc.content, Value::List(vec![Value::Int(7), Value::Int(8)]));

    let packed = pack_doc(&doc).unwrap();
    assert_eq!(packed.len(), file.len());
    assert_eq!(packed, file);
}

#[test]
fn test_element_reader_type_is_checked() {
    let file = xnb(
        b'w',
        &body(&[LIST_STRING_READER, STRING_READER, INT32_READER], |w| {
            w.write_u32(1);
            // Points at Int32Reader where a StringReader is required.
            w.write_7bit(3);
            w.write_i32(1);
        }),
    );
    assert!(matches!(unpack_file(&file), Err(XnbError::ReaderTypeMismatch { .. })));
}

#[test]
fn test_root_reader_can_be_required() {
    let file = xnb(
        b'w',
        &body(&[STRING_READER], |w| w.write_prefixed_string("hello").unwrap()),
    );
    let registry = builtin_registry();

    let err = unpack_expecting(&file, &registry, &Lz4Codec, &Texture2DCodec::new()).unwrap_err();
    match err {
        XnbError::ReaderTypeMismatch { expected, found } => {
            assert_eq!(expected, "Microsoft.Xna.Framework.Content.Texture2DReader");
            assert_eq!(found, STRING_READER);
        }
        other => panic!("expected ReaderTypeMismatch, got {other:?}"),
    }

    let doc = unpack_expecting(&file, &registry, &Lz4Codec, &PrimitiveCodec::new(Primitive::String)).unwrap();
    assert_eq!(doc.content, Value::from("hello"));
}

#[test]
fn test_upper_case_target_is_normalised() {
    let file = xnb(b'A', &body(&[INT32_READER], |w| w.write_i32(7)));
    let doc = unpack_file(&file).unwrap();
    assert_eq!(doc.header.target, 'a');

    let packed = pack_doc(&doc).unwrap();
    assert_eq!(packed[3], b'a');
    assert_eq!(packed[5] & FLAG_LZ4, FLAG_LZ4);
    assert_eq!(unpack_file(&packed).unwrap().content, Value::Int(7));

    let mut upper = doc.clone();
    upper.header.target = 'I';
    let packed = pack_doc(&upper).unwrap();
    assert_eq!(packed[3], b'i');
    assert_eq!(packed[5] & FLAG_LZ4, FLAG_LZ4);
}

#[test]
fn test_deeply_nested_types_are_rejected() {
    let mut name = String::from("System.Int32");
    for _ in 0..40 {
        name = format!("System.Collections.Generic.List`1[[{name}]]");
    }
    let file = xnb(b'w', &body(&[&name], |_| {}));
    assert!(matches!(unpack_file(&file), Err(XnbError::TypeTooDeep(_))));
}

#[test]
fn test_document_survives_json() {
    let doc = unpack_file(&xnb(b'w', &dictionary_body())).unwrap();
    let registry = builtin_registry();
    let mut files = MemorySideFiles::new();

    let exported = doc.export(&registry, &mut files).unwrap();
    assert!(files.is_empty());
    let text = serde_json::to_string_pretty(&exported).unwrap();
    assert!(text.contains("\"formatVersion\": 5"));
    assert!(text.contains("\"apple\": 3"));

    let parsed: xnb_core::JsonDocument = serde_json::from_str(&text).unwrap();
    let imported = parsed.import(&registry, &mut files).unwrap();
    assert_eq!(imported, doc);
}
