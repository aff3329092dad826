// SPDX-License-Identifier: Apache-2.0
//! B-form document model: header, chunk stream, and the encode/decode entry
//! points that tie the chunk (§4.B), value (§4.C), and scene (§4.F) layers
//! together (§4.D).

use std::collections::BTreeMap;

use rbx_model::{Diagnostics, Instance, InstanceHandle, Scene, TypeId, Value, WarningKind};
use thiserror::Error;
use tracing::{debug, warn};

use crate::chunk::{read_chunk, write_chunk, ChunkError, RawChunk};
use crate::stream::{ByteReader, ByteWriter};
use crate::value::{decode_array, decode_reference_ids, encode_array, encode_reference_ids, ValueError};

const MAGIC: &[u8; 14] = b"<roblox!\x89\xff\r\n\x1a\n";
const SIG_INST: [u8; 4] = *b"INST";
const SIG_PROP: [u8; 4] = *b"PROP";
const SIG_PRNT: [u8; 4] = *b"PRNT";
const SIG_END: [u8; 4] = *b"END\0";
const END_PAYLOAD: &[u8] = b"</roblox>";

/// Errors that can occur decoding or encoding a B-form document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BformError {
    /// Magic bytes didn't match, or `version` was nonzero.
    #[error("corrupt header: {0}")]
    CorruptHeader(String),
    /// The stream ended before a complete header, chunk, or chunk field was
    /// read.
    #[error("truncated stream")]
    Truncated,
    /// LZ4 chunk framing failed.
    #[error("bad chunk framing: {0}")]
    BadChunkFraming(String),
    /// A `PROP` chunk's `data_type` byte named no known kind.
    #[error("unknown data type {0} in PROP chunk")]
    UnknownDataType(u8),
    /// A `PROP` or `PRNT` chunk referenced a `group_id` with no prior `INST`.
    #[error("PROP or PRNT chunk referenced unknown group {0}")]
    UnknownGroup(u32),
    /// The scene's parent graph contains a cycle; refused at encode time
    /// (§7 item 10).
    #[error("parent graph contains a cycle")]
    Cycle,
}

impl From<ChunkError> for BformError {
    fn from(e: ChunkError) -> Self {
        match e {
            ChunkError::Truncated => Self::Truncated,
            ChunkError::Lz4(msg) => Self::BadChunkFraming(msg),
        }
    }
}

impl From<ValueError> for BformError {
    fn from(e: ValueError) -> Self {
        match e {
            ValueError::UnknownTypeId(id) => Self::UnknownDataType(id),
            ValueError::Truncated { .. } => Self::Truncated,
        }
    }
}

/// A decoded B-form document: the logical scene plus the opaque `PRNT`
/// version byte, which current consumers ignore but which must round-trip
/// unchanged (§9).
#[derive(Debug, Default)]
pub struct BformDocument {
    /// The decoded (or to-be-encoded) scene.
    pub scene: Scene,
    /// Opaque `PRNT.version` byte, preserved verbatim across decode/encode.
    pub prnt_version: u8,
}

struct Group {
    handles: Vec<InstanceHandle>,
}

/// Decode a complete B-form byte stream.
///
/// # Errors
///
/// Returns [`BformError`] on a corrupt header, truncated stream, bad chunk
/// framing, unknown `PROP` data type, or a `PROP`/`PRNT` chunk referencing an
/// undeclared group.
pub fn decode(bytes: &[u8]) -> Result<(BformDocument, Diagnostics), BformError> {
    let mut diagnostics = Diagnostics::new();
    let mut reader = ByteReader::new(bytes);

    let magic = reader.read_bytes(MAGIC.len());
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    if magic != MAGIC.as_slice() {
        return Err(BformError::CorruptHeader("bad magic".to_string()));
    }
    let version = reader.read_u16();
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    if version != 0 {
        return Err(BformError::CorruptHeader(format!("unsupported version {version}")));
    }
    let _group_count = reader.read_u32();
    let _instance_count = reader.read_u32();
    let reserved = reader.read_u64();
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    if reserved != 0 {
        diagnostics.push(WarningKind::ReservedFieldNonZero, "header reserved".to_string());
    }

    let mut scene = Scene::new();
    let mut groups: BTreeMap<u32, Group> = BTreeMap::new();
    let mut id_to_handle: BTreeMap<i32, InstanceHandle> = BTreeMap::new();
    let mut prnt_version = 0u8;

    loop {
        if reader.remaining() == 0 {
            break;
        }
        let chunk = read_chunk(&mut reader, &mut diagnostics)?;
        match chunk.sig {
            SIG_INST => decode_inst(&chunk, &mut scene, &mut groups, &mut id_to_handle)?,
            SIG_PROP => decode_prop(&chunk, &groups, &id_to_handle, &mut scene)?,
            SIG_PRNT => {
                prnt_version = decode_prnt(&chunk, &id_to_handle, &mut scene)?;
            }
            SIG_END => {
                if chunk.payload != END_PAYLOAD {
                    warn!(payload_len = chunk.payload.len(), "END chunk payload does not match the documented trailer");
                    diagnostics.push(WarningKind::NonconformingTrailer, "END payload".to_string());
                }
                break;
            }
            other => {
                let label = sig_label(other);
                warn!(signature = %label, "skipping unknown chunk signature");
                diagnostics.push(WarningKind::UnknownChunkSignature, label);
            }
        }
    }

    debug!(instance_count = scene.len(), warning_count = diagnostics.warnings().len(), "decoded B-form document");
    Ok((BformDocument { scene, prnt_version }, diagnostics))
}

fn sig_label(sig: [u8; 4]) -> String {
    String::from_utf8_lossy(&sig).trim_end_matches('\0').to_string()
}

fn decode_inst(
    chunk: &RawChunk,
    scene: &mut Scene,
    groups: &mut BTreeMap<u32, Group>,
    id_to_handle: &mut BTreeMap<i32, InstanceHandle>,
) -> Result<(), BformError> {
    let mut reader = ByteReader::new(&chunk.payload);
    let group_id = reader.read_u32();
    let class_name = String::from_utf8_lossy(&reader.read_prefixed_string()).into_owned();
    let is_service = reader.read_u8();
    let array_len = reader.read_u32() as usize;
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }

    let ref_bytes = reader.read_bytes(array_len * 4);
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    let ids = decode_reference_ids(ref_bytes, array_len)?;

    if is_service != 0 {
        reader.read_bytes(array_len); // get_service_flags; not part of the logical model
        if reader.error().is_some() {
            return Err(BformError::Truncated);
        }
    }

    let mut handles = Vec::with_capacity(array_len);
    for &id in &ids {
        let handle = scene.insert_root(Instance::new(class_name.clone(), String::new()));
        id_to_handle.insert(id, handle);
        handles.push(handle);
    }
    groups.insert(group_id, Group { handles });
    Ok(())
}

fn decode_prop(
    chunk: &RawChunk,
    groups: &BTreeMap<u32, Group>,
    id_to_handle: &BTreeMap<i32, InstanceHandle>,
    scene: &mut Scene,
) -> Result<(), BformError> {
    let mut reader = ByteReader::new(&chunk.payload);
    let group_id = reader.read_u32();
    let property_name = String::from_utf8_lossy(&reader.read_prefixed_string()).into_owned();
    let data_type = reader.read_u8();
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    let payload = reader.read_bytes(reader.remaining());

    let group = groups.get(&group_id).ok_or(BformError::UnknownGroup(group_id))?;
    let count = group.handles.len();

    if data_type == TypeId::Reference as u8 {
        let ids = decode_reference_ids(payload, count)?;
        for (&handle, id) in group.handles.iter().zip(ids) {
            let target = if id < 0 { None } else { id_to_handle.get(&id).copied() };
            if let Some(instance) = scene.get_mut(handle) {
                instance.properties.insert(property_name.clone(), Value::Reference(target));
            }
        }
        return Ok(());
    }

    let values = decode_array(data_type, count, payload)?;
    for (&handle, value) in group.handles.iter().zip(values) {
        if let Some(instance) = scene.get_mut(handle) {
            instance.properties.insert(property_name.clone(), value);
        }
    }
    Ok(())
}

fn decode_prnt(
    chunk: &RawChunk,
    id_to_handle: &BTreeMap<i32, InstanceHandle>,
    scene: &mut Scene,
) -> Result<u8, BformError> {
    let mut reader = ByteReader::new(&chunk.payload);
    let version = reader.read_u8();
    let count = reader.read_u32() as usize;
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    let children_bytes = reader.read_bytes(count * 4);
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    let children = decode_reference_ids(children_bytes, count)?;
    let parents_bytes = reader.read_bytes(count * 4);
    if reader.error().is_some() {
        return Err(BformError::Truncated);
    }
    let parents = decode_reference_ids(parents_bytes, count)?;

    for (child_id, parent_id) in children.into_iter().zip(parents) {
        let Some(&child) = id_to_handle.get(&child_id) else { continue };
        let parent = if parent_id < 0 { None } else { id_to_handle.get(&parent_id).copied() };
        // decode-time reparenting can't cycle: PRNT only ever moves a
        // decode-fresh root to another decode-fresh root or to another
        // instance's children, and scene.set_parent already rejects
        // self/descendant targets; a malformed file just leaves it a root.
        let _ = scene.set_parent(child, parent);
    }
    Ok(version)
}

/// Encode a scene as a complete B-form byte stream.
///
/// Groups instances by class name (first-seen order), assigns dense
/// scene-local ids in group-emit order, and emits `INST`, then `PROP` chunks
/// sorted by `(group_id, property_name)`, then `PRNT`, then `END` (§4.D
/// Encoding policy). `compress` controls whether chunk payloads are LZ4
/// compressed.
///
/// # Errors
///
/// Returns [`BformError::Cycle`] if the scene's parent graph contains a
/// cycle.
pub fn encode(doc: &BformDocument, compress: bool) -> Result<Vec<u8>, BformError> {
    if doc.scene.has_cycle() {
        return Err(BformError::Cycle);
    }
    debug!(instance_count = doc.scene.len(), compress, "encoding B-form document");

    let mut class_order: Vec<String> = Vec::new();
    let mut by_class: BTreeMap<String, Vec<InstanceHandle>> = BTreeMap::new();
    for handle in doc.scene.handles() {
        let Some(instance) = doc.scene.get(handle) else { continue };
        let class_name = instance.class_name.clone();
        let entry = by_class.entry(class_name.clone()).or_insert_with(|| {
            class_order.push(class_name);
            Vec::new()
        });
        entry.push(handle);
    }

    let mut handle_to_id: BTreeMap<InstanceHandle, i32> = BTreeMap::new();
    let mut next_id = 0i32;
    let mut groups: Vec<(u32, String, Vec<InstanceHandle>)> = Vec::new();
    for (group_id, class_name) in class_order.into_iter().enumerate() {
        let handles = by_class.remove(&class_name).unwrap_or_default();
        for &handle in &handles {
            handle_to_id.insert(handle, next_id);
            next_id += 1;
        }
        #[allow(clippy::cast_possible_truncation)]
        groups.push((group_id as u32, class_name, handles));
    }

    let mut writer = ByteWriter::new();
    writer.write_bytes(MAGIC);
    writer.write_u16(0);
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32(groups.len() as u32);
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32(doc.scene.len() as u32);
    writer.write_u64(0);

    for (group_id, class_name, handles) in &groups {
        encode_inst_chunk(&mut writer, *group_id, class_name, handles, &handle_to_id, compress);
    }
    for (group_id, _, handles) in &groups {
        encode_prop_chunks(&mut writer, *group_id, handles, &doc.scene, &handle_to_id, compress);
    }
    encode_prnt_chunk(&mut writer, doc, &handle_to_id, compress);

    write_chunk(
        &mut writer,
        &RawChunk { sig: SIG_END, payload: END_PAYLOAD.to_vec() },
        false,
    );

    Ok(writer.into_bytes())
}

fn encode_inst_chunk(
    writer: &mut ByteWriter,
    group_id: u32,
    class_name: &str,
    handles: &[InstanceHandle],
    handle_to_id: &BTreeMap<InstanceHandle, i32>,
    compress: bool,
) {
    let mut body = ByteWriter::new();
    body.write_u32(group_id);
    body.write_prefixed_string(class_name.as_bytes());
    body.write_u8(0); // is_service: not represented in the logical model
    #[allow(clippy::cast_possible_truncation)]
    body.write_u32(handles.len() as u32);
    let ids: Vec<i32> = handles.iter().map(|h| handle_to_id[h]).collect();
    body.write_bytes(&encode_reference_ids(&ids));
    write_chunk(writer, &RawChunk { sig: SIG_INST, payload: body.into_bytes() }, compress);
}

fn encode_prop_chunks(
    writer: &mut ByteWriter,
    group_id: u32,
    handles: &[InstanceHandle],
    scene: &Scene,
    handle_to_id: &BTreeMap<InstanceHandle, i32>,
    compress: bool,
) {
    let mut names: Vec<String> = Vec::new();
    for &handle in handles {
        if let Some(instance) = scene.get(handle) {
            for name in instance.properties.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
    }
    names.sort();

    for name in names {
        let Some(column) = gather_homogeneous_column(scene, handles, &name) else { continue };
        let mut body = ByteWriter::new();
        body.write_u32(group_id);
        body.write_prefixed_string(name.as_bytes());
        let type_id = column[0].type_id() as u8;
        body.write_u8(type_id);
        if type_id == TypeId::Reference as u8 {
            let ids: Vec<i32> = column
                .iter()
                .map(|v| match v {
                    Value::Reference(Some(h)) => *handle_to_id.get(h).unwrap_or(&-1),
                    _ => -1,
                })
                .collect();
            body.write_bytes(&encode_reference_ids(&ids));
        } else {
            body.write_bytes(&encode_array(&column));
        }
        write_chunk(writer, &RawChunk { sig: SIG_PROP, payload: body.into_bytes() }, compress);
    }
}

/// Collect `name`'s value for every instance in `handles`, only when every
/// instance has it and all share one [`TypeId`] — a `PROP` column must be
/// homogeneous. Groups that fail this are silently skipped (documented
/// encoder policy, since the format has no per-element type tag).
fn gather_homogeneous_column(scene: &Scene, handles: &[InstanceHandle], name: &str) -> Option<Vec<Value>> {
    let mut column = Vec::with_capacity(handles.len());
    for &handle in handles {
        let value = scene.get(handle)?.properties.get(name)?.clone();
        column.push(value);
    }
    let first_type = column.first()?.type_id();
    if column.iter().all(|v| v.type_id() == first_type) {
        Some(column)
    } else {
        None
    }
}

fn encode_prnt_chunk(
    writer: &mut ByteWriter,
    doc: &BformDocument,
    handle_to_id: &BTreeMap<InstanceHandle, i32>,
    compress: bool,
) {
    let mut body = ByteWriter::new();
    body.write_u8(doc.prnt_version);
    #[allow(clippy::cast_possible_truncation)]
    body.write_u32(doc.scene.len() as u32);
    let children: Vec<i32> = doc.scene.handles().map(|h| handle_to_id[&h]).collect();
    let parents: Vec<i32> = doc
        .scene
        .handles()
        .map(|h| doc.scene.get(h).and_then(Instance::parent).map_or(-1, |p| handle_to_id[&p]))
        .collect();
    body.write_bytes(&encode_reference_ids(&children));
    body.write_bytes(&encode_reference_ids(&parents));
    write_chunk(writer, &RawChunk { sig: SIG_PRNT, payload: body.into_bytes() }, compress);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbx_model::{Value, Vector3};

    #[test]
    fn empty_scene_roundtrip() {
        let doc = BformDocument::default();
        let bytes = encode(&doc, false).unwrap();
        let (decoded, diagnostics) = decode(&bytes).unwrap();
        assert!(decoded.scene.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn single_part_roundtrip() {
        let mut scene = Scene::new();
        let mut part = Instance::new("Part", "");
        part.properties.insert("Name".to_string(), Value::String(b"P".to_vec()));
        part.properties.insert("Size".to_string(), Value::Vector3(Vector3 { x: 4.0, y: 1.0, z: 2.0 }));
        scene.insert_root(part);
        let doc = BformDocument { scene, prnt_version: 0 };

        let bytes = encode(&doc, false).unwrap();
        let (decoded, diagnostics) = decode(&bytes).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(decoded.scene.len(), 1);
        let handle = decoded.scene.handles().next().unwrap();
        let instance = decoded.scene.get(handle).unwrap();
        assert_eq!(instance.class_name, "Part");
        assert_eq!(instance.properties.get("Name"), Some(&Value::String(b"P".to_vec())));
        assert_eq!(
            instance.properties.get("Size"),
            Some(&Value::Vector3(Vector3 { x: 4.0, y: 1.0, z: 2.0 }))
        );
        assert_eq!(decoded.scene.get(handle).unwrap().parent(), None);
    }

    #[test]
    fn reference_property_roundtrips_through_dense_ids() {
        let mut scene = Scene::new();
        let a = scene.insert_root(Instance::new("Part", ""));
        let b = scene.insert_root(Instance::new("Part", ""));
        scene.get_mut(a).unwrap().properties.insert("Target".to_string(), Value::Reference(Some(b)));
        let doc = BformDocument { scene, prnt_version: 0 };

        let bytes = encode(&doc, true).unwrap();
        let (decoded, _) = decode(&bytes).unwrap();
        let handles: Vec<_> = decoded.scene.handles().collect();
        let resolved = decoded.scene.get(handles[0]).unwrap().properties.get("Target").unwrap();
        assert_eq!(resolved, &Value::Reference(Some(handles[1])));
    }

    #[test]
    fn parent_relation_roundtrips() {
        let mut scene = Scene::new();
        let parent = scene.insert_root(Instance::new("Model", ""));
        let child = scene.insert_child(parent, Instance::new("Part", "")).unwrap();
        let doc = BformDocument { scene, prnt_version: 7 };

        let bytes = encode(&doc, false).unwrap();
        let (decoded, _) = decode(&bytes).unwrap();
        assert_eq!(decoded.prnt_version, 7);
        let handles: Vec<_> = decoded.scene.handles().collect();
        assert_eq!(decoded.scene.roots(), &[handles[0]]);
        assert_eq!(decoded.scene.get(handles[1]).unwrap().parent(), Some(handles[0]));
        let _ = child;
    }

    #[test]
    fn corrupt_magic_is_rejected() {
        let mut doc = BformDocument::default();
        doc.scene.insert_root(Instance::new("Part", ""));
        let mut bytes = encode(&doc, false).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(BformError::CorruptHeader(_))));
    }

    #[test]
    fn compressed_and_uncompressed_encodings_decode_equal() {
        let mut scene = Scene::new();
        let mut part = Instance::new("Part", "");
        part.properties.insert("Name".to_string(), Value::String(b"hi".to_vec()));
        scene.insert_root(part);
        let doc = BformDocument { scene, prnt_version: 0 };

        let compressed = decode(&encode(&doc, true).unwrap()).unwrap().0;
        let uncompressed = decode(&encode(&doc, false).unwrap()).unwrap().0;
        let ch = compressed.scene.handles().next().unwrap();
        let uh = uncompressed.scene.handles().next().unwrap();
        assert_eq!(compressed.scene.get(ch).unwrap().properties, uncompressed.scene.get(uh).unwrap().properties);
    }

    #[test]
    fn heterogeneous_property_types_in_a_group_are_dropped_not_corrupted() {
        let mut scene = Scene::new();
        let mut a = Instance::new("Part", "");
        a.properties.insert("X".to_string(), Value::Int(1));
        let mut b = Instance::new("Part", "");
        b.properties.insert("X".to_string(), Value::String(b"oops".to_vec()));
        scene.insert_root(a);
        scene.insert_root(b);
        let doc = BformDocument { scene, prnt_version: 0 };

        let bytes = encode(&doc, false).unwrap();
        let (decoded, _) = decode(&bytes).unwrap();
        for handle in decoded.scene.handles() {
            assert!(decoded.scene.get(handle).unwrap().properties.get("X").is_none());
        }
    }
}
