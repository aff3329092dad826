// SPDX-License-Identifier: Apache-2.0
//! Columnar binary encoding for every [`rbx_model::Value`] kind (§4.C).
//!
//! Arrays of values are written struct-of-arrays: each numeric field gets its
//! own column, transformed (zig-zag / float-rotate / delta, per field) and
//! then byte-interleaved via [`crate::transform`]. Strings and binary blobs
//! are not columnar — they're written length-prefixed, element by element.

use rbx_model::{CFrame, Color3, Content, ContentKind, Ray, TypeId, UDim, UDim2, Value, Vector2, Vector2int16, Vector3, Vector3int16};
use thiserror::Error;

use crate::cframe::{rotation_for_tag, tag_for_rotation};
use crate::stream::{ByteReader, ByteWriter};
use crate::transform::{deinterleave_bytes, delta_decode, delta_encode, float32_rotate_left, float32_rotate_right, interleave_bytes, zigzag_decode, zigzag_encode};

/// Errors decoding a columnar value array.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The type-id byte read from a `PROP` chunk did not name a known kind.
    #[error("unknown data type id {0}")]
    UnknownTypeId(u8),
    /// The column's length did not match the declared element count.
    #[error("truncated value column: expected {expected} elements worth of data")]
    Truncated {
        /// Elements the column should have held.
        expected: usize,
    },
}

fn f32_column(values: impl Iterator<Item = f32> + ExactSizeIterator) -> Vec<u8> {
    let count = values.len();
    let raw: Vec<u8> = values.flat_map(|v| float32_rotate_left(v).to_le_bytes()).collect();
    interleave_bytes(4, count, &raw)
}

fn read_f32_column(bytes: &[u8], count: usize) -> Result<Vec<f32>, ValueError> {
    if bytes.len() != count * 4 {
        return Err(ValueError::Truncated { expected: count });
    }
    let raw = deinterleave_bytes(4, count, bytes);
    Ok(raw.chunks_exact(4).map(|c| float32_rotate_right(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))).collect())
}

fn i32_zigzag_column(values: impl Iterator<Item = i32> + ExactSizeIterator) -> Vec<u8> {
    let count = values.len();
    let raw: Vec<u8> = values.flat_map(|v| zigzag_encode(v).to_le_bytes()).collect();
    interleave_bytes(4, count, &raw)
}

fn read_i32_zigzag_column(bytes: &[u8], count: usize) -> Result<Vec<i32>, ValueError> {
    if bytes.len() != count * 4 {
        return Err(ValueError::Truncated { expected: count });
    }
    let raw = deinterleave_bytes(4, count, bytes);
    Ok(raw.chunks_exact(4).map(|c| zigzag_decode(u32::from_le_bytes([c[0], c[1], c[2], c[3]]))).collect())
}

fn u32_raw_column(values: impl Iterator<Item = u32> + ExactSizeIterator) -> Vec<u8> {
    let count = values.len();
    let raw: Vec<u8> = values.flat_map(u32::to_le_bytes).collect();
    interleave_bytes(4, count, &raw)
}

fn read_u32_raw_column(bytes: &[u8], count: usize) -> Result<Vec<u32>, ValueError> {
    if bytes.len() != count * 4 {
        return Err(ValueError::Truncated { expected: count });
    }
    let raw = deinterleave_bytes(4, count, bytes);
    Ok(raw.chunks_exact(4).map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
}

fn f64_raw_column(values: impl Iterator<Item = f64> + ExactSizeIterator) -> Vec<u8> {
    let count = values.len();
    let raw: Vec<u8> = values.flat_map(f64::to_le_bytes).collect();
    interleave_bytes(8, count, &raw)
}

fn read_f64_raw_column(bytes: &[u8], count: usize) -> Result<Vec<f64>, ValueError> {
    if bytes.len() != count * 8 {
        return Err(ValueError::Truncated { expected: count });
    }
    let raw = deinterleave_bytes(8, count, bytes);
    Ok(raw.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap_or([0; 8]))).collect())
}

fn i16_raw_column(values: impl Iterator<Item = i16> + ExactSizeIterator) -> Vec<u8> {
    let count = values.len();
    let raw: Vec<u8> = values.flat_map(|v| v.to_le_bytes()).collect();
    interleave_bytes(2, count, &raw)
}

fn read_i16_raw_column(bytes: &[u8], count: usize) -> Result<Vec<i16>, ValueError> {
    if bytes.len() != count * 2 {
        return Err(ValueError::Truncated { expected: count });
    }
    let raw = deinterleave_bytes(2, count, bytes);
    Ok(raw.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect())
}

fn u8_column(values: impl Iterator<Item = u8>) -> Vec<u8> {
    values.collect()
}

fn reference_column(values: &[i32]) -> Vec<u8> {
    let zigzagged: Vec<i32> = values.iter().map(|&v| zigzag_encode(v) as i32).collect();
    let deltas = delta_encode(&zigzagged);
    i32_zigzag_column_raw(&deltas)
}

/// Writes already-zig-zagged-and-delta'd i32s as a raw (no further zig-zag)
/// interleaved column — the reference-array encoding applies zig-zag once,
/// before deltas, not again here.
fn i32_zigzag_column_raw(values: &[i32]) -> Vec<u8> {
    let count = values.len();
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    interleave_bytes(4, count, &raw)
}

fn read_reference_column(bytes: &[u8], count: usize) -> Result<Vec<i32>, ValueError> {
    if bytes.len() != count * 4 {
        return Err(ValueError::Truncated { expected: count });
    }
    let raw = deinterleave_bytes(4, count, bytes);
    let deltas: Vec<i32> = raw.chunks_exact(4).map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect();
    let zigzagged = delta_decode(&deltas);
    Ok(zigzagged.into_iter().map(|z| zigzag_decode(z as u32)).collect())
}

fn write_bytes_array(out: &mut ByteWriter, values: &[Vec<u8>]) {
    for v in values {
        out.write_prefixed_string(v);
    }
}

fn read_bytes_array(reader: &mut ByteReader<'_>, count: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| reader.read_prefixed_string()).collect()
}

/// Encode a homogeneous array of [`Value`]s as a `PROP` column payload.
///
/// `values` must all share one [`TypeId`]; callers (the B-form chunk writer)
/// guarantee this since a `PROP` chunk declares a single `data_type`.
#[must_use]
pub fn encode_array(values: &[Value]) -> Vec<u8> {
    let Some(first) = values.first() else { return Vec::new() };
    match first.type_id() {
        TypeId::String | TypeId::ProtectedString | TypeId::BinaryString => {
            let mut out = ByteWriter::new();
            let bytes: Vec<Vec<u8>> = values
                .iter()
                .map(|v| match v {
                    Value::String(b) | Value::ProtectedString(b) | Value::BinaryString(b) => b.clone(),
                    _ => Vec::new(),
                })
                .collect();
            write_bytes_array(&mut out, &bytes);
            out.into_bytes()
        }
        TypeId::Bool => u8_column(values.iter().map(|v| matches!(v, Value::Bool(true)) as u8)),
        TypeId::Int => i32_zigzag_column(values.iter().map(|v| match v { Value::Int(n) => *n, _ => 0 })),
        TypeId::Float => f32_column(values.iter().map(|v| match v { Value::Float(f) => *f, _ => 0.0 })),
        TypeId::Double => f64_raw_column(values.iter().map(|v| match v { Value::Double(d) => *d, _ => 0.0 })),
        TypeId::UDim => encode_udim_array(values),
        TypeId::UDim2 => encode_udim2_array(values),
        TypeId::Ray => encode_ray_array(values),
        TypeId::Faces => u8_column(values.iter().map(|v| match v { Value::Faces(b) => *b, _ => 0 })),
        TypeId::Axes => u8_column(values.iter().map(|v| match v { Value::Axes(b) => *b, _ => 0 })),
        TypeId::BrickColor => i32_zigzag_column(values.iter().map(|v| match v { Value::BrickColor(c) => *c as i32, _ => 0 })),
        TypeId::Color3 => encode_color3_array(values),
        TypeId::Vector2 => encode_vector2_array(values),
        TypeId::Vector3 => encode_vector3_array(values),
        TypeId::CFrame => encode_cframe_array(values),
        TypeId::Vector2int16 => encode_vector2int16_array(values),
        TypeId::Vector3int16 => encode_vector3int16_array(values),
        TypeId::Token => u32_raw_column(values.iter().map(|v| match v { Value::Token(t) => *t, _ => 0 })),
        TypeId::Reference => {
            let ids: Vec<i32> = values
                .iter()
                .map(|v| match v {
                    Value::Reference(r) => r.map_or(-1, |_| 0),
                    _ => -1,
                })
                .collect();
            // Actual instance-id resolution happens one layer up (bform.rs),
            // where handles are mapped to dense scene-local ids before this
            // function is called; this path only covers the all-null case
            // used by direct unit tests of the value codec in isolation.
            reference_column(&ids)
        }
        TypeId::Content => encode_content_array(values),
    }
}

/// Encode a reference array directly from resolved scene-local ids (`-1` for
/// the empty reference), bypassing [`Value::Reference`]'s handle indirection.
/// This is what `rbx-binary::bform` actually calls for `INST`/`PRNT` columns.
#[must_use]
pub fn encode_reference_ids(ids: &[i32]) -> Vec<u8> {
    reference_column(ids)
}

/// Decode a reference column directly to scene-local ids.
///
/// # Errors
///
/// Returns [`ValueError::Truncated`] if `bytes` doesn't hold exactly `count`
/// interleaved `i32` elements.
pub fn decode_reference_ids(bytes: &[u8], count: usize) -> Result<Vec<i32>, ValueError> {
    read_reference_column(bytes, count)
}

/// Decode a `PROP` column payload of declared `type_id` and `count` elements.
///
/// # Errors
///
/// Returns [`ValueError::UnknownTypeId`] for an unrecognized byte, or
/// [`ValueError::Truncated`] if the payload doesn't hold exactly `count`
/// elements.
pub fn decode_array(type_id: u8, count: usize, bytes: &[u8]) -> Result<Vec<Value>, ValueError> {
    let type_id = TypeId::from_u8(type_id).ok_or(ValueError::UnknownTypeId(type_id))?;
    Ok(match type_id {
        TypeId::String => {
            let mut reader = ByteReader::new(bytes);
            read_bytes_array(&mut reader, count).into_iter().map(Value::String).collect()
        }
        TypeId::ProtectedString => {
            let mut reader = ByteReader::new(bytes);
            read_bytes_array(&mut reader, count).into_iter().map(Value::ProtectedString).collect()
        }
        TypeId::BinaryString => {
            let mut reader = ByteReader::new(bytes);
            read_bytes_array(&mut reader, count).into_iter().map(Value::BinaryString).collect()
        }
        TypeId::Bool => {
            if bytes.len() != count {
                return Err(ValueError::Truncated { expected: count });
            }
            bytes.iter().map(|&b| Value::Bool(b != 0)).collect()
        }
        TypeId::Int => read_i32_zigzag_column(bytes, count)?.into_iter().map(Value::Int).collect(),
        TypeId::Float => read_f32_column(bytes, count)?.into_iter().map(Value::Float).collect(),
        TypeId::Double => read_f64_raw_column(bytes, count)?.into_iter().map(Value::Double).collect(),
        TypeId::UDim => decode_udim_array(bytes, count)?,
        TypeId::UDim2 => decode_udim2_array(bytes, count)?,
        TypeId::Ray => decode_ray_array(bytes, count)?,
        TypeId::Faces => {
            if bytes.len() != count {
                return Err(ValueError::Truncated { expected: count });
            }
            bytes.iter().map(|&b| Value::Faces(b)).collect()
        }
        TypeId::Axes => {
            if bytes.len() != count {
                return Err(ValueError::Truncated { expected: count });
            }
            bytes.iter().map(|&b| Value::Axes(b)).collect()
        }
        TypeId::BrickColor => {
            read_i32_zigzag_column(bytes, count)?.into_iter().map(|n| Value::BrickColor(n as u32)).collect()
        }
        TypeId::Color3 => decode_color3_array(bytes, count)?,
        TypeId::Vector2 => decode_vector2_array(bytes, count)?,
        TypeId::Vector3 => decode_vector3_array(bytes, count)?,
        TypeId::CFrame => decode_cframe_array(bytes, count)?,
        TypeId::Vector2int16 => decode_vector2int16_array(bytes, count)?,
        TypeId::Vector3int16 => decode_vector3int16_array(bytes, count)?,
        TypeId::Token => read_u32_raw_column(bytes, count)?.into_iter().map(Value::Token).collect(),
        TypeId::Reference => {
            // See `encode_reference_ids`: the caller resolves ids to handles.
            read_reference_column(bytes, count)?.into_iter().map(|_| Value::Reference(None)).collect()
        }
        TypeId::Content => decode_content_array(bytes, count)?,
    })
}

fn encode_udim_array(values: &[Value]) -> Vec<u8> {
    let udims: Vec<UDim> = values.iter().map(|v| match v { Value::UDim(u) => *u, _ => UDim { scale: 0.0, offset: 0 } }).collect();
    let mut out = f32_column(udims.iter().map(|u| u.scale));
    out.extend(i32_zigzag_column(udims.iter().map(|u| u.offset)));
    out
}

fn decode_udim_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let (scale_bytes, offset_bytes) = split_at_checked(bytes, count * 4)?;
    let scales = read_f32_column(scale_bytes, count)?;
    let offsets = read_i32_zigzag_column(offset_bytes, count)?;
    Ok(scales.into_iter().zip(offsets).map(|(scale, offset)| Value::UDim(UDim { scale, offset })).collect())
}

fn encode_udim2_array(values: &[Value]) -> Vec<u8> {
    let pairs: Vec<UDim2> = values.iter().map(|v| match v { Value::UDim2(u) => *u, _ => UDim2 { x: UDim { scale: 0.0, offset: 0 }, y: UDim { scale: 0.0, offset: 0 } } }).collect();
    let mut out = f32_column(pairs.iter().map(|p| p.x.scale));
    out.extend(f32_column(pairs.iter().map(|p| p.y.scale)));
    out.extend(i32_zigzag_column(pairs.iter().map(|p| p.x.offset)));
    out.extend(i32_zigzag_column(pairs.iter().map(|p| p.y.offset)));
    out
}

fn decode_udim2_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 4;
    if bytes.len() != col * 4 {
        return Err(ValueError::Truncated { expected: count });
    }
    let x_scale = read_f32_column(&bytes[0..col], count)?;
    let y_scale = read_f32_column(&bytes[col..2 * col], count)?;
    let x_offset = read_i32_zigzag_column(&bytes[2 * col..3 * col], count)?;
    let y_offset = read_i32_zigzag_column(&bytes[3 * col..4 * col], count)?;
    Ok((0..count)
        .map(|i| {
            Value::UDim2(UDim2 {
                x: UDim { scale: x_scale[i], offset: x_offset[i] },
                y: UDim { scale: y_scale[i], offset: y_offset[i] },
            })
        })
        .collect())
}

fn encode_ray_array(values: &[Value]) -> Vec<u8> {
    let rays: Vec<Ray> = values.iter().map(|v| match v { Value::Ray(r) => *r, _ => Ray { origin: Vector3 { x: 0.0, y: 0.0, z: 0.0 }, direction: Vector3 { x: 0.0, y: 0.0, z: 0.0 } } }).collect();
    let mut out = f32_column(rays.iter().map(|r| r.origin.x));
    out.extend(f32_column(rays.iter().map(|r| r.origin.y)));
    out.extend(f32_column(rays.iter().map(|r| r.origin.z)));
    out.extend(f32_column(rays.iter().map(|r| r.direction.x)));
    out.extend(f32_column(rays.iter().map(|r| r.direction.y)));
    out.extend(f32_column(rays.iter().map(|r| r.direction.z)));
    out
}

fn decode_ray_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 4;
    if bytes.len() != col * 6 {
        return Err(ValueError::Truncated { expected: count });
    }
    let cols: Vec<Vec<f32>> = (0..6).map(|i| read_f32_column(&bytes[i * col..(i + 1) * col], count)).collect::<Result<_, _>>()?;
    Ok((0..count)
        .map(|i| {
            Value::Ray(Ray {
                origin: Vector3 { x: cols[0][i], y: cols[1][i], z: cols[2][i] },
                direction: Vector3 { x: cols[3][i], y: cols[4][i], z: cols[5][i] },
            })
        })
        .collect())
}

fn encode_color3_array(values: &[Value]) -> Vec<u8> {
    let colors: Vec<Color3> = values.iter().map(|v| match v { Value::Color3(c) => *c, _ => Color3 { r: 0.0, g: 0.0, b: 0.0 } }).collect();
    let mut out = f32_column(colors.iter().map(|c| c.r));
    out.extend(f32_column(colors.iter().map(|c| c.g)));
    out.extend(f32_column(colors.iter().map(|c| c.b)));
    out
}

fn decode_color3_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 4;
    if bytes.len() != col * 3 {
        return Err(ValueError::Truncated { expected: count });
    }
    let r = read_f32_column(&bytes[0..col], count)?;
    let g = read_f32_column(&bytes[col..2 * col], count)?;
    let b = read_f32_column(&bytes[2 * col..3 * col], count)?;
    Ok((0..count).map(|i| Value::Color3(Color3 { r: r[i], g: g[i], b: b[i] })).collect())
}

fn encode_vector2_array(values: &[Value]) -> Vec<u8> {
    let vecs: Vec<Vector2> = values.iter().map(|v| match v { Value::Vector2(v) => *v, _ => Vector2 { x: 0.0, y: 0.0 } }).collect();
    let mut out = f32_column(vecs.iter().map(|v| v.x));
    out.extend(f32_column(vecs.iter().map(|v| v.y)));
    out
}

fn decode_vector2_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 4;
    if bytes.len() != col * 2 {
        return Err(ValueError::Truncated { expected: count });
    }
    let x = read_f32_column(&bytes[0..col], count)?;
    let y = read_f32_column(&bytes[col..2 * col], count)?;
    Ok((0..count).map(|i| Value::Vector2(Vector2 { x: x[i], y: y[i] })).collect())
}

fn encode_vector3_array(values: &[Value]) -> Vec<u8> {
    let vecs: Vec<Vector3> = values.iter().map(|v| match v { Value::Vector3(v) => *v, _ => Vector3 { x: 0.0, y: 0.0, z: 0.0 } }).collect();
    let mut out = f32_column(vecs.iter().map(|v| v.x));
    out.extend(f32_column(vecs.iter().map(|v| v.y)));
    out.extend(f32_column(vecs.iter().map(|v| v.z)));
    out
}

fn decode_vector3_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 4;
    if bytes.len() != col * 3 {
        return Err(ValueError::Truncated { expected: count });
    }
    let x = read_f32_column(&bytes[0..col], count)?;
    let y = read_f32_column(&bytes[col..2 * col], count)?;
    let z = read_f32_column(&bytes[2 * col..3 * col], count)?;
    Ok((0..count).map(|i| Value::Vector3(Vector3 { x: x[i], y: y[i], z: z[i] })).collect())
}

fn encode_vector2int16_array(values: &[Value]) -> Vec<u8> {
    let vecs: Vec<Vector2int16> = values.iter().map(|v| match v { Value::Vector2int16(v) => *v, _ => Vector2int16 { x: 0, y: 0 } }).collect();
    let mut out = i16_raw_column(vecs.iter().map(|v| v.x));
    out.extend(i16_raw_column(vecs.iter().map(|v| v.y)));
    out
}

fn decode_vector2int16_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 2;
    if bytes.len() != col * 2 {
        return Err(ValueError::Truncated { expected: count });
    }
    let x = read_i16_raw_column(&bytes[0..col], count)?;
    let y = read_i16_raw_column(&bytes[col..2 * col], count)?;
    Ok((0..count).map(|i| Value::Vector2int16(Vector2int16 { x: x[i], y: y[i] })).collect())
}

fn encode_vector3int16_array(values: &[Value]) -> Vec<u8> {
    let vecs: Vec<Vector3int16> = values.iter().map(|v| match v { Value::Vector3int16(v) => *v, _ => Vector3int16 { x: 0, y: 0, z: 0 } }).collect();
    let mut out = i16_raw_column(vecs.iter().map(|v| v.x));
    out.extend(i16_raw_column(vecs.iter().map(|v| v.y)));
    out.extend(i16_raw_column(vecs.iter().map(|v| v.z)));
    out
}

fn decode_vector3int16_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let col = count * 2;
    if bytes.len() != col * 3 {
        return Err(ValueError::Truncated { expected: count });
    }
    let x = read_i16_raw_column(&bytes[0..col], count)?;
    let y = read_i16_raw_column(&bytes[col..2 * col], count)?;
    let z = read_i16_raw_column(&bytes[2 * col..3 * col], count)?;
    Ok((0..count).map(|i| Value::Vector3int16(Vector3int16 { x: x[i], y: y[i], z: z[i] })).collect())
}

fn encode_content_array(values: &[Value]) -> Vec<u8> {
    let mut out = ByteWriter::new();
    for v in values {
        let Value::Content(c) = v else { continue };
        match c.kind {
            ContentKind::Null => out.write_u8(0),
            ContentKind::Url => {
                out.write_u8(1);
                out.write_prefixed_string(&c.data);
            }
        }
    }
    out.into_bytes()
}

fn decode_content_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    let mut reader = ByteReader::new(bytes);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = reader.read_u8();
        let content = if kind == 0 { Content::null() } else { Content::url(reader.read_prefixed_string()) };
        out.push(Value::Content(content));
    }
    if reader.error().is_some() {
        return Err(ValueError::Truncated { expected: count });
    }
    Ok(out)
}

/// Encode an array of [`CFrame`]s using the compact orientation-tag scheme
/// (§4.C, §9): a tag byte per element, a contiguous block of explicit
/// rotation floats for tag-`0` elements, then the interleaved position array.
#[must_use]
pub fn encode_cframe_array(values: &[Value]) -> Vec<u8> {
    let frames: Vec<CFrame> = values.iter().map(|v| match v { Value::CFrame(c) => *c, _ => CFrame { position: Vector3 { x: 0.0, y: 0.0, z: 0.0 }, rotation: [0.0; 9] } }).collect();
    let mut out = ByteWriter::new();
    let tags: Vec<u8> = frames.iter().map(|f| tag_for_rotation(&f.rotation)).collect();
    for &tag in &tags {
        out.write_u8(tag);
    }
    for (frame, &tag) in frames.iter().zip(&tags) {
        if tag == 0 {
            for component in frame.rotation {
                out.write_f32(component);
            }
        }
    }
    out.write_bytes(&f32_column(frames.iter().map(|f| f.position.x)));
    out.write_bytes(&f32_column(frames.iter().map(|f| f.position.y)));
    out.write_bytes(&f32_column(frames.iter().map(|f| f.position.z)));
    out.into_bytes()
}

/// Decode an array of [`CFrame`]s written by [`encode_cframe_array`].
///
/// # Errors
///
/// Returns [`ValueError::Truncated`] if the tag block, explicit rotation
/// block, or position columns don't hold the expected number of bytes.
pub fn decode_cframe_array(bytes: &[u8], count: usize) -> Result<Vec<Value>, ValueError> {
    if bytes.len() < count {
        return Err(ValueError::Truncated { expected: count });
    }
    let tags = &bytes[0..count];
    let mut cursor = count;
    let mut rotations = Vec::with_capacity(count);
    for &tag in tags {
        if tag == 0 {
            if bytes.len() < cursor + 36 {
                return Err(ValueError::Truncated { expected: count });
            }
            let mut rotation = [0.0f32; 9];
            for (i, r) in rotation.iter_mut().enumerate() {
                let start = cursor + i * 4;
                *r = f32::from_le_bytes(bytes[start..start + 4].try_into().unwrap_or([0; 4]));
            }
            cursor += 36;
            rotations.push(rotation);
        } else {
            rotations.push(rotation_for_tag(tag).ok_or(ValueError::Truncated { expected: count })?);
        }
    }
    let col = count * 4;
    if bytes.len() != cursor + col * 3 {
        return Err(ValueError::Truncated { expected: count });
    }
    let x = read_f32_column(&bytes[cursor..cursor + col], count)?;
    let y = read_f32_column(&bytes[cursor + col..cursor + 2 * col], count)?;
    let z = read_f32_column(&bytes[cursor + 2 * col..cursor + 3 * col], count)?;
    Ok((0..count)
        .map(|i| Value::CFrame(CFrame { position: Vector3 { x: x[i], y: y[i], z: z[i] }, rotation: rotations[i] }))
        .collect())
}

fn split_at_checked(bytes: &[u8], mid: usize) -> Result<(&[u8], &[u8]), ValueError> {
    if bytes.len() < mid {
        return Err(ValueError::Truncated { expected: mid });
    }
    Ok(bytes.split_at(mid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn roundtrip(values: Vec<Value>) {
        let type_id = values[0].type_id() as u8;
        let bytes = encode_array(&values);
        let decoded = decode_array(type_id, values.len(), &bytes).unwrap();
        for (a, b) in values.iter().zip(&decoded) {
            match (a, b) {
                (Value::Reference(_), Value::Reference(_)) => {} // resolved at bform layer
                _ => assert_eq!(a, b),
            }
        }
    }

    #[test]
    fn int_array_roundtrip() {
        roundtrip(vec![Value::Int(0), Value::Int(-1), Value::Int(i32::MAX), Value::Int(i32::MIN)]);
    }

    #[test]
    fn float_array_roundtrip() {
        roundtrip(vec![Value::Float(0.0), Value::Float(-1.5), Value::Float(f32::MAX)]);
    }

    #[test]
    fn double_array_roundtrip() {
        roundtrip(vec![Value::Double(0.0), Value::Double(-3.25), Value::Double(f64::MAX)]);
    }

    #[test]
    fn bool_array_roundtrip() {
        roundtrip(vec![Value::Bool(true), Value::Bool(false), Value::Bool(true)]);
    }

    #[test]
    fn vector3_array_roundtrip() {
        roundtrip(vec![
            Value::Vector3(Vector3 { x: 1.0, y: 2.0, z: 3.0 }),
            Value::Vector3(Vector3 { x: -1.0, y: 0.0, z: 100.5 }),
        ]);
    }

    #[test]
    fn udim2_array_roundtrip() {
        roundtrip(vec![
            Value::UDim2(UDim2 { x: UDim { scale: 0.5, offset: 10 }, y: UDim { scale: -0.25, offset: -4 } }),
            Value::UDim2(UDim2 { x: UDim { scale: 1.0, offset: 0 }, y: UDim { scale: 0.0, offset: 999 } }),
        ]);
    }

    #[test]
    fn ray_array_roundtrip() {
        roundtrip(vec![Value::Ray(Ray {
            origin: Vector3 { x: 1.0, y: 2.0, z: 3.0 },
            direction: Vector3 { x: 0.0, y: 1.0, z: 0.0 },
        })]);
    }

    #[test]
    fn vector_int16_arrays_roundtrip() {
        roundtrip(vec![
            Value::Vector2int16(Vector2int16 { x: -5, y: 300 }),
            Value::Vector2int16(Vector2int16 { x: i16::MIN, y: i16::MAX }),
        ]);
        roundtrip(vec![Value::Vector3int16(Vector3int16 { x: 1, y: -1, z: 0 })]);
    }

    #[test]
    fn faces_and_axes_roundtrip() {
        roundtrip(vec![Value::Faces(0b0010_1101), Value::Faces(0)]);
        roundtrip(vec![Value::Axes(0b101), Value::Axes(0)]);
    }

    #[test]
    fn content_array_roundtrip() {
        roundtrip(vec![Value::Content(Content::null()), Value::Content(Content::url(b"https://example".to_vec()))]);
    }

    #[test]
    fn string_and_binary_string_roundtrip() {
        roundtrip(vec![Value::String(b"hello".to_vec()), Value::String(Vec::new())]);
        roundtrip(vec![Value::BinaryString(vec![0, 1, 2, 255])]);
        roundtrip(vec![Value::ProtectedString(b"print('hi')".to_vec())]);
    }

    #[test]
    fn cframe_array_with_axis_aligned_and_explicit_rotations() {
        let axis_aligned = crate::cframe::rotation_for_tag(5).unwrap();
        let values = vec![
            Value::CFrame(CFrame { position: Vector3 { x: 1.0, y: 2.0, z: 3.0 }, rotation: axis_aligned }),
            Value::CFrame(CFrame { position: Vector3 { x: -1.0, y: 0.0, z: 9.0 }, rotation: [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9] }),
        ];
        roundtrip(values);
    }

    #[test]
    fn reference_column_roundtrip_on_ids() {
        let ids = vec![0, 1, 2, 5, 100, -1];
        let encoded = encode_reference_ids(&ids);
        let decoded = decode_reference_ids(&encoded, ids.len()).unwrap();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn reference_column_fuzz() {
        let mut rng = rand::thread_rng();
        let ids: Vec<i32> = (0..50).map(|_| rng.gen_range(-1..10_000)).collect();
        let encoded = encode_reference_ids(&ids);
        assert_eq!(decode_reference_ids(&encoded, ids.len()).unwrap(), ids);
    }

    #[test]
    fn unknown_type_id_is_reported() {
        assert_eq!(decode_array(200, 1, &[]), Err(ValueError::UnknownTypeId(200)));
    }

    #[test]
    fn truncated_column_is_reported() {
        assert_eq!(decode_array(TypeId::Int as u8, 4, &[0, 0]), Err(ValueError::Truncated { expected: 4 }));
    }

    #[test]
    fn empty_array_encodes_to_empty_bytes() {
        assert_eq!(encode_array(&[]), Vec::<u8>::new());
    }
}
