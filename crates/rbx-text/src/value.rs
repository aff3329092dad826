// SPDX-License-Identifier: Apache-2.0
//! Scalar textual encode/decode for every [`Value`] kind (§4.C, §4.E), minus
//! `Reference` — reference-valued properties defer resolution to
//! [`crate::tform`], which has the instance table this module doesn't.

use rbx_model::{CFrame, Color3, Content, ContentKind, Ray, TypeId, UDim, UDim2, Value, Vector2, Vector2int16, Vector3, Vector3int16};
use thiserror::Error;

use crate::tag::Tag;

/// Errors decoding a scalar text value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueTextError {
    /// The tag name named no known value kind.
    #[error("unknown value tag {0:?}")]
    UnknownTag(String),
    /// A numeric subtag's text didn't parse.
    #[error("malformed number in {0:?}: {1:?}")]
    MalformedNumber(String, String),
    /// A composite value was missing a required subtag or attribute.
    #[error("{0:?} missing required field {1:?}")]
    MissingField(String, &'static str),
    /// The T-form `UDim` codec has no working decode path (§9 Open
    /// Questions) — reproduced rather than fixed, for cross-form fidelity
    /// against historical files.
    #[error("UDim text decoding is not supported")]
    UDimUnsupported,
}

/// Encode a scalar [`Value`] to its tag shape.
///
/// Returns `None` for [`Value::UDim`] — the historical T-form encoder emits
/// nothing (effectively nil) for this kind; see [`ValueTextError::UDimUnsupported`].
#[must_use]
pub fn encode_scalar(value: &Value) -> Option<Tag> {
    Some(match value {
        Value::String(bytes) => Tag::new("string").with_text(String::from_utf8_lossy(bytes).into_owned()),
        Value::ProtectedString(bytes) => {
            Tag::new("ProtectedString").with_text(String::from_utf8_lossy(bytes).into_owned())
        }
        Value::Bool(b) => Tag::new("bool").with_text(if *b { "true" } else { "false" }),
        Value::Int(n) => Tag::new("int").with_text(n.to_string()),
        Value::BrickColor(n) => Tag::new("int").with_text(n.to_string()),
        Value::Float(f) => Tag::new("float").with_text(format_sig9(f64::from(*f))),
        Value::Double(d) => Tag::new("double").with_text(format_sig9(*d)),
        Value::UDim(_) => return None,
        Value::UDim2(u) => encode_udim2(u),
        Value::Ray(r) => encode_ray(r),
        Value::Faces(bits) => Tag::new("Faces").with_text(bits.to_string()),
        Value::Axes(bits) => Tag::new("Axes").with_text(bits.to_string()),
        Value::Color3(c) => encode_color3(c),
        Value::Vector2(v) => Tag::new("Vector2")
            .with_child(Tag::new("X").with_text(format_sig9(f64::from(v.x))))
            .with_child(Tag::new("Y").with_text(format_sig9(f64::from(v.y)))),
        Value::Vector3(v) => encode_vector3(v, "Vector3"),
        Value::CFrame(c) => encode_cframe(c),
        Value::Vector2int16(v) => Tag::new("Vector2int16")
            .with_child(Tag::new("X").with_text(v.x.to_string()))
            .with_child(Tag::new("Y").with_text(v.y.to_string())),
        Value::Vector3int16(v) => Tag::new("Vector3int16")
            .with_child(Tag::new("X").with_text(v.x.to_string()))
            .with_child(Tag::new("Y").with_text(v.y.to_string()))
            .with_child(Tag::new("Z").with_text(v.z.to_string())),
        Value::Token(t) => Tag::new("token").with_text(t.to_string()),
        Value::Reference(_) => return None,
        Value::Content(c) => encode_content(c),
        Value::BinaryString(bytes) => encode_binary_string(bytes),
    })
}

/// Decode a scalar [`Tag`] to a [`Value`], inferring the kind from the tag
/// name. `type_hint` lets a schema override ambiguous cases (`int` vs.
/// `BrickColor`; ordinary value vs. `Token` for an enum-typed property).
///
/// # Errors
///
/// Returns [`ValueTextError`] if the tag name is unrecognized, a numeric
/// subtag fails to parse, a required composite field is missing, or the tag
/// is `UDim` (§9 Open Questions).
pub fn decode_scalar(tag: &Tag, type_hint: Option<TypeId>) -> Result<Value, ValueTextError> {
    if matches!(type_hint, Some(TypeId::Token)) {
        return Ok(Value::Token(parse_u32(tag, &tag.text)?));
    }
    match tag.name.as_str() {
        "string" => Ok(Value::String(tag.text.clone().into_bytes())),
        "ProtectedString" => Ok(Value::ProtectedString(tag.text.clone().into_bytes())),
        "bool" => Ok(Value::Bool(tag.text.trim() == "true")),
        "int" => {
            let n = parse_i32(tag, &tag.text)?;
            if matches!(type_hint, Some(TypeId::BrickColor)) {
                #[allow(clippy::cast_sign_loss)]
                Ok(Value::BrickColor(n as u32))
            } else {
                Ok(Value::Int(n))
            }
        }
        "float" => Ok(Value::Float(parse_f32(tag, &tag.text)?)),
        "double" => Ok(Value::Double(parse_f64(tag, &tag.text)?)),
        "UDim" => Err(ValueTextError::UDimUnsupported),
        "UDim2" => decode_udim2(tag),
        "Ray" => decode_ray(tag),
        "Faces" => Ok(Value::Faces(parse_u8(tag, &tag.text)?)),
        "Axes" => Ok(Value::Axes(parse_u8(tag, &tag.text)?)),
        "Color3" => decode_color3(tag),
        "Vector2" => {
            let (x, y) = decode_xy(tag)?;
            Ok(Value::Vector2(Vector2 { x, y }))
        }
        "Vector3" => {
            let v = decode_xyz(tag)?;
            Ok(Value::Vector3(Vector3 { x: v.0, y: v.1, z: v.2 }))
        }
        "CoordinateFrame" | "CFrame" => decode_cframe(tag),
        "Vector2int16" => Ok(Value::Vector2int16(Vector2int16 {
            x: parse_i16(tag, tag.child("X"), "X")?,
            y: parse_i16(tag, tag.child("Y"), "Y")?,
        })),
        "Vector3int16" => Ok(Value::Vector3int16(Vector3int16 {
            x: parse_i16(tag, tag.child("X"), "X")?,
            y: parse_i16(tag, tag.child("Y"), "Y")?,
            z: parse_i16(tag, tag.child("Z"), "Z")?,
        })),
        "token" => Ok(Value::Token(parse_u32(tag, &tag.text)?)),
        "Content" => decode_content(tag),
        "BinaryString" => decode_binary_string(tag),
        other => Err(ValueTextError::UnknownTag(other.to_string())),
    }
}

fn encode_vector3(v: &Vector3, tag_name: &'static str) -> Tag {
    Tag::new(tag_name)
        .with_child(Tag::new("X").with_text(format_sig9(f64::from(v.x))))
        .with_child(Tag::new("Y").with_text(format_sig9(f64::from(v.y))))
        .with_child(Tag::new("Z").with_text(format_sig9(f64::from(v.z))))
}

fn decode_xy(tag: &Tag) -> Result<(f32, f32), ValueTextError> {
    Ok((parse_child_f32(tag, "X")?, parse_child_f32(tag, "Y")?))
}

fn decode_xyz(tag: &Tag) -> Result<(f32, f32, f32), ValueTextError> {
    Ok((parse_child_f32(tag, "X")?, parse_child_f32(tag, "Y")?, parse_child_f32(tag, "Z")?))
}

fn parse_child_f32(tag: &Tag, name: &'static str) -> Result<f32, ValueTextError> {
    let child = tag.child(name).ok_or(ValueTextError::MissingField(tag.name.clone(), name))?;
    parse_f32(tag, &child.text)
}

fn encode_udim2(u: &UDim2) -> Tag {
    Tag::new("UDim2")
        .with_child(udim_fields("X", &u.x))
        .with_child(udim_fields("Y", &u.y))
}

fn udim_fields(name: &'static str, u: &UDim) -> Tag {
    Tag::new(name)
        .with_child(Tag::new("S").with_text(format_sig9(f64::from(u.scale))))
        .with_child(Tag::new("O").with_text(u.offset.to_string()))
}

fn decode_udim2(tag: &Tag) -> Result<Value, ValueTextError> {
    let x = decode_udim_fields(tag, "X")?;
    let y = decode_udim_fields(tag, "Y")?;
    Ok(Value::UDim2(UDim2 { x, y }))
}

fn decode_udim_fields(tag: &Tag, name: &'static str) -> Result<UDim, ValueTextError> {
    let axis = tag.child(name).ok_or(ValueTextError::MissingField(tag.name.clone(), name))?;
    let scale_tag = axis.child("S").ok_or(ValueTextError::MissingField(axis.name.clone(), "S"))?;
    let offset_tag = axis.child("O").ok_or(ValueTextError::MissingField(axis.name.clone(), "O"))?;
    Ok(UDim { scale: parse_f32(axis, &scale_tag.text)?, offset: parse_i32(axis, &offset_tag.text)? })
}

/// Encode a Ray, reproducing the historical encoder's bug (§9 Open
/// Questions): the `direction` tag is written with the origin's components
/// instead of the direction's.
fn encode_ray(r: &Ray) -> Tag {
    Tag::new("Ray")
        .with_child(encode_vector3(&r.origin, "origin"))
        .with_child(encode_vector3(&r.origin, "direction"))
}

fn decode_ray(tag: &Tag) -> Result<Value, ValueTextError> {
    let origin = tag.child("origin").ok_or(ValueTextError::MissingField(tag.name.clone(), "origin"))?;
    let direction = tag.child("direction").ok_or(ValueTextError::MissingField(tag.name.clone(), "direction"))?;
    let (ox, oy, oz) = decode_xyz(origin)?;
    let (dx, dy, dz) = decode_xyz(direction)?;
    Ok(Value::Ray(Ray {
        origin: Vector3 { x: ox, y: oy, z: oz },
        direction: Vector3 { x: dx, y: dy, z: dz },
    }))
}

fn encode_color3(c: &Color3) -> Tag {
    let r = (c.r.clamp(0.0, 1.0) * 255.0).round() as u32;
    let g = (c.g.clamp(0.0, 1.0) * 255.0).round() as u32;
    let b = (c.b.clamp(0.0, 1.0) * 255.0).round() as u32;
    let packed = (0xFFu32 << 24) | (r << 16) | (g << 8) | b;
    Tag::new("Color3").with_text(packed.to_string())
}

fn decode_color3(tag: &Tag) -> Result<Value, ValueTextError> {
    if let (Some(r), Some(g), Some(b)) = (tag.child("R"), tag.child("G"), tag.child("B")) {
        return Ok(Value::Color3(Color3 {
            r: parse_f32(tag, &r.text)?,
            g: parse_f32(tag, &g.text)?,
            b: parse_f32(tag, &b.text)?,
        }));
    }
    let packed = parse_packed_u32(tag, &tag.text)?;
    Ok(Value::Color3(Color3 {
        r: f32::from(((packed >> 16) & 0xFF) as u8) / 255.0,
        g: f32::from(((packed >> 8) & 0xFF) as u8) / 255.0,
        b: f32::from((packed & 0xFF) as u8) / 255.0,
    }))
}

fn encode_cframe(c: &CFrame) -> Tag {
    let mut tag = Tag::new("CoordinateFrame")
        .with_child(Tag::new("X").with_text(format_sig9(f64::from(c.position.x))))
        .with_child(Tag::new("Y").with_text(format_sig9(f64::from(c.position.y))))
        .with_child(Tag::new("Z").with_text(format_sig9(f64::from(c.position.z))));
    for (i, component) in c.rotation.iter().enumerate() {
        tag = tag.with_child(Tag::new(format!("R{i:02}")).with_text(format_sig9(f64::from(*component))));
    }
    tag
}

fn decode_cframe(tag: &Tag) -> Result<Value, ValueTextError> {
    let (x, y, z) = decode_xyz(tag)?;
    let mut rotation = [0f32; 9];
    for (i, slot) in rotation.iter_mut().enumerate() {
        let name = format!("R{i:02}");
        let child = tag.child(&name).ok_or(ValueTextError::MissingField(tag.name.clone(), "R"))?;
        *slot = parse_f32(tag, &child.text)?;
    }
    Ok(Value::CFrame(CFrame { position: Vector3 { x, y, z }, rotation }))
}

fn encode_content(c: &Content) -> Tag {
    let inner = match c.kind {
        ContentKind::Null => Tag::new("null"),
        ContentKind::Url => Tag::new("url").with_text(String::from_utf8_lossy(&c.data).into_owned()),
    };
    Tag::new("Content").with_child(inner)
}

fn decode_content(tag: &Tag) -> Result<Value, ValueTextError> {
    if let Some(null_tag) = tag.child("null") {
        let _ = null_tag;
        return Ok(Value::Content(Content::null()));
    }
    if let Some(url_tag) = tag.child("url") {
        return Ok(Value::Content(Content::url(url_tag.text.clone().into_bytes())));
    }
    Ok(Value::Content(Content::null()))
}

const BASE64_LINE_WIDTH: usize = 72;

fn encode_binary_string(bytes: &[u8]) -> Tag {
    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let wrapped = wrap_lines(&encoded, BASE64_LINE_WIDTH);
    let mut tag = Tag::new("BinaryString").with_text(wrapped);
    if tag.text.contains("]]>") {
        tag.cdata = false; // CDATA can't carry its own terminator; fall back to escaped text
    } else {
        tag.cdata = true;
    }
    tag
}

fn wrap_lines(s: &str, width: usize) -> String {
    let mut out = String::with_capacity(s.len() + s.len() / width + 1);
    for (i, chunk) in s.as_bytes().chunks(width).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(std::str::from_utf8(chunk).unwrap_or(""));
    }
    out
}

fn decode_binary_string(tag: &Tag) -> Result<Value, ValueTextError> {
    use base64::Engine as _;
    let stripped: String = tag.text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(stripped)
        .map_err(|e| ValueTextError::MalformedNumber("BinaryString".to_string(), e.to_string()))?;
    Ok(Value::BinaryString(bytes))
}

fn parse_packed_u32(tag: &Tag, text: &str) -> Result<u32, ValueTextError> {
    let trimmed = text.trim();
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<u32>()
    };
    parsed.map_err(|_| ValueTextError::MalformedNumber(tag.name.clone(), text.to_string()))
}

fn parse_i32(tag: &Tag, text: &str) -> Result<i32, ValueTextError> {
    text.trim().parse().map_err(|_| ValueTextError::MalformedNumber(tag.name.clone(), text.to_string()))
}

fn parse_u32(tag: &Tag, text: &str) -> Result<u32, ValueTextError> {
    text.trim().parse().map_err(|_| ValueTextError::MalformedNumber(tag.name.clone(), text.to_string()))
}

fn parse_u8(tag: &Tag, text: &str) -> Result<u8, ValueTextError> {
    text.trim().parse().map_err(|_| ValueTextError::MalformedNumber(tag.name.clone(), text.to_string()))
}

fn parse_i16(tag: &Tag, child: Option<&Tag>, name: &'static str) -> Result<i16, ValueTextError> {
    let child = child.ok_or(ValueTextError::MissingField(tag.name.clone(), name))?;
    child.text.trim().parse().map_err(|_| ValueTextError::MalformedNumber(child.name.clone(), child.text.clone()))
}

fn parse_f32(tag: &Tag, text: &str) -> Result<f32, ValueTextError> {
    text.trim().parse().map_err(|_| ValueTextError::MalformedNumber(tag.name.clone(), text.to_string()))
}

fn parse_f64(tag: &Tag, text: &str) -> Result<f64, ValueTextError> {
    text.trim().parse().map_err(|_| ValueTextError::MalformedNumber(tag.name.clone(), text.to_string()))
}

/// Format `x` as `%.9g` would: 9 significant digits, scientific notation
/// outside `[1e-4, 1e9)`, minimum 3-digit exponent, trailing fractional
/// zeros trimmed.
#[must_use]
pub fn format_sig9(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }

    let exp = x.abs().log10().floor() as i32;
    if exp < -4 || exp >= 9 {
        let mantissa = x / 10f64.powi(exp);
        let mut mantissa_str = format!("{mantissa:.8}");
        trim_trailing_zeros(&mut mantissa_str);
        let sign = if exp >= 0 { '+' } else { '-' };
        format!("{mantissa_str}e{sign}{:03}", exp.abs())
    } else {
        let decimals = usize::try_from((8 - exp).max(0)).unwrap_or(0);
        let mut s = format!("{x:.decimals$}");
        trim_trailing_zeros(&mut s);
        s
    }
}

fn trim_trailing_zeros(s: &mut String) {
    if !s.contains('.') {
        return;
    }
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: Value, hint: Option<TypeId>) {
        let tag = encode_scalar(&value).expect("encodable");
        let decoded = decode_scalar(&tag, hint).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn primitive_roundtrips() {
        roundtrip(Value::String(b"hello".to_vec()), None);
        roundtrip(Value::Bool(true), None);
        roundtrip(Value::Int(-42), None);
        roundtrip(Value::Float(1.5), None);
        roundtrip(Value::Double(-2.25), None);
        roundtrip(Value::Token(7), None);
        roundtrip(Value::Faces(0b0010_1101), None);
        roundtrip(Value::Axes(0b101), None);
    }

    #[test]
    fn brickcolor_needs_a_type_hint_to_disambiguate_from_int() {
        let tag = encode_scalar(&Value::BrickColor(194)).unwrap();
        assert_eq!(tag.name, "int");
        assert_eq!(decode_scalar(&tag, Some(TypeId::BrickColor)).unwrap(), Value::BrickColor(194));
        assert_eq!(decode_scalar(&tag, None).unwrap(), Value::Int(194));
    }

    #[test]
    fn vector_roundtrips() {
        roundtrip(Value::Vector2(Vector2 { x: 1.0, y: -2.0 }), None);
        roundtrip(Value::Vector3(Vector3 { x: 1.0, y: -2.0, z: 3.5 }), None);
        roundtrip(Value::Vector2int16(Vector2int16 { x: -1, y: 2 }), None);
        roundtrip(Value::Vector3int16(Vector3int16 { x: -1, y: 2, z: 3 }), None);
    }

    #[test]
    fn udim_encode_is_nil_and_decode_always_fails() {
        assert!(encode_scalar(&Value::UDim(UDim { scale: 0.5, offset: 1 })).is_none());
        let tag = Tag::new("UDim").with_text("whatever");
        assert_eq!(decode_scalar(&tag, None), Err(ValueTextError::UDimUnsupported));
    }

    #[test]
    fn udim2_roundtrips_despite_udim_gap() {
        roundtrip(
            Value::UDim2(UDim2 { x: UDim { scale: 0.5, offset: 10 }, y: UDim { scale: -0.25, offset: -4 } }),
            None,
        );
    }

    #[test]
    fn ray_encode_reproduces_the_origin_direction_bug() {
        let ray = Ray { origin: Vector3 { x: 1.0, y: 2.0, z: 3.0 }, direction: Vector3 { x: 4.0, y: 5.0, z: 6.0 } };
        let tag = encode_scalar(&Value::Ray(ray)).unwrap();
        let decoded = decode_scalar(&tag, None).unwrap();
        let Value::Ray(back) = decoded else { panic!("expected Ray") };
        assert_eq!(back.origin, ray.origin);
        assert_eq!(back.direction, ray.origin, "direction should carry origin's components (reproduced bug)");
    }

    #[test]
    fn color3_decodes_both_packed_and_subtag_forms() {
        let packed = Tag::new("Color3").with_text("4294901760"); // 0xFFFF0000 = opaque red
        let decoded = decode_scalar(&packed, None).unwrap();
        let Value::Color3(c) = decoded else { panic!("expected Color3") };
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!(c.g.abs() < 1e-6);

        let subtags = Tag::new("Color3")
            .with_child(Tag::new("R").with_text("0.5"))
            .with_child(Tag::new("G").with_text("0.25"))
            .with_child(Tag::new("B").with_text("0.0"));
        let decoded = decode_scalar(&subtags, None).unwrap();
        assert_eq!(decoded, Value::Color3(Color3 { r: 0.5, g: 0.25, b: 0.0 }));
    }

    #[test]
    fn cframe_roundtrips() {
        roundtrip(
            Value::CFrame(CFrame {
                position: Vector3 { x: 1.0, y: 2.0, z: 3.0 },
                rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            }),
            None,
        );
    }

    #[test]
    fn content_roundtrips_null_and_url() {
        roundtrip(Value::Content(Content::null()), None);
        roundtrip(Value::Content(Content::url(b"https://example.com/x".to_vec())), None);
    }

    #[test]
    fn binary_string_roundtrips_and_wraps_at_72_columns() {
        let payload = vec![7u8; 200];
        let tag = encode_scalar(&Value::BinaryString(payload.clone())).unwrap();
        assert!(tag.text.lines().all(|line| line.len() <= 72));
        assert_eq!(decode_scalar(&tag, None).unwrap(), Value::BinaryString(payload));
    }

    #[test]
    fn sig9_formatting_matches_printf_g_semantics() {
        assert_eq!(format_sig9(0.0), "0");
        assert_eq!(format_sig9(1.0), "1");
        assert_eq!(format_sig9(1.5), "1.5");
        assert_eq!(format_sig9(100.0), "100");
        assert_eq!(format_sig9(1_234_567_890.0), "1.23456789e+009");
        assert_eq!(format_sig9(0.000_001_234_5), "1.2345e-006");
    }
}
