// SPDX-License-Identifier: Apache-2.0
//! The typed-value system shared by the binary and text codecs.
//!
//! These types are pure data — no serialization logic. The columnar binary
//! encoding lives in `rbx-binary`, the scalar textual encoding lives in
//! `rbx-text`. Both operate on [`Value`] through its canonical [`TypeId`].

/// 3-component vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector3 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

/// 2-component vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vector2 {
    /// X component.
    pub x: f32,
    /// Y component.
    pub y: f32,
}

/// 3-component integer vector (16-bit lanes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vector3int16 {
    /// X component.
    pub x: i16,
    /// Y component.
    pub y: i16,
    /// Z component.
    pub z: i16,
}

/// 2-component integer vector (16-bit lanes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vector2int16 {
    /// X component.
    pub x: i16,
    /// Y component.
    pub y: i16,
}

/// Linear RGB color with float components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color3 {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
}

/// A single scaled dimension: a fractional `scale` plus a pixel `offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UDim {
    /// Fraction of the parent extent.
    pub scale: f32,
    /// Pixel offset applied after scaling.
    pub offset: i32,
}

/// Two independent [`UDim`]s, one per axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UDim2 {
    /// Horizontal dimension.
    pub x: UDim,
    /// Vertical dimension.
    pub y: UDim,
}

/// An origin point and a direction, both in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Ray origin.
    pub origin: Vector3,
    /// Ray direction (not required to be normalized).
    pub direction: Vector3,
}

/// A rigid transform: a position and a row-major 3x3 rotation matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CFrame {
    /// World-space position.
    pub position: Vector3,
    /// Row-major 3x3 rotation matrix, 9 elements.
    pub rotation: [f32; 9],
}

/// Which kind of `Content` payload is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    /// No content; the payload is empty.
    Null,
    /// The payload is a URL-ish string.
    Url,
}

/// A tagged, URL-ish content reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Content {
    /// Discriminates null vs. url content.
    pub kind: ContentKind,
    /// Payload bytes; empty when `kind` is [`ContentKind::Null`].
    pub data: Vec<u8>,
}

impl Content {
    /// The reserved "no content" value.
    #[must_use]
    pub fn null() -> Self {
        Self { kind: ContentKind::Null, data: Vec::new() }
    }

    /// A URL-ish content value.
    #[must_use]
    pub fn url(bytes: impl Into<Vec<u8>>) -> Self {
        Self { kind: ContentKind::Url, data: bytes.into() }
    }
}

/// Opaque, scene-local handle to another [`crate::scene::Instance`].
///
/// `None` represents the empty/null reference reserved by §3 of the format
/// ( `""`, `"null"`, `"nil"` never get interned into a real reference ).
pub type ReferenceValue = Option<crate::scene::InstanceHandle>;

/// The sum type over every value kind the format can carry as a property.
///
/// Variant order matches the canonical type-ID table; [`TypeId`] mirrors it
/// for the byte actually written to `PROP` chunks.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// UTF-8-agnostic byte string (`string` tag, type id 1).
    String(Vec<u8>),
    /// Boolean (`bool` tag, type id 2).
    Bool(bool),
    /// 32-bit signed integer (`int` tag, type id 3).
    Int(i32),
    /// 32-bit float (`float` tag, type id 4).
    Float(f32),
    /// 64-bit float (`double` tag, type id 5).
    Double(f64),
    /// Scaled dimension (`UDim` tag, type id 6).
    UDim(UDim),
    /// Pair of scaled dimensions (`UDim2` tag, type id 7).
    UDim2(UDim2),
    /// Ray (`Ray` tag, type id 8).
    Ray(Ray),
    /// 6-bit face mask (`Faces` tag, type id 9).
    Faces(u8),
    /// 3-bit axis mask (`Axes` tag, type id 10).
    Axes(u8),
    /// Palette-indexed color (`int` tag on the wire, type id 11).
    BrickColor(u32),
    /// Linear color (`Color3` tag, type id 12).
    Color3(Color3),
    /// 2D vector (`Vector2` tag, type id 13).
    Vector2(Vector2),
    /// 3D vector (`Vector3` tag, type id 14).
    Vector3(Vector3),
    /// Rigid transform (`CoordinateFrame` tag, type id 15).
    CFrame(CFrame),
    /// 2D integer vector (`Vector2int16` tag, type id 16).
    Vector2int16(Vector2int16),
    /// 3D integer vector (`Vector3int16` tag, type id 17).
    Vector3int16(Vector3int16),
    /// Enum value (`token` tag, type id 18).
    Token(u32),
    /// Weak handle to another instance (`Ref`/`Object` tag, type id 19).
    Reference(ReferenceValue),
    /// Script source text (`ProtectedString` tag, type id 20).
    ProtectedString(Vec<u8>),
    /// URL-ish tagged string (`Content` tag, type id 21).
    Content(Content),
    /// Opaque binary payload (`BinaryString` tag, type id 22).
    BinaryString(Vec<u8>),
}

/// The canonical binary type-id byte used in `PROP` chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TypeId {
    /// See [`Value::String`].
    String = 1,
    /// See [`Value::Bool`].
    Bool = 2,
    /// See [`Value::Int`].
    Int = 3,
    /// See [`Value::Float`].
    Float = 4,
    /// See [`Value::Double`].
    Double = 5,
    /// See [`Value::UDim`].
    UDim = 6,
    /// See [`Value::UDim2`].
    UDim2 = 7,
    /// See [`Value::Ray`].
    Ray = 8,
    /// See [`Value::Faces`].
    Faces = 9,
    /// See [`Value::Axes`].
    Axes = 10,
    /// See [`Value::BrickColor`].
    BrickColor = 11,
    /// See [`Value::Color3`].
    Color3 = 12,
    /// See [`Value::Vector2`].
    Vector2 = 13,
    /// See [`Value::Vector3`].
    Vector3 = 14,
    /// See [`Value::CFrame`].
    CFrame = 15,
    /// See [`Value::Vector2int16`].
    Vector2int16 = 16,
    /// See [`Value::Vector3int16`].
    Vector3int16 = 17,
    /// See [`Value::Token`].
    Token = 18,
    /// See [`Value::Reference`].
    Reference = 19,
    /// See [`Value::ProtectedString`].
    ProtectedString = 20,
    /// See [`Value::Content`].
    Content = 21,
    /// See [`Value::BinaryString`].
    BinaryString = 22,
}

impl TypeId {
    /// Resolve a type-id byte read off the wire.
    #[must_use]
    pub fn from_u8(id: u8) -> Option<Self> {
        Some(match id {
            1 => Self::String,
            2 => Self::Bool,
            3 => Self::Int,
            4 => Self::Float,
            5 => Self::Double,
            6 => Self::UDim,
            7 => Self::UDim2,
            8 => Self::Ray,
            9 => Self::Faces,
            10 => Self::Axes,
            11 => Self::BrickColor,
            12 => Self::Color3,
            13 => Self::Vector2,
            14 => Self::Vector3,
            15 => Self::CFrame,
            16 => Self::Vector2int16,
            17 => Self::Vector3int16,
            18 => Self::Token,
            19 => Self::Reference,
            20 => Self::ProtectedString,
            21 => Self::Content,
            22 => Self::BinaryString,
            _ => return None,
        })
    }
}

impl Value {
    /// The canonical type id for this value's variant.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::String(_) => TypeId::String,
            Self::Bool(_) => TypeId::Bool,
            Self::Int(_) => TypeId::Int,
            Self::Float(_) => TypeId::Float,
            Self::Double(_) => TypeId::Double,
            Self::UDim(_) => TypeId::UDim,
            Self::UDim2(_) => TypeId::UDim2,
            Self::Ray(_) => TypeId::Ray,
            Self::Faces(_) => TypeId::Faces,
            Self::Axes(_) => TypeId::Axes,
            Self::BrickColor(_) => TypeId::BrickColor,
            Self::Color3(_) => TypeId::Color3,
            Self::Vector2(_) => TypeId::Vector2,
            Self::Vector3(_) => TypeId::Vector3,
            Self::CFrame(_) => TypeId::CFrame,
            Self::Vector2int16(_) => TypeId::Vector2int16,
            Self::Vector3int16(_) => TypeId::Vector3int16,
            Self::Token(_) => TypeId::Token,
            Self::Reference(_) => TypeId::Reference,
            Self::ProtectedString(_) => TypeId::ProtectedString,
            Self::Content(_) => TypeId::Content,
            Self::BinaryString(_) => TypeId::BinaryString,
        }
    }

    /// The canonical text tag name for this value's variant.
    ///
    /// [`Value::BrickColor`] is the one variant whose text tag does not match
    /// its binary type id's name: it is written as a plain `int` in T-form.
    #[must_use]
    pub fn text_tag(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::BrickColor(_) => "int",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::UDim(_) => "UDim",
            Self::UDim2(_) => "UDim2",
            Self::Ray(_) => "Ray",
            Self::Faces(_) => "Faces",
            Self::Axes(_) => "Axes",
            Self::Color3(_) => "Color3",
            Self::Vector2(_) => "Vector2",
            Self::Vector3(_) => "Vector3",
            Self::CFrame(_) => "CoordinateFrame",
            Self::Vector2int16(_) => "Vector2int16",
            Self::Vector3int16(_) => "Vector3int16",
            Self::Token(_) => "token",
            Self::Reference(_) => "Ref",
            Self::ProtectedString(_) => "ProtectedString",
            Self::Content(_) => "Content",
            Self::BinaryString(_) => "BinaryString",
        }
    }
}
