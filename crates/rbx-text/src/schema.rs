// SPDX-License-Identifier: Apache-2.0
//! The optional class/property schema (§4.E, §6 `--api <schema.json>`).
//!
//! The schema is an external collaborator the core spec treats as opaque;
//! this module only defines the shape a host loads and the lookups the
//! T-form codec needs from it — a class→property→type table plus, for enum
//! properties, the set of in-range token values.

use std::collections::{BTreeMap, BTreeSet};

use rbx_model::TypeId;
use serde::{Deserialize, Serialize};

/// The declared type of one `(class, property)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PropertyType {
    /// A plain value kind, matched against [`TypeId`] by name.
    Value {
        /// One of the canonical binary type-id names (e.g. `"Vector3"`).
        type_name: String,
    },
    /// An enum: decodes to [`rbx_model::Value::Token`], validated against
    /// `items`.
    Enum {
        /// The enum's in-range token values.
        items: BTreeSet<u32>,
    },
}

impl PropertyType {
    /// Resolve a plain value type's name to a [`TypeId`], if it names one.
    #[must_use]
    pub fn type_id(&self) -> Option<TypeId> {
        let Self::Value { type_name } = self else { return None };
        Some(match type_name.as_str() {
            "string" => TypeId::String,
            "bool" => TypeId::Bool,
            "int" => TypeId::Int,
            "float" => TypeId::Float,
            "double" => TypeId::Double,
            "UDim" => TypeId::UDim,
            "UDim2" => TypeId::UDim2,
            "Ray" => TypeId::Ray,
            "Faces" => TypeId::Faces,
            "Axes" => TypeId::Axes,
            "BrickColor" => TypeId::BrickColor,
            "Color3" => TypeId::Color3,
            "Vector2" => TypeId::Vector2,
            "Vector3" => TypeId::Vector3,
            "CoordinateFrame" | "CFrame" => TypeId::CFrame,
            "Vector2int16" => TypeId::Vector2int16,
            "Vector3int16" => TypeId::Vector3int16,
            "Ref" | "Object" => TypeId::Reference,
            "ProtectedString" => TypeId::ProtectedString,
            "Content" => TypeId::Content,
            "BinaryString" => TypeId::BinaryString,
            _ => return None,
        })
    }
}

/// A class/property schema: `class_name -> property_name -> declared type`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Schema {
    /// The class→property→type table.
    pub classes: BTreeMap<String, BTreeMap<String, PropertyType>>,
}

impl Schema {
    /// Load a schema from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `bytes` is not a valid `Schema`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Look up the declared type of `class_name`'s `property_name`, if the
    /// schema declares it.
    #[must_use]
    pub fn lookup(&self, class_name: &str, property_name: &str) -> Option<&PropertyType> {
        self.classes.get(class_name)?.get(property_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut schema = Schema::default();
        let mut props = BTreeMap::new();
        props.insert("Size".to_string(), PropertyType::Value { type_name: "Vector3".to_string() });
        props.insert("Material".to_string(), PropertyType::Enum { items: [0, 256].into_iter().collect() });
        schema.classes.insert("Part".to_string(), props);

        let json = serde_json::to_vec(&schema).unwrap();
        let back = Schema::from_json(&json).unwrap();
        assert_eq!(back.lookup("Part", "Size").unwrap().type_id(), Some(TypeId::Vector3));
        assert!(matches!(back.lookup("Part", "Material"), Some(PropertyType::Enum { .. })));
        assert!(back.lookup("Part", "Nonexistent").is_none());
    }
}
