// SPDX-License-Identifier: Apache-2.0
//! The T-form codec proper: mapping between the tag tree ([`crate::tag`]) and
//! the logical [`Scene`] (§4.E), including deferred reference resolution and
//! optional schema-driven type overrides.

use std::collections::BTreeMap;

use rbx_model::reference::{is_reserved, ReferenceRegistry};
use rbx_model::{Diagnostics, Instance, InstanceHandle, Scene, TypeId, Value, WarningKind};
use thiserror::Error;

use crate::schema::{PropertyType, Schema};
use crate::tag::{self, Tag, TagError};
use crate::value::{decode_scalar, encode_scalar, ValueTextError};

/// Errors decoding a T-form document.
#[derive(Debug, Error)]
pub enum TformError {
    /// The underlying tag tree failed to parse.
    #[error(transparent)]
    Tag(#[from] TagError),
}

struct Deferred {
    handle: InstanceHandle,
    property_name: String,
    referent: String,
}

/// Decode a complete T-form document.
///
/// `schema`, when given, overrides tag-name type inference and enables
/// enum-range validation for declared enum properties.
///
/// # Errors
///
/// Returns [`TformError`] if the underlying tag tree is malformed.
pub fn decode(bytes: &[u8], schema: Option<&Schema>) -> Result<(Scene, Diagnostics), TformError> {
    let roots = tag::parse(bytes)?;
    let mut scene = Scene::new();
    let mut diagnostics = Diagnostics::new();
    let mut referents: BTreeMap<String, InstanceHandle> = BTreeMap::new();
    let mut deferred: Vec<Deferred> = Vec::new();

    for tag in &roots {
        if tag.name == "Item" {
            decode_item(tag, &mut scene, None, schema, &mut diagnostics, &mut referents, &mut deferred);
        }
        // <External> headers carry no scene-model content; "null"/"nil" are
        // simply reserved, never interned (§4.E).
    }

    for item in deferred {
        if is_reserved(&item.referent) {
            set_property(&mut scene, item.handle, &item.property_name, Value::Reference(None));
            continue;
        }
        match referents.get(&item.referent) {
            Some(&target) => set_property(&mut scene, item.handle, &item.property_name, Value::Reference(Some(target))),
            None => diagnostics.push(WarningKind::UnresolvableReference, item.property_name),
        }
    }

    Ok((scene, diagnostics))
}

fn set_property(scene: &mut Scene, handle: InstanceHandle, name: &str, value: Value) {
    if let Some(instance) = scene.get_mut(handle) {
        instance.properties.insert(name.to_string(), value);
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_item(
    tag: &Tag,
    scene: &mut Scene,
    parent: Option<InstanceHandle>,
    schema: Option<&Schema>,
    diagnostics: &mut Diagnostics,
    referents: &mut BTreeMap<String, InstanceHandle>,
    deferred: &mut Vec<Deferred>,
) {
    let Some(class_name) = tag.attr("class") else {
        diagnostics.push(WarningKind::MissingRequiredAttribute, "Item.class".to_string());
        return;
    };
    let referent = tag.attr("referent").unwrap_or("").to_string();

    let instance = Instance::new(class_name, referent.clone());
    let handle = match parent {
        Some(p) => match scene.insert_child(p, instance) {
            Ok(h) => h,
            Err(_) => return,
        },
        None => scene.insert_root(instance),
    };
    if !is_reserved(&referent) {
        referents.insert(referent, handle);
    }

    if let Some(properties) = tag.child("Properties") {
        for prop_tag in &properties.children {
            decode_property(prop_tag, class_name, handle, scene, schema, diagnostics, deferred);
        }
    }

    for child_item in tag.children_named("Item") {
        decode_item(child_item, scene, Some(handle), schema, diagnostics, referents, deferred);
    }
}

#[allow(clippy::too_many_arguments)]
fn decode_property(
    tag: &Tag,
    class_name: &str,
    handle: InstanceHandle,
    scene: &mut Scene,
    schema: Option<&Schema>,
    diagnostics: &mut Diagnostics,
    deferred: &mut Vec<Deferred>,
) {
    let Some(name) = tag.attr("name") else {
        diagnostics.push(WarningKind::MissingRequiredAttribute, format!("{}.name", tag.name));
        return;
    };

    if tag.name == "Ref" || tag.name == "Object" {
        deferred.push(Deferred { handle, property_name: name.to_string(), referent: tag.text.clone() });
        return;
    }

    let declared = schema.and_then(|s| s.lookup(class_name, name));
    if let Some(PropertyType::Enum { items }) = declared {
        match decode_scalar(tag, Some(TypeId::Token)) {
            Ok(Value::Token(t)) => {
                if !items.contains(&t) {
                    diagnostics.push(WarningKind::EnumTokenOutOfRange, name.to_string());
                }
                set_property(scene, handle, name, Value::Token(t));
            }
            _ => diagnostics.push(WarningKind::TypeMismatch, name.to_string()),
        }
        return;
    }

    let hint = declared.and_then(PropertyType::type_id);
    match decode_scalar(tag, hint) {
        Ok(value) => {
            if let Some(expected) = hint {
                if value.type_id() != expected {
                    diagnostics.push(WarningKind::TypeMismatch, name.to_string());
                    return;
                }
            }
            set_property(scene, handle, name, value);
        }
        Err(ValueTextError::UDimUnsupported) => {} // §9: documented gap, not a schema mismatch
        Err(_) => diagnostics.push(WarningKind::TypeMismatch, name.to_string()),
    }
}

/// Encode a scene to its T-form byte representation.
///
/// Returns the bytes plus any diagnostics raised while encoding (currently:
/// `EnumTokenRefused` when a schema-declared enum property holds an
/// out-of-range token, §7.9).
#[must_use]
pub fn encode(scene: &Scene, schema: Option<&Schema>) -> (Vec<u8>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut registry = ReferenceRegistry::new();
    let mut referents: BTreeMap<InstanceHandle, String> = BTreeMap::new();
    for handle in scene.handles() {
        if let Some(instance) = scene.get(handle) {
            referents.insert(handle, registry.resolve(&instance.reference, handle));
        }
    }

    let mut roots = vec![Tag::new("External").with_text("null"), Tag::new("External").with_text("nil")];
    for &handle in scene.roots() {
        if let Some(instance) = scene.get(handle) {
            roots.push(encode_item(scene, handle, instance, schema, &referents, &mut diagnostics));
        }
    }
    (tag::render(&roots), diagnostics)
}

fn encode_item(
    scene: &Scene,
    handle: InstanceHandle,
    instance: &Instance,
    schema: Option<&Schema>,
    referents: &BTreeMap<InstanceHandle, String>,
    diagnostics: &mut Diagnostics,
) -> Tag {
    let own_referent = referents.get(&handle).cloned().unwrap_or_default();
    let mut item = Tag::new("Item").with_attr("class", instance.class_name.clone()).with_attr("referent", own_referent);

    let mut properties = Tag::new("Properties");
    for (name, value) in &instance.properties {
        if let Value::Reference(target) = value {
            let referent = target.and_then(|h| referents.get(&h)).cloned().unwrap_or_default();
            properties.children.push(Tag::new("Ref").with_attr("name", name.clone()).with_text(referent));
            continue;
        }

        if let Value::Token(t) = value {
            if let Some(PropertyType::Enum { items }) = schema.and_then(|s| s.lookup(&instance.class_name, name)) {
                if !items.contains(t) {
                    diagnostics.push(WarningKind::EnumTokenRefused, name.clone());
                    continue;
                }
            }
        }

        if let Some(mut value_tag) = encode_scalar(value) {
            value_tag.attrs.insert(0, ("name".to_string(), name.clone()));
            properties.children.push(value_tag);
        }
    }
    if !properties.children.is_empty() {
        item = item.with_child(properties);
    }

    for &child in instance.children() {
        if let Some(child_instance) = scene.get(child) {
            item = item.with_child(encode_item(scene, child, child_instance, schema, referents, diagnostics));
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbx_model::Vector3;

    #[test]
    fn empty_place_decodes_to_empty_scene() {
        let bytes = b"<External>null</External><External>nil</External>";
        let (scene, diagnostics) = decode(bytes, None).unwrap();
        assert!(scene.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn single_part_roundtrips() {
        let mut scene = Scene::new();
        let mut part = Instance::new("Part", "RBX1");
        part.properties.insert("Name".to_string(), Value::String(b"P".to_vec()));
        part.properties.insert("Size".to_string(), Value::Vector3(Vector3 { x: 4.0, y: 1.0, z: 2.0 }));
        scene.insert_root(part);

        let (bytes, diagnostics) = encode(&scene, None);
        assert!(diagnostics.is_empty());
        let (decoded, diagnostics) = decode(&bytes, None).unwrap();
        assert!(diagnostics.is_empty());
        let handle = decoded.roots()[0];
        let instance = decoded.get(handle).unwrap();
        assert_eq!(instance.class_name, "Part");
        assert_eq!(instance.reference, "RBX1");
        assert_eq!(instance.properties.get("Name"), Some(&Value::String(b"P".to_vec())));
    }

    #[test]
    fn item_missing_class_is_skipped_with_warning() {
        let bytes = br#"<Item referent="RBX1"><Properties></Properties></Item>"#;
        let (scene, diagnostics) = decode(bytes, None).unwrap();
        assert!(scene.is_empty());
        assert_eq!(diagnostics.warnings().len(), 1);
        assert_eq!(diagnostics.warnings()[0].kind, WarningKind::MissingRequiredAttribute);
    }

    #[test]
    fn reference_property_resolves_across_items() {
        let bytes = br#"<Item class="Part" referent="RBX_A"><Properties><Ref name="Target">RBX_B</Ref></Properties></Item><Item class="Part" referent="RBX_B"></Item>"#;
        let (scene, diagnostics) = decode(bytes, None).unwrap();
        assert!(diagnostics.is_empty());
        let a = scene.roots()[0];
        let b = scene.roots()[1];
        assert_eq!(scene.get(a).unwrap().properties.get("Target"), Some(&Value::Reference(Some(b))));
    }

    #[test]
    fn unresolvable_reference_is_dropped_not_null() {
        let bytes = br#"<Item class="Part" referent="RBX_A"><Properties><Ref name="Target">RBX_NOPE</Ref></Properties></Item>"#;
        let (scene, diagnostics) = decode(bytes, None).unwrap();
        let a = scene.roots()[0];
        assert!(scene.get(a).unwrap().properties.get("Target").is_none());
        assert_eq!(diagnostics.warnings()[0].kind, WarningKind::UnresolvableReference);
    }

    #[test]
    fn reserved_referent_resolves_to_none_not_a_warning() {
        let bytes = br#"<Item class="Part" referent="RBX_A"><Properties><Ref name="Target">null</Ref></Properties></Item>"#;
        let (scene, diagnostics) = decode(bytes, None).unwrap();
        assert!(diagnostics.is_empty());
        let a = scene.roots()[0];
        assert_eq!(scene.get(a).unwrap().properties.get("Target"), Some(&Value::Reference(None)));
    }

    #[test]
    fn nested_items_build_parent_child_relation() {
        let bytes = br#"<Item class="Model" referent="M"><Item class="Part" referent="P"></Item></Item>"#;
        let (scene, _) = decode(bytes, None).unwrap();
        let model = scene.roots()[0];
        assert_eq!(scene.get(model).unwrap().children().len(), 1);
    }

    #[test]
    fn schema_enum_out_of_range_warns_but_keeps_value_on_decode() {
        let mut schema = Schema::default();
        let mut props = BTreeMap::new();
        props.insert("Material".to_string(), PropertyType::Enum { items: [0, 1].into_iter().collect() });
        schema.classes.insert("Part".to_string(), props);

        let bytes = br#"<Item class="Part" referent="P"><Properties><token name="Material">256</token></Properties></Item>"#;
        let (scene, diagnostics) = decode(bytes, Some(&schema)).unwrap();
        let handle = scene.roots()[0];
        assert_eq!(scene.get(handle).unwrap().properties.get("Material"), Some(&Value::Token(256)));
        assert_eq!(diagnostics.warnings()[0].kind, WarningKind::EnumTokenOutOfRange);
    }

    #[test]
    fn schema_enum_out_of_range_is_refused_on_encode() {
        let mut schema = Schema::default();
        let mut props = BTreeMap::new();
        props.insert("Material".to_string(), PropertyType::Enum { items: [0, 1].into_iter().collect() });
        schema.classes.insert("Part".to_string(), props);

        let mut scene = Scene::new();
        let mut part = Instance::new("Part", "P");
        part.properties.insert("Material".to_string(), Value::Token(256));
        scene.insert_root(part);

        let (bytes, diagnostics) = encode(&scene, Some(&schema));
        assert_eq!(diagnostics.warnings()[0].kind, WarningKind::EnumTokenRefused);
        let (decoded, _) = decode(&bytes, Some(&schema)).unwrap();
        let handle = decoded.roots()[0];
        assert!(decoded.get(handle).unwrap().properties.get("Material").is_none());
    }
}
