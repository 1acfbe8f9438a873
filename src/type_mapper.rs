//! Mapping of field type descriptors onto validation-model type annotations.
//!
//! The mapping is total: every descriptor yields an annotation, and shapes outside the
//! supported set degrade to [`TypeAnnotation::Any`]. Only structurally malformed
//! descriptors (an empty union, an enum without variants, a struct reference that was
//! never bound) produce a [`BridgeError::TypeConversion`].
//!
//! Two interchangeable [`TypeMapper`] implementations exist. [`StandardMapper`] recurses
//! directly; [`MemoizingMapper`] additionally remembers the result for every descriptor
//! that does not reach a struct, keyed by a structural encoding of the descriptor. Which
//! one a cache uses is decided once, by [`select_mapper`].

use crate::config::MapperKind;
use crate::descriptor::{EnumType, StructType, TypeDescriptor};
use crate::error::{BridgeError, Result, ValidationError};
use crate::schema_builder::Model;
use crate::schema_cache::ForwardRef;
use log::{debug, info};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Validation-model type produced for one field
#[derive(Debug, Clone)]
pub enum TypeAnnotation {
    /// Top type: anything is accepted and nothing is documented
    Any,
    Integer,
    Float,
    String,
    Boolean,
    Binary,
    DateTime,
    Date,
    Time,
    Duration,
    Decimal,
    Uuid,
    Null,
    List(Option<Box<TypeAnnotation>>),
    Set(Option<Box<TypeAnnotation>>),
    Tuple(Option<Vec<TypeAnnotation>>),
    Dict(Option<(Box<TypeAnnotation>, Box<TypeAnnotation>)>),
    Optional(Box<TypeAnnotation>),
    Union(Vec<TypeAnnotation>),
    Model(Arc<Model>),
    /// A model still being built further up this thread's call stack
    Forward(ForwardRef),
    Enum(EnumType),
}

/// Supplies the annotation for a nested struct.
///
/// Implemented by the schema cache; the mapper never builds models itself.
pub trait StructResolver {
    fn resolve_struct(&self, struct_type: &StructType) -> Result<TypeAnnotation>;
}

/// Strategy for turning descriptors into annotations
pub trait TypeMapper: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn map(&self, descriptor: &TypeDescriptor, resolver: &dyn StructResolver) -> Result<TypeAnnotation>;
}

/// Direct recursive mapper
#[derive(Debug, Default)]
pub struct StandardMapper;

impl TypeMapper for StandardMapper {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn map(&self, descriptor: &TypeDescriptor, resolver: &dyn StructResolver) -> Result<TypeAnnotation> {
        map_shape(self, descriptor, resolver)
    }
}

/// Mapper that remembers results for struct-free descriptors
#[derive(Debug, Default)]
pub struct MemoizingMapper {
    memo: RwLock<HashMap<String, TypeAnnotation>>,
}

impl MemoizingMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized descriptors
    pub fn memoized(&self) -> usize {
        self.memo.read().len()
    }
}

impl TypeMapper for MemoizingMapper {
    fn name(&self) -> &'static str {
        "memoizing"
    }

    fn map(&self, descriptor: &TypeDescriptor, resolver: &dyn StructResolver) -> Result<TypeAnnotation> {
        // Struct results depend on cache state (model vs. forward reference), so they
        // are never memoized here.
        if descriptor.contains_struct() {
            return map_shape(self, descriptor, resolver);
        }

        let key = memo_key(descriptor);
        if let Some(hit) = self.memo.read().get(&key) {
            return Ok(hit.clone());
        }

        let annotation = map_shape(self, descriptor, resolver)?;
        self.memo.write().entry(key).or_insert_with(|| annotation.clone());
        Ok(annotation)
    }
}

/// Unambiguous structural encoding of a descriptor.
///
/// Every node is a tag; names and values are length-prefixed and member lists carry
/// their count, so two different descriptors never share a key. Metadata of
/// `Annotated` wrappers is left out since it does not affect the mapping.
fn memo_key(descriptor: &TypeDescriptor) -> String {
    fn text(out: &mut String, value: &str) {
        out.push_str(&value.len().to_string());
        out.push(':');
        out.push_str(value);
    }

    fn optional(out: &mut String, inner: Option<&TypeDescriptor>) {
        match inner {
            Some(inner) => encode(out, inner),
            None => out.push('_'),
        }
    }

    fn members(out: &mut String, items: &[TypeDescriptor]) {
        out.push_str(&items.len().to_string());
        out.push('(');
        for item in items {
            encode(out, item);
        }
        out.push(')');
    }

    fn encode(out: &mut String, descriptor: &TypeDescriptor) {
        match descriptor {
            TypeDescriptor::Int => out.push('i'),
            TypeDescriptor::Str => out.push('s'),
            TypeDescriptor::Float => out.push('f'),
            TypeDescriptor::Bool => out.push('b'),
            TypeDescriptor::Bytes => out.push('y'),
            TypeDescriptor::ByteArray => out.push('Y'),
            TypeDescriptor::DateTime => out.push('D'),
            TypeDescriptor::Date => out.push('d'),
            TypeDescriptor::Time => out.push('t'),
            TypeDescriptor::Duration => out.push('r'),
            TypeDescriptor::Decimal => out.push('m'),
            TypeDescriptor::Uuid => out.push('u'),
            TypeDescriptor::None => out.push('n'),
            TypeDescriptor::List(item) => {
                out.push('L');
                optional(out, item.as_deref());
            }
            TypeDescriptor::Set(item) => {
                out.push('S');
                optional(out, item.as_deref());
            }
            TypeDescriptor::Tuple(Some(items)) => {
                out.push('T');
                members(out, items);
            }
            TypeDescriptor::Tuple(None) => out.push_str("T_"),
            TypeDescriptor::Dict { key, value } => {
                out.push('M');
                optional(out, key.as_deref());
                optional(out, value.as_deref());
            }
            TypeDescriptor::Union(items) => {
                out.push('U');
                members(out, items);
            }
            TypeDescriptor::Struct(reference) => {
                out.push('R');
                text(out, &reference.name());
            }
            TypeDescriptor::Enum(enum_type) => {
                out.push('E');
                text(out, &enum_type.name);
                out.push_str(&enum_type.variants.len().to_string());
                for variant in &enum_type.variants {
                    text(out, &variant.to_string());
                }
            }
            TypeDescriptor::Annotated(inner, _) => encode(out, inner),
            TypeDescriptor::Other(name) => {
                out.push('O');
                text(out, name);
            }
        }
    }

    let mut key = String::new();
    encode(&mut key, descriptor);
    key
}

/// Pick the mapper implementation for a cache
pub fn select_mapper(kind: MapperKind) -> Box<dyn TypeMapper> {
    let mapper: Box<dyn TypeMapper> = match kind {
        MapperKind::Standard => Box::new(StandardMapper),
        MapperKind::Memoizing => Box::new(MemoizingMapper::new()),
        MapperKind::Auto if cfg!(feature = "memoize") => Box::new(MemoizingMapper::new()),
        MapperKind::Auto => Box::new(StandardMapper),
    };
    info!("Using {} type mapper (requested: {:?})", mapper.name(), kind);
    mapper
}

/// One level of the mapping; children go back through `mapper`
fn map_shape(
    mapper: &dyn TypeMapper,
    descriptor: &TypeDescriptor,
    resolver: &dyn StructResolver,
) -> Result<TypeAnnotation> {
    let map_boxed = |inner: &TypeDescriptor| mapper.map(inner, resolver).map(Box::new);

    let annotation = match descriptor {
        TypeDescriptor::Int => TypeAnnotation::Integer,
        TypeDescriptor::Str => TypeAnnotation::String,
        TypeDescriptor::Float => TypeAnnotation::Float,
        TypeDescriptor::Bool => TypeAnnotation::Boolean,
        TypeDescriptor::Bytes | TypeDescriptor::ByteArray => TypeAnnotation::Binary,
        TypeDescriptor::DateTime => TypeAnnotation::DateTime,
        TypeDescriptor::Date => TypeAnnotation::Date,
        TypeDescriptor::Time => TypeAnnotation::Time,
        TypeDescriptor::Duration => TypeAnnotation::Duration,
        TypeDescriptor::Decimal => TypeAnnotation::Decimal,
        TypeDescriptor::Uuid => TypeAnnotation::Uuid,
        TypeDescriptor::None => TypeAnnotation::Null,
        TypeDescriptor::List(item) => TypeAnnotation::List(item.as_deref().map(map_boxed).transpose()?),
        TypeDescriptor::Set(item) => TypeAnnotation::Set(item.as_deref().map(map_boxed).transpose()?),
        TypeDescriptor::Tuple(items) => TypeAnnotation::Tuple(
            items
                .as_ref()
                .map(|items| items.iter().map(|t| mapper.map(t, resolver)).collect::<Result<Vec<_>>>())
                .transpose()?,
        ),
        TypeDescriptor::Dict {
            key: Some(key),
            value: Some(value),
        } => TypeAnnotation::Dict(Some((map_boxed(&**key)?, map_boxed(&**value)?))),
        TypeDescriptor::Dict { .. } => TypeAnnotation::Dict(None),
        TypeDescriptor::Union(members) => map_union(mapper, descriptor, members, resolver)?,
        TypeDescriptor::Struct(reference) => {
            let struct_type = reference.resolve().ok_or_else(|| {
                BridgeError::type_conversion(
                    descriptor,
                    format!("struct reference `{}` is not bound to a declaration", reference.name()),
                )
            })?;
            resolver.resolve_struct(&struct_type)?
        }
        TypeDescriptor::Enum(enum_type) => {
            if enum_type.variants.is_empty() {
                return Err(BridgeError::type_conversion(descriptor, "enum declares no variants"));
            }
            TypeAnnotation::Enum(enum_type.clone())
        }
        TypeDescriptor::Annotated(inner, _) => mapper.map(inner, resolver)?,
        TypeDescriptor::Other(name) => {
            debug!("Unrecognised type shape {}, documenting as any", name);
            TypeAnnotation::Any
        }
    };

    Ok(annotation)
}

fn map_union(
    mapper: &dyn TypeMapper,
    descriptor: &TypeDescriptor,
    members: &[TypeDescriptor],
    resolver: &dyn StructResolver,
) -> Result<TypeAnnotation> {
    if members.is_empty() {
        return Err(BridgeError::type_conversion(descriptor, "union declares no members"));
    }

    let mapped = members
        .iter()
        .map(|m| mapper.map(m, resolver))
        .collect::<Result<Vec<_>>>()?;
    let total = mapped.len();
    let mut non_null: Vec<TypeAnnotation> = mapped
        .into_iter()
        .filter(|a| !matches!(a, TypeAnnotation::Null))
        .collect();

    if non_null.len() == total {
        return Ok(match non_null.len() {
            1 => non_null.remove(0),
            _ => TypeAnnotation::Union(non_null),
        });
    }

    Ok(match non_null.len() {
        0 => TypeAnnotation::Null,
        1 => TypeAnnotation::Optional(Box::new(non_null.remove(0))),
        _ => TypeAnnotation::Optional(Box::new(TypeAnnotation::Union(non_null))),
    })
}

impl TypeAnnotation {
    pub fn is_optional(&self) -> bool {
        matches!(self, TypeAnnotation::Optional(_) | TypeAnnotation::Null | TypeAnnotation::Any)
    }

    /// JSON Schema fragment for this annotation; models are referenced, not inlined
    pub fn json_schema(&self) -> Value {
        match self {
            TypeAnnotation::Any => json!({}),
            TypeAnnotation::Integer => json!({ "type": "integer" }),
            TypeAnnotation::Float => json!({ "type": "number" }),
            TypeAnnotation::String => json!({ "type": "string" }),
            TypeAnnotation::Boolean => json!({ "type": "boolean" }),
            TypeAnnotation::Binary => json!({ "type": "string", "format": "binary" }),
            TypeAnnotation::DateTime => json!({ "type": "string", "format": "date-time" }),
            TypeAnnotation::Date => json!({ "type": "string", "format": "date" }),
            TypeAnnotation::Time => json!({ "type": "string", "format": "time" }),
            TypeAnnotation::Duration => json!({ "type": "string", "format": "duration" }),
            TypeAnnotation::Decimal => json!({ "type": "string", "format": "decimal" }),
            TypeAnnotation::Uuid => json!({ "type": "string", "format": "uuid" }),
            TypeAnnotation::Null => json!({ "type": "null" }),
            TypeAnnotation::List(item) => array_schema(item.as_deref(), false),
            TypeAnnotation::Set(item) => array_schema(item.as_deref(), true),
            TypeAnnotation::Tuple(Some(items)) => json!({
                "type": "array",
                "prefixItems": items.iter().map(TypeAnnotation::json_schema).collect::<Vec<_>>(),
                "minItems": items.len(),
                "maxItems": items.len(),
            }),
            TypeAnnotation::Tuple(None) => json!({ "type": "array" }),
            TypeAnnotation::Dict(Some((_, value))) => json!({
                "type": "object",
                "additionalProperties": value.json_schema(),
            }),
            TypeAnnotation::Dict(None) => json!({ "type": "object" }),
            TypeAnnotation::Optional(inner) => json!({
                "anyOf": [inner.json_schema(), { "type": "null" }],
            }),
            TypeAnnotation::Union(members) => json!({
                "anyOf": members.iter().map(TypeAnnotation::json_schema).collect::<Vec<_>>(),
            }),
            TypeAnnotation::Model(model) => component_ref(&model.name),
            TypeAnnotation::Forward(forward) => component_ref(forward.model_name()),
            TypeAnnotation::Enum(enum_type) => {
                let mut schema = Map::new();
                schema.insert("title".to_string(), json!(enum_type.name));
                if enum_type.variants.iter().all(Value::is_string) {
                    schema.insert("type".to_string(), json!("string"));
                }
                schema.insert("enum".to_string(), Value::Array(enum_type.variants.clone()));
                Value::Object(schema)
            }
        }
    }

    /// Models this annotation refers to directly (forward references resolved when possible)
    pub fn referenced_models(&self, out: &mut Vec<Arc<Model>>) {
        match self {
            TypeAnnotation::List(Some(item)) | TypeAnnotation::Set(Some(item)) | TypeAnnotation::Optional(item) => {
                item.referenced_models(out)
            }
            TypeAnnotation::Tuple(Some(items)) | TypeAnnotation::Union(items) => {
                items.iter().for_each(|a| a.referenced_models(out))
            }
            TypeAnnotation::Dict(Some((key, value))) => {
                key.referenced_models(out);
                value.referenced_models(out);
            }
            TypeAnnotation::Model(model) => out.push(model.clone()),
            TypeAnnotation::Forward(forward) => out.extend(forward.resolve()),
            _ => {}
        }
    }

    /// Check `value` against this annotation and return it normalized.
    ///
    /// Nested model values come back keyed by their output names.
    pub fn coerce(&self, value: &Value) -> std::result::Result<Value, ValidationError> {
        let mismatch = |expected: &str| {
            Err(ValidationError::new(
                Vec::new(),
                format!("expected {}, got {}", expected, value_kind(value)),
            ))
        };

        match self {
            TypeAnnotation::Any => Ok(value.clone()),
            TypeAnnotation::Integer if value.is_i64() || value.is_u64() => Ok(value.clone()),
            TypeAnnotation::Integer => mismatch("integer"),
            TypeAnnotation::Float if value.is_number() => Ok(value.clone()),
            TypeAnnotation::Float => mismatch("number"),
            TypeAnnotation::Boolean if value.is_boolean() => Ok(value.clone()),
            TypeAnnotation::Boolean => mismatch("boolean"),
            TypeAnnotation::Decimal if value.is_string() || value.is_number() => Ok(value.clone()),
            TypeAnnotation::Decimal => mismatch("decimal"),
            TypeAnnotation::String
            | TypeAnnotation::Binary
            | TypeAnnotation::DateTime
            | TypeAnnotation::Date
            | TypeAnnotation::Time
            | TypeAnnotation::Duration
            | TypeAnnotation::Uuid
                if value.is_string() =>
            {
                Ok(value.clone())
            }
            TypeAnnotation::String
            | TypeAnnotation::Binary
            | TypeAnnotation::DateTime
            | TypeAnnotation::Date
            | TypeAnnotation::Time
            | TypeAnnotation::Duration
            | TypeAnnotation::Uuid => mismatch("string"),
            TypeAnnotation::Null if value.is_null() => Ok(Value::Null),
            TypeAnnotation::Null => mismatch("null"),
            TypeAnnotation::List(item) | TypeAnnotation::Set(item) => match value {
                Value::Array(values) => coerce_items(values, |_| item.as_deref()),
                _ => mismatch("array"),
            },
            TypeAnnotation::Tuple(items) => match (value, items) {
                (Value::Array(values), Some(items)) if values.len() != items.len() => Err(ValidationError::new(
                    Vec::new(),
                    format!("expected {} items, got {}", items.len(), values.len()),
                )),
                (Value::Array(values), items) => coerce_items(values, |i| items.as_ref().map(|items| &items[i])),
                _ => mismatch("array"),
            },
            TypeAnnotation::Dict(entries) => match value {
                Value::Object(map) => {
                    let mut out = Map::new();
                    for (key, item) in map {
                        let coerced = match entries {
                            Some((_, value_type)) => value_type.coerce(item).map_err(|e| e.within(key.clone()))?,
                            None => item.clone(),
                        };
                        out.insert(key.clone(), coerced);
                    }
                    Ok(Value::Object(out))
                }
                _ => mismatch("object"),
            },
            TypeAnnotation::Optional(_) if value.is_null() => Ok(Value::Null),
            TypeAnnotation::Optional(inner) => inner.coerce(value),
            TypeAnnotation::Union(members) => members
                .iter()
                .find_map(|m| m.coerce(value).ok())
                .map_or_else(|| mismatch("one of the union members"), Ok),
            TypeAnnotation::Model(model) => model.validate_input(value),
            TypeAnnotation::Forward(forward) => match forward.resolve() {
                Some(model) => model.validate_input(value),
                None => Ok(value.clone()),
            },
            TypeAnnotation::Enum(enum_type) if enum_type.variants.contains(value) => Ok(value.clone()),
            TypeAnnotation::Enum(enum_type) => Err(ValidationError::new(
                Vec::new(),
                format!("{} is not a valid {}", value, enum_type.name),
            )),
        }
    }
}

fn coerce_items<'a, F>(values: &[Value], item_type: F) -> std::result::Result<Value, ValidationError>
where
    F: Fn(usize) -> Option<&'a TypeAnnotation>,
{
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match item_type(i) {
            Some(annotation) => annotation.coerce(v).map_err(|e| e.within(i.to_string())),
            None => Ok(v.clone()),
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn array_schema(item: Option<&TypeAnnotation>, unique: bool) -> Value {
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("array"));
    if let Some(item) = item {
        schema.insert("items".to_string(), item.json_schema());
    }
    if unique {
        schema.insert("uniqueItems".to_string(), json!(true));
    }
    Value::Object(schema)
}

/// `$ref` into the OpenAPI components section
pub fn component_ref(model_name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{}", model_name) })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Meta, StructSlot};
    use pretty_assertions::assert_eq;

    /// Resolver for tests that never reach a struct
    struct NoStructs;

    impl StructResolver for NoStructs {
        fn resolve_struct(&self, struct_type: &StructType) -> Result<TypeAnnotation> {
            panic!("unexpected struct {}", struct_type.name())
        }
    }

    fn map(descriptor: &TypeDescriptor) -> Result<TypeAnnotation> {
        StandardMapper.map(descriptor, &NoStructs)
    }

    #[test]
    fn test_scalars() {
        let cases = vec![
            (TypeDescriptor::Int, json!({ "type": "integer" })),
            (TypeDescriptor::Str, json!({ "type": "string" })),
            (TypeDescriptor::Float, json!({ "type": "number" })),
            (TypeDescriptor::Bool, json!({ "type": "boolean" })),
            (TypeDescriptor::Bytes, json!({ "type": "string", "format": "binary" })),
            (TypeDescriptor::ByteArray, json!({ "type": "string", "format": "binary" })),
            (TypeDescriptor::DateTime, json!({ "type": "string", "format": "date-time" })),
            (TypeDescriptor::Date, json!({ "type": "string", "format": "date" })),
            (TypeDescriptor::Time, json!({ "type": "string", "format": "time" })),
            (TypeDescriptor::Duration, json!({ "type": "string", "format": "duration" })),
            (TypeDescriptor::Decimal, json!({ "type": "string", "format": "decimal" })),
            (TypeDescriptor::Uuid, json!({ "type": "string", "format": "uuid" })),
            (TypeDescriptor::None, json!({ "type": "null" })),
        ];

        for (descriptor, expected) in cases {
            assert_eq!(map(&descriptor).unwrap().json_schema(), expected, "{}", descriptor);
        }
    }

    #[test]
    fn test_optional_collapses() {
        let annotation = map(&TypeDescriptor::optional(TypeDescriptor::Str)).unwrap();
        match annotation {
            TypeAnnotation::Optional(inner) => assert!(matches!(*inner, TypeAnnotation::String)),
            other => panic!("expected optional, got {:?}", other),
        }

        // Order of the members does not matter
        let annotation = map(&TypeDescriptor::union(vec![TypeDescriptor::None, TypeDescriptor::Int])).unwrap();
        assert!(matches!(annotation, TypeAnnotation::Optional(ref inner) if matches!(**inner, TypeAnnotation::Integer)));
    }

    #[test]
    fn test_multi_member_union_with_none() {
        let annotation = map(&TypeDescriptor::union(vec![
            TypeDescriptor::Int,
            TypeDescriptor::Str,
            TypeDescriptor::None,
        ]))
        .unwrap();

        assert_eq!(
            annotation.json_schema(),
            json!({
                "anyOf": [
                    { "anyOf": [{ "type": "integer" }, { "type": "string" }] },
                    { "type": "null" }
                ]
            })
        );
    }

    #[test]
    fn test_plain_union() {
        let annotation = map(&TypeDescriptor::union(vec![TypeDescriptor::Int, TypeDescriptor::Str])).unwrap();
        assert!(matches!(annotation, TypeAnnotation::Union(ref members) if members.len() == 2));
    }

    #[test]
    fn test_empty_union_is_malformed() {
        let err = map(&TypeDescriptor::union(vec![])).unwrap_err();
        assert!(matches!(err, BridgeError::TypeConversion { ref field_type, .. } if field_type == "union[]"));
    }

    #[test]
    fn test_composites() {
        let annotation = map(&TypeDescriptor::dict(
            TypeDescriptor::Str,
            TypeDescriptor::set(TypeDescriptor::Int),
        ))
        .unwrap();
        assert_eq!(
            annotation.json_schema(),
            json!({
                "type": "object",
                "additionalProperties": { "type": "array", "items": { "type": "integer" }, "uniqueItems": true }
            })
        );

        let annotation = map(&TypeDescriptor::tuple(vec![TypeDescriptor::Int, TypeDescriptor::Str])).unwrap();
        assert_eq!(
            annotation.json_schema(),
            json!({
                "type": "array",
                "prefixItems": [{ "type": "integer" }, { "type": "string" }],
                "minItems": 2,
                "maxItems": 2
            })
        );
    }

    #[test]
    fn test_untyped_composites() {
        assert!(matches!(map(&TypeDescriptor::List(None)).unwrap(), TypeAnnotation::List(None)));
        assert!(matches!(map(&TypeDescriptor::Set(None)).unwrap(), TypeAnnotation::Set(None)));
        assert!(matches!(map(&TypeDescriptor::Tuple(None)).unwrap(), TypeAnnotation::Tuple(None)));
        let half = TypeDescriptor::Dict {
            key: Some(Box::new(TypeDescriptor::Str)),
            value: None,
        };
        assert!(matches!(map(&half).unwrap(), TypeAnnotation::Dict(None)));
    }

    #[test]
    fn test_unknown_shape_is_any() {
        let annotation = map(&TypeDescriptor::Other("Frobnicator".to_string())).unwrap();
        assert!(matches!(annotation, TypeAnnotation::Any));
        assert_eq!(annotation.json_schema(), json!({}));
    }

    #[test]
    fn test_annotated_unwraps() {
        let descriptor = TypeDescriptor::annotated(TypeDescriptor::Int, Meta::description("User id"));
        assert!(matches!(map(&descriptor).unwrap(), TypeAnnotation::Integer));
    }

    #[test]
    fn test_enum_kept() {
        let color = EnumType::of_strings("Color", ["red", "green"]);
        let annotation = map(&TypeDescriptor::Enum(color.clone())).unwrap();
        assert_eq!(
            annotation.json_schema(),
            json!({ "title": "Color", "type": "string", "enum": ["red", "green"] })
        );

        let err = map(&TypeDescriptor::Enum(EnumType::new("Empty", vec![]))).unwrap_err();
        assert!(matches!(err, BridgeError::TypeConversion { .. }));
    }

    #[test]
    fn test_unbound_struct_reference_is_malformed() {
        let slot = StructSlot::new("Ghost");
        let err = map(&TypeDescriptor::Struct(slot.reference())).unwrap_err();
        match err {
            BridgeError::TypeConversion { field_type, cause, .. } => {
                assert_eq!(field_type, "struct Ghost");
                assert!(cause.contains("Ghost"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_memoizing_mapper_does_not_collide() {
        let mapper = MemoizingMapper::new();
        let ints = mapper.map(&TypeDescriptor::list(TypeDescriptor::Int), &NoStructs).unwrap();
        let strs = mapper.map(&TypeDescriptor::list(TypeDescriptor::Str), &NoStructs).unwrap();

        assert_eq!(ints.json_schema(), json!({ "type": "array", "items": { "type": "integer" } }));
        assert_eq!(strs.json_schema(), json!({ "type": "array", "items": { "type": "string" } }));
        // list[int], int, list[str], str
        assert_eq!(mapper.memoized(), 4);

        let again = mapper.map(&TypeDescriptor::list(TypeDescriptor::Int), &NoStructs).unwrap();
        assert_eq!(again.json_schema(), ints.json_schema());
        assert_eq!(mapper.memoized(), 4);
    }

    #[test]
    fn test_memoizing_mapper_tuples_with_lookalike_names() {
        let mapper = MemoizingMapper::new();
        let single = TypeDescriptor::tuple(vec![TypeDescriptor::Other("a, int".to_string())]);
        let pair = TypeDescriptor::tuple(vec![TypeDescriptor::Other("a".to_string()), TypeDescriptor::Int]);
        assert_eq!(single.to_string(), pair.to_string());

        let first = mapper.map(&single, &NoStructs).unwrap();
        let second = mapper.map(&pair, &NoStructs).unwrap();

        assert_eq!(first.json_schema()["minItems"], json!(1));
        assert_eq!(second.json_schema(), map(&pair).unwrap().json_schema());
        assert_eq!(second.json_schema()["minItems"], json!(2));
    }

    #[test]
    fn test_memo_keys_are_structural() {
        let enum_a = TypeDescriptor::Enum(EnumType::of_strings("Level", ["low", "high"]));
        let enum_b = TypeDescriptor::Enum(EnumType::of_strings("Level", ["low"]));
        assert_ne!(memo_key(&enum_a), memo_key(&enum_b));

        let nested = TypeDescriptor::union(vec![TypeDescriptor::union(vec![TypeDescriptor::Int, TypeDescriptor::Str])]);
        let flat = TypeDescriptor::union(vec![TypeDescriptor::Int, TypeDescriptor::Str]);
        assert_ne!(memo_key(&nested), memo_key(&flat));

        let annotated = TypeDescriptor::annotated(TypeDescriptor::Int, Meta::description("count"));
        assert_eq!(memo_key(&annotated), memo_key(&TypeDescriptor::Int));
    }

    #[test]
    fn test_select_mapper() {
        assert_eq!(select_mapper(MapperKind::Standard).name(), "standard");
        assert_eq!(select_mapper(MapperKind::Memoizing).name(), "memoizing");
        let expected = if cfg!(feature = "memoize") { "memoizing" } else { "standard" };
        assert_eq!(select_mapper(MapperKind::Auto).name(), expected);
    }

    #[test]
    fn test_coerce_values() {
        let tags = map(&TypeDescriptor::list(TypeDescriptor::Str)).unwrap();
        assert_eq!(tags.coerce(&json!(["a", "b"])).unwrap(), json!(["a", "b"]));

        let err = tags.coerce(&json!(["a", 1])).unwrap_err();
        assert_eq!(err.loc, vec!["1".to_string()]);
        assert_eq!(err.message, "expected string, got number");

        let maybe = map(&TypeDescriptor::optional(TypeDescriptor::Int)).unwrap();
        assert_eq!(maybe.coerce(&Value::Null).unwrap(), Value::Null);
        assert!(maybe.coerce(&json!("x")).is_err());

        let pair = map(&TypeDescriptor::tuple(vec![TypeDescriptor::Int, TypeDescriptor::Bool])).unwrap();
        assert!(pair.coerce(&json!([1, true])).is_ok());
        assert!(pair.coerce(&json!([1])).is_err());
    }
}
