//! Generated models and the builder that produces them.
//!
//! A [`Model`] is the validation-model counterpart of one struct: ordered fields with
//! their annotations, aliases and defaults. Besides documentation ([`Model::json_schema`])
//! it accepts input bodies keyed by either spelling of a renamed field
//! ([`Model::validate_input`]).
//!
//! ```
//! use serde_json::json;
//! use struct_schema_bridge::descriptor::{RenameRule, StructType, TypeDescriptor};
//! use struct_schema_bridge::schema_cache::SchemaCache;
//!
//! let order = StructType::builder("Order")
//!     .rename_all(RenameRule::CamelCase)
//!     .field("order_id", TypeDescriptor::Int)
//!     .build();
//! let model = SchemaCache::new().model_for(&order).unwrap();
//!
//! assert_eq!(model.validate_input(&json!({ "order_id": 7 })).unwrap(), json!({ "orderId": 7 }));
//! ```

use crate::descriptor::{StructId, StructType};
use crate::error::{BridgeError, Result, ValidationError};
use crate::field_extractor::{FieldDefault, FieldExtractor};
use crate::schema_cache::SchemaCache;
use crate::type_mapper::{component_ref, TypeAnnotation};
use log::{debug, error, warn};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Schema builder - turns one struct declaration into a generated model.
///
/// Only the cache's miss path calls [`SchemaBuilder::build`]; everything else goes through
/// [`SchemaCache::model_for`] so that each struct is converted once.
pub struct SchemaBuilder<'a> {
    cache: &'a SchemaCache,
}

/// Validation-model equivalent of a struct declaration
#[derive(Debug)]
pub struct Model {
    /// Model name (struct name plus the configured suffix)
    pub name: String,
    /// One property per struct field, in declaration order
    pub fields: Vec<ModelField>,
    pub config: ModelConfig,
    /// The struct this model documents
    pub origin: ModelOrigin,
}

/// Property of a generated model
#[derive(Debug, Clone)]
pub struct ModelField {
    /// Declared field name
    pub name: String,
    /// Encoded name, present only when it differs from `name`
    pub alias: Option<String>,
    pub annotation: TypeAnnotation,
    pub default: FieldDefault,
    pub description: Option<String>,
    pub examples: Vec<Value>,
}

/// Model-level behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelConfig {
    /// Accept input keyed by the declared name as well as the alias
    pub populate_by_name: bool,
}

/// Informational back-reference to the originating struct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOrigin {
    pub struct_id: StructId,
    pub struct_name: String,
}

impl ModelField {
    /// The only key this field is documented and emitted under
    pub fn output_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, FieldDefault::Required)
    }

    fn property_schema(&self) -> Value {
        let mut extras = Map::new();
        if let FieldDefault::Value(value) = &self.default {
            extras.insert("default".to_string(), value.clone());
        }
        if let Some(description) = &self.description {
            extras.insert("description".to_string(), json!(description));
        }
        if !self.examples.is_empty() {
            extras.insert("examples".to_string(), Value::Array(self.examples.clone()));
        }

        let schema = self.annotation.json_schema();
        if extras.is_empty() {
            return schema;
        }

        // Siblings of `$ref` are ignored by OpenAPI 3.0 tooling, so wrap the reference.
        let mut property = match schema {
            Value::Object(map) if !map.contains_key("$ref") => map,
            other => {
                let mut wrapper = Map::new();
                wrapper.insert("allOf".to_string(), json!([other]));
                wrapper
            }
        };
        property.extend(extras);
        Value::Object(property)
    }
}

impl Model {
    /// Documented output keys, in field order
    pub fn output_keys(&self) -> Vec<&str> {
        self.fields.iter().map(ModelField::output_key).collect()
    }

    /// Whether an input object may carry `key`
    pub fn accepts_key(&self, key: &str) -> bool {
        self.field_for_input(key).is_some()
    }

    /// The field an input key populates
    pub fn field_for_input(&self, key: &str) -> Option<&ModelField> {
        self.fields
            .iter()
            .find(|f| f.output_key() == key || (self.config.populate_by_name && f.name == key))
    }

    /// Validate an input body and return it keyed by output names, defaults filled in.
    ///
    /// Keys that match no field are dropped.
    ///
    /// # Arguments
    ///
    /// * `value` - The decoded body; must be a JSON object
    ///
    /// # Returns
    ///
    /// A JSON object holding every field under its output key.
    ///
    /// # Errors
    ///
    /// A `ValidationError` locating the first missing field or mismatched value.
    pub fn validate_input(&self, value: &Value) -> std::result::Result<Value, ValidationError> {
        let Value::Object(input) = value else {
            return Err(ValidationError::new(
                Vec::new(),
                format!("expected an object for {}", self.name),
            ));
        };

        let mut output = Map::new();
        for field in &self.fields {
            let key = field.output_key();
            let found = input.get(key).or_else(|| {
                if self.config.populate_by_name {
                    input.get(&field.name)
                } else {
                    None
                }
            });

            let value = match (found, &field.default) {
                (Some(value), _) => field.annotation.coerce(value).map_err(|e| e.within(key))?,
                (None, FieldDefault::Value(default)) => default.clone(),
                (None, FieldDefault::Required) => {
                    return Err(ValidationError::new(vec![key.to_string()], "field required"))
                }
            };
            output.insert(key.to_string(), value);
        }

        Ok(Value::Object(output))
    }

    /// JSON Schema of this model; nested models appear as component references
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            properties.insert(field.output_key().to_string(), field.property_schema());
            if field.is_required() {
                required.push(json!(field.output_key()));
            }
        }

        let mut schema = Map::new();
        schema.insert("title".to_string(), json!(self.name));
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// JSON Schemas of this model and every model reachable from it, by name
    pub fn collect_definitions(self: &Arc<Self>) -> BTreeMap<String, Value> {
        let mut definitions = BTreeMap::new();
        let mut visited = HashSet::new();
        let mut pending = vec![self.clone()];

        while let Some(model) = pending.pop() {
            if !visited.insert(model.origin.struct_id) {
                continue;
            }
            for field in &model.fields {
                field.annotation.referenced_models(&mut pending);
            }
            definitions.insert(model.name.clone(), model.json_schema());
        }

        definitions
    }

    /// `$ref` to this model in the components section
    pub fn reference(&self) -> Value {
        component_ref(&self.name)
    }
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(cache: &'a SchemaCache) -> Self {
        Self { cache }
    }

    /// Build the model for `struct_type`.
    ///
    /// # Arguments
    ///
    /// * `struct_type` - The struct declaration to convert
    ///
    /// # Returns
    ///
    /// The `Model` named after the struct plus the configured suffix. Nested structs
    /// are obtained through the cache, so they are converted at most once.
    ///
    /// # Errors
    ///
    /// A struct either converts completely or not at all. Type conversion errors and
    /// errors from nested structs propagate unchanged (the former gain the field name);
    /// anything else is reported as a schema generation error naming this struct.
    pub fn build(&self, struct_type: &StructType) -> Result<Model> {
        debug!("Generating struct schema for: {}", struct_type.name());

        let fields = FieldExtractor::extract(struct_type).map_err(|e| self.wrap(struct_type, e))?;
        if fields.is_empty() {
            warn!("No fields found in struct {}", struct_type.name());
        }

        let renamed = fields.iter().any(|f| f.is_renamed());
        let mut model_fields = Vec::with_capacity(fields.len());

        for field in fields {
            let annotation = self
                .cache
                .mapper()
                .map(&field.ty, self.cache)
                .map_err(|e| self.wrap(struct_type, e.with_field_name(&field.name)))?;

            let alias = field.is_renamed().then(|| field.encoded_name.clone());
            model_fields.push(ModelField {
                name: field.name,
                alias,
                annotation,
                default: field.default,
                description: field.description,
                examples: field.examples,
            });
        }

        let model = Model {
            name: self.cache.model_name(struct_type),
            fields: model_fields,
            config: ModelConfig {
                populate_by_name: renamed,
            },
            origin: ModelOrigin {
                struct_id: struct_type.id(),
                struct_name: struct_type.name().to_string(),
            },
        };
        debug!(
            "Successfully generated schema {} ({} fields, renamed: {})",
            model.name,
            model.fields.len(),
            renamed
        );
        Ok(model)
    }

    fn wrap(&self, struct_type: &StructType, err: BridgeError) -> BridgeError {
        match err {
            BridgeError::TypeConversion { .. } | BridgeError::SchemaGeneration { .. } => {
                error!("Failed to generate schema for {}: {}", struct_type.name(), err);
                err
            }
            other => {
                error!("Failed to generate schema for {}: {}", struct_type.name(), other);
                BridgeError::schema_generation(struct_type.name(), other)
            }
        }
    }
}
