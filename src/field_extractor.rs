//! Field enumeration for struct declarations.
//!
//! [`FieldExtractor::extract`] resolves, for every declared field, the name it travels
//! under on the wire, its default and any inline metadata. The schema builder consumes
//! the result; nothing here looks at the field types beyond their `Annotated` wrapper.

use crate::descriptor::{DefaultValue, StructType, TypeDescriptor};
use crate::error::{BridgeError, Result};
use log::debug;
use serde_json::Value;
use std::collections::HashSet;

/// Field extractor - enumerates the fields of a struct declaration
pub struct FieldExtractor;

/// A field as seen by the schema builder
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Declared field name
    pub name: String,
    /// Declared type, including any `Annotated` wrapper
    pub ty: TypeDescriptor,
    /// Default discipline after factories have run
    pub default: FieldDefault,
    /// Name used on the wire
    pub encoded_name: String,
    /// Description from an `Annotated` wrapper
    pub description: Option<String>,
    /// Examples from an `Annotated` wrapper
    pub examples: Vec<Value>,
}

/// Resolved default of an extracted field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Required,
    Value(Value),
}

impl FieldDescriptor {
    pub fn is_renamed(&self) -> bool {
        self.encoded_name != self.name
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, FieldDefault::Required)
    }
}

impl FieldExtractor {
    /// Extract the fields of `struct_type` in declaration order.
    ///
    /// Default factories are invoked here, once per extraction.
    ///
    /// # Arguments
    ///
    /// * `struct_type` - The struct declaration to enumerate
    ///
    /// # Returns
    ///
    /// One `FieldDescriptor` per declared field, with the encoded name resolved as
    /// explicit wire name, then the struct's rename rule, then the field name.
    ///
    /// # Errors
    ///
    /// Returns a schema generation error when two fields share an encoded name.
    pub fn extract(struct_type: &StructType) -> Result<Vec<FieldDescriptor>> {
        debug!("Extracting fields of {}", struct_type.name());

        let rule = struct_type.rename_rule();
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(struct_type.fields().len());

        for decl in struct_type.fields() {
            let encoded_name = match (&decl.wire_name, rule) {
                (Some(wire_name), _) => wire_name.clone(),
                (None, Some(rule)) => rule.apply(&decl.name),
                (None, None) => decl.name.clone(),
            };

            if !seen.insert(encoded_name.clone()) {
                return Err(BridgeError::schema_generation(
                    struct_type.name(),
                    format!("field '{}' reuses the encoded name '{}'", decl.name, encoded_name),
                ));
            }

            let default = match &decl.default {
                DefaultValue::Required => FieldDefault::Required,
                DefaultValue::Value(value) => FieldDefault::Value(value.clone()),
                DefaultValue::Factory(factory) => FieldDefault::Value(factory()),
            };

            let (description, examples) = decl
                .ty
                .meta()
                .map(|meta| (meta.description.clone(), meta.examples.clone()))
                .unwrap_or_default();

            debug!("Field {} -> {} ({})", decl.name, encoded_name, decl.ty);
            fields.push(FieldDescriptor {
                name: decl.name.clone(),
                ty: decl.ty.clone(),
                default,
                encoded_name,
                description,
                examples,
            });
        }

        debug!("Extracted {} fields", fields.len());
        Ok(fields)
    }
}
