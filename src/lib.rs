//! Struct Schema Bridge - validation-model schemas for plain Rust structs.
//!
//! Request and response payloads are handled by a fast serialization layer working on
//! plain structs; API documentation needs a richer validation model for each of them.
//! This crate derives that model once per struct type and caches it.
//!
//! # Architecture
//!
//! 1. [`descriptor`] - struct, field and type descriptors (the input)
//! 2. [`type_mapper`] - maps type descriptors to model type annotations
//! 3. [`field_extractor`] - enumerates a struct's fields with wire names and defaults
//! 4. [`schema_builder`] - builds the [`Model`](schema_builder::Model) for one struct
//! 5. [`schema_cache`] - memoizes models by struct identity, safe for concurrent and
//!    recursive use
//! 6. [`envelope`] - response envelopes, pagination metadata and their schemas
//! 7. [`source`] - struct declarations read from Rust source with `syn`
//! 8. [`openapi_builder`] / [`serializer`] - OpenAPI components document and its text forms
//!
//! # Example
//!
//! ```
//! use struct_schema_bridge::descriptor::{RenameRule, StructType, TypeDescriptor};
//! use struct_schema_bridge::schema_cache::SchemaCache;
//! use serde_json::{json, Value};
//!
//! let user = StructType::builder("User")
//!     .rename_all(RenameRule::CamelCase)
//!     .field("id", TypeDescriptor::Int)
//!     .field_with_default("full_name", TypeDescriptor::optional(TypeDescriptor::Str), Value::Null)
//!     .build();
//!
//! let cache = SchemaCache::new();
//! let model = cache.model_for(&user).unwrap();
//!
//! assert_eq!(model.name, "UserSchema");
//! assert_eq!(model.output_keys(), vec!["id", "fullName"]);
//! assert_eq!(model.json_schema()["required"], json!(["id"]));
//! ```

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod envelope;
pub mod error;
pub mod field_extractor;
pub mod openapi_builder;
pub mod schema_builder;
pub mod schema_cache;
pub mod serializer;
pub mod source;
pub mod type_mapper;

pub use error::{BridgeError, Result};
