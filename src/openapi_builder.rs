use crate::envelope::{envelope_schema, paginated_envelope_schema};
use crate::schema_builder::Model;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// OpenAPI document builder - collects model schemas into the components section
pub struct OpenApiBuilder {
    info: Info,
    schemas: BTreeMap<String, Value>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub schemas: BTreeMap<String, Value>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    /// Always empty; documents produced here only describe schemas
    pub paths: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl OpenApiBuilder {
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "Generated Schemas".to_string(),
                version: "1.0.0".to_string(),
                description: Some("Schemas generated from Rust struct declarations".to_string()),
            },
            schemas: BTreeMap::new(),
        }
    }

    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Add `model` and every model it references
    pub fn add_model(&mut self, model: &Arc<Model>) {
        debug!("Adding model {}", model.name);
        self.schemas.extend(model.collect_definitions());
    }

    /// Add the single and paginated envelope schemas wrapping `model`
    pub fn add_envelopes(&mut self, model: &Model) {
        let mut single = envelope_schema(model.reference());
        single["title"] = json!(format!("{}Envelope", model.name));
        let mut page = paginated_envelope_schema(model.reference());
        page["title"] = json!(format!("{}Page", model.name));

        debug!("Adding envelopes for {}", model.name);
        self.schemas.insert(format!("{}Envelope", model.name), single);
        self.schemas.insert(format!("{}Page", model.name), page);
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    pub fn build(self) -> OpenApiDocument {
        debug!("Building OpenAPI document with {} schemas", self.schemas.len());
        let components = (!self.schemas.is_empty()).then(|| Components {
            schemas: self.schemas,
        });

        OpenApiDocument {
            openapi: "3.0.0".to_string(),
            info: self.info,
            paths: BTreeMap::new(),
            components,
        }
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{StructRef, StructType, TypeDescriptor};
    use crate::schema_cache::SchemaCache;
    use pretty_assertions::assert_eq;

    fn order_model(cache: &SchemaCache) -> Arc<Model> {
        let address = StructType::builder("Address").field("city", TypeDescriptor::Str).build();
        let order = StructType::builder("Order")
            .field("id", TypeDescriptor::Int)
            .field("ship_to", TypeDescriptor::Struct(StructRef::direct(address)))
            .build();
        cache.model_for(&order).unwrap()
    }

    #[test]
    fn test_empty_document() {
        let doc = OpenApiBuilder::new().build();

        assert_eq!(doc.openapi, "3.0.0");
        assert_eq!(doc.info.title, "Generated Schemas");
        assert!(doc.paths.is_empty());
        assert!(doc.components.is_none());
    }

    #[test]
    fn test_with_info() {
        let doc = OpenApiBuilder::new()
            .with_info("Shop".to_string(), "2.1.0".to_string(), None)
            .build();

        assert_eq!(
            doc.info,
            Info {
                title: "Shop".to_string(),
                version: "2.1.0".to_string(),
                description: None
            }
        );
    }

    #[test]
    fn test_models_include_references() {
        let cache = SchemaCache::new();
        let mut builder = OpenApiBuilder::new();
        builder.add_model(&order_model(&cache));

        let doc = builder.build();
        let schemas = doc.components.unwrap().schemas;
        assert_eq!(
            schemas.keys().cloned().collect::<Vec<_>>(),
            vec!["AddressSchema".to_string(), "OrderSchema".to_string()]
        );
        assert_eq!(
            schemas["OrderSchema"]["properties"]["ship_to"],
            json!({ "$ref": "#/components/schemas/AddressSchema" })
        );
    }

    #[test]
    fn test_envelopes() {
        let cache = SchemaCache::new();
        let model = order_model(&cache);
        let mut builder = OpenApiBuilder::new();
        builder.add_model(&model);
        builder.add_envelopes(&model);
        assert_eq!(builder.schema_count(), 4);

        let schemas = builder.build().components.unwrap().schemas;
        let single = &schemas["OrderSchemaEnvelope"];
        assert_eq!(single["title"], json!("OrderSchemaEnvelope"));
        assert_eq!(
            single["properties"]["data"]["anyOf"][0],
            json!({ "$ref": "#/components/schemas/OrderSchema" })
        );
        assert_eq!(
            schemas["OrderSchemaPage"]["properties"]["items"]["items"],
            json!({ "$ref": "#/components/schemas/OrderSchema" })
        );
    }

    #[test]
    fn test_document_serializes_without_components_when_empty() {
        let value = serde_json::to_value(OpenApiBuilder::new().build()).unwrap();
        assert!(value.get("components").is_none());
        assert_eq!(value["paths"], json!({}));
    }
}
