//! Struct declarations read from Rust source.
//!
//! A [`SourceIndex`] parses every `.rs` file below a root with `syn` and turns
//! named-field structs into [`StructType`]s and unit-only enums into [`EnumType`]s,
//! honouring the serde attributes that change the wire form. Struct fields that name
//! another indexed struct (including the struct itself) become late-bound struct
//! references, so recursive declarations convert like any other.

pub mod attrs;
pub mod files;
pub mod types;

use crate::descriptor::{EnumType, FieldDecl, Meta, StructSlot, StructType, TypeDescriptor};
use anyhow::{Context, Result};
use attrs::{doc_comment, SerdeAttrs};
use files::SourceFile;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use syn::ext::IdentExt;
use syn::{Fields, Item, ItemEnum, ItemStruct};
use types::{type_default, TypeLowering};

/// Declarations indexed by type name
#[derive(Debug, Default)]
pub struct SourceIndex {
    structs: Vec<StructType>,
    enums: Vec<EnumType>,
    warnings: Vec<String>,
}

impl SourceIndex {
    /// Index every Rust file at `root` (a file or a directory)
    pub fn from_path(root: &Path) -> Result<Self> {
        let discovery = files::discover(root)?;
        let (parsed, parse_warnings) = files::parse_all(&discovery.files);

        let mut index = Self::from_files(&parsed);
        let mut warnings = discovery.warnings;
        warnings.extend(parse_warnings);
        warnings.append(&mut index.warnings);
        index.warnings = warnings;
        info!(
            "Indexed {} structs and {} enums from {} files",
            index.structs.len(),
            index.enums.len(),
            parsed.len()
        );
        Ok(index)
    }

    /// Index a single source text
    pub fn from_source(code: &str) -> Result<Self> {
        let syntax = syn::parse_file(code).context("Failed to parse Rust syntax")?;
        Ok(Self::from_items(&collect_items(&syntax.items)))
    }

    pub fn from_files(files: &[SourceFile]) -> Self {
        let items: Vec<&Item> = files.iter().flat_map(|f| collect_items(&f.syntax.items)).collect();
        Self::from_items(&items)
    }

    fn from_items(items: &[&Item]) -> Self {
        let mut index = SourceIndex::default();
        let mut struct_items: Vec<&ItemStruct> = Vec::new();
        let mut enum_items: Vec<&ItemEnum> = Vec::new();

        for item in items {
            match item {
                Item::Struct(item) if matches!(item.fields, Fields::Named(_)) => struct_items.push(item),
                Item::Struct(item) => debug!("Skipping struct {} without named fields", item.ident),
                Item::Enum(item) => enum_items.push(item),
                _ => {}
            }
        }

        let mut enums: HashMap<String, EnumType> = HashMap::new();
        for item in enum_items {
            if let Some(enum_type) = index.lower_enum(item) {
                if enums.contains_key(&enum_type.name) {
                    index.warn(format!("Duplicate enum {}, keeping the first declaration", enum_type.name));
                    continue;
                }
                enums.insert(enum_type.name.clone(), enum_type.clone());
                index.enums.push(enum_type);
            }
        }

        let mut slots: HashMap<String, StructSlot> = HashMap::new();
        let mut declared: Vec<&ItemStruct> = Vec::new();
        for item in struct_items {
            let name = item.ident.to_string();
            if slots.contains_key(&name) {
                index.warn(format!("Duplicate struct {}, keeping the first declaration", name));
                continue;
            }
            slots.insert(name.clone(), StructSlot::new(&name));
            declared.push(item);
        }

        let lowering = TypeLowering {
            structs: &slots,
            enums: &enums,
        };
        for item in declared {
            let struct_type = index.lower_struct(item, &lowering);
            if let Some(slot) = slots.get(struct_type.name()) {
                slot.fill(struct_type.clone());
            }
            index.structs.push(struct_type);
        }

        index.structs.sort_by(|a, b| a.name().cmp(b.name()));
        index.enums.sort_by(|a, b| a.name.cmp(&b.name));
        index
    }

    fn lower_struct(&mut self, item: &ItemStruct, lowering: &TypeLowering) -> StructType {
        let name = item.ident.to_string();
        let container = SerdeAttrs::parse(&item.attrs);
        let mut builder = StructType::builder(&name);
        if let Some(rule) = container.rename_all {
            builder = builder.rename_all(rule);
        }

        let Fields::Named(named) = &item.fields else {
            return builder.build();
        };

        for field in &named.named {
            let Some(ident) = &field.ident else { continue };
            let field_name = ident.unraw().to_string();
            let serde = SerdeAttrs::parse(&field.attrs);
            if serde.skip {
                debug!("Skipping field {}.{}", name, field_name);
                continue;
            }
            if serde.flatten {
                self.warn(format!(
                    "{}.{} is flattened; documenting it as a nested property",
                    name, field_name
                ));
            }

            let mut ty = lowering.lower(&field.ty);
            let is_option = matches!(&ty, TypeDescriptor::Union(members) if members.contains(&TypeDescriptor::None));
            let default = if serde.default || container.default {
                Some(type_default(&ty))
            } else if is_option {
                // serde fills a missing Option with None
                Some(Value::Null)
            } else {
                None
            };

            if let Some(description) = doc_comment(&field.attrs) {
                ty = TypeDescriptor::annotated(ty, Meta::description(description));
            }

            let mut decl = FieldDecl::new(field_name, ty);
            if let Some(value) = default {
                decl = decl.default_value(value);
            }
            if let Some(rename) = serde.rename {
                decl = decl.wire_name(rename);
            }
            builder = builder.field_decl(decl);
        }

        debug!("Indexed struct {}", name);
        builder.build()
    }

    /// Unit-only enums become [`EnumType`]s; enums carrying data are left undeclared
    fn lower_enum(&mut self, item: &ItemEnum) -> Option<EnumType> {
        let name = item.ident.to_string();
        if item.variants.iter().any(|v| !matches!(v.fields, Fields::Unit)) {
            debug!("Enum {} carries data, leaving it undocumented", name);
            return None;
        }

        let container = SerdeAttrs::parse(&item.attrs);
        let variants: Vec<String> = item
            .variants
            .iter()
            .filter_map(|variant| {
                let serde = SerdeAttrs::parse(&variant.attrs);
                if serde.skip {
                    return None;
                }
                let ident = variant.ident.unraw().to_string();
                Some(match (serde.rename, container.rename_all) {
                    (Some(rename), _) => rename,
                    (None, Some(rule)) => rule.apply_to_variant(&ident),
                    (None, None) => ident,
                })
            })
            .collect();

        if variants.is_empty() {
            self.warn(format!("Enum {} has no serializable variants", name));
            return None;
        }
        Some(EnumType::of_strings(name, variants))
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn struct_type(&self, name: &str) -> Option<&StructType> {
        self.structs.iter().find(|s| s.name() == name)
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Indexed structs, ordered by name
    pub fn structs(&self) -> &[StructType] {
        &self.structs
    }

    pub fn enums(&self) -> &[EnumType] {
        &self.enums
    }

    /// Files, attributes and declarations that could not be used
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Top-level items plus the items of inline `mod` blocks
fn collect_items(items: &[Item]) -> Vec<&Item> {
    let mut collected = Vec::new();
    for item in items {
        match item {
            Item::Mod(module) => {
                if let Some((_, nested)) = &module.content {
                    collected.extend(collect_items(nested));
                }
            }
            other => collected.push(other),
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DefaultValue, RenameRule};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const MODELS: &str = r#"
        use serde::{Deserialize, Serialize};

        #[derive(Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct User {
            pub id: u64,
            pub username: String,
            /// Name shown in the UI
            pub full_name: Option<String>,
            #[serde(rename = "mail")]
            pub email_address: String,
            #[serde(skip)]
            pub password_hash: String,
            #[serde(default)]
            pub tags: Vec<String>,
            pub role: Role,
            pub r#type: String,
        }

        #[derive(Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Role {
            Admin,
            PowerUser,
            #[serde(rename = "guest")]
            Visitor,
        }

        pub enum Shape {
            Circle(f64),
            Square { side: f64 },
        }

        pub struct Marker;

        mod tree {
            pub struct Node {
                pub value: i32,
                pub children: Vec<Node>,
            }
        }
    "#;

    #[test]
    fn test_structs_and_fields() {
        let index = SourceIndex::from_source(MODELS).unwrap();
        let names: Vec<&str> = index.structs().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Node", "User"]);

        let user = index.struct_type("User").unwrap();
        assert_eq!(user.rename_rule(), Some(RenameRule::CamelCase));

        let fields: Vec<&str> = user.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            fields,
            vec!["id", "username", "full_name", "email_address", "tags", "role", "type"]
        );

        let full_name = &user.fields()[2];
        assert_eq!(
            full_name.ty,
            TypeDescriptor::annotated(
                TypeDescriptor::optional(TypeDescriptor::Str),
                Meta::description("Name shown in the UI")
            )
        );
        assert!(matches!(full_name.default, DefaultValue::Value(Value::Null)));

        assert_eq!(user.fields()[3].wire_name.as_deref(), Some("mail"));
        assert!(matches!(user.fields()[4].default, DefaultValue::Value(ref v) if v == &json!([])));
        assert!(matches!(user.fields()[0].default, DefaultValue::Required));
    }

    #[test]
    fn test_enums() {
        let index = SourceIndex::from_source(MODELS).unwrap();

        let role = index.enum_type("Role").unwrap();
        assert_eq!(role.variants, vec![json!("admin"), json!("power_user"), json!("guest")]);
        assert!(index.enum_type("Shape").is_none());

        let user = index.struct_type("User").unwrap();
        assert!(matches!(user.fields()[5].ty, TypeDescriptor::Enum(ref e) if e.name == "Role"));
    }

    #[test]
    fn test_self_reference_is_bound() {
        let index = SourceIndex::from_source(MODELS).unwrap();
        let node = index.struct_type("Node").unwrap();

        match &node.fields()[1].ty {
            TypeDescriptor::List(Some(item)) => match item.as_ref() {
                TypeDescriptor::Struct(reference) => assert_eq!(reference.resolve().as_ref(), Some(node)),
                other => panic!("expected struct reference, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_cross_file_references() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("models")).unwrap();
        fs::write(
            temp_dir.path().join("models/order.rs"),
            "pub struct Order { pub id: u64, pub ship_to: Address }",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("models/address.rs"),
            "pub struct Address { pub street: String, pub zip: String }",
        )
        .unwrap();
        fs::write(temp_dir.path().join("models/broken.rs"), "pub struct Broken {").unwrap();

        let index = SourceIndex::from_path(temp_dir.path()).unwrap();
        assert_eq!(index.structs().len(), 2);
        assert_eq!(index.warnings().len(), 1);

        let order = index.struct_type("Order").unwrap();
        let address = index.struct_type("Address").unwrap();
        match &order.fields()[1].ty {
            TypeDescriptor::Struct(reference) => assert_eq!(reference.resolve().as_ref(), Some(address)),
            other => panic!("expected struct reference, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_declarations_keep_first() {
        let index = SourceIndex::from_source(
            r#"
            pub struct Item { pub id: u64 }
            mod legacy {
                pub struct Item { pub name: String }
            }
            "#,
        )
        .unwrap();

        assert_eq!(index.structs().len(), 1);
        assert_eq!(index.struct_type("Item").unwrap().fields()[0].name, "id");
        assert_eq!(index.warnings().len(), 1);
    }

    #[test]
    fn test_container_default() {
        let index = SourceIndex::from_source(
            r#"
            #[serde(default)]
            pub struct Settings { pub retries: u32, pub verbose: bool }
            "#,
        )
        .unwrap();

        let settings = index.struct_type("Settings").unwrap();
        assert!(matches!(settings.fields()[0].default, DefaultValue::Value(ref v) if v == &json!(0)));
        assert!(matches!(settings.fields()[1].default, DefaultValue::Value(ref v) if v == &json!(false)));
    }
}
