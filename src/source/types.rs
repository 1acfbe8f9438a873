use crate::descriptor::{EnumType, StructSlot, TypeDescriptor};
use log::debug;
use serde_json::{json, Value};
use std::collections::HashMap;
use syn::{GenericArgument, PathArguments, Type};

/// Lowers `syn` types to descriptors, resolving names against the declarations of an index
pub struct TypeLowering<'a> {
    pub structs: &'a HashMap<String, StructSlot>,
    pub enums: &'a HashMap<String, EnumType>,
}

impl TypeLowering<'_> {
    pub fn lower(&self, ty: &Type) -> TypeDescriptor {
        match ty {
            Type::Path(type_path) => match type_path.path.segments.last() {
                Some(segment) => self.lower_segment(&segment.ident.to_string(), &segment.arguments),
                None => TypeDescriptor::Other("path".to_string()),
            },
            Type::Reference(reference) => self.lower(&reference.elem),
            Type::Paren(paren) => self.lower(&paren.elem),
            Type::Group(group) => self.lower(&group.elem),
            Type::Tuple(tuple) if tuple.elems.is_empty() => TypeDescriptor::None,
            Type::Tuple(tuple) => TypeDescriptor::tuple(tuple.elems.iter().map(|t| self.lower(t)).collect()),
            Type::Slice(slice) => self.sequence(&slice.elem),
            Type::Array(array) => self.sequence(&array.elem),
            Type::BareFn(_) => TypeDescriptor::Other("fn".to_string()),
            Type::TraitObject(_) => TypeDescriptor::Other("dyn".to_string()),
            Type::ImplTrait(_) => TypeDescriptor::Other("impl".to_string()),
            Type::Ptr(_) => TypeDescriptor::Other("pointer".to_string()),
            Type::Never(_) => TypeDescriptor::Other("never".to_string()),
            _ => TypeDescriptor::Other("unknown".to_string()),
        }
    }

    fn sequence(&self, elem: &Type) -> TypeDescriptor {
        if is_u8(elem) {
            TypeDescriptor::Bytes
        } else {
            TypeDescriptor::list(self.lower(elem))
        }
    }

    fn lower_segment(&self, name: &str, arguments: &PathArguments) -> TypeDescriptor {
        let args = type_arguments(arguments);
        let arg = |i: usize| args.get(i).map(|t| Box::new(self.lower(t)));

        match (name, args.as_slice()) {
            ("Option", [inner]) => TypeDescriptor::optional(self.lower(inner)),
            ("Box" | "Arc" | "Rc" | "Cow", [inner]) => self.lower(inner),
            ("Vec", [inner]) if is_u8(inner) => TypeDescriptor::Bytes,
            ("Vec" | "VecDeque" | "LinkedList", _) => TypeDescriptor::List(arg(0)),
            ("HashSet" | "BTreeSet" | "IndexSet", _) => TypeDescriptor::Set(arg(0)),
            ("HashMap" | "BTreeMap" | "IndexMap", _) => TypeDescriptor::Dict {
                key: arg(0),
                value: arg(1),
            },
            ("String" | "str" | "char", _) => TypeDescriptor::Str,
            ("i8" | "i16" | "i32" | "i64" | "i128" | "isize", _)
            | ("u8" | "u16" | "u32" | "u64" | "u128" | "usize", _) => TypeDescriptor::Int,
            ("f32" | "f64", _) => TypeDescriptor::Float,
            ("bool", _) => TypeDescriptor::Bool,
            ("Bytes", _) => TypeDescriptor::Bytes,
            ("BytesMut", _) => TypeDescriptor::ByteArray,
            ("DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime", _) => {
                TypeDescriptor::DateTime
            }
            ("NaiveDate" | "Date", _) => TypeDescriptor::Date,
            ("NaiveTime" | "Time", _) => TypeDescriptor::Time,
            ("Duration", _) => TypeDescriptor::Duration,
            ("Decimal" | "BigDecimal", _) => TypeDescriptor::Decimal,
            ("Uuid", _) => TypeDescriptor::Uuid,
            _ => {
                if let Some(slot) = self.structs.get(name) {
                    TypeDescriptor::Struct(slot.reference())
                } else if let Some(enum_type) = self.enums.get(name) {
                    TypeDescriptor::Enum(enum_type.clone())
                } else {
                    debug!("No declaration found for type {}", name);
                    TypeDescriptor::Other(name.to_string())
                }
            }
        }
    }
}

fn type_arguments(arguments: &PathArguments) -> Vec<&Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_u8(ty: &Type) -> bool {
    matches!(ty, Type::Path(p) if p.path.is_ident("u8"))
}

/// Value `#[serde(default)]` produces for a field of this type, as far as it is knowable
pub fn type_default(ty: &TypeDescriptor) -> Value {
    match ty {
        TypeDescriptor::Int => json!(0),
        TypeDescriptor::Float => json!(0.0),
        TypeDescriptor::Str => json!(""),
        TypeDescriptor::Bool => json!(false),
        TypeDescriptor::List(_) | TypeDescriptor::Set(_) | TypeDescriptor::Bytes | TypeDescriptor::ByteArray => {
            json!([])
        }
        TypeDescriptor::Dict { .. } => json!({}),
        TypeDescriptor::Tuple(Some(items)) => Value::Array(items.iter().map(type_default).collect()),
        TypeDescriptor::Annotated(inner, _) => type_default(inner),
        _ => Value::Null,
    }
}
