//! Struct, field and type descriptors.
//!
//! These are the inputs of the conversion engine. A [`StructType`] is a cheap handle to an
//! immutable struct declaration; its identity is a process-unique [`StructId`] handed out at
//! declaration time, so two declarations with identical fields are still two different
//! struct types. Field types are described with the closed [`TypeDescriptor`] set.
//!
//! Rust types expose their declaration through the [`Struct`] trait:
//!
//! ```
//! use once_cell::sync::Lazy;
//! use struct_schema_bridge::descriptor::{RenameRule, Struct, StructType, TypeDescriptor};
//!
//! struct User;
//!
//! impl Struct for User {
//!     fn struct_type() -> StructType {
//!         static DECL: Lazy<StructType> = Lazy::new(|| {
//!             StructType::builder("User")
//!                 .rename_all(RenameRule::CamelCase)
//!                 .field("id", TypeDescriptor::Int)
//!                 .field("full_name", TypeDescriptor::optional(TypeDescriptor::Str))
//!                 .build()
//!         });
//!         DECL.clone()
//!     }
//! }
//!
//! assert_eq!(User::struct_type(), User::struct_type());
//! ```

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-unique identity of a struct declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(u64);

impl StructId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StructId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StructId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability of a Rust type to describe itself as a struct declaration.
///
/// Implementations must hand out the same [`StructType`] on every call (typically from a
/// `Lazy` static); a fresh declaration per call would defeat caching by identity.
pub trait Struct {
    fn struct_type() -> StructType;
}

/// Struct-level wire naming convention, applied to snake_case field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenameRule {
    #[serde(rename = "lowercase")]
    LowerCase,
    #[serde(rename = "UPPERCASE")]
    UpperCase,
    #[serde(rename = "PascalCase")]
    PascalCase,
    #[serde(rename = "camelCase")]
    CamelCase,
    #[serde(rename = "snake_case")]
    SnakeCase,
    #[serde(rename = "SCREAMING_SNAKE_CASE")]
    ScreamingSnakeCase,
    #[serde(rename = "kebab-case")]
    KebabCase,
}

impl RenameRule {
    /// Parse the spelling used in `#[serde(rename_all = "...")]`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "lowercase" => Some(RenameRule::LowerCase),
            "UPPERCASE" => Some(RenameRule::UpperCase),
            "PascalCase" => Some(RenameRule::PascalCase),
            "camelCase" => Some(RenameRule::CamelCase),
            "snake_case" => Some(RenameRule::SnakeCase),
            "SCREAMING_SNAKE_CASE" => Some(RenameRule::ScreamingSnakeCase),
            "kebab-case" => Some(RenameRule::KebabCase),
            _ => None,
        }
    }

    /// Apply the rule to a snake_case field name
    pub fn apply(&self, field: &str) -> String {
        match self {
            RenameRule::LowerCase | RenameRule::SnakeCase => field.to_ascii_lowercase(),
            RenameRule::UpperCase | RenameRule::ScreamingSnakeCase => field.to_ascii_uppercase(),
            RenameRule::PascalCase => {
                let mut pascal = String::with_capacity(field.len());
                let mut capitalize = true;
                for ch in field.chars() {
                    if ch == '_' {
                        capitalize = true;
                    } else if capitalize {
                        pascal.push(ch.to_ascii_uppercase());
                        capitalize = false;
                    } else {
                        pascal.push(ch);
                    }
                }
                pascal
            }
            RenameRule::CamelCase => {
                let pascal = RenameRule::PascalCase.apply(field);
                let mut chars = pascal.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => pascal,
                }
            }
            RenameRule::KebabCase => field.replace('_', "-"),
        }
    }

    /// Apply the rule to a PascalCase enum variant name
    pub fn apply_to_variant(&self, variant: &str) -> String {
        match self {
            RenameRule::PascalCase => variant.to_string(),
            RenameRule::LowerCase => variant.to_ascii_lowercase(),
            RenameRule::UpperCase => variant.to_ascii_uppercase(),
            RenameRule::CamelCase => {
                let mut chars = variant.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            }
            RenameRule::SnakeCase | RenameRule::ScreamingSnakeCase | RenameRule::KebabCase => {
                let mut snake = String::with_capacity(variant.len() + 4);
                for (i, ch) in variant.char_indices() {
                    if ch.is_ascii_uppercase() && i > 0 {
                        snake.push('_');
                    }
                    snake.push(ch.to_ascii_lowercase());
                }
                self.apply(&snake)
            }
        }
    }
}

/// Inline field metadata carried by an `Annotated` descriptor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub description: Option<String>,
    pub examples: Vec<Value>,
}

impl Meta {
    pub fn description(text: impl Into<String>) -> Self {
        Self {
            description: Some(text.into()),
            examples: Vec::new(),
        }
    }

    pub fn with_examples(mut self, examples: Vec<Value>) -> Self {
        self.examples = examples;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.examples.is_empty()
    }
}

/// A closed set of values, documented as-is
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<Value>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, variants: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            variants,
        }
    }

    /// Enum whose variants serialize as plain strings
    pub fn of_strings<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, variants.into_iter().map(|v| Value::String(v.into())).collect())
    }
}

/// Declared type of a single struct field.
///
/// Optional components (`List(None)`, `Dict(None, _)`, `Tuple(None)`) mean the declaration
/// did not say what the element type is; they are untyped, not malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Int,
    Str,
    Float,
    Bool,
    Bytes,
    ByteArray,
    DateTime,
    Date,
    Time,
    Duration,
    Decimal,
    Uuid,
    None,
    List(Option<Box<TypeDescriptor>>),
    Set(Option<Box<TypeDescriptor>>),
    Tuple(Option<Vec<TypeDescriptor>>),
    Dict {
        key: Option<Box<TypeDescriptor>>,
        value: Option<Box<TypeDescriptor>>,
    },
    Union(Vec<TypeDescriptor>),
    Struct(StructRef),
    Enum(EnumType),
    Annotated(Box<TypeDescriptor>, Meta),
    /// A shape outside the supported set, named for diagnostics only
    Other(String),
}

impl TypeDescriptor {
    pub fn list(item: TypeDescriptor) -> Self {
        TypeDescriptor::List(Some(Box::new(item)))
    }

    pub fn set(item: TypeDescriptor) -> Self {
        TypeDescriptor::Set(Some(Box::new(item)))
    }

    pub fn tuple(items: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Tuple(Some(items))
    }

    pub fn dict(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Dict {
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
        }
    }

    pub fn union(members: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Union(members)
    }

    /// `inner | None`
    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Union(vec![inner, TypeDescriptor::None])
    }

    /// Reference to a Rust type implementing [`Struct`]
    pub fn structure<T: Struct>() -> Self {
        TypeDescriptor::Struct(StructRef::of::<T>())
    }

    pub fn annotated(inner: TypeDescriptor, meta: Meta) -> Self {
        TypeDescriptor::Annotated(Box::new(inner), meta)
    }

    /// Whether a struct reference occurs anywhere inside this descriptor
    pub fn contains_struct(&self) -> bool {
        match self {
            TypeDescriptor::Struct(_) => true,
            TypeDescriptor::List(item) | TypeDescriptor::Set(item) => {
                item.as_deref().is_some_and(TypeDescriptor::contains_struct)
            }
            TypeDescriptor::Tuple(Some(items)) | TypeDescriptor::Union(items) => {
                items.iter().any(TypeDescriptor::contains_struct)
            }
            TypeDescriptor::Dict { key, value } => {
                key.as_deref().is_some_and(TypeDescriptor::contains_struct)
                    || value.as_deref().is_some_and(TypeDescriptor::contains_struct)
            }
            TypeDescriptor::Annotated(inner, _) => inner.contains_struct(),
            _ => false,
        }
    }

    /// The metadata of the outermost `Annotated` wrapper, if any
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            TypeDescriptor::Annotated(_, meta) => Some(meta),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn join(items: &[TypeDescriptor]) -> String {
            items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        }

        match self {
            TypeDescriptor::Int => write!(f, "int"),
            TypeDescriptor::Str => write!(f, "str"),
            TypeDescriptor::Float => write!(f, "float"),
            TypeDescriptor::Bool => write!(f, "bool"),
            TypeDescriptor::Bytes => write!(f, "bytes"),
            TypeDescriptor::ByteArray => write!(f, "bytearray"),
            TypeDescriptor::DateTime => write!(f, "datetime"),
            TypeDescriptor::Date => write!(f, "date"),
            TypeDescriptor::Time => write!(f, "time"),
            TypeDescriptor::Duration => write!(f, "duration"),
            TypeDescriptor::Decimal => write!(f, "decimal"),
            TypeDescriptor::Uuid => write!(f, "uuid"),
            TypeDescriptor::None => write!(f, "none"),
            TypeDescriptor::List(Some(item)) => write!(f, "list[{}]", item),
            TypeDescriptor::List(None) => write!(f, "list"),
            TypeDescriptor::Set(Some(item)) => write!(f, "set[{}]", item),
            TypeDescriptor::Set(None) => write!(f, "set"),
            TypeDescriptor::Tuple(Some(items)) => write!(f, "tuple[{}]", join(items)),
            TypeDescriptor::Tuple(None) => write!(f, "tuple"),
            TypeDescriptor::Dict {
                key: Some(key),
                value: Some(value),
            } => write!(f, "dict[{}, {}]", key, value),
            TypeDescriptor::Dict { .. } => write!(f, "dict"),
            TypeDescriptor::Union(members) => write!(f, "union[{}]", join(members)),
            TypeDescriptor::Struct(reference) => write!(f, "struct {}", reference.name()),
            TypeDescriptor::Enum(enum_type) => {
                let values: Vec<String> = enum_type.variants.iter().map(Value::to_string).collect();
                write!(f, "enum {}[{}]", enum_type.name, values.join(", "))
            }
            TypeDescriptor::Annotated(inner, _) => write!(f, "annotated[{}]", inner),
            TypeDescriptor::Other(name) => write!(f, "other {}", name),
        }
    }
}

/// Non-owning pointer from a `Struct` descriptor to the struct it names
#[derive(Clone)]
pub struct StructRef(RefTarget);

#[derive(Clone)]
enum RefTarget {
    Declared(fn() -> StructType),
    Slot(StructSlot),
    Direct(StructType),
}

impl StructRef {
    /// Lazily resolved reference to a Rust [`Struct`] type
    pub fn of<T: Struct>() -> Self {
        StructRef(RefTarget::Declared(T::struct_type))
    }

    /// Reference to an already declared struct
    pub fn direct(struct_type: StructType) -> Self {
        StructRef(RefTarget::Direct(struct_type))
    }

    /// The referenced struct, or `None` while a late-bound slot is still empty
    pub fn resolve(&self) -> Option<StructType> {
        match &self.0 {
            RefTarget::Declared(declare) => Some(declare()),
            RefTarget::Slot(slot) => slot.get(),
            RefTarget::Direct(struct_type) => Some(struct_type.clone()),
        }
    }

    pub fn name(&self) -> String {
        match &self.0 {
            RefTarget::Slot(slot) => slot.name.to_string(),
            _ => self
                .resolve()
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
        }
    }
}

impl PartialEq for StructRef {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (RefTarget::Slot(a), RefTarget::Slot(b)) => Arc::ptr_eq(&a.cell, &b.cell),
            _ => match (self.resolve(), other.resolve()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Debug for StructRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("StructRef").field(&self.name()).finish()
    }
}

/// A named placeholder for a struct that is declared after the descriptors pointing at it.
///
/// Self-referential graphs built at runtime create the slot first, hand out
/// [`StructSlot::reference`]s to the fields that need it, then [`StructSlot::fill`] it.
#[derive(Clone)]
pub struct StructSlot {
    name: Arc<str>,
    cell: Arc<OnceCell<StructType>>,
}

impl StructSlot {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub fn reference(&self) -> StructRef {
        StructRef(RefTarget::Slot(self.clone()))
    }

    /// Bind the slot; returns `false` if it was already bound
    pub fn fill(&self, struct_type: StructType) -> bool {
        self.cell.set(struct_type).is_ok()
    }

    pub fn get(&self) -> Option<StructType> {
        self.cell.get().cloned()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How a field obtains its value when the input omits it
#[derive(Clone, Default)]
pub enum DefaultValue {
    #[default]
    Required,
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DefaultValue::Required => write!(f, "Required"),
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// A field as declared on a struct
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeDescriptor,
    pub default: DefaultValue,
    /// Explicit wire name, taking precedence over the struct's rename rule
    pub wire_name: Option<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            default: DefaultValue::Required,
            wire_name: None,
        }
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = DefaultValue::Value(value);
        self
    }

    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = DefaultValue::Factory(Arc::new(factory));
        self
    }

    pub fn wire_name(mut self, name: impl Into<String>) -> Self {
        self.wire_name = Some(name.into());
        self
    }
}

#[derive(Debug)]
struct StructDecl {
    id: StructId,
    name: String,
    rename: Option<RenameRule>,
    fields: Vec<FieldDecl>,
}

/// Handle to an immutable struct declaration; equality and hashing go by identity
#[derive(Clone)]
pub struct StructType(Arc<StructDecl>);

impl StructType {
    pub fn builder(name: impl Into<String>) -> StructTypeBuilder {
        StructTypeBuilder {
            name: name.into(),
            rename: None,
            fields: Vec::new(),
        }
    }

    pub fn id(&self) -> StructId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn rename_rule(&self) -> Option<RenameRule> {
        self.0.rename
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.0.fields
    }
}

impl PartialEq for StructType {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for StructType {}

impl Hash for StructType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for StructType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StructType({} {})", self.0.name, self.0.id)
    }
}

/// Builder for [`StructType`]; every `build` call mints a new identity
pub struct StructTypeBuilder {
    name: String,
    rename: Option<RenameRule>,
    fields: Vec<FieldDecl>,
}

impl StructTypeBuilder {
    pub fn rename_all(mut self, rule: RenameRule) -> Self {
        self.rename = Some(rule);
        self
    }

    /// Add a required field
    pub fn field(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.field_decl(FieldDecl::new(name, ty))
    }

    pub fn field_with_default(self, name: impl Into<String>, ty: TypeDescriptor, value: Value) -> Self {
        self.field_decl(FieldDecl::new(name, ty).default_value(value))
    }

    pub fn field_decl(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> StructType {
        StructType(Arc::new(StructDecl {
            id: StructId::next(),
            name: self.name,
            rename: self.rename,
            fields: self.fields,
        }))
    }
}
