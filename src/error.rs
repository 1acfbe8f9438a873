use std::fmt;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types surfaced by the conversion core, the envelope renderer and config loading.
///
/// Every variant keeps its context in named fields so callers can log or match on them
/// without parsing the message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// A type descriptor was structurally malformed (not merely unrecognised).
    #[error("{}", describe_type_conversion(.field_type, .field_name.as_deref(), .cause))]
    TypeConversion {
        field_type: String,
        field_name: Option<String>,
        cause: String,
    },
    /// Building the model for a struct failed as a whole.
    #[error("failed to generate schema for struct {struct_name}: {cause}")]
    SchemaGeneration { struct_name: String, cause: String },
    /// Pagination parameters violated their preconditions.
    #[error("invalid pagination parameters: {}", join_issues(.issues))]
    Pagination { issues: Vec<PaginationIssue> },
    /// The codec refused to encode a response payload.
    #[error("failed to serialize response data of type {data_type}: {cause}")]
    ResponseSerialization { data_type: String, cause: String },
    /// Configuration could not be loaded or contained an invalid value.
    #[error("{}", describe_configuration(.message, .suggestion.as_deref()))]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },
}

/// One offending pagination parameter together with the rejected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationIssue {
    Page(i64),
    PageSize(i64),
    TotalResults(i64),
}

impl PaginationIssue {
    /// Name of the offending parameter
    pub fn parameter(&self) -> &'static str {
        match self {
            PaginationIssue::Page(_) => "page",
            PaginationIssue::PageSize(_) => "page_size",
            PaginationIssue::TotalResults(_) => "total_results",
        }
    }

    /// The rejected value
    pub fn value(&self) -> i64 {
        match self {
            PaginationIssue::Page(v) | PaginationIssue::PageSize(v) | PaginationIssue::TotalResults(v) => *v,
        }
    }
}

impl fmt::Display for PaginationIssue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bound = match self {
            PaginationIssue::TotalResults(_) => 0,
            _ => 1,
        };
        write!(f, "{} must be >= {}, got {}", self.parameter(), bound, self.value())
    }
}

impl BridgeError {
    /// Create a type conversion error for a descriptor
    pub fn type_conversion(field_type: impl fmt::Display, cause: impl Into<String>) -> Self {
        BridgeError::TypeConversion {
            field_type: field_type.to_string(),
            field_name: None,
            cause: cause.into(),
        }
    }

    /// Create a schema generation error for a struct
    pub fn schema_generation(struct_name: impl Into<String>, cause: impl fmt::Display) -> Self {
        BridgeError::SchemaGeneration {
            struct_name: struct_name.into(),
            cause: cause.to_string(),
        }
    }

    /// Create a configuration error with an optional hint
    pub fn configuration(message: impl Into<String>, suggestion: Option<&str>) -> Self {
        BridgeError::Configuration {
            message: message.into(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    /// Attach a field name to a type conversion error that does not carry one yet.
    ///
    /// The innermost field name wins, so errors bubbling out of nested structs keep
    /// pointing at the field that actually failed.
    pub fn with_field_name(self, name: &str) -> Self {
        match self {
            BridgeError::TypeConversion {
                field_type,
                field_name: None,
                cause,
            } => BridgeError::TypeConversion {
                field_type,
                field_name: Some(name.to_string()),
                cause,
            },
            other => other,
        }
    }

    /// Names of the offending parameters for a pagination error, empty otherwise
    pub fn offending_parameters(&self) -> Vec<&'static str> {
        match self {
            BridgeError::Pagination { issues } => issues.iter().map(PaginationIssue::parameter).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe_type_conversion(field_type: &str, field_name: Option<&str>, cause: &str) -> String {
    match field_name {
        Some(name) => format!("failed to convert type for field '{}': {} ({})", name, field_type, cause),
        None => format!("failed to convert type: {} ({})", field_type, cause),
    }
}

fn describe_configuration(message: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(hint) => format!("{}. Suggestion: {}", message, hint),
        None => message.to_string(),
    }
}

fn join_issues(issues: &[PaginationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Rejection of an input body by a generated model.
///
/// `loc` is the path of keys leading to the offending value, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", display_loc(.loc))]
pub struct ValidationError {
    pub loc: Vec<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(loc: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
        }
    }

    /// Prefix the location with an enclosing key or index
    pub fn within(mut self, segment: impl Into<String>) -> Self {
        self.loc.insert(0, segment.into());
        self
    }
}

fn display_loc(loc: &[String]) -> String {
    if loc.is_empty() {
        "<root>".to_string()
    } else {
        loc.join(".")
    }
}
