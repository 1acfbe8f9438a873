//! Uniform response envelopes and their documentation schemas.
//!
//! Payloads are wrapped into [`Envelope`] or, for one page of a larger result set,
//! [`PaginatedEnvelope`]. Both serialize with camelCase keys. Codec failures on the
//! request side are reported through [`ErrorResponse`] envelopes.

use crate::error::{BridgeError, PaginationIssue, Result, ValidationError};
use crate::schema_builder::Model;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Status reported by successful envelopes
pub const STATUS_OK: &str = "ok";
/// Status reported by error envelopes
pub const STATUS_ERROR: &str = "error";

/// Standard response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

/// One page of a result set plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedEnvelope<T> {
    pub items: Vec<T>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_results: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub status: String,
    pub message: Option<String>,
}

/// Pagination metadata derived from the request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_results: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PageMeta {
    /// Check the preconditions, reporting every offending parameter at once
    pub fn validate(total_results: i64, page: i64, page_size: i64) -> Result<()> {
        let mut issues = Vec::new();
        if page < 1 {
            issues.push(PaginationIssue::Page(page));
        }
        if page_size < 1 {
            issues.push(PaginationIssue::PageSize(page_size));
        }
        if total_results < 0 {
            issues.push(PaginationIssue::TotalResults(total_results));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            let err = BridgeError::Pagination { issues };
            error!("{}", err);
            Err(err)
        }
    }

    /// Metadata arithmetic; a non-positive page size yields zero pages
    pub fn calculate(total_results: i64, page: i64, page_size: i64) -> Self {
        let total_pages = if page_size > 0 {
            total_results / page_size + i64::from(total_results % page_size > 0)
        } else {
            0
        };

        Self {
            current_page: page,
            total_pages,
            total_results,
            page_size,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }

    /// Requested page lies beyond the last page of a non-empty result set
    pub fn is_out_of_range(&self) -> bool {
        self.total_results > 0 && self.current_page > self.total_pages
    }
}

/// Wrap a payload into an [`Envelope`]
pub fn envelope<T>(data: Option<T>, message: Option<&str>, status: &str) -> Envelope<T> {
    Envelope {
        status: status.to_string(),
        data,
        message: message.map(str::to_string),
    }
}

/// Wrap one page of items into a [`PaginatedEnvelope`].
///
/// A page past the end of a non-empty result set is not an error: the items are
/// dropped and the metadata still describes the requested page.
///
/// # Errors
///
/// [`BridgeError::Pagination`] when `page < 1`, `page_size < 1` or `total_results < 0`.
pub fn paginated_envelope<T>(
    items: Vec<T>,
    total_results: i64,
    page: i64,
    page_size: i64,
    message: Option<&str>,
    status: &str,
) -> Result<PaginatedEnvelope<T>> {
    PageMeta::validate(total_results, page, page_size)?;
    let meta = PageMeta::calculate(total_results, page, page_size);

    let items = if meta.is_out_of_range() {
        warn!(
            "Requested page {} exceeds max page {} (total_results={}, page_size={})",
            page, meta.total_pages, total_results, page_size
        );
        Vec::new()
    } else {
        items
    };
    debug!("Paginated envelope: page {}/{} with {} items", page, meta.total_pages, items.len());

    Ok(PaginatedEnvelope {
        items,
        current_page: meta.current_page,
        total_pages: meta.total_pages,
        total_results: meta.total_results,
        page_size: meta.page_size,
        has_next: meta.has_next,
        has_previous: meta.has_previous,
        status: status.to_string(),
        message: message.map(str::to_string),
    })
}

/// Encode a response payload as JSON bytes
pub fn render<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        let data_type = std::any::type_name::<T>();
        error!("Failed to encode response data of type {}: {}", data_type, e);
        BridgeError::ResponseSerialization {
            data_type: data_type.to_string(),
            cause: e.to_string(),
        }
    })
}

/// Error envelope together with the HTTP status it is sent with
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub body: Envelope<Value>,
}

impl ErrorResponse {
    /// Encoded body
    pub fn render(&self) -> Result<Vec<u8>> {
        render(&self.body)
    }
}

/// 422 response for a body that parsed but failed validation
pub fn validation_error_envelope(err: &ValidationError) -> ErrorResponse {
    let loc: Vec<&str> = std::iter::once("body")
        .chain(err.loc.iter().map(String::as_str))
        .collect();

    ErrorResponse {
        status_code: 422,
        body: envelope(
            Some(json!({
                "detail": [{ "loc": loc, "msg": err.message, "type": "validation_error" }]
            })),
            Some("Validation error"),
            STATUS_ERROR,
        ),
    }
}

/// 400 response for a body that is not JSON
pub fn decode_error_envelope(err: &serde_json::Error) -> ErrorResponse {
    ErrorResponse {
        status_code: 400,
        body: envelope(
            Some(json!({ "detail": format!("Invalid JSON: {}", err) })),
            Some("Invalid JSON format"),
            STATUS_ERROR,
        ),
    }
}

/// Decode a request body and validate it against `model`.
///
/// Returns the normalized object keyed by output names, or the error envelope to send.
pub fn accept_body(model: &Model, body: &[u8]) -> std::result::Result<Value, ErrorResponse> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Rejecting undecodable body for {}: {}", model.name, e);
        decode_error_envelope(&e)
    })?;

    model.validate_input(&value).map_err(|e| {
        debug!("Rejecting body for {}: {}", model.name, e);
        validation_error_envelope(&e)
    })
}

fn status_property() -> Value {
    json!({ "type": "string", "default": STATUS_OK })
}

fn message_property() -> Value {
    json!({ "anyOf": [{ "type": "string" }, { "type": "null" }], "default": null })
}

/// JSON Schema of an [`Envelope`] carrying `data_schema`
pub fn envelope_schema(data_schema: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "status": status_property(),
            "data": { "anyOf": [data_schema, { "type": "null" }], "default": null },
            "message": message_property(),
        }
    })
}

/// JSON Schema of a [`PaginatedEnvelope`] whose items follow `item_schema`
pub fn paginated_envelope_schema(item_schema: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "items": { "type": "array", "items": item_schema },
            "currentPage": { "type": "integer" },
            "totalPages": { "type": "integer" },
            "totalResults": { "type": "integer" },
            "pageSize": { "type": "integer" },
            "hasNext": { "type": "boolean" },
            "hasPrevious": { "type": "boolean" },
            "status": status_property(),
            "message": message_property(),
        },
        "required": [
            "items", "currentPage", "totalPages", "totalResults", "pageSize", "hasNext", "hasPrevious"
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{RenameRule, StructType, TypeDescriptor};
    use crate::schema_cache::SchemaCache;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn test_envelope_wire_form() {
        let wrapped = envelope(Some(json!({ "id": 1 })), Some("fetched"), STATUS_OK);
        let bytes = render(&wrapped).unwrap();
        let decoded: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            decoded,
            json!({ "status": "ok", "data": { "id": 1 }, "message": "fetched" })
        );

        let empty: Envelope<Value> = envelope(None, None, STATUS_OK);
        assert_eq!(
            serde_json::to_value(&empty).unwrap(),
            json!({ "status": "ok", "data": null, "message": null })
        );
    }

    #[test]
    fn test_zero_results() {
        let page = paginated_envelope(Vec::<i32>::new(), 0, 1, 10, None, STATUS_OK).unwrap();

        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_page_arithmetic() {
        let items: Vec<i32> = (0..10).collect();
        let page = paginated_envelope(items.clone(), 95, 1, 10, None, STATUS_OK).unwrap();
        assert_eq!(page.total_pages, 10);
        assert!(page.has_next);
        assert!(!page.has_previous);
        assert_eq!(page.items, items);

        let last = paginated_envelope(vec![90, 91, 92, 93, 94], 95, 10, 10, None, STATUS_OK).unwrap();
        assert!(!last.has_next);
        assert!(last.has_previous);
        assert_eq!(last.items.len(), 5);
    }

    #[test]
    fn test_huge_result_count() {
        let page = paginated_envelope(Vec::<i32>::new(), i64::MAX, 1, 10, None, STATUS_OK).unwrap();

        assert_eq!(page.total_pages, i64::MAX / 10 + 1);
        assert!(page.has_next);

        let single = PageMeta::calculate(i64::MAX, 1, i64::MAX);
        assert_eq!(single.total_pages, 1);
        assert!(!single.has_next);
    }

    #[test]
    fn test_out_of_range_page() {
        let page = paginated_envelope(vec![1, 2, 3], 95, 11, 10, Some("late"), STATUS_OK).unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.current_page, 11);
        assert_eq!(page.total_pages, 10);
        assert!(!page.has_next);
        assert!(page.has_previous);
        assert_eq!(page.message.as_deref(), Some("late"));
    }

    #[test]
    fn test_preconditions_name_every_parameter() {
        let err = paginated_envelope(Vec::<i32>::new(), 10, 0, 10, None, STATUS_OK).unwrap_err();
        assert_eq!(err.offending_parameters(), vec!["page"]);

        let err = paginated_envelope(Vec::<i32>::new(), 10, 1, 0, None, STATUS_OK).unwrap_err();
        assert_eq!(err.offending_parameters(), vec!["page_size"]);

        let err = paginated_envelope(Vec::<i32>::new(), -1, 1, 10, None, STATUS_OK).unwrap_err();
        assert_eq!(err.offending_parameters(), vec!["total_results"]);

        let err = paginated_envelope(Vec::<i32>::new(), -5, 0, -2, None, STATUS_OK).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Pagination {
                issues: vec![
                    PaginationIssue::Page(0),
                    PaginationIssue::PageSize(-2),
                    PaginationIssue::TotalResults(-5)
                ]
            }
        );
    }

    #[test]
    fn test_paginated_wire_form() {
        let page = paginated_envelope(vec!["a"], 1, 1, 5, None, STATUS_OK).unwrap();
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({
                "items": ["a"],
                "currentPage": 1,
                "totalPages": 1,
                "totalResults": 1,
                "pageSize": 5,
                "hasNext": false,
                "hasPrevious": false,
                "status": "ok",
                "message": null
            })
        );
    }

    #[test]
    fn test_render_failure() {
        let mut bad = BTreeMap::new();
        bad.insert((1, 2), "tuple keys are not JSON object keys");

        let err = render(&bad).unwrap_err();
        match err {
            BridgeError::ResponseSerialization { data_type, cause } => {
                assert!(data_type.contains("BTreeMap"));
                assert!(!cause.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_accept_body() {
        let cache = SchemaCache::new();
        let user = StructType::builder("User")
            .rename_all(RenameRule::CamelCase)
            .field("user_id", TypeDescriptor::Int)
            .build();
        let model = cache.model_for(&user).unwrap();

        assert_eq!(accept_body(&model, br#"{"user_id": 7}"#).unwrap(), json!({ "userId": 7 }));

        let invalid = accept_body(&model, br#"{"userId": "seven"}"#).unwrap_err();
        assert_eq!(invalid.status_code, 422);
        assert_eq!(invalid.body.status, "error");
        assert_eq!(invalid.body.message.as_deref(), Some("Validation error"));
        let detail = &invalid.body.data.as_ref().unwrap()["detail"][0];
        assert_eq!(detail["loc"], json!(["body", "userId"]));
        assert_eq!(detail["type"], json!("validation_error"));

        let garbled = accept_body(&model, b"{not json").unwrap_err();
        assert_eq!(garbled.status_code, 400);
        assert_eq!(garbled.body.message.as_deref(), Some("Invalid JSON format"));
        let detail = garbled.body.data.as_ref().unwrap()["detail"].as_str().unwrap().to_string();
        assert!(detail.starts_with("Invalid JSON: "));
        assert!(garbled.render().is_ok());
    }

    #[test]
    fn test_envelope_schemas() {
        let item = json!({ "$ref": "#/components/schemas/UserSchema" });

        let single = envelope_schema(item.clone());
        assert_eq!(single["properties"]["data"]["anyOf"][0], item);
        assert_eq!(single["properties"]["status"]["default"], json!("ok"));

        let paged = paginated_envelope_schema(item.clone());
        assert_eq!(paged["properties"]["items"]["items"], item);
        assert_eq!(paged["required"].as_array().unwrap().len(), 7);
    }
}
