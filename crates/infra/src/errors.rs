//! Caller-facing error bodies.
//!
//! The crate ships no transport of its own. This module is the contract any
//! adapter in front of `StockService` uses to turn a `ServiceError` into a
//! status code and a JSON body: `{"error": <code>, "message": <text>}`, plus
//! `available`/`requested` for stock rejections so callers can show how much
//! stock was left.

use serde_json::{json, Value};

use crate::service::ServiceError;

pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const UNPROCESSABLE_ENTITY: u16 = 422;
pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const SERVICE_UNAVAILABLE: u16 = 503;

pub fn service_error_to_body(err: &ServiceError) -> (u16, Value) {
    match err {
        ServiceError::Validation { field, reason } => {
            let (status, mut body) = json_error(BAD_REQUEST, "validation_error", err.to_string());
            body["field"] = json!(field);
            body["reason"] = json!(reason);
            (status, body)
        }
        ServiceError::NotFound { kind, id } => {
            let (status, mut body) = json_error(NOT_FOUND, "not_found", err.to_string());
            body["kind"] = json!(kind);
            body["id"] = json!(id);
            (status, body)
        }
        ServiceError::InsufficientStock {
            available,
            requested,
        } => {
            let (status, mut body) = json_error(
                UNPROCESSABLE_ENTITY,
                "insufficient_stock",
                format!("Stock not sufficient. Available: {available}"),
            );
            body["available"] = json!(available);
            body["requested"] = json!(requested);
            (status, body)
        }
        ServiceError::Conflict(msg) => json_error(CONFLICT, "conflict", msg.as_str()),
        ServiceError::Contention { .. } => json_error(SERVICE_UNAVAILABLE, "contention", err.to_string()),
        ServiceError::Storage(msg) => json_error(INTERNAL_SERVER_ERROR, "store_error", msg.as_str()),
    }
}

pub fn json_error(status: u16, code: &'static str, message: impl Into<String>) -> (u16, Value) {
    (
        status,
        json!({
            "error": code,
            "message": message.into(),
        }),
    )
}
