//! # Service errors (Feathers-style)
//!
//! Structured errors that cross the API boundary:
//! - consistent status codes + class names
//! - can be carried through `anyhow::Error`
//! - transport-agnostic (the HTTP crate decides how to render them)

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,    // 400
    NotFound,      // 404
    Unprocessable, // 422
    GeneralError,  // 500
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Unprocessable => 422,
            ErrorKind::GeneralError => 500,
        }
    }

    /// Error `name` as rendered to clients (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Kebab-cased `className`
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::GeneralError => "general-error",
        }
    }
}

/// A structured error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
    pub source: Option<AnyError>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
            source: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Find a `ServiceError` anywhere in an `anyhow` chain.
    pub fn find(err: &AnyError) -> Option<&ServiceError> {
        err.chain().find_map(|e| e.downcast_ref::<ServiceError>())
    }

    /// Copy without the inner source, suitable for clients.
    pub fn sanitize_for_client(&self) -> ServiceError {
        ServiceError {
            kind: self.kind,
            message: self.message.clone(),
            data: self.data.clone(),
            source: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut base = json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });
        if let Some(data) = &self.data {
            base["data"] = data.clone();
        }
        base
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_has_client_fields() {
        let err = ServiceError::not_found("job 7 not found");
        let body = err.to_json();
        assert_eq!(body["name"], "NotFound");
        assert_eq!(body["code"], 404);
        assert_eq!(body["className"], "not-found");
        assert_eq!(body["message"], "job 7 not found");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn found_through_anyhow_context() {
        let err = ServiceError::unprocessable("awards exceed nominations")
            .with_data(json!({ "index": 3 }))
            .into_anyhow()
            .context("while committing results");

        let found = ServiceError::find(&err).unwrap();
        assert_eq!(found.kind, ErrorKind::Unprocessable);
        assert_eq!(found.to_json()["data"]["index"], 3);
    }

    #[test]
    fn client_copy_drops_the_source() {
        let err = ServiceError::general_error("store unreachable")
            .with_source(anyhow::anyhow!("connection refused"));
        assert!(std::error::Error::source(&err).is_some());

        let safe = err.sanitize_for_client();
        assert!(safe.source.is_none());
        assert_eq!(safe.to_json()["className"], "general-error");
    }
}
