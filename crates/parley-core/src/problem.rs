//! RFC 7807 problem+json responses
//!
//! Handlers return `Problem` as their error type; `ErrorBuilder` is the
//! ergonomic way to construct one from a service error.

use std::collections::BTreeMap;

use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

/// A problem response to return to the client, following RFC 7807.
#[derive(Debug, Clone)]
pub struct Problem {
    /// The HTTP status of the problem.
    pub status_code: StatusCode,
    /// The serialized body of the problem.
    pub body: BTreeMap<String, Value>,
}

impl Problem {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            body: BTreeMap::new(),
        }
    }

    pub fn with_title<S: Into<String>>(self, value: S) -> Self {
        self.with_value("title", value.into())
    }

    pub fn with_detail<S: Into<String>>(self, value: S) -> Self {
        self.with_value("detail", value.into())
    }

    pub fn with_type<S: Into<String>>(self, value: S) -> Self {
        self.with_value("type", value.into())
    }

    pub fn with_instance<S: Into<String>>(self, value: S) -> Self {
        self.with_value("instance", value.into())
    }

    pub fn with_value<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.body.insert(key.to_owned(), value.into());
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        if self.body.is_empty() {
            self.status_code.into_response()
        } else {
            let mut response = (self.status_code, Json(self.body)).into_response();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, "application/problem+json".parse().unwrap());
            response
        }
    }
}

/// Builder for `Problem` responses used throughout the handler crates.
pub struct ErrorBuilder {
    status: StatusCode,
    title: String,
    detail: String,
    values: BTreeMap<String, Value>,
}

impl ErrorBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            title: String::new(),
            detail: String::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn value<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.values.insert(key.to_string(), value);
        }
        self
    }

    pub fn build(self) -> Problem {
        let mut problem = Problem::new(self.status)
            .with_title(self.title)
            .with_detail(self.detail)
            .with_value("timestamp", chrono::Utc::now().to_rfc3339());

        for (key, value) in self.values {
            problem = problem.with_value(&key, value);
        }

        problem
    }
}

pub fn bad_request() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::BAD_REQUEST).title("Bad Request")
}

pub fn not_found() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::NOT_FOUND).title("Not Found")
}

pub fn internal_server_error() -> ErrorBuilder {
    ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
        .title("Internal Server Error")
        .detail("An unexpected error occurred while processing your request")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_title_and_detail() {
        let problem = ErrorBuilder::new(StatusCode::NOT_FOUND)
            .title("Visitor not found")
            .detail("No visitor with id v-123")
            .build();

        assert_eq!(problem.status_code, StatusCode::NOT_FOUND);
        assert_eq!(problem.body["title"], "Visitor not found");
        assert_eq!(problem.body["detail"], "No visitor with id v-123");
        assert!(problem.body.contains_key("timestamp"));
    }

    #[test]
    fn test_builder_extra_values() {
        let problem = bad_request().value("field", "status").build();
        assert_eq!(problem.body["field"], "status");
        assert_eq!(problem.status_code, StatusCode::BAD_REQUEST);
    }
}
