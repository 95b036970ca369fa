//! Per-call request descriptors.

use serde::Serialize;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::multipart::MultipartForm;

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(MultipartForm),
}

/// Everything the dispatcher needs for one call.
///
/// Authentication is required unless [`ApiRequest::public`] is called.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: String,
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
    pub requires_auth: bool,
    pub query: Option<Vec<(String, String)>>,
    /// Replaces the default `Content-Type: application/json` header set.
    pub headers: Option<Vec<(String, String)>>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            requires_auth: true,
            query: None,
            headers: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, endpoint)
    }

    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serialize `body` into a JSON body.
    pub fn json_from<T: Serialize>(self, body: &T) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.json(value))
    }

    pub fn form(mut self, form: MultipartForm) -> Self {
        self.body = Some(RequestBody::Form(form));
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }
}
