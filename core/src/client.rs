//! Request dispatcher for the storefront API.
//!
//! # Design
//! `ApiClient` holds only injected collaborators and carries no mutable
//! state between calls. Each call is split into [`ApiClient::build_request`],
//! which produces an `HttpRequest` without I/O, and
//! [`ApiClient::parse_response`], which consumes an `HttpResponse`.
//! [`ApiClient::dispatch`] runs both around the transport and sends every
//! failure through the [`FailureRouter`] before returning it.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::ApiError;
use crate::http::{
    remove_header, set_header, HttpRequest, HttpResponse, Payload, APPLICATION_JSON,
    AUTHORIZATION, CONTENT_TYPE,
};
use crate::page::PageContext;
use crate::request::{ApiRequest, RequestBody};
use crate::router::{FailureRouter, Navigator};
use crate::search;
use crate::transport::Transport;

pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    router: FailureRouter,
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            transport,
            router: FailureRouter::new(config, store.clone(), navigator),
            store,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        self.router.config()
    }

    pub fn router(&self) -> &FailureRouter {
        &self.router
    }

    /// Page context for `path`, classified with the configured fragments.
    pub fn page(&self, path: impl Into<String>) -> PageContext {
        PageContext::infer(path, &self.config().private_fragments)
    }

    /// Full URL for `endpoint` with `query` appended form-urlencoded.
    pub fn url(&self, endpoint: &str, query: Option<&[(String, String)]>) -> String {
        let mut url = format!("{}{endpoint}", self.base_url);
        if let Some(pairs) = query {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            if !encoded.is_empty() {
                url.push('?');
                url.push_str(&encoded);
            }
        }
        url
    }

    /// Build the outgoing request. Fails with [`ApiError::MissingAuthToken`]
    /// when authentication is required and no token is stored.
    pub fn build_request(&self, req: &ApiRequest) -> Result<HttpRequest, ApiError> {
        let url = self.url(&req.endpoint, req.query.as_deref());

        let mut headers = match &req.headers {
            Some(overrides) => overrides.clone(),
            None => vec![(CONTENT_TYPE.to_string(), APPLICATION_JSON.to_string())],
        };

        if req.requires_auth {
            let token = Credentials::token(self.store.as_ref(), self.config())
                .ok_or(ApiError::MissingAuthToken)?;
            set_header(&mut headers, AUTHORIZATION, format!("Bearer {token}"));
        }

        let body = match &req.body {
            Some(RequestBody::Json(value)) if !is_truthy(value) => None,
            Some(body) if req.method.allows_body() => Some(match body {
                RequestBody::Form(form) => {
                    remove_header(&mut headers, CONTENT_TYPE);
                    Payload::Multipart(form.clone())
                }
                RequestBody::Json(value) => Payload::Json(
                    serde_json::to_string(value)
                        .map_err(|e| ApiError::Serialization(e.to_string()))?,
                ),
            }),
            _ => None,
        };

        Ok(HttpRequest {
            method: req.method,
            url,
            headers,
            body,
        })
    }

    /// Normalize a response: parsed JSON, `None` for no content or an
    /// unparseable body, or [`ApiError::Http`] for non-2xx statuses.
    ///
    /// A 401 ends the session first when `page` is private.
    pub fn parse_response(
        &self,
        page: &PageContext,
        response: HttpResponse,
    ) -> Result<Option<Value>, ApiError> {
        if !response.is_success() {
            let err = ApiError::Http {
                status: response.status,
                message: error_message(&response),
            };
            if err.is_unauthorized() {
                self.router.handle_unauthorized(page);
            }
            return Err(err);
        }
        if response.status == 204 {
            return Ok(None);
        }
        let parsed = parse_json(&response.body);
        if parsed.is_none() && !response.body.trim().is_empty() {
            debug!(status = response.status, "success response body is not JSON");
        }
        Ok(parsed)
    }

    /// Run `req` from `page`. Errors are routed, then returned.
    pub fn dispatch(
        &self,
        page: &PageContext,
        req: ApiRequest,
    ) -> Result<Option<Value>, ApiError> {
        debug!(
            method = %req.method,
            endpoint = %req.endpoint,
            page = page.path(),
            "dispatching"
        );
        let result = self.execute(page, &req);
        if let Err(e) = &result {
            self.router.handle_error(page, &req.endpoint, e);
        }
        result
    }

    /// [`dispatch`](Self::dispatch) and decode the payload into `T`.
    ///
    /// An empty payload or a shape mismatch is an
    /// [`ApiError::Deserialization`], routed like any other failure.
    pub fn dispatch_as<T: DeserializeOwned>(
        &self,
        page: &PageContext,
        req: ApiRequest,
    ) -> Result<T, ApiError> {
        let endpoint = req.endpoint.clone();
        let value = self.dispatch(page, req)?;
        decode(value).inspect_err(|e| self.router.handle_error(page, &endpoint, e))
    }

    /// Product search against the configured backend. Bypasses the
    /// authentication and routing path.
    pub fn search_products(&self, term: &str) -> Result<Value, ApiError> {
        search::search_products(self.transport.as_ref(), &self.base_url, term)
    }

    fn execute(&self, page: &PageContext, req: &ApiRequest) -> Result<Option<Value>, ApiError> {
        let request = self.build_request(req)?;
        let response = self.transport.send(request)?;
        self.parse_response(page, response)
    }
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> Result<T, ApiError> {
    let value = value.ok_or_else(|| ApiError::Deserialization("empty response body".to_string()))?;
    serde_json::from_value(value).map_err(|e| ApiError::Deserialization(e.to_string()))
}

fn parse_json(body: &str) -> Option<Value> {
    serde_json::from_str(body).ok()
}

/// Message for a failed response: the body's `message`, else its `error`,
/// else the status line.
pub(crate) fn error_message(response: &HttpResponse) -> String {
    let body = parse_json(&response.body);
    let field = |name: &str| {
        body.as_ref()
            .and_then(|b| b.get(name))
            .filter(|v| is_truthy(v))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    };
    field("message").or_else(|| field("error")).unwrap_or_else(|| {
        let reason = ::http::StatusCode::from_u16(response.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");
        format!("Error {}: {reason}", response.status)
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
