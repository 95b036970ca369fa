//! Transport seam between the client and the network.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Payload, CONTENT_TYPE};
use crate::multipart::MultipartForm;

/// Largest response body read before it is dropped.
const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Executes plain-data requests.
///
/// Implementations return every HTTP status as data. Only failures that
/// produced no response at all are errors.
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// A [`Transport`] backed by a blocking [`ureq`] agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => ::http::Method::GET,
            HttpMethod::Post => ::http::Method::POST,
            HttpMethod::Put => ::http::Method::PUT,
            HttpMethod::Patch => ::http::Method::PATCH,
            HttpMethod::Delete => ::http::Method::DELETE,
        };
        let mut builder = ::http::Request::builder().method(method).uri(&request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        debug!(method = %request.method, url = %request.url, "sending request");

        let result = match request.body {
            Some(Payload::Json(json)) => {
                let req = builder.body(json.into_bytes()).map_err(other)?;
                self.agent.run(req)
            }
            Some(Payload::Multipart(form)) => {
                let boundary = format!("----tienda{}", uuid::Uuid::new_v4().simple());
                let req = builder
                    .header(CONTENT_TYPE, MultipartForm::content_type(&boundary))
                    .body(form.encode(&boundary))
                    .map_err(other)?;
                self.agent.run(req)
            }
            None => {
                let req = builder.body(()).map_err(other)?;
                self.agent.run(req)
            }
        };

        match result {
            Ok(resp) => Ok(convert_response(resp)),
            Err(ureq::Error::Timeout(_)) => Err(TransportError::Timeout),
            Err(ureq::Error::HostNotFound) => {
                Err(TransportError::Connection("host not found".to_string()))
            }
            Err(ureq::Error::Io(e)) => Err(TransportError::Connection(e.to_string())),
            Err(e) => Err(TransportError::Other(e.to_string())),
        }
    }
}

fn other(e: ::http::Error) -> TransportError {
    TransportError::Other(e.to_string())
}

fn convert_response(response: ::http::Response<ureq::Body>) -> HttpResponse {
    let (parts, mut body) = response.into_parts();
    let headers = parts
        .headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    // The status is already known here, so an unreadable body is dropped.
    let bytes = body
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .unwrap_or_else(|e| {
            warn!(status = parts.status.as_u16(), error = %e, "dropping unreadable response body");
            Vec::new()
        });
    let body = String::from_utf8_lossy(&bytes).into_owned();
    HttpResponse {
        status: parts.status.as_u16(),
        headers,
        body,
    }
}
