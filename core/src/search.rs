//! Public product search.
//!
//! A single fixed, unauthenticated endpoint. Failures are logged and handed
//! back unchanged; the failure router is not involved.

use serde_json::Value;
use tracing::error;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

pub const SEARCH_ENDPOINT: &str = "/productos/buscar";

pub fn build_search_request(base_url: &str, term: &str) -> HttpRequest {
    HttpRequest {
        method: HttpMethod::Get,
        url: format!(
            "{}{SEARCH_ENDPOINT}?termino={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(term)
        ),
        headers: Vec::new(),
        body: None,
    }
}

pub fn parse_search_response(response: HttpResponse) -> Result<Value, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Http {
            status: response.status,
            message: format!("HTTP error! status: {}", response.status),
        });
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Search the catalog for `term`.
pub fn search_products(
    transport: &dyn Transport,
    base_url: &str,
    term: &str,
) -> Result<Value, ApiError> {
    let result = transport
        .send(build_search_request(base_url, term))
        .map_err(ApiError::from)
        .and_then(parse_search_response);
    if let Err(e) = &result {
        error!(term, status = e.status(), "product search failed: {e}");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::TransportError;

    struct Canned {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Canned {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: self.body.to_string(),
            })
        }
    }

    struct Offline;

    impl Transport for Offline {
        fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connection("offline".to_string()))
        }
    }

    #[test]
    fn term_is_percent_encoded_without_auth() {
        let req = build_search_request("http://localhost:3000/api/", "zapatos de piel & más");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://localhost:3000/api/productos/buscar?termino=zapatos%20de%20piel%20%26%20m%C3%A1s"
        );
        assert!(req.headers.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn success_returns_parsed_array() {
        let transport = Canned::new(200, r#"[{"id":1,"nombre":"Zapatos"}]"#);
        let found = search_products(&transport, "http://api", "zapatos").unwrap();
        assert_eq!(found, json!([{"id": 1, "nombre": "Zapatos"}]));
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://api/productos/buscar?termino=zapatos");
    }

    #[test]
    #[traced_test]
    fn server_error_carries_status_in_message() {
        let transport = Canned::new(500, r#"{"message":"ignored"}"#);
        let err = search_products(&transport, "http://api", "zapatos").unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "HTTP error! status: 500");
        assert!(logs_contain("product search failed"));
    }

    #[test]
    fn invalid_json_on_success_is_an_error() {
        let transport = Canned::new(200, "not json");
        let err = search_products(&transport, "http://api", "x").unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    #[traced_test]
    fn transport_failure_is_rethrown() {
        let err = search_products(&Offline, "http://api", "x").unwrap_err();
        assert!(matches!(err, ApiError::Transport(TransportError::Connection(_))));
        assert!(logs_contain("ERROR"));
    }
}
