//! Client-side access layer for the storefront API.
//!
//! # Overview
//! Builds requests to a single backend, attaches bearer-token
//! authentication, serializes JSON or multipart bodies and maps failures to
//! what the user sees: a logged warning on public pages, an alert on private
//! pages, and logout-and-redirect when a private page gets a 401.
//!
//! # Design
//! - The host injects everything stateful: a [`Transport`] for I/O, a
//!   [`CredentialStore`] for the session and a [`Navigator`] for redirects
//!   and alerts. The current page is passed per call as a [`PageContext`].
//! - [`ApiClient`] keeps the build/parse split: `build_request` and
//!   `parse_response` never touch the network, `dispatch` joins them.
//! - Errors always reach the caller, after the [`FailureRouter`] has
//!   produced its side effects.

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod multipart;
pub mod page;
pub mod request;
pub mod router;
pub mod search;
pub mod transport;

pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use credentials::{CredentialStore, Credentials, FileStore, MemoryStore, StoreError};
pub use error::{ApiError, ErrorCode, TransportError};
pub use crate::http::{HttpMethod, HttpRequest, HttpResponse, Payload};
pub use multipart::MultipartForm;
pub use page::{PageContext, RouteAccess};
pub use request::{ApiRequest, RequestBody};
pub use router::{FailureRouter, Navigator};
pub use search::search_products;
pub use transport::{Transport, UreqTransport};
