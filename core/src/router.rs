//! Failure routing: what the user sees when a call fails.
//!
//! # Design
//! The router never swallows an error, it only produces side effects
//! (logging, alerts, logout-and-redirect) and the dispatcher hands the error
//! back to the caller afterwards. Missing-token failures are the one silent
//! case: public pages call authenticated endpoints before login.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, Credentials};
use crate::error::{ApiError, ErrorCode};
use crate::page::PageContext;

pub const FALLBACK_ALERT: &str = "Error inesperado al comunicarse con el servidor.";

/// Host-side user interface hooks.
pub trait Navigator: Send + Sync {
    /// Move the user to `location`.
    fn navigate(&self, location: &str);

    /// Show a blocking alert. Runtimes without dialogs keep the default.
    fn alert(&self, _message: &str) {}
}

pub struct FailureRouter {
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
}

impl FailureRouter {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            store,
            navigator,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Log and surface `err` according to the page it happened on.
    pub fn handle_error(&self, page: &PageContext, endpoint: &str, err: &ApiError) {
        if err.code() == Some(ErrorCode::NoAuthToken) {
            return;
        }
        if !page.is_private() {
            warn!(endpoint, status = err.status(), "API error on public page: {err}");
            return;
        }
        error!(endpoint, status = err.status(), page = page.path(), "API error: {err}");
        let message = err.to_string();
        if message.is_empty() {
            self.navigator.alert(FALLBACK_ALERT);
        } else {
            self.navigator.alert(&message);
        }
    }

    /// End the session after a 401 on a private page.
    ///
    /// Returns whether a redirect happened. Public pages and the login page
    /// itself keep their credentials.
    pub fn handle_unauthorized(&self, page: &PageContext) -> bool {
        if !page.is_private() || page.is_login_page() {
            return false;
        }
        if let Err(e) = Credentials::clear(self.store.as_ref(), &self.config) {
            warn!(page = page.path(), "failed to clear stored credentials: {e}");
        }
        info!(
            page = page.path(),
            to = %self.config.login_route,
            "session rejected, redirecting to login"
        );
        self.navigator.navigate(&self.config.login_route);
        true
    }
}
