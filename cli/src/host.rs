use std::path::Path;

use tienda_core::Navigator;
use tracing::info;

/// Reports navigations and alerts on stderr. There is no page to unload, so
/// a redirect just tells the user where they would be sent.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, location: &str) {
        info!(location, "redirect");
        eprintln!("session expired, log in again (redirect: {location})");
    }

    fn alert(&self, message: &str) {
        eprintln!("alert: {message}");
    }
}

pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
