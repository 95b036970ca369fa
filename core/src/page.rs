//! Current page context.
//!
//! Whether a view needs an authenticated session decides how failures are
//! surfaced. Hosts that know their routes declare it with
//! [`PageContext::public`] / [`PageContext::private`]; hosts that only know
//! the location path use [`PageContext::infer`].

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    path: String,
    access: RouteAccess,
}

impl PageContext {
    pub fn new(path: impl Into<String>, access: RouteAccess) -> Self {
        Self {
            path: path.into(),
            access,
        }
    }

    pub fn public(path: impl Into<String>) -> Self {
        Self::new(path, RouteAccess::Public)
    }

    pub fn private(path: impl Into<String>) -> Self {
        Self::new(path, RouteAccess::Private)
    }

    /// Classify `path` by its segments: private iff a segment starts with one
    /// of `private_fragments`, ignoring ASCII case.
    pub fn infer<S: AsRef<str>>(path: impl Into<String>, private_fragments: &[S]) -> Self {
        let path = path.into();
        let access = if is_private_path(&path, private_fragments) {
            RouteAccess::Private
        } else {
            RouteAccess::Public
        };
        Self { path, access }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn access(&self) -> RouteAccess {
        self.access
    }

    pub fn is_private(&self) -> bool {
        self.access == RouteAccess::Private
    }

    /// The landing/login page itself. Redirecting from here would loop.
    pub fn is_login_page(&self) -> bool {
        self.path.ends_with("/index.html") || self.path == "/" || self.path.contains("login")
    }
}

fn is_private_path<S: AsRef<str>>(path: &str, fragments: &[S]) -> bool {
    let lowered = path.to_ascii_lowercase();
    lowered.split('/').any(|segment| {
        fragments.iter().any(|f| {
            let f = f.as_ref();
            !f.is_empty() && segment.starts_with(&f.to_ascii_lowercase())
        })
    })
}
