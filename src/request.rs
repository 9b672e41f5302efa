//! Request-side data model for conversions.
//!
//! This module provides the inputs a conversion consumes: [`Cookie`] and
//! [`HeaderEntry`] values extracted from an inbound request by the caller,
//! the [`PageSource`] to navigate (a URL or raw markup plus a base URL),
//! and the assembled [`ConvertRequest`].
//!
//! The crate is agnostic to how these values were produced — extracting
//! them from an HTTP request belongs to the calling layer.
//!
//! # Example
//!
//! ```rust
//! use webprint::{ConvertRequest, Cookie, HeaderEntry};
//!
//! let request = ConvertRequest::url("https://example.com/invoice/42")
//!     .with_headers(vec![HeaderEntry::new("Accept-Language", "de-DE")])
//!     .with_cookies(vec![Cookie::session("sid", "abc123")]);
//!
//! assert_eq!(request.navigation_url(), "https://example.com/invoice/42");
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cookie to register into the session's per-host jar before navigation.
///
/// Fields mirror what a server-side caller typically lifts off an inbound
/// request. The host the cookie is scoped to is not part of the value — it
/// is derived from the request URL at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Cookie path.
    pub path: String,
    /// Only send over secure transports.
    pub secure: bool,
    /// Hidden from page scripts.
    pub http_only: bool,
    /// Expiry as seconds since the Unix epoch.
    pub expires_unix: i64,
}

impl Cookie {
    /// Create a cookie with explicit attributes.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        path: impl Into<String>,
        secure: bool,
        http_only: bool,
        expires_unix: i64,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: path.into(),
            secure,
            http_only,
            expires_unix,
        }
    }

    /// Shorthand for a plain session cookie rooted at `/`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use webprint::Cookie;
    ///
    /// let c = Cookie::session("sid", "abc123");
    /// assert_eq!(c.path, "/");
    /// assert!(!c.secure);
    /// ```
    pub fn session(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, "/", false, false, 0)
    }
}

/// A request header with an ordered sequence of values.
///
/// Multi-valued headers keep their values in insertion order; backends
/// joining them onto one line do so comma-separated per HTTP conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    /// Header name.
    pub name: String,
    /// Ordered values for this header.
    pub values: Vec<String>,
}

impl HeaderEntry {
    /// Create a single-valued header.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }

    /// Create a multi-valued header.
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// All values joined onto one header line.
    pub fn joined(&self) -> String {
        self.values.join(", ")
    }
}

/// Fallback header set for URL navigation when the caller supplies none.
///
/// Some origins refuse requests without a plausible browser fingerprint;
/// these are only merged in when the request carries no headers of its own.
pub fn default_headers() -> Vec<HeaderEntry> {
    vec![
        HeaderEntry::new(
            "User-Agent",
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
        HeaderEntry::new(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        HeaderEntry::new("Accept-Language", "en-US,en;q=0.5"),
        HeaderEntry::new("Accept-Encoding", "gzip, deflate"),
        HeaderEntry::new("Connection", "keep-alive"),
    ]
}

/// What the session should navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    /// Navigate to a URL.
    Url(String),
    /// Load pre-rendered markup directly.
    Markup {
        /// The complete HTML document to load.
        html: String,
        /// Absolute URL used only to resolve relative resource references
        /// (images, stylesheets) inside the markup.
        base_url: String,
    },
}

/// Cooperative cancellation signal for an in-flight conversion.
///
/// The pipeline observes the token at its two suspension points — waiting
/// for document ready and waiting for the output file to unlock. On
/// cancellation the session is released and any partial output file is
/// deleted.
///
/// Cloning is cheap; clones observe the same signal.
///
/// # Example
///
/// ```rust
/// use webprint::CancelToken;
///
/// let token = CancelToken::new();
/// let watcher = token.clone();
/// assert!(!watcher.is_cancelled());
/// token.cancel();
/// assert!(watcher.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, unsignaled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A fully assembled conversion request.
///
/// Build one with [`ConvertRequest::url`] or [`ConvertRequest::markup`] and
/// the `with_*` combinators, or use the convenience methods on
/// [`Converter`](crate::Converter) which assemble requests internally.
#[derive(Debug, Clone)]
pub struct ConvertRequest {
    /// Navigation target.
    pub source: PageSource,
    /// Headers merged into URL navigation (fallback set used when empty).
    pub headers: Vec<HeaderEntry>,
    /// Cookies registered into the per-host jar before navigation.
    pub cookies: Vec<Cookie>,
    /// Caller-supplied output path; a unique temporary path is generated
    /// when absent. The file is deleted after its bytes are read either way.
    pub output_path: Option<PathBuf>,
    /// Optional cancellation signal.
    pub cancel: Option<CancelToken>,
}

impl ConvertRequest {
    /// Request conversion of the page at `url`.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            source: PageSource::Url(url.into()),
            headers: Vec::new(),
            cookies: Vec::new(),
            output_path: None,
            cancel: None,
        }
    }

    /// Request conversion of pre-rendered markup.
    ///
    /// `base_url` is used only to resolve relative resource references.
    pub fn markup(html: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            source: PageSource::Markup {
                html: html.into(),
                base_url: base_url.into(),
            },
            headers: Vec::new(),
            cookies: Vec::new(),
            output_path: None,
            cancel: None,
        }
    }

    /// Attach request headers.
    pub fn with_headers(mut self, headers: Vec<HeaderEntry>) -> Self {
        self.headers = headers;
        self
    }

    /// Attach cookies.
    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Write the output to a caller-chosen path instead of a temp file.
    ///
    /// Missing parent directories are created. The file is still deleted
    /// after its bytes are read.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The URL cookies are scoped against: the navigation URL for URL
    /// requests, the base URL for markup requests.
    pub fn navigation_url(&self) -> &str {
        match &self.source {
            PageSource::Url(url) => url,
            PageSource::Markup { base_url, .. } => base_url,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_session_shorthand() {
        let c = Cookie::session("sid", "v");
        assert_eq!(c.name, "sid");
        assert_eq!(c.value, "v");
        assert_eq!(c.path, "/");
        assert!(!c.secure);
        assert!(!c.http_only);
        assert_eq!(c.expires_unix, 0);
    }

    #[test]
    fn test_header_joined_preserves_order() {
        let h = HeaderEntry::with_values(
            "Accept",
            vec!["text/html".to_string(), "application/xml".to_string()],
        );
        assert_eq!(h.joined(), "text/html, application/xml");
    }

    /// The fallback set carries exactly the five standard request headers.
    #[test]
    fn test_default_headers_shape() {
        let headers = default_headers();
        let names: Vec<&str> = headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "User-Agent",
                "Accept",
                "Accept-Language",
                "Accept-Encoding",
                "Connection"
            ]
        );
        assert!(headers.iter().all(|h| !h.values.is_empty()));
    }

    #[test]
    fn test_navigation_url_for_markup_is_base_url() {
        let req = ConvertRequest::markup("<html></html>", "https://example.com/page");
        assert_eq!(req.navigation_url(), "https://example.com/page");
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        // Idempotent
        token.cancel();
        assert!(token.is_cancelled());
    }
}
