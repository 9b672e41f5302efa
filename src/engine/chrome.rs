//! Headless Chrome/Chromium engine backend.
//!
//! Drives one headless Chrome process through the DevTools protocol and
//! adapts it to the engine traits: pages are tabs, the document-complete
//! event is observed by a watcher thread around navigation, and printing
//! renders the PDF in-process before handing the bytes to a background
//! writer — so, exactly like a native print-to-file engine, the dispatch
//! returning does not mean the output file is complete. The lock-poll
//! machinery observes the file appearing, not the dispatch.
//!
//! # Example
//!
//! ```rust,ignore
//! use webprint::engine::ChromeEngineFactory;
//!
//! // Auto-detect the browser binary
//! let factory = ChromeEngineFactory::with_defaults();
//!
//! // Or point at a specific installation
//! let factory = ChromeEngineFactory::with_path("/usr/bin/chromium".to_string());
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Network::CookieParam;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::{EngineBackend, EngineFactory, EnginePage, ReadyCallback};
use crate::config::EdgeLabels;
use crate::error::{ConvertError, Result};
use crate::request::{Cookie, HeaderEntry};
use crate::settings::PrintSettings;

/// Factory for the headless Chrome backend.
///
/// Handles binary path detection and launch-option configuration. The
/// browser process is started by [`boot`](EngineFactory::boot) on the
/// dedicated engine thread.
pub struct ChromeEngineFactory {
    /// Function that generates launch options at boot time.
    launch_options_fn: Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>,
}

impl ChromeEngineFactory {
    /// Create a factory with a custom launch-options function.
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
        }
    }

    /// Create a factory that auto-detects the browser binary.
    ///
    /// This is the recommended default; common installation paths are
    /// searched on Linux, macOS, and Windows.
    pub fn with_defaults() -> Self {
        log::debug!("Creating ChromeEngineFactory with auto-detect");
        Self::new(|| {
            create_engine_launch_options(None)
                .map_err(|e| ConvertError::EngineInit(e.to_string()))
        })
    }

    /// Create a factory using a specific browser binary.
    ///
    /// Use this when the browser lives in a non-standard location, e.g.
    /// a binary directory shipped alongside the application.
    pub fn with_path(engine_path: String) -> Self {
        log::debug!(
            "Creating ChromeEngineFactory with custom path: {}",
            engine_path
        );
        Self::new(move || {
            create_engine_launch_options(Some(&engine_path))
                .map_err(|e| ConvertError::EngineInit(e.to_string()))
        })
    }
}

impl EngineFactory for ChromeEngineFactory {
    /// Launch the browser process.
    ///
    /// Runs on the engine thread. The resulting backend (and every page it
    /// creates) stays on that thread for its whole life.
    fn boot(&self) -> Result<Box<dyn EngineBackend>> {
        let options = (self.launch_options_fn)()?;

        log::debug!("Launching headless browser...");
        let browser = Browser::new(options).map_err(|e| {
            log::error!("Browser launch failed: {}", e);
            ConvertError::EngineInit(e.to_string())
        })?;

        log::info!("Headless browser launched");
        Ok(Box::new(ChromeEngine { browser }))
    }
}

/// A running headless Chrome instance.
struct ChromeEngine {
    browser: Browser,
}

impl EngineBackend for ChromeEngine {
    fn create_page(&mut self) -> Result<Box<dyn EnginePage>> {
        let tab = self.browser.new_tab().map_err(|e| {
            log::error!("Failed to create tab: {}", e);
            ConvertError::Navigation(e.to_string())
        })?;

        Ok(Box::new(ChromePage {
            tab,
            ready: None,
            disposed: false,
        }))
    }
}

/// One tab, adapted to the page contract.
struct ChromePage {
    tab: Arc<Tab>,
    /// Registered document-complete callback, taken at navigation time.
    ready: Option<ReadyCallback>,
    disposed: bool,
}

impl ChromePage {
    /// Start the watcher that fires the ready callback once navigation
    /// settles.
    ///
    /// `Tab` is thread-safe (it speaks to the browser process over a
    /// channel), so the watcher can block on `wait_until_navigated` off the
    /// engine thread. If navigation never settles, the callback is dropped
    /// unfired and the caller's ready wait times out.
    fn spawn_ready_watcher(&mut self) {
        let Some(notify) = self.ready.take() else {
            return;
        };
        let tab = Arc::clone(&self.tab);
        thread::spawn(move || match tab.wait_until_navigated() {
            Ok(_) => notify(),
            Err(e) => {
                log::warn!("Navigation did not settle, ready signal withheld: {}", e);
                drop(notify);
            }
        });
    }
}

impl EnginePage for ChromePage {
    fn on_document_ready(&mut self, notify: ReadyCallback) {
        self.ready = Some(notify);
    }

    fn set_javascript_enabled(&mut self, enabled: bool) -> Result<()> {
        self.tab
            .call_method(Emulation::SetScriptExecutionDisabled { value: !enabled })
            .map_err(|e| ConvertError::Navigation(e.to_string()))?;
        Ok(())
    }

    fn set_cookie(&mut self, host: &str, cookie: &Cookie) -> Result<()> {
        let param = CookieParam {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            url: None,
            domain: Some(host.to_string()),
            path: Some(cookie.path.clone()),
            secure: Some(cookie.secure),
            http_only: Some(cookie.http_only),
            same_site: None,
            expires: Some(cookie.expires_unix as f64),
            priority: None,
            same_party: None,
            source_scheme: None,
            source_port: None,
            partition_key: None,
        };

        self.tab
            .set_cookies(vec![param])
            .map_err(|e| ConvertError::Navigation(e.to_string()))?;

        log::trace!("Cookie '{}' registered for host {}", cookie.name, host);
        Ok(())
    }

    fn load_url(&mut self, url: &str, headers: &[HeaderEntry]) -> Result<()> {
        if !headers.is_empty() {
            let joined: Vec<(String, String)> = headers
                .iter()
                .map(|h| (h.name.clone(), h.joined()))
                .collect();
            let map: HashMap<&str, &str> = joined
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            self.tab
                .set_extra_http_headers(map)
                .map_err(|e| ConvertError::Navigation(e.to_string()))?;
        }

        self.tab
            .navigate_to(url)
            .map_err(|e| ConvertError::Navigation(e.to_string()))?;

        self.spawn_ready_watcher();
        Ok(())
    }

    fn load_markup(&mut self, html: &str, base_url: &str) -> Result<()> {
        let html = inject_base_href(html, base_url);
        let data_url = format!(
            "data:text/html;charset=utf-8,{}",
            urlencoding::encode(&html)
        );

        log::trace!("Data URL length: {} bytes", data_url.len());

        self.tab
            .navigate_to(&data_url)
            .map_err(|e| ConvertError::Navigation(e.to_string()))?;

        self.spawn_ready_watcher();
        Ok(())
    }

    fn print_to_file(&mut self, settings: &PrintSettings, output: &Path) -> Result<()> {
        let options = map_print_settings(settings);

        let pdf = self
            .tab
            .print_to_pdf(Some(options))
            .map_err(|e| ConvertError::Print(e.to_string()))?;

        // Hand the bytes to a background writer so the file materializes
        // after this dispatch returns, and atomically: the part file is
        // renamed into place only once fully written, which is what the
        // lock poll observes.
        let output = output.to_path_buf();
        let part = output.with_extension("part");
        thread::spawn(move || {
            if let Err(e) = fs::write(&part, &pdf).and_then(|_| fs::rename(&part, &output)) {
                log::error!(
                    "Failed to write print output to {}: {}",
                    output.display(),
                    e
                );
            }
        });

        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Err(e) = self.tab.close(true) {
            log::warn!("Failed to close tab (resources reclaimed on engine unload): {}", e);
        }
    }
}

/// Map engine-agnostic print settings onto DevTools print options.
///
/// Chrome has no equivalent of even/odd-page filtering; when either toggle
/// is off a warning is logged and the full range is printed.
fn map_print_settings(settings: &PrintSettings) -> PrintToPdfOptions {
    if !settings.print_even_pages || !settings.print_odd_pages {
        log::warn!("Even/odd page filtering is not supported by this backend; printing full range");
    }

    let page_ranges = if settings.start_page == 1 && settings.end_page == u32::MAX {
        None
    } else if settings.end_page == u32::MAX {
        Some(format!("{}-", settings.start_page))
    } else {
        Some(format!("{}-{}", settings.start_page, settings.end_page))
    };

    let display_header_footer = !settings.header.is_empty() || !settings.footer.is_empty();

    PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(display_header_footer),
        print_background: Some(settings.print_background_images),
        scale: Some(settings.scale),
        margin_top: Some(settings.margins.top),
        margin_bottom: Some(settings.margins.bottom),
        margin_left: Some(settings.margins.left),
        margin_right: Some(settings.margins.right),
        page_ranges,
        prefer_css_page_size: Some(!settings.shrink_to_fit),
        header_template: edge_template(&settings.header),
        footer_template: edge_template(&settings.footer),
        ..Default::default()
    }
}

/// Render edge labels as the minimal header/footer template Chrome expects.
fn edge_template(labels: &EdgeLabels) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    Some(format!(
        "<div style=\"font-size:8px;width:100%;display:flex;justify-content:space-between;\">\
         <span>{}</span><span>{}</span><span>{}</span></div>",
        labels.left, labels.center, labels.right
    ))
}

/// Insert a `<base href>` so relative resource references in raw markup
/// resolve against the caller's base URL.
///
/// Placed right after `<head>` when present, otherwise prepended; an
/// existing `<base` tag wins and the markup is left untouched.
fn inject_base_href(html: &str, base_url: &str) -> String {
    let lower = html.to_ascii_lowercase();
    if lower.contains("<base") {
        return html.to_string();
    }

    let base_tag = format!("<base href=\"{}\">", base_url);

    if let Some(head_start) = lower.find("<head") {
        if let Some(close) = lower[head_start..].find('>') {
            let insert_at = head_start + close + 1;
            let mut out = String::with_capacity(html.len() + base_tag.len());
            out.push_str(&html[..insert_at]);
            out.push_str(&base_tag);
            out.push_str(&html[insert_at..]);
            return out;
        }
    }

    format!("{}{}", base_tag, html)
}

/// Create browser launch options with an optional custom binary path.
///
/// Configured for stable headless server-side operation: no sandbox (for
/// containers), no GPU compositing, background throttling off so hidden
/// pages keep rendering.
pub fn create_engine_launch_options(
    engine_path: Option<&str>,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    match engine_path {
        Some(path) => log::debug!("Creating launch options with custom path: {}", path),
        None => log::debug!("Creating launch options (auto-detect browser)"),
    }

    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = engine_path {
        builder.path(Some(path.to_string().into()));
    }

    builder
        .headless(true)
        .sandbox(false)
        .args(vec![
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            "--disable-gpu-compositing".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            "--disable-extensions".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-hang-monitor".as_ref(),
        ])
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            let path_msg = engine_path.unwrap_or("auto-detect");
            log::error!(
                "Failed to build launch options (path: {}): {}",
                path_msg,
                e
            );
            e.into()
        })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfig;
    use crate::settings::build_print_settings;

    /// Verifies that launch options can be built without a browser present.
    #[test]
    fn test_create_launch_options() {
        let result = create_engine_launch_options(None);
        assert!(
            result.is_ok(),
            "Auto-detect launch options should build: {:?}",
            result.err()
        );

        let result = create_engine_launch_options(Some("/custom/engine/path"));
        assert!(result.is_ok());
    }

    /// Default config maps to a full-range, header-less print.
    #[test]
    fn test_map_default_settings() {
        let settings = build_print_settings(&ConvertConfig::default());
        let options = map_print_settings(&settings);

        assert_eq!(options.page_ranges, None);
        assert_eq!(options.display_header_footer, Some(false));
        assert_eq!(options.print_background, Some(false));
        assert_eq!(options.scale, Some(1.0));
        assert_eq!(options.margin_top, Some(0.0));
        assert_eq!(options.header_template, None);
    }

    /// Page ranges serialize in the engine's "a-b" syntax.
    #[test]
    fn test_map_page_ranges() {
        let mut settings = build_print_settings(&ConvertConfig::default());

        settings.start_page = 2;
        settings.end_page = 6;
        assert_eq!(
            map_print_settings(&settings).page_ranges,
            Some("2-6".to_string())
        );

        settings.end_page = u32::MAX;
        assert_eq!(
            map_print_settings(&settings).page_ranges,
            Some("2-".to_string())
        );
    }

    /// Footer text enables the header/footer display flag.
    #[test]
    fn test_map_footer_enables_display() {
        let mut settings = build_print_settings(&ConvertConfig::default());
        settings.footer = EdgeLabels::new("", "Page", "");
        let options = map_print_settings(&settings);

        assert_eq!(options.display_header_footer, Some(true));
        assert!(options.footer_template.unwrap().contains("Page"));
        assert_eq!(options.header_template, None);
    }

    /// Base tag lands directly after <head>.
    #[test]
    fn test_inject_base_href_into_head() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let out = inject_base_href(html, "https://example.com/a/");
        assert!(
            out.starts_with("<html><head><base href=\"https://example.com/a/\"><title>"),
            "unexpected injection point: {}",
            out
        );
    }

    /// Markup without a head gets the tag prepended.
    #[test]
    fn test_inject_base_href_headless_markup() {
        let out = inject_base_href("<p>hi</p>", "https://example.com/");
        assert!(out.starts_with("<base href=\"https://example.com/\"><p>hi</p>"));
    }

    /// An existing base tag is left alone.
    #[test]
    fn test_inject_base_href_respects_existing() {
        let html = "<head><base href=\"https://other/\"></head>";
        assert_eq!(inject_base_href(html, "https://example.com/"), html);
    }
}
