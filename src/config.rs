//! Conversion settings and limits.
//!
//! This module provides [`ConvertConfig`] and [`ConvertConfigBuilder`] for
//! configuring page ranges, print appearance, and the timing knobs of the
//! completion-detection machinery.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use webprint::ConvertConfigBuilder;
//!
//! let config = ConvertConfigBuilder::new()
//!     .start_page(1)
//!     .end_page(5)
//!     .document_scale(0.9)
//!     .locking_check_delay(Duration::from_millis(50))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.start_page, 1);
//! assert_eq!(config.end_page, 5);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, you can load configuration
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use webprint::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::time::Duration;

/// Page margins in inches, applied per side at print time.
///
/// All sides default to zero, producing full-bleed output unless the caller
/// asks otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Margins {
    /// Top margin in inches.
    pub top: f64,
    /// Right margin in inches.
    pub right: f64,
    /// Bottom margin in inches.
    pub bottom: f64,
    /// Left margin in inches.
    pub left: f64,
}

impl Margins {
    /// Create margins with explicit values for each side.
    pub fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Uniform margins on all four sides.
    pub fn uniform(inches: f64) -> Self {
        Self::new(inches, inches, inches, inches)
    }
}

/// Text printed at the left, center, and right of a page edge.
///
/// Used for both the header and the footer line. All three positions
/// default to the empty string, which suppresses the label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeLabels {
    /// Left-aligned text.
    pub left: String,
    /// Centered text.
    pub center: String,
    /// Right-aligned text.
    pub right: String,
}

impl EdgeLabels {
    /// Create labels with explicit text at each position.
    pub fn new(
        left: impl Into<String>,
        center: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            left: left.into(),
            center: center.into(),
            right: right.into(),
        }
    }

    /// True if all three positions are empty.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.center.is_empty() && self.right.is_empty()
    }
}

/// Per-conversion settings with production defaults.
///
/// Controls the printed page range and appearance, plus the timing of the
/// three waits the pipeline performs: engine startup, document readiness,
/// and output-file completion polling.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_locking_check_attempts` | 100 | Output-file poll budget |
/// | `locking_check_delay` | 100 ms | Delay between polls |
/// | `start_page` / `end_page` | 1 / `u32::MAX` | Printed page range |
/// | `shrink_to_fit` | `true` | Shrink content to the page size |
/// | `print_even_pages` / `print_odd_pages` | `true` | Page parity toggles |
/// | `document_scale` | 1.0 | Content scale factor |
/// | `print_background_images` | `false` | Include CSS backgrounds |
/// | `javascript_enabled` | `true` | Script execution during load |
/// | `margins` | all 0.0 | Page margins (inches) |
/// | `header` / `footer` | empty | Edge labels (3 positions each) |
/// | `file_name` | `None` | Download filename for the response layer |
/// | `settle_delay` | 1000 ms | Paint-settle wait after document ready |
/// | `navigation_timeout` | 30 s | Bound on waiting for document ready |
/// | `init_timeout` | 60 s | Bound on engine startup |
///
/// # Example
///
/// ```rust
/// use webprint::ConvertConfig;
///
/// let config = ConvertConfig::default();
/// assert_eq!(config.max_locking_check_attempts, 100);
/// assert!(config.shrink_to_fit);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    /// Maximum number of times the output file is polled for completion
    /// before the conversion fails with an output-locked error.
    pub max_locking_check_attempts: u32,

    /// Sleep between two output-file polls.
    ///
    /// Together with `max_locking_check_attempts` this bounds how long a
    /// conversion will wait for the engine to finish flushing the file
    /// (default budget: 100 × 100 ms = 10 s).
    pub locking_check_delay: Duration,

    /// First page of the range to print (1-based).
    pub start_page: u32,

    /// Last page of the range to print.
    ///
    /// Defaults to `u32::MAX`, meaning "through the end of the document".
    pub end_page: u32,

    /// Shrink document content to fit the page size.
    pub shrink_to_fit: bool,

    /// Print even-numbered pages.
    pub print_even_pages: bool,

    /// Print odd-numbered pages.
    pub print_odd_pages: bool,

    /// Scale factor applied to document content (1.0 = 100%).
    pub document_scale: f64,

    /// Include background images and colors in the output.
    pub print_background_images: bool,

    /// Allow script execution while the document loads.
    pub javascript_enabled: bool,

    /// Page margins in inches.
    pub margins: Margins,

    /// Header text at the left/center/right of each page.
    pub header: EdgeLabels,

    /// Footer text at the left/center/right of each page.
    pub footer: EdgeLabels,

    /// Suggested download filename.
    ///
    /// Only consumed by the response layer when building a
    /// content-disposition header; the pipeline itself never uses it, and
    /// sanitizing it for header/filesystem safety is the response layer's
    /// job.
    pub file_name: Option<String>,

    /// Wait after the engine reports the document complete before printing.
    ///
    /// The engine's complete event fires at DOM-complete, slightly before
    /// asynchronous painting has finished; printing immediately can capture
    /// a partially painted page or fault inside the engine.
    pub settle_delay: Duration,

    /// Upper bound on waiting for the document-ready signal.
    pub navigation_timeout: Duration,

    /// Upper bound on waiting for engine startup.
    pub init_timeout: Duration,
}

impl Default for ConvertConfig {
    /// Production-ready default configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use webprint::ConvertConfig;
    ///
    /// let config = ConvertConfig::default();
    ///
    /// assert_eq!(config.max_locking_check_attempts, 100);
    /// assert_eq!(config.locking_check_delay, Duration::from_millis(100));
    /// assert_eq!(config.start_page, 1);
    /// assert_eq!(config.end_page, u32::MAX);
    /// assert_eq!(config.document_scale, 1.0);
    /// assert_eq!(config.settle_delay, Duration::from_millis(1000));
    /// ```
    fn default() -> Self {
        Self {
            max_locking_check_attempts: 100,
            locking_check_delay: Duration::from_millis(100),
            start_page: 1,
            end_page: u32::MAX,
            shrink_to_fit: true,
            print_even_pages: true,
            print_odd_pages: true,
            document_scale: 1.0,
            print_background_images: false,
            javascript_enabled: true,
            margins: Margins::default(),
            header: EdgeLabels::default(),
            footer: EdgeLabels::default(),
            file_name: None,
            settle_delay: Duration::from_millis(1000),
            navigation_timeout: Duration::from_secs(30),
            init_timeout: Duration::from_secs(60),
        }
    }
}

/// Builder for [`ConvertConfig`] with validation.
///
/// Provides a fluent API for constructing validated configurations.
/// All setter methods can be chained together.
///
/// # Validation
///
/// The [`build()`](Self::build) method validates:
/// - `start_page` must be at least 1
/// - `start_page` must not exceed `end_page`
/// - `document_scale` must be positive
/// - `max_locking_check_attempts` must be at least 1
///
/// # Example
///
/// ```rust
/// use webprint::ConvertConfigBuilder;
///
/// let config = ConvertConfigBuilder::new()
///     .print_background_images(true)
///     .file_name("report.pdf")
///     .build()
///     .unwrap();
///
/// assert!(config.print_background_images);
/// ```
pub struct ConvertConfigBuilder {
    config: ConvertConfig,
}

impl ConvertConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: ConvertConfig::default(),
        }
    }

    /// Set the output-file poll budget (must be >= 1).
    pub fn max_locking_check_attempts(mut self, attempts: u32) -> Self {
        self.config.max_locking_check_attempts = attempts;
        self
    }

    /// Set the delay between output-file polls.
    pub fn locking_check_delay(mut self, delay: Duration) -> Self {
        self.config.locking_check_delay = delay;
        self
    }

    /// Set the first page of the printed range (1-based).
    pub fn start_page(mut self, page: u32) -> Self {
        self.config.start_page = page;
        self
    }

    /// Set the last page of the printed range.
    pub fn end_page(mut self, page: u32) -> Self {
        self.config.end_page = page;
        self
    }

    /// Enable or disable shrink-to-fit.
    pub fn shrink_to_fit(mut self, enabled: bool) -> Self {
        self.config.shrink_to_fit = enabled;
        self
    }

    /// Enable or disable even-numbered pages.
    pub fn print_even_pages(mut self, enabled: bool) -> Self {
        self.config.print_even_pages = enabled;
        self
    }

    /// Enable or disable odd-numbered pages.
    pub fn print_odd_pages(mut self, enabled: bool) -> Self {
        self.config.print_odd_pages = enabled;
        self
    }

    /// Set the document scale factor (must be positive).
    pub fn document_scale(mut self, scale: f64) -> Self {
        self.config.document_scale = scale;
        self
    }

    /// Include or exclude background images.
    pub fn print_background_images(mut self, enabled: bool) -> Self {
        self.config.print_background_images = enabled;
        self
    }

    /// Allow or forbid script execution during load.
    pub fn javascript_enabled(mut self, enabled: bool) -> Self {
        self.config.javascript_enabled = enabled;
        self
    }

    /// Set the page margins.
    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.margins = margins;
        self
    }

    /// Set the header labels.
    pub fn header(mut self, header: EdgeLabels) -> Self {
        self.config.header = header;
        self
    }

    /// Set the footer labels.
    pub fn footer(mut self, footer: EdgeLabels) -> Self {
        self.config.footer = footer;
        self
    }

    /// Set the suggested download filename for the response layer.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.config.file_name = Some(name.into());
        self
    }

    /// Set the paint-settle delay applied after document ready.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the bound on waiting for the document-ready signal.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Set the bound on engine startup.
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - Returns error if `start_page` is 0
    /// - Returns error if `start_page` > `end_page`
    /// - Returns error if `document_scale` is not positive
    /// - Returns error if `max_locking_check_attempts` is 0
    ///
    /// # Example
    ///
    /// ```rust
    /// use webprint::ConvertConfigBuilder;
    ///
    /// // Invalid: inverted page range
    /// let config = ConvertConfigBuilder::new()
    ///     .start_page(10)
    ///     .end_page(5)
    ///     .build();
    /// assert!(config.is_err());
    /// ```
    pub fn build(self) -> std::result::Result<ConvertConfig, String> {
        if self.config.start_page == 0 {
            return Err("start_page must be at least 1".to_string());
        }

        if self.config.start_page > self.config.end_page {
            return Err("start_page cannot exceed end_page".to_string());
        }

        if !(self.config.document_scale > 0.0) {
            return Err("document_scale must be positive".to_string());
        }

        if self.config.max_locking_check_attempts == 0 {
            return Err("max_locking_check_attempts must be at least 1".to_string());
        }

        Ok(self.config)
    }
}

impl Default for ConvertConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment File
///
/// This module uses `dotenvy` to load environment variables from an `app.env`
/// file in the current directory. The file is optional - if not found,
/// environment variables and defaults are used.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `PDF_LOCK_CHECK_ATTEMPTS` | u32 | 100 | Output-file poll budget |
/// | `PDF_LOCK_CHECK_DELAY_MS` | u64 | 100 | Delay between polls |
/// | `PDF_SETTLE_DELAY_MS` | u64 | 1000 | Paint-settle delay |
/// | `PDF_NAVIGATION_TIMEOUT_SECS` | u64 | 30 | Document-ready bound |
/// | `PDF_INIT_TIMEOUT_SECS` | u64 | 60 | Engine startup bound |
/// | `PDF_ENGINE_PATH` | String | auto | Custom engine binary path |
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::ConvertError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from the `app.env` file.
    ///
    /// This function is automatically called by [`from_env`], but you can
    /// call it explicitly if you need to load the file earlier or check
    /// for errors.
    pub fn load_env_file() -> std::result::Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the timing knobs from environment variables with the standard
    /// defaults. Also loads `app.env` if present (via `dotenvy`).
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::Config`] if the resulting values fail
    /// validation.
    pub fn from_env() -> std::result::Result<ConvertConfig, ConvertError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        let attempts = std::env::var("PDF_LOCK_CHECK_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100u32);

        let delay_ms = std::env::var("PDF_LOCK_CHECK_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100u64);

        let settle_ms = std::env::var("PDF_SETTLE_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000u64);

        let navigation_secs = std::env::var("PDF_NAVIGATION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30u64);

        let init_secs = std::env::var("PDF_INIT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60u64);

        log::info!("Loading conversion configuration from environment:");
        log::info!("   - Lock check attempts: {}", attempts);
        log::info!("   - Lock check delay: {}ms", delay_ms);
        log::info!("   - Settle delay: {}ms", settle_ms);
        log::info!("   - Navigation timeout: {}s", navigation_secs);
        log::info!("   - Init timeout: {}s", init_secs);

        ConvertConfigBuilder::new()
            .max_locking_check_attempts(attempts)
            .locking_check_delay(Duration::from_millis(delay_ms))
            .settle_delay(Duration::from_millis(settle_ms))
            .navigation_timeout(Duration::from_secs(navigation_secs))
            .init_timeout(Duration::from_secs(init_secs))
            .build()
            .map_err(ConvertError::Config)
    }

    /// Get the engine binary path from the environment.
    ///
    /// Reads the `PDF_ENGINE_PATH` environment variable.
    ///
    /// # Returns
    ///
    /// - `Some(path)` if `PDF_ENGINE_PATH` is set
    /// - `None` if not set (auto-detection is used)
    pub fn engine_path_from_env() -> Option<String> {
        std::env::var("PDF_ENGINE_PATH").ok()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that the builder correctly sets all configuration values.
    #[test]
    fn test_config_builder() {
        let config = ConvertConfigBuilder::new()
            .max_locking_check_attempts(50)
            .locking_check_delay(Duration::from_millis(20))
            .start_page(2)
            .end_page(8)
            .document_scale(0.75)
            .print_background_images(true)
            .javascript_enabled(false)
            .margins(Margins::uniform(0.5))
            .footer(EdgeLabels::new("", "Page &P", ""))
            .file_name("invoice.pdf")
            .build()
            .unwrap();

        assert_eq!(config.max_locking_check_attempts, 50);
        assert_eq!(config.locking_check_delay, Duration::from_millis(20));
        assert_eq!(config.start_page, 2);
        assert_eq!(config.end_page, 8);
        assert_eq!(config.document_scale, 0.75);
        assert!(config.print_background_images);
        assert!(!config.javascript_enabled);
        assert_eq!(config.margins.top, 0.5);
        assert_eq!(config.footer.center, "Page &P");
        assert_eq!(config.file_name.as_deref(), Some("invoice.pdf"));
    }

    /// Verifies the inverted page range is rejected at build time.
    ///
    /// The observed legacy behavior let an inverted range through to the
    /// engine; validating it here surfaces the mistake to the caller
    /// instead of producing an empty document.
    #[test]
    fn test_config_rejects_inverted_page_range() {
        let result = ConvertConfigBuilder::new()
            .start_page(10)
            .end_page(5)
            .build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err();
        assert!(
            err_msg.contains("start_page cannot exceed end_page"),
            "Expected validation error message, got: {}",
            err_msg
        );
    }

    /// Verifies a zero start page is rejected.
    #[test]
    fn test_config_rejects_zero_start_page() {
        let result = ConvertConfigBuilder::new().start_page(0).build();
        assert!(result.is_err());
    }

    /// Verifies non-positive scale factors are rejected.
    #[test]
    fn test_config_rejects_bad_scale() {
        assert!(ConvertConfigBuilder::new().document_scale(0.0).build().is_err());
        assert!(ConvertConfigBuilder::new().document_scale(-1.0).build().is_err());
        assert!(ConvertConfigBuilder::new().document_scale(f64::NAN).build().is_err());
    }

    /// Verifies a zero poll budget is rejected.
    #[test]
    fn test_config_rejects_zero_attempts() {
        let result = ConvertConfigBuilder::new()
            .max_locking_check_attempts(0)
            .build();
        assert!(result.is_err());
    }

    /// Verifies that default configuration values match documented behavior.
    #[test]
    fn test_config_defaults() {
        let config = ConvertConfig::default();

        assert_eq!(config.max_locking_check_attempts, 100);
        assert_eq!(config.locking_check_delay, Duration::from_millis(100));
        assert_eq!(config.start_page, 1);
        assert_eq!(config.end_page, u32::MAX);
        assert!(config.shrink_to_fit);
        assert!(config.print_even_pages);
        assert!(config.print_odd_pages);
        assert_eq!(config.document_scale, 1.0);
        assert!(!config.print_background_images);
        assert!(config.javascript_enabled);
        assert_eq!(config.margins, Margins::default());
        assert!(config.header.is_empty());
        assert!(config.footer.is_empty());
        assert!(config.file_name.is_none());
        assert_eq!(config.settle_delay, Duration::from_millis(1000));
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.init_timeout, Duration::from_secs(60));
    }

    /// Verifies margin helpers.
    #[test]
    fn test_margins_uniform() {
        let m = Margins::uniform(0.25);
        assert_eq!(m.top, 0.25);
        assert_eq!(m.right, 0.25);
        assert_eq!(m.bottom, 0.25);
        assert_eq!(m.left, 0.25);
    }

    /// Verifies EdgeLabels emptiness check.
    #[test]
    fn test_edge_labels_empty() {
        assert!(EdgeLabels::default().is_empty());
        assert!(!EdgeLabels::new("", "x", "").is_empty());
    }
}
