//! Engine print settings and the pure config-to-settings mapping.
//!
//! [`build_print_settings`] is a pure function from a [`ConvertConfig`] to
//! the [`PrintSettings`] handed to the engine backend: no I/O, no state,
//! deterministic. Two calls with an identical config produce identical
//! settings regardless of call order or prior calls, which makes the
//! mapping trivially property-testable.
//!
//! The fixed portion of the settings never varies: printing is always
//! silent (no dialog), always to a file, always PDF, with the progress UI
//! hidden. Everything else is carried over from the config.

use std::time::Duration;

use crate::config::{ConvertConfig, EdgeLabels, Margins};

/// Output format requested from the engine.
///
/// Only PDF is produced by this crate, but the engine API models the
/// format as a parameter, so the settings do too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Portable Document Format.
    Pdf,
}

/// Fully resolved settings for one print dispatch.
///
/// Backend-agnostic: each engine backend maps these onto whatever its
/// native print-settings object looks like. Constructed exclusively by
/// [`build_print_settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrintSettings {
    /// Print without any dialog or user interaction. Always `true`.
    pub silent: bool,
    /// Print to a file rather than a device. Always `true`.
    pub print_to_file: bool,
    /// Show the engine's progress UI. Always `false`.
    pub show_progress: bool,
    /// Requested output format. Always [`OutputFormat::Pdf`].
    pub output_format: OutputFormat,
    /// First page of the printed range (1-based).
    pub start_page: u32,
    /// Last page of the printed range (`u32::MAX` = to the end).
    pub end_page: u32,
    /// Print even-numbered pages.
    pub print_even_pages: bool,
    /// Print odd-numbered pages.
    pub print_odd_pages: bool,
    /// Shrink content to fit the page size.
    pub shrink_to_fit: bool,
    /// Content scale factor.
    pub scale: f64,
    /// Include background images and colors.
    pub print_background_images: bool,
    /// Page margins in inches.
    pub margins: Margins,
    /// Header text (left/center/right).
    pub header: EdgeLabels,
    /// Footer text (left/center/right).
    pub footer: EdgeLabels,
}

/// How the completion poll for this print should behave.
///
/// Bundled here so the pipeline reads the poll parameters from one place;
/// carried alongside rather than inside [`PrintSettings`] because polling
/// is pipeline behavior, not something the engine sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPollSettings {
    /// Maximum polling attempts before giving up.
    pub max_attempts: u32,
    /// Sleep between attempts.
    pub delay: Duration,
}

/// Map a conversion config onto engine print settings.
///
/// Pure: consumes nothing but the config, touches no I/O, and always
/// produces the same output for the same input.
///
/// # Example
///
/// ```rust
/// use webprint::{ConvertConfig, build_print_settings};
///
/// let config = ConvertConfig::default();
/// let a = build_print_settings(&config);
/// let b = build_print_settings(&config);
/// assert_eq!(a, b);
/// assert!(a.silent);
/// assert!(a.print_to_file);
/// ```
pub fn build_print_settings(config: &ConvertConfig) -> PrintSettings {
    PrintSettings {
        silent: true,
        print_to_file: true,
        show_progress: false,
        output_format: OutputFormat::Pdf,
        start_page: config.start_page,
        end_page: config.end_page,
        print_even_pages: config.print_even_pages,
        print_odd_pages: config.print_odd_pages,
        shrink_to_fit: config.shrink_to_fit,
        scale: config.document_scale,
        print_background_images: config.print_background_images,
        margins: config.margins,
        header: config.header.clone(),
        footer: config.footer.clone(),
    }
}

/// Extract the lock-poll parameters from a config.
pub fn lock_poll_settings(config: &ConvertConfig) -> LockPollSettings {
    LockPollSettings {
        max_attempts: config.max_locking_check_attempts,
        delay: config.locking_check_delay,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvertConfigBuilder;

    /// The fixed portion is always set the same way.
    #[test]
    fn test_fixed_settings_always_applied() {
        let config = ConvertConfig::default();
        let settings = build_print_settings(&config);

        assert!(settings.silent);
        assert!(settings.print_to_file);
        assert!(!settings.show_progress);
        assert_eq!(settings.output_format, OutputFormat::Pdf);
    }

    /// Identical configs produce identical settings, in any order.
    ///
    /// This is the purity property: the builder keeps no state between
    /// calls, so interleaving builds for different configs cannot bleed
    /// values across.
    #[test]
    fn test_builder_is_pure() {
        let plain = ConvertConfig::default();
        let fancy = ConvertConfigBuilder::new()
            .start_page(3)
            .end_page(9)
            .document_scale(0.5)
            .print_background_images(true)
            .build()
            .unwrap();

        let first_plain = build_print_settings(&plain);
        let first_fancy = build_print_settings(&fancy);
        // Interleave in the opposite order
        let second_fancy = build_print_settings(&fancy);
        let second_plain = build_print_settings(&plain);

        assert_eq!(first_plain, second_plain);
        assert_eq!(first_fancy, second_fancy);
        assert_ne!(first_plain, first_fancy);
    }

    /// Config values are carried across verbatim.
    #[test]
    fn test_config_values_mapped() {
        let config = ConvertConfigBuilder::new()
            .start_page(2)
            .end_page(4)
            .print_even_pages(false)
            .shrink_to_fit(false)
            .document_scale(1.5)
            .margins(crate::config::Margins::new(0.5, 0.4, 0.3, 0.2))
            .footer(crate::config::EdgeLabels::new("l", "c", "r"))
            .build()
            .unwrap();

        let settings = build_print_settings(&config);

        assert_eq!(settings.start_page, 2);
        assert_eq!(settings.end_page, 4);
        assert!(!settings.print_even_pages);
        assert!(settings.print_odd_pages);
        assert!(!settings.shrink_to_fit);
        assert_eq!(settings.scale, 1.5);
        assert_eq!(settings.margins.top, 0.5);
        assert_eq!(settings.margins.left, 0.2);
        assert_eq!(settings.footer.center, "c");
        assert!(settings.header.is_empty());
    }

    /// Defaults: zero margins per side, empty labels at all positions.
    #[test]
    fn test_default_margins_and_labels() {
        let settings = build_print_settings(&ConvertConfig::default());
        assert_eq!(settings.margins, crate::config::Margins::default());
        assert!(settings.header.is_empty());
        assert!(settings.footer.is_empty());
    }

    #[test]
    fn test_lock_poll_settings_extraction() {
        let config = ConvertConfigBuilder::new()
            .max_locking_check_attempts(7)
            .locking_check_delay(Duration::from_millis(5))
            .build()
            .unwrap();
        let poll = lock_poll_settings(&config);
        assert_eq!(poll.max_attempts, 7);
        assert_eq!(poll.delay, Duration::from_millis(5));
    }
}
