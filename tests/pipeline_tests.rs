//! End-to-end pipeline tests over the scripted engine.
//!
//! These run the full conversion pipeline — session creation, navigation,
//! ready signaling, print dispatch, lock polling, read, cleanup — against
//! the mock backend, so no real browser is needed.

use std::sync::Arc;
use std::time::Duration;

use webprint::engine::mock::MockEngineFactory;
use webprint::prelude::*;

/// Converter over an isolated host and the given mock engine.
///
/// The host handle is returned so tests can unload it and keep engine
/// threads from outliving the test.
fn mock_setup(
    factory: &Arc<MockEngineFactory>,
    config: ConvertConfig,
) -> (Converter, Arc<EngineHost>) {
    let host = Arc::new(EngineHost::new());
    let converter = Converter::builder()
        .config(config)
        .factory(Arc::clone(factory) as Arc<dyn EngineFactory>)
        .host(Arc::clone(&host))
        .build();
    (converter, host)
}

/// Config with test-friendly timings.
fn fast_config() -> ConvertConfig {
    ConvertConfigBuilder::new()
        .settle_delay(Duration::from_millis(1))
        .locking_check_delay(Duration::from_millis(5))
        .navigation_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// A conversion returns a non-empty byte sequence with the PDF signature.
#[test]
fn test_convert_url_returns_pdf_bytes() {
    let factory = Arc::new(MockEngineFactory::new());
    let (converter, host) = mock_setup(&factory, fast_config());

    let bytes = converter.convert("https://example.com/page").unwrap();

    assert!(!bytes.is_empty());
    assert!(
        bytes.starts_with(b"%PDF-"),
        "output must carry the PDF signature"
    );

    host.unload();
}

/// Identical markup, base URL, and config produce byte-identical output.
#[test]
fn test_convert_html_is_deterministic() {
    let factory = Arc::new(MockEngineFactory::new());
    let (converter, host) = mock_setup(&factory, fast_config());

    let html = "<html><body><h1>Invoice #42</h1></body></html>";
    let base = "https://example.com/invoice/42";

    let first = converter.convert_html(base, html, &[], &[], None).unwrap();
    let second = converter.convert_html(base, html, &[], &[], None).unwrap();

    assert_eq!(first, second, "identical inputs must produce identical bytes");
    assert!(first.starts_with(b"%PDF-"));

    host.unload();
}

/// The completion poll tolerates a writer that lags behind the dispatch.
#[test]
fn test_poll_waits_for_slow_writer() {
    let factory = Arc::new(
        MockEngineFactory::new().with_write_delay(Duration::from_millis(300)),
    );
    let (converter, host) = mock_setup(&factory, fast_config());

    let bytes = converter.convert("https://example.com/slow").unwrap();
    assert!(bytes.starts_with(b"%PDF-"));

    host.unload();
}

/// A writer that outlives the poll budget fails with the locked error,
/// after exactly the configured number of attempts.
#[test]
fn test_poll_budget_exhaustion() {
    let factory = Arc::new(
        MockEngineFactory::new().with_write_delay(Duration::from_secs(30)),
    );
    let config = ConvertConfigBuilder::new()
        .settle_delay(Duration::from_millis(1))
        .locking_check_delay(Duration::from_millis(5))
        .max_locking_check_attempts(5)
        .build()
        .unwrap();
    let (converter, host) = mock_setup(&factory, config);

    let result = converter.convert("https://example.com/stuck");

    match result {
        Err(ConvertError::OutputLocked { attempts }) => assert_eq!(attempts, 5),
        other => panic!("Expected OutputLocked, got {:?}", other.map(|b| b.len())),
    }

    host.unload();
}

/// A page that never reports ready fails with the navigation timeout.
#[test]
fn test_navigation_timeout() {
    let factory = Arc::new(MockEngineFactory::new().never_ready());
    let config = ConvertConfigBuilder::new()
        .settle_delay(Duration::from_millis(1))
        .navigation_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let (converter, host) = mock_setup(&factory, config);

    let result = converter.convert("https://example.com/hang");
    assert!(matches!(result, Err(ConvertError::NavigationTimeout(_))));

    // The session must still have been released.
    assert!(factory.state().pages()[0].snapshot().disposed);

    host.unload();
}

/// Engine boot failure surfaces as an init error, not a hang.
#[test]
fn test_engine_boot_failure() {
    let factory = Arc::new(MockEngineFactory::failing_boot("engine binary missing"));
    let config = ConvertConfigBuilder::new()
        .init_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let (converter, _host) = mock_setup(&factory, config);

    let result = converter.convert("https://example.com/");
    match result {
        Err(ConvertError::EngineInit(msg)) => assert!(msg.contains("engine binary missing")),
        other => panic!("Expected EngineInit, got {:?}", other.map(|b| b.len())),
    }
}

/// A failing print dispatch aborts only that conversion and releases its
/// session; the engine itself stays up.
#[test]
fn test_print_failure_is_per_request() {
    let factory = Arc::new(MockEngineFactory::new().failing_print("renderer fault"));
    let (converter, host) = mock_setup(&factory, fast_config());

    let result = converter.convert("https://example.com/bad");
    assert!(matches!(result, Err(ConvertError::Print(_))));

    assert!(host.is_ready(), "engine must survive a request failure");
    assert!(factory.state().pages()[0].snapshot().disposed);

    host.unload();
}

/// Inverted page ranges are rejected before any engine work happens.
#[test]
fn test_config_validation_rejects_inverted_range() {
    let result = ConvertConfigBuilder::new().start_page(9).end_page(3).build();
    assert!(result.is_err());
}

/// Markup conversions record the base URL alongside the content.
#[test]
fn test_markup_load_carries_base_url() {
    let factory = Arc::new(MockEngineFactory::new());
    let (converter, host) = mock_setup(&factory, fast_config());

    converter
        .convert_html("https://example.com/base/", "<p>x</p>", &[], &[], None)
        .unwrap();

    match factory.state().pages()[0].snapshot().loaded {
        Some(webprint::engine::mock::LoadedContent::Markup { base_url, html }) => {
            assert_eq!(base_url, "https://example.com/base/");
            assert_eq!(html, "<p>x</p>");
        }
        other => panic!("unexpected load: {:?}", other),
    }

    host.unload();
}

/// The async variants produce the same results as the blocking ones.
#[tokio::test]
async fn test_async_variants() {
    let factory = Arc::new(MockEngineFactory::new());
    let (converter, host) = mock_setup(&factory, fast_config());

    let bytes = converter
        .convert_async("https://example.com/async")
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF-"));

    let html_bytes = converter
        .convert_html_async(
            "https://example.com/",
            "<p>async</p>",
            Vec::new(),
            Vec::new(),
            None,
        )
        .await
        .unwrap();
    assert!(html_bytes.starts_with(b"%PDF-"));

    host.unload();
}

/// Cookies land in the session's jar scoped to the request host.
#[test]
fn test_cookies_scoped_to_request_host() {
    let factory = Arc::new(MockEngineFactory::new());
    let (converter, host) = mock_setup(&factory, fast_config());

    let cookies = vec![
        Cookie::session("sid", "abc"),
        Cookie::new("theme", "dark", "/settings", true, true, 4102444800),
    ];
    converter
        .convert_with("https://shop.example.com/cart", &[], &cookies)
        .unwrap();

    let record = factory.state().pages()[0].snapshot();
    assert_eq!(record.cookies.len(), 2);
    assert!(record.cookies.iter().all(|(h, _)| h == "shop.example.com"));
    assert_eq!(record.cookies[1].1.path, "/settings");

    host.unload();
}

/// Sessions are never reused: every conversion gets a fresh page.
#[test]
fn test_one_session_per_conversion() {
    let factory = Arc::new(MockEngineFactory::new());
    let (converter, host) = mock_setup(&factory, fast_config());

    converter.convert("https://example.com/1").unwrap();
    converter.convert("https://example.com/2").unwrap();
    converter.convert("https://example.com/3").unwrap();

    assert_eq!(factory.state().page_count(), 3);
    assert!(
        factory
            .state()
            .pages()
            .iter()
            .all(|p| p.snapshot().disposed),
        "every session must be disposed after its conversion"
    );

    host.unload();
}
