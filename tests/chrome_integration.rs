//! End-to-end captures against a real headless Chrome

#![cfg(feature = "cdp")]

use htmlshot::capture::{self, WRAPPER_SELECTOR};
use htmlshot::cdp::CdpLauncher;
use htmlshot::{EngineConfig, Error};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// 1x1 transparent GIF
const TINY_GIF: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

fn config() -> EngineConfig {
    EngineConfig {
        wait_timeout_ms: 2000,
        timeout_ms: 10000,
        sandbox: std::env::var("HTMLSHOT_NO_SANDBOX").is_err(),
        ..Default::default()
    }
}

/// Width and height from the IHDR chunk
fn png_size(png: &[u8]) -> (u32, u32) {
    assert!(png.len() > 24, "PNG data seems too small");
    assert_eq!(&png[0..8], PNG_MAGIC);
    assert_eq!(&png[12..16], b"IHDR");
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    (width, height)
}

async fn capture(html: &str, kind: &str) -> htmlshot::Result<Vec<u8>> {
    let body = serde_json::json!({ "htmlContent": html, "type": kind }).to_string();
    capture::capture_screenshot(Arc::new(CdpLauncher), &config(), body.as_bytes()).await
}

#[test]
fn test_png_size_reads_ihdr() {
    let mut png = PNG_MAGIC.to_vec();
    png.extend_from_slice(&[0, 0, 0, 13]);
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&473u32.to_be_bytes());
    png.extend_from_slice(&300u32.to_be_bytes());
    png.extend_from_slice(&[8, 6, 0, 0, 0]);
    assert_eq!(png_size(&png), (473, 300));
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_capture_card_is_473_wide() {
    let html = r#"<!DOCTYPE html>
<html><body style="margin:0">
<div id="wrapper"><div id="window" style="height:300px;background:#336">card</div></div>
</body></html>"#;

    let png = capture(html, "card").await.expect("capture failed");
    let (width, height) = png_size(&png);
    assert_eq!(width, 473);
    assert!(height >= 300, "height {} shorter than #window", height);
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_capture_discord_is_at_least_1080p() {
    let html = r#"<div id="wrapper"><div id="window">embed</div></div>"#;

    let png = capture(html, "discord").await.expect("capture failed");
    let (width, height) = png_size(&png);
    assert!(width >= 1920, "width {}", width);
    assert!(height >= 1080, "height {}", height);
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_capture_waits_for_subresources() {
    let html = format!(
        r#"<!DOCTYPE html>
<html><head>
<link rel="stylesheet" href="data:text/css,%23window%7Bheight:420px%7D">
</head><body style="margin:0">
<div id="wrapper"><div id="window"><img src="{}" width="1" height="1">card</div></div>
</body></html>"#,
        TINY_GIF
    );

    let started = Instant::now();
    let png = capture(&html, "card").await.expect("capture with subresources failed");
    assert!(
        started.elapsed() < Duration::from_millis(config().timeout_ms),
        "content load ran into the load timeout"
    );

    let (width, height) = png_size(&png);
    assert_eq!(width, 473);
    assert!(height >= 420, "stylesheet height not applied: {}", height);
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_hidden_wrapper_is_not_found() {
    let html = r#"<div id="wrapper" style="display:none">hidden</div>"#;

    match capture(html, "card").await.unwrap_err() {
        Error::ElementNotFound(selector) => assert_eq!(selector, WRAPPER_SELECTOR),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
#[ignore] // Requires Chrome to be installed
async fn test_zero_height_wrapper_is_not_found() {
    let html = r#"<div id="wrapper" style="height:0;position:relative">
<div id="window" style="position:absolute;height:50px">floating</div></div>"#;

    match capture(html, "card").await.unwrap_err() {
        Error::ElementNotFound(selector) => assert_eq!(selector, WRAPPER_SELECTOR),
        other => panic!("unexpected error: {}", other),
    }
}
