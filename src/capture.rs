//! The render pipeline: HTML in, PNG out.
//!
//! One call to [`capture_screenshot`] owns one browser session from launch to
//! close. The steps run strictly in order:
//!
//! 1. parse the [`RenderRequest`] body
//! 2. launch a session and open its page
//! 3. load the HTML and wait for `#wrapper` to become visible
//! 4. measure `#window` and pick a [`Viewport`] with [`select_viewport`]
//! 5. apply the viewport and take a full-page PNG
//! 6. close page and session
//!
//! Errors from any step propagate to the caller. The session is released even
//! then, because dropping the [`Browser`] handles stops its worker.

use crate::{Browser, EngineConfig, Error, Launcher, Result, Viewport};
use log::debug;
use serde::Deserialize;
use std::sync::Arc;

/// Element that must be visible before anything is measured
pub const WRAPPER_SELECTOR: &str = "#wrapper";

/// Element whose rendered height sizes the standard viewport
pub const WINDOW_SELECTOR: &str = "#window";

/// `type` value that selects the fixed Discord embed size
pub const DISCORD_TAG: &str = "discord";

/// Fixed size for Discord embeds, independent of content height
pub const DISCORD_VIEWPORT: Viewport = Viewport {
    width: 1920,
    height: 1080,
};

/// Width used for every non-Discord render
pub const STANDARD_WIDTH: u32 = 480 - 7;

/// Body of a screenshot request
#[derive(Debug, Clone, Deserialize)]
pub struct RenderRequest {
    #[serde(rename = "htmlContent")]
    pub html_content: String,
    /// Free-form content tag; only `"discord"` changes behaviour
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl RenderRequest {
    pub fn from_json(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn kind(&self) -> RenderKind {
        RenderKind::from_tag(self.kind.as_deref())
    }
}

/// How the viewport for a capture is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Fixed 1920x1080 surface
    Discord,
    /// Fixed width, height taken from the rendered `#window`
    Standard,
}

impl RenderKind {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(DISCORD_TAG) => RenderKind::Discord,
            _ => RenderKind::Standard,
        }
    }
}

pub fn select_viewport(kind: RenderKind, measured_height: u32) -> Viewport {
    match kind {
        RenderKind::Discord => DISCORD_VIEWPORT,
        RenderKind::Standard => Viewport {
            width: STANDARD_WIDTH,
            height: measured_height,
        },
    }
}

/// Script returning `offsetHeight` of [`WINDOW_SELECTOR`], or 0 when absent
pub fn measure_height_script() -> String {
    // serde_json renders a quoted, escaped JS string literal
    let selector = serde_json::Value::from(WINDOW_SELECTOR).to_string();
    format!(
        "(function() {{ const el = document.querySelector({}); return (el && el.offsetHeight) || 0; }})()",
        selector
    )
}

/// Turn a serialized evaluation result into a pixel height.
///
/// Anything that is not a finite, non-negative number counts as 0.
pub fn parse_height(value: &str) -> u32 {
    match value.trim().trim_matches('"').parse::<f64>() {
        Ok(h) if h.is_finite() && h > 0.0 => h.round().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Run the whole pipeline for one request body and return the PNG bytes.
///
/// Returns [`Error::ElementNotFound`] when the wrapper never shows up; any
/// other error means the capture failed somewhere else.
pub async fn capture_screenshot(
    launcher: Arc<dyn Launcher>,
    config: &EngineConfig,
    body: &[u8],
) -> Result<Vec<u8>> {
    let request = RenderRequest::from_json(body)?;
    let kind = request.kind();
    debug!("capture requested: kind={:?}, html={} bytes", kind, request.html_content.len());

    let browser = Browser::launch(launcher, config.clone()).await?;
    let page = browser.new_page().await?;
    page.set_content(&request.html_content).await?;

    if !page.wait_for_selector(WRAPPER_SELECTOR).await? {
        return Err(Error::ElementNotFound(WRAPPER_SELECTOR.to_string()));
    }

    let measured = parse_height(&page.eval_in_page(&measure_height_script()).await?);
    let viewport = select_viewport(kind, measured);
    debug!("measured {} = {}px, using viewport {}", WINDOW_SELECTOR, measured, viewport);

    page.set_viewport(viewport).await?;
    let png = page.screenshot().await?;

    page.close().await?;
    browser.close().await?;

    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discord_uses_fixed_viewport() {
        assert_eq!(select_viewport(RenderKind::Discord, 42), Viewport { width: 1920, height: 1080 });
        assert_eq!(select_viewport(RenderKind::Discord, 0), DISCORD_VIEWPORT);
    }

    #[test]
    fn test_standard_uses_measured_height() {
        assert_eq!(select_viewport(RenderKind::Standard, 612), Viewport { width: 473, height: 612 });
        assert_eq!(select_viewport(RenderKind::Standard, 0), Viewport { width: 473, height: 0 });
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(RenderKind::from_tag(Some("discord")), RenderKind::Discord);
        assert_eq!(RenderKind::from_tag(Some("Discord")), RenderKind::Standard);
        assert_eq!(RenderKind::from_tag(Some("twitter")), RenderKind::Standard);
        assert_eq!(RenderKind::from_tag(None), RenderKind::Standard);
    }

    #[test]
    fn test_request_parsing() {
        let req = RenderRequest::from_json(br#"{"htmlContent":"<p>x</p>","type":"discord"}"#).unwrap();
        assert_eq!(req.html_content, "<p>x</p>");
        assert_eq!(req.kind(), RenderKind::Discord);

        let req = RenderRequest::from_json(br#"{"htmlContent":"<p>x</p>"}"#).unwrap();
        assert_eq!(req.kind(), RenderKind::Standard);
    }

    #[test]
    fn test_request_without_html_is_invalid() {
        let err = RenderRequest::from_json(br#"{"type":"discord"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(matches!(RenderRequest::from_json(b"not json"), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_height_parsing() {
        assert_eq!(parse_height("612"), 612);
        assert_eq!(parse_height("612.6"), 613);
        assert_eq!(parse_height("0"), 0);
        assert_eq!(parse_height("null"), 0);
        assert_eq!(parse_height("-5"), 0);
        assert_eq!(parse_height("\"abc\""), 0);
    }

    #[test]
    fn test_measure_script_targets_window() {
        let script = measure_height_script();
        assert!(script.contains(r##"document.querySelector("#window")"##));
        assert!(script.contains("offsetHeight"));
    }
}
