//! htmlshot
//!
//! Renders HTML fragments in a headless browser and serves the result as a
//! PNG over HTTP.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **Injected backends**: the HTTP layer only sees the [`Launcher`] and
//!   [`Engine`] traits, so any browser (or a scripted fake) can be plugged in
//! - **Scoped sessions**: a browser is owned by one request and released on
//!   every exit path
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # async fn run() -> htmlshot::Result<()> {
//! use std::sync::Arc;
//! use htmlshot::{capture, cdp::CdpLauncher, EngineConfig};
//!
//! let launcher = Arc::new(CdpLauncher);
//! let body = br##"{"htmlContent":"<div id=\"wrapper\"><div id=\"window\">hi</div></div>","type":"card"}"##;
//! let png = capture::capture_screenshot(launcher, &EngineConfig::default(), body).await?;
//! println!("captured {} bytes", png.len());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly browser API (worker-backed abstraction over any `Engine`)
pub mod async_api;

pub mod capture;
pub mod cli;
pub mod server;

pub use async_api::Browser;

/// Configuration for a browser session
///
/// The defaults are conservative: the Chrome sandbox stays on, waits are
/// bounded and the window starts at a common desktop size.
///
/// # Examples
///
/// ```
/// let cfg = htmlshot::EngineConfig::default();
/// assert!(cfg.sandbox);
/// assert_eq!(cfg.wait_timeout_ms, 30000);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Initial window size, before a render viewport is applied
    pub viewport: Viewport,
    /// Timeout for page loads in milliseconds
    pub timeout_ms: u64,
    /// How long to wait for a selector to become visible, in milliseconds
    pub wait_timeout_ms: u64,
    /// Extra delay after load so late layout (web fonts, images) can settle
    pub settle_ms: u64,
    /// Explicit Chrome/Chromium binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep the Chrome sandbox enabled
    pub sandbox: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome htmlshot/0.1".to_string(),
            viewport: Viewport::default(),
            timeout_ms: 30000,
            wait_timeout_ms: 30000,
            settle_ms: 250,
            chrome_path: None,
            sandbox: true,
        }
    }
}

impl EngineConfig {
    /// Reject settings that would make every capture fail.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout_ms must be greater than zero".into()));
        }
        if self.wait_timeout_ms == 0 {
            return Err(Error::ConfigError("wait_timeout_ms must be greater than zero".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "initial viewport must be non-empty, got {}",
                self.viewport
            )));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of JavaScript execution
///
/// `value` is the serialized result of the evaluation (usually a JSON-like
/// string). `is_error` indicates whether the script threw an exception.
#[derive(Debug, Clone)]
pub struct ScriptResult {
    /// Serialized result value
    pub value: String,
    /// Whether the script threw an error
    pub is_error: bool,
}

/// A single browser with a single page
///
/// Implementations are driven from one worker thread and need not be `Send`.
/// See [`async_api::Browser`] for the async facade used by the server.
pub trait Engine {
    /// Replace the page document with `html` and wait until it has loaded
    fn set_content(&mut self, html: &str) -> Result<()>;

    /// Wait until an element matching `selector` is visible.
    ///
    /// Returns `Ok(false)` when the configured wait timeout elapses first.
    fn wait_for_selector(&mut self, selector: &str) -> Result<bool>;

    /// Evaluate JavaScript in the page's global context
    fn evaluate_script_in_page(&mut self, script: &str) -> Result<ScriptResult>;

    /// Resize the rendering surface
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Capture the whole page (not only the visible viewport) as PNG
    fn render_png(&mut self) -> Result<Vec<u8>>;

    /// Close the page; the browser stays alive until [`Engine::close`]
    fn close_page(&mut self) -> Result<()>;

    /// Close the browser and clean up resources
    fn close(&mut self) -> Result<()>;
}

/// Creates browser sessions on demand
///
/// This is the injected capability behind the HTTP handler. It is called on
/// the session's worker thread, once per request.
pub trait Launcher: Send + Sync {
    fn launch(&self, config: &EngineConfig) -> Result<Box<dyn Engine>>;
}

impl<F> Launcher for F
where
    F: Fn(&EngineConfig) -> Result<Box<dyn Engine>> + Send + Sync,
{
    fn launch(&self, config: &EngineConfig) -> Result<Box<dyn Engine>> {
        self(config)
    }
}
