//! Chrome DevTools Protocol adapter implementation

use crate::{Engine, EngineConfig, Error, Launcher, Result, ScriptResult, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often a selector's visibility is re-checked while waiting
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chrome exits on its own after this long without commands
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// Launches one headless Chrome per session
#[derive(Debug, Default, Clone, Copy)]
pub struct CdpLauncher;

impl Launcher for CdpLauncher {
    fn launch(&self, config: &EngineConfig) -> Result<Box<dyn Engine>> {
        Ok(Box::new(CdpEngine::new(config.clone())?))
    }
}

/// CDP-based engine implementation (uses the `headless_chrome` crate)
///
/// This adapter launches a headless Chrome instance, manages a single tab,
/// and provides the `Engine` trait implementation over it.
pub struct CdpEngine {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    config: EngineConfig,
    viewport: Viewport,
}

impl CdpEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        // Configure headless Chrome launch options
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        // Launch the browser
        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| Error::InitializationError(format!("Failed to set user agent: {}", e)))?;

        let viewport = config.viewport;
        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
            config,
            viewport,
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab.as_ref().ok_or(Error::SessionClosed)
    }

    fn evaluate_value(&self, script: &str, await_promise: bool) -> Result<Option<serde_json::Value>> {
        let remote = self.tab()?.evaluate(script, await_promise)?;
        Ok(remote.value)
    }

    /// Pin the CSS layout viewport at 1 device pixel per CSS pixel.
    fn override_metrics(&self, width: u32, height: u32) -> Result<()> {
        // 0 would mean "no override" to Chrome
        let metrics = Emulation::SetDeviceMetricsOverride {
            width: width.max(1),
            height: height.max(1),
            device_scale_factor: 1.0,
            mobile: false,
            scale: None,
            screen_width: None,
            screen_height: None,
            position_x: None,
            position_y: None,
            dont_set_visible_size: None,
            screen_orientation: None,
            viewport: None,
            display_feature: None,
            device_posture: None,
        };
        self.tab()?
            .call_method(metrics)
            .map_err(|e| Error::RenderError(format!("Failed to set viewport {}x{}: {}", width, height, e)))?;
        Ok(())
    }
}

/// Script that replaces the current document with base64-encoded HTML and
/// resolves once the new document has fired `load` and its fonts are ready.
fn document_write_script(html: &str) -> String {
    let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, html);

    // Built from a template to avoid escaping braces for `format!`.
    let template = r#"(async function(){
        const bytes = Uint8Array.from(atob("{{B64_TOKEN}}"), function(c){ return c.charCodeAt(0); });
        const html = new TextDecoder('utf-8').decode(bytes);
        // document.open() drops every listener on window, so listen afterwards
        document.open();
        document.write(html);
        document.close();
        if (document.readyState !== 'complete') {
            await new Promise(function(resolve){
                window.addEventListener('load', function(){ resolve(true); }, { once: true });
            });
        }
        if (document.fonts && document.fonts.ready) { await document.fonts.ready; }
        return true;
    })()"#;

    template.replace("{{B64_TOKEN}}", &b64)
}

/// Script that reports whether `selector` matches a rendered, visible element
fn visibility_script(selector: &str) -> String {
    let selector = serde_json::Value::from(selector).to_string();
    format!(
        r#"(function() {{
            const el = document.querySelector({});
            if (!el) return false;
            const style = window.getComputedStyle(el);
            if (!style || style.visibility === 'hidden' || style.display === 'none') return false;
            const rect = el.getBoundingClientRect();
            return rect.width > 0 && rect.height > 0;
        }})()"#,
        selector
    )
}

/// Surface needed to capture the whole document without clipping.
///
/// Never smaller than the requested viewport, so a fixed 1920x1080 capture
/// stays at least that size.
fn full_page_size(viewport: Viewport, page_width: u32, page_height: u32) -> Viewport {
    Viewport {
        width: viewport.width.max(page_width),
        height: viewport.height.max(page_height),
    }
}

const PAGE_SIZE_SCRIPT: &str = r#"(function() {
    const d = document.documentElement;
    const b = document.body;
    return [
        Math.max(d ? d.scrollWidth : 0, b ? b.scrollWidth : 0),
        Math.max(d ? d.scrollHeight : 0, b ? b.scrollHeight : 0)
    ];
})()"#;

impl Engine for CdpEngine {
    fn set_content(&mut self, html: &str) -> Result<()> {
        let tab = self.tab()?;

        tab.navigate_to("about:blank")
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        tab.evaluate(&document_write_script(html), true)
            .map_err(|e| Error::LoadError(format!("Writing document failed: {}", e)))?;

        // Wait for the page to stabilize
        if self.config.settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.settle_ms));
        }

        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str) -> Result<bool> {
        let script = visibility_script(selector);
        let deadline = Instant::now() + Duration::from_millis(self.config.wait_timeout_ms);

        loop {
            let visible = self
                .evaluate_value(&script, false)
                .map_err(|e| Error::ScriptError(format!("Visibility check for {} failed: {}", selector, e)))?
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            if visible {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("{} not visible after {}ms", selector, self.config.wait_timeout_ms);
                return Ok(false);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Direct page evaluation in the page's global context; promises are awaited.
    fn evaluate_script_in_page(&mut self, script: &str) -> Result<ScriptResult> {
        let result = self
            .tab()?
            .evaluate(script, true)
            .map_err(|e| Error::ScriptError(format!("Direct evaluation failed: {}", e)))?;

        let value = result
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "null".to_string());

        Ok(ScriptResult { value, is_error: false })
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.override_metrics(viewport.width, viewport.height)?;
        self.viewport = viewport;
        Ok(())
    }

    fn render_png(&mut self) -> Result<Vec<u8>> {
        // Full page: grow the metrics override to the document before capturing
        let size = self
            .evaluate_value(PAGE_SIZE_SCRIPT, false)
            .map_err(|e| Error::RenderError(format!("Failed to measure page: {}", e)))?;
        let (page_width, page_height) = match size.as_ref().and_then(|v| v.as_array()) {
            Some(dims) if dims.len() == 2 => (
                dims[0].as_f64().unwrap_or(0.0).ceil() as u32,
                dims[1].as_f64().unwrap_or(0.0).ceil() as u32,
            ),
            _ => (0, 0),
        };

        let full = full_page_size(self.viewport, page_width, page_height);
        let grown = full != self.viewport;
        if grown {
            debug!("growing viewport from {} to {} for full-page capture", self.viewport, full);
            self.override_metrics(full.width, full.height)?;
        }

        let screenshot_data = self
            .tab()?
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        if grown {
            if let Err(e) = self.override_metrics(self.viewport.width, self.viewport.height) {
                warn!("Failed to restore viewport {}: {}", self.viewport, e);
            }
        }

        Ok(screenshot_data)
    }

    fn close_page(&mut self) -> Result<()> {
        if let Some(tab) = self.tab.take() {
            tab.close(false)
                .map_err(|e| Error::Other(format!("Failed to close tab: {}", e)))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.tab.is_some() {
            if let Err(e) = self.close_page() {
                warn!("{}", e);
            }
        }
        // Dropping the browser terminates the child process.
        drop(self.browser.take());
        Ok(())
    }
}
