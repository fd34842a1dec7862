//! Rendering surfaces: where card HTML is laid out and rasterized.
//!
//! The [`Surface`] trait is the seam between the pipeline and the browser.
//! A surface opens short-lived [`CardPage`]s; each page loads one document,
//! answers layout queries (via [`LayoutMeasurer`]) and captures a PNG. A page
//! owns everything it allocated, so dropping it releases the browser process,
//! the tab and the temporary document no matter how rendering ended.
//!
//! The production implementation is [`ChromeSurface`], which drives headless
//! Chrome through the DevTools protocol. Tests use the recording mock in
//! [`tests`].

use crate::layout::{FitGeometry, LayoutMeasurer};
use crate::types::{CaptureRegion, Viewport};
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use std::ffi::OsStr;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("rendering surface error: {0}")]
    Surface(String),
    #[error("layout script failed: {0}")]
    Script(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// One loaded card document.
pub trait CardPage: LayoutMeasurer {
    /// Replace the page's document with `html`.
    fn load(&mut self, html: &str) -> Result<(), RenderError>;

    /// Wait for fonts and asynchronous layout, then `delay` more.
    fn settle(&mut self, delay: Duration) -> Result<(), RenderError>;

    /// PNG of the top-left `region`, rasterized at the viewport's pixel ratio.
    fn capture(&mut self, region: CaptureRegion) -> Result<Vec<u8>, RenderError>;
}

/// Factory for card pages. Shared across worker threads.
pub trait Surface: Sync {
    type Page: CardPage;

    fn open(&self, viewport: Viewport) -> Result<Self::Page, RenderError>;
}

// ============================================================================
// Headless Chrome
// ============================================================================

/// Upper bound on waiting for web fonts during settle.
const FONT_WAIT_JS: &str = r#"Promise.race([
    document.fonts ? document.fonts.ready.then(() => true) : Promise.resolve(true),
    new Promise(resolve => setTimeout(() => resolve(false), 3000)),
])"#;

const MEASURE_FIT_JS: &str = r#"(() => {
    const area = document.querySelector('.card-content');
    const content = document.querySelector('.card-content-scale');
    if (!area || !content) return JSON.stringify(null);
    content.style.transform = 'none';
    content.style.width = '';
    const rect = content.getBoundingClientRect();
    return JSON.stringify({
        availableWidth: area.clientWidth,
        availableHeight: area.clientHeight,
        contentWidth: Math.max(content.scrollWidth, rect.width),
        contentHeight: Math.max(content.scrollHeight, rect.height),
    });
})()"#;

const CONTAINER_HEIGHT_JS: &str = r#"(() => {
    const container = document.querySelector('.card-container');
    const height = container ? container.scrollHeight : document.body.scrollHeight;
    return JSON.stringify(height);
})()"#;

const CONTENT_HEIGHT_JS: &str = r#"(() => {
    const content = document.querySelector('.card-content');
    return JSON.stringify(content ? content.scrollHeight : null);
})()"#;

/// Pause after growing the viewport so the compositor catches up.
const RESIZE_SETTLE: Duration = Duration::from_millis(100);

/// Launches one headless Chrome per page.
#[derive(Debug, Clone)]
pub struct ChromeSurface {
    executable: Option<PathBuf>,
    sandbox: bool,
}

impl Default for ChromeSurface {
    fn default() -> Self {
        Self {
            executable: None,
            sandbox: true,
        }
    }
}

impl ChromeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific Chrome/Chromium binary instead of auto-detection.
    pub fn with_executable(mut self, path: Option<PathBuf>) -> Self {
        self.executable = path;
        self
    }

    /// Chrome's sandbox does not work as root in most containers.
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

impl Surface for ChromeSurface {
    type Page = ChromePage;

    fn open(&self, viewport: Viewport) -> Result<ChromePage, RenderError> {
        let options = LaunchOptions {
            headless: true,
            sandbox: self.sandbox,
            window_size: Some((viewport.width, viewport.height)),
            path: self.executable.clone(),
            args: vec![OsStr::new("--hide-scrollbars")],
            ..Default::default()
        };
        let browser = Browser::new(options).map_err(|e| RenderError::Launch(e.to_string()))?;
        let tab = browser.new_tab().map_err(surface_error)?;
        tab.call_method(device_metrics(viewport, viewport.height))
            .map_err(surface_error)?;
        log::debug!(
            "opened surface {}x{} @{}x",
            viewport.width,
            viewport.height,
            viewport.device_pixel_ratio
        );
        Ok(ChromePage {
            tab,
            viewport,
            viewport_height: viewport.height,
            document: None,
            _browser: browser,
        })
    }
}

/// A Chrome tab plus the browser process behind it.
pub struct ChromePage {
    tab: Arc<Tab>,
    viewport: Viewport,
    viewport_height: u32,
    document: Option<NamedTempFile>,
    // Last, so the tab and document are dropped before the process exits.
    _browser: Browser,
}

fn surface_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Surface(e.to_string())
}

/// Emulated screen for a page: CSS size plus the device pixel ratio, so the
/// document lays out and rasterizes exactly as it would on that display.
fn device_metrics(viewport: Viewport, height: u32) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: viewport.width,
        height,
        device_scale_factor: f64::from(viewport.device_pixel_ratio),
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
    }
}

/// Screenshot clip in CSS pixels. The emulated device scale factor already
/// multiplies the raster, so the clip itself is unscaled.
fn capture_clip(region: CaptureRegion) -> Page::Viewport {
    Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: f64::from(region.width),
        height: f64::from(region.height),
        scale: 1.0,
    }
}

impl ChromePage {
    /// Run `script` (which must return `JSON.stringify(...)`) and decode it.
    fn eval_json<T: DeserializeOwned>(&self, script: &str) -> Result<T, RenderError> {
        let object = self
            .tab
            .evaluate(script, false)
            .map_err(|e| RenderError::Script(e.to_string()))?;
        let text = object
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| RenderError::Script(format!("expected JSON text, got {:?}", object.value)))?;
        serde_json::from_str(text).map_err(|e| RenderError::Script(e.to_string()))
    }

    fn eval_height(&self, script: &str) -> Result<Option<u32>, RenderError> {
        let height: Option<f64> = self.eval_json(script)?;
        Ok(height
            .filter(|h| h.is_finite() && *h > 0.0)
            .map(|h| h.ceil() as u32))
    }

    fn ensure_viewport_height(&mut self, height: u32) -> Result<(), RenderError> {
        if height <= self.viewport_height {
            return Ok(());
        }
        self.tab
            .call_method(device_metrics(self.viewport, height))
            .map_err(surface_error)?;
        self.viewport_height = height;
        thread::sleep(RESIZE_SETTLE);
        Ok(())
    }
}

impl LayoutMeasurer for ChromePage {
    fn measure_fit(&mut self) -> Result<Option<FitGeometry>, RenderError> {
        self.eval_json(MEASURE_FIT_JS)
    }

    fn measure_container_height(&mut self) -> Result<Option<u32>, RenderError> {
        self.eval_height(CONTAINER_HEIGHT_JS)
    }

    fn measure_content_height(&mut self) -> Result<Option<u32>, RenderError> {
        self.eval_height(CONTENT_HEIGHT_JS)
    }

    fn apply_scale(&mut self, scale: f64, layout_width: f64) -> Result<(), RenderError> {
        let script = format!(
            r#"(() => {{
                const content = document.querySelector('.card-content-scale');
                if (!content) return JSON.stringify(false);
                content.style.transformOrigin = 'top left';
                content.style.width = '{layout_width}px';
                content.style.transform = 'scale({scale})';
                return JSON.stringify(true);
            }})()"#
        );
        let applied: bool = self.eval_json(&script)?;
        if !applied {
            log::warn!("scale target missing; content left unscaled");
        }
        Ok(())
    }
}

impl CardPage for ChromePage {
    fn load(&mut self, html: &str) -> Result<(), RenderError> {
        let mut file = tempfile::Builder::new()
            .prefix("cardstock-")
            .suffix(".html")
            .tempfile()?;
        file.write_all(html.as_bytes())?;
        file.flush()?;

        let url = format!("file://{}", file.path().display());
        self.tab
            .navigate_to(&url)
            .map_err(surface_error)?
            .wait_until_navigated()
            .map_err(surface_error)?;
        // Replacing the previous document deletes its file.
        self.document = Some(file);
        Ok(())
    }

    fn settle(&mut self, delay: Duration) -> Result<(), RenderError> {
        match self.tab.evaluate(FONT_WAIT_JS, true) {
            Ok(result) if result.value.as_ref().and_then(|v| v.as_bool()) == Some(false) => {
                log::debug!("web fonts still loading after wait");
            }
            Ok(_) => {}
            Err(e) => log::debug!("font wait failed: {e}"),
        }
        thread::sleep(delay);
        Ok(())
    }

    fn capture(&mut self, region: CaptureRegion) -> Result<Vec<u8>, RenderError> {
        self.ensure_viewport_height(region.height)?;
        self.tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(capture_clip(region)),
                true,
            )
            .map_err(surface_error)
    }
}
