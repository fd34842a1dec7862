//! Layout fitting: the measure → adjust → capture protocol.
//!
//! Once a card's HTML is loaded and settled, each paging mode resolves the
//! final capture region differently:
//!
//! | Mode | Step | Capture height |
//! |---|---|---|
//! | `auto-fit` | shrink content with `scale(s)`, `s = min(1, aw/cw, ah/ch)` | `height` |
//! | `dynamic` | measure container | `clamp(measured, height, max_height)` |
//! | `separator`, `auto-split` | measure container | `max(height, measured)` |
//! | cover | none | `height` |
//!
//! Measurements go through the [`LayoutMeasurer`] capability so the
//! algorithm can be driven by a fake in tests. When a measurement reports no
//! usable geometry the adjustment is skipped and the mode's default size is
//! used; the card is still produced.
//!
//! ## Scaling
//!
//! `auto-fit` only ever shrinks. The scale is applied as a visual transform
//! anchored at the top-left corner, and the scaled element's layout width is
//! widened to `available_width / scale` at the same time, so that text
//! wrapping happens at the pre-scale width and nothing is clipped on the
//! right after scaling.

use crate::surface::{CardPage, RenderError, Surface};
use crate::types::{CaptureRegion, PagingMode, RenderSpec, Viewport};
use serde::Deserialize;
use std::time::Duration;

/// Geometry of the fit target in `auto-fit` mode, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitGeometry {
    /// Inner size of the content area the card reserves.
    pub available_width: f64,
    pub available_height: f64,
    /// Natural, unscaled size of the scalable content.
    pub content_width: f64,
    pub content_height: f64,
}

impl FitGeometry {
    /// All four dimensions must be positive and finite.
    pub fn is_usable(&self) -> bool {
        [
            self.available_width,
            self.available_height,
            self.content_width,
            self.content_height,
        ]
        .iter()
        .all(|v| v.is_finite() && *v > 0.0)
    }
}

/// Measurement and adjustment operations on a loaded card.
pub trait LayoutMeasurer {
    /// Reset any applied scale and measure the fit target.
    fn measure_fit(&mut self) -> Result<Option<FitGeometry>, RenderError>;

    /// Full rendered height of the card container.
    fn measure_container_height(&mut self) -> Result<Option<u32>, RenderError>;

    /// Rendered height of the content area alone (used for auto-split probes).
    fn measure_content_height(&mut self) -> Result<Option<u32>, RenderError>;

    /// Scale the content visually and set its layout width.
    fn apply_scale(&mut self, scale: f64, layout_width: f64) -> Result<(), RenderError>;
}

/// Delays used to let asynchronous layout settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTimings {
    /// After the document reports it has loaded.
    pub load: Duration,
    /// After applying an `auto-fit` scale.
    pub adjust: Duration,
    /// After loading an auto-split probe.
    pub probe: Duration,
}

impl Default for SettleTimings {
    fn default() -> Self {
        Self {
            load: Duration::from_millis(500),
            adjust: Duration::from_millis(100),
            probe: Duration::from_millis(200),
        }
    }
}

impl SettleTimings {
    #[cfg(test)]
    pub fn zero() -> Self {
        Self {
            load: Duration::ZERO,
            adjust: Duration::ZERO,
            probe: Duration::ZERO,
        }
    }
}

/// What the fit step decided for one card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOutcome {
    pub capture_height: u32,
    /// Scale applied in `auto-fit` mode, if geometry was available.
    pub scale: Option<f64>,
    /// Container height measured in growing modes.
    pub measured: Option<u32>,
}

/// Shrink factor for `auto-fit`. Always in `(0, 1]`.
pub fn fit_scale(geometry: &FitGeometry) -> f64 {
    let by_width = geometry.available_width / geometry.content_width;
    let by_height = geometry.available_height / geometry.content_height;
    1.0_f64.min(by_width).min(by_height)
}

/// Final capture height for a body card.
pub fn resolve_capture_height(mode: PagingMode, measured: Option<u32>, spec: &RenderSpec) -> u32 {
    let Some(measured) = measured else {
        return spec.height;
    };
    match mode {
        PagingMode::AutoFit => spec.height,
        PagingMode::Dynamic => measured.clamp(spec.height, spec.max_height.max(spec.height)),
        PagingMode::Separator | PagingMode::AutoSplit => measured.max(spec.height),
    }
}

/// Run the mode-specific measurement/adjustment step on a loaded page.
pub fn fit_card<P: CardPage + ?Sized>(
    page: &mut P,
    spec: &RenderSpec,
    timings: &SettleTimings,
) -> Result<FitOutcome, RenderError> {
    match spec.mode {
        PagingMode::AutoFit => {
            let geometry = page.measure_fit()?.filter(FitGeometry::is_usable);
            let scale = match geometry {
                Some(geometry) => {
                    let scale = fit_scale(&geometry);
                    log::debug!("auto-fit {geometry:?} -> scale {scale:.4}");
                    page.apply_scale(scale, geometry.available_width / scale)?;
                    page.settle(timings.adjust)?;
                    Some(scale)
                }
                None => {
                    log::warn!("auto-fit: no usable geometry, capturing unscaled");
                    None
                }
            };
            Ok(FitOutcome {
                capture_height: spec.height,
                scale,
                measured: None,
            })
        }
        PagingMode::Dynamic | PagingMode::Separator | PagingMode::AutoSplit => {
            let measured = page.measure_container_height()?;
            if measured.is_none() {
                log::warn!("{}: container height unavailable, using {}px", spec.mode, spec.height);
            }
            let capture_height = resolve_capture_height(spec.mode, measured, spec);
            log::debug!("{}: measured {measured:?} -> capture {capture_height}px", spec.mode);
            Ok(FitOutcome {
                capture_height,
                scale: None,
                measured,
            })
        }
    }
}

/// A finished capture: the PNG bytes and the region they cover.
#[derive(Debug, Clone)]
pub struct RenderedCard {
    pub png: Vec<u8>,
    pub region: CaptureRegion,
    pub outcome: FitOutcome,
}

/// Render a cover: fixed `width × height`, no fitting.
pub fn render_cover<S: Surface + ?Sized>(
    surface: &S,
    html: &str,
    spec: &RenderSpec,
    timings: &SettleTimings,
) -> Result<RenderedCard, RenderError> {
    capture_with(surface, spec.cover_viewport(), html, timings, |_| {
        Ok(FitOutcome {
            capture_height: spec.height,
            scale: None,
            measured: None,
        })
    })
}

/// Render a body card: load, settle, fit per mode, capture.
pub fn render_body_card<S: Surface + ?Sized>(
    surface: &S,
    html: &str,
    spec: &RenderSpec,
    timings: &SettleTimings,
) -> Result<RenderedCard, RenderError> {
    capture_with(surface, spec.viewport(), html, timings, |page| {
        fit_card(page, spec, timings)
    })
}

/// One surface lifecycle: open, load, settle, fit, capture. The page is
/// dropped (and its resources released) on every return path.
fn capture_with<S, F>(
    surface: &S,
    viewport: Viewport,
    html: &str,
    timings: &SettleTimings,
    fit: F,
) -> Result<RenderedCard, RenderError>
where
    S: Surface + ?Sized,
    F: FnOnce(&mut S::Page) -> Result<FitOutcome, RenderError>,
{
    let mut page = surface.open(viewport)?;
    page.load(html)?;
    page.settle(timings.load)?;
    let outcome = fit(&mut page)?;
    let region = CaptureRegion {
        width: viewport.width,
        height: outcome.capture_height,
    };
    let png = page.capture(region)?;
    Ok(RenderedCard {
        png,
        region,
        outcome,
    })
}
