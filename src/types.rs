//! Shared types used across the render pipeline.
//!
//! These flow from the segmenter through composition, layout fitting and
//! capture, and must mean the same thing in each stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::theme::Theme;

/// How body content maps onto cards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PagingMode {
    /// Split on `---` lines; each card grows to fit its content.
    #[default]
    Separator,
    /// One card at a fixed height; content is scaled down to fit.
    AutoFit,
    /// Split between top-level blocks by measured rendered height.
    AutoSplit,
    /// One card whose height follows the content, up to a maximum.
    Dynamic,
}

impl PagingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PagingMode::Separator => "separator",
            PagingMode::AutoFit => "auto-fit",
            PagingMode::AutoSplit => "auto-split",
            PagingMode::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for PagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated render settings shared by every card of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSpec {
    pub theme: Theme,
    pub mode: PagingMode,
    pub width: u32,
    pub height: u32,
    /// Upper bound for `dynamic` cards. Always `>= height`.
    pub max_height: u32,
    pub device_pixel_ratio: u32,
}

impl RenderSpec {
    /// Viewport height the surface is opened with. `dynamic` cards need
    /// room to grow, so they get the maximum up front.
    pub fn viewport_height(&self) -> u32 {
        match self.mode {
            PagingMode::Dynamic => self.max_height,
            PagingMode::Separator | PagingMode::AutoFit | PagingMode::AutoSplit => self.height,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.viewport_height(),
            device_pixel_ratio: self.device_pixel_ratio,
        }
    }

    /// Viewport for covers, which never grow.
    pub fn cover_viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            device_pixel_ratio: self.device_pixel_ratio,
        }
    }
}

/// Size of a rendering surface in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: u32,
}

/// Top-left anchored region to capture, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub width: u32,
    pub height: u32,
}

/// Body text for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    /// 1-based position.
    pub index: usize,
    pub total: usize,
    pub raw_text: String,
}

impl PageContent {
    /// `"2/5"`-style label; single-page output carries none.
    pub fn page_label(&self) -> Option<String> {
        (self.total > 1).then(|| format!("{}/{}", self.index, self.total))
    }
}

/// Which card a capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Cover,
    Body(usize),
}

impl CardKind {
    pub fn file_name(self) -> String {
        match self {
            CardKind::Cover => "cover.png".to_string(),
            CardKind::Body(index) => format!("card_{index}.png"),
        }
    }
}

/// A written card image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    pub kind: CardKind,
    pub path: PathBuf,
    /// Logical width in CSS pixels.
    pub width: u32,
    /// Resolved logical height in CSS pixels.
    pub height: u32,
    /// Actual raster size read back from the PNG (`width * dpr` etc).
    pub pixel_size: (u32, u32),
}
