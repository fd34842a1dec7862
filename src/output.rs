//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines; the
//! `print_*` wrappers write them to stdout. Diagnostics go through `log`
//! instead, so this module only carries what the user asked to see.
//!
//! # Output Format
//!
//! ```text
//! ==> Rendering post.md
//!     Theme: botanical
//!     Mode: separator
//!     Size: 1080x1440 @2x
//! 3 cards + cover
//!     cover.png (1080x1440)
//!     card_1.png (1080x1440)
//!     card_2.png (1080x1725)
//!     card_3.png (1080x1440)
//! ==> 4 images → out/
//! ```

use crate::pipeline::{RenderEvent, RenderReport};
use crate::types::{CaptureResult, RenderSpec};
use std::path::Path;

/// Lines announcing what is about to be rendered.
pub fn format_header(input: &Path, spec: &RenderSpec) -> Vec<String> {
    vec![
        format!("==> Rendering {}", input.display()),
        format!("    Theme: {}", spec.theme),
        format!("    Mode: {}", spec.mode),
        format!(
            "    Size: {}x{} @{}x",
            spec.width, spec.height, spec.device_pixel_ratio
        ),
    ]
}

fn card_line(result: &CaptureResult) -> String {
    format!(
        "    {} ({}x{})",
        result.kind.file_name(),
        result.width,
        result.height
    )
}

/// Lines for one progress event.
pub fn format_event(event: &RenderEvent) -> Vec<String> {
    match event {
        RenderEvent::Segmented { pages, cover } => {
            let noun = if *pages == 1 { "card" } else { "cards" };
            let suffix = if *cover { " + cover" } else { "" };
            vec![format!("{pages} {noun}{suffix}")]
        }
        RenderEvent::CardRendered(result) => vec![card_line(result)],
    }
}

/// Closing lines once everything is written.
pub fn format_summary(report: &RenderReport) -> Vec<String> {
    let total = report.total();
    let noun = if total == 1 { "image" } else { "images" };
    vec![format!(
        "==> {total} {noun} \u{2192} {}",
        report.output_dir.display()
    )]
}

pub fn print_header(input: &Path, spec: &RenderSpec) {
    for line in format_header(input, spec) {
        println!("{}", line);
    }
}

pub fn print_event(event: &RenderEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

pub fn print_summary(report: &RenderReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}
