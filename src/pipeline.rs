//! The render pipeline: document in, PNG cards out.
//!
//! ```text
//! load → segment → compose → open surface → settle → fit → capture → write
//! ```
//!
//! ## Output Structure
//!
//! ```text
//! output/
//! ├── cover.png     # only when the front matter has an emoji or title
//! ├── card_1.png
//! ├── card_2.png
//! └── ...
//! ```
//!
//! Each card gets its own surface, which is released as soon as the card is
//! captured. Auto-split measurement is the exception: all probes share one
//! surface sized `width × 2·height` so tall candidates lay out fully.
//!
//! ## Parallel Rendering
//!
//! With `jobs > 1` body cards render on a [rayon](https://docs.rs/rayon) pool
//! of that size. Results are collected in page order, so file names and the
//! report are the same as a sequential run. Progress events may arrive out
//! of order.

use crate::compose;
use crate::document::{self, Document, DocumentError};
use crate::layout::{self, RenderedCard, SettleTimings};
use crate::segment::{self, BlockMeasurer, NoMeasure};
use crate::surface::{CardPage, RenderError, Surface};
use crate::theme::StyleResolution;
use crate::types::{CaptureResult, CardKind, PageContent, PagingMode, RenderSpec, Viewport};
use image::{ImageFormat, ImageReader};
use rayon::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to start render workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Progress reported while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// Pagination is done; `pages` body cards follow.
    Segmented { pages: usize, cover: bool },
    CardRendered(CaptureResult),
}

/// Everything written by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub output_dir: PathBuf,
    pub cover: Option<CaptureResult>,
    pub cards: Vec<CaptureResult>,
}

impl RenderReport {
    pub fn total(&self) -> usize {
        self.cards.len() + usize::from(self.cover.is_some())
    }
}

/// Settings shared by every card of a run.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub spec: RenderSpec,
    pub style: StyleResolution,
    pub settle: SettleTimings,
    /// Worker count for body cards; 1 is strictly sequential.
    pub jobs: usize,
}

/// Load `path` and render it into `output_dir`.
pub fn render_file<S: Surface>(
    path: &Path,
    job: &RenderJob,
    surface: &S,
    output_dir: &Path,
    progress: Option<Sender<RenderEvent>>,
) -> Result<RenderReport, PipelineError> {
    let doc = document::load_document(path)?;
    log::info!("loaded {}", path.display());
    render_document(&doc, job, surface, output_dir, progress)
}

/// Render a parsed document into `output_dir`.
pub fn render_document<S: Surface>(
    doc: &Document,
    job: &RenderJob,
    surface: &S,
    output_dir: &Path,
    progress: Option<Sender<RenderEvent>>,
) -> Result<RenderReport, PipelineError> {
    std::fs::create_dir_all(output_dir).map_err(|source| PipelineError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let pages = paginate(&doc.body, job, surface)?;
    let wants_cover = doc.metadata.wants_cover();
    log::info!(
        "{} mode: {} body card(s){}",
        job.spec.mode,
        pages.len(),
        if wants_cover { " plus cover" } else { "" }
    );
    notify(
        progress.as_ref(),
        RenderEvent::Segmented {
            pages: pages.len(),
            cover: wants_cover,
        },
    );

    let cover = if wants_cover {
        let html = compose::cover_html(&doc.metadata, &job.style, job.spec.width, job.spec.height)
            .into_string();
        let rendered = layout::render_cover(surface, &html, &job.spec, &job.settle)?;
        let result = write_card(output_dir, CardKind::Cover, &rendered)?;
        notify(progress.as_ref(), RenderEvent::CardRendered(result.clone()));
        Some(result)
    } else {
        None
    };

    let render_page = |page: &PageContent| -> Result<CaptureResult, PipelineError> {
        let html = compose::card_html(page, &job.style, &job.spec).into_string();
        let rendered = layout::render_body_card(surface, &html, &job.spec, &job.settle)?;
        let result = write_card(output_dir, CardKind::Body(page.index), &rendered)?;
        notify(progress.as_ref(), RenderEvent::CardRendered(result.clone()));
        Ok(result)
    };

    let cards = if job.jobs > 1 && pages.len() > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(job.jobs)
            .build()?;
        pool.install(|| pages.par_iter().map(render_page).collect::<Result<Vec<_>, _>>())?
    } else {
        pages.iter().map(render_page).collect::<Result<Vec<_>, _>>()?
    };

    Ok(RenderReport {
        output_dir: output_dir.to_path_buf(),
        cover,
        cards,
    })
}

fn notify(progress: Option<&Sender<RenderEvent>>, event: RenderEvent) {
    if let Some(tx) = progress {
        tx.send(event).ok();
    }
}

/// Split the body into pages, measuring through `surface` for auto-split.
fn paginate<S: Surface>(
    body: &str,
    job: &RenderJob,
    surface: &S,
) -> Result<Vec<PageContent>, RenderError> {
    let spec = &job.spec;
    if spec.mode != PagingMode::AutoSplit || body.trim().is_empty() {
        return match segment::segment(body, spec.mode, spec.height, &mut NoMeasure) {
            Ok(pages) => Ok(pages),
            Err(never) => match never {},
        };
    }

    let page = surface.open(Viewport {
        width: spec.width,
        height: spec.height.saturating_mul(2),
        device_pixel_ratio: spec.device_pixel_ratio,
    })?;
    let mut probe = ProbeMeasurer {
        page,
        style: &job.style,
        spec,
        delay: job.settle.probe,
    };
    segment::segment(body, spec.mode, spec.height, &mut probe)
}

/// Measures auto-split candidates by rendering them as an unlabelled card.
struct ProbeMeasurer<'a, P> {
    page: P,
    style: &'a StyleResolution,
    spec: &'a RenderSpec,
    delay: Duration,
}

impl<P: CardPage> BlockMeasurer for ProbeMeasurer<'_, P> {
    type Error = RenderError;

    fn content_height(&mut self, markdown: &str) -> Result<Option<u32>, RenderError> {
        let html = compose::probe_card_html(markdown, self.style, self.spec).into_string();
        self.page.load(&html)?;
        self.page.settle(self.delay)?;
        self.page.measure_content_height()
    }
}

fn write_card(
    output_dir: &Path,
    kind: CardKind,
    rendered: &RenderedCard,
) -> Result<CaptureResult, PipelineError> {
    let pixel_size = ImageReader::with_format(Cursor::new(rendered.png.as_slice()), ImageFormat::Png)
        .into_dimensions()
        .map_err(RenderError::from)?;

    let path = output_dir.join(kind.file_name());
    std::fs::write(&path, &rendered.png).map_err(|source| PipelineError::Io {
        path: path.clone(),
        source,
    })?;
    log::debug!(
        "wrote {} ({}x{} css, {}x{} px)",
        path.display(),
        rendered.region.width,
        rendered.region.height,
        pixel_size.0,
        pixel_size.1
    );

    Ok(CaptureResult {
        kind,
        path,
        width: rendered.region.width,
        height: rendered.region.height,
        pixel_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_document;
    use crate::layout::FitGeometry;
    use crate::surface::tests::{MockBehavior, MockSurface, PageOp};
    use crate::theme::{Theme, ThemeTable};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn job(mode: PagingMode, dpr: u32) -> RenderJob {
        RenderJob {
            spec: RenderSpec {
                theme: Theme::Default,
                mode,
                width: 1080,
                height: 1440,
                max_height: 2160,
                device_pixel_ratio: dpr,
            },
            style: ThemeTable::builtin().resolve(Theme::Default),
            settle: SettleTimings::zero(),
            jobs: 1,
        }
    }

    const THREE_SECTIONS: &str = "---\nemoji: 🚀\ntitle: Hello\n---\nA\n---\nB\n---\nC";

    #[test]
    fn separator_document_renders_cover_and_cards() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let doc = parse_document(THREE_SECTIONS);

        let report =
            render_document(&doc, &job(PagingMode::Separator, 2), &surface, tmp.path(), None)
                .unwrap();

        let cover = report.cover.as_ref().unwrap();
        assert_eq!(cover.path, tmp.path().join("cover.png"));
        assert_eq!(cover.pixel_size, (2160, 2880));
        assert_eq!(report.cards.len(), 3);
        assert_eq!(report.total(), 4);
        for (i, card) in report.cards.iter().enumerate() {
            assert_eq!(card.kind, CardKind::Body(i + 1));
            assert_eq!(card.path, tmp.path().join(format!("card_{}.png", i + 1)));
            assert_eq!((card.width, card.height), (1080, 1440));
            assert_eq!(card.pixel_size, (2160, 2880));
            assert!(card.path.exists());
        }

        let loaded = surface.loaded();
        assert!(loaded[0].contains("cover-title"));
        for label in ["1/3", "2/3", "3/3"] {
            let tag = format!(r#"<div class="page-number">{label}</div>"#);
            assert!(loaded.iter().any(|html| html.contains(&tag)), "missing {label}");
        }
    }

    #[test]
    fn dynamic_card_is_clamped_to_max_height() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior {
            container_height: Some(3000),
            ..Default::default()
        });
        let doc = parse_document("Just one long card");

        let report =
            render_document(&doc, &job(PagingMode::Dynamic, 1), &surface, tmp.path(), None)
                .unwrap();

        assert!(report.cover.is_none());
        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.cards[0].height, 2160);
        assert_eq!(report.cards[0].pixel_size, (1080, 2160));
    }

    #[test]
    fn no_front_matter_means_no_cover() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let doc = parse_document("A\n---\nB");

        let report =
            render_document(&doc, &job(PagingMode::Separator, 1), &surface, tmp.path(), None)
                .unwrap();

        assert!(report.cover.is_none());
        assert!(!tmp.path().join("cover.png").exists());
        assert_eq!(report.cards.len(), 2);
    }

    #[test]
    fn empty_body_renders_only_cover() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let doc = parse_document("---\ntitle: Only a cover\n---\n");

        let report =
            render_document(&doc, &job(PagingMode::Separator, 1), &surface, tmp.path(), None)
                .unwrap();

        assert!(report.cover.is_some());
        assert!(report.cards.is_empty());
        assert_eq!(surface.open_count(), 1);
    }

    #[test]
    fn empty_auto_split_body_never_opens_probe() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let doc = parse_document("   ");

        let report =
            render_document(&doc, &job(PagingMode::AutoSplit, 1), &surface, tmp.path(), None)
                .unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(surface.open_count(), 0);
    }

    #[test]
    fn auto_split_packs_blocks_by_measured_height() {
        let tmp = TempDir::new().unwrap();
        // Budget is 1440 - 220 = 1220; each paragraph measures 500.
        let surface = MockSurface::new(MockBehavior {
            paragraph_height: Some(500),
            ..Default::default()
        });
        let doc = parse_document("a\n\nb\n\nc");

        let report =
            render_document(&doc, &job(PagingMode::AutoSplit, 1), &surface, tmp.path(), None)
                .unwrap();

        assert_eq!(report.cards.len(), 2);
        let opened = surface.opened();
        assert_eq!(opened[0].height, 2880, "probe surface is twice as tall");
        assert_eq!(opened[1].height, 1440);

        let loaded = surface.loaded();
        let cards: Vec<_> = loaded.iter().rev().take(2).collect();
        assert!(cards[1].contains("<p>a</p>") && cards[1].contains("<p>b</p>"));
        assert!(cards[1].contains(r#"<div class="page-number">1/2</div>"#));
        assert!(cards[0].contains("<p>c</p>"));
    }

    #[test]
    fn auto_fit_scales_single_card() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior {
            fit: Some(FitGeometry {
                available_width: 860.0,
                available_height: 1120.0,
                content_width: 860.0,
                content_height: 4480.0,
            }),
            ..Default::default()
        });
        let doc = parse_document("A\n---\nB");

        let report =
            render_document(&doc, &job(PagingMode::AutoFit, 1), &surface, tmp.path(), None)
                .unwrap();

        assert_eq!(report.cards.len(), 1);
        assert_eq!(report.cards[0].height, 1440);
        assert!(surface.operations().contains(&PageOp::ApplyScale {
            scale: 0.25,
            layout_width: 3440.0
        }));
    }

    #[test]
    fn parallel_run_keeps_page_order() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let doc = parse_document("1\n---\n2\n---\n3\n---\n4\n---\n5");
        let mut parallel = job(PagingMode::Separator, 1);
        parallel.jobs = 3;

        let report = render_document(&doc, &parallel, &surface, tmp.path(), None).unwrap();

        let names: Vec<_> = report
            .cards
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["card_1.png", "card_2.png", "card_3.png", "card_4.png", "card_5.png"]
        );
        assert_eq!(surface.open_count(), surface.closed_count());
    }

    #[test]
    fn progress_events_are_sent() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let doc = parse_document(THREE_SECTIONS);
        let (tx, rx) = mpsc::channel();

        render_document(&doc, &job(PagingMode::Separator, 1), &surface, tmp.path(), Some(tx))
            .unwrap();

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events[0],
            RenderEvent::Segmented {
                pages: 3,
                cover: true
            }
        );
        let rendered = events
            .iter()
            .filter(|e| matches!(e, RenderEvent::CardRendered(_)))
            .count();
        assert_eq!(rendered, 4);
    }

    #[test]
    fn launch_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior {
            fail_launch: true,
            ..Default::default()
        });
        let doc = parse_document("A");

        let err =
            render_document(&doc, &job(PagingMode::Separator, 1), &surface, tmp.path(), None)
                .unwrap_err();
        assert!(matches!(err, PipelineError::Render(RenderError::Launch(_))));
    }

    #[test]
    fn surfaces_released_after_measurement_failure() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior {
            fail_measure: true,
            ..Default::default()
        });
        let doc = parse_document("A\n---\nB");

        let result =
            render_document(&doc, &job(PagingMode::Separator, 1), &surface, tmp.path(), None);
        assert!(result.is_err());
        assert_eq!(surface.open_count(), surface.closed_count());
    }

    #[test]
    fn render_file_reports_missing_input() {
        let tmp = TempDir::new().unwrap();
        let surface = MockSurface::new(MockBehavior::default());
        let err = render_file(
            &tmp.path().join("missing.md"),
            &job(PagingMode::Separator, 1),
            &surface,
            tmp.path(),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Document(DocumentError::NotFound(_))
        ));
    }

    #[test]
    fn render_file_creates_output_dir() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("post.md");
        std::fs::write(&input, "hello").unwrap();
        let out = tmp.path().join("nested/out");
        let surface = MockSurface::new(MockBehavior::default());

        let report =
            render_file(&input, &job(PagingMode::Separator, 1), &surface, &out, None).unwrap();

        assert_eq!(report.output_dir, out);
        assert!(out.join("card_1.png").exists());
    }
}
