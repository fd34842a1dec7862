//! Splitting a document body into card pages.
//!
//! | Mode | Pages |
//! |---|---|
//! | `separator` | one per `---` section |
//! | `auto-fit`, `dynamic` | exactly one |
//! | `auto-split` | greedy block packing by measured height |
//!
//! ## Auto-split
//!
//! The body is cut into top-level markdown blocks (see
//! [`markup::split_top_level_blocks`]); lists, quotes, tables and code blocks
//! are never broken. Blocks are appended to the current page one at a time and
//! the candidate page is measured by rendering it. When the candidate's
//! content height exceeds the budget the current page is closed and the block
//! starts a new one. A block that is taller than the budget by itself ends up
//! alone on its page. Measurements come from a [`BlockMeasurer`], which keeps
//! this module free of any rendering machinery.
//!
//! Link reference and footnote definitions are not blocks. Each page carries
//! the definitions it references, both while it is measured and in its final
//! text, so links and footnotes resolve on every page and no body text is
//! dropped.

use crate::markup;
use crate::types::{PageContent, PagingMode};

/// Vertical space taken by the container (2 × 50px) and inner panel
/// (2 × 60px) paddings around the content area of a card.
pub const CARD_VERTICAL_CHROME: u32 = 220;

/// Rendered-height feedback for auto-split.
pub trait BlockMeasurer {
    type Error;

    /// Rendered height of `markdown` as card content, in CSS pixels.
    /// `None` means the surface reported no usable geometry.
    fn content_height(&mut self, markdown: &str) -> Result<Option<u32>, Self::Error>;
}

/// Content-area height budget for a card of the given height.
pub fn content_budget(card_height: u32) -> u32 {
    card_height.saturating_sub(CARD_VERTICAL_CHROME)
}

/// Split on lines made only of three or more hyphens. Blank sections are
/// dropped; the rest are trimmed.
pub fn split_by_separator(body: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in body.lines() {
        if is_separator_line(line) {
            push_section(&mut sections, &current);
            current.clear();
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    push_section(&mut sections, &current);
    sections
}

fn is_separator_line(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= 3 && line.bytes().all(|b| b == b'-')
}

fn push_section(sections: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        sections.push(text.to_string());
    }
}

/// Greedily pack top-level blocks into pages whose rendered content height
/// stays within `budget`.
pub fn plan_auto_split<M: BlockMeasurer>(
    body: &str,
    budget: u32,
    measurer: &mut M,
) -> Result<Vec<String>, M::Error> {
    let split = markup::split_top_level_blocks(body);
    let mut pages = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for block in &split.blocks {
        let mut candidate = current.clone();
        candidate.push(block.clone());
        let candidate_text = split.with_definitions(&candidate.join("\n\n"));

        let height = measurer.content_height(&candidate_text)?;
        log::debug!("auto-split candidate of {} blocks measured {height:?}", candidate.len());

        match height {
            Some(h) if h > budget && !current.is_empty() => {
                pages.push(current.join("\n\n"));
                current = vec![block.clone()];
            }
            _ => current = candidate,
        }
    }
    if !current.is_empty() {
        pages.push(current.join("\n\n"));
    }
    Ok(split.attach_definitions(pages))
}

/// Number raw page texts into [`PageContent`]s.
pub fn number_pages(texts: Vec<String>) -> Vec<PageContent> {
    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(i, raw_text)| PageContent {
            index: i + 1,
            total,
            raw_text,
        })
        .collect()
}

/// Produce the ordered pages for `body` under `mode`.
///
/// `measurer` is only consulted for [`PagingMode::AutoSplit`].
pub fn segment<M: BlockMeasurer>(
    body: &str,
    mode: PagingMode,
    card_height: u32,
    measurer: &mut M,
) -> Result<Vec<PageContent>, M::Error> {
    let texts = match mode {
        PagingMode::Separator => split_by_separator(body),
        PagingMode::AutoFit | PagingMode::Dynamic => {
            let body = body.trim();
            if body.is_empty() {
                Vec::new()
            } else {
                vec![body.to_string()]
            }
        }
        PagingMode::AutoSplit => plan_auto_split(body, content_budget(card_height), measurer)?,
    };
    Ok(number_pages(texts))
}

/// Measurer for modes that never need one.
pub struct NoMeasure;

impl BlockMeasurer for NoMeasure {
    type Error = std::convert::Infallible;

    fn content_height(&mut self, _markdown: &str) -> Result<Option<u32>, Self::Error> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Height is a fixed cost per line of markdown, plus explicit overrides
    /// for whole candidates.
    struct LineMeasurer {
        per_line: u32,
        calls: Vec<String>,
        overrides: HashMap<String, Option<u32>>,
    }

    impl LineMeasurer {
        fn new(per_line: u32) -> Self {
            Self {
                per_line,
                calls: Vec::new(),
                overrides: HashMap::new(),
            }
        }
    }

    impl BlockMeasurer for LineMeasurer {
        type Error = String;

        fn content_height(&mut self, markdown: &str) -> Result<Option<u32>, String> {
            self.calls.push(markdown.to_string());
            if let Some(h) = self.overrides.get(markdown) {
                return Ok(*h);
            }
            Ok(Some(markdown.lines().count() as u32 * self.per_line))
        }
    }

    struct FailingMeasurer;

    impl BlockMeasurer for FailingMeasurer {
        type Error = String;

        fn content_height(&mut self, _markdown: &str) -> Result<Option<u32>, String> {
            Err("surface crashed".into())
        }
    }

    // =========================================================================
    // separator
    // =========================================================================

    #[test]
    fn separator_splits_on_hyphen_lines() {
        assert_eq!(split_by_separator("A\n---\nB\n---\nC"), vec!["A", "B", "C"]);
    }

    #[test]
    fn separator_accepts_longer_runs_and_trailing_space() {
        assert_eq!(split_by_separator("A\n-----\nB\n---   \nC"), vec!["A", "B", "C"]);
    }

    #[test]
    fn separator_ignores_short_or_mixed_lines() {
        assert_eq!(split_by_separator("A\n--\nB\n- - -\nC\n--- x"), vec!["A\n--\nB\n- - -\nC\n--- x"]);
    }

    #[test]
    fn separator_drops_blank_sections() {
        assert_eq!(split_by_separator("---\n\nA\n---\n   \n---\nB\n---"), vec!["A", "B"]);
    }

    #[test]
    fn separator_is_idempotent_under_rejoin() {
        let body = "# One\n\ntext\n----\n\n## Two\n- a\n- b\n---\n\n---\nThree";
        let first = split_by_separator(body);
        let rejoined = first.join("\n---\n");
        assert_eq!(split_by_separator(&rejoined), first);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn empty_body_yields_no_pages() {
        let pages = segment("", PagingMode::Separator, 1440, &mut NoMeasure).unwrap();
        assert!(pages.is_empty());
        let pages = segment("  \n---\n ", PagingMode::Separator, 1440, &mut NoMeasure).unwrap();
        assert!(pages.is_empty());
        let pages = segment("   ", PagingMode::Dynamic, 1440, &mut NoMeasure).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn segment_numbers_pages() {
        let pages = segment("A\n---\nB\n---\nC", PagingMode::Separator, 1440, &mut NoMeasure).unwrap();
        let labels: Vec<_> = pages.iter().filter_map(|p| p.page_label()).collect();
        assert_eq!(labels, vec!["1/3", "2/3", "3/3"]);
        assert!(pages.iter().all(|p| p.total == 3));
    }

    // =========================================================================
    // single-page modes
    // =========================================================================

    #[test]
    fn auto_fit_and_dynamic_keep_whole_body() {
        for mode in [PagingMode::AutoFit, PagingMode::Dynamic] {
            let pages = segment("A\n---\nB", mode, 1440, &mut NoMeasure).unwrap();
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].raw_text, "A\n---\nB");
            assert_eq!(pages[0].page_label(), None);
        }
    }

    // =========================================================================
    // auto-split
    // =========================================================================

    #[test]
    fn content_budget_subtracts_paddings() {
        assert_eq!(content_budget(1440), 1220);
        assert_eq!(content_budget(100), 0);
    }

    #[test]
    fn auto_split_keeps_everything_when_it_fits() {
        let mut m = LineMeasurer::new(10);
        let pages = plan_auto_split("one\n\ntwo\n\nthree", 1000, &mut m).unwrap();
        assert_eq!(pages, vec!["one\n\ntwo\n\nthree"]);
    }

    #[test]
    fn auto_split_breaks_between_blocks() {
        // Each paragraph is one line (100px); blank joins add a line each.
        // "a" = 100, "a\n\nb" = 300, "a\n\nb\n\nc" = 500 > 400.
        let mut m = LineMeasurer::new(100);
        let pages = plan_auto_split("a\n\nb\n\nc\n\nd", 400, &mut m).unwrap();
        assert_eq!(pages, vec!["a\n\nb", "c\n\nd"]);
    }

    #[test]
    fn auto_split_never_breaks_inside_a_list() {
        let body = "intro\n\n- one\n- two\n- three\n- four\n\noutro";
        let mut m = LineMeasurer::new(100);
        let pages = plan_auto_split(body, 450, &mut m).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1], "- one\n- two\n- three\n- four");
    }

    #[test]
    fn oversized_block_stands_alone() {
        let body = "small\n\n```\n1\n2\n3\n4\n5\n6\n```\n\nafter";
        let mut m = LineMeasurer::new(100);
        let pages = plan_auto_split(body, 300, &mut m).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "small");
        assert!(pages[1].starts_with("```"));
        assert_eq!(pages[2], "after");
    }

    #[test]
    fn oversized_first_block_is_not_preceded_by_empty_page() {
        let body = "```\n1\n2\n3\n4\n5\n```";
        let mut m = LineMeasurer::new(100);
        let pages = plan_auto_split(body, 100, &mut m).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn missing_geometry_counts_as_fitting() {
        let mut m = LineMeasurer::new(1000);
        m.overrides.insert("a\n\nb".to_string(), None);
        let pages = plan_auto_split("a\n\nb", 10, &mut m).unwrap();
        assert_eq!(pages, vec!["a\n\nb"]);
    }

    #[test]
    fn auto_split_measures_cumulative_candidates() {
        let mut m = LineMeasurer::new(1);
        plan_auto_split("a\n\nb", 100, &mut m).unwrap();
        assert_eq!(m.calls, vec!["a", "a\n\nb"]);
    }

    #[test]
    fn auto_split_propagates_measurer_errors() {
        let result = segment("a\n\nb", PagingMode::AutoSplit, 1440, &mut FailingMeasurer);
        assert_eq!(result.unwrap_err(), "surface crashed");
    }

    #[test]
    fn auto_split_on_empty_body_never_measures() {
        let pages = segment("", PagingMode::AutoSplit, 1440, &mut FailingMeasurer).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn auto_split_keeps_every_line_of_the_body() {
        let body = "See [the docs][1].\n\n[1]: https://example.com\n\nMiddle.\n\nNote[^n].\n\n[^n]: The footnote.\n\nLast.";
        let mut m = LineMeasurer::new(100);
        let pages = plan_auto_split(body, 100, &mut m).unwrap();
        assert_eq!(
            pages,
            vec![
                "See [the docs][1].\n\n[1]: https://example.com",
                "Middle.",
                "Note[^n].\n\n[^n]: The footnote.",
                "Last.",
            ]
        );
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            assert!(pages.iter().any(|p| p.contains(line)), "lost {line:?}");
        }
    }

    #[test]
    fn auto_split_measures_pages_with_their_definitions() {
        let mut m = LineMeasurer::new(1);
        plan_auto_split("Go [there][home].\n\n[home]: https://example.com", 100, &mut m).unwrap();
        assert_eq!(m.calls, vec!["Go [there][home].\n\n[home]: https://example.com"]);
    }

    #[test]
    fn auto_split_of_only_definitions_keeps_them() {
        let mut m = LineMeasurer::new(1);
        let pages = plan_auto_split("[^a]: Orphan footnote.", 100, &mut m).unwrap();
        assert_eq!(pages, vec!["[^a]: Orphan footnote."]);
        assert!(m.calls.is_empty());
    }
}
