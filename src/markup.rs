//! Markdown to HTML conversion for card bodies.
//!
//! Bodies use CommonMark plus the tables, strikethrough, footnote and task
//! list extensions. Single newlines inside a paragraph are kept as line breaks,
//! since card text is usually written line by line rather than reflowed.
//!
//! A run of `#tag` tokens on the final lines of a page is lifted out of the
//! markdown and rendered as a row of tag pills:
//!
//! ```text
//! Some text.
//!
//! #rust #cards      →   <div class="tags-container"><span class="tag">#rust</span>…
//! ```

use maud::{Markup, html};
use pulldown_cmark::{BrokenLink, CowStr, Event, Options, Parser, Tag, html as md_html};
use std::ops::Range;

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS
}

/// Convert page markdown to presentational HTML.
pub fn render_markdown(markdown: &str) -> String {
    let (content, tags) = extract_trailing_tags(markdown);

    let parser = Parser::new_ext(content, parser_options()).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::new();
    md_html::push_html(&mut out, parser);

    if !tags.is_empty() {
        out.push_str(&render_tags(&tags).into_string());
    }
    out
}

fn render_tags(tags: &[&str]) -> Markup {
    html! {
        div.tags-container {
            @for tag in tags {
                span.tag { "#" (tag) }
            }
        }
    }
}

/// Strip trailing tag-only lines. Returns the remaining markdown and the tag
/// names (without `#`) in source order.
pub fn extract_trailing_tags(markdown: &str) -> (&str, Vec<&str>) {
    let trimmed = markdown.trim_end();

    let mut lines = Vec::new();
    let mut offset = 0;
    for line in trimmed.split_inclusive('\n') {
        lines.push((offset, line.trim_end_matches(['\n', '\r'])));
        offset += line.len();
    }

    let mut cut = trimmed.len();
    let mut tag_lines = Vec::new();
    for &(start, line) in lines.iter().rev() {
        if line.trim().is_empty() {
            break;
        }
        match parse_tag_line(line) {
            Some(tags) => {
                tag_lines.push(tags);
                cut = start;
            }
            None => break,
        }
    }

    if tag_lines.is_empty() {
        return (markdown, Vec::new());
    }
    let tags = tag_lines.into_iter().rev().flatten().collect();
    (trimmed[..cut].trim_end(), tags)
}

/// A tag line holds one or more whitespace-separated `#word` tokens and
/// nothing else.
fn parse_tag_line(line: &str) -> Option<Vec<&str>> {
    let tags: Option<Vec<&str>> = line
        .split_whitespace()
        .map(|token| {
            let name = token.strip_prefix('#')?;
            let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
            valid.then_some(name)
        })
        .collect();
    tags.filter(|t| !t.is_empty())
}

/// Whether a definition resolves `[text][label]` links or `[^label]` footnotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Link,
    Footnote,
}

/// A link reference or footnote definition, kept out of the block stream so
/// it can travel with whichever page references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub kind: DefinitionKind,
    pub label: String,
    pub source: String,
}

/// A markdown body cut into top-level blocks plus its definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyBlocks {
    pub blocks: Vec<String>,
    pub definitions: Vec<Definition>,
}

impl BodyBlocks {
    /// `text` followed by the definitions its references need.
    ///
    /// Definitions go before any trailing tag line so the tags still end
    /// the page.
    pub fn with_definitions(&self, text: &str) -> String {
        self.append(text, &self.referenced_by(text))
    }

    /// Attach definitions to pages cut from these blocks. Each page gets the
    /// definitions it references; a definition no page references goes on
    /// the last page so nothing from the body is lost.
    pub fn attach_definitions(&self, pages: Vec<String>) -> Vec<String> {
        if self.definitions.is_empty() {
            return pages;
        }
        let mut claimed = vec![false; self.definitions.len()];
        let mut wanted: Vec<Vec<usize>> = Vec::with_capacity(pages.len());
        for page in &pages {
            let indices = self.referenced_by(page);
            for &i in &indices {
                claimed[i] = true;
            }
            wanted.push(indices);
        }

        let orphans: Vec<usize> = (0..self.definitions.len()).filter(|&i| !claimed[i]).collect();
        if !orphans.is_empty() {
            match wanted.last_mut() {
                Some(last) => {
                    last.extend(orphans);
                    last.sort_unstable();
                }
                None => return vec![self.append("", &orphans)],
            }
        }
        pages
            .iter()
            .zip(&wanted)
            .map(|(page, indices)| self.append(page, indices))
            .collect()
    }

    /// Indices of definitions referenced from `text`, directly or through
    /// another referenced definition.
    fn referenced_by(&self, text: &str) -> Vec<usize> {
        let mut used = vec![false; self.definitions.len()];
        let mut scope = text.to_string();
        loop {
            let links: Vec<String> = unresolved_link_labels(&scope)
                .iter()
                .map(|l| normalize_label(l))
                .collect();
            let lowered = scope.to_lowercase();
            let mut grew = false;
            for (i, def) in self.definitions.iter().enumerate() {
                if used[i] {
                    continue;
                }
                let hit = match def.kind {
                    DefinitionKind::Link => links.contains(&normalize_label(&def.label)),
                    DefinitionKind::Footnote => {
                        lowered.contains(&format!("[^{}]", def.label.to_lowercase()))
                    }
                };
                if hit {
                    used[i] = true;
                    scope.push_str("\n\n");
                    scope.push_str(&def.source);
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        (0..used.len()).filter(|&i| used[i]).collect()
    }

    fn append(&self, text: &str, indices: &[usize]) -> String {
        if indices.is_empty() {
            return text.to_string();
        }
        let definitions = indices
            .iter()
            .map(|&i| self.definitions[i].source.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let (content, tags) = extract_trailing_tags(text);
        let tag_lines = if tags.is_empty() {
            ""
        } else {
            text[content.len()..].trim()
        };
        [content.trim(), definitions.as_str(), tag_lines]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Labels of reference links in `markdown` that have no definition in it.
fn unresolved_link_labels(markdown: &str) -> Vec<String> {
    let mut labels = Vec::new();
    Parser::new_with_broken_link_callback(markdown, parser_options(), Some(collect_labels(&mut labels)))
        .for_each(drop);
    labels
}

fn collect_labels<'input>(
    labels: &mut Vec<String>,
) -> impl FnMut(BrokenLink<'input>) -> Option<(CowStr<'input>, CowStr<'input>)> + '_ {
    move |link| {
        labels.push(link.reference.to_string());
        None
    }
}

/// Link labels match case-insensitively with runs of whitespace collapsed.
fn normalize_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Source text of each top-level markdown block, in document order.
///
/// Container blocks (lists, block quotes, tables, fenced code, HTML blocks)
/// are returned whole; they are never broken across pages. Top-level link
/// reference and footnote definitions are returned separately in
/// [`BodyBlocks::definitions`].
pub fn split_top_level_blocks(markdown: &str) -> BodyBlocks {
    let mut body = BodyBlocks::default();
    let mut definitions: Vec<(usize, Definition)> = Vec::new();
    let mut covered: Vec<Range<usize>> = Vec::new();
    let mut depth = 0usize;
    let mut span: Option<(usize, usize)> = None;
    let mut footnote: Option<String> = None;

    let mut events = Parser::new_ext(markdown, parser_options()).into_offset_iter();
    for (event, range) in events.by_ref() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    span = Some((range.start, range.end));
                    footnote = match tag {
                        Tag::FootnoteDefinition(label) => Some(label.to_string()),
                        _ => None,
                    };
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if let Some((start, end)) = span.as_mut() {
                    *end = (*end).max(range.end);
                    if depth == 0 {
                        let (start, end) = (*start, *end);
                        covered.push(start..end);
                        let text = markdown[start..end].trim();
                        match footnote.take() {
                            Some(label) => definitions.push((
                                start,
                                Definition {
                                    kind: DefinitionKind::Footnote,
                                    label,
                                    source: text.to_string(),
                                },
                            )),
                            None => push_block(&mut body.blocks, text),
                        }
                        span = None;
                    }
                }
            }
            _ if depth == 0 => {
                covered.push(range.clone());
                push_block(&mut body.blocks, &markdown[range]);
            }
            _ => {
                if let Some((_, end)) = span.as_mut() {
                    *end = (*end).max(range.end);
                }
            }
        }
    }

    // Reference definitions emit no events. Ones inside a block already
    // travel with that block.
    for (label, def) in events.reference_definitions().iter() {
        if covered.iter().any(|r| r.contains(&def.span.start)) {
            continue;
        }
        definitions.push((
            def.span.start,
            Definition {
                kind: DefinitionKind::Link,
                label: label.to_string(),
                source: markdown[def.span.clone()].trim().to_string(),
            },
        ));
    }
    definitions.sort_by_key(|(start, _)| *start);
    body.definitions = definitions.into_iter().map(|(_, def)| def).collect();
    body
}

fn push_block(blocks: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        blocks.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let html = render_markdown("# Heading\n\nThis is **bold** and *italic*.");
        assert!(html.contains("<h1>Heading</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
    }

    #[test]
    fn single_newlines_become_line_breaks() {
        let html = render_markdown("line one\nline two");
        assert!(html.contains("line one<br />"));
    }

    #[test]
    fn renders_tables() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn trailing_tags_are_extracted() {
        let (content, tags) = extract_trailing_tags("Body text\n\n#rust #cards\n#效率\n");
        assert_eq!(content, "Body text");
        assert_eq!(tags, vec!["rust", "cards", "效率"]);
    }

    #[test]
    fn headings_are_not_tags() {
        let (content, tags) = extract_trailing_tags("Text\n\n# Heading");
        assert_eq!(content, "Text\n\n# Heading");
        assert!(tags.is_empty());
    }

    #[test]
    fn mixed_line_is_not_a_tag_line() {
        let (_, tags) = extract_trailing_tags("ends with words #tag");
        assert!(tags.is_empty());
    }

    #[test]
    fn tags_render_as_pills_after_content() {
        let html = render_markdown("Hello\n\n#one #two");
        assert!(html.contains(r#"<div class="tags-container">"#));
        assert!(html.contains(r#"<span class="tag">#one</span>"#));
        assert!(html.find("Hello").unwrap() < html.find("tags-container").unwrap());
    }

    #[test]
    fn tag_only_page_has_no_paragraph() {
        let html = render_markdown("#solo");
        assert!(!html.contains("<p>"));
        assert!(html.contains("#solo"));
    }

    #[test]
    fn blocks_split_on_top_level_boundaries() {
        let md = "# Title\n\nFirst paragraph\nstill first.\n\n- item one\n\n- item two\n\n> quote\n> more\n\n```\ncode\n\nblock\n```\n\nLast.";
        let blocks = split_top_level_blocks(md).blocks;
        assert_eq!(blocks.len(), 6, "{blocks:?}");
        assert_eq!(blocks[0], "# Title");
        assert_eq!(blocks[1], "First paragraph\nstill first.");
        assert!(blocks[2].contains("item one") && blocks[2].contains("item two"));
        assert_eq!(blocks[3], "> quote\n> more");
        assert!(blocks[4].starts_with("```") && blocks[4].contains("\n\nblock"));
        assert_eq!(blocks[5], "Last.");
    }

    #[test]
    fn thematic_break_is_its_own_block() {
        let blocks = split_top_level_blocks("Para one\n\n***\n\nPara two").blocks;
        assert_eq!(blocks, vec!["Para one", "***", "Para two"]);
    }

    #[test]
    fn empty_markdown_has_no_blocks() {
        assert_eq!(split_top_level_blocks("  \n\n "), BodyBlocks::default());
    }

    #[test]
    fn reference_definitions_are_split_out() {
        let body = split_top_level_blocks("See [the docs][1].\n\n[1]: https://example.com\n\nAfter.");
        assert_eq!(body.blocks, vec!["See [the docs][1].", "After."]);
        assert_eq!(
            body.definitions,
            vec![Definition {
                kind: DefinitionKind::Link,
                label: "1".to_string(),
                source: "[1]: https://example.com".to_string(),
            }]
        );
    }

    #[test]
    fn page_with_reference_renders_link() {
        let body = split_top_level_blocks("See [the docs][1].\n\n[1]: https://example.com\n\nAfter.");
        let page = body.with_definitions("See [the docs][1].");
        let html = render_markdown(&page);
        assert!(html.contains(r#"<a href="https://example.com">the docs</a>"#), "{html}");
        assert_eq!(body.with_definitions("After."), "After.");
    }

    #[test]
    fn reference_labels_match_case_insensitively() {
        let body = split_top_level_blocks("Read [Rust Book].\n\n[rust   book]: https://doc.rust-lang.org/book/");
        let page = body.with_definitions("Read [Rust Book].");
        assert!(render_markdown(&page).contains("https://doc.rust-lang.org/book/"));
    }

    #[test]
    fn footnote_definitions_are_split_out() {
        let body = split_top_level_blocks("Claim[^src].\n\nMore.\n\n[^src]: The source.");
        assert_eq!(body.blocks, vec!["Claim[^src].", "More."]);
        assert_eq!(body.definitions.len(), 1);
        assert_eq!(body.definitions[0].kind, DefinitionKind::Footnote);
        assert_eq!(body.definitions[0].label, "src");
        assert_eq!(body.definitions[0].source, "[^src]: The source.");

        let page = body.with_definitions("Claim[^src].");
        assert_eq!(page, "Claim[^src].\n\n[^src]: The source.");
        assert!(render_markdown(&page).contains("The source."));
    }

    #[test]
    fn definitions_inside_blocks_stay_in_place() {
        let body = split_top_level_blocks("> [a]: https://a.example\n> see [a]\n\nNext");
        assert!(body.definitions.is_empty());
        assert_eq!(body.blocks.len(), 2);
        assert!(body.blocks[0].contains("[a]: https://a.example"));
    }

    #[test]
    fn definitions_go_before_trailing_tags() {
        let body = split_top_level_blocks("Link [x][1].\n\n#cards #notes\n\n[1]: https://x.example");
        let page = body.with_definitions("Link [x][1].\n\n#cards #notes");
        let (content, tags) = extract_trailing_tags(&page);
        assert_eq!(tags, vec!["cards", "notes"]);
        assert!(content.ends_with("[1]: https://x.example"));
    }

    #[test]
    fn unreferenced_definitions_land_on_last_page() {
        let body = split_top_level_blocks("Alpha.\n\nBeta.\n\n[^x]: Unused note.");
        let pages = body.attach_definitions(vec!["Alpha.".to_string(), "Beta.".to_string()]);
        assert_eq!(pages, vec!["Alpha.", "Beta.\n\n[^x]: Unused note."]);
    }
}
