//! HTML templates for covers and body cards.
//!
//! Both card kinds share one document shell ([`base_document`]): the web font
//! import, a reset, and the page-specific style block. Card markup is
//!
//! ```text
//! .card-container            theme background, 50px padding
//!   .card-inner              white panel, 60px padding
//!     .card-content          fit target in auto-fit
//!       .card-content-scale  what gets scaled
//!   .page-number             only when there is more than one card
//! ```
//!
//! Sizing rules depend on the paging mode; see [`mode_css`]. All user text
//! (title, subtitle, tags) goes through maud's escaping. Rendered markdown and
//! style sheets are trusted and inserted with `PreEscaped`.

use crate::document::Metadata;
use crate::markup;
use crate::theme::StyleResolution;
use crate::types::{PageContent, PagingMode, RenderSpec};
use maud::{DOCTYPE, Markup, PreEscaped, html};

const FONT_IMPORT: &str = "@import url('https://fonts.googleapis.com/css2?family=Noto+Sans+SC:wght@300;400;500;700;900&display=swap');";

const FONT_STACK: &str =
    "'Noto Sans SC', 'Source Han Sans CN', 'PingFang SC', 'Microsoft YaHei', sans-serif";

fn base_document(title: &str, viewport: &str, css: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="zh-CN" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content=(viewport);
                title { (title) }
                style {
                    (PreEscaped(FONT_IMPORT))
                    (PreEscaped("*{margin:0;padding:0;box-sizing:border-box;}"))
                    (PreEscaped(css))
                }
            }
            body {
                (content)
            }
        }
    }
}

/// Fraction of `dimension`, truncated to whole pixels.
fn px(dimension: u32, fraction: f64) -> u32 {
    (f64::from(dimension) * fraction) as u32
}

/// Cover title size: shorter titles get bigger type.
pub fn title_font_size(title: &str, width: u32) -> u32 {
    let fraction = match title.chars().count() {
        0..=6 => 0.14,
        7..=10 => 0.12,
        11..=18 => 0.09,
        19..=30 => 0.07,
        _ => 0.055,
    };
    px(width, fraction)
}

/// Fixed-size cover: emoji, gradient title and subtitle on an inset panel.
pub fn cover_html(meta: &Metadata, style: &StyleResolution, width: u32, height: u32) -> Markup {
    let css = format!(
        "body{{font-family:{FONT_STACK};width:{width}px;height:{height}px;overflow:hidden;}}\
         .cover-container{{width:{width}px;height:{height}px;background:{bg};position:relative;overflow:hidden;}}\
         .cover-inner{{position:absolute;width:{inner_w}px;height:{inner_h}px;left:{left}px;top:{top}px;\
         background:#F3F3F3;border-radius:25px;display:flex;flex-direction:column;padding:{pad_v}px {pad_h}px;}}\
         .cover-emoji{{font-size:{emoji}px;line-height:1.2;margin-bottom:{emoji_gap}px;}}\
         .cover-title{{font-weight:900;font-size:{title}px;line-height:1.4;background:{title_bg};\
         -webkit-background-clip:text;-webkit-text-fill-color:transparent;background-clip:text;\
         flex:1;display:flex;align-items:flex-start;word-break:break-all;}}\
         .cover-subtitle{{font-weight:350;font-size:{subtitle}px;line-height:1.4;color:#000000;margin-top:auto;}}",
        bg = style.cover_background,
        inner_w = px(width, 0.88),
        inner_h = px(height, 0.91),
        left = px(width, 0.06),
        top = px(height, 0.045),
        pad_v = px(width, 0.074),
        pad_h = px(width, 0.079),
        emoji = px(width, 0.167),
        emoji_gap = px(height, 0.035),
        title = title_font_size(meta.title(), width),
        title_bg = style.title_gradient,
        subtitle = px(width, 0.067),
    );

    let content = html! {
        div.cover-container {
            div.cover-inner {
                div.cover-emoji { (meta.emoji()) }
                div.cover-title { (meta.title()) }
                div.cover-subtitle { (meta.subtitle()) }
            }
        }
    };
    base_document(
        "cover",
        &format!("width={width}, height={height}"),
        &css,
        content,
    )
}

/// Container sizing for each mode.
///
/// - `auto-fit`: fixed height, content area flexes and clips
/// - `dynamic`: only a minimum height, free to grow
/// - `separator`, `auto-split`: minimum height on container and panel
fn mode_css(mode: PagingMode, width: u32, height: u32, background: &str) -> String {
    let panel = "background:rgba(255,255,255,0.95);border-radius:20px;padding:60px;\
                 box-shadow:0 8px 32px rgba(0,0,0,0.1);backdrop-filter:blur(10px);";
    match mode {
        PagingMode::AutoFit => format!(
            ".card-container{{width:{width}px;height:{height}px;background:{background};position:relative;padding:50px;overflow:hidden;}}\
             .card-inner{{{panel}height:calc({height}px - 100px);overflow:hidden;display:flex;flex-direction:column;}}\
             .card-content{{line-height:1.7;flex:1;overflow:hidden;}}"
        ),
        PagingMode::Dynamic => format!(
            ".card-container{{width:{width}px;min-height:{height}px;background:{background};position:relative;padding:50px;}}\
             .card-inner{{{panel}}}\
             .card-content{{line-height:1.7;}}"
        ),
        PagingMode::Separator | PagingMode::AutoSplit => format!(
            ".card-container{{width:{width}px;min-height:{height}px;background:{background};position:relative;padding:50px;overflow:hidden;}}\
             .card-inner{{{panel}min-height:calc({height}px - 100px);}}\
             .card-content{{line-height:1.7;}}"
        ),
    }
}

/// Body card for one page.
pub fn card_html(page: &PageContent, style: &StyleResolution, spec: &RenderSpec) -> Markup {
    let body = markup::render_markdown(&page.raw_text);
    let label = page.page_label();

    let mut css = format!(
        "body{{font-family:{FONT_STACK};width:{width}px;overflow:hidden;background:transparent;}}",
        width = spec.width
    );
    css.push_str(&mode_css(
        spec.mode,
        spec.width,
        spec.height,
        &style.background_gradient,
    ));
    css.push_str(".card-content-scale{transform-origin:top left;will-change:transform;}");
    css.push_str(&style.style_sheet);
    css.push_str(
        ".page-number{position:absolute;bottom:80px;right:80px;font-size:36px;\
         color:rgba(255,255,255,0.8);font-weight:500;}",
    );

    let content = html! {
        div.card-container {
            div.card-inner {
                div.card-content {
                    div.card-content-scale { (PreEscaped(body)) }
                }
            }
            @if let Some(label) = label {
                div.page-number { (label) }
            }
        }
    };
    base_document(
        "card",
        &format!("width={}", spec.width),
        &css,
        content,
    )
}

/// Card used to measure a candidate auto-split page. Always unlabelled.
pub fn probe_card_html(markdown: &str, style: &StyleResolution, spec: &RenderSpec) -> Markup {
    let page = PageContent {
        index: 1,
        total: 1,
        raw_text: markdown.to_string(),
    };
    let probe_spec = RenderSpec {
        mode: PagingMode::AutoSplit,
        ..*spec
    };
    card_html(&page, style, &probe_spec)
}
