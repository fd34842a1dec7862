//! # cardstock
//!
//! Turns a markdown note into a sequence of themed PNG cards: an optional
//! cover plus one or more body cards at a fixed width. Each card is laid out
//! as HTML and captured through headless Chrome.
//!
//! # Architecture
//!
//! ```text
//! note.md ─► document ─► segment ─► compose ─► layout ─► surface ─► *.png
//!                          ▲                                 │
//!                          └──── rendered height (auto-split)┘
//! ```
//!
//! The interesting part is the pagination and fitting engine. A body is split
//! into pages under one of four [`PagingMode`](types::PagingMode)s, then each
//! page goes through a measure → adjust → capture protocol that either shrinks
//! the content onto a fixed card (`auto-fit`) or grows the card to fit the
//! content, within bounds (`dynamic`, `separator`, `auto-split`).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Front matter + body parsing, cover metadata defaults |
//! | [`markup`] | Markdown → HTML, trailing `#tag` pills, top-level block splitting |
//! | [`segment`] | Body → ordered pages per paging mode; greedy auto-split planner |
//! | [`theme`] | Built-in themes: style sheets and gradients with per-asset fallback |
//! | [`compose`] | Maud templates for covers and body cards |
//! | [`layout`] | Fit-scale and capture-height rules; one card's surface lifecycle |
//! | [`surface`] | The rendering seam (`Surface`/`CardPage`) and the Chrome implementation |
//! | [`config`] | TOML config layering, validation, CLI overrides |
//! | [`pipeline`] | Orchestration, parallel rendering, progress events |
//! | [`types`] | Shared types: `RenderSpec`, `PageContent`, `CaptureResult` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Measure in the Browser
//!
//! Card heights depend on fonts, wrapping and theme CSS, which only the
//! browser knows. Rather than estimating, every sizing decision is made from a
//! measurement of the real layout. The measurements go through the
//! [`LayoutMeasurer`](layout::LayoutMeasurer) trait so the fitting rules are
//! unit-tested against a fake surface.
//!
//! ## One Surface per Card
//!
//! Each card opens a fresh browser and drops it after capture. That costs a
//! browser launch per card but guarantees no layout state leaks between
//! cards, and it makes parallel rendering a plain `par_iter`.

pub mod compose;
pub mod config;
pub mod document;
pub mod layout;
pub mod markup;
pub mod output;
pub mod pipeline;
pub mod segment;
pub mod surface;
pub mod theme;
pub mod types;
