//! Themes: style sheets and gradient tokens.
//!
//! Each [`Theme`] contributes up to four assets:
//!
//! | Asset | Used by |
//! |---|---|
//! | style sheet | body cards, appended after the base card styles |
//! | background gradient | body card container (diagonal) |
//! | cover background | cover container (vertical) |
//! | title gradient | cover title text fill |
//!
//! All of them live in a [`ThemeTable`] that is built once at startup and
//! handed to the pipeline. Every asset falls back to the `default` theme's
//! entry on its own, so a theme can ship with only a style sheet and reuse
//! the default gradients (or the other way round).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The closed set of supported themes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Default,
    PlayfulGeometric,
    NeoBrutalism,
    Botanical,
    Professional,
    Retro,
    Terminal,
    Sketch,
}

impl Theme {
    pub const ALL: [Theme; 8] = [
        Theme::Default,
        Theme::PlayfulGeometric,
        Theme::NeoBrutalism,
        Theme::Botanical,
        Theme::Professional,
        Theme::Retro,
        Theme::Terminal,
        Theme::Sketch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::PlayfulGeometric => "playful-geometric",
            Theme::NeoBrutalism => "neo-brutalism",
            Theme::Botanical => "botanical",
            Theme::Professional => "professional",
            Theme::Retro => "retro",
            Theme::Terminal => "terminal",
            Theme::Sketch => "sketch",
        }
    }

    /// Look up a theme by its kebab-case name.
    pub fn from_name(name: &str) -> Option<Theme> {
        Theme::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Style sheet compiled into the binary for this theme.
    fn builtin_style_sheet(self) -> &'static str {
        match self {
            Theme::Default => include_str!("../static/themes/default.css"),
            Theme::PlayfulGeometric => include_str!("../static/themes/playful-geometric.css"),
            Theme::NeoBrutalism => include_str!("../static/themes/neo-brutalism.css"),
            Theme::Botanical => include_str!("../static/themes/botanical.css"),
            Theme::Professional => include_str!("../static/themes/professional.css"),
            Theme::Retro => include_str!("../static/themes/retro.css"),
            Theme::Terminal => include_str!("../static/themes/terminal.css"),
            Theme::Sketch => include_str!("../static/themes/sketch.css"),
        }
    }

    /// `(card background, cover background, cover title gradient)`.
    fn builtin_gradients(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Theme::Default => (
                "linear-gradient(180deg, #f3f3f3 0%, #f9f9f9 100%)",
                "linear-gradient(180deg, #f3f3f3 0%, #f9f9f9 100%)",
                "linear-gradient(180deg, #111827 0%, #4B5563 100%)",
            ),
            Theme::PlayfulGeometric => (
                "linear-gradient(135deg, #8B5CF6 0%, #F472B6 100%)",
                "linear-gradient(180deg, #8B5CF6 0%, #F472B6 100%)",
                "linear-gradient(180deg, #7C3AED 0%, #F472B6 100%)",
            ),
            Theme::NeoBrutalism => (
                "linear-gradient(135deg, #FF4757 0%, #FECA57 100%)",
                "linear-gradient(180deg, #FF4757 0%, #FECA57 100%)",
                "linear-gradient(180deg, #000000 0%, #FF4757 100%)",
            ),
            Theme::Botanical => (
                "linear-gradient(135deg, #4A7C59 0%, #8FBC8F 100%)",
                "linear-gradient(180deg, #4A7C59 0%, #8FBC8F 100%)",
                "linear-gradient(180deg, #1F2937 0%, #4A7C59 100%)",
            ),
            Theme::Professional => (
                "linear-gradient(135deg, #2563EB 0%, #3B82F6 100%)",
                "linear-gradient(180deg, #2563EB 0%, #3B82F6 100%)",
                "linear-gradient(180deg, #1E3A8A 0%, #2563EB 100%)",
            ),
            Theme::Retro => (
                "linear-gradient(135deg, #D35400 0%, #F39C12 100%)",
                "linear-gradient(180deg, #D35400 0%, #F39C12 100%)",
                "linear-gradient(180deg, #8B4513 0%, #D35400 100%)",
            ),
            Theme::Terminal => (
                "linear-gradient(135deg, #0D1117 0%, #161B22 100%)",
                "linear-gradient(180deg, #0D1117 0%, #21262D 100%)",
                "linear-gradient(180deg, #39D353 0%, #58A6FF 100%)",
            ),
            Theme::Sketch => (
                "linear-gradient(135deg, #555555 0%, #888888 100%)",
                "linear-gradient(180deg, #555555 0%, #999999 100%)",
                "linear-gradient(180deg, #111827 0%, #6B7280 100%)",
            ),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a card template needs from the theme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleResolution {
    pub background_gradient: String,
    pub cover_background: String,
    pub title_gradient: String,
    pub style_sheet: String,
}

/// Per-theme gradient overrides from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_gradient: Option<String>,
}

/// Immutable theme lookup tables.
#[derive(Debug, Clone, Default)]
pub struct ThemeTable {
    style_sheets: BTreeMap<Theme, String>,
    backgrounds: BTreeMap<Theme, String>,
    cover_backgrounds: BTreeMap<Theme, String>,
    title_gradients: BTreeMap<Theme, String>,
}

impl ThemeTable {
    /// Tables with every built-in asset registered.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for theme in Theme::ALL {
            let (background, cover, title) = theme.builtin_gradients();
            table
                .style_sheets
                .insert(theme, theme.builtin_style_sheet().to_string());
            table.backgrounds.insert(theme, background.to_string());
            table.cover_backgrounds.insert(theme, cover.to_string());
            table.title_gradients.insert(theme, title.to_string());
        }
        table
    }

    pub fn with_style_sheet(mut self, theme: Theme, css: impl Into<String>) -> Self {
        self.style_sheets.insert(theme, css.into());
        self
    }

    pub fn without_style_sheet(mut self, theme: Theme) -> Self {
        self.style_sheets.remove(&theme);
        self
    }

    pub fn with_background(mut self, theme: Theme, gradient: impl Into<String>) -> Self {
        self.backgrounds.insert(theme, gradient.into());
        self
    }

    pub fn without_gradients(mut self, theme: Theme) -> Self {
        self.backgrounds.remove(&theme);
        self.cover_backgrounds.remove(&theme);
        self.title_gradients.remove(&theme);
        self
    }

    /// Layer config overrides on top of the current tables.
    pub fn with_overrides(mut self, overrides: &BTreeMap<Theme, ThemeOverride>) -> Self {
        for (&theme, ov) in overrides {
            if let Some(bg) = &ov.background {
                self.backgrounds.insert(theme, bg.clone());
            }
            if let Some(cover) = &ov.cover_background {
                self.cover_backgrounds.insert(theme, cover.clone());
            }
            if let Some(title) = &ov.title_gradient {
                self.title_gradients.insert(theme, title.clone());
            }
        }
        self
    }

    /// Resolve the assets for `theme`, falling back per asset to `default`.
    pub fn resolve(&self, theme: Theme) -> StyleResolution {
        StyleResolution {
            background_gradient: lookup(&self.backgrounds, theme),
            cover_background: lookup(&self.cover_backgrounds, theme),
            title_gradient: lookup(&self.title_gradients, theme),
            style_sheet: lookup(&self.style_sheets, theme),
        }
    }
}

fn lookup(table: &BTreeMap<Theme, String>, theme: Theme) -> String {
    table
        .get(&theme)
        .or_else(|| table.get(&Theme::Default))
        .cloned()
        .unwrap_or_default()
}
