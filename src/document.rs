//! Markdown document loading.
//!
//! A card document is a markdown file with an optional YAML front matter
//! block carrying cover metadata:
//!
//! ```text
//! ---
//! emoji: "🚀"
//! title: "Five Tools"
//! subtitle: "Try these"
//! ---
//! First card body
//! ---
//! Second card body
//! ```
//!
//! Front matter is strictly best-effort. A block that is not valid YAML, or
//! that is valid YAML but not a mapping, yields empty metadata; the body is
//! still everything after the closing delimiter. A document without front
//! matter is simply all body and gets no cover.

use serde_yaml::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cover titles and subtitles are cut to this many characters.
pub const MAX_COVER_TEXT_CHARS: usize = 15;

pub const DEFAULT_EMOJI: &str = "📝";
pub const DEFAULT_TITLE: &str = "标题";

const FRONT_MATTER_DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Cover metadata from the front matter.
///
/// Fields keep their raw presence so the cover decision can tell "absent"
/// apart from "defaulted". Use the accessors for display values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub emoji: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

impl Metadata {
    /// Build metadata from a parsed YAML value. Non-mapping values are empty.
    fn from_yaml(value: &Value) -> Self {
        let Value::Mapping(map) = value else {
            return Self::default();
        };
        let field = |key: &str| map.get(key).and_then(scalar_to_string);
        Self {
            emoji: field("emoji"),
            title: field("title").map(|t| truncate_chars(&t, MAX_COVER_TEXT_CHARS)),
            subtitle: field("subtitle").map(|s| truncate_chars(&s, MAX_COVER_TEXT_CHARS)),
        }
    }

    /// A cover is rendered iff an emoji or a title was given.
    pub fn wants_cover(&self) -> bool {
        let non_empty = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        non_empty(&self.emoji) || non_empty(&self.title)
    }

    pub fn emoji(&self) -> &str {
        self.emoji.as_deref().unwrap_or(DEFAULT_EMOJI)
    }

    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn subtitle(&self) -> &str {
        self.subtitle.as_deref().unwrap_or("")
    }
}

/// A loaded document: cover metadata plus the trimmed markdown body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub metadata: Metadata,
    pub body: String,
}

/// Read and parse a document from disk.
pub fn load_document(path: &Path) -> Result<Document, DocumentError> {
    if !path.is_file() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }
    let source = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_document(&source))
}

/// Split a document into front matter metadata and body. Never fails.
pub fn parse_document(source: &str) -> Document {
    match split_front_matter(source) {
        Some((yaml, body)) => {
            let metadata = match serde_yaml::from_str::<Value>(yaml) {
                Ok(value) => Metadata::from_yaml(&value),
                Err(e) => {
                    log::warn!("ignoring malformed front matter: {e}");
                    Metadata::default()
                }
            };
            Document {
                metadata,
                body: body.trim().to_string(),
            }
        }
        None => Document {
            metadata: Metadata::default(),
            body: source.trim().to_string(),
        },
    }
}

/// Locate a leading `---` … `---` block.
///
/// Returns the text between the delimiters and the remainder after the
/// closing delimiter line, or `None` when the document has no front matter.
fn split_front_matter(source: &str) -> Option<(&str, &str)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let first_end = source.find('\n')?;
    if !is_delimiter(&source[..first_end]) {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    while offset <= source.len() {
        let rest = &source[offset..];
        let line_len = rest.find('\n').unwrap_or(rest.len());
        if is_delimiter(&rest[..line_len]) {
            let yaml = &source[yaml_start..offset];
            let body_start = (offset + line_len + 1).min(source.len());
            return Some((yaml, &source[body_start..]));
        }
        if line_len == rest.len() {
            break;
        }
        offset += line_len + 1;
    }
    None
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == FRONT_MATTER_DELIMITER
}

/// Render a YAML scalar as display text. Null, sequences and maps are ignored.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Keep at most `max` characters (Unicode scalar values).
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
