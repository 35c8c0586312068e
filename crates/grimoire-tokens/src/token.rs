//! Token values handed in by the script layer and handed back by the
//! generator.

use std::fmt;

use grimoire_tokens_render::{ImageBuffer, OutputFormat, RenderError, RenderResult};
use serde::{Deserialize, Serialize};

use crate::logging::targets;

/// Character alignment, which also drives the token's colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Townsfolk,
    Outsider,
    Minion,
    Demon,
    Traveller,
    Fabled,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Townsfolk => "townsfolk",
            Team::Outsider => "outsider",
            Team::Minion => "minion",
            Team::Demon => "demon",
            Team::Traveller => "traveller",
            Team::Fabled => "fabled",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A character from a parsed script.
///
/// `image` is any reference string: a built-in id, `asset:<uuid>`, or a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    pub team: Team,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub reminders: Vec<String>,
}

impl Character {
    pub fn new(id: impl Into<String>, name: impl Into<String>, team: Team) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team,
            image: String::new(),
            reminders: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    #[must_use]
    pub fn with_reminder(mut self, text: impl Into<String>) -> Self {
        self.reminders.push(text.into());
        self
    }
}

/// Which kind of token a [`Token`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Character,
    Reminder,
    Meta,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Character => "character",
            TokenType::Reminder => "reminder",
            TokenType::Meta => "meta",
        }
    }
}

/// A finished token bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub canvas: ImageBuffer,
    /// Diameter in pixels.
    pub diameter: u32,
    /// `None` for meta tokens.
    pub team: Option<Team>,
    pub token_type: TokenType,
    /// File stem, without extension.
    pub filename: String,
    /// Id of the character this token belongs to.
    pub character: Option<String>,
}

impl Token {
    /// Encode in `preferred`, falling back to PNG when the WebP encoder
    /// rejects the image.
    ///
    /// Returns the bytes and the format actually used.
    pub fn encode(&self, preferred: OutputFormat) -> RenderResult<(Vec<u8>, OutputFormat)> {
        match self.canvas.encode(preferred) {
            Ok(bytes) => Ok((bytes, preferred)),
            Err(RenderError::Encode(reason)) if preferred == OutputFormat::WebP => {
                tracing::warn!(
                    target: targets::PIPELINE,
                    filename = %self.filename,
                    %reason,
                    "WebP encoding failed, writing PNG"
                );
                Ok((self.canvas.to_png()?, OutputFormat::Png))
            }
            Err(e) => Err(e),
        }
    }

    /// File name including the extension for `format`.
    pub fn file_name(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.filename, format.extension())
    }
}

// ============================================================================
// FILE NAMES
// ============================================================================

/// Lower-case `text`, keep `[a-z0-9_-]`, turn every other run into one `_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut gap = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if gap && !slug.is_empty() {
                slug.push('_');
            }
            gap = false;
            slug.push(c);
        } else {
            gap = true;
        }
    }
    slug
}

pub fn character_filename(id: &str) -> String {
    non_empty(slugify(id), "character")
}

/// `index` is 1-based.
pub fn reminder_filename(id: &str, index: usize, text: &str) -> String {
    let slug = slugify(text);
    let base = format!("{}_reminder_{index}", character_filename(id));
    if slug.is_empty() { base } else { format!("{base}_{slug}") }
}

pub fn meta_filename(name: &str) -> String {
    format!("_meta_{}", non_empty(slugify(name), "token"))
}

fn non_empty(slug: String, fallback: &str) -> String {
    if slug.is_empty() { fallback.to_string() } else { slug }
}
