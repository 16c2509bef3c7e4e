use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const QUALIFIER: &str = "com";
pub const ORGANIZATION: &str = "docpress";
pub const APPLICATION: &str = "docpress";

/// Private-use glyph the exporter places before a code block.
pub const CODE_START_MARKER: char = '\u{EC03}';
/// Private-use glyph the exporter places after a code block.
pub const CODE_END_MARKER: char = '\u{EC02}';

/// Colors the editor writes on every run; emitting them would only add noise.
pub const DEFAULT_TEXT_COLORS: [&str; 2] = ["#000000", "#1155cc"];
pub const SMALL_IMAGE_THRESHOLD_PX: f32 = 200.0;
pub const QUOTE_INDENT: &str = "36pt";
pub const MONOSPACE_FONT_MARKER: &str = "Consolas";
pub const BOLD_WEIGHT_THRESHOLD: f32 = 500.0;
pub const DEFAULT_CODE_LANGUAGE: &str = "bash";

pub const TABLE_CLASSES: &str = "table-bordered table-striped";
pub const TABLE_STYLE: &str = "width:100%;";
pub const FLOAT_STYLE: &str = "float:right";

pub const TAGS_PREFIX: &str = "Tags:";
pub const POST_ID_PREFIX: &str = "PostId:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageMode {
    /// Embed image bytes as `data:` URIs.
    #[default]
    Inline,
    /// Hand image bytes to an upload function and link the returned URL.
    Uploaded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingImagePolicy {
    #[default]
    Fail,
    /// Leave the original `src` untouched and carry on.
    KeepSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TransformOptions {
    pub image_mode: ImageMode,
    pub missing_images: MissingImagePolicy,
    pub default_language: String,
    pub monospace_marker: String,
    pub upload_prefix: Option<String>,
    pub highlight_css: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::Inline,
            missing_images: MissingImagePolicy::Fail,
            default_language: DEFAULT_CODE_LANGUAGE.to_string(),
            monospace_marker: MONOSPACE_FONT_MARKER.to_string(),
            upload_prefix: None,
            highlight_css: false,
        }
    }
}

pub fn config_root() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).map(|p| p.config_dir().to_path_buf())
}

/// Folder-safe name derived from a document title.
pub fn generate_slug(title: &str) -> String {
    title
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            {
                '-'
            } else {
                c
            }
        })
        .collect()
}
