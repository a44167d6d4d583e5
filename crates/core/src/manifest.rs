//! Book template manifest model.
//!
//! A manifest is an immutable, versioned JSON document describing one
//! book template: ordered page specs, optional covers, typography, and
//! output parameters. It is loaded fresh per use and never mutated; for
//! a given slug it is treated as a pure function of its identifier.

use serde::{Deserialize, Serialize};

use crate::types::PageNum;

/// Which generation stages a page or cover participates in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub prepay: bool,
    #[serde(default = "default_true")]
    pub postpay: bool,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            prepay: false,
            postpay: true,
        }
    }
}

/// Drop-shadow parameters for rendered text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowSpec {
    #[serde(default = "default_shadow_color")]
    pub color: String,
    #[serde(default = "default_shadow_opacity")]
    pub opacity: f32,
    #[serde(default = "default_shadow_offset")]
    pub offset: i32,
    /// Overrides `offset` horizontally when set.
    #[serde(default)]
    pub offset_x: Option<i32>,
    /// Overrides `offset` vertically when set.
    #[serde(default)]
    pub offset_y: Option<i32>,
    #[serde(default = "default_shadow_blur")]
    pub blur: Vec<i32>,
}

impl Default for ShadowSpec {
    fn default() -> Self {
        Self {
            color: default_shadow_color(),
            opacity: default_shadow_opacity(),
            offset: default_shadow_offset(),
            offset_x: None,
            offset_y: None,
            blur: default_shadow_blur(),
        }
    }
}

/// Font references and default text styles for a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypographySpec {
    pub font_uri: String,
    #[serde(default)]
    pub font_bold_uri: Option<String>,
    /// Body text style attributes (font_size, line_height, color, ...).
    #[serde(default)]
    pub body: serde_json::Map<String, serde_json::Value>,
    /// Accent text style attributes.
    #[serde(default)]
    pub accent: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub shadow: ShadowSpec,
}

/// One text overlay on a page: a template string with substitution
/// variables plus placement and style attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLayer {
    /// Template string, e.g. `"{child_name} and the Moon"`.
    pub text_template: String,
    #[serde(default = "default_template_vars")]
    pub template_vars: Vec<String>,
    /// Placement anchor, e.g. `"top-left"`, `"bottom-center"`.
    pub position: String,
    #[serde(default = "default_box_width")]
    pub box_width: f32,
    #[serde(default = "default_text_align")]
    pub text_align: String,
    #[serde(default)]
    pub offset_x: f32,
    #[serde(default)]
    pub offset_y: f32,
    /// Per-layer font override; falls back to the template typography.
    #[serde(default)]
    pub font_uri: Option<String>,
    /// Per-layer style overrides.
    #[serde(default)]
    pub style: serde_json::Map<String, serde_json::Value>,
}

/// One interior page of the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSpec {
    pub page_num: PageNum,
    /// Object key of the base illustration.
    pub base_uri: String,
    #[serde(default)]
    pub needs_face_swap: bool,
    #[serde(default)]
    pub text_layers: Vec<TextLayer>,
    #[serde(default)]
    pub availability: Availability,
    /// Per-page positive prompt override.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Per-page negative prompt override.
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

/// A front or back cover. Same shape as a page, plus an optional
/// typography override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverSpec {
    pub base_uri: String,
    #[serde(default)]
    pub needs_face_swap: bool,
    #[serde(default)]
    pub text_layers: Vec<TextLayer>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
    #[serde(default)]
    pub typography: Option<TypographySpec>,
}

/// Front/back cover pair with an optional shared typography override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoversSpec {
    #[serde(default)]
    pub front: Option<CoverSpec>,
    #[serde(default)]
    pub back: Option<CoverSpec>,
    #[serde(default)]
    pub typography: Option<TypographySpec>,
}

/// Output parameters for rendered pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Pages are square; this is the edge length in pixels.
    #[serde(default = "default_page_size_px")]
    pub page_size_px: u32,
    #[serde(default = "default_safe_zone_pt")]
    pub safe_zone_pt: f32,
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            page_size_px: default_page_size_px(),
            safe_zone_pt: default_safe_zone_pt(),
        }
    }
}

/// Immutable description of a book template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookManifest {
    pub slug: String,
    pub typography: TypographySpec,
    pub pages: Vec<PageSpec>,
    #[serde(default)]
    pub covers: Option<CoversSpec>,
    #[serde(default)]
    pub output: OutputSpec,
}

impl BookManifest {
    /// Look up a page spec by its page number.
    pub fn page_by_num(&self, page_num: PageNum) -> Option<&PageSpec> {
        self.pages.iter().find(|p| p.page_num == page_num)
    }
}

// ---- serde defaults ----

fn default_true() -> bool {
    true
}

fn default_template_vars() -> Vec<String> {
    vec!["child_name".to_string()]
}

fn default_box_width() -> f32 {
    0.8
}

fn default_text_align() -> String {
    "left".to_string()
}

fn default_dpi() -> u32 {
    300
}

fn default_page_size_px() -> u32 {
    2551
}

fn default_safe_zone_pt() -> f32 {
    24.0
}

fn default_shadow_color() -> String {
    "0,0,0".to_string()
}

fn default_shadow_opacity() -> f32 {
    0.5
}

fn default_shadow_offset() -> i32 {
    4
}

fn default_shadow_blur() -> Vec<i32> {
    vec![0, 4]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
