//! Heuristic asset-role resolution for image loader nodes.

/// What an image loader node feeds into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetRole {
    /// Customer child photo (face reference).
    Photo,
    /// Base page illustration.
    Illustration,
    /// Region-of-interest mask.
    Mask,
}

impl AssetRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetRole::Photo => "photo",
            AssetRole::Illustration => "illustration",
            AssetRole::Mask => "mask",
        }
    }
}

/// Infer a loader's role from its pre-patch filename.
///
/// Template authors name their placeholder images after the slot they
/// occupy; the substrings below are the ones seen in real templates.
/// Mask is checked first since names like `page_mask.png` contain both
/// a mask and an illustration marker.
pub fn resolve_asset_role(filename: &str) -> Option<AssetRole> {
    let lower = filename.to_ascii_lowercase();
    if lower.contains("mask") {
        Some(AssetRole::Mask)
    } else if lower.contains("photo") || lower.contains("face") || lower.contains("child") {
        Some(AssetRole::Photo)
    } else if lower.contains("illustration") || lower.contains("page") || lower.contains("base") {
        Some(AssetRole::Illustration)
    } else {
        None
    }
}
