//! Artifact kinds and deterministic object-key conventions.
//!
//! Every artifact is addressed by `(job, kind, page_num)`. Keys are pure
//! functions of that triple, so re-running a stage overwrites the same
//! object instead of creating divergent state.

use crate::types::PageNum;

/// Reserved page number for the front cover.
pub const FRONT_COVER_PAGE_NUM: PageNum = -1;
/// Reserved page number for the back cover.
pub const BACK_COVER_PAGE_NUM: PageNum = -2;

/// Kinds of per-page artifacts produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Generated (or passthrough) background, before text compositing.
    Background,
    /// Final composited page.
    Final,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Background => "bg",
            Self::Final => "final",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable per-page key fragment: `page_07`, `front_cover`, `back_cover`.
pub fn page_key(page_num: PageNum) -> String {
    match page_num {
        FRONT_COVER_PAGE_NUM => "front_cover".to_string(),
        BACK_COVER_PAGE_NUM => "back_cover".to_string(),
        n => format!("page_{n:02}"),
    }
}

/// Object key for the background artifact of one page.
pub fn background_key(job_uuid: &str, page_num: PageNum) -> String {
    format!("layout/{job_uuid}/pages/{}_bg.png", page_key(page_num))
}

/// Object key for the final composited artifact of one page.
pub fn final_key(job_uuid: &str, page_num: PageNum) -> String {
    format!("layout/{job_uuid}/pages/{}.png", page_key(page_num))
}

/// Object key for `(job, kind, page_num)`.
pub fn object_key(job_uuid: &str, kind: ArtifactKind, page_num: PageNum) -> String {
    match kind {
        ArtifactKind::Background => background_key(job_uuid, page_num),
        ArtifactKind::Final => final_key(job_uuid, page_num),
    }
}

/// Sibling key of an explicit region mask for an illustration:
/// `pages/page_03_base.png` -> `pages/page_03_base_mask.png`.
pub fn explicit_mask_key(illustration_key: &str) -> String {
    match illustration_key.rsplit_once('.') {
        Some((stem, _ext)) => format!("{stem}_mask.png"),
        None => format!("{illustration_key}_mask.png"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_keys_are_zero_padded() {
        assert_eq!(page_key(0), "page_00");
        assert_eq!(page_key(7), "page_07");
        assert_eq!(page_key(29), "page_29");
    }

    #[test]
    fn cover_page_keys() {
        assert_eq!(page_key(FRONT_COVER_PAGE_NUM), "front_cover");
        assert_eq!(page_key(BACK_COVER_PAGE_NUM), "back_cover");
    }

    #[test]
    fn background_and_final_keys_differ_only_in_suffix() {
        let job = "7b1d2f60-0000-4000-8000-000000000000";
        assert_eq!(
            background_key(job, 3),
            format!("layout/{job}/pages/page_03_bg.png")
        );
        assert_eq!(final_key(job, 3), format!("layout/{job}/pages/page_03.png"));
    }

    #[test]
    fn keys_are_deterministic_per_triple() {
        let a = object_key("j", ArtifactKind::Background, 5);
        let b = object_key("j", ArtifactKind::Background, 5);
        assert_eq!(a, b);
        assert_ne!(a, object_key("j", ArtifactKind::Final, 5));
        assert_ne!(a, object_key("j", ArtifactKind::Background, 6));
    }

    #[test]
    fn explicit_mask_key_replaces_extension() {
        assert_eq!(
            explicit_mask_key("templates/t/pages/page_01_base.png"),
            "templates/t/pages/page_01_base_mask.png"
        );
        assert_eq!(
            explicit_mask_key("templates/t/pages/page_01_base.jpg"),
            "templates/t/pages/page_01_base_mask.png"
        );
        assert_eq!(explicit_mask_key("noext"), "noext_mask.png");
    }
}
