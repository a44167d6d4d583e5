//! Stage resolution: which pages (and covers) belong to the `prepay`
//! teaser pass versus the `postpay` full-book pass.
//!
//! `prepay` is a minimal two-page teaser: the first and last page that is
//! not in the hidden-page set, regardless of book length. `postpay`
//! follows per-page availability flags.

use crate::error::CoreError;
use crate::manifest::{BookManifest, CoverSpec};
use crate::types::PageNum;

/// Generation pass identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Teaser pages generated before payment.
    Prepay,
    /// Full book generated after confirmation.
    Postpay,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepay => "prepay",
            Self::Postpay => "postpay",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "prepay" => Ok(Self::Prepay),
            "postpay" => Ok(Self::Postpay),
            other => Err(CoreError::Validation(format!("Unknown stage: {other:?}"))),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cover a [`CoverSpec`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverSlot {
    Front,
    Back,
}

impl CoverSlot {
    /// Reserved page number used for artifact keys.
    pub fn page_num(self) -> PageNum {
        match self {
            Self::Front => crate::artifacts::FRONT_COVER_PAGE_NUM,
            Self::Back => crate::artifacts::BACK_COVER_PAGE_NUM,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
        }
    }
}

/// Pages reserved for full-only image-swap content. Hidden from the
/// teaser regardless of their availability flags.
pub const HIDDEN_PAGE_NUMS: &[PageNum] = &[1, 23];

fn is_hidden(page_num: PageNum) -> bool {
    HIDDEN_PAGE_NUMS.contains(&page_num)
}

/// All page numbers visible to the customer-facing preview, sorted.
pub fn front_visible_page_nums(manifest: &BookManifest) -> Vec<PageNum> {
    let mut nums: Vec<PageNum> = manifest
        .pages
        .iter()
        .map(|p| p.page_num)
        .filter(|n| !is_hidden(*n))
        .collect();
    nums.sort_unstable();
    nums.dedup();
    nums
}

/// Resolve the page numbers for a stage.
///
/// - `Prepay`: the first and last front-visible pages (one page if only
///   one qualifies, empty if none).
/// - `Postpay`: every page whose availability marks `postpay`.
pub fn page_nums_for_stage(manifest: &BookManifest, stage: Stage) -> Vec<PageNum> {
    match stage {
        Stage::Prepay => {
            let visible = front_visible_page_nums(manifest);
            match (visible.first(), visible.last()) {
                (Some(&first), Some(&last)) if first != last => vec![first, last],
                (Some(&only), _) => vec![only],
                _ => Vec::new(),
            }
        }
        Stage::Postpay => {
            let mut nums: Vec<PageNum> = manifest
                .pages
                .iter()
                .filter(|p| p.availability.postpay)
                .map(|p| p.page_num)
                .collect();
            nums.sort_unstable();
            nums.dedup();
            nums
        }
    }
}

/// Covers whose availability marks the given stage, front before back.
pub fn covers_for_stage(manifest: &BookManifest, stage: Stage) -> Vec<(CoverSlot, &CoverSpec)> {
    let Some(covers) = manifest.covers.as_ref() else {
        return Vec::new();
    };
    let mut result = Vec::new();
    for (slot, spec) in [(CoverSlot::Front, &covers.front), (CoverSlot::Back, &covers.back)] {
        if let Some(spec) = spec {
            let available = match stage {
                Stage::Prepay => spec.availability.prepay,
                Stage::Postpay => spec.availability.postpay,
            };
            if available {
                result.push((slot, spec));
            }
        }
    }
    result
}

/// Whether any page or cover in the stage's resolved set requires
/// image-swap. Used to skip the GPU phase entirely for text-only stages.
pub fn stage_requires_swap(manifest: &BookManifest, stage: Stage) -> bool {
    let swap_page = page_nums_for_stage(manifest, stage)
        .into_iter()
        .filter_map(|n| manifest.page_by_num(n))
        .any(|p| p.needs_face_swap);
    swap_page
        || covers_for_stage(manifest, stage)
            .iter()
            .any(|(_, c)| c.needs_face_swap)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
