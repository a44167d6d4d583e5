//! Customer-facing book preview assembly.
//!
//! The preview lists the book's visible pages with their rendered
//! artifacts. Before payment only the teaser pages are unlocked; once
//! the job is confirmed every page opens up. Locked pages expose no
//! object key.

use std::collections::HashSet;

use serde::Serialize;
use storyloom_core::artifacts::ArtifactKind;
use storyloom_core::regen::RegenerationPolicy;
use storyloom_core::manifest::BookManifest;
use storyloom_core::stages::{self, Stage};
use storyloom_core::state::JobState;
use storyloom_core::types::{DbId, PageNum};
use storyloom_db::models::{ArtifactRow, JobRow};

use crate::context::PipelineContext;
use crate::error::StageError;

/// One page of the preview.
#[derive(Debug, Clone, Serialize)]
pub struct PagePreview {
    pub page_num: PageNum,
    /// Object key of the final render; `None` while locked or not yet
    /// rendered.
    pub final_key: Option<String>,
    pub locked: bool,
}

/// The assembled preview for one job.
#[derive(Debug, Clone, Serialize)]
pub struct BookPreviewView {
    pub public_id: String,
    pub status: String,
    pub regen_used: i32,
    pub regen_limit: i32,
    pub regen_remaining: i32,
    pub pages: Vec<PagePreview>,
}

/// Assemble the preview from already-loaded rows. Covers come first,
/// then front-visible pages in order; hidden pages never appear.
pub fn build_preview(
    job: &JobRow,
    manifest: &BookManifest,
    finals: &[ArtifactRow],
) -> Result<BookPreviewView, StageError> {
    let state = job.state()?;
    let all_unlocked = matches!(
        state,
        JobState::Confirmed | JobState::PostpayGenerating | JobState::Completed
    );

    let mut teaser: HashSet<PageNum> = stages::page_nums_for_stage(manifest, Stage::Prepay)
        .into_iter()
        .collect();
    for (slot, _) in stages::covers_for_stage(manifest, Stage::Prepay) {
        teaser.insert(slot.page_num());
    }

    let mut page_nums: Vec<PageNum> = stages::covers_for_stage(manifest, Stage::Postpay)
        .iter()
        .map(|(slot, _)| slot.page_num())
        .collect();
    page_nums.extend(stages::front_visible_page_nums(manifest));

    let pages = page_nums
        .into_iter()
        .map(|page_num| {
            let locked = !all_unlocked && !teaser.contains(&page_num);
            let final_key = (!locked)
                .then(|| {
                    finals
                        .iter()
                        .find(|a| a.page_num == page_num)
                        .map(|a| a.object_key.clone())
                })
                .flatten();
            PagePreview {
                page_num,
                final_key,
                locked,
            }
        })
        .collect();

    Ok(BookPreviewView {
        public_id: job.public_id.to_string(),
        status: job.status.clone(),
        regen_used: job.regen_used,
        regen_limit: job.regen_limit,
        regen_remaining: RegenerationPolicy {
            limit: job.regen_limit,
        }
        .remaining(job.regen_used),
        pages,
    })
}

/// Load everything and assemble the preview for one job.
pub async fn preview(ctx: &PipelineContext, job_id: DbId) -> Result<BookPreviewView, StageError> {
    let job = ctx.jobs.load(job_id).await?;
    let manifest = ctx.templates.load_manifest(&job.book_slug).await?;
    let finals = ctx
        .jobs
        .artifacts_by_kind(job_id, ArtifactKind::Final.as_str())
        .await?;
    build_preview(&job, &manifest, &finals)
}
