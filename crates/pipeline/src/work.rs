//! Stage work-item resolution shared by the backgrounds and render
//! stages: interior pages plus covers, flattened to one item shape.

use storyloom_core::manifest::{BookManifest, TextLayer, TypographySpec};
use storyloom_core::stages::{self, Stage};
use storyloom_core::types::PageNum;

/// One page or cover to process in a stage.
pub struct WorkItem<'m> {
    /// Interior page number, or a reserved cover number.
    pub page_num: PageNum,
    pub base_uri: &'m str,
    pub needs_face_swap: bool,
    pub prompt: Option<&'m str>,
    pub negative_prompt: Option<&'m str>,
    pub text_layers: &'m [TextLayer],
    /// Cover typography override; interior pages use the manifest's.
    pub typography: Option<&'m TypographySpec>,
}

/// Resolve a stage's work items: covers first (their reserved page
/// numbers sort lowest), then interior pages in page order.
pub fn stage_work_items<'m>(manifest: &'m BookManifest, stage: Stage) -> Vec<WorkItem<'m>> {
    let mut items = Vec::new();

    let covers_typography = manifest
        .covers
        .as_ref()
        .and_then(|c| c.typography.as_ref());
    for (slot, cover) in stages::covers_for_stage(manifest, stage) {
        items.push(WorkItem {
            page_num: slot.page_num(),
            base_uri: &cover.base_uri,
            needs_face_swap: cover.needs_face_swap,
            prompt: cover.prompt.as_deref(),
            negative_prompt: cover.negative_prompt.as_deref(),
            text_layers: &cover.text_layers,
            typography: cover.typography.as_ref().or(covers_typography),
        });
    }

    for page_num in stages::page_nums_for_stage(manifest, stage) {
        if let Some(page) = manifest.page_by_num(page_num) {
            items.push(WorkItem {
                page_num,
                base_uri: &page.base_uri,
                needs_face_swap: page.needs_face_swap,
                prompt: page.prompt.as_deref(),
                negative_prompt: page.negative_prompt.as_deref(),
                text_layers: &page.text_layers,
                typography: None,
            });
        }
    }

    items
}
