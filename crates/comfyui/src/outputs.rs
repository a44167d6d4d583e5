//! Selection of the preferred output image from a completed execution.

use crate::history::{HistoryEntry, OutputImage};

/// The two candidate save nodes a template is expected to end in.
#[derive(Debug, Clone)]
pub struct OutputPreference {
    /// Node ID of the upscaled save node (preferred).
    pub upscaled_node_id: String,
    /// Node ID of the raw save node.
    pub raw_node_id: String,
}

impl Default for OutputPreference {
    fn default() -> Self {
        Self {
            upscaled_node_id: "52".to_string(),
            raw_node_id: "9".to_string(),
        }
    }
}

/// Pick the output image to fetch: the upscaled variant if present, then
/// the raw variant, then the first available output of any node.
///
/// Returns `None` only when the execution produced no images at all.
pub fn select_output<'a>(
    entry: &'a HistoryEntry,
    preference: &OutputPreference,
) -> Option<&'a OutputImage> {
    for node_id in [&preference.upscaled_node_id, &preference.raw_node_id] {
        if let Some(image) = entry
            .outputs
            .get(node_id)
            .and_then(|out| out.images.first())
        {
            return Some(image);
        }
    }
    entry
        .outputs
        .values()
        .find_map(|out| out.images.first())
}
