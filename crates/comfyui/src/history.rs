//! Typed view over the `GET /history/{prompt_id}` payload.
//!
//! ComfyUI returns `{"<prompt_id>": {"status": {...}, "outputs":
//! {"<node_id>": {"images": [...]}, ...}}}`. The entry is missing while
//! the prompt is still queued or executing, so "no entry" means "keep
//! polling".

use std::collections::BTreeMap;

use serde::Deserialize;

/// One completed (or failed) execution record.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: Option<HistoryStatus>,
    /// Per-node outputs, keyed by node ID. BTreeMap keeps iteration
    /// order deterministic for the first-available fallback.
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
}

/// Completion status of an execution.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub status_str: Option<String>,
}

/// Output of a single node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<OutputImage>,
}

/// Reference to one produced image, fetchable via `GET /view`.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputImage {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default, rename = "type")]
    pub folder_type: String,
}

impl HistoryEntry {
    /// Whether the execution has reached its completed state.
    ///
    /// Some ComfyUI builds omit the `status` block; the presence of any
    /// node output is then the completion signal.
    pub fn is_completed(&self) -> bool {
        match &self.status {
            Some(status) => status.completed,
            None => !self.outputs.is_empty(),
        }
    }
}

/// Extract the entry for `prompt_id` from a raw history payload.
///
/// Returns `Ok(None)` when the entry is not present yet, and an error
/// when the entry exists but does not have the expected shape.
pub fn parse_history(
    raw: &serde_json::Value,
    prompt_id: &str,
) -> Result<Option<HistoryEntry>, serde_json::Error> {
    match raw.get(prompt_id) {
        Some(entry) => serde_json::from_value(entry.clone()).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_payload() -> serde_json::Value {
        serde_json::json!({
            "p-1": {
                "status": { "completed": true, "status_str": "success" },
                "outputs": {
                    "9": { "images": [{ "filename": "raw_00001_.png", "subfolder": "", "type": "output" }] },
                    "52": { "images": [{ "filename": "up_00001_.png", "subfolder": "", "type": "output" }] }
                }
            }
        })
    }

    #[test]
    fn parses_completed_entry() {
        let entry = parse_history(&completed_payload(), "p-1").unwrap().unwrap();
        assert!(entry.is_completed());
        assert_eq!(entry.outputs.len(), 2);
        assert_eq!(entry.outputs["52"].images[0].filename, "up_00001_.png");
    }

    #[test]
    fn missing_entry_means_still_running() {
        let entry = parse_history(&completed_payload(), "p-2").unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn entry_without_status_completes_on_outputs() {
        let raw = serde_json::json!({
            "p-1": { "outputs": { "9": { "images": [] } } }
        });
        let entry = parse_history(&raw, "p-1").unwrap().unwrap();
        assert!(entry.is_completed());
    }

    #[test]
    fn incomplete_status_is_not_completed() {
        let raw = serde_json::json!({
            "p-1": { "status": { "completed": false }, "outputs": {} }
        });
        let entry = parse_history(&raw, "p-1").unwrap().unwrap();
        assert!(!entry.is_completed());
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let raw = serde_json::json!({ "p-1": { "outputs": "not-an-object" } });
        assert!(parse_history(&raw, "p-1").is_err());
    }
}
