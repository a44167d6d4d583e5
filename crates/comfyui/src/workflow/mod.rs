//! Workflow template engine.
//!
//! Translates a [`GenerationRequest`](crate::request::GenerationRequest)
//! plus a raw template document into a flat keyed-node graph ready for
//! `POST /prompt`. Three template dialects are supported, tried in
//! priority order; the first one that parses and patches wins:
//!
//! 1. [`flat`]: flat keyed-node map, nodes located by operation type,
//!    asset roles and prompt roles inferred heuristically.
//! 2. [`fixed`]: same node shape plus a `fixed_node_ids` side table
//!    addressing nodes by explicit, template-specific IDs. Used when
//!    heuristic matching is ambiguous for a template.
//! 3. [`graph`]: a `{nodes, links}` visual-editor export, compiled to
//!    the flat shape and patched through a per-operation rule table.
//!
//! If no dialect is usable the engine fails with
//! [`WorkflowError::TemplateUnusable`]; that is a template defect, never
//! retried as a transient failure.

pub mod fixed;
pub mod flat;
pub mod graph;
pub mod op;
pub mod role;

use op::OpType;

/// Server-assigned filenames of the uploaded assets.
#[derive(Debug, Clone)]
pub struct AssetNames {
    pub photo: String,
    pub illustration: String,
    pub mask: Option<String>,
}

/// Concrete patch values for one attempt.
#[derive(Debug, Clone)]
pub struct PatchParams {
    pub positive: String,
    pub negative: String,
    /// Resolved seed (randomized upstream when the request carries none).
    pub seed: i64,
    /// Global intensity multiplier applied to strength-like sampler and
    /// region parameters. 1.0 leaves the template's tuning untouched.
    pub intensity: f64,
    /// `filename_prefix` for the template's save nodes.
    pub output_prefix: String,
}

/// Failure of the whole engine: no dialect could use the template.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Template unusable: {0}")]
    TemplateUnusable(String),
}

/// Why one dialect rejected a template. Collected across dialects into
/// the final [`WorkflowError`].
#[derive(Debug, thiserror::Error)]
pub enum DialectError {
    /// The document does not have this dialect's shape.
    #[error("shape mismatch: {0}")]
    Shape(String),

    /// The shape matched but a required node could not be located.
    #[error("required node missing: {0}")]
    MissingNode(String),

    /// Heuristic matching produced no unique answer.
    #[error("ambiguous match: {0}")]
    Ambiguous(String),
}

/// Patch a raw template document into a submittable flat graph.
pub fn patch_template(
    raw: &str,
    assets: &AssetNames,
    params: &PatchParams,
) -> Result<serde_json::Value, WorkflowError> {
    let doc: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| WorkflowError::TemplateUnusable(format!("invalid JSON: {e}")))?;

    let mut reasons = Vec::new();
    for (name, attempt) in [
        ("flat", flat::try_patch(&doc, assets, params)),
        ("fixed", fixed::try_patch(&doc, assets, params)),
        ("graph", graph::try_patch(&doc, assets, params)),
    ] {
        match attempt {
            Ok(patched) => return Ok(patched),
            Err(e) => reasons.push(format!("{name}: {e}")),
        }
    }
    Err(WorkflowError::TemplateUnusable(reasons.join("; ")))
}

// ---------------------------------------------------------------------------
// Shared patching primitives over the flat keyed-node shape
// ---------------------------------------------------------------------------

/// Node IDs of a flat graph, numerically sorted where possible so that
/// fallback role assignment is deterministic.
pub(crate) fn sorted_node_ids(map: &serde_json::Map<String, serde_json::Value>) -> Vec<String> {
    let mut ids: Vec<String> = map.keys().cloned().collect();
    ids.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    });
    ids
}

/// The `class_type` of a flat node, if well-formed.
pub(crate) fn class_of(node: &serde_json::Value) -> Option<&str> {
    node.get("class_type").and_then(|v| v.as_str())
}

/// The operation type of a flat node, if recognized.
pub(crate) fn op_of(node: &serde_json::Value) -> Option<OpType> {
    class_of(node).and_then(OpType::from_class_type)
}

/// Mutable access to a flat node's `inputs` object.
pub(crate) fn inputs_mut(
    node: &mut serde_json::Value,
) -> Option<&mut serde_json::Map<String, serde_json::Value>> {
    node.get_mut("inputs").and_then(|v| v.as_object_mut())
}

/// Set one input on a flat node. Missing `inputs` objects are created.
pub(crate) fn set_input(node: &mut serde_json::Value, key: &str, value: serde_json::Value) {
    if let Some(obj) = node.as_object_mut() {
        let inputs = obj
            .entry("inputs")
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let Some(inputs) = inputs.as_object_mut() {
            inputs.insert(key.to_string(), value);
        }
    }
}

/// Patch sampler parameters: fixed seed, and intensity-scaled strength
/// parameters (`denoise` clamped to 1.0, `cfg` scaled directly).
pub(crate) fn patch_sampler(node: &mut serde_json::Value, params: &PatchParams) {
    let seed_key = match op_of(node) {
        Some(OpType::SamplerAdvanced) => "noise_seed",
        _ => "seed",
    };
    set_input(node, seed_key, serde_json::json!(params.seed));
    scale_numeric_input(node, "denoise", params.intensity, Some(1.0));
    scale_numeric_input(node, "cfg", params.intensity, None);
}

/// Patch region-application strength by the intensity multiplier.
pub(crate) fn patch_region_strength(node: &mut serde_json::Value, params: &PatchParams) {
    scale_numeric_input(node, "weight", params.intensity, None);
    scale_numeric_input(node, "strength", params.intensity, None);
}

/// Force the mask-channel select to read the red channel. Masks are
/// handed over as three-channel images; the graph reads exactly one
/// channel of them.
pub(crate) fn patch_mask_channel(node: &mut serde_json::Value) {
    set_input(node, "channel", serde_json::json!("red"));
}

/// Point a save node's output naming at our prefix.
pub(crate) fn patch_save(node: &mut serde_json::Value, params: &PatchParams) {
    set_input(
        node,
        "filename_prefix",
        serde_json::json!(params.output_prefix),
    );
}

/// Multiply a numeric input in place, optionally clamped from above.
/// Inputs that are absent or non-numeric (e.g. node links) are left
/// untouched.
fn scale_numeric_input(node: &mut serde_json::Value, key: &str, factor: f64, max: Option<f64>) {
    if let Some(inputs) = inputs_mut(node) {
        if let Some(value) = inputs.get(key).and_then(|v| v.as_f64()) {
            let mut scaled = value * factor;
            if let Some(max) = max {
                scaled = scaled.min(max);
            }
            inputs.insert(key.to_string(), serde_json::json!(scaled));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PatchParams {
        PatchParams {
            positive: "girl in a garden".to_string(),
            negative: "low quality".to_string(),
            seed: 1234,
            intensity: 1.0,
            output_prefix: "storyloom".to_string(),
        }
    }

    fn assets() -> AssetNames {
        AssetNames {
            photo: "photo_up.png".to_string(),
            illustration: "page_up.png".to_string(),
            mask: None,
        }
    }

    #[test]
    fn invalid_json_is_template_unusable() {
        let err = patch_template("{nope", &assets(), &params()).unwrap_err();
        assert!(matches!(err, WorkflowError::TemplateUnusable(_)));
    }

    #[test]
    fn no_dialect_matches_reports_all_reasons() {
        let err = patch_template(r#"{"just": "data"}"#, &assets(), &params()).unwrap_err();
        let WorkflowError::TemplateUnusable(msg) = err;
        assert!(msg.contains("flat:"));
        assert!(msg.contains("fixed:"));
        assert!(msg.contains("graph:"));
    }

    #[test]
    fn sampler_scaling_clamps_denoise() {
        let mut node = serde_json::json!({
            "class_type": "KSampler",
            "inputs": { "seed": 1, "denoise": 0.8, "cfg": 6.0 }
        });
        let p = PatchParams {
            intensity: 1.5,
            ..params()
        };
        patch_sampler(&mut node, &p);
        let inputs = node.get("inputs").unwrap();
        assert_eq!(inputs["seed"], serde_json::json!(1234));
        assert_eq!(inputs["denoise"], serde_json::json!(1.0));
        assert_eq!(inputs["cfg"], serde_json::json!(9.0));
    }

    #[test]
    fn scaling_skips_linked_inputs() {
        // "cfg" wired to another node must not be clobbered.
        let mut node = serde_json::json!({
            "class_type": "KSampler",
            "inputs": { "cfg": ["14", 0], "denoise": 0.5 }
        });
        patch_sampler(&mut node, &params());
        assert_eq!(node["inputs"]["cfg"], serde_json::json!(["14", 0]));
    }

    #[test]
    fn sorted_ids_are_numeric_aware() {
        let map: serde_json::Map<String, serde_json::Value> = ["10", "2", "1"]
            .into_iter()
            .map(|k| (k.to_string(), serde_json::Value::Null))
            .collect();
        assert_eq!(sorted_node_ids(&map), vec!["1", "2", "10"]);
    }
}
