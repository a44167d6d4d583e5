//! Graph dialect: visual-editor exports.
//!
//! An editor export is `{"nodes": [...], "links": [...]}` where each
//! node carries its widget values positionally and links are
//! `[link_id, src_node, src_slot, dst_node, dst_slot, type]` tuples.
//! The compiler lowers this to the flat keyed-node shape: positional
//! widgets become named inputs via the per-operation widget tables, and
//! links become `["<src_id>", <slot>]` references.
//!
//! Prompt roles are resolved structurally here: the encoder wired into a
//! sampler's `positive` input IS the positive encoder, whatever its text
//! says. The gendered-noun heuristic is never consulted.

use std::collections::HashMap;

use serde::Deserialize;

use super::role::{resolve_asset_role, AssetRole};
use super::{
    op_of, patch_mask_channel, patch_region_strength, patch_sampler, patch_save, set_input,
    sorted_node_ids, AssetNames, DialectError, OpType, PatchParams,
};

#[derive(Debug, Deserialize)]
struct EditorNode {
    id: i64,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    inputs: Vec<EditorInput>,
    #[serde(default)]
    widgets_values: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EditorInput {
    name: String,
    #[serde(default)]
    link: Option<i64>,
}

pub(crate) fn try_patch(
    doc: &serde_json::Value,
    assets: &AssetNames,
    params: &PatchParams,
) -> Result<serde_json::Value, DialectError> {
    let (nodes, links) = match (doc.get("nodes"), doc.get("links")) {
        (Some(n), Some(l)) if n.is_array() && l.is_array() => (n, l),
        _ => {
            return Err(DialectError::Shape(
                "document is not a {nodes, links} export".to_string(),
            ))
        }
    };

    let mut flat = compile(nodes, links)?;
    let ids = sorted_node_ids(&flat);

    patch_loaders(&mut flat, &ids, assets)?;
    patch_encoders(&mut flat, &ids, params)?;

    for id in &ids {
        let node = &mut flat[id];
        match op_of(node) {
            Some(OpType::Sampler) | Some(OpType::SamplerAdvanced) => patch_sampler(node, params),
            Some(OpType::RegionApply) => patch_region_strength(node, params),
            Some(OpType::MaskFromChannel) => patch_mask_channel(node),
            Some(OpType::SaveImage) => patch_save(node, params),
            _ => {}
        }
    }

    Ok(serde_json::Value::Object(flat))
}

// ---------------------------------------------------------------------------
// Lowering
// ---------------------------------------------------------------------------

/// Compile the editor export into the flat `POST /prompt` shape.
fn compile(
    nodes: &serde_json::Value,
    links: &serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, DialectError> {
    // link_id -> (source node, source slot)
    let mut sources: HashMap<i64, (i64, i64)> = HashMap::new();
    for link in links.as_array().into_iter().flatten() {
        let parts = link
            .as_array()
            .filter(|a| a.len() >= 5)
            .ok_or_else(|| DialectError::Shape("malformed link tuple".to_string()))?;
        let nums: Vec<i64> = parts.iter().take(5).filter_map(|v| v.as_i64()).collect();
        if nums.len() < 5 {
            return Err(DialectError::Shape("malformed link tuple".to_string()));
        }
        sources.insert(nums[0], (nums[1], nums[2]));
    }

    let mut flat = serde_json::Map::new();
    for raw in nodes.as_array().into_iter().flatten() {
        let node: EditorNode = serde_json::from_value(raw.clone())
            .map_err(|e| DialectError::Shape(format!("malformed node: {e}")))?;
        if node.node_type == "Note" {
            continue;
        }

        let mut inputs = serde_json::Map::new();

        // Positional widgets become named inputs.
        if let (Some(op), Some(values)) = (
            OpType::from_class_type(&node.node_type),
            node.widgets_values.as_array(),
        ) {
            for (name, value) in op.widget_names().iter().zip(values) {
                if !OpType::is_editor_only_widget(name) {
                    inputs.insert(name.to_string(), value.clone());
                }
            }
        }

        // Wired inputs become ["<src_id>", <slot>] references.
        for input in &node.inputs {
            if let Some(link_id) = input.link {
                let (src, slot) = *sources.get(&link_id).ok_or_else(|| {
                    DialectError::Shape(format!("node {} references unknown link", node.id))
                })?;
                inputs.insert(
                    input.name.clone(),
                    serde_json::json!([src.to_string(), slot]),
                );
            }
        }

        flat.insert(
            node.id.to_string(),
            serde_json::json!({ "class_type": node.node_type, "inputs": inputs }),
        );
    }

    if flat.is_empty() {
        return Err(DialectError::Shape("export has no nodes".to_string()));
    }
    Ok(flat)
}

// ---------------------------------------------------------------------------
// Role resolution over the compiled graph
// ---------------------------------------------------------------------------

/// Same filename heuristic as the flat dialect, applied post-lowering.
fn patch_loaders(
    flat: &mut serde_json::Map<String, serde_json::Value>,
    ids: &[String],
    assets: &AssetNames,
) -> Result<(), DialectError> {
    let mut by_role: HashMap<AssetRole, String> = HashMap::new();
    let mut unresolved: Vec<String> = Vec::new();

    for id in ids {
        if op_of(&flat[id]) != Some(OpType::LoadImage) {
            continue;
        }
        let placeholder = flat[id]
            .get("inputs")
            .and_then(|i| i.get("image"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        match resolve_asset_role(placeholder) {
            Some(role) => {
                if by_role.insert(role, id.clone()).is_some() {
                    return Err(DialectError::Ambiguous(format!(
                        "two loaders claim the {} role",
                        role.as_str()
                    )));
                }
            }
            None => unresolved.push(id.clone()),
        }
    }

    let mut leftovers = unresolved.into_iter();
    for role in [AssetRole::Photo, AssetRole::Illustration] {
        if !by_role.contains_key(&role) {
            match leftovers.next() {
                Some(id) => {
                    by_role.insert(role, id);
                }
                None => {
                    return Err(DialectError::MissingNode(format!(
                        "no loader for the {} role",
                        role.as_str()
                    )))
                }
            }
        }
    }
    if assets.mask.is_some() && !by_role.contains_key(&AssetRole::Mask) {
        if let Some(id) = leftovers.next() {
            by_role.insert(AssetRole::Mask, id);
        }
    }

    for (role, id) in &by_role {
        let filename = match role {
            AssetRole::Photo => Some(assets.photo.as_str()),
            AssetRole::Illustration => Some(assets.illustration.as_str()),
            AssetRole::Mask => assets.mask.as_deref(),
        };
        if let Some(filename) = filename {
            set_input(&mut flat[id], "image", serde_json::json!(filename));
        }
    }
    Ok(())
}

/// Follow each sampler's `positive`/`negative` wire back to its text
/// encoder and patch the prompt there.
fn patch_encoders(
    flat: &mut serde_json::Map<String, serde_json::Value>,
    ids: &[String],
    params: &PatchParams,
) -> Result<(), DialectError> {
    let mut positive: Vec<String> = Vec::new();
    let mut negative: Vec<String> = Vec::new();

    for id in ids {
        let node = &flat[id];
        if !matches!(
            op_of(node),
            Some(OpType::Sampler) | Some(OpType::SamplerAdvanced)
        ) {
            continue;
        }
        for (input, bucket) in [("positive", &mut positive), ("negative", &mut negative)] {
            let wire = node.get("inputs").and_then(|i| i.get(input)).ok_or_else(|| {
                DialectError::MissingNode(format!("sampler {id} has no {input} wire"))
            })?;
            let encoder = resolve_encoder(flat, wire).ok_or_else(|| {
                DialectError::Ambiguous(format!(
                    "sampler {id} {input} wire does not reach a text encoder"
                ))
            })?;
            if !bucket.contains(&encoder) {
                bucket.push(encoder);
            }
        }
    }

    if positive.is_empty() {
        return Err(DialectError::MissingNode("no sampler node".to_string()));
    }
    for id in &positive {
        set_input(&mut flat[id], "text", serde_json::json!(params.positive));
    }
    for id in &negative {
        set_input(&mut flat[id], "text", serde_json::json!(params.negative));
    }
    Ok(())
}

/// Walk a conditioning wire back to its originating text encoder.
///
/// Conditioning may pass through intermediate nodes (region apply,
/// combine); a short hop limit keeps cyclic exports from looping.
fn resolve_encoder(
    flat: &serde_json::Map<String, serde_json::Value>,
    wire: &serde_json::Value,
) -> Option<String> {
    let mut current = wire_source(wire)?;
    for _ in 0..4 {
        let node = flat.get(&current)?;
        if op_of(node) == Some(OpType::TextEncode) {
            return Some(current);
        }
        let next = node.get("inputs")?.get("conditioning")?;
        current = wire_source(next)?;
    }
    None
}

fn wire_source(wire: &serde_json::Value) -> Option<String> {
    wire.as_array()?.first()?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets() -> AssetNames {
        AssetNames {
            photo: "photo_up.png".to_string(),
            illustration: "illu_up.png".to_string(),
            mask: Some("mask_up.png".to_string()),
        }
    }

    fn params() -> PatchParams {
        PatchParams {
            positive: "girl on a swing".to_string(),
            negative: "low quality, bad face, distorted".to_string(),
            seed: 77,
            intensity: 1.0,
            output_prefix: "out/page_11".to_string(),
        }
    }

    // A small editor export. Both encoders carry positive-sounding text;
    // only the wiring distinguishes them.
    fn export() -> serde_json::Value {
        serde_json::json!({
            "last_node_id": 9,
            "last_link_id": 8,
            "nodes": [
                { "id": 1, "type": "LoadImage", "widgets_values": ["child_photo.png", "image"] },
                { "id": 2, "type": "LoadImage", "widgets_values": ["base_page.png", "image"] },
                { "id": 3, "type": "CLIPTextEncode", "widgets_values": ["a girl, storybook style"],
                  "inputs": [{ "name": "clip", "type": "CLIP", "link": 1 }] },
                { "id": 4, "type": "CLIPTextEncode", "widgets_values": ["a cute child drawing"],
                  "inputs": [{ "name": "clip", "type": "CLIP", "link": 2 }] },
                { "id": 5, "type": "CheckpointLoaderSimple", "widgets_values": ["dream.safetensors"] },
                { "id": 6, "type": "KSampler",
                  "widgets_values": [5, "randomize", 20, 7.5, "euler", "normal", 0.6],
                  "inputs": [
                    { "name": "model", "type": "MODEL", "link": 3 },
                    { "name": "positive", "type": "CONDITIONING", "link": 4 },
                    { "name": "negative", "type": "CONDITIONING", "link": 5 },
                    { "name": "latent_image", "type": "LATENT", "link": 6 }
                  ] },
                { "id": 7, "type": "VAEEncode",
                  "inputs": [{ "name": "pixels", "type": "IMAGE", "link": 7 }] },
                { "id": 8, "type": "VAEDecode",
                  "inputs": [{ "name": "samples", "type": "LATENT", "link": 8 }] },
                { "id": 9, "type": "SaveImage", "widgets_values": ["ComfyUI"],
                  "inputs": [{ "name": "images", "type": "IMAGE", "link": 9 }] },
                { "id": 10, "type": "Note", "widgets_values": ["authoring notes"] }
            ],
            "links": [
                [1, 5, 1, 3, 0, "CLIP"],
                [2, 5, 1, 4, 0, "CLIP"],
                [3, 5, 0, 6, 0, "MODEL"],
                [4, 3, 0, 6, 1, "CONDITIONING"],
                [5, 4, 0, 6, 2, "CONDITIONING"],
                [6, 7, 0, 6, 3, "LATENT"],
                [7, 2, 0, 7, 0, "IMAGE"],
                [8, 6, 0, 8, 0, "LATENT"],
                [9, 8, 0, 9, 0, "IMAGE"]
            ]
        })
    }

    #[test]
    fn compiles_widgets_and_links_to_flat_shape() {
        let no_mask = AssetNames { mask: None, ..assets() };
        let patched = try_patch(&export(), &no_mask, &params()).unwrap();

        // Widgets lowered by name, editor-only slots dropped.
        assert_eq!(patched["6"]["inputs"]["steps"], 20);
        assert!(patched["6"]["inputs"].get("control_after_generate").is_none());
        assert!(patched["1"]["inputs"].get("upload").is_none());
        // Links lowered to ["src", slot].
        assert_eq!(patched["6"]["inputs"]["model"], serde_json::json!(["5", 0]));
        assert_eq!(patched["8"]["inputs"]["samples"], serde_json::json!(["6", 0]));
        // Note nodes do not survive lowering.
        assert!(patched.get("10").is_none());
    }

    #[test]
    fn prompt_roles_come_from_wiring_not_text() {
        // Encoder 4 sounds positive but is wired to the negative input.
        let no_mask = AssetNames { mask: None, ..assets() };
        let patched = try_patch(&export(), &no_mask, &params()).unwrap();
        assert_eq!(patched["3"]["inputs"]["text"], "girl on a swing");
        assert_eq!(
            patched["4"]["inputs"]["text"],
            "low quality, bad face, distorted"
        );
    }

    #[test]
    fn patches_loaders_seed_and_save() {
        let no_mask = AssetNames { mask: None, ..assets() };
        let patched = try_patch(&export(), &no_mask, &params()).unwrap();
        assert_eq!(patched["1"]["inputs"]["image"], "photo_up.png");
        assert_eq!(patched["2"]["inputs"]["image"], "illu_up.png");
        assert_eq!(patched["6"]["inputs"]["seed"], 77);
        assert_eq!(patched["9"]["inputs"]["filename_prefix"], "out/page_11");
    }

    #[test]
    fn chain_routes_editor_exports_here() {
        let raw = export().to_string();
        let no_mask = AssetNames { mask: None, ..assets() };
        let patched = super::super::patch_template(&raw, &no_mask, &params()).unwrap();
        assert_eq!(patched["3"]["inputs"]["text"], "girl on a swing");
    }

    #[test]
    fn sampler_without_prompt_wires_is_rejected() {
        let mut doc = export();
        doc["links"].as_array_mut().unwrap().retain(|l| l[0] != 4);
        doc["nodes"][5]["inputs"]
            .as_array_mut()
            .unwrap()
            .retain(|i| i["name"] != "positive");
        let err = try_patch(&doc, &assets(), &params()).unwrap_err();
        assert!(matches!(err, DialectError::MissingNode(_)));
    }

    #[test]
    fn unknown_link_reference_rejects_shape() {
        let mut doc = export();
        doc["links"].as_array_mut().unwrap().remove(0);
        let err = try_patch(&doc, &assets(), &params()).unwrap_err();
        assert!(matches!(err, DialectError::Shape(_)));
    }
}
