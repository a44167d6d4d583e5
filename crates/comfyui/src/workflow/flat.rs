//! Flat keyed-node dialect.
//!
//! The document is a map of `{"<node_id>": {"class_type": ..., "inputs":
//! {...}}}` exactly as `POST /prompt` expects it. Nodes are located by
//! operation type; asset roles come from placeholder filenames and
//! prompt roles from the gendered-noun heuristic. Any ambiguity rejects
//! the template so the next dialect can try.

use std::collections::HashMap;

use storyloom_core::prompt::{infer_prompt_role, PromptRole};

use super::role::{resolve_asset_role, AssetRole};
use super::{
    op_of, patch_mask_channel, patch_region_strength, patch_sampler, patch_save, set_input,
    sorted_node_ids, AssetNames, DialectError, OpType, PatchParams,
};

pub(crate) fn try_patch(
    doc: &serde_json::Value,
    assets: &AssetNames,
    params: &PatchParams,
) -> Result<serde_json::Value, DialectError> {
    let map = doc
        .as_object()
        .ok_or_else(|| DialectError::Shape("document is not an object".to_string()))?;
    if map.is_empty() {
        return Err(DialectError::Shape("document has no nodes".to_string()));
    }
    for (id, node) in map {
        let well_formed = node.get("class_type").map(|v| v.is_string()).unwrap_or(false)
            && node.get("inputs").map(|v| v.is_object()).unwrap_or(false);
        if !well_formed {
            return Err(DialectError::Shape(format!("entry {id} is not a node")));
        }
    }

    let mut out = map.clone();
    let ids = sorted_node_ids(&out);

    patch_loaders(&mut out, &ids, assets)?;
    patch_encoders(&mut out, &ids, params)?;

    for id in &ids {
        let node = &mut out[id];
        match op_of(node) {
            Some(OpType::Sampler) | Some(OpType::SamplerAdvanced) => patch_sampler(node, params),
            Some(OpType::RegionApply) => patch_region_strength(node, params),
            Some(OpType::MaskFromChannel) => patch_mask_channel(node),
            Some(OpType::SaveImage) => patch_save(node, params),
            _ => {}
        }
    }

    Ok(serde_json::Value::Object(out))
}

/// Assign uploaded filenames to the template's image loaders.
///
/// Loaders whose placeholder filename names a role get that role;
/// leftovers are assigned photo-then-illustration in node-ID order. A
/// role claimed twice is ambiguous.
fn patch_loaders(
    out: &mut serde_json::Map<String, serde_json::Value>,
    ids: &[String],
    assets: &AssetNames,
) -> Result<(), DialectError> {
    let mut by_role: HashMap<AssetRole, String> = HashMap::new();
    let mut unresolved: Vec<String> = Vec::new();

    for id in ids {
        if op_of(&out[id]) != Some(OpType::LoadImage) {
            continue;
        }
        let placeholder = out[id]
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

    // Fill the remaining required roles in node-ID order.
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
        // A mask loader with no mask asset keeps its template default.
        if let Some(filename) = filename {
            set_input(&mut out[id], "image", serde_json::json!(filename));
        }
    }
    Ok(())
}

/// Patch the positive and negative text encoders.
///
/// The heuristic must single out exactly one encoder per role; templates
/// where it cannot (both sides read the same, or a text input is wired
/// to another node) fall through to the fixed-ID dialect.
fn patch_encoders(
    out: &mut serde_json::Map<String, serde_json::Value>,
    ids: &[String],
    params: &PatchParams,
) -> Result<(), DialectError> {
    let mut positive: Vec<String> = Vec::new();
    let mut negative: Vec<String> = Vec::new();

    for id in ids {
        if op_of(&out[id]) != Some(OpType::TextEncode) {
            continue;
        }
        let text = out[id]
            .get("inputs")
            .and_then(|i| i.get("text"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DialectError::Ambiguous(format!("encoder {id} has a non-literal text input"))
            })?;
        match infer_prompt_role(text) {
            PromptRole::Positive => positive.push(id.clone()),
            PromptRole::Negative => negative.push(id.clone()),
        }
    }

    match (positive.as_slice(), negative.as_slice()) {
        ([pos], [neg]) => {
            let (pos, neg) = (pos.clone(), neg.clone());
            set_input(&mut out[&pos], "text", serde_json::json!(params.positive));
            set_input(&mut out[&neg], "text", serde_json::json!(params.negative));
            Ok(())
        }
        ([], []) => Err(DialectError::MissingNode("no text encoders".to_string())),
        _ => Err(DialectError::Ambiguous(format!(
            "prompt roles did not split 1/1 ({} positive, {} negative)",
            positive.len(),
            negative.len()
        ))),
    }
}
