//! Fixed-ID dialect.
//!
//! Same node shape as the flat dialect plus a `fixed_node_ids` side
//! table mapping role names to node IDs, e.g.:
//!
//! ```json
//! {
//!   "fixed_node_ids": { "photo": "1", "positive": "5", ... },
//!   "1": { "class_type": "LoadImage", "inputs": { ... } },
//!   ...
//! }
//! ```
//!
//! Templates carry this table when heuristic matching misfires for
//! them. The IDs are authoritative; no inference happens here. The side
//! table is stripped before submission.

use std::collections::HashSet;

use super::{
    op_of, patch_mask_channel, patch_region_strength, patch_sampler, patch_save, set_input,
    sorted_node_ids, AssetNames, DialectError, OpType, PatchParams,
};

/// Key of the side table inside the template document.
pub const FIXED_IDS_KEY: &str = "fixed_node_ids";

pub(crate) fn try_patch(
    doc: &serde_json::Value,
    assets: &AssetNames,
    params: &PatchParams,
) -> Result<serde_json::Value, DialectError> {
    let map = doc
        .as_object()
        .ok_or_else(|| DialectError::Shape("document is not an object".to_string()))?;
    let table = map
        .get(FIXED_IDS_KEY)
        .ok_or_else(|| DialectError::Shape(format!("no {FIXED_IDS_KEY} table")))?
        .as_object()
        .ok_or_else(|| DialectError::Shape(format!("{FIXED_IDS_KEY} is not an object")))?
        .clone();

    let mut out = map.clone();
    out.remove(FIXED_IDS_KEY);
    // Owned key snapshot; the closure checks membership against it so
    // the patches below can take `&mut out`.
    let node_keys: HashSet<String> = out.keys().cloned().collect();

    let node_id = |role: &str| -> Result<Option<String>, DialectError> {
        match table.get(role) {
            None => Ok(None),
            Some(v) => {
                let id = v
                    .as_str()
                    .ok_or_else(|| DialectError::Shape(format!("{role} id is not a string")))?;
                if !node_keys.contains(id) {
                    return Err(DialectError::MissingNode(format!(
                        "{role} points at absent node {id}"
                    )));
                }
                Ok(Some(id.to_string()))
            }
        }
    };
    let required = |role: &str| -> Result<String, DialectError> {
        node_id(role)?.ok_or_else(|| DialectError::MissingNode(format!("{role} id not declared")))
    };

    let photo = required("photo")?;
    let illustration = required("illustration")?;
    let positive = required("positive")?;
    let negative = required("negative")?;

    set_input(&mut out[&photo], "image", serde_json::json!(assets.photo));
    set_input(
        &mut out[&illustration],
        "image",
        serde_json::json!(assets.illustration),
    );
    if let (Some(id), Some(mask)) = (node_id("mask")?, assets.mask.as_deref()) {
        set_input(&mut out[&id], "image", serde_json::json!(mask));
    }
    set_input(&mut out[&positive], "text", serde_json::json!(params.positive));
    set_input(&mut out[&negative], "text", serde_json::json!(params.negative));

    if let Some(id) = node_id("sampler")? {
        patch_sampler(&mut out[&id], params);
    }
    if let Some(id) = node_id("region")? {
        patch_region_strength(&mut out[&id], params);
    }
    if let Some(id) = node_id("mask_channel")? {
        patch_mask_channel(&mut out[&id]);
    }
    if let Some(id) = node_id("save")? {
        patch_save(&mut out[&id], params);
    }

    // Roles the table leaves out are still patched by operation type, so
    // a table only has to name the contested nodes.
    let table_ids: Vec<&str> = table.values().filter_map(|v| v.as_str()).collect();
    for id in sorted_node_ids(&out) {
        if table_ids.contains(&id.as_str()) {
            continue;
        }
        let node = &mut out[&id];
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
