//! Operation vocabulary shared by all template dialects.
//!
//! Each variant corresponds to one or more ComfyUI `class_type` strings.
//! The widget tables drive the graph-dialect compiler, which must map
//! positional `widgets_values` arrays back to named inputs.

/// Recognized node operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    /// Loads an uploaded image into the graph.
    LoadImage,
    /// Encodes a prompt string into conditioning.
    TextEncode,
    /// Loads the base checkpoint.
    CheckpointLoader,
    /// Applies a LoRA on top of the checkpoint.
    LoraLoader,
    /// Diffusion sampler.
    Sampler,
    /// Two-stage diffusion sampler with a separate noise seed.
    SamplerAdvanced,
    /// Applies reference-image conditioning to a masked region.
    RegionApply,
    /// Selects one channel of an image as a mask.
    MaskFromChannel,
    /// Blurs a mask.
    MaskBlur,
    /// Blurs an image.
    ImageBlur,
    /// Loads an upscaling model.
    UpscaleModelLoader,
    /// Runs the upscaling model over an image.
    UpscaleWithModel,
    /// Plain image resize.
    ImageScale,
    /// Encodes pixels into the latent space.
    VaeEncode,
    /// Decodes latents back to pixels.
    VaeDecode,
    /// Writes an output image.
    SaveImage,
    /// Composites one image over another through a mask.
    Composite,
}

impl OpType {
    /// Map a `class_type` string to its operation, if recognized.
    pub fn from_class_type(class_type: &str) -> Option<OpType> {
        let op = match class_type {
            "LoadImage" => OpType::LoadImage,
            "CLIPTextEncode" => OpType::TextEncode,
            "CheckpointLoaderSimple" => OpType::CheckpointLoader,
            "LoraLoader" => OpType::LoraLoader,
            "KSampler" => OpType::Sampler,
            "KSamplerAdvanced" => OpType::SamplerAdvanced,
            "IPAdapter" | "IPAdapterAdvanced" => OpType::RegionApply,
            "ImageToMask" => OpType::MaskFromChannel,
            "MaskBlur" => OpType::MaskBlur,
            "ImageBlur" => OpType::ImageBlur,
            "UpscaleModelLoader" => OpType::UpscaleModelLoader,
            "ImageUpscaleWithModel" => OpType::UpscaleWithModel,
            "ImageScale" | "ImageScaleBy" => OpType::ImageScale,
            "VAEEncode" | "VAEEncodeForInpaint" => OpType::VaeEncode,
            "VAEDecode" => OpType::VaeDecode,
            "SaveImage" => OpType::SaveImage,
            "ImageCompositeMasked" => OpType::Composite,
            _ => return None,
        };
        Some(op)
    }

    /// Positional widget names for the graph-dialect compiler.
    ///
    /// The order matches the node's `widgets_values` array in editor
    /// exports. An empty slice means the node carries no widgets.
    pub fn widget_names(self) -> &'static [&'static str] {
        match self {
            OpType::LoadImage => &["image", "upload"],
            OpType::TextEncode => &["text"],
            OpType::CheckpointLoader => &["ckpt_name"],
            OpType::LoraLoader => &["lora_name", "strength_model", "strength_clip"],
            OpType::Sampler => &[
                "seed",
                "control_after_generate",
                "steps",
                "cfg",
                "sampler_name",
                "scheduler",
                "denoise",
            ],
            OpType::SamplerAdvanced => &[
                "add_noise",
                "noise_seed",
                "control_after_generate",
                "steps",
                "cfg",
                "sampler_name",
                "scheduler",
                "start_at_step",
                "end_at_step",
                "return_with_leftover_noise",
            ],
            OpType::RegionApply => &[
                "weight",
                "weight_type",
                "combine_embeds",
                "start_at",
                "end_at",
                "embeds_scaling",
            ],
            OpType::MaskFromChannel => &["channel"],
            OpType::MaskBlur => &["amount", "device"],
            OpType::ImageBlur => &["blur_radius", "sigma"],
            OpType::UpscaleModelLoader => &["model_name"],
            OpType::UpscaleWithModel => &[],
            OpType::ImageScale => &["upscale_method", "width", "height", "crop"],
            OpType::VaeEncode => &[],
            OpType::VaeDecode => &[],
            OpType::SaveImage => &["filename_prefix"],
            OpType::Composite => &["x", "y", "resize_source"],
        }
    }

    /// Editor-only widgets that must not appear in the submitted flat
    /// graph. ComfyUI's `/prompt` endpoint does not know them.
    pub fn is_editor_only_widget(name: &str) -> bool {
        matches!(name, "control_after_generate" | "upload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_type_mapping_covers_aliases() {
        assert_eq!(
            OpType::from_class_type("IPAdapterAdvanced"),
            Some(OpType::RegionApply)
        );
        assert_eq!(
            OpType::from_class_type("VAEEncodeForInpaint"),
            Some(OpType::VaeEncode)
        );
        assert_eq!(OpType::from_class_type("TotallyCustomNode"), None);
    }

    #[test]
    fn sampler_widgets_name_seed_first() {
        assert_eq!(OpType::Sampler.widget_names()[0], "seed");
        assert_eq!(OpType::SamplerAdvanced.widget_names()[1], "noise_seed");
    }

    #[test]
    fn editor_only_widgets_are_filtered() {
        assert!(OpType::is_editor_only_widget("control_after_generate"));
        assert!(OpType::is_editor_only_widget("upload"));
        assert!(!OpType::is_editor_only_widget("seed"));
    }
}
