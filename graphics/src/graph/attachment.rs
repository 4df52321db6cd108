//! Attachment and sampled-texture metadata carried by render passes.

use crate::graph::resource::ResourceHandle;
use crate::types::{ClearValue, ImageFormat};

/// Operation to perform when loading an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Clear the attachment with a specified value.
    Clear(ClearValue),
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    /// Create a clear operation with a depth value.
    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }
}

/// Operation to perform when storing an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

/// Load/store configuration of a single image attachment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttachmentInfo {
    /// Operation when loading the attachment.
    pub load_op: LoadOp,
    /// Operation when storing the attachment.
    pub store_op: StoreOp,
}

impl AttachmentInfo {
    /// Attachment that clears on load and stores on completion.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            load_op: LoadOp::clear_color(r, g, b, a),
            store_op: StoreOp::Store,
        }
    }

    /// Attachment that preserves previous contents.
    pub fn load() -> Self {
        Self {
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
        }
    }
}

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

/// Sampler state for a sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerInfo {
    /// Filtering when the texture is magnified.
    pub mag_filter: Filter,
    /// Filtering when the texture is minified.
    pub min_filter: Filter,
}

/// A texture sampled by a pass: sampler state plus the image view it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// Sampler state.
    pub sampler: SamplerInfo,
    /// The image resource backing the texture.
    pub image: ResourceHandle,
    /// View format for sampling.
    pub format: ImageFormat,
}

impl TextureInfo {
    /// Create a texture info with default (linear) sampling.
    pub fn new(image: ResourceHandle, format: ImageFormat) -> Self {
        Self {
            sampler: SamplerInfo::default(),
            image,
            format,
        }
    }
}
