//! # Amaranth Graphics
//!
//! Frame-scoped render graph for the Amaranth renderer.
//!
//! The user declares [`RenderPass`]es with explicit resource declarations,
//! stages them in a [`RenderModule`], and hands them to the [`RenderGraph`],
//! which resolves dependencies by resource identity, prunes passes that do
//! not contribute to a root, and records the frame through the
//! [`backend::RenderBackend`] contract.

pub mod backend;
pub mod graph;
pub mod types;

pub use backend::{
    AllocatorHandle, BackendError, BackendResult, CommandEncoder, PipelineCacheHandle,
    RenderBackend,
};
pub use graph::{
    AttachmentInfo, BufferInfo, BufferUsage, Filter, ImageInfo, ImageUsage, LoadOp, PassKind,
    RenderGraph, RenderModule, RenderPass, ResourceHandle, ResourceHandleFlags, ResourceInfo,
    ResourceKind, SamplerInfo, StoreOp, TextureInfo,
};
pub use types::{
    ClearValue, Extent2d, Extent3d, ImageFormat, ImageTiling, ImageType, ScissorRect, Viewport,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
