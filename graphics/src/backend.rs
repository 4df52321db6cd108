//! Backend contract consumed by the render graph.
//!
//! The graph never talks to a GPU API directly. During execution it asks a
//! [`RenderBackend`] for per-frame allocators, the pipeline cache and the
//! swapchain extent, and records pass output through [`CommandEncoder`]
//! objects created by the backend. Everything behind these traits (command
//! buffers, memory, swapchain) is owned by the backend implementation.

use thiserror::Error;

use crate::types::{Extent2d, ScissorRect, Viewport};

/// Backend error type.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to acquire transient allocators: {0}")]
    AllocatorAcquisitionFailed(String),
    #[error("failed to acquire staging allocator: {0}")]
    StagingAllocatorFailed(String),
    #[error("pipeline cache unavailable: {0}")]
    PipelineCacheUnavailable(String),
    #[error("failed to create command encoder: {0}")]
    EncoderCreationFailed(String),
    #[error("out of memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a backend transient allocator.
///
/// Allocators are valid for a single frame; the graph hands each executing
/// pass an unused one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocatorHandle(u64);

impl AllocatorHandle {
    /// Create a handle from a backend-defined raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The backend-defined raw value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Handle to the backend pipeline cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineCacheHandle(u64);

impl PipelineCacheHandle {
    /// Create a handle from a backend-defined raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The backend-defined raw value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Records GPU commands for a single render pass.
///
/// An encoder is created by the backend, owned by its pass after execution,
/// and may be taken over exactly once by the submission path via
/// [`RenderPass::steal_encoder`](crate::graph::RenderPass::steal_encoder).
/// Dropping an encoder releases its recording resources.
pub trait CommandEncoder {
    /// Set scissor rectangles starting at `first`.
    fn set_scissor(&mut self, first: u32, rects: &[ScissorRect]);

    /// Set viewports starting at `first`.
    fn set_viewport(&mut self, first: u32, viewports: &[Viewport]);

    /// The extent this encoder was created with.
    fn extent(&self) -> Extent2d;
}

/// Interface the render graph consumes to execute a frame.
pub trait RenderBackend {
    /// Acquire `count` transient allocators for the given frame, one per
    /// executing pass. Allocators come from the frame's own pool.
    fn transient_allocators(
        &mut self,
        frame_index: u64,
        count: usize,
    ) -> BackendResult<Vec<AllocatorHandle>>;

    /// Acquire the staging allocator for the given frame.
    fn staging_allocator(&mut self, frame_index: u64) -> BackendResult<AllocatorHandle>;

    /// The backend pipeline cache.
    fn pipeline_cache(&mut self) -> BackendResult<PipelineCacheHandle>;

    /// Current swapchain extent, used as the default extent for passes that
    /// do not declare their own.
    fn swapchain_extent(&self) -> Extent2d;

    /// Create a command encoder bound to the given allocators and extent.
    fn create_encoder(
        &mut self,
        allocator: AllocatorHandle,
        pipeline_cache: PipelineCacheHandle,
        staging: AllocatorHandle,
        extent: Extent2d,
    ) -> BackendResult<Box<dyn CommandEncoder>>;
}
