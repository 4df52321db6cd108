//! Resource identity and declaration descriptors for the render graph.
//!
//! Passes declare the GPU resources they touch through [`ResourceHandle`]
//! (an opaque identity with equality and hashing) and [`ResourceInfo`] (the
//! descriptor the backend will eventually allocate from). Handle equality is
//! what ties a producer pass to its consumers; the descriptors are
//! consolidated as declarations accumulate.

use std::sync::Arc;

use bitflags::bitflags;

use crate::types::{Extent3d, ImageFormat, ImageTiling, ImageType};

/// What kind of GPU object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Image,
    /// Bottom-level acceleration structure.
    Blas,
    /// Top-level acceleration structure.
    Tlas,
}

bitflags! {
    /// Handle metadata flags, used for buffer resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceHandleFlags: u8 {
        /// Resource is a virtual sub-allocation.
        const VIRTUAL = 1 << 0;
        /// Resource lives in staging memory.
        const STAGING = 1 << 1;
    }
}

/// Opaque identity of a GPU resource.
///
/// Two handles refer to the same resource exactly when they compare equal;
/// all fields participate in equality and hashing. Identity is stable within
/// a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    /// Sample count as log2, for image resources.
    num_samples_log2: u8,
    flags: ResourceHandleFlags,
    /// Sub-allocation index for virtual buffers.
    index: u16,
    name: Arc<str>,
}

impl ResourceHandle {
    fn new(kind: ResourceKind, name: &str) -> Self {
        Self {
            kind,
            num_samples_log2: 0,
            flags: ResourceHandleFlags::empty(),
            index: 0,
            name: Arc::from(name),
        }
    }

    /// Create a handle identifying an image resource.
    pub fn image(name: &str) -> Self {
        Self::new(ResourceKind::Image, name)
    }

    /// Create a handle identifying a buffer resource.
    pub fn buffer(name: &str) -> Self {
        Self::new(ResourceKind::Buffer, name)
    }

    /// Create a handle identifying a bottom-level acceleration structure.
    pub fn blas(name: &str) -> Self {
        Self::new(ResourceKind::Blas, name)
    }

    /// Create a handle identifying a top-level acceleration structure.
    pub fn tlas(name: &str) -> Self {
        Self::new(ResourceKind::Tlas, name)
    }

    /// Set the sample count (log2). Distinct sample counts are distinct
    /// resource identities.
    pub fn with_num_samples_log2(mut self, num_samples_log2: u8) -> Self {
        self.num_samples_log2 = num_samples_log2;
        self
    }

    /// Set the handle metadata flags.
    pub fn with_flags(mut self, flags: ResourceHandleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the sub-allocation index.
    pub fn with_index(mut self, index: u16) -> Self {
        self.index = index;
        self
    }

    /// The kind of resource this handle refers to.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Debug name of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }
}

bitflags! {
    /// Usage flags for image resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageUsage: u32 {
        /// Image can be the source of a transfer.
        const TRANSFER_SRC = 1 << 0;
        /// Image can be the destination of a transfer.
        const TRANSFER_DST = 1 << 1;
        /// Image can be sampled in a shader.
        const SAMPLED = 1 << 2;
        /// Image can be read and written as a storage image.
        const STORAGE = 1 << 3;
        /// Image can be a color attachment.
        const COLOR_ATTACHMENT = 1 << 4;
        /// Image can be a depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        /// Image is a transient attachment backed by lazy memory.
        const TRANSIENT_ATTACHMENT = 1 << 6;
        /// Image can be an input attachment.
        const INPUT_ATTACHMENT = 1 << 7;
    }
}

impl ImageUsage {
    /// Usages under which a pass writes the image. `STORAGE` and the
    /// attachment usages appear in both masks: such a resource counts as
    /// both read and written.
    pub const WRITE_MASK: Self = Self::TRANSFER_DST
        .union(Self::STORAGE)
        .union(Self::COLOR_ATTACHMENT)
        .union(Self::DEPTH_STENCIL_ATTACHMENT)
        .union(Self::TRANSIENT_ATTACHMENT);

    /// Usages under which a pass reads the image.
    pub const READ_MASK: Self = Self::TRANSFER_SRC
        .union(Self::SAMPLED)
        .union(Self::STORAGE)
        .union(Self::COLOR_ATTACHMENT)
        .union(Self::DEPTH_STENCIL_ATTACHMENT)
        .union(Self::TRANSIENT_ATTACHMENT)
        .union(Self::INPUT_ATTACHMENT);
}

bitflags! {
    /// Usage flags for buffer resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Buffer can be the source of a transfer.
        const TRANSFER_SRC = 1 << 0;
        /// Buffer can be the destination of a transfer.
        const TRANSFER_DST = 1 << 1;
        /// Buffer can be read as a uniform texel buffer.
        const UNIFORM_TEXEL = 1 << 2;
        /// Buffer can be read and written as a storage texel buffer.
        const STORAGE_TEXEL = 1 << 3;
        /// Buffer can be read as a uniform buffer.
        const UNIFORM = 1 << 4;
        /// Buffer can be read and written as a storage buffer.
        const STORAGE = 1 << 5;
        /// Buffer can be read as an index buffer.
        const INDEX = 1 << 6;
        /// Buffer can be read as a vertex buffer.
        const VERTEX = 1 << 7;
        /// Buffer can be read as indirect draw arguments.
        const INDIRECT = 1 << 8;
        /// Buffer can drive conditional rendering.
        const CONDITIONAL_RENDERING = 1 << 9;
    }
}

impl BufferUsage {
    /// Usages under which a pass writes the buffer.
    pub const WRITE_MASK: Self = Self::TRANSFER_DST
        .union(Self::STORAGE_TEXEL)
        .union(Self::STORAGE);

    /// Usages under which a pass reads the buffer.
    pub const READ_MASK: Self = Self::TRANSFER_SRC
        .union(Self::UNIFORM_TEXEL)
        .union(Self::UNIFORM)
        .union(Self::INDEX)
        .union(Self::VERTEX)
        .union(Self::INDIRECT)
        .union(Self::CONDITIONAL_RENDERING);
}

/// Descriptor for a declared buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferInfo {
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

/// Descriptor for a declared image resource.
///
/// Every field besides `usage` is immutable for a given resource identity
/// within a frame; redeclaring with different values is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageInfo {
    /// Usage flags.
    pub usage: ImageUsage,
    /// Backend image creation flags.
    pub flags: u32,
    /// Dimensionality.
    pub image_type: ImageType,
    /// Pixel format.
    pub format: ImageFormat,
    /// Size of the image.
    pub extent: Extent3d,
    /// Mip level count.
    pub mip_levels: u32,
    /// Array layer count.
    pub array_layers: u32,
    /// Sample count.
    pub samples: u32,
    /// Memory tiling.
    pub tiling: ImageTiling,
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self {
            usage: ImageUsage::empty(),
            flags: 0,
            image_type: ImageType::D2,
            format: ImageFormat::Undefined,
            extent: Extent3d::default(),
            mip_levels: 1,
            array_layers: 1,
            samples: 1,
            tiling: ImageTiling::Optimal,
        }
    }
}

/// Tagged descriptor for a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceInfo {
    Buffer(BufferInfo),
    Image(ImageInfo),
}

impl ResourceInfo {
    /// Create a buffer descriptor.
    pub fn buffer(size: u64, usage: BufferUsage) -> Self {
        Self::Buffer(BufferInfo { size, usage })
    }

    /// Create an image descriptor with defaulted creation fields.
    pub fn image(usage: ImageUsage) -> Self {
        Self::Image(ImageInfo {
            usage,
            ..ImageInfo::default()
        })
    }

    /// Create an image descriptor with an explicit format.
    pub fn image_with_format(format: ImageFormat, usage: ImageUsage) -> Self {
        Self::Image(ImageInfo {
            usage,
            format,
            ..ImageInfo::default()
        })
    }

    /// The resource kind this descriptor declares.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Image(_) => ResourceKind::Image,
        }
    }

    /// Whether any declared usage reads the resource.
    pub fn reads(&self) -> bool {
        match self {
            Self::Buffer(info) => info.usage.intersects(BufferUsage::READ_MASK),
            Self::Image(info) => info.usage.intersects(ImageUsage::READ_MASK),
        }
    }

    /// Whether any declared usage writes the resource.
    pub fn writes(&self) -> bool {
        match self {
            Self::Buffer(info) => info.usage.intersects(BufferUsage::WRITE_MASK),
            Self::Image(info) => info.usage.intersects(ImageUsage::WRITE_MASK),
        }
    }

    /// Merge a second declaration of the same resource into this one.
    ///
    /// Buffers take the larger size and the union of usages. Images take the
    /// union of usages; every other image field must match the stored
    /// declaration exactly.
    ///
    /// # Panics
    ///
    /// Panics if the declarations disagree on kind or on any immutable image
    /// descriptor field. `name` is only used for the panic message.
    pub fn consolidate(&mut self, incoming: &ResourceInfo, name: &str) {
        match (self, incoming) {
            (Self::Buffer(stored), Self::Buffer(incoming)) => {
                stored.size = stored.size.max(incoming.size);
                stored.usage |= incoming.usage;
            }
            (Self::Image(stored), Self::Image(incoming)) => {
                stored.usage |= incoming.usage;

                assert_eq!(
                    stored.flags, incoming.flags,
                    "image creation flags mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.image_type, incoming.image_type,
                    "image type mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.format, incoming.format,
                    "image format mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.extent, incoming.extent,
                    "image extent mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.mip_levels, incoming.mip_levels,
                    "image mip level count mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.array_layers, incoming.array_layers,
                    "image array layer count mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.samples, incoming.samples,
                    "image sample count mismatch for resource '{name}'"
                );
                assert_eq!(
                    stored.tiling, incoming.tiling,
                    "image tiling mismatch for resource '{name}'"
                );
            }
            _ => panic!("resource kind mismatch for '{name}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_handle_equality_is_identity() {
        let a = ResourceHandle::image("gbuffer_albedo");
        let b = ResourceHandle::image("gbuffer_albedo");
        let c = ResourceHandle::image("gbuffer_normal");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Metadata participates in identity.
        assert_ne!(a, b.clone().with_num_samples_log2(2));
        assert_ne!(
            ResourceHandle::buffer("scratch"),
            ResourceHandle::buffer("scratch").with_index(1)
        );
    }

    #[test]
    fn test_buffer_consolidation_takes_max_size_and_unions_usage() {
        let mut stored = ResourceInfo::buffer(256, BufferUsage::VERTEX);
        stored.consolidate(
            &ResourceInfo::buffer(1024, BufferUsage::TRANSFER_DST),
            "vertices",
        );
        let ResourceInfo::Buffer(info) = stored else {
            panic!("expected buffer info");
        };
        assert_eq!(info.size, 1024);
        assert_eq!(info.usage, BufferUsage::VERTEX | BufferUsage::TRANSFER_DST);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let info = ResourceInfo::buffer(512, BufferUsage::STORAGE);
        let mut stored = info;
        stored.consolidate(&info, "scratch");
        assert_eq!(stored, info);
    }

    #[test]
    #[should_panic(expected = "image format mismatch")]
    fn test_image_format_mismatch_panics() {
        let mut stored =
            ResourceInfo::image_with_format(ImageFormat::Rgba8Unorm, ImageUsage::SAMPLED);
        stored.consolidate(
            &ResourceInfo::image_with_format(ImageFormat::Rgba16Float, ImageUsage::SAMPLED),
            "albedo",
        );
    }

    #[test]
    #[should_panic(expected = "resource kind mismatch")]
    fn test_kind_mismatch_panics() {
        let mut stored = ResourceInfo::buffer(16, BufferUsage::UNIFORM);
        stored.consolidate(&ResourceInfo::image(ImageUsage::SAMPLED), "confused");
    }

    #[rstest]
    #[case(ImageUsage::TRANSFER_SRC, true, false)]
    #[case(ImageUsage::TRANSFER_DST, false, true)]
    #[case(ImageUsage::SAMPLED, true, false)]
    #[case(ImageUsage::STORAGE, true, true)]
    #[case(ImageUsage::COLOR_ATTACHMENT, true, true)]
    #[case(ImageUsage::DEPTH_STENCIL_ATTACHMENT, true, true)]
    #[case(ImageUsage::TRANSIENT_ATTACHMENT, true, true)]
    #[case(ImageUsage::INPUT_ATTACHMENT, true, false)]
    #[case(ImageUsage::empty(), false, false)]
    fn test_image_usage_classification(
        #[case] usage: ImageUsage,
        #[case] reads: bool,
        #[case] writes: bool,
    ) {
        let info = ResourceInfo::image(usage);
        assert_eq!(info.reads(), reads);
        assert_eq!(info.writes(), writes);
    }

    #[rstest]
    #[case(BufferUsage::TRANSFER_SRC, true, false)]
    #[case(BufferUsage::TRANSFER_DST, false, true)]
    #[case(BufferUsage::UNIFORM_TEXEL, true, false)]
    #[case(BufferUsage::STORAGE_TEXEL, false, true)]
    #[case(BufferUsage::UNIFORM, true, false)]
    #[case(BufferUsage::STORAGE, true, true)]
    #[case(BufferUsage::INDEX, true, false)]
    #[case(BufferUsage::VERTEX, true, false)]
    #[case(BufferUsage::INDIRECT, true, false)]
    #[case(BufferUsage::CONDITIONAL_RENDERING, true, false)]
    #[case(BufferUsage::empty(), false, false)]
    fn test_buffer_usage_classification(
        #[case] usage: BufferUsage,
        #[case] reads: bool,
        #[case] writes: bool,
    ) {
        let info = ResourceInfo::buffer(64, usage);
        assert_eq!(info.reads(), reads);
        assert_eq!(info.writes(), writes);
    }
}
