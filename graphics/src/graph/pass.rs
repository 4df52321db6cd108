//! Render pass value type.
//!
//! A [`RenderPass`] describes one unit of GPU work: its kind (draw, compute
//! or transfer), the resources it reads and writes, its attachments and
//! sampled textures, and the setup/execute callbacks the graph invokes on
//! its behalf. Passes flow user → module → graph with single-owner
//! hand-offs; each step either keeps the pass or drops it.

use crate::backend::CommandEncoder;
use crate::graph::attachment::{AttachmentInfo, TextureInfo};
use crate::graph::resource::{ImageUsage, ResourceHandle, ResourceInfo};

/// The kind of GPU work a pass records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Rasterization work; gets a default viewport and scissor on execution.
    Draw,
    /// Compute dispatches.
    Compute,
    /// Copy operations.
    Transfer,
}

/// Callback invoked while the module hands passes to the graph. Declares the
/// pass's resources, attachments and extent; returning `false` drops the
/// pass instead of adding it to the graph.
pub type SetupCallback = Box<dyn FnMut(&mut RenderPass) -> bool>;

/// Callback invoked during graph execution to record commands into the
/// pass's encoder.
pub type ExecuteCallback = Box<dyn FnMut(&mut dyn CommandEncoder)>;

/// A user-declared unit of GPU work with explicit resource declarations.
pub struct RenderPass {
    /// Hash of the pass name.
    id: u64,
    kind: PassKind,
    debug_name: String,
    /// Whether this pass's output is externally required. Roots force the
    /// inclusion of their transitive producers.
    is_root: bool,
    /// Scheduling key assigned by [`RenderGraph::build`]. 0 means
    /// unassigned; passes still at 0 after the build are dead.
    ///
    /// [`RenderGraph::build`]: crate::graph::RenderGraph::build
    sort_key: u64,
    /// Pass extent in pixels; 0 means the swapchain extent is used.
    width: u32,
    height: u32,

    /// All resources used by this pass, with descriptors at matching
    /// indices.
    resources: Vec<ResourceHandle>,
    resource_infos: Vec<ResourceInfo>,

    /// Read/write projections derived from the consolidated usage bits.
    read_resources: Vec<ResourceHandle>,
    write_resources: Vec<ResourceHandle>,

    /// Image attachment settings, one resource per attachment at matching
    /// indices.
    image_attachments: Vec<AttachmentInfo>,
    attachment_resources: Vec<ResourceHandle>,

    /// Sampled textures, ids and infos at matching indices.
    texture_ids: Vec<ResourceHandle>,
    texture_infos: Vec<TextureInfo>,

    setup_callback: Option<SetupCallback>,
    execute_callback: Option<ExecuteCallback>,

    /// Encoder created for this pass during execution. Owned by the pass
    /// until stolen by the submission path.
    encoder: Option<Box<dyn CommandEncoder>>,
}

impl RenderPass {
    /// Create a new pass. The id is derived from the name.
    pub fn new(name: &str, kind: PassKind) -> Self {
        Self {
            id: fxhash::hash64(name.as_bytes()),
            kind,
            debug_name: name.to_string(),
            is_root: false,
            sort_key: 0,
            width: 0,
            height: 0,
            resources: Vec::new(),
            resource_infos: Vec::new(),
            read_resources: Vec::new(),
            write_resources: Vec::new(),
            image_attachments: Vec::new(),
            attachment_resources: Vec::new(),
            texture_ids: Vec::new(),
            texture_infos: Vec::new(),
            setup_callback: None,
            execute_callback: None,
            encoder: None,
        }
    }

    /// Hash of the pass name.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The kind of work this pass records.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Name for debugging and diagnostics.
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    /// Whether this pass must be kept during graph pruning.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Mark this pass as a root whose output is externally required.
    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root = is_root;
    }

    /// Scheduling key assigned by the graph build; 0 means unassigned.
    pub fn sort_key(&self) -> u64 {
        self.sort_key
    }

    pub(crate) fn set_sort_key(&mut self, sort_key: u64) {
        self.sort_key = sort_key;
    }

    /// Pass width in pixels; 0 means the swapchain width is used.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Set the pass width in pixels.
    pub fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    /// Pass height in pixels; 0 means the swapchain height is used.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Set the pass height in pixels.
    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    /// Set the callback run while the module hands this pass to the graph.
    pub fn set_setup_callback(
        &mut self,
        callback: impl FnMut(&mut RenderPass) -> bool + 'static,
    ) {
        self.setup_callback = Some(Box::new(callback));
    }

    /// Set the callback run during graph execution to record commands.
    pub fn set_execute_callback(
        &mut self,
        callback: impl FnMut(&mut dyn CommandEncoder) + 'static,
    ) {
        self.execute_callback = Some(Box::new(callback));
    }

    /// Whether a setup callback is installed.
    pub fn has_setup_callback(&self) -> bool {
        self.setup_callback.is_some()
    }

    /// Whether an execute callback is installed.
    pub fn has_execute_callback(&self) -> bool {
        self.execute_callback.is_some()
    }

    /// Associate a resource with this pass.
    ///
    /// This is the single chokepoint through which a pass declares any
    /// resource. If the resource is already known to the pass, the stored
    /// descriptor is consolidated with the incoming one (see
    /// [`ResourceInfo::consolidate`]); afterwards the read/write membership
    /// is recomputed from the merged usage bits.
    pub fn use_resource(&mut self, resource: ResourceHandle, info: ResourceInfo) {
        let consolidated = match self.resources.iter().position(|r| *r == resource) {
            None => {
                self.resources.push(resource.clone());
                self.resource_infos.push(info);
                self.resource_infos.last().expect("just pushed")
            }
            Some(index) => {
                let stored = &mut self.resource_infos[index];
                stored.consolidate(&info, resource.name());
                &self.resource_infos[index]
            }
        };

        let reads = consolidated.reads();
        let writes = consolidated.writes();

        if reads && !self.read_resources.contains(&resource) {
            self.read_resources.push(resource.clone());
        }
        if writes && !self.write_resources.contains(&resource) {
            self.write_resources.push(resource);
        }
    }

    /// Declare an image as a color attachment of this pass.
    ///
    /// The `COLOR_ATTACHMENT` usage bit is forced on even if the caller
    /// forgot to set it.
    pub fn add_color_attachment(
        &mut self,
        image: ResourceHandle,
        mut info: ResourceInfo,
        attachment: AttachmentInfo,
    ) {
        self.image_attachments.push(attachment);
        self.attachment_resources.push(image.clone());

        force_image_usage(&mut info, ImageUsage::COLOR_ATTACHMENT, image.name());
        self.use_resource(image, info);
    }

    /// Declare an image as the depth/stencil attachment of this pass.
    ///
    /// The `DEPTH_STENCIL_ATTACHMENT` usage bit is forced on even if the
    /// caller forgot to set it.
    pub fn add_depth_stencil_attachment(
        &mut self,
        image: ResourceHandle,
        mut info: ResourceInfo,
        attachment: AttachmentInfo,
    ) {
        self.image_attachments.push(attachment);
        self.attachment_resources.push(image.clone());

        force_image_usage(&mut info, ImageUsage::DEPTH_STENCIL_ATTACHMENT, image.name());
        self.use_resource(image, info);
    }

    /// Declare a texture sampled by this pass.
    ///
    /// Idempotent per texture id: declaring the same texture twice leaves
    /// the pass unchanged. The image backing the texture is marked as used
    /// for sampling.
    pub fn sample_texture(&mut self, texture: ResourceHandle, info: &TextureInfo) {
        if self.texture_ids.contains(&texture) {
            return;
        }

        self.texture_ids.push(texture);
        self.texture_infos.push(info.clone());

        let required = ResourceInfo::image_with_format(info.format, ImageUsage::SAMPLED);
        self.use_resource(info.image.clone(), required);
    }

    /// All resources used by this pass, paired with their consolidated
    /// descriptors.
    pub fn used_resources(&self) -> impl Iterator<Item = (&ResourceHandle, &ResourceInfo)> {
        debug_assert_eq!(self.resources.len(), self.resource_infos.len());
        self.resources.iter().zip(self.resource_infos.iter())
    }

    /// Resources this pass reads.
    pub fn read_resources(&self) -> &[ResourceHandle] {
        &self.read_resources
    }

    /// Resources this pass writes.
    pub fn write_resources(&self) -> &[ResourceHandle] {
        &self.write_resources
    }

    /// Image attachments paired with their resources.
    pub fn image_attachments(&self) -> impl Iterator<Item = (&AttachmentInfo, &ResourceHandle)> {
        debug_assert_eq!(self.image_attachments.len(), self.attachment_resources.len());
        self.image_attachments
            .iter()
            .zip(self.attachment_resources.iter())
    }

    /// Sampled texture ids.
    pub fn texture_ids(&self) -> &[ResourceHandle] {
        &self.texture_ids
    }

    /// Sampled texture infos, index-matched with [`texture_ids`].
    ///
    /// [`texture_ids`]: Self::texture_ids
    pub fn texture_infos(&self) -> &[TextureInfo] {
        &self.texture_infos
    }

    /// Take ownership of the pass's encoder.
    ///
    /// Single-take: returns `None` if the encoder was already stolen or was
    /// never created. The pass only drops an encoder it still owns.
    pub fn steal_encoder(&mut self) -> Option<Box<dyn CommandEncoder>> {
        self.encoder.take()
    }

    pub(crate) fn attach_encoder(&mut self, encoder: Box<dyn CommandEncoder>) {
        self.encoder = Some(encoder);
    }

    /// Run the setup callback, returning whether the pass should be kept.
    ///
    /// The callback is moved out for the duration of the call so it can
    /// mutate the pass it is declared on.
    pub(crate) fn run_setup_callback(&mut self) -> bool {
        let mut callback = self
            .setup_callback
            .take()
            .expect("setup callback not installed");
        let keep = callback(self);
        self.setup_callback = Some(callback);
        keep
    }

    /// Run the execute callback against the pass's own encoder.
    pub(crate) fn run_execute_callback(&mut self) {
        let mut callback = self
            .execute_callback
            .take()
            .expect("execute callback not installed");
        let encoder = self
            .encoder
            .as_deref_mut()
            .expect("encoder not created for pass");
        callback(encoder);
        self.execute_callback = Some(callback);
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("debug_name", &self.debug_name)
            .field("kind", &self.kind)
            .field("is_root", &self.is_root)
            .field("sort_key", &self.sort_key)
            .field("resources", &self.resources.len())
            .finish_non_exhaustive()
    }
}

/// Force a usage bit onto an image declaration.
fn force_image_usage(info: &mut ResourceInfo, usage: ImageUsage, name: &str) {
    match info {
        ResourceInfo::Image(image) => image.usage |= usage,
        ResourceInfo::Buffer(_) => {
            panic!("attachment declaration for '{name}' requires an image resource")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::attachment::{LoadOp, StoreOp};
    use crate::graph::resource::BufferUsage;
    use crate::types::ImageFormat;

    fn sampled_then_color_attachment() -> RenderPass {
        let mut pass = RenderPass::new("resolve", PassKind::Draw);
        let image = ResourceHandle::image("hdr_target");
        pass.use_resource(image.clone(), ResourceInfo::image(ImageUsage::SAMPLED));
        pass.use_resource(image, ResourceInfo::image(ImageUsage::COLOR_ATTACHMENT));
        pass
    }

    #[test]
    fn test_use_resource_appends_unknown_handles() {
        let mut pass = RenderPass::new("gbuffer", PassKind::Draw);
        pass.use_resource(
            ResourceHandle::buffer("instances"),
            ResourceInfo::buffer(1024, BufferUsage::STORAGE),
        );
        pass.use_resource(
            ResourceHandle::image("albedo"),
            ResourceInfo::image(ImageUsage::COLOR_ATTACHMENT),
        );
        assert_eq!(pass.used_resources().count(), 2);
    }

    #[test]
    fn test_use_resource_consolidates_known_handles() {
        let pass = sampled_then_color_attachment();
        assert_eq!(pass.used_resources().count(), 1);

        let (_, info) = pass.used_resources().next().unwrap();
        let ResourceInfo::Image(image) = info else {
            panic!("expected image info");
        };
        assert_eq!(image.usage, ImageUsage::SAMPLED | ImageUsage::COLOR_ATTACHMENT);
    }

    #[test]
    fn test_membership_matches_usage_union() {
        let pass = sampled_then_color_attachment();
        let image = ResourceHandle::image("hdr_target");
        // Sampled + color attachment: the resource is both read and written.
        assert!(pass.read_resources().contains(&image));
        assert!(pass.write_resources().contains(&image));
    }

    #[test]
    fn test_use_resource_is_idempotent() {
        let mut pass = RenderPass::new("shade", PassKind::Compute);
        let buffer = ResourceHandle::buffer("lights");
        let info = ResourceInfo::buffer(4096, BufferUsage::STORAGE);
        pass.use_resource(buffer.clone(), info);
        pass.use_resource(buffer.clone(), info);

        assert_eq!(pass.used_resources().count(), 1);
        assert_eq!(
            pass.read_resources().iter().filter(|r| **r == buffer).count(),
            1
        );
        assert_eq!(
            pass.write_resources().iter().filter(|r| **r == buffer).count(),
            1
        );
    }

    #[test]
    fn test_zero_usage_resource_joins_neither_set() {
        let mut pass = RenderPass::new("noop", PassKind::Transfer);
        pass.use_resource(
            ResourceHandle::buffer("unused"),
            ResourceInfo::buffer(64, BufferUsage::empty()),
        );
        assert_eq!(pass.used_resources().count(), 1);
        assert!(pass.read_resources().is_empty());
        assert!(pass.write_resources().is_empty());
    }

    #[test]
    fn test_color_attachment_forces_usage_bit() {
        let mut pass = RenderPass::new("present", PassKind::Draw);
        let image = ResourceHandle::image("backbuffer");
        // Deliberately declared without the attachment bit.
        pass.add_color_attachment(
            image.clone(),
            ResourceInfo::image(ImageUsage::empty()),
            AttachmentInfo::clear_color(0.0, 0.0, 0.0, 1.0),
        );

        let (_, info) = pass.used_resources().next().unwrap();
        let ResourceInfo::Image(stored) = info else {
            panic!("expected image info");
        };
        assert!(stored.usage.contains(ImageUsage::COLOR_ATTACHMENT));
        assert!(pass.write_resources().contains(&image));
        assert_eq!(pass.image_attachments().count(), 1);
    }

    #[test]
    fn test_depth_stencil_attachment_forces_usage_bit() {
        let mut pass = RenderPass::new("depth_prepass", PassKind::Draw);
        let image = ResourceHandle::image("depth");
        pass.add_depth_stencil_attachment(
            image,
            ResourceInfo::image_with_format(ImageFormat::Depth32Float, ImageUsage::empty()),
            AttachmentInfo {
                load_op: LoadOp::clear_depth(1.0),
                store_op: StoreOp::Store,
            },
        );

        let (_, info) = pass.used_resources().next().unwrap();
        let ResourceInfo::Image(stored) = info else {
            panic!("expected image info");
        };
        assert!(stored.usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT));
    }

    #[test]
    fn test_sample_texture_is_idempotent() {
        let mut pass = RenderPass::new("composite", PassKind::Draw);
        let texture = ResourceHandle::image("bloom_chain");
        let info = TextureInfo::new(
            ResourceHandle::image("bloom_image"),
            ImageFormat::Rgba16Float,
        );

        pass.sample_texture(texture.clone(), &info);
        let once = (
            pass.texture_ids().len(),
            pass.used_resources().count(),
            pass.read_resources().len(),
        );

        pass.sample_texture(texture, &info);
        let twice = (
            pass.texture_ids().len(),
            pass.used_resources().count(),
            pass.read_resources().len(),
        );

        assert_eq!(once, twice);
        assert_eq!(pass.texture_ids().len(), 1);
        assert!(pass
            .read_resources()
            .contains(&ResourceHandle::image("bloom_image")));
    }

    #[test]
    fn test_setup_callback_round_trip() {
        let mut pass = RenderPass::new("shadow", PassKind::Draw);
        pass.set_setup_callback(|pass| {
            pass.set_width(2048);
            pass.set_height(2048);
            true
        });
        assert!(pass.run_setup_callback());
        assert_eq!(pass.width(), 2048);
        assert_eq!(pass.height(), 2048);
        // Callback survives the call.
        assert!(pass.has_setup_callback());
    }
}
