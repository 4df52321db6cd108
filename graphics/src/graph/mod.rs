//! Render graph infrastructure.
//!
//! The render graph is a frame-scoped planner. The user declares an
//! unordered set of render passes, each naming the resources it reads and
//! writes; the graph resolves producer→consumer dependencies by resource
//! identity, prunes passes that do not contribute to a root, and emits a
//! linearized execution order suitable for command recording.
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Module | [`RenderModule`] | Staging buffer in user submission order |
//! | **Graph** | [`RenderGraph`] | Dependency resolution and scheduling (this module) |
//! | Pass | [`RenderPass`] | Single declared unit of GPU work |
//!
//! # Frame lifecycle
//!
//! ```ignore
//! graph.reset();
//! module.setup_passes(&mut graph);
//! graph.build();
//! graph.execute(frame_index, &mut backend)?;
//! ```
//!
//! All four steps run in that order on one thread; none of them overlap.

mod attachment;
mod module;
mod pass;
mod resource;

pub use attachment::{AttachmentInfo, Filter, LoadOp, SamplerInfo, StoreOp, TextureInfo};
pub use module::RenderModule;
pub use pass::{ExecuteCallback, PassKind, RenderPass, SetupCallback};
pub use resource::{
    BufferInfo, BufferUsage, ImageInfo, ImageUsage, ResourceHandle, ResourceHandleFlags,
    ResourceInfo, ResourceKind,
};

use fxhash::FxHashMap;

use crate::backend::{BackendResult, RenderBackend};
use crate::types::{Extent2d, ScissorRect, Viewport};

/// Maximum depth of the sort-key traversal. The dependency graph is acyclic
/// by construction (edges always point to earlier submissions), so this only
/// bounds pathologically deep pass chains.
pub const MAX_TRAVERSAL_DEPTH: u32 = 20;

/// The render graph for one frame.
///
/// Owns its passes after [`RenderModule::setup_passes`] and is rebuilt every
/// frame: `reset → add passes → build → execute`.
#[derive(Default)]
pub struct RenderGraph {
    passes: Vec<RenderPass>,
}

impl RenderGraph {
    /// Create a new empty render graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all passes, together with any encoders they still own.
    pub fn reset(&mut self) {
        self.passes.clear();
    }

    /// Add a pass to the graph, taking ownership.
    ///
    /// Normally called by [`RenderModule::setup_passes`], which preserves
    /// the module submission order the dependency resolution relies on.
    pub fn add_renderpass(&mut self, pass: RenderPass) {
        self.passes.push(pass);
    }

    /// All passes currently owned by the graph. After [`build`](Self::build)
    /// these are the surviving passes in execution order.
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    /// Mutable access to the passes, e.g. for the submission path to steal
    /// recorded encoders.
    pub fn passes_mut(&mut self) -> &mut [RenderPass] {
        &mut self.passes
    }

    /// Resolve dependencies, assign sort keys, prune dead passes and order
    /// the survivors for execution.
    ///
    /// Passes unreachable from any root are dropped. Surviving passes are
    /// stably sorted by descending sort key, so producers come first and
    /// ties keep their submission order.
    pub fn build(&mut self) {
        let dependencies = resolve_pass_dependencies(&self.passes);

        // Establish a topological order: passes which produce resources for
        // other passes must execute before their consumers.
        let mut sort_orders = vec![0u64; self.passes.len()];
        for (index, pass) in self.passes.iter().enumerate() {
            if pass.is_root() {
                // Roots start at depth 1 so that any pass still at 0 after
                // the traversal is known to be dead.
                traverse_passes(&dependencies, index, 1, &mut sort_orders);
            }
        }

        for (pass, sort_order) in self.passes.iter_mut().zip(sort_orders) {
            pass.set_sort_key(sort_order);
        }

        let before = self.passes.len();
        self.passes.retain(|pass| pass.sort_key() != 0);
        let pruned = before - self.passes.len();
        if pruned > 0 {
            log::debug!("pruned {pruned} render passes unreachable from any root");
        }

        // Descending sort key: a pass with a lower key depends on passes
        // with higher keys. The sort is stable, so equal keys keep the
        // original submission order.
        self.passes
            .sort_by(|lhs, rhs| rhs.sort_key().cmp(&lhs.sort_key()));
    }

    /// Record the frame by invoking each surviving pass's execute callback.
    ///
    /// The backend provides one transient allocator per pass, a staging
    /// allocator, the pipeline cache and the swapchain extent. Every pass
    /// with an execute callback gets an encoder bound to the next unused
    /// allocator and its effective extent (the pass extent, or the swapchain
    /// extent where the pass extent is 0). Draw passes get their scissor and
    /// viewport preset to the full extent before the callback runs.
    pub fn execute(
        &mut self,
        frame_index: u64,
        backend: &mut dyn RenderBackend,
    ) -> BackendResult<()> {
        if log::log_enabled!(log::Level::Trace) {
            for pass in &self.passes {
                log::trace!(
                    "renderpass '{}', sort_key {}, {} attachments",
                    pass.debug_name(),
                    pass.sort_key(),
                    pass.image_attachments().count(),
                );
            }
        }

        // One allocator per pass, from the frame's own pool.
        let allocators = backend.transient_allocators(frame_index, self.passes.len())?;
        let staging = backend.staging_allocator(frame_index)?;
        let pipeline_cache = backend.pipeline_cache()?;

        // Swapchain dimensions are the fallback for encoder extents which
        // cannot be initialised from the pass. The pass extent itself is
        // not modified.
        let swapchain_extent = backend.swapchain_extent();

        let mut allocators = allocators.into_iter();

        for pass in &mut self.passes {
            if !pass.has_execute_callback() || pass.sort_key() == 0 {
                continue;
            }

            let encoder_extent = Extent2d {
                width: if pass.width() != 0 {
                    pass.width()
                } else {
                    swapchain_extent.width
                },
                height: if pass.height() != 0 {
                    pass.height()
                } else {
                    swapchain_extent.height
                },
            };

            let allocator = allocators
                .next()
                .expect("backend returned fewer allocators than passes");

            let mut encoder =
                backend.create_encoder(allocator, pipeline_cache, staging, encoder_extent)?;

            if pass.kind() == PassKind::Draw {
                // Default scissor and viewport cover the full extent.
                encoder.set_scissor(
                    0,
                    &[ScissorRect::from_dimensions(
                        encoder_extent.width,
                        encoder_extent.height,
                    )],
                );
                encoder.set_viewport(
                    0,
                    &[Viewport::from_dimensions(
                        encoder_extent.width,
                        encoder_extent.height,
                    )],
                );
            }

            pass.attach_encoder(encoder);
            pass.run_execute_callback();
        }

        Ok(())
    }
}

/// Find the producer pass for each consumed resource.
///
/// Returns, for each pass index, the indices of the passes it directly
/// depends on. The module gives us passes in submission order, which makes
/// dependencies well-defined without the user naming producers explicitly:
/// a read always resolves to the latest earlier writer of that resource.
/// Duplicate entries are permitted; the traversal tolerates them.
fn resolve_pass_dependencies(passes: &[RenderPass]) -> Vec<Vec<usize>> {
    let mut dependencies_per_pass = Vec::with_capacity(passes.len());

    // Resource identity → index of the latest pass writing it.
    let mut last_writer: FxHashMap<&ResourceHandle, usize> = FxHashMap::default();

    for (index, pass) in passes.iter().enumerate() {
        // Reads resolve against writers recorded so far, i.e. strictly
        // earlier passes. A pass reading and writing the same resource does
        // not depend on itself.
        let dependencies: Vec<usize> = pass
            .read_resources()
            .iter()
            .filter_map(|resource| last_writer.get(resource).copied())
            .collect();
        dependencies_per_pass.push(dependencies);

        // This pass's writes overwrite any earlier writer of the same
        // resource, so later readers see only the latest producer.
        for resource in pass.write_resources() {
            last_writer.insert(resource, index);
        }
    }

    dependencies_per_pass
}

/// Depth-first traversal from a root, following each consumed resource back
/// to its producer.
///
/// Each reachable pass is assigned the *maximum* depth at which it is
/// visited. The maximum matters: it guarantees a producer's sort order
/// strictly exceeds every consumer's even when several paths of different
/// lengths reach it, so descending-key order always schedules producers
/// first.
fn traverse_passes(
    dependencies: &[Vec<usize>],
    pass_index: usize,
    depth: u32,
    sort_orders: &mut [u64],
) {
    if depth > MAX_TRAVERSAL_DEPTH {
        log::error!(
            "max recursion depth reached while traversing the render graph, \
             check for overly deep pass chains"
        );
        return;
    }

    if sort_orders[pass_index] < u64::from(depth) {
        sort_orders[pass_index] = u64::from(depth);
    }

    for &producer in &dependencies[pass_index] {
        traverse_passes(dependencies, producer, depth + 1, sort_orders);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(name: &str, writes: &[&ResourceHandle]) -> RenderPass {
        reader_writer(name, &[], writes)
    }

    fn reader_writer(
        name: &str,
        reads: &[&ResourceHandle],
        writes: &[&ResourceHandle],
    ) -> RenderPass {
        let mut pass = RenderPass::new(name, PassKind::Draw);
        for resource in reads {
            pass.use_resource((*resource).clone(), ResourceInfo::image(ImageUsage::SAMPLED));
        }
        for resource in writes {
            pass.use_resource(
                (*resource).clone(),
                ResourceInfo::image(ImageUsage::TRANSFER_DST),
            );
        }
        pass
    }

    #[test]
    fn test_resolver_links_reader_to_latest_writer() {
        let x = ResourceHandle::image("x");
        let passes = vec![
            writer("a", &[&x]),
            writer("b", &[&x]),
            reader_writer("c", &[&x], &[]),
        ];

        let deps = resolve_pass_dependencies(&passes);
        assert!(deps[0].is_empty());
        assert!(deps[1].is_empty());
        // C reads X; B is the latest writer, A is shadowed.
        assert_eq!(deps[2], vec![1]);
    }

    #[test]
    fn test_resolver_edges_point_backwards() {
        let x = ResourceHandle::image("x");
        let y = ResourceHandle::image("y");
        let passes = vec![
            writer("a", &[&x]),
            reader_writer("b", &[&x], &[&y]),
            reader_writer("c", &[&y], &[]),
        ];

        let deps = resolve_pass_dependencies(&passes);
        for (index, pass_deps) in deps.iter().enumerate() {
            for &producer in pass_deps {
                assert!(producer < index);
            }
        }
        assert_eq!(deps[1], vec![0]);
        assert_eq!(deps[2], vec![1]);
    }

    #[test]
    fn test_self_read_write_is_not_a_dependency() {
        let x = ResourceHandle::image("x");
        // Storage usage marks the resource both read and written.
        let mut pass = RenderPass::new("accumulate", PassKind::Compute);
        pass.use_resource(x.clone(), ResourceInfo::image(ImageUsage::STORAGE));

        let deps = resolve_pass_dependencies(&[pass]);
        assert!(deps[0].is_empty());
    }

    #[test]
    fn test_traversal_assigns_max_depth() {
        // 0 ← 1 ← 2 and 0 ← 2: pass 0 is reached at depths 2 and 3.
        let deps = vec![vec![], vec![0], vec![0, 1]];
        let mut sort_orders = vec![0u64; 3];
        traverse_passes(&deps, 2, 1, &mut sort_orders);
        assert_eq!(sort_orders, vec![3, 2, 1]);
    }

    #[test]
    fn test_traversal_depth_guard() {
        // A chain longer than the traversal limit: deep producers are left
        // unassigned rather than overflowing the stack.
        let count = 25;
        let deps: Vec<Vec<usize>> = (0..count)
            .map(|i| if i == 0 { vec![] } else { vec![i - 1] })
            .collect();
        let mut sort_orders = vec![0u64; count];
        traverse_passes(&deps, count - 1, 1, &mut sort_orders);

        assert_eq!(sort_orders[count - 1], 1);
        assert_eq!(
            sort_orders.iter().filter(|&&order| order != 0).count(),
            MAX_TRAVERSAL_DEPTH as usize
        );
    }

    #[test]
    fn test_build_assigns_keys_and_prunes() {
        let x = ResourceHandle::image("x");
        let y = ResourceHandle::image("y");
        let z = ResourceHandle::image("z");

        let mut graph = RenderGraph::new();
        graph.add_renderpass(writer("a", &[&x]));
        graph.add_renderpass(reader_writer("b", &[&x], &[&y]));
        // An unrelated writer nobody reads.
        graph.add_renderpass(writer("orphan", &[&z]));
        let mut root = reader_writer("c", &[&y], &[]);
        root.set_is_root(true);
        graph.add_renderpass(root);

        graph.build();

        let names: Vec<_> = graph.passes().iter().map(|p| p.debug_name()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let keys: Vec<_> = graph.passes().iter().map(|p| p.sort_key()).collect();
        assert_eq!(keys, [3, 2, 1]);

        // Every surviving pass outranks its consumers.
        for window in keys.windows(2) {
            assert!(window[0] >= window[1]);
        }
    }

    #[test]
    fn test_build_stable_sort_preserves_submission_order() {
        let x = ResourceHandle::image("x");
        let y = ResourceHandle::image("y");
        let z = ResourceHandle::image("z");

        let mut graph = RenderGraph::new();
        graph.add_renderpass(writer("a", &[&x]));
        // B and C both sit at depth 2 below the root.
        graph.add_renderpass(reader_writer("b", &[&x], &[&y]));
        graph.add_renderpass(reader_writer("c", &[&x], &[&z]));
        let mut root = reader_writer("d", &[&y, &z], &[]);
        root.set_is_root(true);
        graph.add_renderpass(root);

        graph.build();

        let names: Vec<_> = graph.passes().iter().map(|p| p.debug_name()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_reset_drops_passes() {
        let mut graph = RenderGraph::new();
        graph.add_renderpass(RenderPass::new("stale", PassKind::Draw));
        graph.reset();
        assert!(graph.passes().is_empty());
    }
}
