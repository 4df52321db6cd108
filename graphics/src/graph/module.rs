//! Ordered staging buffer for render passes.

use crate::graph::pass::RenderPass;
use crate::graph::RenderGraph;

/// Collects passes in user submission order for one frame.
///
/// The module is a staging area: the user adds fully configured passes, and
/// [`setup_passes`](Self::setup_passes) hands them over to the graph. The
/// submission order matters — it is what makes resource dependencies
/// well-defined when several passes touch the same resource.
#[derive(Default)]
pub struct RenderModule {
    passes: Vec<RenderPass>,
}

impl RenderModule {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pass to the module. Order of addition is preserved.
    pub fn add_renderpass(&mut self, pass: RenderPass) {
        self.passes.push(pass);
    }

    /// Number of passes currently staged.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Hand the staged passes over to the graph.
    ///
    /// Passes are visited in submission order. A pass with a setup callback
    /// is only transferred if the callback returns `true`; otherwise it is
    /// dropped. Passes without a setup callback transfer unconditionally.
    /// The module owns nothing afterwards.
    ///
    /// The setup callback is where a pass declares its resources,
    /// attachments and extent.
    pub fn setup_passes(&mut self, graph: &mut RenderGraph) {
        for mut pass in self.passes.drain(..) {
            if pass.has_setup_callback() {
                if pass.run_setup_callback() {
                    graph.add_renderpass(pass);
                }
                // A declined pass is dropped here.
            } else {
                graph.add_renderpass(pass);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::pass::PassKind;

    #[test]
    fn test_setup_transfers_passes_in_submission_order() {
        let mut module = RenderModule::new();
        module.add_renderpass(RenderPass::new("first", PassKind::Draw));
        module.add_renderpass(RenderPass::new("second", PassKind::Compute));

        let mut graph = RenderGraph::new();
        module.setup_passes(&mut graph);

        assert_eq!(module.pass_count(), 0);
        let names: Vec<_> = graph.passes().iter().map(|p| p.debug_name()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_setup_callback_controls_transfer() {
        let mut module = RenderModule::new();

        let mut kept = RenderPass::new("kept", PassKind::Draw);
        kept.set_setup_callback(|_| true);
        module.add_renderpass(kept);

        let mut declined = RenderPass::new("declined", PassKind::Draw);
        declined.set_setup_callback(|_| false);
        module.add_renderpass(declined);

        let mut graph = RenderGraph::new();
        module.setup_passes(&mut graph);

        assert_eq!(graph.passes().len(), 1);
        assert_eq!(graph.passes()[0].debug_name(), "kept");
    }

    #[test]
    fn test_setup_callback_declares_resources() {
        use crate::graph::resource::{ImageUsage, ResourceHandle, ResourceInfo};

        let mut module = RenderModule::new();
        let mut pass = RenderPass::new("gbuffer", PassKind::Draw);
        pass.set_setup_callback(|pass| {
            pass.use_resource(
                ResourceHandle::image("albedo"),
                ResourceInfo::image(ImageUsage::COLOR_ATTACHMENT),
            );
            true
        });
        module.add_renderpass(pass);

        let mut graph = RenderGraph::new();
        module.setup_passes(&mut graph);

        assert_eq!(graph.passes()[0].used_resources().count(), 1);
    }
}
