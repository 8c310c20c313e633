//! Top-level façade binding a render graph to a resource allocator

use crate::backend::traits::CommandBufferHandle;
use crate::backend::types::Extent2d;
use crate::render_graph::graph::RenderGraph;
use crate::render_graph::requirement::BufferRequirement;
use crate::render_graph::stage::RenderStage;
use crate::resources::allocator::RenderResourceAllocator;
use crate::resources::image::AllocatedImage;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Drives the declare → allocate → bind → execute → resize/teardown
/// lifecycle over a render graph and a resource allocator
///
/// The orchestrator only observes the allocator through a weak handle: the
/// allocator may be torn down independently during shutdown, and every
/// orchestrator entry point degrades to a logged error instead of
/// faulting when it is gone. Stages can only be added before `initialize`.
#[derive(Default)]
pub struct RenderOrchestrator {
    render_graph: RenderGraph,
    resource_allocator: Weak<RefCell<RenderResourceAllocator>>,
    buffer_requirements: IndexMap<String, BufferRequirement>,
    current_extent: Extent2d,
    initialized: bool,
}

impl RenderOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage to the graph; rejected once the orchestrator is initialized
    pub fn add_stage(&mut self, stage: RenderStage) {
        if self.initialized {
            log::error!(
                "Cannot add stage '{}' after orchestrator is initialized",
                stage.name()
            );
            return;
        }

        self.render_graph.add_stage(stage);
    }

    /// Collect requirements, allocate the image pool, and initialize every
    /// stage in execution order
    ///
    /// Single-shot: a repeated call warns and returns. The allocator must
    /// already be initialized; anything else is a lifecycle-ordering bug.
    pub fn initialize(
        &mut self,
        resource_allocator: &Rc<RefCell<RenderResourceAllocator>>,
        viewport_extent: Extent2d,
    ) {
        assert!(
            resource_allocator.borrow().is_initialized(),
            "RenderOrchestrator::initialize called with an uninitialized RenderResourceAllocator"
        );

        if self.initialized {
            log::warn!("RenderOrchestrator already initialized");
            return;
        }

        self.resource_allocator = Rc::downgrade(resource_allocator);
        self.current_extent = viewport_extent;

        log::info!(
            "Initializing RenderOrchestrator with {} stage(s)",
            self.render_graph.stage_count()
        );

        self.collect_buffer_requirements();
        self.allocate_buffers();

        let allocator = resource_allocator.borrow();
        let device = allocator.device();
        let bind_groups = allocator.bind_group_service();

        let execution_order: Vec<String> = self.render_graph.execution_order().to_vec();
        for stage_name in execution_order {
            if let Some(stage) = self.render_graph.stage_mut(&stage_name) {
                stage.initialize(
                    &mut *device.borrow_mut(),
                    allocator.registry(),
                    bind_groups.clone(),
                );
            }
        }

        self.initialized = true;
        log::info!("RenderOrchestrator initialization complete");
    }

    /// Record every stage's GPU work for this frame, in execution order
    pub fn execute(&self, cmd: CommandBufferHandle) {
        assert!(
            self.initialized,
            "RenderOrchestrator::execute called before initialize()"
        );

        let Some(allocator) = self.resource_allocator.upgrade() else {
            log::error!("Resource allocator no longer available");
            return;
        };

        let allocator = allocator.borrow();
        assert!(
            allocator.is_initialized(),
            "RenderOrchestrator::execute - resource allocator no longer initialized"
        );

        let device = allocator.device();
        let mut device = device.borrow_mut();

        for stage in self.render_graph.stages_in_order() {
            stage.execute(cmd, &mut *device);
        }
    }

    /// Rebuild the physical resource pool at the new extent
    ///
    /// Full deallocate/reallocate against the requirement set collected at
    /// initialization, then a resize notification to every stage. Stage
    /// handles are fresh, not identical, after this call.
    pub fn on_resolution_changed(&mut self, new_extent: Extent2d) {
        assert!(
            self.initialized,
            "RenderOrchestrator::on_resolution_changed called before initialize()"
        );

        log::info!(
            "Resolution changed to {}x{}, recreating buffers",
            new_extent.width,
            new_extent.height
        );

        self.current_extent = new_extent;

        self.deallocate_buffers();
        self.allocate_buffers();

        self.render_graph.on_resolution_changed(new_extent);
    }

    /// Tear down stages and the image pool; no-op unless initialized
    pub fn cleanup(&mut self) {
        if !self.initialized {
            return;
        }

        log::info!("Cleaning up RenderOrchestrator");

        if let Some(allocator) = self.resource_allocator.upgrade() {
            let device = {
                let allocator = allocator.borrow();
                allocator.device()
            };
            self.render_graph.cleanup(&mut *device.borrow_mut());
            allocator.borrow_mut().deallocate_images();
        }

        self.buffer_requirements.clear();
        self.initialized = false;
    }

    /// Look up a live image by logical buffer name
    pub fn get_buffer(&self, name: &str) -> Option<Rc<AllocatedImage>> {
        let allocator = self.resource_allocator.upgrade()?;
        let image = allocator.borrow().get_image(name);
        image
    }

    /// The image the final stage renders into, for the surrounding frame loop
    pub fn final_output_buffer(&self) -> Option<Rc<AllocatedImage>> {
        let Some(final_buffer_name) = self.render_graph.final_output_buffer_name() else {
            log::error!("No final output buffer defined");
            return None;
        };

        self.get_buffer(&final_buffer_name)
    }

    /// The render graph, for advanced configuration
    pub fn graph(&self) -> &RenderGraph {
        &self.render_graph
    }

    pub fn graph_mut(&mut self) -> &mut RenderGraph {
        &mut self.render_graph
    }

    fn collect_buffer_requirements(&mut self) {
        log::debug!("Collecting buffer requirements from render graph");
        self.buffer_requirements = self.render_graph.collect_unique_buffer_requirements();
        log::debug!(
            "Collected {} unique buffer requirements",
            self.buffer_requirements.len()
        );
    }

    fn allocate_buffers(&mut self) {
        if let Some(allocator) = self.resource_allocator.upgrade() {
            allocator
                .borrow_mut()
                .allocate_images(&self.buffer_requirements, self.current_extent);
        }
    }

    fn deallocate_buffers(&mut self) {
        if let Some(allocator) = self.resource_allocator.upgrade() {
            allocator.borrow_mut().deallocate_images();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::{NullDevice, RecordedCommand};
    use crate::backend::traits::CommandBufferHandle;
    use crate::backend::types::TextureFormat;
    use crate::render_graph::factory;
    use glam::UVec3;

    fn initialized_allocator() -> (Rc<RefCell<NullDevice>>, Rc<RefCell<RenderResourceAllocator>>) {
        let device = Rc::new(RefCell::new(NullDevice::new()));
        let allocator = Rc::new(RefCell::new(RenderResourceAllocator::new()));
        allocator.borrow_mut().initialize(device.clone());
        (device, allocator)
    }

    fn background_stage() -> crate::render_graph::stage::RenderStage {
        factory::compute_stage(
            "Background",
            "shaders/background.comp.spv",
            "drawImage",
            UVec3::new(16, 16, 1),
        )
    }

    #[test]
    fn end_to_end_compute_frame() {
        let (device, allocator) = initialized_allocator();

        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.add_stage(background_stage());

        // Requirements are visible before initialization
        let requirements = orchestrator.graph().collect_unique_buffer_requirements();
        assert_eq!(requirements.len(), 1);
        assert!(requirements["drawImage"].is_output);

        orchestrator.initialize(&allocator, Extent2d::new(1920, 1080));

        let draw_image = orchestrator.get_buffer("drawImage").unwrap();
        assert_eq!(draw_image.extent, Extent2d::new(1920, 1080));

        let final_output = orchestrator.final_output_buffer().unwrap();
        assert_eq!(final_output.texture, draw_image.texture);

        device.borrow_mut().clear_commands();
        orchestrator.execute(CommandBufferHandle::from_raw(1));

        assert_eq!(
            device.borrow().commands().last().unwrap(),
            &RecordedCommand::Dispatch {
                x: 120,
                y: 68,
                z: 1
            }
        );
    }

    #[test]
    fn add_stage_after_initialize_is_rejected() {
        let (_device, allocator) = initialized_allocator();

        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.add_stage(background_stage());
        orchestrator.initialize(&allocator, Extent2d::new(640, 480));

        orchestrator.add_stage(factory::compute_stage(
            "Late",
            "shaders/late.comp.spv",
            "lateImage",
            UVec3::new(16, 16, 1),
        ));

        assert_eq!(orchestrator.graph().stage_count(), 1);
    }

    #[test]
    fn repeated_initialize_is_a_warned_no_op() {
        let (device, allocator) = initialized_allocator();

        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.add_stage(background_stage());
        orchestrator.initialize(&allocator, Extent2d::new(640, 480));

        let textures_before = device.borrow().live_texture_count();
        orchestrator.initialize(&allocator, Extent2d::new(1920, 1080));

        assert_eq!(device.borrow().live_texture_count(), textures_before);
        assert_eq!(
            orchestrator.get_buffer("drawImage").unwrap().extent,
            Extent2d::new(640, 480)
        );
    }

    #[test]
    fn execute_with_expired_allocator_records_nothing() {
        let (device, allocator) = initialized_allocator();

        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.add_stage(background_stage());
        orchestrator.initialize(&allocator, Extent2d::new(640, 480));

        device.borrow_mut().clear_commands();
        drop(allocator);

        orchestrator.execute(CommandBufferHandle::from_raw(1));
        assert!(device.borrow().commands().is_empty());

        // Lookups degrade the same way
        assert!(orchestrator.get_buffer("drawImage").is_none());
        assert!(orchestrator.final_output_buffer().is_none());
    }

    #[test]
    fn resize_rebuilds_the_pool_with_same_names_and_formats() {
        let (device, allocator) = initialized_allocator();

        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.add_stage(background_stage());
        orchestrator.initialize(&allocator, Extent2d::new(1920, 1080));

        let before = orchestrator.get_buffer("drawImage").unwrap();

        orchestrator.on_resolution_changed(Extent2d::new(1280, 720));
        orchestrator.on_resolution_changed(Extent2d::new(1280, 720));

        // Same name and format, fresh handle, one live texture
        let after = orchestrator.get_buffer("drawImage").unwrap();
        assert_eq!(after.format, before.format);
        assert_eq!(after.extent, Extent2d::new(1280, 720));
        assert_ne!(after.texture, before.texture);
        assert_eq!(device.borrow().live_texture_count(), 1);
        assert_eq!(allocator.borrow().registry().names(), ["drawImage"]);

        // Dispatch sizing follows the new extent
        device.borrow_mut().clear_commands();
        orchestrator.execute(CommandBufferHandle::from_raw(1));
        assert_eq!(
            device.borrow().commands().last().unwrap(),
            &RecordedCommand::Dispatch { x: 80, y: 45, z: 1 }
        );
    }

    #[test]
    fn cleanup_tears_down_stages_and_images() {
        let (device, allocator) = initialized_allocator();

        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.add_stage(background_stage());
        orchestrator.initialize(&allocator, Extent2d::new(640, 480));

        orchestrator.cleanup();

        assert_eq!(device.borrow().live_texture_count(), 0);
        assert_eq!(device.borrow().live_pipeline_count(), 0);
        assert!(allocator.borrow().registry().is_empty());

        // cleanup twice is a no-op
        orchestrator.cleanup();
    }

    #[test]
    fn cleanup_without_initialize_is_a_no_op() {
        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.cleanup();
    }

    #[test]
    #[should_panic(expected = "before initialize")]
    fn execute_before_initialize_is_a_lifecycle_bug() {
        let orchestrator = RenderOrchestrator::new();
        orchestrator.execute(CommandBufferHandle::from_raw(1));
    }

    #[test]
    #[should_panic(expected = "uninitialized RenderResourceAllocator")]
    fn initialize_with_uninitialized_allocator_is_a_lifecycle_bug() {
        let allocator = Rc::new(RefCell::new(RenderResourceAllocator::new()));
        let mut orchestrator = RenderOrchestrator::new();
        orchestrator.initialize(&allocator, Extent2d::new(640, 480));
    }
}
