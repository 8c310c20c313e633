//! A single schedulable unit of GPU work

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::config::{PipelineConfig, StageConfiguration};
use crate::render_graph::requirement::BufferRequirement;
use crate::resources::bind_groups::BindGroupService;
use crate::resources::registry::ResourceRegistry;
use std::cell::RefCell;
use std::rc::Rc;

/// Compiled pipeline object, selected by the configuration tag
///
/// Exactly one variant exists per initialized stage; the other kind is
/// never constructed.
#[derive(Debug, Clone, Copy)]
enum StagePipeline {
    Compute(ComputePipelineHandle),
    Graphics(RenderPipelineHandle),
}

/// Snapshot of a stage's identity and wiring for diagnostics
#[derive(Debug, Clone)]
pub struct StageDebugInfo {
    pub stage_name: String,
    pub input_buffers: Vec<String>,
    pub output_buffers: Vec<String>,
    pub pipeline_kind: &'static str,
    pub resolution: Extent2d,
}

/// Runtime render stage built from a [`StageConfiguration`]
///
/// Lifecycle: constructed uninitialized, `initialize` compiles the
/// configuration into a pipeline and binding state, `execute` records GPU
/// commands repeatedly, `cleanup` returns the stage to the uninitialized
/// state. Reconfiguration is only allowed while uninitialized.
pub struct RenderStage {
    config: StageConfiguration,
    bind_groups: Option<Rc<RefCell<BindGroupService>>>,
    current_extent: Extent2d,
    shader_modules: Vec<ShaderModuleHandle>,
    pipeline: Option<StagePipeline>,
    bind_group_layout: Option<BindGroupLayoutHandle>,
    bind_group: Option<BindGroupHandle>,
    color_target: Option<TextureViewHandle>,
    depth_target: Option<TextureViewHandle>,
    initialized: bool,
}

impl RenderStage {
    pub fn new(config: StageConfiguration) -> Self {
        log::debug!("Created stage '{}'", config.name);
        Self {
            config,
            bind_groups: None,
            current_extent: Extent2d::ZERO,
            shader_modules: Vec::new(),
            pipeline: None,
            bind_group_layout: None,
            bind_group: None,
            color_target: None,
            depth_target: None,
            initialized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn configuration(&self) -> &StageConfiguration {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Replace the configuration; rejected while the stage is initialized
    pub fn update_configuration(&mut self, config: StageConfiguration) {
        if self.initialized {
            log::warn!(
                "Stage '{}': cannot update configuration while initialized",
                self.config.name
            );
            return;
        }
        self.config = config;
        log::info!("Stage '{}': configuration updated", self.config.name);
    }

    /// Derive this stage's buffer requirements from its configuration
    ///
    /// Pure: depends only on the configuration, never on initialization
    /// state, so the graph can aggregate requirements before any stage
    /// is initialized.
    pub fn buffer_requirements(&self) -> Vec<BufferRequirement> {
        let mut requirements = Vec::new();

        let output_format = match &self.config.pipeline {
            PipelineConfig::Graphics(gfx) => gfx.color_format,
            PipelineConfig::Compute(_) => TextureFormat::Rgba16Float,
        };

        for input in &self.config.input_buffers {
            requirements.push(BufferRequirement {
                name: input.buffer_name.clone(),
                format: input.format.unwrap_or(TextureFormat::Rgba16Float),
                usage: TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
                matches_viewport: true,
                extent: Extent2d::ZERO,
                expected_layout: TextureLayout::General,
                is_input: true,
                is_output: false,
            });
        }

        for output in &self.config.output_buffers {
            requirements.push(BufferRequirement {
                name: output.buffer_name.clone(),
                format: output.format.unwrap_or(output_format),
                usage: TextureUsage::STORAGE_BINDING
                    | TextureUsage::COPY_SRC
                    | TextureUsage::COPY_DST
                    | TextureUsage::RENDER_ATTACHMENT
                    | TextureUsage::TEXTURE_BINDING,
                matches_viewport: true,
                extent: Extent2d::ZERO,
                expected_layout: TextureLayout::General,
                is_input: false,
                is_output: true,
            });
        }

        requirements
    }

    /// Load shaders, build binding state against the registry, and compile
    /// the pipeline
    ///
    /// Guarded against double initialization. A failed shader load or a
    /// missing named resource is logged and skipped; a pipeline that cannot
    /// be compiled aborts initialization of this stage only.
    pub fn initialize(
        &mut self,
        device: &mut dyn GpuDevice,
        registry: &ResourceRegistry,
        bind_groups: Rc<RefCell<BindGroupService>>,
    ) {
        if self.initialized {
            log::warn!("Stage '{}' already initialized", self.config.name);
            return;
        }

        log::info!(
            "Stage '{}': initializing {} pipeline",
            self.config.name,
            if self.config.is_compute() {
                "compute"
            } else {
                "graphics"
            }
        );

        self.bind_groups = Some(bind_groups);

        // Working extent comes from the first declared output, if allocated
        if let Some(first) = self.config.output_buffers.first() {
            if let Some(image) = registry.get(&first.buffer_name) {
                self.current_extent = image.extent;
            }
        }

        self.load_shaders(device);
        self.create_bindings(device, registry);
        self.resolve_attachments(registry);

        if !self.compile_pipeline(device) {
            return;
        }

        self.initialized = true;
        log::info!("Stage '{}': initialization complete", self.config.name);
    }

    fn load_shaders(&mut self, device: &mut dyn GpuDevice) {
        self.shader_modules.clear();

        for shader in &self.config.shaders {
            match device.create_shader_module(&shader.path) {
                Ok(module) => {
                    self.shader_modules.push(module);
                    log::debug!(
                        "Stage '{}': loaded shader {}",
                        self.config.name,
                        shader.path.display()
                    );
                }
                Err(err) => {
                    log::error!(
                        "Stage '{}': failed to load shader {}: {}",
                        self.config.name,
                        shader.path.display(),
                        err
                    );
                }
            }
        }
    }

    fn create_bindings(&mut self, device: &mut dyn GpuDevice, registry: &ResourceRegistry) {
        let entries: Vec<BindGroupLayoutEntry> = self
            .config
            .input_buffers
            .iter()
            .chain(self.config.output_buffers.iter())
            .map(|binding| BindGroupLayoutEntry {
                binding: binding.binding,
                visibility: binding.visibility,
                kind: binding.kind,
            })
            .collect();

        if entries.is_empty() {
            return;
        }

        let Some(service) = self.bind_groups.clone() else {
            return;
        };
        let mut service = service.borrow_mut();

        let layout = match service.create_layout(device, &entries) {
            Ok(layout) => layout,
            Err(err) => {
                log::error!(
                    "Stage '{}': failed to create bind group layout: {}",
                    self.config.name,
                    err
                );
                return;
            }
        };
        self.bind_group_layout = Some(layout);

        let group = match service.allocate_group(device, layout) {
            Ok(group) => group,
            Err(err) => {
                log::error!(
                    "Stage '{}': failed to allocate bind group: {}",
                    self.config.name,
                    err
                );
                return;
            }
        };
        self.bind_group = Some(group);

        for binding in self
            .config
            .input_buffers
            .iter()
            .chain(self.config.output_buffers.iter())
        {
            let Some(image) = registry.get(&binding.buffer_name) else {
                log::error!(
                    "Stage '{}': buffer '{}' not found in registry",
                    self.config.name,
                    binding.buffer_name
                );
                continue;
            };

            service.write_image(
                device,
                group,
                binding.binding,
                image.view,
                TextureLayout::General,
                binding.kind,
            );
        }

        log::debug!(
            "Stage '{}': wrote {} bindings",
            self.config.name,
            entries.len()
        );
    }

    fn resolve_attachments(&mut self, registry: &ResourceRegistry) {
        if !self.config.is_graphics() {
            return;
        }

        for output in &self.config.output_buffers {
            let Some(image) = registry.get(&output.buffer_name) else {
                continue;
            };

            if image.format.is_depth() {
                if self.depth_target.is_none() {
                    self.depth_target = Some(image.view);
                }
            } else if self.color_target.is_none() {
                self.color_target = Some(image.view);
            }
        }
    }

    fn compile_pipeline(&mut self, device: &mut dyn GpuDevice) -> bool {
        let layouts: Vec<BindGroupLayoutHandle> = self.bind_group_layout.into_iter().collect();

        match &self.config.pipeline {
            PipelineConfig::Compute(_) => {
                if self.shader_modules.len() != 1 {
                    log::error!(
                        "Stage '{}': compute pipeline requires exactly one loaded shader, have {}",
                        self.config.name,
                        self.shader_modules.len()
                    );
                    return false;
                }

                let desc = ComputePipelineDescriptor {
                    label: Some(self.config.name.clone()),
                    shader: self.shader_modules[0],
                    bind_group_layouts: layouts,
                    push_constants: self.config.push_constants,
                };

                match device.create_compute_pipeline(&desc) {
                    Ok(pipeline) => {
                        self.pipeline = Some(StagePipeline::Compute(pipeline));
                        log::debug!("Stage '{}': created compute pipeline", self.config.name);
                        true
                    }
                    Err(err) => {
                        log::error!(
                            "Stage '{}': failed to create compute pipeline: {}",
                            self.config.name,
                            err
                        );
                        false
                    }
                }
            }
            PipelineConfig::Graphics(gfx) => {
                if self.shader_modules.len() < 2 {
                    log::error!(
                        "Stage '{}': graphics pipeline requires vertex and fragment shaders",
                        self.config.name
                    );
                    return false;
                }

                let desc = RenderPipelineDescriptor {
                    label: Some(self.config.name.clone()),
                    vertex_shader: self.shader_modules[0],
                    fragment_shader: self.shader_modules[1],
                    bind_group_layouts: layouts,
                    color_format: gfx.color_format,
                    depth_format: gfx.depth_format,
                    depth_test: gfx.depth_test,
                    blending: gfx.blending,
                    push_constants: self.config.push_constants,
                };

                match device.create_render_pipeline(&desc) {
                    Ok(pipeline) => {
                        self.pipeline = Some(StagePipeline::Graphics(pipeline));
                        log::debug!("Stage '{}': created graphics pipeline", self.config.name);
                        true
                    }
                    Err(err) => {
                        log::error!(
                            "Stage '{}': failed to create graphics pipeline: {}",
                            self.config.name,
                            err
                        );
                        false
                    }
                }
            }
        }
    }

    /// Record this stage's GPU work into the given command buffer
    pub fn execute(&self, cmd: CommandBufferHandle, device: &mut dyn GpuDevice) {
        if !self.initialized {
            log::error!("Stage '{}' executed before initialization", self.config.name);
            return;
        }

        match &self.config.pipeline {
            PipelineConfig::Compute(_) => self.execute_compute(cmd, device),
            PipelineConfig::Graphics(_) => self.execute_graphics(cmd, device),
        }
    }

    fn execute_compute(&self, cmd: CommandBufferHandle, device: &mut dyn GpuDevice) {
        let Some(StagePipeline::Compute(pipeline)) = self.pipeline else {
            log::error!("Stage '{}' has no compute pipeline", self.config.name);
            return;
        };
        let Some(compute) = self.config.compute_config() else {
            return;
        };

        device.cmd_bind_compute_pipeline(cmd, pipeline);
        if let Some(group) = self.bind_group {
            device.cmd_set_bind_group(cmd, 0, group);
        }

        let workgroup = compute.workgroup_size;
        let group_count_x = (self.current_extent.width + workgroup.x - 1) / workgroup.x;
        let group_count_y = (self.current_extent.height + workgroup.y - 1) / workgroup.y;
        // Z is not extent-driven; the configured workgroup depth is the
        // dispatch depth.
        let group_count_z = workgroup.z;

        device.cmd_dispatch(cmd, group_count_x, group_count_y, group_count_z);
    }

    fn execute_graphics(&self, cmd: CommandBufferHandle, device: &mut dyn GpuDevice) {
        let Some(StagePipeline::Graphics(pipeline)) = self.pipeline else {
            log::error!("Stage '{}' has no graphics pipeline", self.config.name);
            return;
        };
        let Some(color_view) = self.color_target else {
            log::error!(
                "Stage '{}' has no color target to render into",
                self.config.name
            );
            return;
        };

        let desc = RenderPassDescriptor {
            label: Some(self.config.name.clone()),
            color_attachments: vec![ColorAttachment {
                view: color_view,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 0.0]),
                store_op: StoreOp::Store,
            }],
            depth_attachment: self.depth_target.map(|view| DepthAttachment {
                view,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 0.0]),
                store_op: StoreOp::Store,
                clear_depth: 1.0,
            }),
            extent: self.current_extent,
        };

        device.cmd_begin_rendering(cmd, &desc);
        device.cmd_set_viewport(
            cmd,
            0.0,
            0.0,
            self.current_extent.width as f32,
            self.current_extent.height as f32,
            0.0,
            1.0,
        );
        device.cmd_set_scissor(
            cmd,
            0,
            0,
            self.current_extent.width,
            self.current_extent.height,
        );
        device.cmd_bind_render_pipeline(cmd, pipeline);
        if let Some(group) = self.bind_group {
            device.cmd_set_bind_group(cmd, 0, group);
        }
        // Fullscreen triangle; vertex positions are derived in the shader
        device.cmd_draw(cmd, 0..3, 0..1);
        device.cmd_end_rendering(cmd);
    }

    /// Note the new viewport extent for subsequent dispatch sizing
    ///
    /// Bookkeeping only; image reallocation belongs to the allocator.
    pub fn on_resolution_changed(&mut self, extent: Extent2d) {
        self.current_extent = extent;
        log::info!(
            "Stage '{}': resolution changed to {}x{}",
            self.config.name,
            extent.width,
            extent.height
        );
    }

    /// Destroy the pipeline and shader modules and return to uninitialized
    ///
    /// Bind group and layout lifetime stays with the shared bind group
    /// service.
    pub fn cleanup(&mut self, device: &mut dyn GpuDevice) {
        log::info!("Stage '{}': cleaning up", self.config.name);

        match self.pipeline.take() {
            Some(StagePipeline::Compute(pipeline)) => device.destroy_compute_pipeline(pipeline),
            Some(StagePipeline::Graphics(pipeline)) => device.destroy_render_pipeline(pipeline),
            None => {}
        }

        for module in self.shader_modules.drain(..) {
            device.destroy_shader_module(module);
        }

        self.bind_group = None;
        self.bind_group_layout = None;
        self.bind_groups = None;
        self.color_target = None;
        self.depth_target = None;
        self.initialized = false;
    }

    pub fn debug_info(&self) -> StageDebugInfo {
        StageDebugInfo {
            stage_name: self.config.name.clone(),
            input_buffers: self
                .config
                .input_buffers
                .iter()
                .map(|binding| binding.buffer_name.clone())
                .collect(),
            output_buffers: self
                .config
                .output_buffers
                .iter()
                .map(|binding| binding.buffer_name.clone())
                .collect(),
            pipeline_kind: if self.config.is_compute() {
                "compute"
            } else {
                "graphics"
            },
            resolution: self.current_extent,
        }
    }
}
