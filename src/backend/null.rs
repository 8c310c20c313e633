//! Headless device that records commands instead of touching a GPU
//!
//! Backs the unit tests and the headless demo: every handle it vends is a
//! plain counter, every recorded command is kept for inspection, and
//! failure of shader loads or pipeline creation can be injected per test.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// A command recorded by [`NullDevice`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginRendering {
        color_attachments: Vec<TextureViewHandle>,
        has_depth: bool,
        extent: Extent2d,
    },
    EndRendering,
    BindRenderPipeline(RenderPipelineHandle),
    BindComputePipeline(ComputePipelineHandle),
    SetBindGroup {
        index: u32,
        group: BindGroupHandle,
    },
    SetViewport {
        width: f32,
        height: f32,
    },
    SetScissor {
        width: u32,
        height: u32,
    },
    PushConstants {
        stages: ShaderStageFlags,
        offset: u32,
        size: u32,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    TextureBarrier {
        texture: TextureHandle,
        from: TextureLayout,
        to: TextureLayout,
    },
}

/// Recording [`GpuDevice`] with no GPU behind it
#[derive(Default)]
pub struct NullDevice {
    next_handle: u64,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    shader_modules: HashSet<ShaderModuleHandle>,
    bind_group_layouts: HashSet<BindGroupLayoutHandle>,
    bind_groups: HashSet<BindGroupHandle>,
    render_pipelines: HashSet<RenderPipelineHandle>,
    compute_pipelines: HashSet<ComputePipelineHandle>,
    commands: Vec<RecordedCommand>,
    failing_shader_paths: HashSet<PathBuf>,
    fail_pipeline_creation: bool,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Make subsequent loads of `path` fail
    pub fn fail_shader_path(&mut self, path: impl Into<PathBuf>) {
        self.failing_shader_paths.insert(path.into());
    }

    /// Make all subsequent pipeline creation fail
    pub fn fail_pipeline_creation(&mut self, fail: bool) {
        self.fail_pipeline_creation = fail;
    }

    /// Commands recorded so far, in submission order
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of textures currently alive
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Descriptor the given texture was created with, if it is still alive
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture)
    }

    pub fn live_shader_module_count(&self) -> usize {
        self.shader_modules.len()
    }

    pub fn live_bind_group_count(&self) -> usize {
        self.bind_groups.len()
    }

    pub fn live_bind_group_layout_count(&self) -> usize {
        self.bind_group_layouts.len()
    }

    pub fn live_pipeline_count(&self) -> usize {
        self.render_pipelines.len() + self.compute_pipelines.len()
    }
}

impl GpuDevice for NullDevice {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let handle = TextureHandle::from_raw(self.next());
        self.textures.insert(handle, desc.clone());
        Ok(handle)
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::TextureCreationFailed(format!(
                "view requested for unknown texture {:?}",
                texture
            )));
        }
        Ok(TextureViewHandle::from_raw(self.next()))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn create_shader_module(&mut self, path: &Path) -> BackendResult<ShaderModuleHandle> {
        if self.failing_shader_paths.contains(path) {
            return Err(BackendError::ShaderCreationFailed(
                path.display().to_string(),
            ));
        }
        let handle = ShaderModuleHandle::from_raw(self.next());
        self.shader_modules.insert(handle);
        Ok(handle)
    }

    fn destroy_shader_module(&mut self, module: ShaderModuleHandle) {
        self.shader_modules.remove(&module);
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let handle = BindGroupLayoutHandle::from_raw(self.next());
        self.bind_group_layouts.insert(handle);
        Ok(handle)
    }

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle) {
        self.bind_group_layouts.remove(&layout);
    }

    fn allocate_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<BindGroupHandle> {
        if !self.bind_group_layouts.contains(&layout) {
            return Err(BackendError::BindGroupCreationFailed(format!(
                "unknown layout {:?}",
                layout
            )));
        }
        let handle = BindGroupHandle::from_raw(self.next());
        self.bind_groups.insert(handle);
        Ok(handle)
    }

    fn destroy_bind_group(&mut self, group: BindGroupHandle) {
        self.bind_groups.remove(&group);
    }

    fn write_bind_group_texture(
        &mut self,
        _group: BindGroupHandle,
        _binding: u32,
        _view: TextureViewHandle,
        _layout: TextureLayout,
        _kind: ImageBindingKind,
    ) {
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        if self.fail_pipeline_creation {
            return Err(BackendError::PipelineCreationFailed(
                desc.label.clone().unwrap_or_default(),
            ));
        }
        let handle = RenderPipelineHandle::from_raw(self.next());
        self.render_pipelines.insert(handle);
        Ok(handle)
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.render_pipelines.remove(&pipeline);
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        if self.fail_pipeline_creation {
            return Err(BackendError::PipelineCreationFailed(
                desc.label.clone().unwrap_or_default(),
            ));
        }
        let handle = ComputePipelineHandle::from_raw(self.next());
        self.compute_pipelines.insert(handle);
        Ok(handle)
    }

    fn destroy_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.compute_pipelines.remove(&pipeline);
    }

    fn cmd_begin_rendering(&mut self, _cmd: CommandBufferHandle, desc: &RenderPassDescriptor) {
        self.commands.push(RecordedCommand::BeginRendering {
            color_attachments: desc.color_attachments.iter().map(|a| a.view).collect(),
            has_depth: desc.depth_attachment.is_some(),
            extent: desc.extent,
        });
    }

    fn cmd_end_rendering(&mut self, _cmd: CommandBufferHandle) {
        self.commands.push(RecordedCommand::EndRendering);
    }

    fn cmd_bind_render_pipeline(
        &mut self,
        _cmd: CommandBufferHandle,
        pipeline: RenderPipelineHandle,
    ) {
        self.commands
            .push(RecordedCommand::BindRenderPipeline(pipeline));
    }

    fn cmd_bind_compute_pipeline(
        &mut self,
        _cmd: CommandBufferHandle,
        pipeline: ComputePipelineHandle,
    ) {
        self.commands
            .push(RecordedCommand::BindComputePipeline(pipeline));
    }

    fn cmd_set_bind_group(
        &mut self,
        _cmd: CommandBufferHandle,
        index: u32,
        group: BindGroupHandle,
    ) {
        self.commands
            .push(RecordedCommand::SetBindGroup { index, group });
    }

    fn cmd_set_viewport(
        &mut self,
        _cmd: CommandBufferHandle,
        _x: f32,
        _y: f32,
        width: f32,
        height: f32,
        _min_depth: f32,
        _max_depth: f32,
    ) {
        self.commands
            .push(RecordedCommand::SetViewport { width, height });
    }

    fn cmd_set_scissor(
        &mut self,
        _cmd: CommandBufferHandle,
        _x: u32,
        _y: u32,
        width: u32,
        height: u32,
    ) {
        self.commands
            .push(RecordedCommand::SetScissor { width, height });
    }

    fn cmd_push_constants(
        &mut self,
        _cmd: CommandBufferHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        self.commands.push(RecordedCommand::PushConstants {
            stages,
            offset,
            size: data.len() as u32,
        });
    }

    fn cmd_draw(&mut self, _cmd: CommandBufferHandle, vertices: Range<u32>, instances: Range<u32>) {
        self.commands.push(RecordedCommand::Draw {
            vertices,
            instances,
        });
    }

    fn cmd_dispatch(&mut self, _cmd: CommandBufferHandle, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch { x, y, z });
    }

    fn cmd_texture_barrier(
        &mut self,
        _cmd: CommandBufferHandle,
        texture: TextureHandle,
        from: TextureLayout,
        to: TextureLayout,
    ) {
        self.commands.push(RecordedCommand::TextureBarrier {
            texture,
            from,
            to,
        });
    }
}
