//! Device abstraction consumed by the render core
//!
//! The orchestration layer records work against this trait; the actual GPU
//! backend (and the surrounding frame driver) live outside this crate.

use crate::backend::types::*;
use std::cell::RefCell;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create shader module: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to create pipeline: {0}")]
    PipelineCreationFailed(String),
    #[error("Failed to create bind group: {0}")]
    BindGroupCreationFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u64);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewHandle(u64);

/// Handle to a loaded shader module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleHandle(u64);

/// Handle to a bind group layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutHandle(u64);

/// Handle to a bind group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindGroupHandle(u64);

/// Handle to a render (graphics) pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineHandle(u64);

/// Handle to a compute pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputePipelineHandle(u64);

/// Handle to a command buffer owned by the frame driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferHandle(u64);

macro_rules! impl_raw_handle {
    ($($handle:ty),* $(,)?) => {
        $(impl $handle {
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        })*
    };
}

impl_raw_handle!(
    TextureHandle,
    TextureViewHandle,
    ShaderModuleHandle,
    BindGroupLayoutHandle,
    BindGroupHandle,
    RenderPipelineHandle,
    ComputePipelineHandle,
    CommandBufferHandle,
);

/// Shader stage visibility flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStageFlags(u32);

impl ShaderStageFlags {
    pub const VERTEX: Self = Self(1 << 0);
    pub const FRAGMENT: Self = Self(1 << 1);
    pub const COMPUTE: Self = Self(1 << 2);
    pub const VERTEX_FRAGMENT: Self = Self((1 << 0) | (1 << 1));
    pub const ALL: Self = Self((1 << 0) | (1 << 1) | (1 << 2));

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for ShaderStageFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Kind of image binding visible to a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageBindingKind {
    /// Read/write storage image
    StorageImage,
    /// Sampled read-only image
    SampledImage,
}

/// Bind group layout entry
#[derive(Debug, Clone)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub kind: ImageBindingKind,
}

/// Push constant range shared by a pipeline layout
#[derive(Debug, Clone, Copy)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

/// Render pipeline descriptor
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub vertex_shader: ShaderModuleHandle,
    pub fragment_shader: ShaderModuleHandle,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub depth_test: bool,
    pub blending: bool,
    pub push_constants: Option<PushConstantRange>,
}

/// Compute pipeline descriptor
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: Option<String>,
    pub shader: ShaderModuleHandle,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub push_constants: Option<PushConstantRange>,
}

#[derive(Debug, Clone)]
pub enum LoadOp {
    Clear([f32; 4]),
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

/// Color attachment for a rendering pass
#[derive(Debug, Clone)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

/// Depth attachment for a rendering pass
#[derive(Debug, Clone)]
pub struct DepthAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub clear_depth: f32,
}

/// Rendering pass descriptor
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: Option<DepthAttachment>,
    pub extent: Extent2d,
}

/// GPU device interface consumed by the render core
///
/// Object-safe so the core can be driven by any backend (or the headless
/// recording device) without generics leaking through the orchestration
/// types. Command-recording methods take the command buffer handle the
/// frame driver obtained for the current frame.
pub trait GpuDevice {
    // Resource creation

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Create a view over the whole texture
    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle>;

    /// Destroy a texture and its views
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Load a shader module from a bytecode file
    fn create_shader_module(&mut self, path: &Path) -> BackendResult<ShaderModuleHandle>;

    /// Destroy a shader module
    fn destroy_shader_module(&mut self, module: ShaderModuleHandle);

    // Bind groups

    /// Create a bind group layout
    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    /// Destroy a bind group layout
    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle);

    /// Allocate a bind group from the device pool
    fn allocate_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<BindGroupHandle>;

    /// Return a bind group to the device pool
    fn destroy_bind_group(&mut self, group: BindGroupHandle);

    /// Point a binding slot of a bind group at a texture view
    fn write_bind_group_texture(
        &mut self,
        group: BindGroupHandle,
        binding: u32,
        view: TextureViewHandle,
        layout: TextureLayout,
        kind: ImageBindingKind,
    );

    // Pipelines

    /// Create a render pipeline
    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    /// Destroy a render pipeline
    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    /// Create a compute pipeline
    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle>;

    /// Destroy a compute pipeline
    fn destroy_compute_pipeline(&mut self, pipeline: ComputePipelineHandle);

    // Command recording

    /// Begin a rendering pass
    fn cmd_begin_rendering(&mut self, cmd: CommandBufferHandle, desc: &RenderPassDescriptor);

    /// End the current rendering pass
    fn cmd_end_rendering(&mut self, cmd: CommandBufferHandle);

    /// Bind a render pipeline
    fn cmd_bind_render_pipeline(&mut self, cmd: CommandBufferHandle, pipeline: RenderPipelineHandle);

    /// Bind a compute pipeline
    fn cmd_bind_compute_pipeline(
        &mut self,
        cmd: CommandBufferHandle,
        pipeline: ComputePipelineHandle,
    );

    /// Bind a bind group at the given set index
    fn cmd_set_bind_group(&mut self, cmd: CommandBufferHandle, index: u32, group: BindGroupHandle);

    /// Set the viewport
    fn cmd_set_viewport(
        &mut self,
        cmd: CommandBufferHandle,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    );

    /// Set the scissor rect
    fn cmd_set_scissor(&mut self, cmd: CommandBufferHandle, x: u32, y: u32, width: u32, height: u32);

    /// Push constant data visible to the given stages
    fn cmd_push_constants(
        &mut self,
        cmd: CommandBufferHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    /// Draw primitives
    fn cmd_draw(&mut self, cmd: CommandBufferHandle, vertices: Range<u32>, instances: Range<u32>);

    /// Dispatch compute work
    fn cmd_dispatch(&mut self, cmd: CommandBufferHandle, x: u32, y: u32, z: u32);

    /// Transition a texture between layouts
    fn cmd_texture_barrier(
        &mut self,
        cmd: CommandBufferHandle,
        texture: TextureHandle,
        from: TextureLayout,
        to: TextureLayout,
    );
}

/// Shared single-threaded handle to a device implementation
pub type SharedDevice = Rc<RefCell<dyn GpuDevice>>;
