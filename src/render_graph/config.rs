//! Declarative stage configuration
//!
//! A [`StageConfiguration`] fully describes a stage before it exists as a
//! runtime object: shaders, buffer bindings, and pipeline-kind parameters.
//! Stages derive their buffer requirements from it and compile it into a
//! concrete pipeline at initialization time.

use crate::backend::traits::{ImageBindingKind, PushConstantRange, ShaderStageFlags};
use crate::backend::types::{ShaderStage, TextureFormat};
use glam::UVec3;
use std::path::PathBuf;

/// A shader participating in a stage, by role and bytecode path
#[derive(Debug, Clone)]
pub struct ShaderBinding {
    pub stage: ShaderStage,
    pub path: PathBuf,
}

/// A named image buffer bound to a shader-visible slot
#[derive(Debug, Clone)]
pub struct ImageBinding {
    /// Logical buffer name resolved through the resource registry
    pub buffer_name: String,
    /// Binding slot index within the stage's bind group
    pub binding: u32,
    pub kind: ImageBindingKind,
    pub visibility: ShaderStageFlags,
    /// Overrides the derived requirement format when set
    pub format: Option<TextureFormat>,
}

/// Compute pipeline parameters
#[derive(Debug, Clone, Copy)]
pub struct ComputeConfig {
    pub workgroup_size: UVec3,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            workgroup_size: UVec3::new(16, 16, 1),
        }
    }
}

/// Graphics pipeline parameters
#[derive(Debug, Clone, Copy)]
pub struct GraphicsConfig {
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
    pub depth_test: bool,
    pub blending: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            color_format: TextureFormat::Rgba16Float,
            depth_format: None,
            depth_test: false,
            blending: false,
        }
    }
}

/// Pipeline kind and its parameters; a stage is exactly one of the two
#[derive(Debug, Clone, Copy)]
pub enum PipelineConfig {
    Compute(ComputeConfig),
    Graphics(GraphicsConfig),
}

/// Everything needed to build a stage
#[derive(Debug, Clone)]
pub struct StageConfiguration {
    /// Unique stage name within a graph
    pub name: String,
    pub pipeline: PipelineConfig,
    /// Ordered shader set; graphics stages expect vertex first, fragment second
    pub shaders: Vec<ShaderBinding>,
    pub input_buffers: Vec<ImageBinding>,
    pub output_buffers: Vec<ImageBinding>,
    pub push_constants: Option<PushConstantRange>,
}

impl StageConfiguration {
    pub fn is_compute(&self) -> bool {
        matches!(self.pipeline, PipelineConfig::Compute(_))
    }

    pub fn is_graphics(&self) -> bool {
        matches!(self.pipeline, PipelineConfig::Graphics(_))
    }

    pub fn compute_config(&self) -> Option<&ComputeConfig> {
        match &self.pipeline {
            PipelineConfig::Compute(config) => Some(config),
            PipelineConfig::Graphics(_) => None,
        }
    }

    pub fn graphics_config(&self) -> Option<&GraphicsConfig> {
        match &self.pipeline {
            PipelineConfig::Graphics(config) => Some(config),
            PipelineConfig::Compute(_) => None,
        }
    }
}
