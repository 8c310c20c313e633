//! Render graph: stages, configurations, requirements, and ordering

pub mod config;
pub mod factory;
pub mod graph;
pub mod requirement;
pub mod stage;

pub use config::{
    ComputeConfig, GraphicsConfig, ImageBinding, PipelineConfig, ShaderBinding, StageConfiguration,
};
pub use graph::{RenderGraph, StageConnection};
pub use requirement::BufferRequirement;
pub use stage::{RenderStage, StageDebugInfo};
