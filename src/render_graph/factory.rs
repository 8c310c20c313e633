//! Builder functions for common stage configurations

use crate::backend::traits::{ImageBindingKind, ShaderStageFlags};
use crate::backend::types::{ShaderStage, TextureFormat};
use crate::render_graph::config::*;
use crate::render_graph::stage::RenderStage;
use glam::UVec3;
use std::path::PathBuf;

/// Compute stage writing a single storage-image output at binding 0
pub fn compute_stage(
    name: &str,
    shader_path: impl Into<PathBuf>,
    output_buffer: &str,
    workgroup_size: UVec3,
) -> RenderStage {
    let config = StageConfiguration {
        name: name.to_string(),
        pipeline: PipelineConfig::Compute(ComputeConfig { workgroup_size }),
        shaders: vec![ShaderBinding {
            stage: ShaderStage::Compute,
            path: shader_path.into(),
        }],
        input_buffers: Vec::new(),
        output_buffers: vec![ImageBinding {
            buffer_name: output_buffer.to_string(),
            binding: 0,
            kind: ImageBindingKind::StorageImage,
            visibility: ShaderStageFlags::COMPUTE,
            format: None,
        }],
        push_constants: None,
    };

    RenderStage::new(config)
}

/// Compute stage with arbitrary input/output bindings and workgroup setup
pub fn compute_stage_advanced(
    name: &str,
    shader_path: impl Into<PathBuf>,
    inputs: Vec<ImageBinding>,
    outputs: Vec<ImageBinding>,
    compute_config: ComputeConfig,
) -> RenderStage {
    let config = StageConfiguration {
        name: name.to_string(),
        pipeline: PipelineConfig::Compute(compute_config),
        shaders: vec![ShaderBinding {
            stage: ShaderStage::Compute,
            path: shader_path.into(),
        }],
        input_buffers: inputs,
        output_buffers: outputs,
        push_constants: None,
    };

    RenderStage::new(config)
}

/// Graphics stage with a vertex/fragment shader pair rendering into a
/// single output at binding 0
pub fn graphics_stage(
    name: &str,
    vertex_shader_path: impl Into<PathBuf>,
    fragment_shader_path: impl Into<PathBuf>,
    output_buffer: &str,
    color_format: TextureFormat,
) -> RenderStage {
    let config = StageConfiguration {
        name: name.to_string(),
        pipeline: PipelineConfig::Graphics(GraphicsConfig {
            color_format,
            ..Default::default()
        }),
        shaders: vec![
            ShaderBinding {
                stage: ShaderStage::Vertex,
                path: vertex_shader_path.into(),
            },
            ShaderBinding {
                stage: ShaderStage::Fragment,
                path: fragment_shader_path.into(),
            },
        ],
        input_buffers: Vec::new(),
        output_buffers: vec![ImageBinding {
            buffer_name: output_buffer.to_string(),
            binding: 0,
            kind: ImageBindingKind::StorageImage,
            visibility: ShaderStageFlags::FRAGMENT,
            format: None,
        }],
        push_constants: None,
    };

    RenderStage::new(config)
}

/// Escape hatch for fully custom configurations
pub fn from_configuration(config: StageConfiguration) -> RenderStage {
    RenderStage::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_stage_shape() {
        let stage = compute_stage(
            "Background",
            "shaders/background.comp.spv",
            "drawImage",
            UVec3::new(16, 16, 1),
        );
        let config = stage.configuration();

        assert!(config.is_compute());
        assert_eq!(config.shaders.len(), 1);
        assert_eq!(config.shaders[0].stage, ShaderStage::Compute);
        assert_eq!(config.output_buffers.len(), 1);
        assert_eq!(config.output_buffers[0].buffer_name, "drawImage");
        assert_eq!(config.output_buffers[0].binding, 0);
        assert_eq!(
            config.compute_config().unwrap().workgroup_size,
            UVec3::new(16, 16, 1)
        );
        assert!(config.graphics_config().is_none());
    }

    #[test]
    fn graphics_stage_shape() {
        let stage = graphics_stage(
            "Present",
            "shaders/fullscreen.vert.spv",
            "shaders/present.frag.spv",
            "drawImage",
            TextureFormat::Bgra8Unorm,
        );
        let config = stage.configuration();

        assert!(config.is_graphics());
        assert_eq!(config.shaders.len(), 2);
        assert_eq!(config.shaders[0].stage, ShaderStage::Vertex);
        assert_eq!(config.shaders[1].stage, ShaderStage::Fragment);
        assert_eq!(
            config.graphics_config().unwrap().color_format,
            TextureFormat::Bgra8Unorm
        );
        assert_eq!(
            config.output_buffers[0].visibility,
            ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn advanced_compute_stage_keeps_custom_bindings() {
        let inputs = vec![ImageBinding {
            buffer_name: "historyImage".to_string(),
            binding: 1,
            kind: ImageBindingKind::SampledImage,
            visibility: ShaderStageFlags::COMPUTE,
            format: None,
        }];
        let outputs = vec![ImageBinding {
            buffer_name: "drawImage".to_string(),
            binding: 0,
            kind: ImageBindingKind::StorageImage,
            visibility: ShaderStageFlags::COMPUTE,
            format: Some(TextureFormat::Rgba32Float),
        }];

        let stage = compute_stage_advanced(
            "Accumulate",
            "shaders/accumulate.comp.spv",
            inputs,
            outputs,
            ComputeConfig {
                workgroup_size: UVec3::new(8, 8, 4),
            },
        );

        let requirements = stage.buffer_requirements();
        assert_eq!(requirements.len(), 2);
        assert!(requirements[0].is_input);
        assert_eq!(requirements[1].format, TextureFormat::Rgba32Float);
    }
}
