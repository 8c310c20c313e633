//! Headless walkthrough of the orchestration lifecycle
//!
//! Builds a two-stage graph against the recording device, runs a frame,
//! resizes, runs another frame, and prints everything that was recorded.
//! Run with `cargo run --example headless`.

use glam::UVec3;
use render_core::backend::{
    CommandBufferHandle, Extent2d, GpuDevice, ImageBindingKind, ShaderStageFlags, TextureLayout,
};
use render_core::render_graph::{factory, ComputeConfig, ImageBinding};
use render_core::{NullDevice, RenderOrchestrator, RenderResourceAllocator};
use std::cell::RefCell;
use std::rc::Rc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    let device = Rc::new(RefCell::new(NullDevice::new()));
    let allocator = Rc::new(RefCell::new(RenderResourceAllocator::new()));
    allocator.borrow_mut().initialize(device.clone());

    let mut orchestrator = RenderOrchestrator::new();
    orchestrator.add_stage(factory::compute_stage(
        "Background",
        "shaders/background.comp.spv",
        "drawImage",
        UVec3::new(16, 16, 1),
    ));
    orchestrator.add_stage(factory::compute_stage_advanced(
        "Tonemap",
        "shaders/tonemap.comp.spv",
        vec![ImageBinding {
            buffer_name: "drawImage".to_string(),
            binding: 0,
            kind: ImageBindingKind::SampledImage,
            visibility: ShaderStageFlags::COMPUTE,
            format: None,
        }],
        vec![ImageBinding {
            buffer_name: "presentImage".to_string(),
            binding: 1,
            kind: ImageBindingKind::StorageImage,
            visibility: ShaderStageFlags::COMPUTE,
            format: None,
        }],
        ComputeConfig::default(),
    ));
    orchestrator
        .graph_mut()
        .connect_stages("Background", "Tonemap", "drawImage");

    let extent = Extent2d::new(1920, 1080);
    orchestrator.initialize(&allocator, extent);

    // Frame 1: frame constants, stage execution, then hand the final image
    // to the (imaginary) present path.
    let cmd = CommandBufferHandle::from_raw(1);
    device
        .borrow_mut()
        .cmd_push_constants(cmd, ShaderStageFlags::COMPUTE, 0, bytemuck::bytes_of(&extent));
    orchestrator.execute(cmd);

    if let Some(output) = orchestrator.final_output_buffer() {
        log::info!(
            "Final output '{}x{}' ready for present",
            output.extent.width,
            output.extent.height
        );
        device.borrow_mut().cmd_texture_barrier(
            cmd,
            output.texture,
            TextureLayout::General,
            TextureLayout::TransferSrc,
        );
    }

    // Viewport shrank: the pool is rebuilt, dispatch sizing follows.
    orchestrator.on_resolution_changed(Extent2d::new(1280, 720));
    orchestrator.execute(CommandBufferHandle::from_raw(2));

    {
        let device = device.borrow();
        println!("Recorded {} commands:", device.commands().len());
        for command in device.commands() {
            println!("  {:?}", command);
        }
    }

    orchestrator.cleanup();
    allocator.borrow_mut().cleanup();
}
