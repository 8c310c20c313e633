//! Bind group sub-service owned by the resource allocator
//!
//! Every bind group layout and bind group in the system is created through
//! this service and destroyed by its `cleanup`. Stages keep handles only;
//! they never destroy binding state themselves.

use crate::backend::traits::*;
use crate::backend::types::TextureLayout;

/// Owns the lifetime of bind group layouts and bind groups
#[derive(Default)]
pub struct BindGroupService {
    layouts: Vec<BindGroupLayoutHandle>,
    groups: Vec<BindGroupHandle>,
}

impl BindGroupService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and track a bind group layout
    pub fn create_layout(
        &mut self,
        device: &mut dyn GpuDevice,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let layout = device.create_bind_group_layout(entries)?;
        self.layouts.push(layout);
        Ok(layout)
    }

    /// Allocate and track a bind group from a previously created layout
    pub fn allocate_group(
        &mut self,
        device: &mut dyn GpuDevice,
        layout: BindGroupLayoutHandle,
    ) -> BackendResult<BindGroupHandle> {
        let group = device.allocate_bind_group(layout)?;
        self.groups.push(group);
        Ok(group)
    }

    /// Point a binding slot at a texture view
    pub fn write_image(
        &self,
        device: &mut dyn GpuDevice,
        group: BindGroupHandle,
        binding: u32,
        view: TextureViewHandle,
        layout: TextureLayout,
        kind: ImageBindingKind,
    ) {
        device.write_bind_group_texture(group, binding, view, layout, kind);
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Destroy every tracked bind group, then every tracked layout
    pub fn cleanup(&mut self, device: &mut dyn GpuDevice) {
        for group in self.groups.drain(..) {
            device.destroy_bind_group(group);
        }
        for layout in self.layouts.drain(..) {
            device.destroy_bind_group_layout(layout);
        }
    }
}
