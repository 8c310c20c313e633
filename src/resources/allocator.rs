//! Physical allocation of the image pool declared by a render graph

use crate::backend::traits::{GpuDevice, SharedDevice};
use crate::backend::types::{Extent2d, TextureDescriptor};
use crate::render_graph::requirement::BufferRequirement;
use crate::resources::bind_groups::BindGroupService;
use crate::resources::image::AllocatedImage;
use crate::resources::registry::ResourceRegistry;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Owns the physical image pool backing a render graph
///
/// The allocator is the single owner of image lifetime. An image exists
/// exactly when its name appears in the requirement set it was last given;
/// resize is a full deallocate/reallocate cycle, never an in-place patch.
/// Two-phase construction: `initialize` must run before anything else, and
/// every other method treats an uninitialized allocator as a lifecycle bug.
#[derive(Default)]
pub struct RenderResourceAllocator {
    initialized: bool,
    device: Option<SharedDevice>,
    bind_groups: Rc<RefCell<BindGroupService>>,
    registry: ResourceRegistry,
    images: IndexMap<String, Rc<AllocatedImage>>,
}

impl RenderResourceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the device handle and bring up the bind group service
    pub fn initialize(&mut self, device: SharedDevice) {
        self.device = Some(device);
        self.bind_groups = Rc::new(RefCell::new(BindGroupService::new()));
        self.initialized = true;
        log::info!("RenderResourceAllocator initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn shared_device(&self) -> SharedDevice {
        self.device
            .clone()
            .expect("initialized allocator always holds a device")
    }

    /// Allocate one image per requirement and register it under the
    /// requirement's name
    ///
    /// Existing allocations are not reused; callers deallocate first. A
    /// device-side failure skips that one image and leaves the rest of the
    /// pool in a defined state.
    pub fn allocate_images(
        &mut self,
        requirements: &IndexMap<String, BufferRequirement>,
        extent: Extent2d,
    ) {
        assert!(
            self.initialized,
            "RenderResourceAllocator::allocate_images called before initialize()"
        );

        log::debug!("Allocating {} images", requirements.len());

        let device = self.shared_device();
        let mut device = device.borrow_mut();

        for (name, req) in requirements {
            let image_extent = if req.matches_viewport {
                extent
            } else {
                req.extent
            };

            let desc = TextureDescriptor {
                label: Some(name.clone()),
                width: image_extent.width,
                height: image_extent.height,
                depth: 1,
                mip_levels: 1,
                format: req.format,
                usage: req.usage,
            };

            let texture = match device.create_texture(&desc) {
                Ok(texture) => texture,
                Err(err) => {
                    log::error!("Failed to allocate image '{}': {}", name, err);
                    continue;
                }
            };

            let view = match device.create_texture_view(texture) {
                Ok(view) => view,
                Err(err) => {
                    log::error!("Failed to create view for image '{}': {}", name, err);
                    device.destroy_texture(texture);
                    continue;
                }
            };

            let image = Rc::new(AllocatedImage {
                texture,
                view,
                format: req.format,
                extent: image_extent,
            });

            self.images.insert(name.clone(), image.clone());
            self.registry.register(name, image);

            log::debug!(
                "  Allocated image '{}' ({}x{}, {:?})",
                name,
                image_extent.width,
                image_extent.height,
                req.format
            );
        }
    }

    /// Destroy every tracked image and clear the registry
    pub fn deallocate_images(&mut self) {
        assert!(
            self.initialized,
            "RenderResourceAllocator::deallocate_images called before initialize()"
        );

        log::debug!("Deallocating {} images", self.images.len());

        let device = self.shared_device();
        let mut device = device.borrow_mut();

        for (_, image) in self.images.drain(..) {
            device.destroy_texture(image.texture);
        }

        self.registry.clear();
    }

    /// Look up a live image by logical buffer name
    pub fn get_image(&self, name: &str) -> Option<Rc<AllocatedImage>> {
        assert!(
            self.initialized,
            "RenderResourceAllocator::get_image called before initialize()"
        );
        self.registry.get(name)
    }

    /// All live images, in allocation order
    pub fn images(&self) -> &IndexMap<String, Rc<AllocatedImage>> {
        assert!(
            self.initialized,
            "RenderResourceAllocator::images called before initialize()"
        );
        &self.images
    }

    pub fn registry(&self) -> &ResourceRegistry {
        assert!(
            self.initialized,
            "RenderResourceAllocator::registry called before initialize()"
        );
        &self.registry
    }

    /// Shared handle to the bind group sub-service
    pub fn bind_group_service(&self) -> Rc<RefCell<BindGroupService>> {
        assert!(
            self.initialized,
            "RenderResourceAllocator::bind_group_service called before initialize()"
        );
        self.bind_groups.clone()
    }

    /// Shared handle to the device this allocator was initialized with
    pub fn device(&self) -> SharedDevice {
        assert!(
            self.initialized,
            "RenderResourceAllocator::device called before initialize()"
        );
        self.shared_device()
    }

    /// Release all images and binding state; the allocator can be
    /// re-initialized afterwards
    pub fn cleanup(&mut self) {
        if !self.initialized {
            return;
        }

        self.deallocate_images();

        let device = self.shared_device();
        self.bind_groups.borrow_mut().cleanup(&mut *device.borrow_mut());

        self.device = None;
        self.initialized = false;
        log::info!("RenderResourceAllocator cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullDevice;
    use crate::backend::types::{TextureFormat, TextureLayout, TextureUsage};

    fn viewport_requirement(name: &str) -> BufferRequirement {
        BufferRequirement {
            name: name.to_string(),
            format: TextureFormat::Rgba16Float,
            usage: TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
            matches_viewport: true,
            extent: Extent2d::ZERO,
            expected_layout: TextureLayout::General,
            is_input: false,
            is_output: true,
        }
    }

    fn requirement_map(names: &[&str]) -> IndexMap<String, BufferRequirement> {
        names
            .iter()
            .map(|name| (name.to_string(), viewport_requirement(name)))
            .collect()
    }

    #[test]
    fn allocate_registers_images_at_viewport_extent() {
        let device = Rc::new(RefCell::new(NullDevice::new()));
        let mut allocator = RenderResourceAllocator::new();
        allocator.initialize(device.clone());

        allocator.allocate_images(&requirement_map(&["drawImage"]), Extent2d::new(1920, 1080));

        let image = allocator.get_image("drawImage").unwrap();
        assert_eq!(image.extent, Extent2d::new(1920, 1080));
        assert_eq!(device.borrow().live_texture_count(), 1);

        let desc = device
            .borrow()
            .texture_descriptor(image.texture)
            .cloned()
            .unwrap();
        assert_eq!((desc.width, desc.height), (1920, 1080));
        assert_eq!(desc.format, TextureFormat::Rgba16Float);
    }

    #[test]
    fn fixed_extent_requirements_ignore_the_viewport() {
        let device = Rc::new(RefCell::new(NullDevice::new()));
        let mut allocator = RenderResourceAllocator::new();
        allocator.initialize(device);

        let mut requirements = requirement_map(&["shadowMap"]);
        let shadow = requirements.get_mut("shadowMap").unwrap();
        shadow.matches_viewport = false;
        shadow.extent = Extent2d::new(2048, 2048);

        allocator.allocate_images(&requirements, Extent2d::new(1280, 720));

        let image = allocator.get_image("shadowMap").unwrap();
        assert_eq!(image.extent, Extent2d::new(2048, 2048));
    }

    #[test]
    fn allocate_then_deallocate_round_trip_empties_everything() {
        let device = Rc::new(RefCell::new(NullDevice::new()));
        let mut allocator = RenderResourceAllocator::new();
        allocator.initialize(device.clone());

        let requirements = requirement_map(&["drawImage", "historyImage"]);
        allocator.allocate_images(&requirements, Extent2d::new(800, 600));
        assert_eq!(allocator.images().len(), 2);

        allocator.deallocate_images();

        assert!(allocator.registry().is_empty());
        assert!(allocator.get_image("drawImage").is_none());
        assert!(allocator.get_image("historyImage").is_none());
        assert_eq!(device.borrow().live_texture_count(), 0);
    }

    #[test]
    fn deallocate_on_empty_pool_is_safe() {
        let device = Rc::new(RefCell::new(NullDevice::new()));
        let mut allocator = RenderResourceAllocator::new();
        allocator.initialize(device);

        allocator.deallocate_images();
        allocator.deallocate_images();
        assert!(allocator.registry().is_empty());
    }

    #[test]
    #[should_panic(expected = "before initialize")]
    fn allocate_before_initialize_is_a_lifecycle_bug() {
        let mut allocator = RenderResourceAllocator::new();
        allocator.allocate_images(&IndexMap::new(), Extent2d::new(1, 1));
    }

    #[test]
    fn cleanup_releases_device_and_allows_reinitialize() {
        let device = Rc::new(RefCell::new(NullDevice::new()));
        let mut allocator = RenderResourceAllocator::new();
        allocator.initialize(device.clone());

        allocator.allocate_images(&requirement_map(&["drawImage"]), Extent2d::new(64, 64));
        allocator.cleanup();

        assert!(!allocator.is_initialized());
        assert_eq!(device.borrow().live_texture_count(), 0);

        allocator.initialize(device);
        assert!(allocator.is_initialized());
    }
}
