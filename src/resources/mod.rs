//! Physical GPU resource ownership: images, registry, bind groups

pub mod allocator;
pub mod bind_groups;
pub mod image;
pub mod registry;

pub use allocator::RenderResourceAllocator;
pub use bind_groups::BindGroupService;
pub use image::AllocatedImage;
pub use registry::ResourceRegistry;
