//! Name-keyed lookup of live GPU images

use crate::resources::image::AllocatedImage;
use indexmap::IndexMap;
use std::rc::Rc;

/// Shared name → image lookup between the allocator and initialized stages
///
/// Pure mapping; all allocation and destruction happens in the allocator.
#[derive(Default)]
pub struct ResourceRegistry {
    buffers: IndexMap<String, Rc<AllocatedImage>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under a logical buffer name, replacing any previous entry
    pub fn register(&mut self, name: &str, image: Rc<AllocatedImage>) {
        self.buffers.insert(name.to_string(), image);
    }

    /// Look up an image by logical buffer name
    pub fn get(&self, name: &str) -> Option<Rc<AllocatedImage>> {
        self.buffers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    /// All registered buffer names, in registration order
    pub fn names(&self) -> Vec<String> {
        self.buffers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::traits::{TextureHandle, TextureViewHandle};
    use crate::backend::types::{Extent2d, TextureFormat};

    fn dummy_image(raw: u64) -> Rc<AllocatedImage> {
        Rc::new(AllocatedImage {
            texture: TextureHandle::from_raw(raw),
            view: TextureViewHandle::from_raw(raw + 1),
            format: TextureFormat::Rgba16Float,
            extent: Extent2d::new(4, 4),
        })
    }

    #[test]
    fn register_then_get_returns_shared_image() {
        let mut registry = ResourceRegistry::new();
        registry.register("drawImage", dummy_image(1));

        assert!(registry.contains("drawImage"));
        let image = registry.get("drawImage").unwrap();
        assert_eq!(image.texture, TextureHandle::from_raw(1));
        assert!(registry.get("depthImage").is_none());
    }

    #[test]
    fn registering_same_name_replaces() {
        let mut registry = ResourceRegistry::new();
        registry.register("drawImage", dummy_image(1));
        registry.register("drawImage", dummy_image(7));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("drawImage").unwrap().texture,
            TextureHandle::from_raw(7)
        );
    }

    #[test]
    fn clear_empties_the_registry() {
        let mut registry = ResourceRegistry::new();
        registry.register("a", dummy_image(1));
        registry.register("b", dummy_image(3));
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }
}
