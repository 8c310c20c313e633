//! Physically allocated image resources

use crate::backend::traits::{TextureHandle, TextureViewHandle};
use crate::backend::types::{Extent2d, TextureFormat};

/// A GPU image together with its default view and creation parameters
///
/// Owned by the [`RenderResourceAllocator`](crate::resources::RenderResourceAllocator);
/// the registry and initialized stages hold shared non-owning clones and
/// must never destroy the underlying texture themselves.
#[derive(Debug, Clone)]
pub struct AllocatedImage {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub format: TextureFormat,
    pub extent: Extent2d,
}
