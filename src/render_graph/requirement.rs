//! Declarative image requirements derived from stage configurations

use crate::backend::types::{Extent2d, TextureFormat, TextureLayout, TextureUsage};

/// A named contract for an image buffer a stage needs
///
/// Requirements are derived from stage configurations, deduplicated by the
/// graph, and consumed once by the allocator. After allocation they are
/// only ever replaced wholesale by a resize.
#[derive(Debug, Clone)]
pub struct BufferRequirement {
    /// Logical buffer name; the unique key within a graph
    pub name: String,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// Track the viewport extent instead of the fixed `extent` below
    pub matches_viewport: bool,
    pub extent: Extent2d,
    /// Layout consumers should expect the image in
    pub expected_layout: TextureLayout,
    pub is_input: bool,
    pub is_output: bool,
}
