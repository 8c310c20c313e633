//! Frame graph and GPU resource orchestration core
//!
//! This crate is the scheduling and resource-ownership heart of a real-time
//! renderer: it decides what GPU work runs, in what order, which image
//! resources each stage reads and writes, and how those images are
//! allocated, shared, and resized across frames.
//!
//! # Architecture
//! - [`render_graph::RenderStage`]: one schedulable unit of GPU work,
//!   compiled from a declarative [`render_graph::StageConfiguration`]
//! - [`render_graph::RenderGraph`]: owns the stage set, derives execution
//!   order, and aggregates buffer requirements
//! - [`resources::RenderResourceAllocator`]: owns the physical image pool
//!   and the bind group sub-service
//! - [`resources::ResourceRegistry`]: shared name to image lookup
//! - [`RenderOrchestrator`]: binds a graph to an allocator and drives the
//!   initialize, execute, resize, cleanup lifecycle
//!
//! The GPU itself sits behind the object-safe [`backend::GpuDevice`] trait;
//! the surrounding frame driver owns command-stream begin/end, fences, and
//! presentation. Everything here is synchronous single-threaded CPU-side
//! bookkeeping that records GPU work without waiting for it.

pub mod backend;
pub mod orchestrator;
pub mod render_graph;
pub mod resources;

pub use backend::{GpuDevice, NullDevice, SharedDevice};
pub use orchestrator::RenderOrchestrator;
pub use render_graph::{factory, RenderGraph, RenderStage, StageConfiguration};
pub use resources::{AllocatedImage, RenderResourceAllocator, ResourceRegistry};
