//! Stage collection, execution ordering, and requirement aggregation

use crate::backend::traits::GpuDevice;
use crate::backend::types::Extent2d;
use crate::render_graph::requirement::BufferRequirement;
use crate::render_graph::stage::RenderStage;
use indexmap::map::Entry;
use indexmap::IndexMap;

/// Advisory dependency edge between two stages
///
/// Recorded for future DAG scheduling; does not influence today's linear
/// execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConnection {
    pub from_stage: String,
    pub to_stage: String,
    pub buffer_name: String,
}

/// Owns the stage set and the derived execution order
///
/// Stages are keyed by unique name; inserting an existing name replaces the
/// stage cleanly. The execution order is rebuilt on every structural
/// mutation and always contains exactly the current stage names.
#[derive(Default)]
pub struct RenderGraph {
    stages: IndexMap<String, RenderStage>,
    execution_order: Vec<String>,
    connections: Vec<StageConnection>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a stage by name and rebuild the execution order
    pub fn add_stage(&mut self, stage: RenderStage) {
        let stage_name = stage.name().to_string();
        self.stages.insert(stage_name.clone(), stage);
        self.rebuild_execution_order();
        log::info!("Added stage '{}'", stage_name);
    }

    /// Remove a stage if present, then rebuild the execution order
    pub fn remove_stage(&mut self, stage_name: &str) {
        if self.stages.shift_remove(stage_name).is_some() {
            self.rebuild_execution_order();
            log::info!("Removed stage '{}'", stage_name);
        }
    }

    /// Drop all stages, the execution order, and all recorded connections
    pub fn clear_stages(&mut self) {
        self.stages.clear();
        self.execution_order.clear();
        self.connections.clear();
        log::info!("Cleared all stages");
    }

    /// Record an advisory stage-to-stage dependency edge
    pub fn connect_stages(&mut self, from_stage: &str, to_stage: &str, buffer_name: &str) {
        self.connections.push(StageConnection {
            from_stage: from_stage.to_string(),
            to_stage: to_stage.to_string(),
            buffer_name: buffer_name.to_string(),
        });
        log::debug!(
            "Connected stage '{}' to '{}' via buffer '{}'",
            from_stage,
            to_stage,
            buffer_name
        );
    }

    pub fn connections(&self) -> &[StageConnection] {
        &self.connections
    }

    /// Current linear execution order
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    pub fn stage_count(&self) -> usize {
        self.execution_order.len()
    }

    pub fn stage(&self, stage_name: &str) -> Option<&RenderStage> {
        self.stages.get(stage_name)
    }

    pub fn stage_mut(&mut self, stage_name: &str) -> Option<&mut RenderStage> {
        self.stages.get_mut(stage_name)
    }

    /// Stages in execution order
    pub fn stages_in_order(&self) -> impl Iterator<Item = &RenderStage> {
        self.execution_order
            .iter()
            .filter_map(|name| self.stages.get(name))
    }

    /// Every requirement of every stage, in execution order, undeduplicated
    pub fn collect_all_buffer_requirements(&self) -> Vec<BufferRequirement> {
        self.stages_in_order()
            .flat_map(|stage| stage.buffer_requirements())
            .collect()
    }

    /// Deduplicated requirement set keyed by buffer name
    ///
    /// Walks stages in execution order. The first requirement seen for a
    /// name wins its format (a later mismatch is a warning, not an error);
    /// usage flags are unioned across all duplicates. Every consumer that
    /// aliases buffers between stages relies on this merge being
    /// deterministic.
    pub fn collect_unique_buffer_requirements(&self) -> IndexMap<String, BufferRequirement> {
        let mut unique: IndexMap<String, BufferRequirement> = IndexMap::new();

        for stage in self.stages_in_order() {
            for req in stage.buffer_requirements() {
                match unique.entry(req.name.clone()) {
                    Entry::Vacant(entry) => {
                        log::debug!("Stage '{}' requires buffer '{}'", stage.name(), req.name);
                        entry.insert(req);
                    }
                    Entry::Occupied(mut entry) => {
                        let existing = entry.get_mut();
                        if existing.format != req.format {
                            log::warn!(
                                "Stage '{}' requires buffer '{}' with format {:?}, keeping first-seen {:?}",
                                stage.name(),
                                req.name,
                                req.format,
                                existing.format
                            );
                        }
                        existing.usage |= req.usage;
                    }
                }
            }
        }

        log::debug!("Collected {} unique buffer requirements", unique.len());
        unique
    }

    /// Name of the first output buffer of the last stage in execution order
    pub fn final_output_buffer_name(&self) -> Option<String> {
        let last_stage_name = self.execution_order.last()?;
        let stage = self.stages.get(last_stage_name)?;

        stage
            .buffer_requirements()
            .into_iter()
            .find(|req| req.is_output)
            .map(|req| req.name)
    }

    /// Clean up every owned stage
    pub fn cleanup(&mut self, device: &mut dyn GpuDevice) {
        log::info!("Cleaning up render graph");
        for (_, stage) in self.stages.iter_mut() {
            stage.cleanup(device);
        }
    }

    /// Propagate a viewport change to every owned stage
    pub fn on_resolution_changed(&mut self, extent: Extent2d) {
        log::info!(
            "Resolution changed to {}x{}",
            extent.width,
            extent.height
        );
        for (_, stage) in self.stages.iter_mut() {
            stage.on_resolution_changed(extent);
        }
    }

    // Linear ordering over the name-keyed stage map. The future topological
    // sort over recorded connections replaces this method only; every other
    // contract stays as is.
    fn rebuild_execution_order(&mut self) {
        self.execution_order = self.stages.keys().cloned().collect();
        log::debug!(
            "Rebuilt execution order with {} stage(s)",
            self.execution_order.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{TextureFormat, TextureUsage};
    use crate::render_graph::config::{ComputeConfig, ImageBinding};
    use crate::render_graph::factory;
    use crate::backend::traits::{ImageBindingKind, ShaderStageFlags};
    use glam::UVec3;

    fn stage(name: &str, output: &str) -> crate::render_graph::stage::RenderStage {
        factory::compute_stage(
            name,
            format!("shaders/{name}.comp.spv"),
            output,
            UVec3::new(16, 16, 1),
        )
    }

    fn stage_with_format(
        name: &str,
        output: &str,
        format: TextureFormat,
    ) -> crate::render_graph::stage::RenderStage {
        factory::compute_stage_advanced(
            name,
            format!("shaders/{name}.comp.spv"),
            Vec::new(),
            vec![ImageBinding {
                buffer_name: output.to_string(),
                binding: 0,
                kind: ImageBindingKind::StorageImage,
                visibility: ShaderStageFlags::COMPUTE,
                format: Some(format),
            }],
            ComputeConfig::default(),
        )
    }

    #[test]
    fn execution_order_tracks_the_stage_set_exactly() {
        let mut graph = RenderGraph::new();
        graph.add_stage(stage("A", "a"));
        graph.add_stage(stage("B", "b"));
        graph.add_stage(stage("C", "c"));
        assert_eq!(graph.execution_order(), ["A", "B", "C"]);

        graph.remove_stage("B");
        assert_eq!(graph.execution_order(), ["A", "C"]);

        graph.remove_stage("B"); // absent: no-op
        assert_eq!(graph.execution_order(), ["A", "C"]);

        graph.add_stage(stage("D", "d"));
        assert_eq!(graph.execution_order(), ["A", "C", "D"]);
        assert_eq!(graph.stage_count(), 3);
    }

    #[test]
    fn adding_a_duplicate_name_replaces_the_stage() {
        let mut graph = RenderGraph::new();
        graph.add_stage(stage("A", "first"));
        graph.add_stage(stage("A", "second"));

        assert_eq!(graph.stage_count(), 1);
        let requirements = graph.collect_all_buffer_requirements();
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].name, "second");
    }

    #[test]
    fn clear_drops_stages_order_and_connections() {
        let mut graph = RenderGraph::new();
        graph.add_stage(stage("A", "a"));
        graph.add_stage(stage("B", "b"));
        graph.connect_stages("A", "B", "a");

        graph.clear_stages();

        assert_eq!(graph.stage_count(), 0);
        assert!(graph.execution_order().is_empty());
        assert!(graph.connections().is_empty());
    }

    #[test]
    fn connections_are_recorded_but_do_not_affect_order() {
        let mut graph = RenderGraph::new();
        graph.add_stage(stage("A", "a"));
        graph.add_stage(stage("B", "b"));
        graph.connect_stages("B", "A", "b");

        assert_eq!(
            graph.connections(),
            [StageConnection {
                from_stage: "B".to_string(),
                to_stage: "A".to_string(),
                buffer_name: "b".to_string(),
            }]
        );
        assert_eq!(graph.execution_order(), ["A", "B"]);
    }

    #[test]
    fn unique_requirements_are_idempotent() {
        let mut graph = RenderGraph::new();
        graph.add_stage(stage("A", "shared"));
        graph.add_stage(stage("B", "shared"));
        graph.add_stage(stage("C", "other"));

        let first = graph.collect_unique_buffer_requirements();
        let second = graph.collect_unique_buffer_requirements();

        assert_eq!(first.len(), second.len());
        for (name, req) in &first {
            let other = &second[name];
            assert_eq!(req.format, other.format);
            assert_eq!(req.usage, other.usage);
            assert_eq!(req.is_output, other.is_output);
        }
    }

    #[test]
    fn format_conflicts_keep_first_seen_and_union_usage() {
        let mut graph = RenderGraph::new();
        graph.add_stage(stage_with_format("A", "shared", TextureFormat::Rgba16Float));
        graph.add_stage(stage_with_format("B", "shared", TextureFormat::Rgba32Float));

        let unique = graph.collect_unique_buffer_requirements();
        assert_eq!(unique.len(), 1);

        let req = &unique["shared"];
        assert_eq!(req.format, TextureFormat::Rgba16Float);
        assert!(req.usage.contains(
            TextureUsage::STORAGE_BINDING
                | TextureUsage::COPY_SRC
                | TextureUsage::COPY_DST
                | TextureUsage::RENDER_ATTACHMENT
                | TextureUsage::TEXTURE_BINDING
        ));
    }

    #[test]
    fn final_output_comes_from_the_last_stage() {
        let mut graph = RenderGraph::new();
        assert_eq!(graph.final_output_buffer_name(), None);

        graph.add_stage(stage("A", "a"));
        graph.add_stage(stage("B", "b"));
        assert_eq!(graph.final_output_buffer_name(), Some("b".to_string()));

        graph.remove_stage("B");
        assert_eq!(graph.final_output_buffer_name(), Some("a".to_string()));
    }
}
