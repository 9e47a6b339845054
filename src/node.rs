use glam::Vec2;

use crate::types::NodeId;

/// A growth tip in the plant forest.
///
/// Flat record: scalar state plus a parent id used only for path
/// reconstruction, never traversed for mutation.
#[derive(Clone, Debug)]
pub struct PlantNode {
    pub id: NodeId,
    pub position: Vec2,
    pub energy: f32,
    pub coherence: f32,
    pub distortion: f32,
    pub temporal_complexity: f32,
    pub spatial_complexity: f32,
    pub parent: Option<NodeId>,
    /// Ticks since creation. Stops advancing once the node goes inert.
    pub age: u32,
}

impl PlantNode {
    /// The initial seed node a run starts from.
    pub fn seed(position: Vec2) -> Self {
        Self {
            id: 0,
            position,
            energy: 0.5,
            coherence: 1.0,
            distortion: 0.0,
            temporal_complexity: 0.0,
            spatial_complexity: 0.5,
            parent: None,
            age: 0,
        }
    }
}
