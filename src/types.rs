use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identifier for a node in the growth forest.
///
/// Ids are assigned in creation order and double as indices into the
/// append-only node vector; nodes are never removed, so an id stays valid
/// for the lifetime of a run.
pub type NodeId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Light,
    Support,
    Obstacle,
}

/// A static environmental resource. Created once (or appended between ticks),
/// never mutated or removed during a run.
#[derive(Clone, Copy, Debug)]
pub struct ResourcePoint {
    pub position: Vec2,
    pub intensity: f32,
    pub kind: ResourceKind,
}

impl ResourcePoint {
    pub fn new(position: Vec2, intensity: f32, kind: ResourceKind) -> Self {
        Self {
            position,
            intensity,
            kind,
        }
    }
}

/// Rendering input: the accumulated line commands for one parent's children,
/// in child-creation order. Rebuilt from the node list every tick.
#[derive(Clone, Debug)]
pub struct BranchPath {
    pub parent: NodeId,
    /// Canvas path data, one `M px py L cx cy` pair per child segment.
    pub d: String,
}
