use std::collections::BTreeMap;
use std::fmt::Write as _;

use glam::{vec2, Vec2};
use rand::Rng;

use crate::config::SimulationConfig;
use crate::field::{energy_at, spatial_complexity_at, spatial_gradient_at};
use crate::node::PlantNode;
use crate::types::{BranchPath, NodeId, ResourceKind, ResourcePoint};

// Engine state - the node forest plus its static environment
pub struct EngineState {
    pub nodes: Vec<PlantNode>,
    pub resources: Vec<ResourcePoint>,
    pub paths: Vec<BranchPath>,
    pub tick: u64,
}

impl EngineState {
    pub fn new(config: &SimulationConfig) -> Self {
        let seed_position = vec2(config.width / 2.0, config.height - config.seed_margin);
        Self {
            nodes: vec![PlantNode::seed(seed_position)],
            resources: initial_resources(config),
            paths: Vec::new(),
            tick: 0,
        }
    }
}

/// The fixed initial environment: one canopy light, a trellis grid of
/// supports flanking the stem line, two obstacles, then a procedural
/// vertical-trellis fill of supports along the stem line.
fn initial_resources(config: &SimulationConfig) -> Vec<ResourcePoint> {
    let cx = config.width / 2.0;
    let mut resources = vec![ResourcePoint::new(
        vec2(cx + 50.0, 100.0),
        1.0,
        ResourceKind::Light,
    )];

    for x in [cx - 100.0, cx + 100.0] {
        for y in [250.0, 350.0, 450.0] {
            resources.push(ResourcePoint::new(vec2(x, y), 0.6, ResourceKind::Support));
        }
    }

    resources.push(ResourcePoint::new(
        vec2(cx - 150.0, 450.0),
        0.9,
        ResourceKind::Obstacle,
    ));
    resources.push(ResourcePoint::new(
        vec2(cx + 150.0, 380.0),
        0.8,
        ResourceKind::Obstacle,
    ));

    let mut y = 150.0;
    while y <= 500.0 {
        resources.push(ResourcePoint::new(vec2(cx, y), 0.5, ResourceKind::Support));
        y += 50.0;
    }

    resources
}

/// One pure transition: previous snapshot in, next node list out.
///
/// Every decision reads the previous tick's snapshot, so nodes created within
/// a tick never influence other nodes' decisions in that same tick.
pub fn advance_nodes<R: Rng>(
    prev: &[PlantNode],
    resources: &[ResourcePoint],
    config: &SimulationConfig,
    rng: &mut R,
) -> Vec<PlantNode> {
    // One count for the whole tick; same-tick children never gate siblings.
    let active_nodes = prev
        .iter()
        .filter(|n| n.age < config.active_max_age)
        .count();

    let mut next: Vec<PlantNode> = Vec::with_capacity(prev.len() + 8);
    let mut spawned: Vec<PlantNode> = Vec::new();

    for node in prev {
        if node.age > config.max_update_age {
            // Inert: still rendered, never updated again.
            next.push(node.clone());
            continue;
        }

        let spatial = spatial_complexity_at(node.position, resources, config);
        let energy = energy_at(node.position, resources, config);
        let gradient = spatial_gradient_at(node.position, resources, config);

        let strain = node.distortion / (node.coherence + config.stabilizer);
        let dh =
            -config.coherence_damping * (strain + gradient.length() * config.gradient_scale);
        let dd = config.response_gain * (dh.abs() * energy).ln_1p();
        let sign = if node.coherence > 0.0 { 1.0 } else { -1.0 };
        let dt = config.response_gain * (dh.abs() * energy).tanh() * sign;

        let mut updated = node.clone();
        updated.coherence = (node.coherence + dh).max(0.0);
        updated.distortion = node.distortion + dd;
        updated.temporal_complexity += dt;
        updated.spatial_complexity = spatial;
        updated.energy = energy;
        updated.age += 1;

        // Branching: distortion past the critical threshold, enough energy,
        // old enough, and room left in the immediate neighborhood. The
        // crowding guard is a hard precondition.
        if updated.distortion > config.branch_distortion_threshold
            && energy > config.branch_min_energy
            && node.age > config.branch_min_age
            && neighbors_within(prev, node, config.crowding_radius_sq()) < config.crowding_cap
        {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let offset = vec2(angle.cos(), angle.sin()) * step_length(energy, config);
            spawned.push(PlantNode {
                id: prev.len() + spawned.len(),
                position: node.position + offset,
                energy,
                coherence: 1.0,
                distortion: 0.0,
                temporal_complexity: updated.temporal_complexity,
                spatial_complexity: spatial,
                parent: Some(node.id),
                age: 0,
            });
            // Partial release of instability, not a full reset.
            updated.distortion = config.branch_release_distortion;
        }

        // Growth: independent of branching, gated on coherence, age, the
        // global active-node cap, and a coin flip. Exceeding a cap is a
        // silent no-op.
        if updated.coherence > config.growth_min_coherence
            && node.age < config.growth_max_age
            && active_nodes < config.active_node_cap
            && rng.gen::<f32>() > 0.5
        {
            let direction =
                growth_direction(node.position, spatial, gradient, resources, config);
            // A growth step represents further elapsed process time, so the
            // tick's temporal advance applies once more.
            updated.temporal_complexity += dt;
            spawned.push(PlantNode {
                id: prev.len() + spawned.len(),
                position: node.position + direction * step_length(energy, config),
                energy,
                coherence: updated.coherence,
                distortion: updated.distortion,
                temporal_complexity: updated.temporal_complexity,
                spatial_complexity: spatial,
                parent: Some(node.id),
                age: 0,
            });
        }

        next.push(updated);
    }

    next.extend(spawned);
    next
}

fn step_length(energy: f32, config: &SimulationConfig) -> f32 {
    config.growth_rate * (0.5 + 0.5 * energy)
}

fn neighbors_within(nodes: &[PlantNode], node: &PlantNode, radius_sq: f32) -> usize {
    nodes
        .iter()
        .filter(|other| other.id != node.id)
        .filter(|other| other.position.distance_squared(node.position) < radius_sq)
        .count()
}

/// Growth direction: a fixed upward bias, pushed away from rising spatial
/// complexity, pulled toward in-range lights. The light pull is amplified by
/// the pure-time factor `max(0, 1 - 2S)` - direct light-seeking dominates
/// when local complexity is near zero.
fn growth_direction(
    position: Vec2,
    spatial: f32,
    gradient: Vec2,
    resources: &[ResourcePoint],
    config: &SimulationConfig,
) -> Vec2 {
    let mut direction =
        vec2(config.growth_bias_x, config.growth_bias_y) - gradient * config.gradient_avoidance;

    let pure_time = (1.0 - 2.0 * spatial).max(0.0);
    if pure_time > 0.0 {
        let mut attraction = Vec2::ZERO;
        for resource in resources {
            if resource.kind != ResourceKind::Light {
                continue;
            }
            let distance = position.distance(resource.position);
            if distance < config.light_sensing_radius {
                let weight =
                    resource.intensity * (1.0 - distance / config.light_sensing_radius);
                let toward = (resource.position - position)
                    .try_normalize()
                    .unwrap_or(Vec2::ZERO);
                attraction += toward * weight;
            }
        }
        direction += attraction * config.light_attraction * pure_time;
    }

    direction.try_normalize().unwrap_or(Vec2::NEG_Y)
}

/// Rebuild the per-parent path list from the node list. Children accumulate
/// onto their parent's entry in creation order.
pub fn derive_paths(nodes: &[PlantNode]) -> Vec<BranchPath> {
    let mut entries: BTreeMap<NodeId, String> = BTreeMap::new();
    for node in nodes {
        let Some(parent) = node.parent else { continue };
        let from = nodes[parent].position;
        let d = entries.entry(parent).or_default();
        if !d.is_empty() {
            d.push(' ');
        }
        let _ = write!(
            d,
            "M{:.1} {:.1} L{:.1} {:.1}",
            from.x, from.y, node.position.x, node.position.y
        );
    }
    entries
        .into_iter()
        .map(|(parent, d)| BranchPath { parent, d })
        .collect()
}

// Simulation - engine state plus config and control flags
pub struct Simulation {
    pub state: EngineState,
    pub config: SimulationConfig,
    pub paused: bool,
}

// Allows sim.nodes instead of sim.state.nodes
impl std::ops::Deref for Simulation {
    type Target = EngineState;
    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl std::ops::DerefMut for Simulation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.state
    }
}

impl Simulation {
    pub fn new() -> Self {
        Self::with_config(SimulationConfig::default())
    }

    pub fn with_config(config: SimulationConfig) -> Self {
        let state = EngineState::new(&config);
        Self {
            state,
            config,
            paused: false,
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Discard the current run and reinitialize to the seed node and the
    /// fixed initial resource layout.
    pub fn reset(&mut self) {
        self.state = EngineState::new(&self.config);
    }

    /// Append a resource point. Safe between ticks; the collection is
    /// append-only for the duration of a run.
    pub fn add_resource(&mut self, position: Vec2, intensity: f32, kind: ResourceKind) {
        self.state
            .resources
            .push(ResourcePoint::new(position, intensity, kind));
    }

    /// Advance one tick: replace the node list via the pure transition and
    /// rebuild the derived paths.
    pub fn step<R: Rng>(&mut self, rng: &mut R) {
        let nodes = advance_nodes(&self.state.nodes, &self.state.resources, &self.config, rng);
        self.state.paths = derive_paths(&nodes);
        self.state.nodes = nodes;
        self.state.tick += 1;
    }

    pub fn stats(&self) -> (usize, usize, usize, f32, f32) {
        let mut total_coherence = 0.0f32;
        let mut total_energy = 0.0f32;
        let mut active = 0;
        for node in &self.state.nodes {
            total_coherence += node.coherence;
            total_energy += node.energy;
            if node.age < self.config.active_max_age {
                active += 1;
            }
        }
        let avg_coherence = if self.state.nodes.is_empty() {
            0.0
        } else {
            total_coherence / self.state.nodes.len() as f32
        };
        (
            self.state.nodes.len(),
            active,
            self.state.paths.len(),
            avg_coherence,
            total_energy,
        )
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
