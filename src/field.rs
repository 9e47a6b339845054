use glam::Vec2;

use crate::config::SimulationConfig;
use crate::types::{ResourceKind, ResourcePoint};

/// Energy available at a position: ambient baseline plus a quadratic-falloff
/// contribution from every light source inside the sensing radius.
///
/// Pure function of (position, resources); the renderer samples it across a
/// grid for heatmaps, the engine per node.
pub fn energy_at(position: Vec2, resources: &[ResourcePoint], config: &SimulationConfig) -> f32 {
    let radius = config.light_sensing_radius;
    let mut energy = config.ambient_energy;
    for resource in resources {
        if resource.kind != ResourceKind::Light {
            continue;
        }
        let distance = position.distance(resource.position);
        if distance < radius {
            let falloff = 1.0 - distance / radius;
            energy += resource.intensity * falloff * falloff;
        }
    }
    energy.clamp(0.1, 1.0)
}

/// Spatial complexity (crowding/resistance) at a position: baseline, raised
/// by nearby obstacles, lowered by nearby supports.
pub fn spatial_complexity_at(
    position: Vec2,
    resources: &[ResourcePoint],
    config: &SimulationConfig,
) -> f32 {
    let radius = config.proximity_radius;
    let mut complexity = config.baseline_complexity;
    for resource in resources {
        let distance = position.distance(resource.position);
        if distance >= radius {
            continue;
        }
        let falloff = 1.0 - distance / radius;
        match resource.kind {
            ResourceKind::Obstacle => complexity += resource.intensity * falloff,
            ResourceKind::Support => {
                complexity -= resource.intensity * falloff * config.support_relief
            }
            ResourceKind::Light => {}
        }
    }
    complexity.clamp(0.1, 1.0)
}

/// Forward finite-difference gradient of the spatial-complexity field.
/// Not normalized; the magnitude carries the local slope.
pub fn spatial_gradient_at(
    position: Vec2,
    resources: &[ResourcePoint],
    config: &SimulationConfig,
) -> Vec2 {
    let delta = config.gradient_step;
    let here = spatial_complexity_at(position, resources, config);
    let along_x = spatial_complexity_at(position + Vec2::new(delta, 0.0), resources, config);
    let along_y = spatial_complexity_at(position + Vec2::new(0.0, delta), resources, config);
    Vec2::new((along_x - here) / delta, (along_y - here) / delta)
}
