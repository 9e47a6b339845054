// API module - HTTP endpoints the browser renderer polls for state

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use glam::{vec2, Vec2};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::engine::Simulation;
use crate::field::{energy_at, spatial_complexity_at};
use crate::types::{NodeId, ResourceKind, ResourcePoint};
use rand::rngs::StdRng;
use rand::SeedableRng;

// Serializable versions of simulation data for API responses
#[derive(Serialize, Clone)]
pub struct NodeData {
    pub id: NodeId,
    pub x: f32,
    pub y: f32,
    pub energy: f32,
    pub coherence: f32,
    pub distortion: f32,
    pub temporal_complexity: f32,
    pub spatial_complexity: f32,
    pub parent: Option<NodeId>,
    pub age: u32,
}

#[derive(Serialize, Clone)]
pub struct ResourceData {
    pub x: f32,
    pub y: f32,
    pub intensity: f32,
    pub kind: ResourceKind,
}

#[derive(Serialize, Clone)]
pub struct PathData {
    pub parent: NodeId,
    pub d: String,
}

#[derive(Serialize, Clone)]
pub struct StatsData {
    pub node_count: usize,
    pub active_count: usize,
    pub path_count: usize,
    pub avg_coherence: f32,
    pub total_energy: f32,
    pub tick: u64,
}

#[derive(Serialize, Clone)]
pub struct SimulationStateResponse {
    pub nodes: Vec<NodeData>,
    pub resources: Vec<ResourceData>,
    pub paths: Vec<PathData>,
    pub stats: StatsData,
    pub paused: bool,
}

/// Grid of field samples for heatmap rendering, row-major, sampled at cell
/// centers across the world rectangle.
#[derive(Serialize, Clone)]
pub struct FieldGridData {
    pub kind: String,
    pub cols: usize,
    pub rows: usize,
    pub values: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
pub struct StepQuery {
    pub steps: Option<usize>,
}

#[derive(Deserialize)]
pub struct FieldQuery {
    pub kind: String,
    pub cols: Option<usize>,
    pub rows: Option<usize>,
}

#[derive(Deserialize)]
pub struct AddResourceRequest {
    pub x: f32,
    pub y: f32,
    pub intensity: f32,
    pub kind: ResourceKind,
}

// Shared state for the API server
#[derive(Clone)]
pub struct ApiState {
    pub simulation: Arc<Mutex<Simulation>>,
    pub rng: Arc<Mutex<StdRng>>,
}

impl ApiState {
    pub fn new(sim: Simulation) -> Self {
        let rng = StdRng::from_entropy();
        Self {
            simulation: Arc::new(Mutex::new(sim)),
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

// Helper function to convert simulation state to an API response
fn simulation_to_response(sim: &Simulation) -> SimulationStateResponse {
    SimulationStateResponse {
        nodes: sim
            .state
            .nodes
            .iter()
            .map(|n| NodeData {
                id: n.id,
                x: n.position.x,
                y: n.position.y,
                energy: n.energy,
                coherence: n.coherence,
                distortion: n.distortion,
                temporal_complexity: n.temporal_complexity,
                spatial_complexity: n.spatial_complexity,
                parent: n.parent,
                age: n.age,
            })
            .collect(),
        resources: sim
            .state
            .resources
            .iter()
            .map(|r| ResourceData {
                x: r.position.x,
                y: r.position.y,
                intensity: r.intensity,
                kind: r.kind,
            })
            .collect(),
        paths: sim
            .state
            .paths
            .iter()
            .map(|p| PathData {
                parent: p.parent,
                d: p.d.clone(),
            })
            .collect(),
        stats: stats_data(sim),
        paused: sim.paused,
    }
}

fn stats_data(sim: &Simulation) -> StatsData {
    let (node_count, active_count, path_count, avg_coherence, total_energy) = sim.stats();
    StatsData {
        node_count,
        active_count,
        path_count,
        avg_coherence,
        total_energy,
        tick: sim.state.tick,
    }
}

// GET /state - Get current simulation state
async fn get_state(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(simulation_to_response(&sim)))
}

// GET /stats - Get simulation statistics
async fn get_stats(State(api_state): State<ApiState>) -> Result<Json<StatsData>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(stats_data(&sim)))
}

// GET /config - Get simulation configuration
async fn get_config(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationConfig>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(sim.config.clone()))
}

// GET /field?kind=energy|complexity - Sample a field across a grid for
// heatmap rendering
async fn get_field(
    Query(params): Query<FieldQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<FieldGridData>, StatusCode> {
    let sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let cols = params.cols.unwrap_or(40).clamp(1, 400);
    let rows = params.rows.unwrap_or(30).clamp(1, 400);
    let cell_w = sim.config.width / cols as f32;
    let cell_h = sim.config.height / rows as f32;

    let sample: fn(Vec2, &[ResourcePoint], &SimulationConfig) -> f32 =
        match params.kind.as_str() {
            "energy" => energy_at,
            "complexity" => spatial_complexity_at,
            _ => return Err(StatusCode::BAD_REQUEST),
        };

    let values = (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| {
                    let center = vec2(
                        (col as f32 + 0.5) * cell_w,
                        (row as f32 + 0.5) * cell_h,
                    );
                    sample(center, &sim.state.resources, &sim.config)
                })
                .collect()
        })
        .collect();

    Ok(Json(FieldGridData {
        kind: params.kind,
        cols,
        rows,
        values,
    }))
}

// POST /step - Step the simulation forward
async fn step_simulation(
    Query(params): Query<StepQuery>,
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let mut rng = api_state
        .rng
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let steps = params.steps.unwrap_or(1);
    for _ in 0..steps {
        sim.step(&mut *rng);
    }

    Ok(Json(simulation_to_response(&sim)))
}

// POST /reset - Reset the simulation
async fn reset_simulation(
    State(api_state): State<ApiState>,
) -> Result<Json<SimulationStateResponse>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sim.reset();
    Ok(Json(simulation_to_response(&sim)))
}

// POST /pause - Toggle pause
async fn pause_simulation(
    State(api_state): State<ApiState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sim.toggle_pause();
    Ok(Json(serde_json::json!({ "paused": sim.paused })))
}

// POST /resources - Append a resource point between ticks
async fn add_resource(
    State(api_state): State<ApiState>,
    Json(request): Json<AddResourceRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if !request.x.is_finite() || !request.y.is_finite() || !request.intensity.is_finite() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let mut sim = api_state
        .simulation
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    sim.add_resource(vec2(request.x, request.y), request.intensity, request.kind);
    Ok(Json(
        serde_json::json!({ "resource_count": sim.state.resources.len() }),
    ))
}

// Create the API router
pub fn create_router(api_state: ApiState) -> Router {
    Router::new()
        .route("/state", get(get_state))
        .route("/stats", get(get_stats))
        .route("/config", get(get_config))
        .route("/field", get(get_field))
        .route("/step", post(step_simulation))
        .route("/reset", post(reset_simulation))
        .route("/pause", post(pause_simulation))
        .route("/resources", post(add_resource))
        .layer(CorsLayer::permissive())
        .with_state(api_state)
}

// Run the API server with the timer-driven tick loop
pub async fn run_server(api_state: ApiState, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(api_state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    info!("verdant state API running on http://localhost:{port}");
    info!("  GET  /state      - full simulation state");
    info!("  GET  /stats      - simulation statistics");
    info!("  GET  /config     - active configuration");
    info!("  GET  /field?kind=energy|complexity - heatmap samples");
    info!("  POST /step?steps=N - advance N ticks (default: 1)");
    info!("  POST /reset      - reset simulation");
    info!("  POST /pause      - toggle pause");
    info!("  POST /resources  - add a resource point");

    // Background task that drives the fixed-interval tick loop
    let simulation_task = tokio::spawn(simulation_loop(api_state.clone()));

    let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

    tokio::select! {
        result = server_handle => {
            result??;
        }
        _ = simulation_task => {
            warn!("simulation loop ended unexpectedly");
        }
    }

    Ok(())
}

// Fixed-interval tick loop. A tick schedules the next only after completing;
// pausing skips the step, it never interrupts one.
async fn simulation_loop(api_state: ApiState) {
    let interval_ms = match api_state.simulation.lock() {
        Ok(sim) => sim.config.tick_interval_ms,
        Err(_) => return,
    };
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // Step the simulation if not paused
        {
            let mut sim = match api_state.simulation.lock() {
                Ok(sim) => sim,
                Err(_) => break,
            };
            if !sim.paused {
                let mut rng = match api_state.rng.lock() {
                    Ok(rng) => rng,
                    Err(_) => break,
                };
                sim.step(&mut *rng);

                if sim.state.tick % 50 == 0 {
                    let (node_count, active_count, _, avg_coherence, _) = sim.stats();
                    debug!(
                        tick = sim.state.tick,
                        node_count, active_count, avg_coherence, "simulation progress"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_state() -> ApiState {
        ApiState::new(Simulation::new())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stats_endpoint_reports_the_seed_run() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["node_count"], 1);
        assert_eq!(json["tick"], 0);
    }

    #[tokio::test]
    async fn pause_endpoint_toggles() {
        let state = test_state();

        let response = create_router(state.clone())
            .oneshot(Request::post("/pause").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["paused"], true);

        let response = create_router(state)
            .oneshot(Request::post("/pause").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["paused"], false);
    }

    #[tokio::test]
    async fn step_endpoint_advances_the_tick_counter() {
        let state = test_state();
        let response = create_router(state.clone())
            .oneshot(Request::post("/step?steps=3").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["stats"]["tick"], 3);
    }

    #[tokio::test]
    async fn field_endpoint_samples_within_clamp_bounds() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/field?kind=complexity&cols=8&rows=6")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["cols"], 8);
        assert_eq!(json["rows"], 6);
        let values = json["values"].as_array().unwrap();
        assert_eq!(values.len(), 6);
        for row in values {
            for v in row.as_array().unwrap() {
                let v = v.as_f64().unwrap();
                assert!((0.1..=1.0).contains(&v));
            }
        }
    }

    #[tokio::test]
    async fn unknown_field_kind_is_rejected() {
        let app = create_router(test_state());
        let response = app
            .oneshot(
                Request::get("/field?kind=humidity")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn resources_endpoint_appends_a_point() {
        let state = test_state();
        let before = state.simulation.lock().unwrap().state.resources.len();

        let request = Request::post("/resources")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"x": 120.0, "y": 80.0, "intensity": 1.0, "kind": "light"}"#,
            ))
            .unwrap();
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["resource_count"], before + 1);
    }
}
