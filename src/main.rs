use clap::Parser;
use tracing::info;

mod api;
mod config;
mod engine;
mod field;
mod node;
mod types;

use config::SimulationConfig;
use engine::Simulation;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the state API server
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Configuration file path (YAML or JSON). If not specified, searches for
    /// config.yaml, config.yml, or config.json in the current directory.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    info!(
        width = config.width,
        height = config.height,
        tick_interval_ms = config.tick_interval_ms,
        "starting simulation"
    );

    let sim = Simulation::with_config(config);
    let api_state = api::ApiState::new(sim);
    api::run_server(api_state, args.port).await
}

/// Load configuration from file or use default
fn load_config(config_path: Option<&str>) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        // User specified a config file
        SimulationConfig::from_file(path)
            .map_err(|e| format!("Failed to load config from {path}: {e}").into())
    } else {
        // Try default paths
        Ok(SimulationConfig::from_default_paths())
    }
}
