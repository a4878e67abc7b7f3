//! Marionette command-line front end.
//!
//! Provides three modes of operation:
//! - `synth`: Clone a single-robot MJCF template into a multi-robot scene
//! - `check`: Validate a loop configuration (and optionally an action layout)
//! - `info`: Print workspace crate versions and limits

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use marionette_core::config::LoopConfig;
use marionette_core::error::ConfigError;
use marionette_core::layout::ActionLayout;
use marionette_core::types::{ANCHOR_BODY, MAX_ROBOTS, RobotSpawnConfig, anchor_name};

/// MuJoCo's default timestep, used when a config has no override.
const DEFAULT_MODEL_TIMESTEP: f64 = 0.002;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Multi-robot MJCF scenes and policy control loops.
#[derive(Parser)]
#[command(name = "marionette", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a multi-robot scene from a single-robot template.
    Synth {
        /// Single-robot MJCF template.
        template: PathBuf,

        /// Where to write the synthesized scene.
        #[arg(short, long)]
        output: PathBuf,

        /// Robot root position as `x,y,z`. Repeat once per robot.
        #[arg(short, long = "spawn", value_parser = parse_spawn)]
        spawns: Vec<RobotSpawnConfig>,

        /// Loop config whose `robots` list supplies the spawns.
        #[arg(short, long, conflicts_with = "spawns")]
        config: Option<PathBuf>,
    },

    /// Validate a loop config and print the derived timing.
    Check {
        /// Loop config (TOML).
        config: PathBuf,

        /// Policy action layout (JSON) to validate alongside.
        #[arg(short, long)]
        layout: Option<PathBuf>,

        /// Model timestep used when the config has no `physics_dt`.
        #[arg(short, long, default_value_t = DEFAULT_MODEL_TIMESTEP)]
        timestep: f64,
    },

    /// Print crate information.
    Info,
}

fn parse_spawn(value: &str) -> Result<RobotSpawnConfig, String> {
    let coords: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid coordinate in '{value}': {e}"))?;
    let spawn = match coords.as_slice() {
        &[x, y, z] => RobotSpawnConfig::new(x, y, z),
        _ => return Err(format!("expected x,y,z, got '{value}'")),
    };
    if !spawn.is_finite() {
        return Err(format!("coordinates must be finite, got '{value}'"));
    }
    Ok(spawn)
}

/// Spawns from a loop config, or the template's own anchor pose when the
/// config lists none.
fn config_spawns(config: &Path, template: &Path) -> Result<Vec<RobotSpawnConfig>, Box<dyn Error>> {
    let robots = LoopConfig::from_file(config)?.robots;
    if !robots.is_empty() {
        return Ok(robots);
    }
    let template = marionette_scene::load_template(template)?;
    Ok(vec![marionette_scene::anchor_spawn(&template)?])
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn run_synth(
    template: &Path,
    output: &Path,
    spawns: Vec<RobotSpawnConfig>,
    config: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let spawns = match config {
        Some(path) => config_spawns(path, template)?,
        None => spawns,
    };
    let scene = marionette_scene::synthesize_file(template, &spawns)?;
    marionette_scene::write_scene(output, &scene)?;
    info!(
        robots = spawns.len(),
        output = %output.display(),
        "scene written"
    );

    for (i, spawn) in spawns.iter().enumerate() {
        let [x, y, z] = spawn.position();
        println!("  {:<16} ({x:.3}, {y:.3}, {z:.3})", anchor_name(i));
    }
    println!("wrote {}", output.display());
    Ok(())
}

fn run_check(config: &Path, layout: Option<&Path>, timestep: f64) -> Result<(), Box<dyn Error>> {
    let cfg = LoopConfig::from_file(config)?;
    if cfg.physics_dt.is_none() && (!timestep.is_finite() || timestep <= 0.0) {
        return Err(ConfigError::InvalidPhysicsDt(timestep).into());
    }
    let timing = cfg.timing(timestep);

    println!("config ok: {}", config.display());
    println!(
        "  physics_dt   {:.6} s ({:.1} Hz){}",
        timing.physics_dt,
        timing.physics_hz(),
        if cfg.physics_dt.is_none() {
            " [model]"
        } else {
            ""
        }
    );
    println!(
        "  control_dt   {:.6} s ({:.1} Hz)",
        timing.control_dt,
        timing.control_hz()
    );
    println!("  decimation   {}", timing.decimation);
    println!("  tick period  {:?}", timing.tick_period());
    println!("  robots       {}", cfg.robots.len().max(1));
    match cfg.pd {
        Some(pd) => println!("  fallback pd  kp={} kd={}", pd.kp, pd.kd),
        None => println!("  fallback pd  none"),
    }

    if let Some(path) = layout {
        let layout = ActionLayout::from_file(path)?;
        println!("layout ok: {}", path.display());
        println!("  actions      {}", layout.num_actions());
        println!(
            "  gains        {}",
            if layout.gains().is_some() {
                "per-joint"
            } else {
                "none"
            }
        );
    }
    Ok(())
}

fn run_info() {
    println!("marionette v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("crates:");
    println!("  marionette-core    {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-scene   {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-mapping {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-control {}", env!("CARGO_PKG_VERSION"));
    println!("  marionette-policy  {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("anchor body: {ANCHOR_BODY}");
    println!("max robots:  {MAX_ROBOTS}");
    println!("edition: 2024");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Some(Commands::Synth {
            template,
            output,
            spawns,
            config,
        }) => run_synth(&template, &output, spawns, config.as_deref()),
        Some(Commands::Check {
            config,
            layout,
            timestep,
        }) => run_check(&config, layout.as_deref(), timestep),
        Some(Commands::Info) | None => {
            run_info();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
