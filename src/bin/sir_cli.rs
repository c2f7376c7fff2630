use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use log::info;

use sirsim::calibration::RunSummary;
use sirsim::config::{ScenarioConfig, PRESETS};
use sirsim::io::animation::write_animation;
use sirsim::io::run_log::write_run_log;
use sirsim::io::trajectory_csv::{write_trajectory, write_trajectory_csv};
use sirsim::session::{ParamChange, SessionHandle, SessionUpdate, SimulationSession};
use sirsim::{simulate_with, SirParams, Trajectory};

// Slider range and resolution of the interactive simulator.
const SLIDER_MIN: f64 = 0.0;
const SLIDER_MAX: f64 = 1.0;
const SLIDER_STEP: f64 = 0.001;

#[derive(Parser)]
#[command(name = "sir_cli")]
#[command(about = "SIR epidemic simulator", long_about = None)]
struct Cli {
    /// Scenario JSON file (population, seeding, rates, horizon, solver)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Text menu: interactive simulator, animation generator or exit
    Menu,
    /// Interactive simulator reading parameter changes from stdin
    Interactive {
        /// Fold changes queued during a recompute into one recompute
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        coalesce: bool,
    },
    /// Simulate once and write the trajectory
    Run {
        #[arg(long)]
        beta: Option<f64>,
        #[arg(long)]
        gamma: Option<f64>,
        /// CSV output (stdout when omitted)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write trajectories as fractions of N
        #[arg(long, default_value_t = false)]
        fractions: bool,
        /// Directory for a run log
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Write frame-by-frame animation data named after beta and gamma
    Animate {
        #[arg(long)]
        beta: f64,
        #[arg(long)]
        gamma: f64,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => ScenarioConfig::from_json_file(path)?,
        None => ScenarioConfig::default(),
    };

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => menu(&cfg),
        Commands::Interactive { coalesce } => interactive(&cfg, coalesce),
        Commands::Run { beta, gamma, csv, fractions, log_dir } => {
            let params = SirParams::new(beta.unwrap_or(cfg.beta), gamma.unwrap_or(cfg.gamma));
            run_once(&cfg, params, csv, fractions, log_dir)
        }
        Commands::Animate { beta, gamma, out_dir } => animate(&cfg, SirParams::new(beta, gamma), &out_dir),
    }
}

fn menu(cfg: &ScenarioConfig) -> anyhow::Result<()> {
    println!("Select an option:");
    println!("  1. SIR model simulator");
    println!("  2. Animation generator from entered values");
    println!("  3. Exit");
    let choice = prompt("Option: ")?;
    match choice.trim() {
        "1" => interactive(cfg, true),
        "2" => {
            println!();
            println!("Sample values:");
            for p in PRESETS {
                println!("  BETA={:<5} GAMMA={:<6} ({})", p.beta, p.gamma, p.label);
            }
            println!("Other values can be explored with the simulator.");
            let beta = prompt_rate("BETA (transmission rate): ")?;
            let gamma = prompt_rate("GAMMA (recovery rate): ")?;
            animate(cfg, SirParams::new(beta, gamma), Path::new("."))
        }
        _ => Ok(()),
    }
}

fn interactive(cfg: &ScenarioConfig, coalesce: bool) -> anyhow::Result<()> {
    let session = SimulationSession::from_config(cfg).context("initial simulation failed")?;
    let population = cfg.population;
    let handle = SessionHandle::spawn(
        session,
        move |u: &SessionUpdate| print_update(population, u),
        coalesce,
    );

    println!("commands: b <beta> | g <gamma> | reset | q   (rates in [{SLIDER_MIN}, {SLIDER_MAX}], step {SLIDER_STEP})");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let change = match (parts.next(), parts.next()) {
            (Some("q"), _) | (Some("quit"), _) => break,
            (Some("reset"), _) => ParamChange::Reset,
            (Some("b"), Some(v)) => match parse_slider(v) {
                Some(beta) => ParamChange::Beta(beta),
                None => {
                    println!("beta must be a number in [{SLIDER_MIN}, {SLIDER_MAX}]");
                    continue;
                }
            },
            (Some("g"), Some(v)) => match parse_slider(v) {
                Some(gamma) => ParamChange::Gamma(gamma),
                None => {
                    println!("gamma must be a number in [{SLIDER_MIN}, {SLIDER_MAX}]");
                    continue;
                }
            },
            (None, _) => continue,
            _ => {
                println!("unknown command: {line}");
                continue;
            }
        };
        handle.submit(change)?;
    }

    let session = handle.shutdown()?;
    info!("interactive session closed after {} recomputes", session.revision());
    Ok(())
}

fn run_once(
    cfg: &ScenarioConfig,
    params: SirParams,
    csv: Option<PathBuf>,
    fractions: bool,
    log_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let grid = cfg.time_grid()?;
    let trajectory = simulate_with(cfg.population, cfg.initial(), params, grid.as_slice(), &cfg.solver)?;
    let output = if fractions { trajectory.fractions(cfg.population) } else { trajectory.clone() };

    match csv {
        Some(path) => {
            write_trajectory_csv(&path, &output)?;
            info!("wrote {}", path.display());
        }
        None => write_trajectory(std::io::stdout().lock(), &output)?,
    }

    if let Some(dir) = log_dir {
        let run_id = format!("b{}_g{}", params.beta, params.gamma);
        let path = write_run_log(dir, &run_id, cfg.population, &params, &trajectory)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn animate(cfg: &ScenarioConfig, params: SirParams, out_dir: &Path) -> anyhow::Result<()> {
    let grid = cfg.time_grid()?;
    let trajectory = simulate_with(cfg.population, cfg.initial(), params, grid.as_slice(), &cfg.solver)?;
    let path = write_animation(out_dir, &trajectory, cfg.population, &params)?;
    println!("Animation generated...");
    println!("Generated file: {}", path.display());
    Ok(())
}

fn print_update(population: f64, u: &SessionUpdate) {
    if let Some(s) = RunSummary::from_run(population, &u.params, &u.trajectory) {
        println!(
            "[rev {}] beta={:.3} gamma={:.3} R0={:.2} peak={:.4} of N at day {:.1}, attack rate {:.4}",
            u.revision,
            u.params.beta,
            u.params.gamma,
            s.r0,
            s.peak_infected / population,
            s.peak_time,
            s.attack_rate
        );
    }
    print_table(&u.trajectory, population, 8);
}

fn print_table(tr: &Trajectory, population: f64, every: usize) {
    println!("{:>8} {:>10} {:>10} {:>10}", "day", "S/N", "I/N", "R/N");
    for (t, c) in tr.fractions(population).iter().step_by(every.max(1)) {
        println!("{:>8.1} {:>10.4} {:>10.4} {:>10.4}", t, c.susceptible, c.infected, c.recovered);
    }
}

/// Snap to the slider grid; rejects values outside the slider range.
fn parse_slider(v: &str) -> Option<f64> {
    let x: f64 = v.parse().ok()?;
    if !(SLIDER_MIN..=SLIDER_MAX).contains(&x) {
        return None;
    }
    Some((x / SLIDER_STEP).round() * SLIDER_STEP)
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn prompt_rate(label: &str) -> anyhow::Result<f64> {
    loop {
        let line = prompt(label)?;
        anyhow::ensure!(!line.is_empty(), "stdin closed");
        match line.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => return Ok(v),
            _ => println!("please enter a non-negative number"),
        }
    }
}
