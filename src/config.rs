use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::model::sir::{Compartments, SirParams};
use crate::model::time_grid::TimeGrid;
use crate::solver::SolverOptions;

/// Everything one program run needs: population, seeding, baseline rates,
/// horizon and solver settings. Defaults describe Ecuador (17,268,000
/// inhabitants) with 10 initial cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub population: f64,
    pub initial_infected: f64,
    pub initial_recovered: f64,

    // Rates (per day)
    pub beta: f64,
    pub gamma: f64,

    // Sampling: n_points evenly spaced over [0, t_max]
    pub t_max: f64,
    pub n_points: usize,

    pub solver: SolverOptions,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            population: 17_268_000.0,
            initial_infected: 10.0,
            initial_recovered: 0.0,
            beta: 0.5,
            gamma: 1.0 / 3.0,
            t_max: 160.0,
            n_points: 80,
            solver: SolverOptions::default(),
        }
    }
}

/// Upper bound on samples per run; requests beyond it are rejected before
/// any allocation.
pub const MAX_N_POINTS: usize = 100_000;
/// Longest horizon accepted, in days.
pub const MAX_T_MAX: f64 = 100_000.0;

/// A named (beta, gamma) pair worth trying.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preset {
    pub label: &'static str,
    pub beta: f64,
    pub gamma: f64,
}

pub const PRESETS: [Preset; 4] = [
    Preset { label: "default", beta: 0.5, gamma: 0.333 },
    Preset { label: "slow recovery", beta: 1.0, gamma: 0.025 },
    Preset { label: "subcritical", beta: 0.25, gamma: 0.6 },
    Preset { label: "ecuador", beta: 10.0, gamma: 1.0 },
];

impl ScenarioConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario config: {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scenario config: {}", path.display()))?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.population.is_finite() && self.population > 0.0, "population must be > 0");
        anyhow::ensure!(
            self.initial_infected >= 0.0 && self.initial_recovered >= 0.0,
            "initial infected/recovered must be >= 0"
        );
        anyhow::ensure!(
            self.initial_infected + self.initial_recovered <= self.population,
            "initial infected + recovered exceed population"
        );
        anyhow::ensure!(self.beta >= 0.0 && self.gamma >= 0.0, "beta and gamma must be >= 0");
        anyhow::ensure!(
            self.t_max.is_finite() && self.t_max > 0.0 && self.t_max <= MAX_T_MAX,
            "t_max must be in (0, {}] (got {})",
            MAX_T_MAX,
            self.t_max
        );
        anyhow::ensure!(
            (2..=MAX_N_POINTS).contains(&self.n_points),
            "n_points must be in [2, {}] (got {})",
            MAX_N_POINTS,
            self.n_points
        );
        self.solver.check()?;
        Ok(())
    }

    pub fn params(&self) -> SirParams {
        SirParams::new(self.beta, self.gamma)
    }

    pub fn initial(&self) -> Compartments {
        Compartments::seeded(self.population, self.initial_infected, self.initial_recovered)
    }

    pub fn time_grid(&self) -> SimResult<TimeGrid> {
        TimeGrid::linspace(0.0, self.t_max, self.n_points)
    }
}
