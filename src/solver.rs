//! Integration of the SIR system onto a caller-supplied time grid.
//!
//! `simulate` is a pure function: it validates every input up front, keeps no
//! state between calls and either returns a full trajectory or an error.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::math::ode::{dopri5_step_ws, error_norm, rk4_step_ws, Dopri5Workspace, Rk4Workspace};
use crate::model::sir::{Compartments, SirModel, SirParams, STATE_SIZE};
use crate::model::time_grid::check_points;
use crate::model::trajectory::Trajectory;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Method {
    /// Adaptive Dormand-Prince 5(4), stepping exactly onto every grid point.
    DormandPrince,
    /// Classic RK4 with a fixed number of sub-steps between grid points.
    Rk4 { steps_per_interval: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub method: Method,
    pub rtol: f64,
    pub atol: f64,
    /// Budget of attempted adaptive steps over the whole horizon.
    pub max_steps: usize,
    pub initial_step: Option<f64>,
    /// Allowed relative drift of S+I+R from N at every sample.
    pub conservation_tol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::DormandPrince,
            rtol: 1e-8,
            atol: 1e-6,
            max_steps: 100_000,
            initial_step: None,
            conservation_tol: 1e-6,
        }
    }
}

impl SolverOptions {
    pub fn rk4(steps_per_interval: usize) -> Self {
        Self { method: Method::Rk4 { steps_per_interval }, ..Self::default() }
    }

    pub fn check(&self) -> SimResult<()> {
        let bad = |msg: String| Err(SimError::InvalidParameters(msg));
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return bad(format!("rtol must be finite and > 0 (got {})", self.rtol));
        }
        if !(self.atol.is_finite() && self.atol >= 0.0) {
            return bad(format!("atol must be finite and >= 0 (got {})", self.atol));
        }
        if self.max_steps == 0 {
            return bad("max_steps must be >= 1".into());
        }
        if !(self.conservation_tol.is_finite() && self.conservation_tol > 0.0) {
            return bad(format!("conservation_tol must be finite and > 0 (got {})", self.conservation_tol));
        }
        if let Some(h) = self.initial_step {
            if !(h.is_finite() && h > 0.0) {
                return bad(format!("initial_step must be finite and > 0 (got {h})"));
            }
        }
        if let Method::Rk4 { steps_per_interval: 0 } = self.method {
            return bad("steps_per_interval must be >= 1".into());
        }
        Ok(())
    }
}

/// Work counters for one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolveStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_evals: usize,
}

/// Integrate with default options. See [`simulate_with`].
pub fn simulate(
    population: f64,
    initial: Compartments,
    params: SirParams,
    time_grid: &[f64],
) -> SimResult<Trajectory> {
    simulate_with(population, initial, params, time_grid, &SolverOptions::default())
}

/// Integrate from `initial` at `time_grid[0]` and return S, I, R at every
/// grid point. The first sample is `initial` itself.
///
/// Values are not clamped: tiny negative excursions near zero are reported
/// as computed.
pub fn simulate_with(
    population: f64,
    initial: Compartments,
    params: SirParams,
    time_grid: &[f64],
    options: &SolverOptions,
) -> SimResult<Trajectory> {
    simulate_with_stats(population, initial, params, time_grid, options).map(|(tr, _)| tr)
}

pub fn simulate_with_stats(
    population: f64,
    initial: Compartments,
    params: SirParams,
    time_grid: &[f64],
    options: &SolverOptions,
) -> SimResult<(Trajectory, SolveStats)> {
    let model = SirModel::new(population, params)?;
    options.check()?;
    initial.check_against(population)?;
    check_points(time_grid)?;

    let mut y = initial.to_array();
    let mut out = Trajectory::with_capacity(time_grid.len());
    out.push(time_grid[0], initial);
    let mut stats = SolveStats::default();

    let run = integrate(&model, &mut y, &mut out, time_grid, options, &mut stats);
    if let Err(e) = &run {
        warn!(
            "simulate: beta={} gamma={} failed after {} accepted steps: {}",
            params.beta, params.gamma, stats.accepted_steps, e
        );
    }
    run?;

    debug!(
        "simulate: beta={} gamma={} samples={} accepted={} rejected={} rhs_evals={}",
        params.beta,
        params.gamma,
        out.len(),
        stats.accepted_steps,
        stats.rejected_steps,
        stats.rhs_evals
    );
    Ok((out, stats))
}

fn integrate(
    model: &SirModel,
    y: &mut [f64; STATE_SIZE],
    out: &mut Trajectory,
    time_grid: &[f64],
    options: &SolverOptions,
    stats: &mut SolveStats,
) -> SimResult<()> {
    let population = model.population;
    match options.method {
        Method::DormandPrince => {
            let mut ws = Dopri5Workspace::new(STATE_SIZE);
            let mut h = options
                .initial_step
                .unwrap_or_else(|| time_grid.get(1).map_or(1.0, |t1| 0.1 * (t1 - time_grid[0])));
            for w in time_grid.windows(2) {
                advance_adaptive(model, y, w[0], w[1], &mut h, &mut ws, options, stats)?;
                check_sample(&y[..], w[1], population, options.conservation_tol)?;
                out.push(w[1], Compartments::from_slice(&y[..]));
            }
        }
        Method::Rk4 { steps_per_interval } => {
            let mut ws = Rk4Workspace::new(STATE_SIZE);
            for w in time_grid.windows(2) {
                let dt = (w[1] - w[0]) / steps_per_interval as f64;
                for k in 0..steps_per_interval {
                    rk4_step_ws(&mut y[..], w[0] + dt * k as f64, dt, &mut ws, |t, y, dy| model.deriv(t, y, dy));
                }
                stats.accepted_steps += steps_per_interval;
                stats.rhs_evals += 4 * steps_per_interval;
                check_sample(&y[..], w[1], population, options.conservation_tol)?;
                out.push(w[1], Compartments::from_slice(&y[..]));
            }
        }
    }
    Ok(())
}

/// Step adaptively from `t0` to exactly `t1`. `h` carries the proposed step
/// size across grid intervals.
#[allow(clippy::too_many_arguments)]
fn advance_adaptive(
    model: &SirModel,
    y: &mut [f64; STATE_SIZE],
    t0: f64,
    t1: f64,
    h: &mut f64,
    ws: &mut Dopri5Workspace,
    options: &SolverOptions,
    stats: &mut SolveStats,
) -> SimResult<()> {
    let mut t = t0;
    while t < t1 {
        if stats.accepted_steps + stats.rejected_steps >= options.max_steps {
            return Err(SimError::NumericInstability {
                time: t,
                reason: format!("step budget of {} exhausted", options.max_steps),
            });
        }

        let remaining = t1 - t;
        let last = *h >= remaining;
        let step = if last { remaining } else { *h };

        dopri5_step_ws(&y[..], t, step, ws, |tt, yy, dy| model.deriv(tt, yy, dy));
        stats.rhs_evals += 7;

        let err = error_norm(&y[..], &ws.y_new, &ws.err, options.rtol, options.atol);
        let err = if err.is_finite() { err } else { f64::INFINITY };

        if err <= 1.0 {
            y.copy_from_slice(&ws.y_new);
            t = if last { t1 } else { t + step };
            stats.accepted_steps += 1;

            let factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            // a truncated final step says little about the next interval
            *h = if last { (step * factor).max(*h) } else { step * factor };
        } else {
            stats.rejected_steps += 1;
            *h = step * (SAFETY * err.powf(-0.2)).max(MIN_FACTOR);
            let min_step = 16.0 * f64::EPSILON * t.abs().max(1.0);
            if *h < min_step {
                return Err(SimError::NumericInstability {
                    time: t,
                    reason: format!("step size underflow (h={:.3e})", *h),
                });
            }
        }
    }
    Ok(())
}

fn check_sample(y: &[f64], t: f64, population: f64, tol: f64) -> SimResult<()> {
    if y.iter().any(|v| !v.is_finite()) {
        return Err(SimError::NumericInstability {
            time: t,
            reason: "non-finite compartment value".into(),
        });
    }
    let drift = (y.iter().sum::<f64>() - population).abs() / population;
    if drift > tol {
        return Err(SimError::NumericInstability {
            time: t,
            reason: format!("conservation drift {drift:.3e} exceeds tolerance {tol:.1e}"),
        });
    }
    Ok(())
}
