use serde::Serialize;

use crate::model::sir::{Compartments, SirParams};
use crate::model::trajectory::Trajectory;

/// Basic reproduction number R0 = beta / gamma. Infinite when nobody recovers
/// but transmission happens, zero when neither does.
pub fn basic_reproduction_number(params: &SirParams) -> f64 {
    if params.gamma > 0.0 {
        params.beta / params.gamma
    } else if params.beta > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// beta that yields a target R0 for a given mean infectious duration 1/gamma.
pub fn beta_from_r0(gamma: f64, r0: f64) -> f64 {
    r0 * gamma
}

/// Fraction of the population that must be immune before incidence declines.
pub fn herd_immunity_threshold(r0: f64) -> f64 {
    if r0 <= 1.0 { 0.0 } else { 1.0 - 1.0 / r0 }
}

/// Susceptible fraction left once the epidemic has burnt out.
///
/// Solves s = s0 * exp(-r0 * (1 - s - r_init)) for its smaller root by
/// bisection; `s0` and `r_init` are fractions of N and the infected fraction
/// is whatever remains.
pub fn final_susceptible_fraction(r0: f64, s0: f64, r_init: f64) -> f64 {
    if s0 <= 0.0 || r0.is_infinite() {
        return 0.0;
    }
    if r0 <= 0.0 {
        return s0;
    }
    // g is concave; the smaller root lies left of its maximum at s_star
    let g = |s: f64| s - s0 * (-r0 * (1.0 - s - r_init)).exp();
    let s_star = (1.0 - r_init) - (s0 * r0).ln() / r0;
    let (mut lo, mut hi) = (0.0_f64, s_star.min(s0));
    if g(hi) <= 0.0 {
        return hi;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if g(mid) > 0.0 { hi = mid; } else { lo = mid; }
        if hi - lo < 1e-15 { break; }
    }
    0.5 * (lo + hi)
}

/// Cumulative fraction ever infected (attack rate) for a fully susceptible start.
pub fn final_size(r0: f64) -> f64 {
    1.0 - final_susceptible_fraction(r0, 1.0, 0.0)
}

/// Largest prevalence reached, as a fraction of N, from the conserved quantity
/// i + s - ln(s)/r0. `s0`, `i0` are initial fractions.
pub fn peak_prevalence(r0: f64, s0: f64, i0: f64) -> f64 {
    if r0 <= 0.0 || s0 * r0 <= 1.0 {
        // incidence never rises: the peak is the initial value
        return i0;
    }
    i0 + s0 - (1.0 + (r0 * s0).ln()) / r0
}

/// Headline numbers for one simulated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub r0: f64,
    pub herd_immunity_threshold: f64,
    pub peak_time: f64,
    pub peak_infected: f64,
    pub final_state: Compartments,
    /// Fraction of N that left the susceptible compartment.
    pub attack_rate: f64,
    pub max_conservation_drift: f64,
}

impl RunSummary {
    pub fn from_run(population: f64, params: &SirParams, trajectory: &Trajectory) -> Option<Self> {
        let (peak_time, peak_infected) = trajectory.peak_infected()?;
        let final_state = trajectory.final_state()?;
        let s0 = trajectory.point(0)?.1.susceptible;
        let r0 = basic_reproduction_number(params);
        Some(Self {
            r0,
            herd_immunity_threshold: herd_immunity_threshold(r0),
            peak_time,
            peak_infected,
            final_state,
            attack_rate: (s0 - final_state.susceptible) / population,
            max_conservation_drift: trajectory.max_conservation_drift(population),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn r0_from_rates() {
        assert_relative_eq!(basic_reproduction_number(&SirParams::new(0.5, 1.0 / 3.0)), 1.5, max_relative = 1e-12);
        assert_eq!(basic_reproduction_number(&SirParams::new(0.5, 0.0)), f64::INFINITY);
        assert_eq!(basic_reproduction_number(&SirParams::new(0.0, 0.0)), 0.0);
        assert_relative_eq!(beta_from_r0(0.2, 2.5), 0.5);
    }

    #[test]
    fn herd_immunity() {
        assert_relative_eq!(herd_immunity_threshold(1.5), 1.0 / 3.0, max_relative = 1e-12);
        assert_eq!(herd_immunity_threshold(0.8), 0.0);
    }

    #[test]
    fn final_size_known_values() {
        // classic values of the final size relation z = 1 - exp(-r0 z)
        assert_relative_eq!(final_size(2.0), 0.796_812, epsilon = 1e-6);
        assert_relative_eq!(final_size(1.5), 0.582_812, epsilon = 1e-6);
        assert!(final_size(0.9) < 1e-9);
    }

    #[test]
    fn peak_prevalence_known_value() {
        assert_relative_eq!(peak_prevalence(1.5, 1.0, 0.0), 1.0 - (1.0 + 1.5f64.ln()) / 1.5, max_relative = 1e-12);
        assert_eq!(peak_prevalence(0.5, 1.0, 0.01), 0.01);
    }

    #[test]
    fn summary_of_flat_run() {
        let tr = Trajectory {
            time: vec![0.0, 1.0],
            susceptible: vec![90.0, 90.0],
            infected: vec![10.0, 10.0],
            recovered: vec![0.0, 0.0],
        };
        let s = RunSummary::from_run(100.0, &SirParams::new(0.0, 0.0), &tr).unwrap();
        assert_eq!(s.r0, 0.0);
        assert_eq!((s.peak_time, s.peak_infected), (0.0, 10.0));
        assert_eq!(s.attack_rate, 0.0);
        assert_eq!(s.max_conservation_drift, 0.0);
    }
}
