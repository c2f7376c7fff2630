use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Transmission and recovery rates (per day).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirParams {
    pub beta: f64,  // transmission rate
    pub gamma: f64, // recovery rate, 1/infectious mean
}

impl SirParams {
    pub fn new(beta: f64, gamma: f64) -> Self {
        Self { beta, gamma }
    }

    pub fn check(&self) -> SimResult<()> {
        if !(self.beta.is_finite() && self.beta >= 0.0) {
            return Err(SimError::InvalidParameters(format!(
                "beta must be finite and >= 0 (got {})",
                self.beta
            )));
        }
        if !(self.gamma.is_finite() && self.gamma >= 0.0) {
            return Err(SimError::InvalidParameters(format!(
                "gamma must be finite and >= 0 (got {})",
                self.gamma
            )));
        }
        Ok(())
    }
}

/// Sizes of the three compartments at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compartments {
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}

impl Compartments {
    pub fn new(susceptible: f64, infected: f64, recovered: f64) -> Self {
        Self { susceptible, infected, recovered }
    }

    /// Everyone not initially infected or recovered starts out susceptible.
    pub fn seeded(population: f64, infected: f64, recovered: f64) -> Self {
        Self::new(population - infected - recovered, infected, recovered)
    }

    pub fn total(&self) -> f64 {
        self.susceptible + self.infected + self.recovered
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.susceptible, self.infected, self.recovered]
    }

    pub fn from_slice(y: &[f64]) -> Self {
        Self::new(y[S], y[I], y[R])
    }

    /// Validate initial values against the population they should partition.
    /// The sum must match `population` to rounding ([`INITIAL_SUM_REL_TOL`]).
    pub fn check_against(&self, population: f64) -> SimResult<()> {
        for (name, v) in [
            ("susceptible", self.susceptible),
            ("infected", self.infected),
            ("recovered", self.recovered),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(SimError::InvalidParameters(format!(
                    "initial {name} must be finite and >= 0 (got {v})"
                )));
            }
        }
        let drift = (self.total() - population).abs() / population;
        if drift > INITIAL_SUM_REL_TOL {
            return Err(SimError::InvalidParameters(format!(
                "initial compartments sum to {} but population is {} (relative error {:.3e})",
                self.total(),
                population,
                drift
            )));
        }
        Ok(())
    }
}

/// Relative slack allowed on S0+I0+R0 = N; covers float rounding only.
pub const INITIAL_SUM_REL_TOL: f64 = 1e-12;

// State vector layout: S | I | R
pub const S: usize = 0;
pub const I: usize = 1;
pub const R: usize = 2;
pub const STATE_SIZE: usize = 3;

/// Instantaneous rates of change under mass-action incidence.
///
/// The three rates sum to zero up to rounding. Inputs are not validated: the
/// integrator may evaluate slightly negative intermediate states, and `population`
/// must be positive.
pub fn derivatives(state: &Compartments, population: f64, params: &SirParams) -> Compartments {
    let infection = params.beta * state.susceptible * state.infected / population;
    let recovery = params.gamma * state.infected;
    Compartments {
        susceptible: -infection,
        infected: infection - recovery,
        recovered: recovery,
    }
}

/// Closed-population SIR system for a fixed parameter pair.
#[derive(Debug, Clone)]
pub struct SirModel {
    pub population: f64,
    pub params: SirParams,
}

impl SirModel {
    pub fn new(population: f64, params: SirParams) -> SimResult<Self> {
        if !(population.is_finite() && population > 0.0) {
            return Err(SimError::InvalidParameters(format!(
                "population must be finite and > 0 (got {population})"
            )));
        }
        params.check()?;
        Ok(Self { population, params })
    }

    /// Right-hand side in slice form for the steppers in `math::ode`.
    pub fn deriv(&self, _t: f64, y: &[f64], dy: &mut [f64]) {
        let d = derivatives(&Compartments::from_slice(y), self.population, &self.params);
        dy[S] = d.susceptible;
        dy[I] = d.infected;
        dy[R] = d.recovered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derivatives_follow_mass_action() {
        let state = Compartments::new(900.0, 100.0, 0.0);
        let d = derivatives(&state, 1000.0, &SirParams::new(0.5, 0.2));
        assert_relative_eq!(d.susceptible, -45.0);
        assert_relative_eq!(d.infected, 25.0);
        assert_relative_eq!(d.recovered, 20.0);
    }

    #[test]
    fn derivatives_conserve_population() {
        let params = SirParams::new(0.731, 0.129);
        for (s, i, r) in [(17_267_990.0, 10.0, 0.0), (3.5, 1e6, 42.0), (-1e-3, 2.0, 7.0)] {
            let d = derivatives(&Compartments::new(s, i, r), 17_268_000.0, &params);
            let scale = d.susceptible.abs().max(d.recovered.abs()).max(1.0);
            assert!(d.total().abs() <= 1e-12 * scale, "sum {} for {:?}", d.total(), (s, i, r));
        }
    }

    #[test]
    fn zero_rates_give_zero_derivatives() {
        let d = derivatives(&Compartments::new(10.0, 5.0, 1.0), 16.0, &SirParams::new(0.0, 0.0));
        assert_eq!(d, Compartments::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn model_rejects_bad_population_and_rates() {
        assert!(matches!(SirModel::new(0.0, SirParams::new(0.1, 0.1)), Err(SimError::InvalidParameters(_))));
        assert!(matches!(SirModel::new(-5.0, SirParams::new(0.1, 0.1)), Err(SimError::InvalidParameters(_))));
        assert!(matches!(SirModel::new(10.0, SirParams::new(-0.1, 0.1)), Err(SimError::InvalidParameters(_))));
        assert!(matches!(SirModel::new(10.0, SirParams::new(0.1, f64::NAN)), Err(SimError::InvalidParameters(_))));
        assert!(SirModel::new(10.0, SirParams::new(0.0, 0.0)).is_ok());
    }

    #[test]
    fn initial_values_must_partition_population() {
        let ok = Compartments::seeded(100.0, 1.0, 0.0);
        assert_eq!(ok.susceptible, 99.0);
        assert!(ok.check_against(100.0).is_ok());
        assert!(Compartments::new(90.0, 1.0, 0.0).check_against(100.0).is_err());
        assert!(Compartments::new(101.0, -1.0, 0.0).check_against(100.0).is_err());
    }

    #[test]
    fn one_extra_person_is_rejected_at_reference_population() {
        let n = 17_268_000.0;
        assert!(Compartments::seeded(n, 10.0, 0.0).check_against(n).is_ok());
        assert!(Compartments::new(n - 3.0, 2.0, 1.0).check_against(n).is_ok());
        let extra = Compartments::new(n - 9.0, 10.0, 0.0);
        assert!(matches!(extra.check_against(n), Err(SimError::InvalidParameters(_))));
        let seventeen = Compartments::new(n + 7.0, 10.0, 0.0);
        assert!(matches!(seventeen.check_against(n), Err(SimError::InvalidParameters(_))));
    }

    #[test]
    fn slice_deriv_matches_struct_form() {
        let model = SirModel::new(1000.0, SirParams::new(0.3, 0.1)).unwrap();
        let y = [800.0, 150.0, 50.0];
        let mut dy = [0.0; STATE_SIZE];
        model.deriv(0.0, &y, &mut dy);
        let d = derivatives(&Compartments::from_slice(&y), 1000.0, &model.params);
        assert_eq!(dy, d.to_array());
    }
}
