use serde::{Deserialize, Serialize};

use super::sir::Compartments;

/// S, I and R sampled on the caller's time grid. Produced fresh by every
/// simulation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub time: Vec<f64>,
    pub susceptible: Vec<f64>,
    pub infected: Vec<f64>,
    pub recovered: Vec<f64>,
}

impl Trajectory {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            time: Vec::with_capacity(n),
            susceptible: Vec::with_capacity(n),
            infected: Vec::with_capacity(n),
            recovered: Vec::with_capacity(n),
        }
    }

    pub(crate) fn push(&mut self, t: f64, c: Compartments) {
        self.time.push(t);
        self.susceptible.push(c.susceptible);
        self.infected.push(c.infected);
        self.recovered.push(c.recovered);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// `None` past the end, or where a deserialized value has ragged series.
    pub fn point(&self, k: usize) -> Option<(f64, Compartments)> {
        Some((
            *self.time.get(k)?,
            Compartments::new(*self.susceptible.get(k)?, *self.infected.get(k)?, *self.recovered.get(k)?),
        ))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, Compartments)> + '_ {
        (0..self.len()).filter_map(move |k| self.point(k))
    }

    pub fn final_state(&self) -> Option<Compartments> {
        self.len().checked_sub(1).and_then(|k| self.point(k)).map(|(_, c)| c)
    }

    /// Sample with the largest number infected, first one on ties.
    pub fn peak_infected(&self) -> Option<(f64, f64)> {
        let mut best: Option<(f64, f64)> = None;
        for (t, c) in self.iter() {
            match best {
                Some((_, v)) if c.infected <= v => {}
                _ => best = Some((t, c.infected)),
            }
        }
        best
    }

    /// Every compartment divided by `population`, as charts show them.
    pub fn fractions(&self, population: f64) -> Trajectory {
        let scale = |v: &Vec<f64>| -> Vec<f64> { v.iter().map(|x| x / population).collect() };
        Trajectory {
            time: self.time.clone(),
            susceptible: scale(&self.susceptible),
            infected: scale(&self.infected),
            recovered: scale(&self.recovered),
        }
    }

    /// Largest relative deviation of S+I+R from `population` over all samples.
    pub fn max_conservation_drift(&self, population: f64) -> f64 {
        self.iter()
            .map(|(_, c)| (c.total() - population).abs() / population)
            .fold(0.0, f64::max)
    }

    /// Smallest value over all compartments. Slightly negative values near zero
    /// are integration artifacts and are left as computed.
    pub fn min_value(&self) -> f64 {
        self.susceptible
            .iter()
            .chain(&self.infected)
            .chain(&self.recovered)
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Trajectory {
        let mut tr = Trajectory::with_capacity(3);
        tr.push(0.0, Compartments::new(90.0, 10.0, 0.0));
        tr.push(1.0, Compartments::new(70.0, 20.0, 10.0));
        tr.push(2.0, Compartments::new(60.0, 20.0, 20.0));
        tr
    }

    #[test]
    fn peak_prefers_first_maximum() {
        assert_eq!(sample().peak_infected(), Some((1.0, 20.0)));
        assert_eq!(Trajectory::with_capacity(0).peak_infected(), None);
    }

    #[test]
    fn fractions_and_final_state() {
        let tr = sample();
        let f = tr.fractions(100.0);
        assert_eq!(f.time, tr.time);
        assert_eq!(f.infected, vec![0.1, 0.2, 0.2]);
        assert_eq!(tr.final_state(), Some(Compartments::new(60.0, 20.0, 20.0)));
        assert_eq!(tr.max_conservation_drift(100.0), 0.0);
        assert_eq!(tr.min_value(), 0.0);
        assert!(tr.point(3).is_none());
    }

    #[test]
    fn ragged_series_do_not_panic() {
        let json = r#"{"time":[0.0,1.0,2.0],"susceptible":[90.0,80.0],"infected":[10.0],"recovered":[0.0,5.0,9.0]}"#;
        let tr: Trajectory = serde_json::from_str(json).unwrap();
        assert_eq!(tr.point(0), Some((0.0, Compartments::new(90.0, 10.0, 0.0))));
        assert!(tr.point(1).is_none());
        assert_eq!(tr.iter().count(), 1);
        assert_eq!(tr.peak_infected(), Some((0.0, 10.0)));
        assert!(tr.final_state().is_none());
    }
}
