use serde::Serialize;

use crate::error::{SimError, SimResult};

/// Strictly increasing, non-empty sequence of sample times.
///
/// Built once and shared by every re-simulation so trajectories stay comparable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    pub fn new(points: Vec<f64>) -> SimResult<Self> {
        check_points(&points)?;
        Ok(Self { points })
    }

    /// `n` evenly spaced points over `[start, end]`, both ends included.
    pub fn linspace(start: f64, end: f64, n: usize) -> SimResult<Self> {
        if n == 0 {
            return Err(SimError::InvalidTimeGrid("grid needs at least one point".into()));
        }
        if n == 1 {
            return Self::new(vec![start]);
        }
        let step = (end - start) / (n - 1) as f64;
        let mut points: Vec<f64> = (0..n).map(|k| start + step * k as f64).collect();
        // land exactly on the requested end
        points[n - 1] = end;
        Self::new(points)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.points[0]
    }

    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1]
    }
}

pub(crate) fn check_points(points: &[f64]) -> SimResult<()> {
    if points.is_empty() {
        return Err(SimError::InvalidTimeGrid("grid is empty".into()));
    }
    if let Some((k, t)) = points.iter().enumerate().find(|(_, t)| !t.is_finite()) {
        return Err(SimError::InvalidTimeGrid(format!("non-finite time {t} at index {k}")));
    }
    for (k, w) in points.windows(2).enumerate() {
        if w[1] <= w[0] {
            return Err(SimError::InvalidTimeGrid(format!(
                "times must be strictly increasing (t[{}]={} >= t[{}]={})",
                k,
                w[0],
                k + 1,
                w[1]
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_matches_endpoints() {
        let grid = TimeGrid::linspace(0.0, 160.0, 80).unwrap();
        assert_eq!(grid.len(), 80);
        assert_eq!(grid.start(), 0.0);
        assert_eq!(grid.end(), 160.0);
        assert!((grid.as_slice()[1] - 160.0 / 79.0).abs() < 1e-12);
    }

    #[test]
    fn single_point_grid_is_valid() {
        let grid = TimeGrid::linspace(3.0, 10.0, 1).unwrap();
        assert_eq!(grid.as_slice(), &[3.0]);
    }

    #[test]
    fn rejects_empty_and_non_monotonic() {
        assert!(matches!(TimeGrid::new(vec![]), Err(SimError::InvalidTimeGrid(_))));
        assert!(matches!(TimeGrid::linspace(0.0, 1.0, 0), Err(SimError::InvalidTimeGrid(_))));
        assert!(matches!(TimeGrid::new(vec![0.0, 1.0, 1.0]), Err(SimError::InvalidTimeGrid(_))));
        assert!(matches!(TimeGrid::new(vec![0.0, 2.0, 1.0]), Err(SimError::InvalidTimeGrid(_))));
        assert!(matches!(TimeGrid::new(vec![0.0, f64::NAN]), Err(SimError::InvalidTimeGrid(_))));
        assert!(matches!(TimeGrid::linspace(5.0, 0.0, 3), Err(SimError::InvalidTimeGrid(_))));
    }
}
