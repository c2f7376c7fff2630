use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::model::trajectory::Trajectory;

#[derive(Debug, Serialize, Deserialize)]
struct TrajectoryRow {
    t: f64,
    susceptible: f64,
    infected: f64,
    recovered: f64,
}

/// Write a trajectory as CSV with columns `t,susceptible,infected,recovered`.
pub fn write_trajectory<W: std::io::Write>(writer: W, trajectory: &Trajectory) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (t, c) in trajectory.iter() {
        wtr.serialize(TrajectoryRow {
            t,
            susceptible: c.susceptible,
            infected: c.infected,
            recovered: c.recovered,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_trajectory_csv(path: impl AsRef<std::path::Path>, trajectory: &Trajectory) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create trajectory CSV: {}", path.display()))?;
    write_trajectory(file, trajectory).with_context(|| format!("Failed to write trajectory CSV: {}", path.display()))
}

/// Load a trajectory written by [`write_trajectory_csv`].
pub fn load_trajectory_csv(path: impl AsRef<std::path::Path>) -> anyhow::Result<Trajectory> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open trajectory CSV: {}", path.display()))?;
    let mut tr = Trajectory {
        time: Vec::new(),
        susceptible: Vec::new(),
        infected: Vec::new(),
        recovered: Vec::new(),
    };
    for result in rdr.deserialize::<TrajectoryRow>() {
        let row = result?;
        tr.time.push(row.t);
        tr.susceptible.push(row.susceptible);
        tr.infected.push(row.infected);
        tr.recovered.push(row.recovered);
    }
    anyhow::ensure!(!tr.is_empty(), "trajectory CSV has no rows: {}", path.display());
    Ok(tr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sir::{Compartments, SirParams};
    use crate::solver::simulate;

    #[test]
    fn csv_keeps_every_sample() {
        let grid = [0.0, 1.0, 2.5, 4.0];
        let tr = simulate(500.0, Compartments::seeded(500.0, 3.0, 1.0), SirParams::new(0.6, 0.2), &grid).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.csv");
        write_trajectory_csv(&path, &tr).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("t,susceptible,infected,recovered"));
        assert_eq!(text.lines().count(), 5);

        let back = load_trajectory_csv(&path).unwrap();
        assert_eq!(back, tr);
    }

    #[test]
    fn empty_csv_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "t,susceptible,infected,recovered\n").unwrap();
        assert!(load_trajectory_csv(&path).is_err());
    }
}
