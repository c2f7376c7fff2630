use anyhow::Context;
use serde::Serialize;

use crate::model::sir::SirParams;
use crate::model::trajectory::Trajectory;

/// Delay between frames handed to the renderer (ms).
pub const FRAME_INTERVAL_MS: u64 = 10;
/// Headroom above 1.0 on the fraction axis so curves never touch the frame.
pub const Y_AXIS_MAX: f64 = 1.2;

/// Frame `index` reveals samples `0..=index`, as fractions of N.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub index: usize,
    pub time: Vec<f64>,
    pub susceptible: Vec<f64>,
    pub infected: Vec<f64>,
    pub recovered: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Animation {
    pub title: String,
    pub params: SirParams,
    pub x_max: f64,
    pub y_max: f64,
    pub interval_ms: u64,
    pub frames: Vec<Frame>,
}

/// One frame per grid point, each extending the previous one by one sample.
pub fn animation_frames(trajectory: &Trajectory, population: f64) -> Vec<Frame> {
    let f = trajectory.fractions(population);
    (0..f.len())
        .map(|k| Frame {
            index: k,
            time: f.time[..=k].to_vec(),
            susceptible: f.susceptible[..=k].to_vec(),
            infected: f.infected[..=k].to_vec(),
            recovered: f.recovered[..=k].to_vec(),
        })
        .collect()
}

/// File stem derived from the chosen rates, e.g. `Graf_B0.5_G0.333`.
/// Whole numbers keep their `.0` (`Graf_B10.0_G1.0`).
pub fn animation_file_stem(params: &SirParams) -> String {
    format!("Graf_B{:?}_G{:?}", params.beta, params.gamma)
}

pub fn build_animation(trajectory: &Trajectory, population: f64, params: &SirParams) -> Animation {
    Animation {
        title: format!(
            "Infected growth with transmission rate BETA={} and recovery rate GAMMA={}",
            params.beta, params.gamma
        ),
        params: *params,
        x_max: trajectory.time.last().copied().unwrap_or(0.0),
        y_max: Y_AXIS_MAX,
        interval_ms: FRAME_INTERVAL_MS,
        frames: animation_frames(trajectory, population),
    }
}

/// Write the frame sequence as JSON for an external renderer; returns the path.
pub fn write_animation(
    out_dir: impl AsRef<std::path::Path>,
    trajectory: &Trajectory,
    population: f64,
    params: &SirParams,
) -> anyhow::Result<std::path::PathBuf> {
    std::fs::create_dir_all(out_dir.as_ref()).context("create animation dir failed")?;
    let path = out_dir.as_ref().join(format!("{}.json", animation_file_stem(params)));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("create animation file failed (path={:?})", path))?;
    let animation = build_animation(trajectory, population, params);
    serde_json::to_writer(std::io::BufWriter::new(file), &animation)
        .with_context(|| format!("write animation failed (path={:?})", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sir::Compartments;
    use crate::solver::simulate;

    #[test]
    fn frames_reveal_one_sample_at_a_time() {
        let grid: Vec<f64> = (0..6).map(|k| k as f64 * 2.0).collect();
        let tr = simulate(100.0, Compartments::seeded(100.0, 1.0, 0.0), SirParams::new(0.5, 0.25), &grid).unwrap();
        let frames = animation_frames(&tr, 100.0);
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[0].time, vec![0.0]);
        assert_eq!(frames[0].infected, vec![0.01]);
        assert_eq!(frames[5].time, grid);
        assert_eq!(frames[5].recovered, tr.fractions(100.0).recovered);
    }

    #[test]
    fn file_name_follows_rates() {
        assert_eq!(animation_file_stem(&SirParams::new(0.5, 0.333)), "Graf_B0.5_G0.333");
        assert_eq!(animation_file_stem(&SirParams::new(10.0, 1.0)), "Graf_B10.0_G1.0");
        assert_eq!(animation_file_stem(&SirParams::new(1.0, 0.025)), "Graf_B1.0_G0.025");
    }

    #[test]
    fn animation_is_written_as_json() {
        let grid = [0.0, 1.0, 2.0];
        let params = SirParams::new(0.25, 0.6);
        let tr = simulate(1000.0, Compartments::seeded(1000.0, 10.0, 0.0), params, &grid).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_animation(dir.path(), &tr, 1000.0, &params).unwrap();
        assert!(path.ends_with("Graf_B0.25_G0.6.json"));

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["frames"].as_array().unwrap().len(), 3);
        assert_eq!(v["x_max"], 2.0);
        assert_eq!(v["interval_ms"], 10);
    }
}
