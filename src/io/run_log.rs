use anyhow::Context;

use crate::calibration::RunSummary;
use crate::model::sir::SirParams;
use crate::model::trajectory::Trajectory;

/// Write a plain-text log of one run: parameters, headline numbers, then every
/// sample as fractions of the population.
pub fn write_run_log(
    out_dir: impl AsRef<std::path::Path>,
    run_id: &str,
    population: f64,
    params: &SirParams,
    trajectory: &Trajectory,
) -> anyhow::Result<std::path::PathBuf> {
    use std::io::Write;

    let summary = RunSummary::from_run(population, params, trajectory).context("empty trajectory")?;

    std::fs::create_dir_all(out_dir.as_ref()).context("create logs dir failed")?;
    let path = out_dir.as_ref().join(format!("sir_{}.txt", run_id));
    let mut f = std::fs::File::create(&path)
        .with_context(|| format!("create run log file failed (path={:?})", path))?;

    writeln!(f, "run_id={}", run_id)?;
    writeln!(f, "population={:.0}", population)?;
    writeln!(f, "beta={:.6}", params.beta)?;
    writeln!(f, "gamma={:.6}", params.gamma)?;
    writeln!(f, "r0={:.6}", summary.r0)?;
    writeln!(f, "herd_immunity_threshold={:.6}", summary.herd_immunity_threshold)?;
    writeln!(f, "peak_time_days={:.6}", summary.peak_time)?;
    writeln!(f, "peak_infected={:.0}", summary.peak_infected)?;
    writeln!(f, "attack_rate={:.6}", summary.attack_rate)?;
    writeln!(f)?;
    writeln!(f, "t,susceptible,infected,recovered")?;

    for (t, c) in trajectory.fractions(population).iter() {
        writeln!(f, "{:.6},{:.6},{:.6},{:.6}", t, c.susceptible, c.infected, c.recovered)?;
    }

    Ok(path)
}
