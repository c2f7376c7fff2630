use std::time::Instant;

use sirsim::config::PRESETS;
use sirsim::solver::{simulate_with_stats, SolverOptions};
use sirsim::{simulate, ScenarioConfig, SirParams};

fn main() -> anyhow::Result<()> {
    let cfg = ScenarioConfig::default();
    let grid = cfg.time_grid()?;
    let params = cfg.params();

    let t_start = Instant::now();
    let (_traj1, adaptive) =
        simulate_with_stats(cfg.population, cfg.initial(), params, grid.as_slice(), &SolverOptions::default())?;
    let dur1 = t_start.elapsed();

    let t_start2 = Instant::now();
    let (_traj2, fixed) =
        simulate_with_stats(cfg.population, cfg.initial(), params, grid.as_slice(), &SolverOptions::rk4(50))?;
    let dur2 = t_start2.elapsed();

    println!("method,ms,rhs_evals");
    println!("dormand_prince,{:.3},{}", dur1.as_secs_f64() * 1000.0, adaptive.rhs_evals);
    println!("rk4x50,{:.3},{}", dur2.as_secs_f64() * 1000.0, fixed.rhs_evals);

    // Independent runs share nothing, so a sweep can fan out over threads.
    let t_start3 = Instant::now();
    let peaks: Vec<anyhow::Result<f64>> = std::thread::scope(|scope| {
        let handles: Vec<_> = PRESETS
            .iter()
            .map(|p| {
                let (cfg, grid) = (&cfg, &grid);
                scope.spawn(move || -> anyhow::Result<f64> {
                    let tr = simulate(cfg.population, cfg.initial(), SirParams::new(p.beta, p.gamma), grid.as_slice())?;
                    Ok(tr.peak_infected().map_or(0.0, |(_, v)| v))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|_| Err(anyhow::anyhow!("sweep thread panicked"))))
            .collect()
    });
    println!("parallel sweep of {} presets: {:.3} ms", PRESETS.len(), t_start3.elapsed().as_secs_f64() * 1000.0);
    for (p, peak) in PRESETS.iter().zip(peaks) {
        println!("{:<14} peak_infected={:.0}", p.label, peak?);
    }

    Ok(())
}
