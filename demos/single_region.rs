use sirsim::calibration::{basic_reproduction_number, herd_immunity_threshold};
use sirsim::{simulate, ScenarioConfig};

fn main() -> anyhow::Result<()> {
    // Reference scenario: 17.268M people, 10 initial cases, beta=0.5, gamma=1/3.
    let cfg = ScenarioConfig::default();
    let params = cfg.params();
    let grid = cfg.time_grid()?;

    let traj = simulate(cfg.population, cfg.initial(), params, grid.as_slice())?;

    let r0 = basic_reproduction_number(&params);
    eprintln!("R0={:.2} herd_immunity_threshold={:.3}", r0, herd_immunity_threshold(r0));

    // Print every 4th sample as fractions of N
    println!("day,S,I,R");
    for (idx, (t, c)) in traj.fractions(cfg.population).iter().enumerate() {
        if idx % 4 != 0 { continue; }
        println!("{:.1},{:.5},{:.5},{:.5}", t, c.susceptible, c.infected, c.recovered);
    }

    Ok(())
}
