use sirsim::io::run_log::write_run_log;
use sirsim::{simulate, Compartments, SirParams, TimeGrid};

#[test]
fn run_log_snapshot_flat() {
    let population = 1000.0;
    let params = SirParams::new(0.0, 0.0);
    let grid = TimeGrid::linspace(0.0, 4.0, 5).expect("grid");
    let traj = simulate(population, Compartments::seeded(population, 10.0, 0.0), params, grid.as_slice())
        .expect("simulate");

    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_run_log(tmp.path(), "FLAT", population, &params, &traj).expect("write run log");
    assert!(path.ends_with("sir_FLAT.txt"));

    let s = std::fs::read_to_string(path).expect("read run log");
    insta::assert_snapshot!(s);
}
