pub mod calibration;
pub mod config;
pub mod error;
pub mod io;
pub mod math;
pub mod model;
pub mod session;
pub mod solver;

pub use config::ScenarioConfig;
pub use error::{SimError, SimResult};
pub use model::sir::{derivatives, Compartments, SirModel, SirParams};
pub use model::time_grid::TimeGrid;
pub use model::trajectory::Trajectory;
pub use session::{ParamChange, SessionHandle, SimulationSession};
pub use solver::{simulate, simulate_with, SolverOptions};
