pub mod animation;
pub mod run_log;
pub mod trajectory_csv;
