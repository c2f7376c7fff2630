pub mod sir;
pub mod time_grid;
pub mod trajectory;
