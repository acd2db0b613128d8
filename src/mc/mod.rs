//! Monte Carlo machinery: uniform time grid, path generation from a seeded Gaussian
//! stream, online statistics and the autocallable simulation driver.

pub mod path_generator;
pub mod simulation;
pub mod statistics;
pub mod time_grid;

pub use path_generator::PathGenerator;
pub use simulation::{
    AutocallableSimulation, CalibratedDiffusion, SAMPLES_PER_BLOCK, SimulationReport,
};
pub use statistics::RunningStatistics;
pub use time_grid::TimeGrid;
