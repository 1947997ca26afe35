pub mod field;
pub mod snapshot;
pub mod worker;

use ndarray::Array2;

pub use field::WaveField;
pub use snapshot::SimulationSnapshot;
pub use worker::{WorkerHandle, WorkerSettings, WorkerStatus, spawn_worker};

/// Per-timestep workload of one engine.
pub trait Stepper: Send + 'static {
    /// Shape of the block returned by every call to `step`
    fn block_shape(&self) -> (usize, usize);

    fn step(&mut self, timestep: usize) -> Array2<f64>;
}
