use std::sync::Arc;

use mpi::Rank;
use ndarray::Array2;

/// State an engine publishes once per iteration.
///
/// Snapshots are immutable; the engine replaces the whole record, so a
/// reader never sees a block from one timestep paired with another's
/// counter. `timestep` doubles as the version, `0` before the first step.
#[derive(Clone, Debug)]
pub struct SimulationSnapshot {
    pub engine_id: usize,
    pub rank: Rank,
    pub timestep: usize,
    pub nsteps: usize,
    pub block: Arc<Array2<f64>>,
}

impl SimulationSnapshot {
    pub fn initial(engine_id: usize, rank: Rank, nsteps: usize, shape: (usize, usize)) -> Self {
        Self {
            engine_id,
            rank,
            timestep: 0,
            nsteps,
            block: Arc::new(Array2::zeros(shape)),
        }
    }

    pub fn next(&self, timestep: usize, block: Array2<f64>) -> Self {
        Self {
            engine_id: self.engine_id,
            rank: self.rank,
            timestep,
            nsteps: self.nsteps,
            block: Arc::new(block),
        }
    }

    pub fn is_last(&self) -> bool {
        self.timestep >= self.nsteps
    }
}
