use mpi::Rank;
use mpi::traits::*;
use tracing::info;

use super::{ROOT, is_root};
use crate::cluster::assign_ranks;

/// Where this process sits as an engine and as a simulation rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineTopology {
    /// World rank, standing in for the orchestrator's engine id
    pub engine_id: Rank,
    pub engines: Rank,
    /// Rank in the simulation communicator
    pub sim_rank: Rank,
    pub sim_size: Rank,
}

/// Split keys for every engine, decided on the root and broadcast.
///
/// Keys are a permutation of `0..engines`, so the key an engine gets is
/// exactly the simulation rank it ends up with.
pub fn broadcast_split_keys<C: Communicator>(world: &C, seed: Option<u64>) -> Vec<Rank> {
    let engines = world.size() as usize;
    let mut keys = if is_root(world.rank()) {
        assign_ranks(engines, seed)
    } else {
        vec![0 as Rank; engines]
    };

    world.process_at_rank(ROOT).broadcast_into(&mut keys[..]);
    keys
}

impl EngineTopology {
    pub fn new(engine_id: Rank, engines: Rank, sim_rank: Rank, sim_size: Rank) -> Self {
        Self {
            engine_id,
            engines,
            sim_rank,
            sim_size,
        }
    }

    pub fn log(&self) {
        info!(
            "[Rank {}] Running simulation rank {} of {} ({} engines)",
            self.engine_id, self.sim_rank, self.sim_size, self.engines
        );
    }
}
