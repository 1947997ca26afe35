// src/mpi_helpers/session.rs
use std::time::Instant;

use mpi::topology::Color;
use mpi::traits::*;
use tracing::{error, info, warn};

use super::{
    gather::{gather_blocks, gather_ranks},
    is_root,
    load_balance::interval_by_rank,
    topology::{EngineTopology, broadcast_split_keys},
};
use crate::{
    assemble::assemble_rows,
    config::MonitorConfig,
    error::{MonitorError, Result},
    monitor::{Frame, FrameSink},
    reorder::{RankIndex, build_rank_index, reorder_owned},
    simulation::{Stepper, WaveField},
};

/// Runs one engine per MPI process and monitors them from the root.
///
/// Engine order is the world communicator's order; simulation ranks come
/// from a second communicator split with shuffled keys. The root builds
/// the rank index once and reassembles every gathered frame with it.
/// Returns the number of frames rendered on the root (0 elsewhere).
pub fn run_mpi_session<S: FrameSink>(config: &MonitorConfig, sink: &mut S) -> Result<usize> {
    let universe = mpi::initialize()
        .ok_or_else(|| MonitorError::Cluster("MPI was already initialized".into()))?;
    let world = universe.world();

    let keys = broadcast_split_keys(&world, config.simulation.rank_seed);
    let engine_id = world.rank();
    let sim_comm = world
        .split_by_color_with_key(Color::with_value(0), keys[engine_id as usize])
        .ok_or_else(|| MonitorError::Cluster("simulation communicator split failed".into()))?;

    let topology = EngineTopology::new(engine_id, world.size(), sim_comm.rank(), sim_comm.size());
    topology.log();

    let sim = &config.simulation;
    let interval = interval_by_rank(topology.sim_rank, topology.sim_size, sim.rows);
    let mut field = WaveField::new(interval, sim.rows, sim.cols);

    let rank_index = match gather_ranks(&world, topology.sim_rank).map(|r| build_rank_index(&r)) {
        Some(Ok(index)) => {
            info!("[Rank {}] Rank order {:?}", engine_id, index.as_slice());
            Some(index)
        }
        Some(Err(e)) => {
            // Peers are about to block in the next gather
            error!("[Rank {}] {}", engine_id, e);
            world.abort(1);
        }
        None => None,
    };

    let gather_every = sim.steps_per_refresh(config.monitor.refresh());
    let start = Instant::now();
    let mut frames = 0;

    for timestep in 1..=sim.nsteps {
        let block = field.step(timestep);

        if timestep % gather_every == 0 || timestep == sim.nsteps {
            let gathered = gather_blocks(&world, &block);
            if let (Some(blocks), Some(index)) = (gathered, rank_index.as_ref()) {
                match assemble_frame(blocks, index, timestep) {
                    Ok(frame) => {
                        sink.render(&frame);
                        frames += 1;
                    }
                    Err(e) => warn!("[Rank {}] Dropping frame {}: {}", engine_id, timestep, e),
                }
            }
        }

        if !sim.step_delay().is_zero() {
            std::thread::sleep(sim.step_delay());
        }
    }

    world.barrier();
    if is_root(engine_id) {
        info!(
            "[Rank {}] {} steps, {} frames in {:?}",
            engine_id,
            sim.nsteps,
            frames,
            start.elapsed()
        );
    }

    Ok(frames)
}

/// Reorders one gather into rank order and stitches it.
///
/// Every engine runs in lockstep here, so all blocks share `timestep`.
pub fn assemble_frame(
    blocks: Vec<ndarray::Array2<f64>>,
    rank_index: &RankIndex,
    timestep: usize,
) -> Result<Frame> {
    let ordered = reorder_owned(blocks, rank_index)?;
    let field = assemble_rows(&ordered)?;
    Ok(Frame {
        timesteps: vec![timestep; ordered.len()],
        field,
    })
}
