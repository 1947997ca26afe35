// src/cluster.rs
use mpi::Rank;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::info;

use crate::{
    config::SimulationConfig,
    error::{MonitorError, Result},
    mpi_helpers::load_balance::interval_by_rank,
    simulation::{
        SimulationSnapshot, Stepper, WaveField, WorkerHandle, WorkerSettings, WorkerStatus,
        spawn_worker,
    },
};

/// Synchronous pulls against a pool of engines.
///
/// Every `pull_*` returns one entry per engine in engine-enumeration order,
/// which is not rank order.
#[cfg_attr(test, mockall::automock)]
pub trait ClusterClient {
    fn pull_ranks(&self) -> Result<Vec<Rank>>;

    fn pull_payloads(&self) -> Result<Vec<SimulationSnapshot>>;

    fn any_alive(&self) -> bool;

    /// Requests every engine to stop; does not wait
    fn stop(&self);
}

/// Rank each engine will report, as a shuffled permutation of `0..engines`.
///
/// With a seed the layout is reproducible; otherwise it differs per run,
/// like an MPI launcher that does not follow the orchestrator's numbering.
pub fn assign_ranks(engines: usize, seed: Option<u64>) -> Vec<Rank> {
    let mut ranks: Vec<Rank> = (0..engines as Rank).collect();
    match seed {
        Some(seed) => ranks.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => ranks.shuffle(&mut rand::rng()),
    }
    ranks
}

/// Engines running as threads in this process.
pub struct LocalCluster {
    workers: Vec<WorkerHandle>,
}

impl LocalCluster {
    /// Spawns `config.engines` engines; `make_stepper(rank, size)` builds the
    /// workload for the rank an engine was assigned.
    pub fn launch<S, F>(config: &SimulationConfig, make_stepper: F) -> Result<Self>
    where
        S: Stepper,
        F: Fn(Rank, Rank) -> S,
    {
        let size = config.engines as Rank;
        let ranks = assign_ranks(config.engines, config.rank_seed);
        let settings = WorkerSettings {
            nsteps: config.nsteps,
            step_delay: config.step_delay(),
        };

        let mut workers = Vec::with_capacity(config.engines);
        for (engine_id, &rank) in ranks.iter().enumerate() {
            let stepper = make_stepper(rank, size);
            let handle = spawn_worker(engine_id, rank, stepper, settings).map_err(|e| {
                MonitorError::Cluster(format!("failed to start engine {}: {}", engine_id, e))
            })?;
            workers.push(handle);
        }

        info!("Started {} engines with ranks {:?}", workers.len(), ranks);
        Ok(Self { workers })
    }

    /// Joins every engine and fails on the first one that did not exit cleanly
    pub fn shutdown(self) -> Result<Vec<WorkerStatus>> {
        let mut statuses = Vec::with_capacity(self.workers.len());
        let mut failed = None;

        for worker in self.workers {
            let engine_id = worker.engine_id();
            let status = worker.join();
            if status == WorkerStatus::Failed && failed.is_none() {
                failed = Some(MonitorError::EngineFailed { engine_id, status });
            }
            statuses.push(status);
        }

        match failed {
            Some(err) => Err(err),
            None => Ok(statuses),
        }
    }
}

impl ClusterClient for LocalCluster {
    fn pull_ranks(&self) -> Result<Vec<Rank>> {
        Ok(self.workers.iter().map(|w| w.latest().rank).collect())
    }

    fn pull_payloads(&self) -> Result<Vec<SimulationSnapshot>> {
        Ok(self.workers.iter().map(WorkerHandle::latest).collect())
    }

    fn any_alive(&self) -> bool {
        self.workers.iter().any(WorkerHandle::is_alive)
    }

    fn stop(&self) {
        self.workers.iter().for_each(WorkerHandle::cancel);
    }
}

/// Wave-field workload over the rows `rank` owns.
pub fn wave_field_for(rows: usize, cols: usize) -> impl Fn(Rank, Rank) -> WaveField {
    move |rank, size| WaveField::new(interval_by_rank(rank, size, rows), rows, cols)
}
