use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use mpi::Rank;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{SimulationSnapshot, Stepper};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    pub nsteps: usize,
    pub step_delay: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Finished,
    Cancelled,
    /// The engine thread panicked
    Failed,
}

impl WorkerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerStatus::Running,
            1 => WorkerStatus::Finished,
            2 => WorkerStatus::Cancelled,
            _ => WorkerStatus::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerStatus::Running => 0,
            WorkerStatus::Finished => 1,
            WorkerStatus::Cancelled => 2,
            WorkerStatus::Failed => 3,
        }
    }
}

/// Handle to one engine running its loop on a background thread.
pub struct WorkerHandle {
    engine_id: usize,
    rank: Rank,
    cancel: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    snapshots: watch::Receiver<SimulationSnapshot>,
    thread: Option<JoinHandle<WorkerStatus>>,
}

impl WorkerHandle {
    pub fn engine_id(&self) -> usize {
        self.engine_id
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Non-blocking status query
    pub fn status(&self) -> WorkerStatus {
        let state = WorkerStatus::from_u8(self.state.load(Ordering::Acquire));
        let exited = self.thread.as_ref().is_some_and(|t| t.is_finished());

        // A panicking loop never records its final state
        if state == WorkerStatus::Running && exited {
            WorkerStatus::Failed
        } else {
            state
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status() == WorkerStatus::Running
    }

    /// Asks the loop to stop before its next step
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Latest published snapshot, without waiting for a new one
    pub fn latest(&self) -> SimulationSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SimulationSnapshot> {
        self.snapshots.clone()
    }

    /// Blocks until the loop exits and returns its final status
    pub fn join(mut self) -> WorkerStatus {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(status)) => status,
            Some(Err(_)) => {
                warn!("[Engine {}] Loop panicked", self.engine_id);
                WorkerStatus::Failed
            }
            None => self.status(),
        }
    }
}

/// Starts the per-rank loop for one engine.
///
/// The initial snapshot is published before the thread starts, so the
/// engine's rank can be pulled as soon as this returns.
pub fn spawn_worker<S: Stepper>(
    engine_id: usize,
    rank: Rank,
    mut stepper: S,
    settings: WorkerSettings,
) -> std::io::Result<WorkerHandle> {
    let initial =
        SimulationSnapshot::initial(engine_id, rank, settings.nsteps, stepper.block_shape());
    let (publisher, snapshots) = watch::channel(initial);

    let cancel = Arc::new(AtomicBool::new(false));
    let state = Arc::new(AtomicU8::new(WorkerStatus::Running.as_u8()));

    let thread = {
        let cancel = cancel.clone();
        let state = state.clone();

        thread::Builder::new()
            .name(format!("engine-{}", engine_id))
            .spawn(move || {
                info!(
                    "[Engine {}] Rank {} starting {} steps",
                    engine_id, rank, settings.nsteps
                );

                let status = run_loop(&mut stepper, &publisher, &cancel, settings);
                state.store(status.as_u8(), Ordering::Release);

                info!("[Engine {}] Rank {} {:?}", engine_id, rank, status);
                status
            })?
    };

    Ok(WorkerHandle {
        engine_id,
        rank,
        cancel,
        state,
        snapshots,
        thread: Some(thread),
    })
}

fn run_loop<S: Stepper>(
    stepper: &mut S,
    publisher: &watch::Sender<SimulationSnapshot>,
    cancel: &AtomicBool,
    settings: WorkerSettings,
) -> WorkerStatus {
    for timestep in 1..=settings.nsteps {
        if cancel.load(Ordering::Acquire) {
            return WorkerStatus::Cancelled;
        }

        let block = stepper.step(timestep);
        let next = publisher.borrow().next(timestep, block);
        publisher.send_replace(next);
        debug!("Published timestep {}/{}", timestep, settings.nsteps);

        if !settings.step_delay.is_zero() {
            thread::sleep(settings.step_delay);
        }
    }

    WorkerStatus::Finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::*;
    use ndarray::Array2;

    struct CountingStepper {
        cols: usize,
    }

    impl Stepper for CountingStepper {
        fn block_shape(&self) -> (usize, usize) {
            (1, self.cols)
        }

        fn step(&mut self, timestep: usize) -> Array2<f64> {
            Array2::from_elem((1, self.cols), timestep as f64)
        }
    }

    struct PanickingStepper;

    impl Stepper for PanickingStepper {
        fn block_shape(&self) -> (usize, usize) {
            (1, 1)
        }

        fn step(&mut self, _timestep: usize) -> Array2<f64> {
            panic!("stepper blew up");
        }
    }

    fn settings(nsteps: usize, delay_ms: u64) -> WorkerSettings {
        WorkerSettings {
            nsteps,
            step_delay: Duration::from_millis(delay_ms),
        }
    }

    #[test]
    fn test_worker_runs_to_completion() {
        init_test_tracing();
        let handle = spawn_worker(0, 3, CountingStepper { cols: 2 }, settings(5, 0)).unwrap();
        assert_eq!(handle.engine_id(), 0);
        assert_eq!(handle.rank(), 3);

        let receiver = handle.subscribe();
        assert_eq!(handle.join(), WorkerStatus::Finished);

        let last = receiver.borrow().clone();
        assert_eq!(last.timestep, 5);
        assert_eq!(last.rank, 3);
        assert!(last.is_last());
        assert!(last.block.iter().all(|v| *v == 5.0));
    }

    #[test]
    fn test_initial_snapshot_available_immediately() {
        let handle = spawn_worker(1, 0, CountingStepper { cols: 4 }, settings(3, 50)).unwrap();
        let snapshot = handle.latest();
        assert_eq!(snapshot.engine_id, 1);
        assert_eq!(snapshot.block.shape(), &[1, 4]);
        handle.cancel();
        handle.join();
    }

    #[test]
    fn test_cancel_stops_loop() {
        init_test_tracing();
        let handle = spawn_worker(0, 0, CountingStepper { cols: 1 }, settings(10_000, 5)).unwrap();
        assert!(handle.is_alive());

        handle.cancel();
        let receiver = handle.subscribe();
        assert_eq!(handle.join(), WorkerStatus::Cancelled);
        assert!(receiver.borrow().timestep < 10_000);
    }

    #[test]
    fn test_status_reports_running_then_finished() {
        let handle = spawn_worker(0, 0, CountingStepper { cols: 1 }, settings(4, 20)).unwrap();
        assert_eq!(handle.status(), WorkerStatus::Running);

        while handle.is_alive() {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.status(), WorkerStatus::Finished);
        assert_eq!(handle.join(), WorkerStatus::Finished);
    }

    #[test]
    fn test_panicking_stepper_reports_failed() {
        let handle = spawn_worker(2, 1, PanickingStepper, settings(3, 0)).unwrap();
        while handle.is_alive() {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.status(), WorkerStatus::Failed);
        assert_eq!(handle.join(), WorkerStatus::Failed);
    }

    #[test]
    fn test_snapshots_are_versioned() {
        let handle = spawn_worker(0, 0, CountingStepper { cols: 3 }, settings(20, 1)).unwrap();
        let mut seen = Vec::new();
        while handle.is_alive() {
            let snapshot = handle.latest();
            // Block contents always match the version they were published with
            assert!(
                snapshot
                    .block
                    .iter()
                    .all(|v| *v == snapshot.timestep as f64)
            );
            seen.push(snapshot.timestep);
            thread::sleep(Duration::from_millis(1));
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        handle.join();
    }
}
