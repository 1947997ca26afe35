// src/monitor.rs
use std::time::Duration;

use ndarray::Array2;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    assemble::{assemble_rows, field_summary},
    cluster::ClusterClient,
    error::Result,
    reorder::{RankIndex, build_rank_index, reorder},
};

/// Rank-ordered view of the whole mesh at one poll.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Timestep each rank had reached, indexed by rank
    pub timesteps: Vec<usize>,
    pub field: Array2<f64>,
}

impl Frame {
    /// Oldest and newest timestep across ranks
    pub fn timestep_range(&self) -> Option<(usize, usize)> {
        let min = self.timesteps.iter().min()?;
        let max = self.timesteps.iter().max()?;
        Some((*min, *max))
    }
}

/// Consumer of assembled frames, e.g. a plot renderer.
pub trait FrameSink {
    fn render(&mut self, frame: &Frame);
}

/// Logs a one-line summary of every frame.
#[derive(Default)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn render(&mut self, frame: &Frame) {
        let (first, last) = frame.timestep_range().unwrap_or((0, 0));
        match field_summary(&frame.field) {
            Some((min, max, mean)) => info!(
                "Frame {:?} at timesteps {}..={}: min {:.3} max {:.3} mean {:.3}",
                frame.field.shape(),
                first,
                last,
                min,
                max,
                mean
            ),
            None => info!("Frame at timesteps {}..={} is empty", first, last),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Every engine finished or stopped on its own
    Completed,
    Interrupted,
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorReport {
    pub outcome: MonitorOutcome,
    pub frames: usize,
}

/// Polls a cluster and turns engine-ordered payloads into rank-ordered frames.
pub struct Monitor<C: ClusterClient> {
    client: C,
    rank_index: RankIndex,
    last_frame: Option<Frame>,
}

impl<C: ClusterClient> Monitor<C> {
    /// Pulls the ranks once and fixes the rank index for the session.
    pub fn connect(client: C) -> Result<Self> {
        let ranks = client.pull_ranks()?;
        let rank_index = build_rank_index(&ranks)?;
        info!(
            "Connected to {} engines, rank order {:?}",
            rank_index.len(),
            rank_index.as_slice()
        );
        for rank in 0..rank_index.len() {
            debug!("Rank {} lives on engine {:?}", rank, rank_index.worker_for_rank(rank));
        }

        Ok(Self {
            client,
            rank_index,
            last_frame: None,
        })
    }

    pub fn rank_index(&self) -> &RankIndex {
        &self.rank_index
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn into_client(self) -> C {
        self.client
    }

    pub fn poll_frame(&self) -> Result<Frame> {
        let snapshots = reorder(&self.client.pull_payloads()?, &self.rank_index)?;

        let timesteps = snapshots.iter().map(|s| s.timestep).collect();
        let blocks: Vec<_> = snapshots.into_iter().map(|s| s.block).collect();
        let field = assemble_rows(&blocks)?;

        Ok(Frame { timesteps, field })
    }

    /// Polls once and hands the frame to `sink`.
    ///
    /// On failure the previous frame is kept and `false` is returned.
    pub fn refresh<S: FrameSink>(&mut self, sink: &mut S) -> bool {
        match self.poll_frame() {
            Ok(frame) => {
                sink.render(&frame);
                self.last_frame = Some(frame);
                true
            }
            Err(e) => {
                warn!("Poll failed, keeping last frame: {}", e);
                false
            }
        }
    }

    /// Polls every `refresh` until no engine is alive, Ctrl-C or `timeout`.
    ///
    /// Engines are asked to stop on every exit path.
    pub async fn run<S: FrameSink>(
        &mut self,
        sink: &mut S,
        refresh: Duration,
        timeout: Option<Duration>,
    ) -> MonitorReport {
        let mut ticker = tokio::time::interval(refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = timeout.map(|t| Instant::now() + t);
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);

        let mut frames = 0;
        let outcome = loop {
            tokio::select! {
                _ = &mut interrupted => break MonitorOutcome::Interrupted,
                _ = &mut expired => break MonitorOutcome::TimedOut,
                _ = ticker.tick() => {
                    // Checked before polling so the final state still gets rendered
                    let alive = self.client.any_alive();
                    if self.refresh(sink) {
                        frames += 1;
                    }
                    if !alive {
                        break MonitorOutcome::Completed;
                    }
                }
            }
        };

        self.client.stop();
        info!("Monitoring ended: {:?} after {} frames", outcome, frames);
        MonitorReport { outcome, frames }
    }
}
