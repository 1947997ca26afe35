// src/mpi_helpers/gather.rs
use mpi::datatype::PartitionMut;
use mpi::traits::*;
use mpi::{Count, Rank};
use ndarray::Array2;

use super::{ROOT, is_root};

/// Exclusive prefix sum of `counts`, i.e. where each engine's data starts
pub fn displacements(counts: &[Count]) -> Vec<Count> {
    counts
        .iter()
        .scan(0, |offset, &count| {
            let start = *offset;
            *offset += count;
            Some(start)
        })
        .collect()
}

/// Gathers one rank per engine on the root, in world (engine) order.
pub fn gather_ranks<C: Communicator>(world: &C, sim_rank: Rank) -> Option<Vec<Rank>> {
    let root = world.process_at_rank(ROOT);

    if is_root(world.rank()) {
        let mut ranks = vec![0 as Rank; world.size() as usize];
        root.gather_into_root(&sim_rank, &mut ranks[..]);
        Some(ranks)
    } else {
        root.gather_into(&sim_rank);
        None
    }
}

/// Gathers every engine's row block on the root, in world (engine) order.
///
/// Blocks may differ in row count; all engines must agree on `cols`.
pub fn gather_blocks<C: Communicator>(world: &C, block: &Array2<f64>) -> Option<Vec<Array2<f64>>> {
    let root = world.process_at_rank(ROOT);
    let cols = block.ncols();
    let local: Vec<f64> = block.iter().cloned().collect();
    let local_rows = block.nrows() as Count;

    if !is_root(world.rank()) {
        root.gather_into(&local_rows);
        root.gather_varcount_into(&local[..]);
        return None;
    }

    let mut rows = vec![0 as Count; world.size() as usize];
    root.gather_into_root(&local_rows, &mut rows[..]);

    let counts: Vec<Count> = rows.iter().map(|r| r * cols as Count).collect();
    let displs = displacements(&counts);
    let total: Count = counts.iter().sum();

    let mut buffer = vec![0.0f64; total as usize];
    {
        let mut partition = PartitionMut::new(&mut buffer[..], &counts[..], &displs[..]);
        root.gather_varcount_into_root(&local[..], &mut partition);
    }

    let blocks = rows
        .iter()
        .zip(displs.iter())
        .map(|(&r, &start)| {
            let start = start as usize;
            let len = r as usize * cols;
            Array2::from_shape_vec((r as usize, cols), buffer[start..start + len].to_vec())
                .unwrap_or_else(|_| Array2::zeros((0, cols)))
        })
        .collect();

    Some(blocks)
}
