// src/reorder.rs
use mpi::Rank;

use crate::error::ReorderError;

/// Permutation from rank order to engine order.
///
/// `index[k]` is the engine position whose self-reported rank is `k`.
/// Built once per session from a rank snapshot and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankIndex(Vec<usize>);

impl RankIndex {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Engine position holding `rank`, if the rank is in range
    pub fn worker_for_rank(&self, rank: usize) -> Option<usize> {
        self.0.get(rank).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// Argsort of `ranks`, rejecting anything that is not a permutation of `[0, N)`.
pub fn build_rank_index(ranks: &[Rank]) -> Result<RankIndex, ReorderError> {
    let size = ranks.len();
    let mut index: Vec<Option<usize>> = vec![None; size];

    for (worker, &rank) in ranks.iter().enumerate() {
        if rank < 0 || rank as usize >= size {
            return Err(ReorderError::InvalidInput(format!(
                "engine {} reported rank {} outside [0, {})",
                worker, rank, size
            )));
        }

        let slot = &mut index[rank as usize];
        if let Some(previous) = slot {
            return Err(ReorderError::InvalidInput(format!(
                "rank {} reported by engines {} and {}",
                rank, previous, worker
            )));
        }
        *slot = Some(worker);
    }

    // In-range and duplicate-free over N slots means every slot is filled
    Ok(RankIndex(index.into_iter().flatten().collect()))
}

/// `result[k] = values[rank_index[k]]`
pub fn reorder<T: Clone>(values: &[T], rank_index: &RankIndex) -> Result<Vec<T>, ReorderError> {
    check_lengths(values.len(), rank_index)?;
    Ok(rank_index.0.iter().map(|&worker| values[worker].clone()).collect())
}

/// Same as [`reorder`] but moves the payloads instead of cloning them.
pub fn reorder_owned<T>(values: Vec<T>, rank_index: &RankIndex) -> Result<Vec<T>, ReorderError> {
    check_lengths(values.len(), rank_index)?;

    let mut slots: Vec<Option<T>> = values.into_iter().map(Some).collect();
    Ok(rank_index
        .0
        .iter()
        .filter_map(|&worker| slots[worker].take())
        .collect())
}

fn check_lengths(values: usize, rank_index: &RankIndex) -> Result<(), ReorderError> {
    if values != rank_index.len() {
        return Err(ReorderError::LengthMismatch {
            values,
            index: rank_index.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::*;

    #[test]
    fn test_scenario_shuffled_ranks() {
        let ranks = vec![1, 3, 0, 2];
        let values = vec!["w0", "w1", "w2", "w3"];

        let index = build_rank_index(&ranks).unwrap();
        assert_eq!(index.as_slice(), &[2, 0, 3, 1]);

        let ordered = reorder(&values, &index).unwrap();
        assert_eq!(ordered, vec!["w2", "w0", "w3", "w1"]);
    }

    #[test]
    fn test_single_engine() {
        let index = build_rank_index(&[0]).unwrap();
        let ordered = reorder(&["x"], &index).unwrap();
        assert_eq!(ordered, vec!["x"]);
    }

    #[test]
    fn test_already_ordered() {
        let index = build_rank_index(&[0, 1, 2]).unwrap();
        let ordered = reorder(&['a', 'b', 'c'], &index).unwrap();
        assert_eq!(ordered, vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_length_mismatch() {
        let index = build_rank_index(&[3, 0, 2, 1]).unwrap();
        let result = reorder(&[1.0, 2.0, 3.0], &index);
        assert_eq!(
            result,
            Err(ReorderError::LengthMismatch {
                values: 3,
                index: 4
            })
        );

        let result = reorder_owned(vec![1, 2, 3, 4, 5], &index);
        assert!(matches!(
            result,
            Err(ReorderError::LengthMismatch { values: 5, index: 4 })
        ));
    }

    #[test]
    fn test_empty_ranks() {
        let index = build_rank_index(&[]).unwrap();
        assert!(index.is_empty());
        assert_eq!(reorder::<u8>(&[], &index).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let result = build_rank_index(&[0, 1, 1]);
        assert!(matches!(result, Err(ReorderError::InvalidInput(_))));
    }

    #[test]
    fn test_out_of_range_rank_rejected() {
        // Gap at 1: ranks look unique but 3 is out of range for N=3
        assert!(matches!(
            build_rank_index(&[0, 2, 3]),
            Err(ReorderError::InvalidInput(_))
        ));
        assert!(matches!(
            build_rank_index(&[-1, 0]),
            Err(ReorderError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reorder_of_ranks_is_identity() {
        for n in [1, 2, 5, 17, 64] {
            let ranks = shuffled_ranks(n);
            let index = build_rank_index(&ranks).unwrap();
            let ordered = reorder(&ranks, &index).unwrap();
            let expected: Vec<Rank> = (0..n as Rank).collect();
            assert_eq!(ordered, expected);
        }
    }

    #[test]
    fn test_identity_ranks_keep_values() {
        let values = generate_many_mock_blocks(6, 2, 3);
        let ranks: Vec<Rank> = (0..6).collect();
        let index = build_rank_index(&ranks).unwrap();
        assert_eq!(reorder(&values, &index).unwrap(), values);
    }

    #[test]
    fn test_reorder_preserves_multiset() {
        let ranks = shuffled_ranks(32);
        let index = build_rank_index(&ranks).unwrap();
        let values: Vec<usize> = (0..32).map(|i| i * 7 % 5).collect();

        let mut ordered = reorder(&values, &index).unwrap();
        let mut original = values.clone();
        ordered.sort();
        original.sort();
        assert_eq!(ordered, original);
    }

    #[test]
    fn test_reorder_owned_matches_reorder() {
        let ranks = shuffled_ranks(10);
        let index = build_rank_index(&ranks).unwrap();
        let values: Vec<String> = (0..10).map(|i| format!("engine-{}", i)).collect();

        let cloned = reorder(&values, &index).unwrap();
        let moved = reorder_owned(values, &index).unwrap();
        assert_eq!(cloned, moved);
    }

    #[test]
    fn test_worker_for_rank() {
        let index = build_rank_index(&[1, 3, 0, 2]).unwrap();
        assert_eq!(index.worker_for_rank(0), Some(2));
        assert_eq!(index.worker_for_rank(3), Some(1));
        assert_eq!(index.worker_for_rank(4), None);
    }
}
