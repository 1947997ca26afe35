use mpi::Rank;

/// Contiguous range of mesh rows owned by one simulation rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowInterval {
    pub start_row: usize,
    pub end_row: usize,
}

impl RowInterval {
    pub fn get_count(&self) -> usize {
        self.end_row - self.start_row
    }
}

/// Rows of a `rows`-row mesh owned by `rank` out of `size` ranks.
///
/// The first `rows % size` ranks take one extra row, so block sizes differ
/// by at most one and ranks past the end of the mesh get an empty interval.
pub fn interval_by_rank(rank: Rank, size: Rank, rows: usize) -> RowInterval {
    let size = size.max(1) as usize;
    let rank = rank.max(0) as usize;

    let base = rows / size;
    let remainder = rows % size;
    let start_row = rank * base + rank.min(remainder);
    let count = if rank < remainder { base + 1 } else { base };

    let start_row = start_row.min(rows);
    RowInterval {
        start_row,
        end_row: (start_row + count).min(rows),
    }
}

pub fn partition_rows(rows: usize, size: Rank) -> Vec<RowInterval> {
    (0..size.max(1))
        .map(|rank| interval_by_rank(rank, size, rows))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_by_rank() {
        // Equal distribution case
        let interval = interval_by_rank(1, 4, 100);
        assert_eq!(interval.start_row, 25);
        assert_eq!(interval.end_row, 50);

        // Remainder goes to the lowest ranks
        let interval = interval_by_rank(0, 4, 10);
        assert_eq!((interval.start_row, interval.end_row), (0, 3));
        let interval = interval_by_rank(3, 4, 10);
        assert_eq!((interval.start_row, interval.end_row), (8, 10));

        // More ranks than rows case
        let interval = interval_by_rank(2, 10, 5);
        assert_eq!((interval.start_row, interval.end_row), (2, 3));
        let interval = interval_by_rank(7, 10, 5);
        assert_eq!(interval.get_count(), 0);
    }

    #[test]
    fn test_partition_covers_mesh() {
        for (rows, size) in [(100, 4), (7, 3), (3, 5), (1, 1), (64, 7)] {
            let intervals = partition_rows(rows, size);
            assert_eq!(intervals.len(), size as usize);
            assert_eq!(intervals[0].start_row, 0);
            for pair in intervals.windows(2) {
                assert_eq!(pair[0].end_row, pair[1].start_row);
            }
            let total: usize = intervals.iter().map(|i| i.get_count()).sum();
            assert_eq!(total, rows);
        }
    }
}
