pub mod gather;
pub mod load_balance;
pub mod session;
pub mod topology;

use mpi::Rank;

pub const ROOT: Rank = 0;

pub fn is_root(rank: Rank) -> bool {
    ROOT == rank
}
