use std::f64::consts::PI;

use ndarray::Array2;

use crate::mpi_helpers::load_balance::RowInterval;

use super::Stepper;

/// Travelling wave over the rows a rank owns, used as demo workload.
pub struct WaveField {
    interval: RowInterval,
    rows: usize,
    cols: usize,
}

impl WaveField {
    pub fn new(interval: RowInterval, rows: usize, cols: usize) -> Self {
        Self {
            interval,
            rows,
            cols,
        }
    }
}

impl Stepper for WaveField {
    fn block_shape(&self) -> (usize, usize) {
        (self.interval.get_count(), self.cols)
    }

    fn step(&mut self, timestep: usize) -> Array2<f64> {
        let phase = 0.1 * timestep as f64;
        let dx = 2.0 * PI / self.rows.max(1) as f64;
        let dy = 2.0 * PI / self.cols.max(1) as f64;

        Array2::from_shape_fn(self.block_shape(), |(i, j)| {
            let x = (self.interval.start_row + i) as f64 * dx;
            let y = j as f64 * dy;
            (x + phase).sin() * y.cos()
        })
    }
}
