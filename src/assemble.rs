// src/assemble.rs
use std::borrow::Borrow;

use ndarray::{Array2, ArrayView2, Axis, concatenate};

use crate::error::AssembleError;

/// Stacks rank-ordered row blocks into the global mesh.
///
/// Blocks must already be in rank order; this only checks that they share
/// a column count.
pub fn assemble_rows<B: Borrow<Array2<f64>>>(blocks: &[B]) -> Result<Array2<f64>, AssembleError> {
    let views: Vec<ArrayView2<f64>> = blocks
        .iter()
        .map(|block| {
            let block: &Array2<f64> = block.borrow();
            block.view()
        })
        .collect();

    let expected = views.first().ok_or(AssembleError::Empty)?.ncols();
    if let Some((rank, view)) = views
        .iter()
        .enumerate()
        .find(|(_, view)| view.ncols() != expected)
    {
        return Err(AssembleError::ColumnMismatch {
            rank,
            expected,
            found: view.ncols(),
        });
    }

    concatenate(Axis(0), &views).map_err(|e| AssembleError::Shape(e.to_string()))
}

/// Min, max and mean of a field; `None` for an empty field.
pub fn field_summary(field: &Array2<f64>) -> Option<(f64, f64, f64)> {
    let mean = field.mean()?;
    let min = field.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = field.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max, mean))
}
