//! Time-axis reduction kernel
//!
//! Each output cell is reduced sequentially along the time axis in f64, so the
//! parallel and sequential paths give bit-identical results; parallelism only
//! spreads cells across Rayon's pool.

use crate::errors::{PrecipError, Result};
use ndarray::{ArrayD, ArrayView1, Axis, IxDyn, Zip};

/// Sums along `axis` and multiplies by `scale`, propagating `NaN`
///
/// Unlike a skip-NaN statistic, a single missing sample makes the whole
/// cell missing.
///
/// # Errors
///
/// Returns an error if the axis is out of bounds for the array.
pub fn parallel_sum_axis(
    data: &ArrayD<f32>,
    axis: usize,
    scale: f64,
    parallel: bool,
) -> Result<ArrayD<f32>> {
    if axis >= data.ndim() {
        return Err(PrecipError::InvalidMetadata(format!(
            "Axis {axis} is out of bounds for array with {} dimensions",
            data.ndim()
        )));
    }

    let mut new_shape = data.shape().to_vec();
    new_shape.remove(axis);
    let mut result = ArrayD::<f32>::zeros(IxDyn(&new_shape));

    let reduce = move |out: &mut f32, lane: ArrayView1<f32>| {
        let sum: f64 = lane.iter().map(|&v| f64::from(v)).sum();
        #[allow(clippy::cast_possible_truncation)]
        {
            *out = (sum * scale) as f32;
        }
    };

    let zip = Zip::from(&mut result).and(data.lanes(Axis(axis)));
    if parallel {
        zip.par_for_each(reduce);
    } else {
        zip.for_each(reduce);
    }

    Ok(result)
}
