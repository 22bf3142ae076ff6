//! Centroid refinement from the pixel data inside a cutout.

use ndarray::ArrayView2;

use crate::examine::stats::arg_max_2d;
use crate::types::Centroid;

/// Intensity-weighted center of mass of a cutout, as (row, col).
///
/// Raw pixel values are the weights. A cutout with zero total flux has no
/// center of mass; the geometric center stands in so the caller never sees NaN.
pub fn center_of_mass(cutout: &ArrayView2<f32>) -> (f64, f64) {
    let mut total = 0.0f64;
    let mut row_sum = 0.0f64;
    let mut col_sum = 0.0f64;
    for ((row, col), &v) in cutout.indexed_iter() {
        let w = v as f64;
        total += w;
        row_sum += w * row as f64;
        col_sum += w * col as f64;
    }
    if total == 0.0 {
        let (rows, cols) = cutout.dim();
        return ((rows as f64 - 1.0) / 2.0, (cols as f64 - 1.0) / 2.0);
    }
    (row_sum / total, col_sum / total)
}

/// Refine an initial centroid using the cutout extracted around it.
///
/// The brightest pixel is the refined position when it is unique and nothing
/// in the box is saturated; otherwise the intensity-weighted center of mass is
/// used, since a flat-topped or bleeding source has no trustworthy peak. The
/// offset is measured from the cutout center (the rounded initial centroid)
/// and applied in exposure coordinates, mapping rows to y and columns to x.
pub fn refine_centroid(
    cutout: &ArrayView2<f32>,
    n_sat_pixels: usize,
    half_size: usize,
    initial: Centroid,
) -> Centroid {
    let peak = arg_max_2d(cutout);

    let (row, col) = if peak.unique && n_sat_pixels == 0 {
        (peak.location.0 as f64, peak.location.1 as f64)
    } else {
        log::info!(
            "peak unusable (unique={}, saturated pixels={}); refining via center of mass",
            peak.unique,
            n_sat_pixels
        );
        center_of_mass(cutout)
    };

    let row_offset = row - half_size as f64;
    let col_offset = col - half_size as f64;
    Centroid::new(initial.x + col_offset, initial.y + row_offset)
}
