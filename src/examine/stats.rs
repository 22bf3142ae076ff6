//! Pixel statistics: maxima, mask counts, smoothing, percentiles, sigma clipping.

use ndarray::{Array2, ArrayView2};

use crate::types::Exposure;

/// Location of an array's maximum value and whether it is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgMax {
    /// (row, col) of the first maximum in row-major scan order.
    pub location: (usize, usize),
    /// True when exactly one pixel holds the maximum value.
    pub unique: bool,
    /// Remaining locations that hold the same value, in scan order.
    pub others: Vec<(usize, usize)>,
}

/// Find the maximum of a 2D array and every pixel tied with it.
///
/// Ties are exact float equality. The first occurrence in row-major order is
/// the reported location.
pub fn arg_max_2d(data: &ArrayView2<f32>) -> ArgMax {
    let mut max_value = f32::NEG_INFINITY;
    for &v in data.iter() {
        if v > max_value {
            max_value = v;
        }
    }

    let mut hits = Vec::new();
    for ((row, col), &v) in data.indexed_iter() {
        if v == max_value {
            hits.push((row, col));
        }
    }

    let location = hits[0];
    let unique = hits.len() == 1;
    ArgMax {
        location,
        unique,
        others: hits.split_off(1),
    }
}

/// Count pixels with a given mask bit set.
pub fn count_set_bits(mask: ArrayView2<u32>, bit: u32) -> usize {
    mask.iter().filter(|&&m| m & bit != 0).count()
}

/// Count pixels flagged in a named mask plane. Unknown plane names count zero.
pub fn count_mask_pixels(exposure: &Exposure, plane: &str) -> usize {
    match exposure.bit_for_plane(plane) {
        Some(bit) => count_set_bits(exposure.mask().view(), bit),
        None => 0,
    }
}

/// Separable Gaussian smoothing with zero padding at the edges.
///
/// The kernel extends to round(4 * sigma) pixels on each side, matching the
/// truncation the detection stage expects.
pub fn quick_smooth(data: &Array2<f32>, sigma: f64) -> Array2<f32> {
    let radius = (4.0 * sigma).round() as i64;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    let mut sum = 0.0f64;
    for i in -radius..=radius {
        let w = (-(i as f64).powi(2) / (2.0 * sigma * sigma)).exp();
        kernel.push(w);
        sum += w;
    }
    for w in kernel.iter_mut() {
        *w /= sum;
    }

    let (rows, cols) = data.dim();

    // Horizontal pass, then vertical. Out-of-bounds taps contribute zero.
    let mut horizontal = Array2::<f32>::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            let mut acc = 0.0f64;
            for (k, &w) in kernel.iter().enumerate() {
                let src = col as i64 + k as i64 - radius;
                if src >= 0 && (src as usize) < cols {
                    acc += w * data[[row, src as usize]] as f64;
                }
            }
            horizontal[[row, col]] = acc as f32;
        }
    }

    let mut smoothed = Array2::<f32>::zeros((rows, cols));
    for col in 0..cols {
        for row in 0..rows {
            let mut acc = 0.0f64;
            for (k, &w) in kernel.iter().enumerate() {
                let src = row as i64 + k as i64 - radius;
                if src >= 0 && (src as usize) < rows {
                    acc += w * horizontal[[src as usize, col]] as f64;
                }
            }
            smoothed[[row, col]] = acc as f32;
        }
    }

    smoothed
}

/// Percentile of a sample via linear interpolation between closest ranks.
///
/// `p` is in [0, 100]. Empty input yields NaN.
pub fn percentile(values: &[f32], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted: Vec<f32> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo] as f64;
    }
    let frac = rank - lo as f64;
    sorted[lo] as f64 * (1.0 - frac) + sorted[hi] as f64 * frac
}

/// Iteratively sigma-clipped mean and sample standard deviation.
///
/// Each iteration recomputes the statistics and discards samples further than
/// `n_sigma` standard deviations from the mean. Returns (mean, stddev); an
/// empty sample yields NaNs.
pub fn clipped_mean_stddev(values: &[f32], n_sigma: f64, iterations: usize) -> (f64, f64) {
    let mut sample: Vec<f64> = values.iter().map(|&v| v as f64).collect();

    let mut mean = f64::NAN;
    let mut stddev = f64::NAN;
    for _ in 0..=iterations {
        if sample.is_empty() {
            return (mean, stddev);
        }
        let n = sample.len() as f64;
        mean = sample.iter().sum::<f64>() / n;
        let var = if sample.len() > 1 {
            sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        stddev = var.sqrt();

        let cutoff = n_sigma * stddev;
        sample.retain(|v| (v - mean).abs() <= cutoff);
    }

    (mean, stddev)
}
