//! Fallback source detection when the caller supplies no centroid.

use ndarray::Array2;

use crate::examine::stats::{clipped_mean_stddev, percentile, quick_smooth};
use crate::types::{Centroid, Exposure};

/// Find the brightest plausible source in an exposure.
///
/// The image is median-subtracted into a working copy, smoothed, and
/// thresholded at `n_sigma` times the clipped noise of the smoothed copy.
/// Connected regions (8-connectivity) smaller than `n_pix_min` pixels are
/// discarded as hot pixels and cosmic rays. The flux-weighted centroid of the
/// highest-flux surviving region is returned in exposure coordinates; None
/// means nothing rose above the threshold.
pub fn find_brightest_source(
    exposure: &Exposure,
    n_sigma: f64,
    n_pix_min: usize,
) -> Option<Centroid> {
    let pixels = exposure.image().as_slice()?;
    let median = percentile(pixels, 50.0) as f32;
    let subtracted = exposure.image().mapv(|v| v - median);

    let smoothed = quick_smooth(&subtracted, 2.0);
    let smoothed_pixels = smoothed
        .as_slice()
        .unwrap_or(&[]);
    let (_, noise) = clipped_mean_stddev(smoothed_pixels, 5.0, 2);
    if !noise.is_finite() {
        return None;
    }
    let threshold = (n_sigma * noise) as f32;

    let blobs = label_regions(&smoothed, threshold);
    log::debug!(
        "{} regions above {:.2} (noise {:.2}, {} sigma)",
        blobs.len(),
        threshold,
        noise,
        n_sigma
    );

    let best = blobs
        .into_iter()
        .filter(|b| b.pixels.len() >= n_pix_min)
        .max_by(|a, b| a.flux.total_cmp(&b.flux))?;

    // Flux-weighted centroid over the smoothed values, then back to exposure
    // coordinates through the origin.
    let mut sum_w = 0.0f64;
    let mut sum_row = 0.0f64;
    let mut sum_col = 0.0f64;
    for &(row, col) in &best.pixels {
        let w = smoothed[[row, col]].max(0.0) as f64;
        sum_w += w;
        sum_row += w * row as f64;
        sum_col += w * col as f64;
    }
    if sum_w <= 0.0 {
        return None;
    }

    let bounds = exposure.bounds();
    Some(Centroid::new(
        sum_col / sum_w + bounds.begin_x as f64,
        sum_row / sum_w + bounds.begin_y as f64,
    ))
}

struct Blob {
    pixels: Vec<(usize, usize)>,
    flux: f64,
}

/// 8-connected labeling of pixels above `threshold`, by flood fill.
fn label_regions(data: &Array2<f32>, threshold: f32) -> Vec<Blob> {
    let (rows, cols) = data.dim();
    let mut visited = vec![false; rows * cols];
    let mut blobs = Vec::new();
    let mut stack = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if visited[row * cols + col] || data[[row, col]] <= threshold {
                continue;
            }

            let mut pixels = Vec::new();
            let mut flux = 0.0f64;
            visited[row * cols + col] = true;
            stack.push((row, col));
            while let Some((r, c)) = stack.pop() {
                pixels.push((r, c));
                flux += data[[r, c]] as f64;
                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        let nr = r as i64 + dr;
                        let nc = c as i64 + dc;
                        if nr < 0 || nr >= rows as i64 || nc < 0 || nc >= cols as i64 {
                            continue;
                        }
                        let (nr, nc) = (nr as usize, nc as usize);
                        if !visited[nr * cols + nc] && data[[nr, nc]] > threshold {
                            visited[nr * cols + nc] = true;
                            stack.push((nr, nc));
                        }
                    }
                }
            }
            blobs.push(Blob { pixels, flux });
        }
    }

    blobs
}
