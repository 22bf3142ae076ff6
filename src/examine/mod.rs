//! Exposure examination: centroid, cutout, radial fit, image statistics.

pub mod centroid;
pub mod cutout;
pub mod fitting;
pub mod radial;
pub mod stats;

use rayon::prelude::*;

use crate::detection;
use crate::error::{Error, Result};
use crate::report::ExamReport;
use crate::types::{Centroid, Exposure};

use centroid::refine_centroid;
use cutout::extract_cutout;
use radial::compute_radial_profile;
use stats::{arg_max_2d, clipped_mean_stddev, count_mask_pixels, percentile};

/// Builder configuration for examination (internal).
struct ExaminerConfig {
    box_half_size: usize,
    tweak_centroid: bool,
    fit_max_iterations: usize,
    detection_sigma: f64,
    min_source_pixels: usize,
}

/// Exposure examiner with builder pattern.
pub struct ExposureExaminer {
    config: ExaminerConfig,
}

impl ExposureExaminer {
    pub fn new() -> Self {
        ExposureExaminer {
            config: ExaminerConfig {
                box_half_size: 50,
                tweak_centroid: true,
                fit_max_iterations: 100,
                detection_sigma: 10.0,
                min_source_pixels: 10,
            },
        }
    }

    /// Half-size of the analysis box; the box side is 2 * half-size + 1.
    pub fn with_box_half_size(mut self, half_size: usize) -> Self {
        self.config.box_half_size = half_size;
        self
    }

    /// Take the supplied centroid as-is instead of refining it from the data.
    pub fn without_centroid_tweak(mut self) -> Self {
        self.config.tweak_centroid = false;
        self
    }

    /// Iteration budget for the radial Gaussian fit.
    pub fn with_fit_max_iterations(mut self, iterations: usize) -> Self {
        self.config.fit_max_iterations = iterations.max(1);
        self
    }

    /// Detection threshold in sigma above the clipped noise, for the fallback
    /// source finder.
    pub fn with_detection_sigma(mut self, sigma: f64) -> Self {
        self.config.detection_sigma = sigma.max(1.0);
        self
    }

    /// Reject detected regions with fewer pixels than this (filters hot pixels).
    pub fn with_min_source_pixels(mut self, pixels: usize) -> Self {
        self.config.min_source_pixels = pixels.max(1);
        self
    }

    /// Examine an exposure, finding the source automatically.
    pub fn examine(&self, exposure: &Exposure) -> Result<ExamReport> {
        let found = detection::find_brightest_source(
            exposure,
            self.config.detection_sigma,
            self.config.min_source_pixels,
        )
        .ok_or(Error::NoSourceFound)?;
        log::info!("detected source at ({:.1}, {:.1})", found.x, found.y);
        self.examine_at(exposure, found)
    }

    /// Examine an exposure around a known source position.
    pub fn examine_at(&self, exposure: &Exposure, initial: Centroid) -> Result<ExamReport> {
        // First cutout establishes the largest box that fits; the refined
        // centroid then gets its own box of the same (possibly shrunk) size.
        let (first_cutout, first_bbox, first_n_sat) =
            extract_cutout(exposure, initial, self.config.box_half_size)?;

        let centroid = if self.config.tweak_centroid {
            refine_centroid(
                &first_cutout.view(),
                first_n_sat,
                first_bbox.half_size,
                initial,
            )
        } else {
            initial
        };

        let (cutout, bbox, n_sat_in_box) =
            extract_cutout(exposure, centroid, first_bbox.half_size)?;

        let image = exposure.image();
        let peak = arg_max_2d(&image.view());
        let pixels: Vec<f32> = image.iter().copied().collect();
        let (clipped_mean, clipped_stddev) = clipped_mean_stddev(&pixels, 5.0, 2);

        let profile = compute_radial_profile(&cutout.view(), self.config.fit_max_iterations)?;

        Ok(ExamReport {
            info: exposure.info().clone(),
            max_value: image[peak.location] as f64,
            max_pixel_location: peak.location,
            max_pixel_unique: peak.unique,
            n_bad_pixels: count_mask_pixels(exposure, "BAD"),
            n_sat_pixels: count_mask_pixels(exposure, "SAT"),
            percentile99: percentile(&pixels, 99.0),
            percentile9999: percentile(&pixels, 99.99),
            clipped_mean,
            clipped_stddev,
            centroid: (centroid.x, centroid.y),
            box_half_size: bbox.half_size,
            n_sat_pix_in_box: n_sat_in_box,
            fit_amp: profile.fit.amplitude,
            fit_gauss_mean: profile.fit.mean,
            fit_fwhm: profile.fit.fwhm,
            ee_radius50: profile.ee_radius(50.0),
            ee_radius80: profile.ee_radius(80.0),
            ee_radius90: profile.ee_radius(90.0),
        })
    }

    /// Examine a batch of exposures in parallel, one result per input.
    pub fn examine_batch(&self, exposures: &[Exposure]) -> Vec<Result<ExamReport>> {
        exposures.par_iter().map(|exp| self.examine(exp)).collect()
    }
}

impl Default for ExposureExaminer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Background 10 plus one Gaussian source, deterministic noise.
    fn star_exposure(rows: usize, cols: usize, row: f64, col: f64, amp: f32) -> Exposure {
        let sigma = 3.0f64;
        let mut image = Array2::from_shape_fn((rows, cols), |(r, c)| {
            let dr = r as f64 - row;
            let dc = c as f64 - col;
            10.0 + amp * (-(dr * dr + dc * dc) / (2.0 * sigma * sigma)).exp() as f32
        });
        let mut rng = 12345u64;
        for v in image.iter_mut() {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            *v += ((rng >> 33) as f32 / (1u64 << 31) as f32 - 0.5) * 0.2;
        }
        Exposure::new(image).unwrap()
    }

    #[test]
    fn test_examine_at_refines_and_measures() {
        let exp = star_exposure(200, 200, 100.0, 100.0, 5000.0);
        let report = ExposureExaminer::new()
            .examine_at(&exp, Centroid::new(98.0, 97.0))
            .unwrap();

        // The peak pixel pulls the centroid onto the true source.
        assert!((report.centroid.0 - 100.0).abs() < 0.5, "x: {}", report.centroid.0);
        assert!((report.centroid.1 - 100.0).abs() < 0.5, "y: {}", report.centroid.1);
        assert_eq!(report.box_half_size, 50);
        assert!(report.max_pixel_unique);
        assert_eq!(report.max_pixel_location, (100, 100));

        // sigma=3 source: FWHM near 7.06 pixels. The constant background is
        // not part of the radial model, so allow the fit to run slightly wide.
        assert!((report.fit_fwhm - 7.06).abs() < 0.7, "fwhm: {}", report.fit_fwhm);
        assert!(report.ee_radius50 < report.ee_radius80);
        assert!(report.ee_radius80 < report.ee_radius90);

        // Background statistics: clipping removes the source.
        assert!((report.clipped_mean - 10.0).abs() < 0.5, "mean: {}", report.clipped_mean);
        assert!(report.max_value > 4000.0);
    }

    #[test]
    fn test_examine_detects_source() {
        let exp = star_exposure(200, 200, 120.0, 80.0, 5000.0);
        let report = ExposureExaminer::new().examine(&exp).unwrap();
        assert!((report.centroid.0 - 80.0).abs() < 1.0, "x: {}", report.centroid.0);
        assert!((report.centroid.1 - 120.0).abs() < 1.0, "y: {}", report.centroid.1);
    }

    #[test]
    fn test_examine_empty_field_is_no_source() {
        let mut image = Array2::<f32>::from_elem((100, 100), 10.0);
        let mut rng = 777u64;
        for v in image.iter_mut() {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            *v += ((rng >> 33) as f32 / (1u64 << 31) as f32 - 0.5) * 2.0;
        }
        let exp = Exposure::new(image).unwrap();
        let result = ExposureExaminer::new().examine(&exp);
        assert!(matches!(result, Err(Error::NoSourceFound)));
    }

    #[test]
    fn test_box_shrinks_for_edge_source() {
        let exp = star_exposure(200, 200, 100.0, 8.0, 5000.0);
        let report = ExposureExaminer::new()
            .examine_at(&exp, Centroid::new(8.0, 100.0))
            .unwrap();
        assert_eq!(report.box_half_size, 8);
    }

    #[test]
    fn test_without_tweak_keeps_centroid() {
        let exp = star_exposure(200, 200, 100.0, 100.0, 5000.0);
        let report = ExposureExaminer::new()
            .without_centroid_tweak()
            .examine_at(&exp, Centroid::new(98.0, 97.0))
            .unwrap();
        assert_eq!(report.centroid, (98.0, 97.0));
    }

    #[test]
    fn test_examine_batch_matches_single() {
        let exposures = vec![
            star_exposure(150, 150, 75.0, 75.0, 5000.0),
            star_exposure(150, 150, 60.0, 90.0, 3000.0),
        ];
        let examiner = ExposureExaminer::new();
        let batch = examiner.examine_batch(&exposures);
        assert_eq!(batch.len(), 2);
        for (exp, result) in exposures.iter().zip(batch.iter()) {
            let single = examiner.examine(exp).unwrap();
            let batched = result.as_ref().unwrap();
            assert_eq!(single.centroid, batched.centroid);
            assert_eq!(single.box_half_size, batched.box_half_size);
        }
    }
}
