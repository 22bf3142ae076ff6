//! Examination report: the flat aggregate of everything measured on an exposure.

use serde::{Deserialize, Serialize};

use crate::types::ObservationInfo;

/// All quick-look measurements for one exposure.
///
/// Image statistics cover the full exposure; cutout quantities cover the
/// square analysis box around the source. Fit values are NaN when the radial
/// Gaussian fit did not converge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamReport {
    /// Observation metadata carried over from the exposure.
    pub info: ObservationInfo,

    // Full-image statistics.
    pub max_value: f64,
    /// (row, col) of the brightest pixel.
    pub max_pixel_location: (usize, usize),
    /// True when exactly one pixel holds the maximum value.
    pub max_pixel_unique: bool,
    pub n_bad_pixels: usize,
    pub n_sat_pixels: usize,
    pub percentile99: f64,
    pub percentile9999: f64,
    pub clipped_mean: f64,
    pub clipped_stddev: f64,

    // Cutout measurements.
    /// Refined source centroid (x, y) in exposure coordinates.
    pub centroid: (f64, f64),
    /// Half-size of the analysis box actually used.
    pub box_half_size: usize,
    /// Saturated pixels inside the analysis box.
    pub n_sat_pix_in_box: usize,
    pub fit_amp: f64,
    pub fit_gauss_mean: f64,
    pub fit_fwhm: f64,
    /// Radius enclosing 50% of the source flux, pixels.
    pub ee_radius50: f64,
    /// Radius enclosing 80% of the source flux, pixels.
    pub ee_radius80: f64,
    /// Radius enclosing 90% of the source flux, pixels.
    pub ee_radius90: f64,
}

impl ExamReport {
    /// Render the report as aligned text lines, one section per concern.
    /// Missing metadata renders as a blank value rather than being skipped,
    /// so reports for different exposures line up when printed side by side.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        lines.push("     ---- Astro ----".to_string());
        lines.push(entry("Object name", opt_string(&self.info.object)));
        lines.push(entry("MJD", opt_float(self.info.mjd, 6)));
        lines.push(entry("Exp time (s)", opt_float(self.info.exp_time, 2)));
        lines.push(entry("Filter", opt_string(&self.info.filter)));
        lines.push(entry("Grating", opt_string(&self.info.grating)));
        lines.push(entry("Airmass", opt_float(self.info.airmass, 3)));
        lines.push(entry("Rotation angle (deg)", opt_float(self.info.rot_angle, 3)));
        lines.push(entry("Azimuth (deg)", opt_float(self.info.azimuth, 3)));
        lines.push(entry("Elevation (deg)", opt_float(self.info.elevation, 3)));
        if let Some(focus) = self.info.focus_z {
            lines.push(entry("Focus Z", format!("{:.3}", focus)));
        }

        lines.push("     ---- Image ----".to_string());
        lines.push(entry("Max pixel value", format!("{:.3}", self.max_value)));
        lines.push(entry(
            "Max pixel location",
            format!("({}, {})", self.max_pixel_location.0, self.max_pixel_location.1),
        ));
        lines.push(entry("Unique max pixel?", format!("{}", self.max_pixel_unique)));
        lines.push(entry("nBadPixels", format!("{}", self.n_bad_pixels)));
        lines.push(entry("nSatPixels", format!("{}", self.n_sat_pixels)));
        lines.push(entry("Percentile99", format!("{:.3}", self.percentile99)));
        lines.push(entry("Percentile99.99", format!("{:.3}", self.percentile9999)));
        lines.push(entry("Clipped mean", format!("{:.3}", self.clipped_mean)));
        lines.push(entry("Clipped stddev", format!("{:.3}", self.clipped_stddev)));

        lines.push("     ---- Cutout ----".to_string());
        lines.push(entry(
            "Source centroid",
            format!("{:.1}, {:.1}", self.centroid.0, self.centroid.1),
        ));
        lines.push(entry("Box half-size", format!("{}", self.box_half_size)));
        lines.push(entry("nSatPix in box", format!("{}", self.n_sat_pix_in_box)));
        lines.push(entry("Fit amplitude", format!("{:.3}", self.fit_amp)));
        lines.push(entry("Fit Gaussian mean", format!("{:.3}", self.fit_gauss_mean)));
        lines.push(entry("FWHM (pix)", format!("{:.3}", self.fit_fwhm)));
        lines.push(entry("50% flux radius (pix)", format!("{:.3}", self.ee_radius50)));
        lines.push(entry("80% flux radius (pix)", format!("{:.3}", self.ee_radius80)));
        lines.push(entry("90% flux radius (pix)", format!("{:.3}", self.ee_radius90)));

        lines
    }
}

fn entry(label: &str, value: String) -> String {
    format!("{:<22} {}", format!("{}:", label), value)
}

fn opt_string(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn opt_float(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ExamReport {
        ExamReport {
            info: ObservationInfo {
                object: Some("HD 12345".to_string()),
                mjd: Some(60000.123456),
                exp_time: Some(30.0),
                filter: Some("SDSSr".to_string()),
                grating: None,
                airmass: Some(1.234),
                rot_angle: None,
                azimuth: Some(180.0),
                elevation: Some(45.0),
                focus_z: None,
            },
            max_value: 54321.0,
            max_pixel_location: (100, 200),
            max_pixel_unique: true,
            n_bad_pixels: 12,
            n_sat_pixels: 3,
            percentile99: 1500.5,
            percentile9999: 40000.0,
            clipped_mean: 10.25,
            clipped_stddev: 4.5,
            centroid: (200.4, 100.6),
            box_half_size: 50,
            n_sat_pix_in_box: 0,
            fit_amp: 5000.0,
            fit_gauss_mean: 0.1,
            fit_fwhm: 7.07,
            ee_radius50: 4.2,
            ee_radius80: 14.0,
            ee_radius90: 36.0,
        }
    }

    #[test]
    fn test_summary_has_three_sections() {
        let lines = sample_report().summary_lines();
        let sections: Vec<&String> = lines.iter().filter(|l| l.contains("----")).collect();
        assert_eq!(sections.len(), 3);
        assert!(sections[0].contains("Astro"));
        assert!(sections[1].contains("Image"));
        assert!(sections[2].contains("Cutout"));
    }

    #[test]
    fn test_missing_metadata_renders_blank() {
        let lines = sample_report().summary_lines();
        let grating = lines.iter().find(|l| l.starts_with("Grating:")).unwrap();
        assert_eq!(grating.trim_end(), "Grating:");
        // focus_z is absent entirely when the header lacks it.
        assert!(!lines.iter().any(|l| l.starts_with("Focus Z:")));
    }

    #[test]
    fn test_centroid_formatting() {
        let lines = sample_report().summary_lines();
        let centroid = lines.iter().find(|l| l.contains("Source centroid")).unwrap();
        assert!(centroid.contains("200.4, 100.6"), "line: {}", centroid);
    }

    #[test]
    fn test_report_round_trips_through_json() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: ExamReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_pixel_location, (100, 200));
        assert_eq!(back.info.object.as_deref(), Some("HD 12345"));
        assert!((back.ee_radius50 - 4.2).abs() < 1e-12);
    }
}
