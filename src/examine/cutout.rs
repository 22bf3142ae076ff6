//! Square cutout extraction around a source, shrinking at exposure edges.

use ndarray::{s, Array2};

use crate::error::{Error, Result};
use crate::examine::stats::count_set_bits;
use crate::types::{Centroid, Exposure};

/// The pixel region a cutout was taken from, in exposure coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub begin_x: i64,
    pub begin_y: i64,
    pub end_x: i64,
    pub end_y: i64,
    /// Half-size actually used; the box side is 2 * half_size + 1.
    pub half_size: usize,
}

/// Extract a square cutout of side 2 * half_size + 1 centered on the rounded
/// centroid, together with its bounding box and the count of saturated pixels
/// inside it.
///
/// When the requested box overhangs the exposure, the half-size shrinks to the
/// largest value that fits and extraction retries, so the result is always an
/// odd-sided square centered on the source. A centroid whose rounded position
/// lies outside the exposure is a geometry error.
pub fn extract_cutout(
    exposure: &Exposure,
    centroid: Centroid,
    half_size: usize,
) -> Result<(Array2<f32>, BoundingBox, usize)> {
    let bounds = exposure.bounds();
    let (cx, cy) = centroid.rounded();
    if !bounds.contains(cx, cy) {
        return Err(Error::Geometry { centroid, half_size });
    }

    let mut half = half_size as i64;
    loop {
        let begin_x = (cx - half).max(bounds.begin_x);
        let begin_y = (cy - half).max(bounds.begin_y);
        let end_x = (cx + half + 1).min(bounds.end_x);
        let end_y = (cy + half + 1).min(bounds.end_y);

        let side = 2 * half + 1;
        if end_x - begin_x == side && end_y - begin_y == side {
            let (row0, col0) = exposure.index_for(begin_x, begin_y);
            let (row1, col1) = exposure.index_for(end_x, end_y);
            let cutout = exposure
                .image()
                .slice(s![row0..row1, col0..col1])
                .to_owned();
            let n_sat = match exposure.bit_for_plane("SAT") {
                Some(bit) => count_set_bits(exposure.mask().slice(s![row0..row1, col0..col1]), bit),
                None => 0,
            };
            let bbox = BoundingBox {
                begin_x,
                begin_y,
                end_x,
                end_y,
                half_size: half as usize,
            };
            return Ok((cutout, bbox, n_sat));
        }

        // Largest half-size that keeps the centered box inside the exposure.
        let max_half = (cx - bounds.begin_x)
            .min(bounds.end_x - cx - 1)
            .min(cy - bounds.begin_y)
            .min(bounds.end_y - cy - 1);
        log::info!(
            "shrinking cutout at ({}, {}) from half-size {} to {} to fit the exposure",
            cx,
            cy,
            half,
            max_half
        );
        half = max_half;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_exposure(rows: usize, cols: usize) -> Exposure {
        let image =
            Array2::from_shape_fn((rows, cols), |(row, col)| (row * cols + col) as f32);
        Exposure::new(image).unwrap()
    }

    #[test]
    fn test_full_box_fits() {
        let exp = ramp_exposure(100, 100);
        let (cutout, bbox, n_sat) =
            extract_cutout(&exp, Centroid::new(50.0, 50.0), 10).unwrap();
        assert_eq!(cutout.dim(), (21, 21));
        assert_eq!(bbox.half_size, 10);
        assert_eq!((bbox.begin_x, bbox.begin_y), (40, 40));
        assert_eq!((bbox.end_x, bbox.end_y), (61, 61));
        assert_eq!(n_sat, 0);
        // Center of the cutout is the rounded centroid pixel.
        assert_eq!(cutout[[10, 10]], exp.image()[[50, 50]]);
    }

    #[test]
    fn test_shrinks_near_corner() {
        let exp = ramp_exposure(100, 100);
        let (cutout, bbox, _) = extract_cutout(&exp, Centroid::new(5.0, 5.0), 50).unwrap();
        assert_eq!(bbox.half_size, 5);
        assert_eq!(cutout.dim(), (11, 11));
        assert_eq!((bbox.begin_x, bbox.begin_y), (0, 0));
    }

    #[test]
    fn test_shrinks_near_one_edge() {
        let exp = ramp_exposure(200, 200);
        let (cutout, bbox, _) = extract_cutout(&exp, Centroid::new(5.0, 100.0), 50).unwrap();
        assert_eq!(bbox.half_size, 5, "x distance to the left edge limits the box");
        assert_eq!(cutout.dim(), (11, 11));
        assert_eq!(bbox.begin_x, 0);
        assert_eq!(bbox.begin_y, 95);
    }

    #[test]
    fn test_centroid_outside_is_geometry_error() {
        let exp = ramp_exposure(50, 50);
        let result = extract_cutout(&exp, Centroid::new(60.0, 10.0), 5);
        assert!(matches!(result, Err(Error::Geometry { .. })));
    }

    #[test]
    fn test_respects_origin() {
        let exp = ramp_exposure(100, 100).with_origin(1000, 2000);
        let (cutout, bbox, _) =
            extract_cutout(&exp, Centroid::new(1050.0, 2050.0), 10).unwrap();
        assert_eq!(cutout.dim(), (21, 21));
        assert_eq!((bbox.begin_x, bbox.begin_y), (1040, 2040));
        assert_eq!(cutout[[10, 10]], exp.image()[[50, 50]]);

        let result = extract_cutout(&exp, Centroid::new(50.0, 50.0), 10);
        assert!(matches!(result, Err(Error::Geometry { .. })));
    }

    #[test]
    fn test_counts_saturated_pixels_inside_box_only() {
        let mut exp = ramp_exposure(100, 100);
        let sat = exp.bit_for_plane("SAT").unwrap();
        exp.mask_mut()[[50, 50]] = sat;
        exp.mask_mut()[[52, 48]] = sat;
        exp.mask_mut()[[90, 90]] = sat;
        let (_, _, n_sat) = extract_cutout(&exp, Centroid::new(50.0, 50.0), 10).unwrap();
        assert_eq!(n_sat, 2);
    }

    #[test]
    fn test_rounding_picks_nearest_pixel() {
        let exp = ramp_exposure(100, 100);
        let (_, bbox, _) = extract_cutout(&exp, Centroid::new(49.6, 50.4), 10).unwrap();
        assert_eq!((bbox.begin_x, bbox.begin_y), (40, 40));
    }
}
