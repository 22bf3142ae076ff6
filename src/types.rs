//! Core data types: exposures, mask planes, centroids, observation metadata.
//!
//! Coordinate convention (inherited from the observatory tooling and preserved
//! deliberately): pixel arrays are indexed `[row, col]`; row corresponds to y and
//! column to x. Centroids are (x, y) in exposure pixel coordinates, which include
//! the exposure origin offset.

use std::collections::HashMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mask planes registered on every exposure, in bit order.
pub const DEFAULT_MASK_PLANES: [&str; 6] = ["BAD", "SAT", "INTRP", "CR", "EDGE", "DETECTED"];

/// Subpixel source position in exposure pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub fn new(x: f64, y: f64) -> Self {
        Centroid { x, y }
    }

    /// Nearest-integer pixel position as (x, y).
    pub fn rounded(&self) -> (i64, i64) {
        (self.x.round() as i64, self.y.round() as i64)
    }
}

/// Integer half-open pixel bounds: [begin_x, end_x) x [begin_y, end_y).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub begin_x: i64,
    pub begin_y: i64,
    pub end_x: i64,
    pub end_y: i64,
}

impl Bounds {
    pub fn width(&self) -> i64 {
        self.end_x - self.begin_x
    }

    pub fn height(&self) -> i64 {
        self.end_y - self.begin_y
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.begin_x && x < self.end_x && y >= self.begin_y && y < self.end_y
    }
}

/// Observation metadata attached to an exposure.
///
/// Every field is optional: a value the header could not supply flows through to
/// the report as a blank instead of failing the analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationInfo {
    /// Target object name.
    pub object: Option<String>,
    /// Modified Julian Date of the exposure start.
    pub mjd: Option<f64>,
    /// Exposure time in seconds.
    pub exp_time: Option<f64>,
    /// Filter name.
    pub filter: Option<String>,
    /// Grating / disperser name.
    pub grating: Option<String>,
    /// Boresight airmass.
    pub airmass: Option<f64>,
    /// Boresight rotation angle, degrees.
    pub rot_angle: Option<f64>,
    /// Boresight azimuth, degrees.
    pub azimuth: Option<f64>,
    /// Boresight elevation, degrees.
    pub elevation: Option<f64>,
    /// Focus stage position, when the header carries one.
    pub focus_z: Option<f64>,
}

/// One CCD exposure: pixel data, a parallel quality bitmask, named mask planes,
/// an integer pixel origin, and observation metadata.
///
/// Read-only during analysis; the examiner copies the regions it needs.
#[derive(Debug, Clone)]
pub struct Exposure {
    image: Array2<f32>,
    mask: Array2<u32>,
    planes: HashMap<String, u32>,
    origin: (i64, i64),
    info: ObservationInfo,
}

impl Exposure {
    /// Exposure with an all-clear mask, origin (0, 0), and empty metadata.
    pub fn new(image: Array2<f32>) -> Result<Self> {
        if image.is_empty() {
            return Err(Error::EmptyExposure);
        }
        let mask = Array2::zeros(image.dim());
        Ok(Exposure {
            image,
            mask,
            planes: default_planes(),
            origin: (0, 0),
            info: ObservationInfo::default(),
        })
    }

    /// Replace the mask; must match the image shape.
    pub fn with_mask(mut self, mask: Array2<u32>) -> Result<Self> {
        if mask.dim() != self.image.dim() {
            return Err(Error::MaskShapeMismatch {
                image: self.image.dim(),
                mask: mask.dim(),
            });
        }
        self.mask = mask;
        Ok(self)
    }

    /// Set the pixel origin (begin_x, begin_y) of the exposure bounds.
    pub fn with_origin(mut self, begin_x: i64, begin_y: i64) -> Self {
        self.origin = (begin_x, begin_y);
        self
    }

    pub fn with_info(mut self, info: ObservationInfo) -> Self {
        self.info = info;
        self
    }

    pub fn image(&self) -> &Array2<f32> {
        &self.image
    }

    pub fn mask(&self) -> &Array2<u32> {
        &self.mask
    }

    /// Mutable mask access, for flagging pixels when assembling an exposure.
    pub fn mask_mut(&mut self) -> &mut Array2<u32> {
        &mut self.mask
    }

    pub fn info(&self) -> &ObservationInfo {
        &self.info
    }

    /// Image width in pixels (columns).
    pub fn width(&self) -> usize {
        self.image.ncols()
    }

    /// Image height in pixels (rows).
    pub fn height(&self) -> usize {
        self.image.nrows()
    }

    /// Half-open pixel bounds, including the origin offset.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            begin_x: self.origin.0,
            begin_y: self.origin.1,
            end_x: self.origin.0 + self.width() as i64,
            end_y: self.origin.1 + self.height() as i64,
        }
    }

    /// Bit value for a named mask plane, or None when unregistered.
    pub fn bit_for_plane(&self, name: &str) -> Option<u32> {
        self.planes.get(name).copied()
    }

    /// Register an extra mask plane and return its assigned bit value.
    pub fn add_mask_plane(&mut self, name: &str) -> u32 {
        if let Some(&bit) = self.planes.get(name) {
            return bit;
        }
        let bit = 1u32 << self.planes.len();
        self.planes.insert(name.to_string(), bit);
        bit
    }

    /// Array index (row, col) for exposure pixel coordinates (x, y).
    /// The caller must have checked `bounds().contains(x, y)`.
    pub(crate) fn index_for(&self, x: i64, y: i64) -> (usize, usize) {
        ((y - self.origin.1) as usize, (x - self.origin.0) as usize)
    }
}

fn default_planes() -> HashMap<String, u32> {
    DEFAULT_MASK_PLANES
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), 1u32 << i))
        .collect()
}
