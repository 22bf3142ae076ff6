// Quick-look diagnostics for astronomical CCD exposures.

pub mod detection;
pub mod error;
pub mod examine;
pub mod report;
pub mod sorter;
pub mod types;

// Re-export the main entry points for library users
pub use error::{Error, Result};
pub use examine::radial::SIGMA_TO_FWHM;
pub use examine::ExposureExaminer;
pub use report::ExamReport;
pub use sorter::{AnnotationStore, DataId, ReviewMode};
pub use types::{Bounds, Centroid, Exposure, ObservationInfo};
