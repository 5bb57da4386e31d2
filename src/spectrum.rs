//! The in-memory representations produced by the readers: raw [`Frame`]s, their calibrated
//! [`DenseFrame`] view, and centroided [`Spectrum`] records.
pub mod frame;
pub mod scan_properties;
pub mod spectrum_types;

pub use crate::spectrum::frame::{DenseFrame, Frame, QuadrupoleSettings};
pub use crate::spectrum::scan_properties::{AcquisitionType, MSLevel};
pub use crate::spectrum::spectrum_types::{Precursor, Spectrum};
