//! A set of traits and types that are commonly needed together
pub use crate::calibration::{CalibrationModel, ConvertableDomain};
pub use crate::io::tdf::{DiaWindowResolver, MetadataProvider};
pub use crate::io::{
    BatchPolicy, DetailLevel, FrameReader, SpectrumReader, TDFSpectrumReader, TimsError,
};
pub use crate::spectrum::{AcquisitionType, Frame, MSLevel, Precursor, Spectrum};
