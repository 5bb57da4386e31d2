//! `mztims` reads Bruker timsTOF `.d` directories and MS2 text files.
//!
//! A timsTOF run is read frame by frame with [`FrameReader`], which decodes the raw
//! TOF indices and intensities of every ion mobility scan, or as assembled MS2 spectra
//! with [`TDFSpectrumReader`]. Raw coordinates are converted to m/z, 1/K0 and retention
//! time through the run's [`CalibrationModel`](crate::calibration::CalibrationModel).
//!
//! ```no_run
//! use mztims::prelude::*;
//!
//! # fn main() -> Result<(), TimsError> {
//! let reader = FrameReader::new("./run.d")?;
//! for frame in reader.read_ms1_frames()? {
//!     let mzs = reader.resolve_mzs(&frame.tof_indices)?;
//!     println!("Frame {} at {:.2}s has {} peaks", frame.index, frame.rt, mzs.len());
//! }
//! # Ok(())
//! # }
//! ```
pub mod calibration;
pub mod io;
pub mod prelude;
pub mod spectrum;

pub use crate::io::{
    read_all_frames, read_all_spectra, FrameReader, MS2Reader, SpectrumReader, TDFSpectrumReader,
    TimsError,
};
pub use crate::spectrum::{DenseFrame, Frame, Precursor, QuadrupoleSettings, Spectrum};

pub use mzpeaks;
