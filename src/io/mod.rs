//! Reading timsTOF runs and MS2 text files.
//!
//! [`tdf`] reads Bruker `.d` directories frame by frame or as assembled MS2 spectra,
//! [`ms2`] parses MS2 text files, and [`SpectrumReader`] picks between them by
//! inspecting a path.

pub(crate) mod compression;
mod error;
mod infer_format;
pub mod ms2;
mod offset_index;
mod shorthand;
pub mod tdf;
mod utils;

pub use crate::io::error::TimsError;

pub use crate::io::infer_format::{
    infer_format, infer_from_path, infer_from_stream, MassSpectrometryFormat, SpectrumReader,
    SpectrumReaderBuilder,
};

pub use crate::io::ms2::{MS2Error, MS2GzReader, MS2Reader, MS2ReaderType};

pub use crate::io::offset_index::OffsetIndex;

pub use crate::io::shorthand::{read_all_frames, read_all_spectra};

pub use crate::io::tdf::{
    FrameDecodeError, FrameIter, FrameReader, FrameReaderBuilder, TDFCatalog, TDFSpectrumReader,
};

pub use crate::io::utils::{BatchPolicy, DetailLevel};
