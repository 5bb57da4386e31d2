//! Reader implementation for Bruker's timsTOF `.d` directories.
//!
//! A run is made of a SQLite catalog, `analysis.tdf`, and a frame store, `analysis.tdf_bin`.
//! [`TDFCatalog`] loads the catalog into typed records, [`FrameReader`] decodes frames from
//! the store on demand, and [`TDFSpectrumReader`] assembles MS2 spectra from them.
//!
//! [`rusqlite`] is used to read the catalog and [`zstd`] to decompress frame records.
mod blob;
mod catalog;
mod constants;
mod dia;
mod reader;
mod spectra;
mod sql;

#[cfg(test)]
pub(crate) mod fixtures;

pub use blob::{
    decode_frame_blob, encode_frame_record, read_record_header, DecodedFrame, FrameDecodeError,
    TdfBinReader, TdfBlob, RECORD_HEADER_SIZE,
};
pub use catalog::{
    DiaFrameGroupMap, DiaWindow, DiaWindowGroupMap, FrameInfo, MetadataProvider, PasefWindow,
    PrecursorRecord, RunMetadata, TDFCatalog,
};
pub use constants::{MsMsType, SUPPORTED_COMPRESSION_TYPE, TDF_BIN_FILE_NAME, TDF_FILE_NAME};
pub use dia::{scan_range_for_window, DiaWindowResolver};
pub use reader::{is_tdf, FrameIter, FrameReader, FrameReaderBuilder};
pub use spectra::{SpectrumSource, TDFSpectrumReader};
