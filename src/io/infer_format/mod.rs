mod dispatch;
mod inference;

pub use dispatch::{SpectrumReader, SpectrumReaderBuilder};

pub use inference::{infer_format, infer_from_path, infer_from_stream, MassSpectrometryFormat};
