use crate::spectrum::MSLevel;

/// The `MsMsType` codes of the `Frames` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsMsType {
    MS1 = 0,
    MRM = 2,
    DDAPASEF = 8,
    DIAPASEF = 9,
    PRMPASEF = 10,

    Unknown = -1,
}

impl MsMsType {
    pub const fn ms_level(&self) -> MSLevel {
        match self {
            MsMsType::MS1 => MSLevel::MS1,
            MsMsType::MRM => MSLevel::MS2,
            MsMsType::DDAPASEF => MSLevel::MS2,
            MsMsType::DIAPASEF => MSLevel::MS2,
            MsMsType::PRMPASEF => MSLevel::MS2,
            MsMsType::Unknown => MSLevel::Unknown,
        }
    }
}

impl From<u8> for MsMsType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::MS1,
            2 => Self::MRM,
            8 => Self::DDAPASEF,
            9 => Self::DIAPASEF,
            10 => Self::PRMPASEF,
            _ => Self::Unknown,
        }
    }
}

/// The only `TimsCompressionType` this crate decodes, zstd compressed byte-shuffled blobs
pub const SUPPORTED_COMPRESSION_TYPE: u8 = 2;

pub const TDF_FILE_NAME: &str = "analysis.tdf";
pub const TDF_BIN_FILE_NAME: &str = "analysis.tdf_bin";
