use std::fmt::Display;

/// The MS level of a frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MSLevel {
    MS1,
    MS2,
    #[default]
    Unknown,
}

impl MSLevel {
    /// Map a raw `MsMsType` code from the `Frames` table to an MS level
    pub const fn from_msms_type(msms_type: u8) -> Self {
        match msms_type {
            0 => Self::MS1,
            2 | 8 | 9 | 10 => Self::MS2,
            _ => Self::Unknown,
        }
    }
}

impl Display for MSLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::MS1 => "MS1",
                Self::MS2 => "MS2",
                Self::Unknown => "Unknown",
            }
        )
    }
}

/// The acquisition scheme a run was recorded with. This is a property of the whole
/// run, not of an individual frame, so MS1 frames of a DIA-PASEF run are still
/// labeled [`AcquisitionType::DIAPASEF`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AcquisitionType {
    DDAPASEF,
    DIAPASEF,
    /// DIA-PASEF whose isolation windows slide across the mobility ramp, so windows of one
    /// group share scans
    DiagonalDIAPASEF,
    PRMPASEF,
    #[default]
    Unknown,
}

impl AcquisitionType {
    /// Infer the run-wide acquisition type from the `MsMsType` codes of all frames
    ///
    /// Both DIA variants share code `9`, so this reports [`AcquisitionType::DIAPASEF`] for
    /// either. The catalog refines it once the window layout is known.
    pub fn from_msms_types<I: IntoIterator<Item = u8>>(msms_types: I) -> Self {
        let mut acquisition = Self::Unknown;
        for code in msms_types {
            match code {
                8 => return Self::DDAPASEF,
                9 => return Self::DIAPASEF,
                10 => acquisition = Self::PRMPASEF,
                _ => {}
            }
        }
        acquisition
    }

    /// Whether MS2 frames of this run are fragmented through DIA window groups
    pub const fn is_dia(&self) -> bool {
        matches!(self, Self::DIAPASEF | Self::DiagonalDIAPASEF)
    }
}

impl Display for AcquisitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::DDAPASEF => "DDAPASEF",
                Self::DIAPASEF => "DIAPASEF",
                Self::DiagonalDIAPASEF => "DiagonalDIAPASEF",
                Self::PRMPASEF => "PRMPASEF",
                Self::Unknown => "Unknown",
            }
        )
    }
}
