use mzpeaks::{CentroidPeak, IndexType, PeakSet};

/// The intact ion an MS2 spectrum was fragmented from
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Precursor {
    pub mz: f64,
    /// Retention time in seconds
    pub rt: f64,
    /// Inverse reduced ion mobility, 1/K0
    pub im: f64,
    /// `None` when the charge state was not determined
    pub charge: Option<usize>,
    /// `0.0` when the source records no intensity
    pub intensity: f64,
    /// The precursor's identifier in its source, its `Precursors.Id` for TDF
    /// runs and its scan number for MS2 files
    pub index: usize,
    /// The frame the precursor was observed in, `0` when unknown
    pub frame_index: usize,
}

/// A centroided spectrum with its precursor and isolation details.
///
/// `mz_values` and `intensities` always have the same length. The peaks are in the
/// order the source stores them, which is not necessarily ascending m/z.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Spectrum {
    pub index: usize,
    pub mz_values: Vec<f64>,
    pub intensities: Vec<f64>,
    pub precursor: Option<Precursor>,
    pub collision_energy: f64,
    pub isolation_mz: f64,
    pub isolation_width: f64,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.mz_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz_values.is_empty()
    }

    pub fn total_ion_current(&self) -> f64 {
        self.intensities.iter().sum()
    }

    /// Iterate over `(mz, intensity)` pairs in storage order
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mz_values
            .iter()
            .copied()
            .zip(self.intensities.iter().copied())
    }

    /// Build an m/z-sorted [`PeakSet`] from this spectrum's peaks
    pub fn to_peak_set(&self) -> PeakSet {
        let peaks: Vec<CentroidPeak> = self
            .iter()
            .enumerate()
            .map(|(i, (mz, intensity))| CentroidPeak::new(mz, intensity as f32, i as IndexType))
            .collect();
        PeakSet::new(peaks)
    }
}
