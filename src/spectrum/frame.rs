use std::{fmt::Display, sync::Arc};

use super::scan_properties::{AcquisitionType, MSLevel};

/// A single timsTOF frame, holding the raw, uncalibrated peak data of every
/// ion mobility scan acquired at one retention time.
///
/// The peaks are stored scan by scan in three flat arrays. `scan_offsets[i]` is
/// the cumulative number of peaks up to and including scan `i`, so the peaks of
/// scan `i` are found at `scan_offsets[i - 1]..scan_offsets[i]` (with an implicit
/// leading zero for scan `0`). See [`Frame::scan_peak_range`].
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    /// The frame number, 1-based as in the `Frames` table
    pub index: usize,
    /// Retention time in seconds
    pub rt: f64,
    pub ms_level: MSLevel,
    pub acquisition_type: AcquisitionType,
    pub scan_offsets: Vec<usize>,
    pub tof_indices: Vec<u32>,
    pub intensities: Vec<u32>,
    /// The DIA window group this frame was acquired with, if any
    pub window_group: Option<u32>,
    /// The isolation windows of `window_group`, shared by every frame of that group.
    /// Empty for frames without a window group.
    pub quadrupole_settings: Arc<QuadrupoleSettings>,
    pub intensity_correction_factor: f64,
}

/// The quadrupole isolation windows of one DIA window group, stored column-wise with
/// one entry per window in catalog order
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadrupoleSettings {
    /// The window group number
    pub index: usize,
    pub scan_starts: Vec<usize>,
    pub scan_ends: Vec<usize>,
    pub isolation_mz: Vec<f64>,
    pub isolation_width: Vec<f64>,
    pub collision_energy: Vec<f64>,
}

impl QuadrupoleSettings {
    pub fn len(&self) -> usize {
        self.isolation_mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.isolation_mz.is_empty()
    }

    /// Whether any two non-empty windows cover a common scan, as happens when the
    /// isolation windows slide diagonally across the mobility ramp
    pub fn has_overlapping_windows(&self) -> bool {
        let mut ranges: Vec<(usize, usize)> = self
            .scan_starts
            .iter()
            .copied()
            .zip(self.scan_ends.iter().copied())
            .filter(|(start, end)| start < end)
            .collect();
        ranges.sort_unstable();
        ranges.windows(2).any(|pair| pair[1].0 < pair[0].1)
    }
}

impl Frame {
    /// The number of ion mobility scans in this frame
    pub fn scan_count(&self) -> usize {
        self.scan_offsets.len()
    }

    /// The total number of peaks across all scans
    pub fn peak_count(&self) -> usize {
        self.tof_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tof_indices.is_empty()
    }

    /// The range of peak positions belonging to scan `scan`, 0-based.
    pub fn scan_peak_range(&self, scan: usize) -> Option<std::ops::Range<usize>> {
        let end = *self.scan_offsets.get(scan)?;
        let start = if scan == 0 {
            0
        } else {
            self.scan_offsets[scan - 1]
        };
        Some(start..end)
    }

    /// Intensities scaled by the accumulation time correction factor
    pub fn corrected_intensities(&self) -> Vec<f64> {
        self.intensities
            .iter()
            .map(|i| *i as f64 * self.intensity_correction_factor)
            .collect()
    }

    /// Build an iterator over `(scan, peak position)` pairs in storage order
    pub fn iter_scan_positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let mut start = 0;
        self.scan_offsets
            .iter()
            .enumerate()
            .flat_map(move |(scan, end)| {
                let positions = start..*end;
                start = *end;
                positions.map(move |i| (scan, i))
            })
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame(index={}, rt={}, ms_level={}, acquisition_type={}, scans={}, peaks={})",
            self.index,
            self.rt,
            self.ms_level,
            self.acquisition_type,
            self.scan_count(),
            self.peak_count()
        )
    }
}

/// A flattened, fully calibrated view of a [`Frame`] with one entry per peak in
/// every array.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenseFrame {
    pub index: usize,
    pub rt: f64,
    pub mz_values: Vec<f64>,
    pub ion_mobilities: Vec<f64>,
    pub intensities: Vec<u32>,
}

impl DenseFrame {
    pub fn len(&self) -> usize {
        self.mz_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz_values.is_empty()
    }
}
