//! Conversion of raw instrument coordinates into physical quantities.
//!
//! A timsTOF run records each peak as a time-of-flight channel, a scan number within the
//! ion mobility ramp, and the frame it was acquired in. The converters here map those
//! integer coordinates to m/z, inverse reduced ion mobility (1/K0), and retention time
//! using coefficients read once from the run's catalog.
//!
//! All converters are immutable after construction and may be shared freely between threads.
use thiserror::Error;

/// An error raised when a raw coordinate falls outside the domain a calibration
/// model was built for.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Index {value} is outside the calibrated domain [{lower}, {upper}]")]
    OutOfRangeIndex { value: f64, lower: f64, upper: f64 },
}

/// A monotonic mapping between a raw instrument coordinate and a physical value.
pub trait ConvertableDomain {
    /// Map a raw coordinate to a physical value without checking the domain
    fn convert<T: Into<f64> + Copy>(&self, value: T) -> f64;

    /// Map a physical value back to a (fractional) raw coordinate. This is never
    /// checked, values outside the calibrated range extrapolate.
    fn invert<T: Into<f64> + Copy>(&self, value: T) -> f64;

    /// The inclusive range of raw coordinates this mapping is valid for
    fn domain(&self) -> (f64, f64);

    fn in_domain<T: Into<f64> + Copy>(&self, value: T) -> bool {
        let (lower, upper) = self.domain();
        let value: f64 = value.into();
        value >= lower && value <= upper
    }

    /// Map a raw coordinate to a physical value, failing if it is outside [`ConvertableDomain::domain`]
    fn convert_checked<T: Into<f64> + Copy>(&self, value: T) -> Result<f64, CalibrationError> {
        if self.in_domain(value) {
            Ok(self.convert(value))
        } else {
            let (lower, upper) = self.domain();
            Err(CalibrationError::OutOfRangeIndex {
                value: value.into(),
                lower,
                upper,
            })
        }
    }

    /// Convert every value in `values`, preserving length and order. Fails on the first
    /// value outside the domain.
    fn convert_all<T: Into<f64> + Copy>(&self, values: &[T]) -> Result<Vec<f64>, CalibrationError> {
        let mut out = Vec::with_capacity(values.len());
        for v in values.iter().copied() {
            out.push(self.convert_checked(v)?);
        }
        Ok(out)
    }

    fn invert_all<T: Into<f64> + Copy>(&self, values: &[T]) -> Vec<f64> {
        values.iter().map(|v| self.invert(*v)).collect()
    }
}

/// Converts time-of-flight channels to m/z. The square root of m/z is linear in the
/// TOF channel across the acquisition range.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tof2MzConverter {
    tof_intercept: f64,
    tof_slope: f64,
    digitizer_samples: u32,
}

impl Tof2MzConverter {
    pub fn new(mz_min: f64, mz_max: f64, digitizer_samples: u32) -> Self {
        let tof_intercept = mz_min.sqrt();
        let tof_slope = if digitizer_samples == 0 {
            0.0
        } else {
            (mz_max.sqrt() - tof_intercept) / digitizer_samples as f64
        };
        Self {
            tof_intercept,
            tof_slope,
            digitizer_samples,
        }
    }

    pub fn digitizer_samples(&self) -> u32 {
        self.digitizer_samples
    }
}

impl ConvertableDomain for Tof2MzConverter {
    fn convert<T: Into<f64> + Copy>(&self, value: T) -> f64 {
        let root = self.tof_intercept + self.tof_slope * value.into();
        root * root
    }

    fn invert<T: Into<f64> + Copy>(&self, value: T) -> f64 {
        if self.tof_slope == 0.0 {
            return 0.0;
        }
        (value.into().sqrt() - self.tof_intercept) / self.tof_slope
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, self.digitizer_samples as f64)
    }
}

/// Converts scan numbers to inverse reduced ion mobility. Scan `0` maps to the upper
/// end of the acquisition range, so the result decreases as the scan number grows.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scan2ImConverter {
    scan_intercept: f64,
    scan_slope: f64,
    num_scans: u32,
}

impl Scan2ImConverter {
    pub fn new(im_min: f64, im_max: f64, num_scans: u32) -> Self {
        let scan_intercept = im_max;
        let scan_slope = if num_scans == 0 {
            0.0
        } else {
            (im_min - scan_intercept) / num_scans as f64
        };
        Self {
            scan_intercept,
            scan_slope,
            num_scans,
        }
    }

    pub fn num_scans(&self) -> u32 {
        self.num_scans
    }
}

impl ConvertableDomain for Scan2ImConverter {
    fn convert<T: Into<f64> + Copy>(&self, value: T) -> f64 {
        self.scan_intercept + self.scan_slope * value.into()
    }

    fn invert<T: Into<f64> + Copy>(&self, value: T) -> f64 {
        if self.scan_slope == 0.0 {
            return 0.0;
        }
        (value.into() - self.scan_intercept) / self.scan_slope
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, self.num_scans as f64)
    }
}

/// Converts 1-based frame numbers to retention time in seconds by linear interpolation
/// between the recorded frame times.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame2RtConverter {
    rt_values: Vec<f64>,
}

impl Frame2RtConverter {
    /// `rt_values[i]` is the retention time of frame `i + 1`
    pub fn from_values(rt_values: Vec<f64>) -> Self {
        Self { rt_values }
    }

    pub fn len(&self) -> usize {
        self.rt_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rt_values.is_empty()
    }
}

impl ConvertableDomain for Frame2RtConverter {
    fn convert<T: Into<f64> + Copy>(&self, value: T) -> f64 {
        let n = self.rt_values.len();
        if n == 0 {
            return 0.0;
        }
        let position = (value.into() - 1.0).clamp(0.0, (n - 1) as f64);
        let lower = position.floor() as usize;
        let upper = position.ceil() as usize;
        let lower_rt = self.rt_values[lower];
        let upper_rt = self.rt_values[upper];
        lower_rt + (upper_rt - lower_rt) * (position - lower as f64)
    }

    fn invert<T: Into<f64> + Copy>(&self, value: T) -> f64 {
        let rt: f64 = value.into();
        let n = self.rt_values.len();
        if n < 2 {
            return 1.0;
        }
        let upper = self.rt_values.partition_point(|v| *v < rt).clamp(1, n - 1);
        let lower = upper - 1;
        let lower_rt = self.rt_values[lower];
        let upper_rt = self.rt_values[upper];
        let fraction = if upper_rt == lower_rt {
            0.0
        } else {
            (rt - lower_rt) / (upper_rt - lower_rt)
        };
        lower as f64 + fraction + 1.0
    }

    fn domain(&self) -> (f64, f64) {
        (1.0, self.rt_values.len() as f64)
    }
}

/// The complete set of converters for one run, loaded when its catalog is opened.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationModel {
    pub mz_converter: Tof2MzConverter,
    pub im_converter: Scan2ImConverter,
    pub rt_converter: Frame2RtConverter,
}

impl CalibrationModel {
    pub fn new(
        mz_converter: Tof2MzConverter,
        im_converter: Scan2ImConverter,
        rt_converter: Frame2RtConverter,
    ) -> Self {
        Self {
            mz_converter,
            im_converter,
            rt_converter,
        }
    }

    /// Convert TOF channels to m/z, element-wise and in input order
    pub fn resolve_mzs<T: Into<f64> + Copy>(
        &self,
        tof_indices: &[T],
    ) -> Result<Vec<f64>, CalibrationError> {
        self.mz_converter.convert_all(tof_indices)
    }

    /// Convert scan numbers to 1/K0, element-wise and in input order
    pub fn resolve_scans<T: Into<f64> + Copy>(
        &self,
        scan_numbers: &[T],
    ) -> Result<Vec<f64>, CalibrationError> {
        self.im_converter.convert_all(scan_numbers)
    }

    /// Convert 1-based frame numbers to retention times in seconds
    pub fn resolve_frames<T: Into<f64> + Copy>(
        &self,
        frame_numbers: &[T],
    ) -> Result<Vec<f64>, CalibrationError> {
        self.rt_converter.convert_all(frame_numbers)
    }

    pub fn invert_mzs(&self, mzs: &[f64]) -> Vec<f64> {
        self.mz_converter.invert_all(mzs)
    }

    pub fn invert_scans(&self, ion_mobilities: &[f64]) -> Vec<f64> {
        self.im_converter.invert_all(ion_mobilities)
    }

    pub fn invert_frames(&self, retention_times: &[f64]) -> Vec<f64> {
        self.rt_converter.invert_all(retention_times)
    }
}
