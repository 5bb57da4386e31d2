use std::ops::Range;

use crate::io::TimsError;
use crate::spectrum::Frame;

use super::catalog::{DiaWindow, MetadataProvider};

/// Map the scan range `[window.scan_begin, window.scan_end)` onto the range of peak
/// positions it covers, using a frame's cumulative `scan_offsets`.
///
/// An empty scan range yields an empty peak range.
///
/// # Errors
/// [`TimsError::CorruptCatalog`] if the window ends before it begins or extends past the
/// frame's last scan.
pub fn scan_range_for_window(
    window: &DiaWindow,
    scan_offsets: &[usize],
) -> Result<Range<usize>, TimsError> {
    scan_range_to_peak_range(window.scan_begin, window.scan_end, scan_offsets)
}

pub(crate) fn scan_range_to_peak_range(
    scan_begin: usize,
    scan_end: usize,
    scan_offsets: &[usize],
) -> Result<Range<usize>, TimsError> {
    if scan_begin > scan_end {
        return Err(TimsError::CorruptCatalog(format!(
            "Scan range {scan_begin}..{scan_end} is reversed"
        )));
    }
    let offset_at = |scan: usize| -> Option<usize> {
        if scan == 0 {
            Some(0)
        } else {
            scan_offsets.get(scan - 1).copied()
        }
    };
    if scan_begin == scan_end {
        let start = offset_at(scan_begin).unwrap_or_default();
        return Ok(start..start);
    }
    match (offset_at(scan_begin), offset_at(scan_end)) {
        (Some(start), Some(end)) => Ok(start..end),
        _ => Err(TimsError::CorruptCatalog(format!(
            "Scan range {scan_begin}..{scan_end} exceeds the frame's {} scans",
            scan_offsets.len()
        ))),
    }
}

/// Resolves the isolation windows a DIA frame was acquired with
#[derive(Debug, Clone, Copy)]
pub struct DiaWindowResolver<'a, M: MetadataProvider> {
    provider: &'a M,
}

impl<'a, M: MetadataProvider> DiaWindowResolver<'a, M> {
    pub fn new(provider: &'a M) -> Self {
        Self { provider }
    }

    /// The window group of `frame_index`, if it is a DIA frame
    pub fn group_for_frame(&self, frame_index: usize) -> Option<u32> {
        self.provider.dia_frame_to_group().get(&frame_index).copied()
    }

    /// The windows of the frame's group, in catalog order. Frames without a window
    /// group have no windows.
    pub fn windows_for_frame(&self, frame_index: usize) -> Result<&'a [DiaWindow], TimsError> {
        let provider: &'a M = self.provider;
        if provider.frame_info(frame_index).is_none() {
            return Err(TimsError::IndexNotFound(frame_index));
        }
        match self.group_for_frame(frame_index) {
            Some(group) => provider
                .dia_group_to_windows()
                .get(&group)
                .map(|w| w.as_slice())
                .ok_or_else(|| {
                    TimsError::CorruptCatalog(format!("Window group {group} has no windows"))
                }),
            None => Ok(&[]),
        }
    }

    /// Pair each window of `frame` with the range of peaks it covers
    pub fn split_frame(&self, frame: &Frame) -> Result<Vec<(DiaWindow, Range<usize>)>, TimsError> {
        self.windows_for_frame(frame.index)?
            .iter()
            .map(|w| Ok((*w, scan_range_for_window(w, &frame.scan_offsets)?)))
            .collect()
    }
}
