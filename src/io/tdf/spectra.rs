//! Assembly of MS2 spectra from the frames of a PASEF run.
//!
//! A DDA-PASEF run yields one spectrum per precursor, built from the scan ranges of every
//! PASEF event that fragmented it. A DIA-PASEF run yields one spectrum per DIA frame and
//! isolation window.
use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::Arc,
};

use identity_hash::BuildIdentityHasher;
use rayon::prelude::*;

use crate::io::{BatchPolicy, TimsError};
use crate::spectrum::{AcquisitionType, Frame, Precursor, Spectrum};

use super::catalog::{DiaWindow, MetadataProvider, PasefWindow, PrecursorRecord, TDFCatalog};
use super::dia::{scan_range_to_peak_range, DiaWindowResolver};
use super::reader::FrameReader;

type FrameMap = HashMap<usize, Frame, BuildIdentityHasher<usize>>;
type FrameSet = HashSet<usize, BuildIdentityHasher<usize>>;

/// Where the peaks of one spectrum come from
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumSource {
    /// A DDA precursor and the PASEF events that fragmented it, in catalog order
    Precursor {
        precursor: PrecursorRecord,
        events: Vec<PasefWindow>,
    },
    /// One isolation window of a DIA frame
    DiaWindow { frame: usize, window: DiaWindow },
}

impl SpectrumSource {
    /// The frames that must be decoded to build this spectrum, ascending and unique
    pub fn frame_indices(&self) -> Vec<usize> {
        match self {
            Self::Precursor { events, .. } => {
                let mut frames: Vec<usize> = events.iter().map(|e| e.frame).collect();
                frames.sort_unstable();
                frames.dedup();
                frames
            }
            Self::DiaWindow { frame, .. } => vec![*frame],
        }
    }
}

fn plan_dda(catalog: &TDFCatalog) -> Vec<SpectrumSource> {
    let mut events: HashMap<usize, Vec<PasefWindow>> = HashMap::new();
    for event in catalog.pasef_windows() {
        events.entry(event.precursor).or_default().push(*event);
    }
    catalog
        .precursors()
        .iter()
        .filter_map(|precursor| match events.remove(&precursor.id) {
            Some(events) => Some(SpectrumSource::Precursor {
                precursor: *precursor,
                events,
            }),
            None => {
                log::warn!("Precursor {} was never fragmented", precursor.id);
                None
            }
        })
        .collect()
}

fn plan_dia(catalog: &TDFCatalog) -> Result<Vec<SpectrumSource>, TimsError> {
    let resolver = DiaWindowResolver::new(catalog);
    let mut sources = Vec::new();
    for info in catalog.frames().iter().filter(|info| info.is_dia()) {
        for window in resolver.windows_for_frame(info.index)? {
            sources.push(SpectrumSource::DiaWindow {
                frame: info.index,
                window: *window,
            });
        }
    }
    Ok(sources)
}

/// Reads the MS2 spectra of a DDA-PASEF or DIA-PASEF run.
///
/// m/z values are calibrated, intensities are the raw detector counts and peaks stay in
/// frame storage order. Runs of any other acquisition type contain no spectra.
#[derive(Debug)]
pub struct TDFSpectrumReader {
    frame_reader: FrameReader,
    catalog: Arc<TDFCatalog>,
    sources: Vec<SpectrumSource>,
}

impl TDFSpectrumReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, TimsError> {
        Self::from_frame_reader(FrameReader::new(path)?)
    }

    /// Build the spectrum plan for an already opened [`FrameReader`], sharing its
    /// configuration
    pub fn from_frame_reader(frame_reader: FrameReader) -> Result<Self, TimsError> {
        let catalog = frame_reader.catalog()?;
        let sources = match catalog.acquisition_type() {
            AcquisitionType::DDAPASEF => plan_dda(&catalog),
            tp if tp.is_dia() => plan_dia(&catalog)?,
            tp => {
                log::warn!("Spectra cannot be assembled for acquisition type {tp}");
                Vec::new()
            }
        };
        log::debug!("Planned {} spectra", sources.len());
        Ok(Self {
            frame_reader,
            catalog,
            sources,
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn sources(&self) -> &[SpectrumSource] {
        &self.sources
    }

    pub fn frame_reader(&self) -> &FrameReader {
        &self.frame_reader
    }

    pub fn acquisition_type(&self) -> AcquisitionType {
        self.catalog.acquisition_type()
    }

    /// Decode the frames at `indices`, failing with the first decoding error
    fn read_frame_map(&self, indices: &[usize]) -> Result<FrameMap, TimsError> {
        self.frame_reader
            .read_frames_partial(indices)
            .into_iter()
            .map(|frame| frame.map(|f| (f.index, f)))
            .collect()
    }

    /// Decode the frames at `indices`, returning the frames that decoded and the indices
    /// of those that did not
    fn read_frame_map_partial(&self, indices: &[usize]) -> (FrameMap, FrameSet) {
        let mut frames = FrameMap::default();
        let mut failed = FrameSet::default();
        for (index, frame) in indices
            .iter()
            .zip(self.frame_reader.read_frames_partial(indices))
        {
            match frame {
                Ok(frame) => {
                    frames.insert(*index, frame);
                }
                Err(_) => {
                    failed.insert(*index);
                }
            }
        }
        (frames, failed)
    }

    fn frame_from<'a>(frames: &'a FrameMap, index: usize) -> Result<&'a Frame, TimsError> {
        frames.get(&index).ok_or(TimsError::IndexNotFound(index))
    }

    fn extend_peaks(
        &self,
        spectrum: &mut Spectrum,
        frame: &Frame,
        scan_begin: usize,
        scan_end: usize,
    ) -> Result<(), TimsError> {
        let range = scan_range_to_peak_range(scan_begin, scan_end, &frame.scan_offsets)?;
        let mzs = self
            .catalog
            .calibration_model()
            .resolve_mzs(&frame.tof_indices[range.clone()])?;
        spectrum.mz_values.extend(mzs);
        spectrum
            .intensities
            .extend(frame.intensities[range].iter().map(|i| *i as f64));
        Ok(())
    }

    fn assemble(
        &self,
        index: usize,
        source: &SpectrumSource,
        frames: &FrameMap,
    ) -> Result<Spectrum, TimsError> {
        match source {
            SpectrumSource::Precursor { precursor, events } => {
                let parent = self
                    .catalog
                    .frame_info(precursor.parent)
                    .ok_or(TimsError::IndexNotFound(precursor.parent))?;
                let first = events.first().copied().unwrap_or_default();
                let mut spectrum = Spectrum {
                    index,
                    precursor: Some(Precursor {
                        mz: precursor.mz(),
                        rt: parent.rt,
                        im: self.catalog.ion_mobility_at(precursor.scan_number),
                        charge: precursor.charge,
                        intensity: precursor.intensity.unwrap_or_default(),
                        index: precursor.id,
                        frame_index: precursor.parent,
                    }),
                    collision_energy: first.collision_energy,
                    isolation_mz: first.isolation_mz,
                    isolation_width: first.isolation_width,
                    ..Default::default()
                };
                for event in events {
                    let frame = Self::frame_from(frames, event.frame)?;
                    self.extend_peaks(&mut spectrum, frame, event.scan_begin, event.scan_end)?;
                }
                Ok(spectrum)
            }
            SpectrumSource::DiaWindow { frame, window } => {
                let frame = Self::frame_from(frames, *frame)?;
                let scan_midpoint = (window.scan_begin + window.scan_end) as f64 / 2.0;
                let mut spectrum = Spectrum {
                    index,
                    precursor: Some(Precursor {
                        mz: window.isolation_mz,
                        rt: frame.rt,
                        im: self.catalog.ion_mobility_at(scan_midpoint),
                        charge: None,
                        intensity: 0.0,
                        index: window.window_group as usize,
                        frame_index: frame.index,
                    }),
                    collision_energy: window.collision_energy,
                    isolation_mz: window.isolation_mz,
                    isolation_width: window.isolation_width,
                    ..Default::default()
                };
                self.extend_peaks(&mut spectrum, frame, window.scan_begin, window.scan_end)?;
                Ok(spectrum)
            }
        }
    }

    /// Build the `index`-th spectrum, decoding only the frames it needs.
    ///
    /// A frame that fails to decode fails the spectrum with that frame's error, whatever
    /// the batch policy.
    pub fn get_spectrum(&self, index: usize) -> Result<Spectrum, TimsError> {
        let source = self
            .sources
            .get(index)
            .ok_or(TimsError::IndexNotFound(index))?;
        let frames = self.read_frame_map(&source.frame_indices())?;
        self.assemble(index, source, &frames)
    }

    /// Build every spectrum, decoding each needed frame once.
    ///
    /// Under [`BatchPolicy::FailFast`] the first frame that fails to decode fails the
    /// whole call with its error. Under [`BatchPolicy::CollectPartial`] every spectrum
    /// that needs a failed frame is logged and left out. The rest keep the `index` of
    /// their position in [`TDFSpectrumReader::sources`].
    pub fn read_all_spectra(&self) -> Result<Vec<Spectrum>, TimsError> {
        let mut needed: Vec<usize> = self
            .sources
            .iter()
            .flat_map(|s| s.frame_indices())
            .collect();
        needed.sort_unstable();
        needed.dedup();
        let (frames, failed) = match self.frame_reader.batch_policy() {
            BatchPolicy::FailFast => (self.read_frame_map(&needed)?, FrameSet::default()),
            BatchPolicy::CollectPartial => self.read_frame_map_partial(&needed),
        };
        self.sources
            .par_iter()
            .enumerate()
            .filter(|(i, source)| {
                let missing: Vec<usize> = source
                    .frame_indices()
                    .into_iter()
                    .filter(|f| failed.contains(f))
                    .collect();
                if !missing.is_empty() {
                    log::warn!("Skipping spectrum {i}, frames {missing:?} failed to decode");
                }
                missing.is_empty()
            })
            .map(|(i, source)| self.assemble(i, source, &frames))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Spectrum, TimsError>> + '_ {
        (0..self.len()).map(|i| self.get_spectrum(i))
    }
}
