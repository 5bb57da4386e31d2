//! Decoding of the compressed frame records stored in `analysis.tdf_bin`.
//!
//! Each record starts with an 8 byte header, the total record size and the number of
//! scans, both little-endian `u32`. The remainder is a zstd stream which decompresses
//! into an array of `u32` values whose bytes have been shuffled, so that the first
//! quarter of the buffer holds the lowest byte of every value, the second quarter the
//! next byte and so on.
//!
//! The array itself holds `scan_count` header entries (the scan count followed by twice
//! the peak count of every scan except the last) and then one `(tof delta, intensity)`
//! pair per peak. TOF indices are delta-encoded per scan, offset by one.
use std::{fs, io, path::Path};

use thiserror::Error;

use super::super::utils::read_exact_at;

pub const RECORD_HEADER_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Truncated frame: expected {expected} bytes but only {available} are available")]
    TruncatedFrame { expected: usize, available: usize },
    #[error("Encountered an IO error: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl FrameDecodeError {
    fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedFrame(message.into())
    }
}

/// The raw arrays of one frame, before calibration
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub scan_offsets: Vec<usize>,
    pub tof_indices: Vec<u32>,
    pub intensities: Vec<u32>,
}

impl DecodedFrame {
    fn empty(scan_count: usize) -> Self {
        Self {
            scan_offsets: vec![0; scan_count],
            ..Default::default()
        }
    }
}

/// A decompressed, still byte-shuffled `u32` array
#[derive(Debug, Default, Clone)]
pub struct TdfBlob {
    bytes: Vec<u8>,
}

impl TdfBlob {
    pub fn new(bytes: Vec<u8>) -> Result<Self, FrameDecodeError> {
        if bytes.len() % 4 != 0 {
            return Err(FrameDecodeError::malformed(format!(
                "decompressed length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<u32> {
        let n = self.len();
        if index >= n {
            return None;
        }
        Some(u32::from_le_bytes([
            self.bytes[index],
            self.bytes[n + index],
            self.bytes[2 * n + index],
            self.bytes[3 * n + index],
        ]))
    }
}

/// Read the `(byte_count, scan_count)` header of a frame record
pub fn read_record_header(record: &[u8]) -> Result<(usize, usize), FrameDecodeError> {
    if record.len() < RECORD_HEADER_SIZE {
        return Err(FrameDecodeError::TruncatedFrame {
            expected: RECORD_HEADER_SIZE,
            available: record.len(),
        });
    }
    let byte_count = u32::from_le_bytes([record[0], record[1], record[2], record[3]]) as usize;
    let scan_count = u32::from_le_bytes([record[4], record[5], record[6], record[7]]) as usize;
    Ok((byte_count, scan_count))
}

/// Decode one frame record into its raw arrays.
///
/// `record` holds the full record including its header, and `scan_count` is the number
/// of scans the catalog declares for the frame. The returned `scan_offsets` has exactly
/// `scan_count` entries, entry `i` being the number of peaks in scans `0..=i`.
pub fn decode_frame_blob(record: &[u8], scan_count: usize) -> Result<DecodedFrame, FrameDecodeError> {
    let (byte_count, _) = read_record_header(record)?;
    if byte_count < RECORD_HEADER_SIZE {
        return Err(FrameDecodeError::malformed(format!(
            "record size {byte_count} is smaller than its header"
        )));
    }
    if record.len() < byte_count {
        return Err(FrameDecodeError::TruncatedFrame {
            expected: byte_count,
            available: record.len(),
        });
    }
    let payload = &record[RECORD_HEADER_SIZE..byte_count];
    if payload.is_empty() {
        return Ok(DecodedFrame::empty(scan_count));
    }

    let bytes = zstd::decode_all(payload)
        .map_err(|e| FrameDecodeError::malformed(format!("zstd decompression failed: {e}")))?;
    let blob = TdfBlob::new(bytes)?;
    decode_blob(&blob, scan_count)
}

fn decode_blob(blob: &TdfBlob, scan_count: usize) -> Result<DecodedFrame, FrameDecodeError> {
    if blob.is_empty() {
        return Ok(DecodedFrame::empty(scan_count));
    }
    if scan_count == 0 {
        return Err(FrameDecodeError::malformed(
            "frame declares no scans but carries peak data",
        ));
    }
    let n = blob.len();
    if n < scan_count {
        return Err(FrameDecodeError::malformed(format!(
            "{n} values cannot hold the headers of {scan_count} scans"
        )));
    }
    let stored_scan_count = blob.get(0).unwrap_or_default() as usize;
    if stored_scan_count != scan_count {
        return Err(FrameDecodeError::malformed(format!(
            "frame stores {stored_scan_count} scans but {scan_count} were declared"
        )));
    }
    if (n - scan_count) % 2 != 0 {
        return Err(FrameDecodeError::malformed(format!(
            "{} values after the scan headers do not form (tof, intensity) pairs",
            n - scan_count
        )));
    }
    let peak_count = (n - scan_count) / 2;

    let mut scan_offsets = Vec::with_capacity(scan_count);
    let mut total = 0usize;
    for scan in 0..scan_count - 1 {
        let doubled = blob.get(scan + 1).unwrap_or_default() as usize;
        if doubled % 2 != 0 {
            return Err(FrameDecodeError::malformed(format!(
                "scan {scan} has an odd size entry {doubled}"
            )));
        }
        total += doubled / 2;
        if total > peak_count {
            return Err(FrameDecodeError::malformed(format!(
                "scan sizes sum to {total} but the frame holds {peak_count} peaks"
            )));
        }
        scan_offsets.push(total);
    }
    scan_offsets.push(peak_count);

    let mut tof_indices = Vec::with_capacity(peak_count);
    let mut intensities = Vec::with_capacity(peak_count);
    let mut start = 0usize;
    for (scan, end) in scan_offsets.iter().copied().enumerate() {
        let mut current_sum = 0u32;
        for peak in start..end {
            let delta = blob.get(scan_count + 2 * peak).unwrap_or_default();
            current_sum = current_sum.checked_add(delta).ok_or_else(|| {
                FrameDecodeError::malformed(format!("TOF index overflow in scan {scan}"))
            })?;
            let tof = current_sum.checked_sub(1).ok_or_else(|| {
                FrameDecodeError::malformed(format!("zero TOF delta opens scan {scan}"))
            })?;
            tof_indices.push(tof);
            intensities.push(blob.get(scan_count + 1 + 2 * peak).unwrap_or_default());
        }
        start = end;
    }

    Ok(DecodedFrame {
        scan_offsets,
        tof_indices,
        intensities,
    })
}

fn invalid_input(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn to_u32(value: usize, what: &str) -> io::Result<u32> {
    u32::try_from(value).map_err(|_| invalid_input(format!("{what} {value} does not fit a record")))
}

/// Encode per-scan `(tof index, intensity)` peaks as a frame record, the inverse of
/// [`decode_frame_blob`].
///
/// # Errors
/// [`io::ErrorKind::InvalidInput`] if TOF indices decrease within a scan, the first TOF
/// index of a scan is `u32::MAX`, or a count does not fit in 32 bits.
pub fn encode_frame_record(scans: &[Vec<(u32, u32)>]) -> io::Result<Vec<u8>> {
    let scan_count = scans.len();
    let peak_count: usize = scans.iter().map(|s| s.len()).sum();
    let mut values: Vec<u32> = Vec::with_capacity(scan_count + 2 * peak_count);
    if scan_count > 0 {
        values.push(to_u32(scan_count, "Scan count")?);
        for scan in &scans[..scan_count - 1] {
            let words = scan
                .len()
                .checked_mul(2)
                .ok_or_else(|| invalid_input("Scan is too long".to_string()))?;
            values.push(to_u32(words, "Scan length")?);
        }
    }
    for (scan_index, scan) in scans.iter().enumerate() {
        let mut previous = 0u32;
        for (i, (tof, intensity)) in scan.iter().copied().enumerate() {
            let delta = if i == 0 {
                tof.checked_add(1).ok_or_else(|| {
                    invalid_input(format!("TOF index {tof} in scan {scan_index} overflows"))
                })?
            } else {
                tof.checked_sub(previous).ok_or_else(|| {
                    invalid_input(format!(
                        "TOF index {tof} in scan {scan_index} is below the preceding {previous}"
                    ))
                })?
            };
            previous = tof;
            values.push(delta);
            values.push(intensity);
        }
    }

    let n = values.len();
    let mut shuffled = vec![0u8; n * 4];
    for (i, v) in values.iter().enumerate() {
        for (j, b) in v.to_le_bytes().into_iter().enumerate() {
            shuffled[j * n + i] = b;
        }
    }
    let compressed = if shuffled.is_empty() {
        Vec::new()
    } else {
        zstd::encode_all(shuffled.as_slice(), 0)?
    };

    let byte_count = to_u32(RECORD_HEADER_SIZE + compressed.len(), "Record length")?;
    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + compressed.len());
    record.extend_from_slice(&byte_count.to_le_bytes());
    record.extend_from_slice(&to_u32(scan_count, "Scan count")?.to_le_bytes());
    record.extend_from_slice(&compressed);
    Ok(record)
}

/// Positional access to the frame records in `analysis.tdf_bin`. Reads never move a
/// shared cursor so one handle serves concurrent readers.
#[derive(Debug)]
pub struct TdfBinReader {
    handle: fs::File,
    file_length: u64,
}

impl TdfBinReader {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let handle = fs::File::open(path)?;
        let file_length = handle.metadata()?.len();
        Ok(Self {
            handle,
            file_length,
        })
    }

    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    /// Read the record at `offset`, which may span at most `byte_length` bytes
    pub fn read_record(&self, offset: u64, byte_length: u64) -> Result<Vec<u8>, FrameDecodeError> {
        let available = byte_length.min(self.file_length.saturating_sub(offset)) as usize;
        if available < RECORD_HEADER_SIZE {
            return Err(FrameDecodeError::TruncatedFrame {
                expected: RECORD_HEADER_SIZE,
                available,
            });
        }
        let mut header = [0u8; RECORD_HEADER_SIZE];
        read_exact_at(&self.handle, &mut header, offset)?;
        let (byte_count, _) = read_record_header(&header)?;
        if byte_count < RECORD_HEADER_SIZE {
            return Err(FrameDecodeError::malformed(format!(
                "record size {byte_count} is smaller than its header"
            )));
        }
        if byte_count > available {
            return Err(FrameDecodeError::TruncatedFrame {
                expected: byte_count,
                available,
            });
        }
        let mut record = vec![0u8; byte_count];
        record[..RECORD_HEADER_SIZE].copy_from_slice(&header);
        read_exact_at(
            &self.handle,
            &mut record[RECORD_HEADER_SIZE..],
            offset + RECORD_HEADER_SIZE as u64,
        )?;
        Ok(record)
    }
}
