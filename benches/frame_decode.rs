use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mztims::calibration::{CalibrationModel, Frame2RtConverter, Scan2ImConverter, Tof2MzConverter};
use mztims::io::tdf::{decode_frame_blob, encode_frame_record};

const NUM_SCANS: usize = 927;

fn synthetic_scans() -> Vec<Vec<(u32, u32)>> {
    (0..NUM_SCANS)
        .map(|s| {
            (0..(s % 40))
                .map(|p| ((s * 97 + p * 1031) as u32 % 400_000, (p * 13 + 1) as u32))
                .collect()
        })
        .collect()
}

fn decode(record: &[u8]) -> usize {
    let frame = decode_frame_blob(record, NUM_SCANS).unwrap();
    frame.tof_indices.len()
}

fn frame_decoding(c: &mut Criterion) {
    let scans = synthetic_scans();
    let record = encode_frame_record(&scans).unwrap();
    let expected: usize = scans.iter().map(|s| s.len()).sum();
    assert_eq!(decode(&record), expected);

    c.bench_function("decode_frame_blob", |b| {
        b.iter(|| decode(black_box(&record)))
    });

    let frame = decode_frame_blob(&record, NUM_SCANS).unwrap();
    let model = CalibrationModel::new(
        Tof2MzConverter::new(100.0, 1700.0, 400_000),
        Scan2ImConverter::new(0.6, 1.6, NUM_SCANS as u32),
        Frame2RtConverter::from_values(vec![0.1]),
    );
    c.bench_function("resolve_mzs", |b| {
        b.iter(|| model.resolve_mzs(black_box(&frame.tof_indices)).unwrap().len())
    });
}

criterion_group!(benches, frame_decoding);
criterion_main!(benches);
