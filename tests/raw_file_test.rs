//! Raw-file decoding against files written in the MY302 layout.

use detcon::io::{
    read_my302_file, write_my302_file, FrameHeader, RawFrame, HEADER_VERSION, MY302_NPIXELS,
};
use detcon::DetError;

fn frame(frame_number: u64) -> RawFrame {
    let header = FrameHeader {
        frame_number,
        exp_length: 100,
        packet_number: 128,
        bunch_id: 0,
        timestamp: 1_563_862_000 + frame_number,
        mod_id: 7,
        row: 0,
        column: 0,
        reserved: 0,
        debug: 0,
        round_r_number: 0,
        det_type: 5,
        version: HEADER_VERSION,
    };
    // Ramp keyed to the frame number, so frames are distinguishable.
    let data = (0..MY302_NPIXELS)
        .map(|i| ((i as u64 + frame_number) % 4096) as u16)
        .collect();
    RawFrame { header, data }
}

#[test]
fn decodes_what_was_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan_d0_f0_0.my302");
    let written = vec![frame(1), frame(2), frame(3)];

    write_my302_file(&path, &written).unwrap();
    let read = read_my302_file(&path).unwrap();

    assert_eq!(read.len(), 3);
    assert_eq!(read, written);
    assert_eq!(read[2].header.frame_number, 3);
}

#[test]
fn truncated_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("torn.my302");
    write_my302_file(&path, &[frame(1)]).unwrap();

    // Chop the last pixel off.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&path, bytes).unwrap();

    let err = read_my302_file(&path).unwrap_err();
    assert!(matches!(err, DetError::BadFileFormat(_)), "{err:?}");
}

#[test]
fn unknown_header_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.my302");
    let mut futuristic = frame(9);
    futuristic.header.version = HEADER_VERSION + 1;
    write_my302_file(&path, &[futuristic]).unwrap();

    let err = read_my302_file(&path).unwrap_err();
    match err {
        DetError::BadFileFormat(msg) => assert!(msg.contains("version")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn wrong_pixel_count_fails_the_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.my302");
    let mut short = frame(1);
    short.data.truncate(10);

    assert!(write_my302_file(&path, &[short]).is_err());
    assert!(!path.exists());
}

#[test]
fn missing_file_reports_io_error() {
    let err = read_my302_file("/nonexistent/run.my302").unwrap_err();
    assert!(matches!(err, DetError::Io(_)));
}
