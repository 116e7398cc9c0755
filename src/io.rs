//! Vendor raw-file access.
//!
//! Raw acquisition files are a plain concatenation of fixed-size records,
//! one per frame: a 48-byte frame header followed by the pixel payload as
//! little-endian u16. [`read_my302_file`] decodes the files written for the
//! MY302 test chip (64x64 pixels); [`write_my302_file`] produces them.
//!
//! Files are memory-mapped for reading, so multi-gigabyte runs decode
//! without buffering the whole file.

use memmap2::Mmap;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{DetError, DetResult};

/// Size of one frame header on disk.
pub const FRAME_HEADER_SIZE: usize = 48;

/// Frame-header layout version this crate reads and writes.
pub const HEADER_VERSION: u8 = 1;

/// Pixels per MY302 frame (64x64 matrix).
pub const MY302_NPIXELS: usize = 64 * 64;

const RECORD_SIZE: usize = FRAME_HEADER_SIZE + MY302_NPIXELS * 2;

fn parse_u16(stream: &[u8], pos: &mut usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&stream[*pos..*pos + 2]);
    *pos += 2;
    u16::from_le_bytes(bytes)
}

fn parse_u32(stream: &[u8], pos: &mut usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&stream[*pos..*pos + 4]);
    *pos += 4;
    u32::from_le_bytes(bytes)
}

fn parse_u64(stream: &[u8], pos: &mut usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&stream[*pos..*pos + 8]);
    *pos += 8;
    u64::from_le_bytes(bytes)
}

fn parse_u8(stream: &[u8], pos: &mut usize) -> u8 {
    let byte = stream[*pos];
    *pos += 1;
    byte
}

/// On-disk frame header.
///
/// Field order matches the wire layout; all integers little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub frame_number: u64,
    /// Exposure length in units of 100 ns.
    pub exp_length: u32,
    pub packet_number: u32,
    pub bunch_id: u64,
    pub timestamp: u64,
    pub mod_id: u16,
    pub row: u16,
    pub column: u16,
    pub reserved: u16,
    pub debug: u32,
    pub round_r_number: u16,
    pub det_type: u8,
    pub version: u8,
}

impl FrameHeader {
    /// Decode from a buffer of at least [`FRAME_HEADER_SIZE`] bytes.
    pub(crate) fn from_bytes(stream: &[u8]) -> Self {
        let mut pos = 0;
        Self {
            frame_number: parse_u64(stream, &mut pos),
            exp_length: parse_u32(stream, &mut pos),
            packet_number: parse_u32(stream, &mut pos),
            bunch_id: parse_u64(stream, &mut pos),
            timestamp: parse_u64(stream, &mut pos),
            mod_id: parse_u16(stream, &mut pos),
            row: parse_u16(stream, &mut pos),
            column: parse_u16(stream, &mut pos),
            reserved: parse_u16(stream, &mut pos),
            debug: parse_u32(stream, &mut pos),
            round_r_number: parse_u16(stream, &mut pos),
            det_type: parse_u8(stream, &mut pos),
            version: parse_u8(stream, &mut pos),
        }
    }

    /// Encode to the on-disk layout.
    pub(crate) fn to_bytes(self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        let mut pos = 0;
        let mut put = |bytes: &[u8]| {
            buf[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };
        put(&self.frame_number.to_le_bytes());
        put(&self.exp_length.to_le_bytes());
        put(&self.packet_number.to_le_bytes());
        put(&self.bunch_id.to_le_bytes());
        put(&self.timestamp.to_le_bytes());
        put(&self.mod_id.to_le_bytes());
        put(&self.row.to_le_bytes());
        put(&self.column.to_le_bytes());
        put(&self.reserved.to_le_bytes());
        put(&self.debug.to_le_bytes());
        put(&self.round_r_number.to_le_bytes());
        put(&[self.det_type]);
        put(&[self.version]);
        buf
    }
}

/// One decoded frame: header plus pixel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: FrameHeader,
    pub data: Vec<u16>,
}

/// Decode an MY302 raw file into its frames.
///
/// Fails on truncated files and on records carrying an unknown header
/// version. An empty file decodes to no frames.
pub fn read_my302_file(path: impl AsRef<Path>) -> DetResult<Vec<RawFrame>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        // Zero-length files cannot be mapped; they simply hold no frames.
        return Ok(Vec::new());
    }
    // Safety: the mapping is read-only and dropped before this call returns
    // the decoded frames; concurrent writers would corrupt any file format.
    let mmap = unsafe { Mmap::map(&file)? };
    let stream: &[u8] = &mmap;

    if stream.len() % RECORD_SIZE != 0 {
        return Err(DetError::BadFileFormat(format!(
            "{} is truncated: {} bytes is not a multiple of the {RECORD_SIZE}-byte record",
            path.display(),
            stream.len()
        )));
    }

    let mut frames = Vec::with_capacity(stream.len() / RECORD_SIZE);
    for record in stream.chunks_exact(RECORD_SIZE) {
        let header = FrameHeader::from_bytes(record);
        if header.version != HEADER_VERSION {
            return Err(DetError::BadFileFormat(format!(
                "frame {} has header version {} (expected {HEADER_VERSION})",
                header.frame_number, header.version
            )));
        }
        let mut pos = FRAME_HEADER_SIZE;
        let data = (0..MY302_NPIXELS)
            .map(|_| parse_u16(record, &mut pos))
            .collect();
        frames.push(RawFrame { header, data });
    }
    Ok(frames)
}

/// Write frames in the MY302 raw layout.
///
/// Every frame must carry exactly [`MY302_NPIXELS`] pixels.
pub fn write_my302_file(path: impl AsRef<Path>, frames: &[RawFrame]) -> DetResult<()> {
    for frame in frames {
        if frame.data.len() != MY302_NPIXELS {
            return Err(DetError::BadFileFormat(format!(
                "frame {} has {} pixels (expected {MY302_NPIXELS})",
                frame.header.frame_number,
                frame.data.len()
            )));
        }
    }
    let mut file = std::io::BufWriter::new(File::create(path)?);
    for frame in frames {
        file.write_all(&frame.header.to_bytes())?;
        for pixel in &frame.data {
            file.write_all(&pixel.to_le_bytes())?;
        }
    }
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(frame_number: u64) -> FrameHeader {
        FrameHeader {
            frame_number,
            exp_length: 100,
            packet_number: 128,
            bunch_id: 0,
            timestamp: 1_563_862_000,
            mod_id: 7,
            row: 0,
            column: 0,
            reserved: 0,
            debug: 0,
            round_r_number: 0,
            det_type: 5,
            version: HEADER_VERSION,
        }
    }

    #[test]
    fn header_encoding_roundtrips() {
        let header = sample_header(42);
        let decoded = FrameHeader::from_bytes(&header.to_bytes());
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_layout_is_48_bytes_little_endian() {
        let bytes = sample_header(0x0102_0304_0506_0708).to_bytes();
        assert_eq!(bytes.len(), FRAME_HEADER_SIZE);
        // frame_number leads the record, least significant byte first.
        assert_eq!(bytes[0], 0x08);
        assert_eq!(bytes[7], 0x01);
        // version is the final byte.
        assert_eq!(bytes[47], HEADER_VERSION);
    }
}
