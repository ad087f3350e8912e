//! Utility functions and structures.

use crate::{Error, Result};

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

//-----------------------------------------------------------------------------

/// Returns the full file name for a specific test file.
pub fn get_test_data(filename: &'static str) -> PathBuf {
    let mut buf = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    buf.push("test-data");
    buf.push(filename);
    buf
}

//-----------------------------------------------------------------------------

// Utilities for working with files.

const SIZE_UNITS: [(f64, &str); 6] = [
    (1.0, "B"),
    (1024.0, "KiB"),
    (1024.0 * 1024.0, "MiB"),
    (1024.0 * 1024.0 * 1024.0, "GiB"),
    (1024.0 * 1024.0 * 1024.0 * 1024.0, "TiB"),
    (1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0, "PiB"),
];

/// Returns a human-readable representation of the given number of bytes.
pub fn human_readable_size(bytes: usize) -> String {
    let mut unit = 0;
    let value = bytes as f64;
    while unit + 1 < SIZE_UNITS.len() && value >= SIZE_UNITS[unit + 1].0 {
        unit += 1;
    }
    format!("{:.3} {}", value / SIZE_UNITS[unit].0, SIZE_UNITS[unit].1)
}

/// Returns a human-readable size of the file.
pub fn file_size<P: AsRef<Path>>(filename: P) -> Option<String> {
    let metadata = fs::metadata(filename).ok()?;
    Some(human_readable_size(metadata.len() as usize))
}

/// Returns `true` if the file exists.
pub fn file_exists<P: AsRef<Path>>(filename: P) -> bool {
    fs::metadata(filename).is_ok()
}

/// Returns `true` if the file appears to be gzip-compressed.
pub fn is_gzipped<P: AsRef<Path>>(filename: P) -> bool {
    let file = match File::open(filename) {
        Ok(file) => file,
        Err(_) => return false,
    };
    let mut reader = BufReader::new(file);
    let mut magic = [0; 2];
    let len = reader.read(&mut magic).ok();
    len == Some(2) && magic == [0x1F, 0x8B]
}

/// Returns a buffered reader for the file, which may be gzip-compressed.
pub fn open_file<P: AsRef<Path>>(filename: P) -> Result<Box<dyn BufRead>> {
    let file = File::open(&filename).map_err(|x| {
        Error::not_found(format!("Cannot open {}: {}", filename.as_ref().display(), x))
    })?;
    let inner = BufReader::new(file);
    if is_gzipped(&filename) {
        let inner = MultiGzDecoder::new(inner);
        Ok(Box::new(BufReader::new(inner)))
    } else {
        Ok(Box::new(inner))
    }
}

/// Returns a buffered writer for the file.
///
/// The output is gzip-compressed if the file name ends with `.gz`.
pub fn create_file<P: AsRef<Path>>(filename: P) -> Result<Box<dyn Write>> {
    let file = File::create(&filename)?;
    let inner = BufWriter::new(file);
    let compressed = filename.as_ref().extension().map_or(false, |x| x == "gz");
    if compressed {
        Ok(Box::new(GzEncoder::new(inner, Compression::default())))
    } else {
        Ok(Box::new(inner))
    }
}

//-----------------------------------------------------------------------------

// Compact encoding for sorted interval lists.

fn append_varint(buffer: &mut Vec<u8>, mut value: usize) {
    while value >= 0x80 {
        buffer.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    buffer.push(value as u8);
}

fn read_varint(encoded: &[u8], offset: &mut usize) -> Option<usize> {
    let mut value: usize = 0;
    let mut shift = 0;
    loop {
        let byte = *encoded.get(*offset)?;
        *offset += 1;
        if shift >= usize::BITS {
            return None;
        }
        value |= ((byte & 0x7F) as usize) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
    }
}

/// Encodes a sorted list of disjoint intervals into a byte array.
///
/// Each interval is stored as the gap from the end of the previous interval and the length, both as varints.
/// See [`decode_intervals`] for decoding.
pub fn encode_intervals(intervals: &[Range<usize>]) -> Vec<u8> {
    let mut result: Vec<u8> = Vec::with_capacity(2 * intervals.len());
    let mut prev_end = 0;
    for interval in intervals {
        append_varint(&mut result, interval.start - prev_end);
        append_varint(&mut result, interval.len());
        prev_end = interval.end;
    }
    result
}

/// Decodes an interval list encoded with [`encode_intervals`].
///
/// Returns an error if the encoding is truncated.
pub fn decode_intervals(encoded: &[u8]) -> Result<Vec<Range<usize>>> {
    let mut result = Vec::new();
    let mut offset = 0;
    let mut prev_end = 0;
    while offset < encoded.len() {
        let gap = read_varint(encoded, &mut offset);
        let len = read_varint(encoded, &mut offset);
        let (gap, len) = gap.zip(len).ok_or(
            Error::consistency("Truncated interval encoding")
        )?;
        let start = prev_end + gap;
        result.push(start..start + len);
        prev_end = start + len;
    }
    Ok(result)
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
