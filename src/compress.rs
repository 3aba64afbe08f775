//! DEFLATE adapter (zlib and gzip wrapped) over `flate2`.
//!
//! All functions map codec failures into the pack error taxonomy. Output
//! capacities are checked against a conservative bound before encoding, so a
//! caller sizing buffers with [`compressed_bound`] never sees `NoSpace`.

use crate::error::{PackError, Result};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::io::{self, Read, Write};
use tracing::trace;

/// Lowest codec level (stored blocks)
pub const MIN_LEVEL: u32 = 0;

/// Highest codec level
pub const MAX_LEVEL: u32 = 9;

/// Level used when no explicit level is configured
pub const DEFAULT_LEVEL: i32 = 6;

/// Slack added to every bound for stream headers and block overhead
const BOUND_SLACK: usize = 64;

/// Gzip member header (10 bytes) plus trailer (8 bytes)
const GZIP_FRAMING: usize = 18;

/// Clamp an arbitrary level hint into the codec's valid range.
pub fn clamp_level(level: i32) -> u32 {
    level.clamp(MIN_LEVEL as i32, MAX_LEVEL as i32) as u32
}

/// Conservative upper bound for the zlib-compressed size of `input_len` bytes.
///
/// Deliberately generous; it is not the exact worst case.
pub fn compressed_bound(input_len: usize) -> usize {
    input_len
        .saturating_add(input_len / 10)
        .saturating_add(BOUND_SLACK)
}

/// Conservative upper bound for a gzip member holding `input_len` bytes.
pub fn gzip_bound(input_len: usize) -> usize {
    compressed_bound(input_len).saturating_add(GZIP_FRAMING)
}

/// Compress `input` into a new zlib stream.
pub fn compress(input: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(compressed_bound(input.len())),
        Compression::new(clamp_level(level)),
    );
    encoder
        .write_all(input)
        .map_err(|e| PackError::Compress(format!("zlib encode failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PackError::Compress(format!("zlib encode failed: {}", e)))?;

    trace!(input = input.len(), output = compressed.len(), "zlib compressed");
    Ok(compressed)
}

/// Compress `input` as a zlib stream into `output`, returning the bytes written.
///
/// Fails with `NoSpace` if `output` is smaller than [`compressed_bound`].
pub fn compress_into(input: &[u8], output: &mut [u8], level: i32) -> Result<usize> {
    let needed = compressed_bound(input.len());
    if output.len() < needed {
        return Err(PackError::NoSpace {
            needed: needed as u64,
            available: output.len() as u64,
        });
    }

    let compressed = compress(input, level)?;
    copy_into(&compressed, output, PackError::Compress)
}

/// Decompress a zlib stream into a new buffer of at most `capacity` bytes.
pub fn decompress(input: &[u8], capacity: usize) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    output.try_reserve_exact(capacity)?;
    output.resize(capacity, 0);

    let produced = decompress_into(input, &mut output)?;
    output.truncate(produced);
    Ok(output)
}

/// Decompress a zlib stream into `output`, returning the bytes produced.
///
/// A stream error, or a stream that would produce more than `output.len()`
/// bytes, fails with `Decompress`.
pub fn decompress_into(input: &[u8], output: &mut [u8]) -> Result<usize> {
    let produced = inflate_into(ZlibDecoder::new(input), output)?;
    trace!(input = input.len(), output = produced, "zlib decompressed");
    Ok(produced)
}

/// Cheap plausibility check of a zlib stream header (RFC 1950).
///
/// Rejects anything that is not DEFLATE with a window of at most 32 KiB, a
/// valid FCHECK, and no preset dictionary.
pub fn zlib_header_seems_valid(buf: &[u8]) -> bool {
    let (cmf, flg) = match buf {
        [cmf, flg, ..] => (*cmf, *flg),
        _ => return false,
    };

    if cmf & 0x0F != 8 {
        return false;
    }
    if cmf >> 4 > 7 {
        return false;
    }
    if ((u16::from(cmf) << 8) | u16::from(flg)) % 31 != 0 {
        return false;
    }
    flg & 0x20 == 0
}

/// Compress `input` as a single gzip member into `output`.
///
/// Fails with `NoSpace` if `output` is smaller than [`gzip_bound`].
pub fn compress_gzip(input: &[u8], output: &mut [u8], level: i32) -> Result<usize> {
    let needed = gzip_bound(input.len());
    if output.len() < needed {
        return Err(PackError::NoSpace {
            needed: needed as u64,
            available: output.len() as u64,
        });
    }

    let mut encoder = GzEncoder::new(
        Vec::with_capacity(needed),
        Compression::new(clamp_level(level)),
    );
    encoder
        .write_all(input)
        .map_err(|e| PackError::Compress(format!("gzip encode failed: {}", e)))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PackError::Compress(format!("gzip encode failed: {}", e)))?;

    copy_into(&compressed, output, PackError::Compress)
}

/// Decompress a gzip member into `output`, returning the bytes produced.
///
/// The trailer CRC32 and ISIZE are verified; a mismatch fails with `Decompress`.
pub fn decompress_gzip(input: &[u8], output: &mut [u8]) -> Result<usize> {
    inflate_into(GzDecoder::new(input), output)
}

/// Drain `decoder` into `output`, failing if the stream does not end within it.
fn inflate_into<R: Read>(mut decoder: R, output: &mut [u8]) -> Result<usize> {
    let mut written = 0;
    while written < output.len() {
        match decoder.read(&mut output[written..]) {
            Ok(0) => return Ok(written),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PackError::Decompress(e.to_string())),
        }
    }

    // Output is full; the stream has to end here.
    let mut probe = [0u8; 1];
    loop {
        match decoder.read(&mut probe) {
            Ok(0) => return Ok(written),
            Ok(_) => {
                return Err(PackError::Decompress(format!(
                    "stream exceeds output capacity of {} bytes",
                    output.len()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PackError::Decompress(e.to_string())),
        }
    }
}

fn copy_into(data: &[u8], output: &mut [u8], err: fn(String) -> PackError) -> Result<usize> {
    if data.len() > output.len() {
        return Err(err(format!(
            "encoded size {} exceeds output capacity {}",
            data.len(),
            output.len()
        )));
    }
    output[..data.len()].copy_from_slice(data);
    Ok(data.len())
}
