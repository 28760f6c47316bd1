use std::borrow::Cow;
use std::io::Write;

use flate2::write::ZlibEncoder;

use super::consts::*;
use super::crypto::decrypt_mpq_block;
use super::error::MpqError;

/// Compression codec applied to sectors when a file is added with
/// compression enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// DEFLATE with a zlib header. The default.
    Zlib,
    /// Bzip2.
    Bzip2,
}

impl Default for Compression {
    fn default() -> Compression {
        Compression::Zlib
    }
}

impl Compression {
    fn id(self) -> u8 {
        match self {
            Compression::Zlib => COMPRESSION_ZLIB,
            Compression::Bzip2 => COMPRESSION_BZIP2,
        }
    }
}

/// Compresses a single sector with the given codec.
///
/// The compressed form is prefixed with the codec id byte and kept only
/// when that still beats storing the sector raw. Otherwise the input is
/// returned as-is, with no prefix; a reader detects a stored sector by
/// its size being equal to the expected decoded size.
pub(crate) fn compress_mpq_block(data: &[u8], compression: Compression) -> Cow<'_, [u8]> {
    let compressed = match compression {
        Compression::Zlib => deflate(data),
        Compression::Bzip2 => bzip2_compress(data),
    };

    match compressed {
        Some(compressed) if compressed.len() + 1 < data.len() => {
            let mut buf = Vec::with_capacity(compressed.len() + 1);
            buf.push(compression.id());
            buf.extend_from_slice(&compressed);
            Cow::Owned(buf)
        }
        _ => Cow::Borrowed(data),
    }
}

/// Decodes a single stored block:
///
/// 1) If `encryption_key` is given, the block is decrypted with it.
/// 2) If the stored size differs from `uncompressed_size`, the first
///    byte names the codec and the rest is decompressed. Blocks whose
///    stored size equals the expected size are returned as-is.
pub(crate) fn decode_mpq_block(
    input: &[u8],
    uncompressed_size: u64,
    encryption_key: Option<u32>,
) -> Result<Vec<u8>, MpqError> {
    let compressed_size = input.len() as u64;
    let mut buf: Vec<u8> = input.into();

    if let Some(encryption_key) = encryption_key {
        decrypt_mpq_block(&mut buf, encryption_key);
    }

    if compressed_size == uncompressed_size {
        return Ok(buf);
    }

    if buf.is_empty() {
        return Err(MpqError::corrupted("stored sector is empty"));
    }

    let compression_type = buf[0];

    if compression_type & COMPRESSION_IMA_ADPCM_MONO != 0 {
        return Err(MpqError::UnsupportedCompression {
            kind: "IMA ADPCM Mono".to_string(),
        });
    }

    if compression_type & COMPRESSION_IMA_ADPCM_STEREO != 0 {
        return Err(MpqError::UnsupportedCompression {
            kind: "IMA ADPCM Stereo".to_string(),
        });
    }

    if compression_type & COMPRESSION_HUFFMAN != 0 {
        return Err(MpqError::UnsupportedCompression {
            kind: "Huffman".to_string(),
        });
    }

    if compression_type & COMPRESSION_PKWARE != 0 {
        return Err(MpqError::UnsupportedCompression {
            kind: "PKWare DCL".to_string(),
        });
    }

    let decompressed = match compression_type {
        COMPRESSION_BZIP2 => bzip2_decompress(&buf[1..], uncompressed_size)?,
        COMPRESSION_ZLIB => inflate(&buf[1..], uncompressed_size)?,
        other => return Err(MpqError::UnknownCompression { id: other }),
    };

    if decompressed.len() as u64 != uncompressed_size {
        return Err(MpqError::corrupted("sector decoded to an unexpected size"));
    }

    Ok(decompressed)
}

fn deflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).ok()?;
    encoder.finish().ok()
}

fn bzip2_compress(data: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::Default);
    encoder.write_all(data).ok()?;
    encoder.finish().ok()
}

fn inflate(input: &[u8], expected_size: u64) -> Result<Vec<u8>, MpqError> {
    let mut decompressed = vec![0u8; expected_size as usize];
    let mut decompressor = flate2::Decompress::new(true);

    let status = decompressor
        .decompress(input, &mut decompressed, flate2::FlushDecompress::Finish)
        .map_err(|_| MpqError::corrupted("invalid deflate stream in sector"))?;

    if status != flate2::Status::StreamEnd {
        return Err(MpqError::corrupted("sector decompressed to an unexpected size"));
    }

    decompressed.truncate(decompressor.total_out() as usize);
    Ok(decompressed)
}

fn bzip2_decompress(input: &[u8], expected_size: u64) -> Result<Vec<u8>, MpqError> {
    let mut decompressed = vec![0u8; expected_size as usize];
    let mut decompressor = bzip2::Decompress::new(false);

    let status = decompressor
        .decompress(input, &mut decompressed)
        .map_err(|_| MpqError::corrupted("invalid bzip2 stream in sector"))?;

    if status != bzip2::Status::StreamEnd {
        return Err(MpqError::corrupted("sector decompressed to an unexpected size"));
    }

    decompressed.truncate(decompressor.total_out() as usize);
    Ok(decompressed)
}
