//! Compression algorithms for cached values.

use herd_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Compression algorithm.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    #[default]
    Zstd,
    Gzip,
    Lz4,
}

impl CompressionType {
    /// One-byte tag written after the codec marker.
    pub fn tag(self) -> u8 {
        match self {
            CompressionType::None => b'n',
            CompressionType::Zstd => b'z',
            CompressionType::Gzip => b'g',
            CompressionType::Lz4 => b'l',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'n' => Some(CompressionType::None),
            b'z' => Some(CompressionType::Zstd),
            b'g' => Some(CompressionType::Gzip),
            b'l' => Some(CompressionType::Lz4),
            _ => None,
        }
    }
}

/// Compress data using the specified algorithm.
pub fn compress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => compress_zstd(data),
        CompressionType::Gzip => compress_gzip(data),
        CompressionType::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
    }
}

/// Decompress data using the specified algorithm.
pub fn decompress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => decompress_zstd(data),
        CompressionType::Gzip => decompress_gzip(data),
        CompressionType::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| Error::Compression(format!("LZ4 decompression failed: {}", e))),
    }
}

fn compress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::encode_all(data, 3)
        .map_err(|e| Error::Compression(format!("Zstd compression failed: {}", e)))
}

fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data)
        .map_err(|e| Error::Compression(format!("Zstd decompression failed: {}", e)))
}

fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Compression(format!("Gzip write failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Compression(format!("Gzip finish failed: {}", e)))
}

fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Compression(format!("Gzip read failed: {}", e)))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"{\"title\":\"Dune\",\"pages\":412,\"tags\":[\"sf\",\"sf\",\"sf\",\"sf\"]}";

    #[test]
    fn test_algorithms_restore_input() {
        for algorithm in [
            CompressionType::None,
            CompressionType::Zstd,
            CompressionType::Gzip,
            CompressionType::Lz4,
        ] {
            let compressed = compress(SAMPLE, algorithm).unwrap();
            let restored = decompress(&compressed, algorithm).unwrap();
            assert_eq!(SAMPLE, restored.as_slice(), "{algorithm:?}");
        }
    }

    #[test]
    fn test_tags_are_distinct() {
        for algorithm in [
            CompressionType::None,
            CompressionType::Zstd,
            CompressionType::Gzip,
            CompressionType::Lz4,
        ] {
            assert_eq!(CompressionType::from_tag(algorithm.tag()), Some(algorithm));
        }
        assert_eq!(CompressionType::from_tag(b'?'), None);
    }

    #[test]
    fn test_corrupt_input_is_an_error() {
        let result = decompress(b"definitely not zstd", CompressionType::Zstd);
        assert!(matches!(result, Err(Error::Compression(_))));
    }
}
