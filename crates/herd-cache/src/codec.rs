//! Value codec: transparent compression of large cached values.
//!
//! Compressed values are framed as `MARKER ++ tag ++ body`. Anything without
//! the marker is read back verbatim, so values written before compression
//! was enabled stay readable.

use crate::compression::{self, CompressionType};
use herd_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Prefix of a compressed value. JSON text never starts with 0x1F.
pub const COMPRESSION_MARKER: &[u8; 3] = b"\x1fHZ";

/// Serialized size at which values are compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 8 * 1024;

/// Codec configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Values of at least this many bytes are compressed.
    #[serde(default = "default_threshold")]
    pub threshold_bytes: usize,
    /// Algorithm used for new writes. Reads accept every algorithm.
    #[serde(default)]
    pub algorithm: CompressionType,
}

fn default_threshold() -> usize {
    DEFAULT_COMPRESSION_THRESHOLD
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD,
            algorithm: CompressionType::Zstd,
        }
    }
}

impl CodecConfig {
    pub fn with_threshold(mut self, bytes: usize) -> Self {
        self.threshold_bytes = bytes;
        self
    }

    pub fn with_algorithm(mut self, algorithm: CompressionType) -> Self {
        self.algorithm = algorithm;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValueCodec {
    config: CodecConfig,
}

impl ValueCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Frame serialized bytes for storage.
    pub fn encode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        if raw.len() < self.config.threshold_bytes
            || self.config.algorithm == CompressionType::None
        {
            return Ok(raw.to_vec());
        }

        let body = compression::compress(raw, self.config.algorithm)?;
        let mut framed = Vec::with_capacity(COMPRESSION_MARKER.len() + 1 + body.len());
        framed.extend_from_slice(COMPRESSION_MARKER);
        framed.push(self.config.algorithm.tag());
        framed.extend_from_slice(&body);
        Ok(framed)
    }

    /// Undo [`ValueCodec::encode`]. Unframed input is returned as-is.
    pub fn decode(&self, stored: &[u8]) -> Result<Vec<u8>> {
        let Some(rest) = stored.strip_prefix(COMPRESSION_MARKER.as_slice()) else {
            return Ok(stored.to_vec());
        };
        let (&tag, body) = rest
            .split_first()
            .ok_or_else(|| Error::Compression("Truncated compressed value".into()))?;
        let algorithm = CompressionType::from_tag(tag)
            .ok_or_else(|| Error::Compression(format!("Unknown compression tag: {:#04x}", tag)))?;
        compression::decompress(body, algorithm)
    }

    pub fn is_compressed(stored: &[u8]) -> bool {
        stored.starts_with(COMPRESSION_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn large_json() -> Vec<u8> {
        let items: Vec<_> = (0..2_000)
            .map(|i| serde_json::json!({"id": i, "name": "widget"}))
            .collect();
        serde_json::to_vec(&items).unwrap()
    }

    #[test]
    fn test_small_values_stay_raw() {
        let codec = ValueCodec::default();
        let raw = br#"{"ok":true}"#;
        let stored = codec.encode(raw).unwrap();
        assert_eq!(stored, raw);
        assert!(!ValueCodec::is_compressed(&stored));
    }

    #[test]
    fn test_large_values_are_compressed() {
        let codec = ValueCodec::default();
        let raw = large_json();
        assert!(raw.len() > DEFAULT_COMPRESSION_THRESHOLD);

        let stored = codec.encode(&raw).unwrap();
        assert!(ValueCodec::is_compressed(&stored));
        assert!(stored.len() < raw.len());
        assert_eq!(codec.decode(&stored).unwrap(), raw);
    }

    #[test]
    fn test_reads_other_algorithms() {
        let raw = large_json();
        let gzip = ValueCodec::new(CodecConfig::default().with_algorithm(CompressionType::Gzip));
        let stored = gzip.encode(&raw).unwrap();

        let zstd = ValueCodec::default();
        assert_eq!(zstd.decode(&stored).unwrap(), raw);
    }

    #[test]
    fn test_legacy_uncompressed_values() {
        let codec = ValueCodec::default();
        let legacy = large_json();
        assert_eq!(codec.decode(&legacy).unwrap(), legacy);
    }

    #[test]
    fn test_unknown_tag() {
        let codec = ValueCodec::default();
        let mut stored = COMPRESSION_MARKER.to_vec();
        stored.push(b'?');
        assert!(matches!(codec.decode(&stored), Err(Error::Compression(_))));

        let truncated = COMPRESSION_MARKER.to_vec();
        assert!(matches!(codec.decode(&truncated), Err(Error::Compression(_))));
    }
}
