//! RPM payload decompression.

use std::io::Read;

use flate2::read::GzDecoder;
use symboldb_core::errors::RpmError;

/// Decompress the payload into a cpio archive buffer.
///
/// The compressor defaults to gzip when the header carries no
/// PAYLOADCOMPRESSOR tag (ancient packages). Only the cpio payload format
/// is supported, which is the only format rpmbuild has ever emitted.
pub fn decompress(
    data: &[u8],
    format: Option<&str>,
    compressor: Option<&str>,
) -> Result<Vec<u8>, RpmError> {
    if let Some(format) = format {
        if format != "cpio" {
            return Err(RpmError::UnsupportedPayloadFormat {
                name: format.to_string(),
            });
        }
    }
    match compressor.unwrap_or("gzip") {
        "gzip" => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| RpmError::Payload {
                    message: e.to_string(),
                })?;
            Ok(out)
        }
        other => Err(RpmError::UnsupportedCompressor {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn gzip_roundtrip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"payload bytes").unwrap();
        let compressed = encoder.finish().unwrap();
        let out = decompress(&compressed, Some("cpio"), Some("gzip")).unwrap();
        assert_eq!(out, b"payload bytes");
    }

    #[test]
    fn missing_compressor_means_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"x").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(decompress(&compressed, None, None).unwrap(), b"x");
    }

    #[test]
    fn unsupported_compressor() {
        assert!(matches!(
            decompress(b"", Some("cpio"), Some("zstd")),
            Err(RpmError::UnsupportedCompressor { .. })
        ));
    }

    #[test]
    fn corrupt_stream() {
        assert!(matches!(
            decompress(b"not gzip at all", None, None),
            Err(RpmError::Payload { .. })
        ));
    }
}
