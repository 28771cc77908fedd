use std::fs;
use std::io::Cursor;
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
const IHDR: [u8; 4] = *b"IHDR";

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("reading image {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("missing PNG signature")]
    BadSignature,
    #[error("truncated PNG header")]
    TruncatedHeader,
    #[error("first chunk is '{found}', expected IHDR")]
    MissingHeader { found: String },
    #[error("PNG reports a zero-sized image")]
    EmptyImage,
}

/// A decoded story frame image. Story art is plain PNG; the engine only needs
/// the pixel dimensions plus the raw bytes to hand to a renderer.
#[derive(Debug, Clone)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl FrameImage {
    pub fn load(path: &Path) -> Result<Self, SpriteError> {
        let bytes = fs::read(path).map_err(|source| SpriteError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::decode(bytes)
    }

    /// Validates the PNG signature and pulls width/height out of the IHDR
    /// chunk, which the format guarantees comes first.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, SpriteError> {
        if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
            return Err(SpriteError::BadSignature);
        }

        let mut cursor = Cursor::new(&bytes[PNG_SIGNATURE.len()..]);
        let _chunk_length = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| SpriteError::TruncatedHeader)?;
        let mut chunk_type = [0u8; 4];
        std::io::Read::read_exact(&mut cursor, &mut chunk_type)
            .map_err(|_| SpriteError::TruncatedHeader)?;
        if chunk_type != IHDR {
            return Err(SpriteError::MissingHeader {
                found: String::from_utf8_lossy(&chunk_type).into_owned(),
            });
        }

        let width = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| SpriteError::TruncatedHeader)?;
        let height = cursor
            .read_u32::<BigEndian>()
            .map_err(|_| SpriteError::TruncatedHeader)?;
        if width == 0 || height == 0 {
            return Err(SpriteError::EmptyImage);
        }

        Ok(FrameImage {
            width,
            height,
            bytes,
        })
    }
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&PNG_SIGNATURE);
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(&IHDR);
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    // checksum is not validated by the decoder
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::{encode_test_png, FrameImage, SpriteError};

    #[test]
    fn decodes_dimensions_from_ihdr() {
        let image = FrameImage::decode(encode_test_png(320, 96)).expect("valid png");
        assert_eq!(image.width, 320);
        assert_eq!(image.height, 96);
    }

    #[test]
    fn rejects_non_png_bytes() {
        let err = FrameImage::decode(b"GIF89a not a png".to_vec()).unwrap_err();
        assert!(matches!(err, SpriteError::BadSignature));
    }

    #[test]
    fn rejects_truncated_header() {
        let mut bytes = encode_test_png(64, 64);
        bytes.truncate(14);
        let err = FrameImage::decode(bytes).unwrap_err();
        assert!(matches!(err, SpriteError::TruncatedHeader));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = FrameImage::load(std::path::Path::new("/no/such/frame.png")).unwrap_err();
        assert!(matches!(err, SpriteError::Io { .. }));
    }
}
